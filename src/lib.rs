//! Incremental POSIX tar streaming.
//!
//! Builds ustar archives entry by entry against any [`std::io::Write`]
//! sink without buffering the whole archive: header blocks, PAX
//! extended headers for long names, payload chunks and block padding are
//! emitted as each entry is added, so the output can go straight to a
//! file, a pipe or an HTTP response body.
//!
//! ```no_run
//! use tarpipe::TarWriter;
//!
//! fn main() -> anyhow::Result<()> {
//!     let file = std::fs::File::create("out.tar")?;
//!     let mut tar = TarWriter::new(file);
//!     tar.add_directory("logs", 1_700_000_000)?;
//!     tar.add_file("logs/hello.txt", b"hi there\n", 1_700_000_000)?;
//!     tar.finalize()?;
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;

pub use engine::header::{EntryKind, PaxRecords, UstarHeader};
pub use engine::stream::{ArchiveOptions, FramingHook, TarWriter};
pub use error::{ArchiveError, Result};
