use std::io::{Read, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;

use tracing::{debug, warn};

use crate::engine::header::{needs_extended_header, EntryKind, PaxRecords, UstarHeader, MAX_ENTRY_SIZE};
use crate::engine::{block_padding, unix_time, BLOCK_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_LARGE_FILE_THRESHOLD};
use crate::error::{ArchiveError, Result};

const ZERO_BLOCK: [u8; BLOCK_SIZE as usize] = [0; BLOCK_SIZE as usize];

/// Hook announcing protocol framing (e.g. HTTP response headers) to the
/// enclosing transport. Invoked at most once, immediately before the
/// first archive byte reaches the sink.
pub type FramingHook = Box<dyn FnOnce() -> std::io::Result<()>>;

/// Archive session options.
///
/// Every option is a typed, named field with a documented default, so an
/// unknown option is unrepresentable rather than silently ignored.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Prefix every entry path with one fixed root directory.
    pub use_container_dir: bool,
    /// Name of that root directory, without a trailing slash.
    pub container_dir_name: String,
    /// Name of the error-log entry appended on finalize when errors were
    /// pushed. Default `archive_errors.log`.
    pub error_log_filename: String,
    /// First line of the error-log entry.
    pub error_header_text: String,
    /// Path-based adds larger than this stream chunk-wise instead of
    /// loading the content into memory. Default 20 MiB.
    pub large_file_threshold: u64,
    /// Chunk size of the bounded-reader streaming path. Default 1 MiB.
    pub chunk_size: usize,
    /// Fail `complete_entry` when the streamed byte count differs from
    /// the declared size, instead of silently producing a malformed
    /// archive. Default off, matching the historical behavior.
    pub enforce_declared_sizes: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        ArchiveOptions {
            use_container_dir: false,
            container_dir_name: String::new(),
            error_log_filename: "archive_errors.log".to_string(),
            error_header_text:
                "The following errors were encountered while generating this archive:".to_string(),
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            enforce_declared_sizes: false,
        }
    }
}

/// Byte budget of the entry currently being written.
#[derive(Debug)]
struct PendingEntry {
    path: String,
    declared: u64,
    written: u64,
}

/// Streams a POSIX tar archive entry by entry into an append-only sink.
///
/// Entries are emitted strictly sequentially: header block(s), payload
/// chunks, zero-padding to the next 512-byte boundary. Nothing is
/// buffered beyond the chunk in flight and the sink is never seeked, so
/// the same writer serves files, pipes and HTTP response bodies. Call
/// [`TarWriter::finalize`] exactly once when all entries are added.
pub struct TarWriter<W: Write> {
    sink: W,
    opt: ArchiveOptions,
    framing: Option<FramingHook>,
    pending: Option<PendingEntry>,
    errors: Vec<String>,
}

impl<W: Write> TarWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, ArchiveOptions::default())
    }

    pub fn with_options(sink: W, opt: ArchiveOptions) -> Self {
        TarWriter {
            sink,
            opt,
            framing: None,
            pending: None,
            errors: Vec::new(),
        }
    }

    /// Installs the one-shot framing hook. Replaces a hook that has not
    /// fired yet; a hook installed after the first byte never fires.
    pub fn set_framing_hook(&mut self, hook: FramingHook) {
        self.framing = Some(hook);
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.opt
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Opens a new entry: writes its header block, preceded by a complete
    /// synthetic PAX entry when the path overflows the ustar name fields,
    /// and records the declared size as the pending byte budget.
    pub fn begin_entry(&mut self, path: &str, size: u64, kind: EntryKind, mtime: u64) -> Result<()> {
        debug_assert!(self.pending.is_none(), "previous entry was not completed");
        if size > MAX_ENTRY_SIZE {
            return Err(ArchiveError::UnsupportedSize {
                path: path.to_string(),
                size,
            });
        }

        let (prefix, name) = self.split_entry_path(path, kind);

        // A long path travels authoritatively in a preceding PAX entry;
        // the ustar fields below still carry the truncated fallback for
        // readers that ignore it.
        if kind != EntryKind::ExtendedHeader && needs_extended_header(name.len(), prefix.len()) {
            let payload = PaxRecords::path(&join_paths(&prefix, &name)).encode();
            debug!(path, "escalating to a PAX extended header");
            self.begin_entry("", payload.len() as u64, EntryKind::ExtendedHeader, mtime)?;
            self.write_chunk(&payload)?;
            self.complete_entry()?;
        }

        let header = UstarHeader::new(&name, &prefix, size, mtime, kind);
        self.send(&header.to_block())?;
        self.pending = Some(PendingEntry {
            path: path.to_string(),
            declared: size,
            written: 0,
        });
        debug!(path, size, ?kind, "entry header sent");
        Ok(())
    }

    /// Forwards one payload chunk verbatim. Valid only between
    /// `begin_entry` and `complete_entry`; the caller owns the guarantee
    /// that chunk lengths sum to the declared size.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        debug_assert!(self.pending.is_some(), "write_chunk outside an entry");
        self.send(data)?;
        if let Some(pending) = self.pending.as_mut() {
            pending.written += data.len() as u64;
        }
        Ok(())
    }

    /// Closes the current entry by zero-padding the payload out to the
    /// next block boundary. Padding derives from the declared size, not
    /// from the bytes actually streamed.
    pub fn complete_entry(&mut self) -> Result<()> {
        debug_assert!(self.pending.is_some(), "complete_entry outside an entry");
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        if self.opt.enforce_declared_sizes && pending.written != pending.declared {
            return Err(ArchiveError::SizeMismatch {
                path: pending.path,
                declared: pending.declared,
                written: pending.written,
            });
        }
        let padding = block_padding(pending.declared);
        if padding > 0 {
            self.send(&ZERO_BLOCK[..padding as usize])?;
        }
        Ok(())
    }

    /// Explicitly adds a directory (necessary for empty directories).
    pub fn add_directory(&mut self, path: &str, mtime: u64) -> Result<()> {
        self.begin_entry(path, 0, EntryKind::Directory, mtime)?;
        self.complete_entry()
    }

    /// Adds a regular file from an in-memory payload.
    pub fn add_file(&mut self, path: &str, data: &[u8], mtime: u64) -> Result<()> {
        self.begin_entry(path, data.len() as u64, EntryKind::RegularFile, mtime)?;
        self.write_chunk(data)?;
        self.complete_entry()
    }

    /// Adds a regular file by pulling up to `size` bytes from `source` in
    /// fixed-size chunks.
    ///
    /// A source that runs dry before `size` bytes leaves the entry padded
    /// for the declared size and the archive malformed; keeping the
    /// declared size honest is the caller's contract.
    pub fn add_file_from_reader(
        &mut self,
        path: &str,
        source: &mut impl Read,
        size: u64,
        mtime: u64,
    ) -> Result<()> {
        self.begin_entry(path, size, EntryKind::RegularFile, mtime)?;
        let mut buf = vec![0u8; self.opt.chunk_size];
        let mut remaining = size;
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let got = source.read(&mut buf[..want])?;
            if got == 0 {
                warn!(path, remaining, "content source exhausted before the declared size");
                break;
            }
            self.write_chunk(&buf[..got])?;
            remaining -= got as u64;
        }
        self.complete_entry()
    }

    /// Adds a file from the filesystem under the archive path `name`,
    /// streaming chunk-wise when it exceeds the large-file threshold.
    pub fn add_file_from_path(&mut self, name: &str, fs_path: impl AsRef<Path>) -> Result<()> {
        let fs_path = fs_path.as_ref();
        let metadata = std::fs::metadata(fs_path)?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_else(unix_time);
        let size = metadata.len();
        if size > self.opt.large_file_threshold {
            let mut file = std::fs::File::open(fs_path)?;
            self.add_file_from_reader(name, &mut file, size, mtime)
        } else {
            let data = std::fs::read(fs_path)?;
            self.add_file(name, &data, mtime)
        }
    }

    /// Logs a non-fatal error for the trailing error-log entry. Callers
    /// that skip an unreadable file use this to still deliver a complete
    /// archive.
    pub fn push_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "archive error pushed");
        self.errors.push(message);
    }

    /// Appends the error-log entry when errors were pushed, then writes
    /// the two-block end-of-archive terminator and flushes the sink.
    /// Designed to be called exactly once per session.
    pub fn finalize(&mut self) -> Result<()> {
        self.add_error_log()?;
        self.send(&ZERO_BLOCK)?;
        self.send(&ZERO_BLOCK)?;
        self.sink.flush()?;
        debug!(errors = self.errors.len(), "archive finalized");
        Ok(())
    }

    /// When errors were pushed, adds one regular file holding the header
    /// line and every message, at the archive root outside any container
    /// directory.
    fn add_error_log(&mut self) -> Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let mut content = self.opt.error_header_text.clone();
        for message in &self.errors {
            content.push_str("\r\n\r\n");
            content.push_str(message);
        }
        let filename = self.opt.error_log_filename.clone();
        let container = self.opt.use_container_dir;
        self.opt.use_container_dir = false;
        let result = self.add_file(&filename, content.as_bytes(), unix_time());
        self.opt.use_container_dir = container;
        result
    }

    /// Splits a path into its directory-prefix and filename components,
    /// marks directories with a trailing slash and applies the container
    /// directory.
    fn split_entry_path(&self, path: &str, kind: EntryKind) -> (String, String) {
        let trimmed = path.trim_end_matches('/');
        let (dir, base) = match trimmed.rsplit_once('/') {
            Some((dir, base)) => (dir.to_string(), base.to_string()),
            None => (String::new(), trimmed.to_string()),
        };
        let base = if kind == EntryKind::Directory {
            format!("{base}/")
        } else {
            base
        };
        let dir = if self.opt.use_container_dir {
            join_paths(&self.opt.container_dir_name, dir.trim_start_matches('/'))
        } else {
            dir
        };
        (dir, base)
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        if let Some(hook) = self.framing.take() {
            hook()?;
        }
        self.sink.write_all(data)?;
        Ok(())
    }
}

fn join_paths(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{left}/{right}"),
    }
}
