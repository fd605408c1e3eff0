pub mod helper;
pub mod pax;
pub mod ustar;

pub use pax::{needs_extended_header, PaxRecords};
pub use ustar::{EntryKind, UstarHeader, MAX_ENTRY_SIZE};
