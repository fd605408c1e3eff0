use super::helper::*;

/// Largest size representable in the 11-digit octal ustar size field.
pub const MAX_ENTRY_SIZE: u64 = 0o77777777777;

/// USTAR entry type flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    RegularFile,
    Directory,
    /// Synthetic PAX extended-header entry preceding the real one.
    ExtendedHeader,
}

impl From<EntryKind> for u8 {
    fn from(value: EntryKind) -> Self {
        match value {
            EntryKind::RegularFile => b'0',
            EntryKind::Directory => b'5',
            EntryKind::ExtendedHeader => b'x',
        }
    }
}

impl EntryKind {
    pub fn is_regular_file(&self) -> bool {
        matches!(self, EntryKind::RegularFile)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// Represents a USTAR TAR header for one archive entry (POSIX).
///
/// Mode is fixed at `0000777` and owner/group at zero; these fields are
/// deliberately not configurable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UstarHeader {
    /// Trailing filename component (truncated to 100 bytes on encode)
    pub name: String,
    /// Leading directory component (truncated to 155 bytes on encode)
    pub prefix: String,
    /// Content size in bytes
    pub size: u64,
    /// Modification time in epoch seconds
    pub mtime: u64,
    /// Type flag
    pub typeflag: EntryKind,
}

impl UstarHeader {
    pub fn new(name: &str, prefix: &str, size: u64, mtime: u64, typeflag: EntryKind) -> Self {
        UstarHeader {
            name: name.to_string(),
            prefix: prefix.to_string(),
            size,
            mtime,
            typeflag,
        }
    }

    /// Encodes the header as a 512-byte block.
    ///
    /// Pure with respect to its inputs: identical headers encode to
    /// byte-identical blocks. linkname, uname, gname and the device
    /// number fields stay NUL.
    pub fn to_block(&self) -> [u8; 512] {
        let mut buf = [0u8; 512];
        put_str(&mut buf[0..100], &self.name);
        put_octal(&mut buf[100..108], 0o777u32);
        put_octal(&mut buf[108..116], 0u32);
        put_octal(&mut buf[116..124], 0u32);
        put_octal(&mut buf[124..136], self.size);
        put_octal(&mut buf[136..148], self.mtime);
        buf[156] = self.typeflag.into();
        buf[257..263].copy_from_slice(b"ustar\0");
        buf[263..265].copy_from_slice(b"00");
        put_str(&mut buf[345..500], &self.prefix);

        // Set checksum field to spaces before computing checksum (TAR spec)
        buf[148..156].fill(b' ');
        let mut chksum: u32 = 0;
        for i in 0..512 {
            chksum = chksum.wrapping_add(buf[i] as u32);
        }
        let chksum_str = format!("{:06o}\0 ", chksum);
        buf[148..156].copy_from_slice(chksum_str.as_bytes());
        buf
    }
}
