use indexmap::IndexMap;

/// Capacity of the ustar name field in bytes.
const NAME_FIELD_LEN: usize = 100;

/// Capacity of the ustar prefix field, minus one byte kept for the NUL
/// separator.
const PREFIX_FIELD_LEN: usize = 154;

/// Tells whether a split path no longer fits the fixed ustar name fields
/// and must be carried by a preceding PAX extended header.
pub fn needs_extended_header(name_len: usize, prefix_len: usize) -> bool {
    name_len > NAME_FIELD_LEN || prefix_len > PREFIX_FIELD_LEN
}

/// PAX extended-header records (key-value pairs, preserves order).
///
/// Serialized as `"<len> <key>=<value>\n"` lines where `<len>` is the
/// decimal byte length of the whole line including the length prefix
/// itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaxRecords {
    records: IndexMap<String, String>,
}

impl PaxRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the record set carrying the authoritative path of the entry
    /// that follows.
    pub fn path(full_path: &str) -> Self {
        let mut records = Self::new();
        records.set("path", full_path);
        records
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.records.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.records.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total payload length in bytes once encoded.
    pub fn encoded_len(&self) -> u64 {
        self.records.iter().map(|(k, v)| Self::line_len(k, v)).sum()
    }

    /// Serializes every record in insertion order.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len() as usize);
        let mut itoa_buf = itoa::Buffer::new();
        for (k, v) in &self.records {
            out.extend_from_slice(itoa_buf.format(Self::line_len(k, v)).as_bytes());
            out.push(b' ');
            out.extend_from_slice(k.as_bytes());
            out.push(b'=');
            out.extend_from_slice(v.as_bytes());
            out.push(b'\n');
        }
        out
    }

    /// Length of one `"<len> <key>=<value>\n"` line.
    ///
    /// The length prefix counts itself, and writing it can change its own
    /// digit count across a power-of-ten boundary, so iterate until the
    /// total stops moving.
    fn line_len(key: &str, value: &str) -> u64 {
        // bytes in " key=value\n", before the length prefix
        let body = (key.len() + value.len() + 3) as u64;
        let mut total = body + decimal_digits(body);
        loop {
            let next = body + decimal_digits(total);
            if next == total {
                return total;
            }
            total = next;
        }
    }
}

fn decimal_digits(n: u64) -> u64 {
    u64::from(n.checked_ilog10().unwrap_or(0) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_len_simple() {
        // 15 hello=world\n
        assert_eq!(PaxRecords::line_len("hello", "world"), 15);
    }

    #[test]
    fn line_len_short_key() {
        // 11 a=world\n
        assert_eq!(PaxRecords::line_len("a", "world"), 11);
    }

    #[test]
    fn line_len_crosses_power_of_ten() {
        // body is 98 bytes; prefixing "100" would undercount, the stable
        // answer is 101
        let value = "a".repeat(94);
        assert_eq!(PaxRecords::line_len("k", &value), 101);
    }

    #[test]
    fn line_len_is_self_referential_for_many_sizes() {
        for n in 1..400 {
            let value = "v".repeat(n);
            let mut records = PaxRecords::new();
            records.set("path", &value);
            let encoded = records.encode();
            assert_eq!(encoded.len() as u64, records.encoded_len());
            let space = encoded.iter().position(|&b| b == b' ').unwrap();
            let prefix: u64 = std::str::from_utf8(&encoded[..space]).unwrap().parse().unwrap();
            assert_eq!(prefix, encoded.len() as u64, "value length {}", n);
        }
    }

    #[test]
    fn encode_single_path() {
        let records = PaxRecords::path("some/dir/file.txt");
        assert_eq!(records.get("path"), Some("some/dir/file.txt"));
        let encoded = records.encode();
        assert_eq!(encoded, b"26 path=some/dir/file.txt\n");
    }

    #[test]
    fn encode_preserves_insertion_order() {
        let mut records = PaxRecords::new();
        records.set("path", "x");
        records.set("atime", "123.5");
        let encoded = String::from_utf8(records.encode()).unwrap();
        let path_at = encoded.find("path=").unwrap();
        let atime_at = encoded.find("atime=").unwrap();
        assert!(path_at < atime_at);
    }

    #[test]
    fn escalation_thresholds() {
        assert!(!needs_extended_header(100, 0));
        assert!(needs_extended_header(101, 0));
        assert!(!needs_extended_header(0, 154));
        assert!(needs_extended_header(0, 155));
        assert!(!needs_extended_header(100, 154));
    }
}
