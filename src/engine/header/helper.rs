// Helper to write a string (null-terminated when shorter than the field)
pub(crate) fn put_str(dst: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(dst.len());
    dst[..len].copy_from_slice(&bytes[..len]);
    if len < dst.len() {
        dst[len..].fill(0);
    }
}

// Helper to write octal numbers as zero-padded strings
pub(crate) fn put_octal<T: itoa::Integer + std::fmt::Octal>(dst: &mut [u8], value: T) {
    let s = format!("{:0width$o}", value, width = dst.len() - 1); // leave space for null
    let bytes = s.as_bytes();
    let len = bytes.len().min(dst.len() - 1);
    dst[..len].copy_from_slice(&bytes[..len]);
    dst[len] = b'\0';
}

// Helper to extract and trim null-terminated strings
#[cfg(test)]
pub(crate) fn get_str(buf: &[u8]) -> Result<String, std::string::FromUtf8Error> {
    let nul = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..nul].to_vec())
}

// Helper to parse octal strings
#[cfg(test)]
pub(crate) fn parse_octal<T: std::str::FromStr>(buf: &[u8]) -> anyhow::Result<T>
where
    T: num_traits::Num + std::fmt::Debug,
{
    let binding = String::from_utf8(buf.to_vec())?;
    let s = binding.trim_matches(|c| c == char::from(0) || c == ' ').trim();
    if s.is_empty() {
        return Ok(T::zero());
    }
    match T::from_str_radix(s, 8) {
        Ok(v) => Ok(v),
        Err(_) => anyhow::bail!("Invalid octal: {}", s),
    }
}
