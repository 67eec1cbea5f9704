//! Fuzz input decoder
//!
//! Turns raw bytes into bounded integers and strings. Running out of input
//! is never an error: integers read as zero and strings as `None`.

/// Two-byte sequence that ends a string
const TERMINATOR: u8 = b'\n';
const ESCAPE: u8 = b'\\';

/// Cursor over one fuzz input
#[derive(Debug, Clone)]
pub struct FuzzInput<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FuzzInput<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not consumed yet
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Total input length
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    /// Read a big-endian integer of `width` bytes (at most 4)
    ///
    /// Missing bytes past the end of input read as zero.
    pub fn read_int(&mut self, width: usize) -> u32 {
        let mut value: u32 = 0;
        for _ in 0..width.min(4) {
            value = (value << 8) | u32::from(self.next_byte().unwrap_or(0));
        }
        value
    }

    /// Read one opcode byte
    #[inline]
    pub fn read_byte(&mut self) -> u8 {
        self.next_byte().unwrap_or(0)
    }

    /// Read a string terminated by `\` `\n`
    ///
    /// `\\` stands for one backslash; a backslash before any other byte is
    /// dropped. Bytes past `max` are consumed but discarded. Returns `None`
    /// when the input is already exhausted.
    pub fn read_string(&mut self, max: usize) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut out = Vec::new();
        while let Some(byte) = self.next_byte() {
            let byte = if byte == ESCAPE {
                match self.next_byte() {
                    Some(TERMINATOR) | None => break,
                    Some(escaped) => escaped,
                }
            } else {
                byte
            };
            if out.len() < max {
                out.push(byte);
            }
        }
        Some(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Cut `s` to at most `max` bytes on a character boundary
pub fn truncate_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_int_big_endian() {
        let mut input = FuzzInput::new(&[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(input.read_int(4), 0x0102_0304);
        assert_eq!(input.read_int(1), 5);
        assert!(input.is_empty());
    }

    #[test]
    fn test_read_int_zero_pads() {
        let mut input = FuzzInput::new(&[0xAB]);
        assert_eq!(input.read_int(4), 0xAB00_0000);
        assert_eq!(input.read_int(2), 0);
    }

    #[test]
    fn test_read_string_terminator_and_escape() {
        let mut input = FuzzInput::new(b"a\\\\b\\\ncd");
        assert_eq!(input.read_string(100).as_deref(), Some("a\\b"));
        assert_eq!(input.read_string(100).as_deref(), Some("cd"));
        assert_eq!(input.read_string(100), None);
    }

    #[test]
    fn test_read_string_bounded() {
        let mut input = FuzzInput::new(b"abcdef\\\nx");
        assert_eq!(input.read_string(3).as_deref(), Some("abc"));
        assert_eq!(input.read_byte(), b'x');
    }

    #[test]
    fn test_read_string_lossy() {
        let mut input = FuzzInput::new(&[0xFF, b'a']);
        assert_eq!(input.read_string(10).as_deref(), Some("\u{FFFD}a"));
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 2), "he");
        // 'é' is two bytes
        assert_eq!(truncate_str("aé", 2), "a");
    }
}
