//! Pull-based character decoding over a byte stream.
//!
//! [`DecodedChars`] turns any [`Read`] into a lazy iterator of characters.
//! Malformed input never fails the stream: each bad sequence decodes to
//! U+FFFD and decoding resumes at the next byte that can start a character.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::str::FromStr;

use crate::error::CharsetError;

/// Supported text encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
    /// US-ASCII: bytes above 0x7F are malformed.
    Ascii,
    Utf16Le,
    Utf16Be,
}

impl Charset {
    /// Canonical label, as accepted by [`FromStr`].
    pub fn label(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
            Charset::Ascii => "US-ASCII",
            Charset::Utf16Le => "UTF-16LE",
            Charset::Utf16Be => "UTF-16BE",
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Charset {
    type Err = CharsetError;

    /// Labels are matched case-insensitively, ignoring `-` and `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "utf8" => Ok(Charset::Utf8),
            "iso88591" | "latin1" | "l1" => Ok(Charset::Latin1),
            "usascii" | "ascii" => Ok(Charset::Ascii),
            "utf16le" => Ok(Charset::Utf16Le),
            "utf16be" => Ok(Charset::Utf16Be),
            _ => Err(CharsetError(s.to_string())),
        }
    }
}

/// Lazy, non-restartable sequence of characters decoded from a reader.
///
/// Each call to [`next`](Iterator::next) pulls only the bytes of one
/// character. Dropping the iterator drops (and thereby closes) the reader.
pub struct DecodedChars<R> {
    reader: BufReader<R>,
    charset: Charset,
    /// UTF-16 unit read past a lone high surrogate.
    pending_unit: Option<u16>,
}

impl<R: Read> DecodedChars<R> {
    pub fn new(reader: R, charset: Charset) -> Self {
        Self {
            reader: BufReader::new(reader),
            charset,
            pending_unit: None,
        }
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Look at the next byte without consuming it.
    fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.peek_byte()?;
        if byte.is_some() {
            self.reader.consume(1);
        }
        Ok(byte)
    }

    fn decode_utf8(&mut self) -> io::Result<Option<char>> {
        let Some(lead) = self.next_byte()? else {
            return Ok(None);
        };
        let width = match lead {
            0x00..=0x7F => return Ok(Some(char::from(lead))),
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
        };

        let mut bytes = [lead, 0, 0, 0];
        for slot in bytes.iter_mut().take(width).skip(1) {
            match self.peek_byte()? {
                Some(b @ 0x80..=0xBF) => {
                    self.reader.consume(1);
                    *slot = b;
                }
                // Leave the offending byte for the next character
                _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
            }
        }

        // Rejects overlong forms, surrogates and code points past U+10FFFF
        let decoded = std::str::from_utf8(&bytes[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        Ok(Some(decoded))
    }

    fn next_unit(&mut self, little_endian: bool) -> io::Result<Option<u16>> {
        let Some(first) = self.next_byte()? else {
            return Ok(None);
        };
        let Some(second) = self.next_byte()? else {
            // Odd trailing byte
            return Ok(Some(0xFFFD));
        };
        let pair = [first, second];
        Ok(Some(if little_endian {
            u16::from_le_bytes(pair)
        } else {
            u16::from_be_bytes(pair)
        }))
    }

    fn decode_utf16(&mut self, little_endian: bool) -> io::Result<Option<char>> {
        let unit = match self.pending_unit.take() {
            Some(unit) => unit,
            None => match self.next_unit(little_endian)? {
                Some(unit) => unit,
                None => return Ok(None),
            },
        };

        match unit {
            0xD800..=0xDBFF => match self.next_unit(little_endian)? {
                Some(low @ 0xDC00..=0xDFFF) => {
                    let code =
                        0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
                    Ok(Some(
                        char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER),
                    ))
                }
                Some(other) => {
                    self.pending_unit = Some(other);
                    Ok(Some(char::REPLACEMENT_CHARACTER))
                }
                None => Ok(Some(char::REPLACEMENT_CHARACTER)),
            },
            0xDC00..=0xDFFF => Ok(Some(char::REPLACEMENT_CHARACTER)),
            _ => Ok(Some(
                char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER),
            )),
        }
    }

    fn decode(&mut self) -> io::Result<Option<char>> {
        match self.charset {
            Charset::Utf8 => self.decode_utf8(),
            Charset::Latin1 => Ok(self.next_byte()?.map(char::from)),
            Charset::Ascii => Ok(self.next_byte()?.map(|b| {
                if b.is_ascii() {
                    char::from(b)
                } else {
                    char::REPLACEMENT_CHARACTER
                }
            })),
            Charset::Utf16Le => self.decode_utf16(true),
            Charset::Utf16Be => self.decode_utf16(false),
        }
    }
}

impl<R: Read> Iterator for DecodedChars<R> {
    type Item = io::Result<char>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decode().transpose()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8], charset: Charset) -> String {
        DecodedChars::new(bytes, charset)
            .collect::<io::Result<String>>()
            .unwrap()
    }

    mod charset {
        use super::*;

        #[test]
        fn parses_common_labels() {
            assert_eq!("UTF-8".parse::<Charset>(), Ok(Charset::Utf8));
            assert_eq!("utf8".parse::<Charset>(), Ok(Charset::Utf8));
            assert_eq!("ISO-8859-1".parse::<Charset>(), Ok(Charset::Latin1));
            assert_eq!("latin1".parse::<Charset>(), Ok(Charset::Latin1));
            assert_eq!("US-ASCII".parse::<Charset>(), Ok(Charset::Ascii));
            assert_eq!("utf_16le".parse::<Charset>(), Ok(Charset::Utf16Le));
            assert_eq!("UTF-16BE".parse::<Charset>(), Ok(Charset::Utf16Be));
        }

        #[test]
        fn rejects_unknown_label() {
            let err = "EBCDIC".parse::<Charset>().unwrap_err();
            assert_eq!(err, CharsetError("EBCDIC".to_string()));
        }

        #[test]
        fn label_round_trips() {
            for charset in [
                Charset::Utf8,
                Charset::Latin1,
                Charset::Ascii,
                Charset::Utf16Le,
                Charset::Utf16Be,
            ] {
                assert_eq!(charset.to_string().parse::<Charset>(), Ok(charset));
            }
        }

        #[test]
        fn defaults_to_utf8() {
            assert_eq!(Charset::default(), Charset::Utf8);
        }
    }

    mod utf8 {
        use super::*;

        #[test]
        fn decodes_multibyte() {
            assert_eq!(decode("zażółć 🐢".as_bytes(), Charset::Utf8), "zażółć 🐢");
        }

        #[test]
        fn invalid_lead_byte_is_replaced() {
            assert_eq!(decode(b"a\xFFb", Charset::Utf8), "a\u{FFFD}b");
        }

        #[test]
        fn broken_sequence_keeps_following_byte() {
            // 0xC3 expects a continuation byte, 'x' is not one
            assert_eq!(decode(b"\xC3x", Charset::Utf8), "\u{FFFD}x");
        }

        #[test]
        fn truncated_tail_is_one_replacement() {
            assert_eq!(decode(b"ok\xE2\x82", Charset::Utf8), "ok\u{FFFD}");
        }

        #[test]
        fn surrogate_encoding_is_replaced() {
            assert_eq!(decode(b"\xED\xA0\x80", Charset::Utf8), "\u{FFFD}");
        }

        #[test]
        fn empty_input_yields_nothing() {
            assert_eq!(DecodedChars::new(&b""[..], Charset::Utf8).count(), 0);
        }
    }

    mod single_byte {
        use super::*;

        #[test]
        fn latin1_maps_every_byte() {
            assert_eq!(decode(b"caf\xE9", Charset::Latin1), "café");
        }

        #[test]
        fn ascii_replaces_high_bytes() {
            assert_eq!(decode(b"a\xE9\n", Charset::Ascii), "a\u{FFFD}\n");
        }
    }

    mod utf16 {
        use super::*;

        fn encode(text: &str, little_endian: bool) -> Vec<u8> {
            text.encode_utf16()
                .flat_map(|unit| {
                    if little_endian {
                        unit.to_le_bytes()
                    } else {
                        unit.to_be_bytes()
                    }
                })
                .collect()
        }

        #[test]
        fn decodes_both_byte_orders() {
            let text = "a\r\nż🐢";
            assert_eq!(decode(&encode(text, true), Charset::Utf16Le), text);
            assert_eq!(decode(&encode(text, false), Charset::Utf16Be), text);
        }

        #[test]
        fn lone_high_surrogate_keeps_next_unit() {
            let bytes = [0x00, 0xD8, 0x41, 0x00];
            assert_eq!(decode(&bytes, Charset::Utf16Le), "\u{FFFD}A");
        }

        #[test]
        fn odd_trailing_byte_is_replaced() {
            assert_eq!(decode(&[0x41, 0x00, 0x42], Charset::Utf16Le), "A\u{FFFD}");
        }
    }

    mod io_errors {
        use super::*;

        struct Flaky {
            interrupted: bool,
            data: &'static [u8],
        }

        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if !self.interrupted {
                    self.interrupted = true;
                    return Err(io::ErrorKind::Interrupted.into());
                }
                if self.data.is_empty() {
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, "gone"));
                }
                let n = self.data.len().min(buf.len());
                buf[..n].copy_from_slice(&self.data[..n]);
                self.data = &self.data[n..];
                Ok(n)
            }
        }

        #[test]
        fn interrupted_reads_are_retried_and_errors_surface() {
            let mut chars = DecodedChars::new(
                Flaky {
                    interrupted: false,
                    data: b"hi",
                },
                Charset::Utf8,
            );
            assert_eq!(chars.next().unwrap().unwrap(), 'h');
            assert_eq!(chars.next().unwrap().unwrap(), 'i');
            let err = chars.next().unwrap().unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        }
    }
}
