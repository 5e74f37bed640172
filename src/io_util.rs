//! L0: endian-aware fixed-width integer I/O and an unknown-length ASCII
//! token reader, shared by every higher layer.
use std::io::{Read, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{NetpbmError, NetpbmResult};

/// Reads one big-endian sample of 1 or 2 bytes depending on `maxval`.
///
/// PNM/PAM samples wider than a byte (`maxval > 255`) are always
/// transmitted big-endian, per spec §3.
pub fn read_sample_be<R: Read>(stream: &mut R, maxval: u16) -> NetpbmResult<u32> {
    if maxval > 0xFF {
        Ok(u32::from(stream.read_u16::<BigEndian>()?))
    } else {
        Ok(u32::from(stream.read_u8()?))
    }
}

/// Writes one big-endian sample of 1 or 2 bytes depending on `maxval`.
pub fn write_sample_be<W: Write>(stream: &mut W, sample: u32, maxval: u16) -> NetpbmResult<()> {
    if sample > u32::from(maxval) {
        return Err(NetpbmError::SampleOutOfRange { sample, maxval });
    }
    if maxval > 0xFF {
        stream.write_u16::<BigEndian>(sample as u16)?;
    } else {
        stream.write_u8(sample as u8)?;
    }
    Ok(())
}

/// Reads a little-endian `u16`, used throughout the URT and IPDB formats.
pub fn read_u16_le<R: Read>(stream: &mut R) -> NetpbmResult<u16> {
    Ok(stream.read_u16::<LittleEndian>()?)
}

/// Writes a little-endian `u16`.
pub fn write_u16_le<W: Write>(stream: &mut W, value: u16) -> NetpbmResult<()> {
    stream.write_u16::<LittleEndian>(value)?;
    Ok(())
}

/// A byte classified as ASCII whitespace by the plain-format grammar
/// (space, tab, CR, LF, vertical tab, form feed).
#[inline]
#[must_use]
pub fn is_pnm_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0B | 0x0C)
}

/// Reads ASCII whitespace-delimited integer tokens from a stream one byte
/// at a time, transparently skipping `#`-to-end-of-line comments.
///
/// This is the reader behind plain-format headers and plain-format sample
/// data; both allow a token to be followed by a comment before the next
/// token, and tokens may be separated by any run of whitespace including
/// embedded newlines.
pub struct TokenReader<'r, R: Read> {
    stream: &'r mut R,
    pending: Option<u8>,
}

impl<'r, R: Read> TokenReader<'r, R> {
    pub fn new(stream: &'r mut R) -> Self {
        TokenReader { stream, pending: None }
    }

    fn next_byte(&mut self) -> NetpbmResult<Option<u8>> {
        if let Some(b) = self.pending.take() {
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        match self.stream.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    fn push_back(&mut self, b: u8) {
        debug_assert!(self.pending.is_none());
        self.pending = Some(b);
    }

    /// Skips whitespace and `#` comments, returning the first byte of the
    /// next token, or `None` at end of stream.
    fn skip_to_token(&mut self) -> NetpbmResult<Option<u8>> {
        loop {
            match self.next_byte()? {
                None => return Ok(None),
                Some(b'#') => {
                    while !matches!(self.next_byte()?, None | Some(b'\n')) {}
                }
                Some(b) if is_pnm_whitespace(b) => continue,
                Some(b) => return Ok(Some(b)),
            }
        }
    }

    /// Reads the next whitespace-delimited ASCII token, without
    /// interpreting it.
    pub fn next_token(&mut self) -> NetpbmResult<Option<String>> {
        let first = match self.skip_to_token()? {
            None => return Ok(None),
            Some(b) => b,
        };
        let mut token = vec![first];
        loop {
            match self.next_byte()? {
                None => break,
                Some(b) if is_pnm_whitespace(b) => break,
                Some(b'#') => {
                    // A comment can directly abut a token with no whitespace between.
                    while !matches!(self.next_byte()?, None | Some(b'\n')) {}
                    break;
                }
                Some(b) => token.push(b),
            }
        }
        let s = String::from_utf8(token).map_err(|_| NetpbmError::MalformedHeader("non-ASCII token"))?;
        Ok(Some(s))
    }

    /// Reads the next token and parses it as an unsigned integer.
    pub fn next_uint(&mut self, field: &'static str) -> NetpbmResult<u32> {
        let token = self
            .next_token()?
            .ok_or(NetpbmError::MalformedHeader(field))?;
        token.parse::<u32>().map_err(|_| NetpbmError::MalformedHeader(field))
    }

    /// Reads exactly one byte of raw (non-token) input, used once a plain
    /// header has been fully parsed and exactly one separator byte must be
    /// consumed before the binary payload (raw formats) or the first
    /// numeric pixel token (plain formats) begins.
    pub fn take_pushback_or_read(&mut self) -> NetpbmResult<Option<u8>> {
        self.next_byte()
    }

    pub fn push_back_byte(&mut self, b: u8) {
        self.push_back(b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_skip_comments_and_whitespace() {
        let mut data: &[u8] = b"  10 # a comment\n 20\t30#trailing\n40";
        let mut tr = TokenReader::new(&mut data);
        assert_eq!(tr.next_uint("a").unwrap(), 10);
        assert_eq!(tr.next_uint("b").unwrap(), 20);
        assert_eq!(tr.next_uint("c").unwrap(), 30);
        assert_eq!(tr.next_uint("d").unwrap(), 40);
        assert!(tr.next_token().unwrap().is_none());
    }

    #[test]
    fn sample_width_depends_on_maxval() {
        let mut buf = Vec::new();
        write_sample_be(&mut buf, 200, 255).unwrap();
        assert_eq!(buf.len(), 1);
        write_sample_be(&mut buf, 1000, 65535).unwrap();
        assert_eq!(buf.len(), 3);

        let mut cursor = &buf[..];
        assert_eq!(read_sample_be(&mut cursor, 255).unwrap(), 200);
        assert_eq!(read_sample_be(&mut cursor, 65535).unwrap(), 1000);
    }

    #[test]
    fn write_sample_rejects_overflow() {
        let mut buf = Vec::new();
        assert!(matches!(
            write_sample_be(&mut buf, 300, 255),
            Err(NetpbmError::SampleOutOfRange { sample: 300, maxval: 255 })
        ));
    }
}
