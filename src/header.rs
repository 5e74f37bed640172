//! L1: PNM/PAM image headers (spec §3, §4.1, §6).
use std::io::{self, Read, Write};

use log::debug;

use crate::error::{NetpbmError, NetpbmResult};
use crate::io_util::TokenReader;

/// Which of the five formats a header declares, and whether it's the plain
/// (ASCII) or raw (binary) encoding. PAM has no plain form.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    PbmPlain,
    PbmRaw,
    PgmPlain,
    PgmRaw,
    PpmPlain,
    PpmRaw,
    Pam,
}

impl Format {
    pub fn magic(self) -> &'static [u8; 2] {
        match self {
            Format::PbmPlain => b"P1",
            Format::PgmPlain => b"P2",
            Format::PpmPlain => b"P3",
            Format::PbmRaw => b"P4",
            Format::PgmRaw => b"P5",
            Format::PpmRaw => b"P6",
            Format::Pam => b"P7",
        }
    }

    fn from_magic(magic: [u8; 2]) -> NetpbmResult<Self> {
        match &magic {
            b"P1" => Ok(Format::PbmPlain),
            b"P2" => Ok(Format::PgmPlain),
            b"P3" => Ok(Format::PpmPlain),
            b"P4" => Ok(Format::PbmRaw),
            b"P5" => Ok(Format::PgmRaw),
            b"P6" => Ok(Format::PpmRaw),
            b"P7" => Ok(Format::Pam),
            _ => Err(NetpbmError::UnknownMagic(magic)),
        }
    }

    #[must_use]
    pub fn is_plain(self) -> bool {
        matches!(self, Format::PbmPlain | Format::PgmPlain | Format::PpmPlain)
    }

    #[must_use]
    pub fn is_pbm(self) -> bool {
        matches!(self, Format::PbmPlain | Format::PbmRaw)
    }
}

/// Conventional plane assignments (spec §3): a short ASCII label
/// identifying what each sample in a tuple means.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TupleType {
    BlackAndWhite,
    Grayscale,
    Rgb,
    BlackAndWhiteAlpha,
    GrayscaleAlpha,
    RgbAlpha,
    /// Any other `TUPLTYPE` string a PAM stream declares.
    Other(String),
}

impl TupleType {
    pub fn as_str(&self) -> &str {
        match self {
            TupleType::BlackAndWhite => "BLACKANDWHITE",
            TupleType::Grayscale => "GRAYSCALE",
            TupleType::Rgb => "RGB",
            TupleType::BlackAndWhiteAlpha => "BLACKANDWHITE_ALPHA",
            TupleType::GrayscaleAlpha => "GRAYSCALE_ALPHA",
            TupleType::RgbAlpha => "RGB_ALPHA",
            TupleType::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> TupleType {
        match s {
            "BLACKANDWHITE" => TupleType::BlackAndWhite,
            "GRAYSCALE" => TupleType::Grayscale,
            "RGB" => TupleType::Rgb,
            "BLACKANDWHITE_ALPHA" => TupleType::BlackAndWhiteAlpha,
            "GRAYSCALE_ALPHA" => TupleType::GrayscaleAlpha,
            "RGB_ALPHA" => TupleType::RgbAlpha,
            other => TupleType::Other(other.to_owned()),
        }
    }
}

/// A fully parsed and validated image header (spec §3 "Image header").
#[derive(Clone, Debug)]
pub struct Header {
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub maxval: u16,
    pub tuple_type: TupleType,
}

const MAX_DIMENSION: u32 = 0x7FFF_FFFF;

impl Header {
    /// Synthesizes the PAM-equivalent depth/tuple-type/maxval for a
    /// PBM/PGM/PPM header (spec §4.1 "Depth/tuple-type inference").
    fn infer_pam_fields(format: Format) -> (u32, TupleType, Option<u16>) {
        match format {
            Format::PbmPlain | Format::PbmRaw => (1, TupleType::BlackAndWhite, Some(1)),
            Format::PgmPlain | Format::PgmRaw => (1, TupleType::Grayscale, None),
            Format::PpmPlain | Format::PpmRaw => (3, TupleType::Rgb, None),
            Format::Pam => unreachable!("PAM declares its own depth/tuple type"),
        }
    }

    /// Reads and validates a header: magic number, dimensions, maxval
    /// (absent for PBM), depth and tuple type (PAM only), and any
    /// `#`-prefixed comment lines (spec §4.1 `readInit`).
    pub fn read<R: Read>(stream: &mut R) -> NetpbmResult<Self> {
        let mut magic = [0u8; 2];
        stream.read_exact(&mut magic)?;
        let format = Format::from_magic(magic)?;

        let mut tr = TokenReader::new(stream);

        let header = if format == Format::Pam {
            Self::read_pam_fields(&mut tr)?
        } else {
            let width = tr.next_uint("width")?;
            let height = tr.next_uint("height")?;
            let maxval = if format.is_pbm() {
                1
            } else {
                tr.next_uint("maxval")?
            };
            Self::validate_dimensions(width, height, maxval)?;
            let (depth, tuple_type, _) = Self::infer_pam_fields(format);
            Header {
                format,
                width,
                height,
                depth,
                maxval: maxval as u16,
                tuple_type,
            }
        };

        // Exactly one whitespace byte separates the header from the pixel
        // data in raw formats; plain formats will simply re-skip it as
        // leading whitespace on the first token read.
        if !format.is_plain() {
            match tr.take_pushback_or_read()? {
                Some(b) if crate::io_util::is_pnm_whitespace(b) => {}
                Some(b) => tr.push_back_byte(b),
                None => {}
            }
        }

        debug!(
            "parsed {:?} header {}x{} depth={} maxval={}",
            header.format, header.width, header.height, header.depth, header.maxval
        );
        Ok(header)
    }

    fn read_pam_fields<R: Read>(tr: &mut TokenReader<'_, R>) -> NetpbmResult<Header> {
        let mut width = None;
        let mut height = None;
        let mut depth = None;
        let mut maxval = None;
        let mut tuple_type = None;

        loop {
            let key = tr.next_token()?.ok_or(NetpbmError::MalformedHeader("unterminated PAM header"))?;
            match key.as_str() {
                "WIDTH" => width = Some(tr.next_uint("WIDTH")?),
                "HEIGHT" => height = Some(tr.next_uint("HEIGHT")?),
                "DEPTH" => depth = Some(tr.next_uint("DEPTH")?),
                "MAXVAL" => maxval = Some(tr.next_uint("MAXVAL")?),
                "TUPLTYPE" => {
                    let value = tr.next_token()?.ok_or(NetpbmError::MalformedHeader("TUPLTYPE"))?;
                    tuple_type = Some(match tuple_type.take() {
                        None => value,
                        // TUPLTYPE may repeat; spec says the pieces concatenate.
                        Some(prev) => format!("{prev} {value}"),
                    });
                }
                "ENDHDR" => break,
                _ => return Err(NetpbmError::MalformedHeader("unknown PAM header field")),
            }
        }

        let width = width.ok_or(NetpbmError::MalformedHeader("missing WIDTH"))?;
        let height = height.ok_or(NetpbmError::MalformedHeader("missing HEIGHT"))?;
        let depth = depth.ok_or(NetpbmError::MalformedHeader("missing DEPTH"))?;
        let maxval = maxval.ok_or(NetpbmError::MalformedHeader("missing MAXVAL"))?;

        Self::validate_dimensions(width, height, maxval)?;
        if depth == 0 {
            return Err(NetpbmError::InvalidDepth(depth));
        }

        Ok(Header {
            format: Format::Pam,
            width,
            height,
            depth,
            maxval: maxval as u16,
            tuple_type: tuple_type.map(|s| TupleType::parse(&s)).unwrap_or(TupleType::Other(String::new())),
        })
    }

    fn validate_dimensions(width: u32, height: u32, maxval: u32) -> NetpbmResult<()> {
        if width == 0 || width > MAX_DIMENSION {
            return Err(NetpbmError::InvalidDimensions { field: "width", value: width as i64 });
        }
        if height == 0 || height > MAX_DIMENSION {
            return Err(NetpbmError::InvalidDimensions { field: "height", value: height as i64 });
        }
        if maxval == 0 || maxval > 65535 {
            return Err(NetpbmError::InvalidDimensions { field: "maxval", value: maxval as i64 });
        }
        Ok(())
    }

    /// Emits magic, dimensions, maxval, depth, tuple type and a terminating
    /// newline (spec §4.1 `writeInit`). PBM omits maxval.
    pub fn write<W: Write>(&self, stream: &mut W) -> NetpbmResult<()> {
        stream.write_all(self.format.magic())?;
        stream.write_all(b"\n")?;

        if self.format == Format::Pam {
            write!(stream, "WIDTH {}\nHEIGHT {}\nDEPTH {}\nMAXVAL {}\n", self.width, self.height, self.depth, self.maxval)?;
            if !self.tuple_type.as_str().is_empty() {
                writeln!(stream, "TUPLTYPE {}", self.tuple_type.as_str())?;
            }
            write!(stream, "ENDHDR\n")?;
        } else {
            write!(stream, "{} {}\n", self.width, self.height)?;
            if !self.format.is_pbm() {
                write!(stream, "{}\n", self.maxval)?;
            }
        }
        Ok(())
    }

    /// Bytes per row for a packed-PBM raw row: `ceil(width / 8)`.
    #[must_use]
    pub fn packed_row_bytes(&self) -> usize {
        ((self.width as usize) + 7) / 8
    }
}

/// Peeks the stream for another image's magic number (spec §4.1
/// `nextImage`). Returns `true` once the stream has only whitespace left.
pub fn at_stream_end<R: Read>(stream: &mut R) -> io::Result<bool> {
    let mut buf = [0u8; 1];
    loop {
        match stream.read(&mut buf)? {
            0 => return Ok(true),
            _ if crate::io_util::is_pnm_whitespace(buf[0]) => continue,
            _ => return Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_raw_ppm_header() {
        let mut data: &[u8] = b"P6\n4 3\n255\n";
        let header = Header::read(&mut data).unwrap();
        assert_eq!(header.format, Format::PpmRaw);
        assert_eq!((header.width, header.height), (4, 3));
        assert_eq!(header.depth, 3);
        assert_eq!(header.maxval, 255);
        assert_eq!(header.tuple_type, TupleType::Rgb);
    }

    #[test]
    fn parses_pam_header_with_comment() {
        let mut data: &[u8] =
            b"P7\n# a comment\nWIDTH 2\nHEIGHT 2\nDEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n";
        let header = Header::read(&mut data).unwrap();
        assert_eq!(header.format, Format::Pam);
        assert_eq!(header.depth, 4);
        assert_eq!(header.tuple_type, TupleType::RgbAlpha);
    }

    #[test]
    fn rejects_zero_dimension() {
        let mut data: &[u8] = b"P5\n0 3\n255\n";
        assert!(Header::read(&mut data).is_err());
    }

    #[test]
    fn rejects_unknown_magic() {
        let mut data: &[u8] = b"XX\n1 1\n255\n";
        assert!(matches!(Header::read(&mut data), Err(NetpbmError::UnknownMagic(_))));
    }

    #[test]
    fn pbm_omits_maxval_on_write() {
        let header = Header {
            format: Format::PbmRaw,
            width: 8,
            height: 1,
            depth: 1,
            maxval: 1,
            tuple_type: TupleType::BlackAndWhite,
        };
        let mut out = Vec::new();
        header.write(&mut out).unwrap();
        assert_eq!(out, b"P4\n8 1\n");
    }

    #[test]
    fn round_trips_through_write_and_read() {
        let header = Header {
            format: Format::Pam,
            width: 3,
            height: 2,
            depth: 3,
            maxval: 255,
            tuple_type: TupleType::Rgb,
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        let parsed = Header::read(&mut &buf[..]).unwrap();
        assert_eq!(parsed.width, header.width);
        assert_eq!(parsed.height, header.height);
        assert_eq!(parsed.depth, header.depth);
        assert_eq!(parsed.tuple_type, header.tuple_type);
    }
}
