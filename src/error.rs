//! Error taxonomy for the codec and image-processing core (see spec §7).
use std::fmt;
use std::io;

/// An error from the netpbm-core library.
///
/// Variants correspond to the rows of the error taxonomy table: malformed
/// input, unsupported features, resource exhaustion and policy limits are
/// all fatal and propagate to the caller. *Warning*-category conditions
/// (Epson stripe row counts outside {1,8,24}, an oversized CompuServe
/// input, ...) are not represented here at all; they go through `log::warn!`
/// and execution continues.
#[derive(Debug)]
#[non_exhaustive]
pub enum NetpbmError {
    /// Magic number was not one of `P1`..`P7`.
    UnknownMagic([u8; 2]),

    /// A header token was missing, non-numeric, or exceeded limits.
    MalformedHeader(&'static str),

    /// Width, height or maxval was zero (or maxval exceeded 65535).
    InvalidDimensions { field: &'static str, value: i64 },

    /// EOF was reached before a row or header field was fully read.
    ShortRead,

    /// A sample value exceeded the image's maxval.
    SampleOutOfRange { sample: u32, maxval: u16 },

    /// PAM depth 0, or a buffer's tuple length didn't match the header's depth.
    InvalidDepth(u32),

    /// A format-specific resource limit was exceeded (channel count,
    /// comment block size, attribute count, palette size, ...).
    PolicyLimit(&'static str),

    /// An RLE bitstream was truncated, had an invalid opcode, or claimed
    /// more decoded bytes than the caller requested.
    CorruptRle(&'static str),

    /// A required allocation could not be performed.
    Alloc,

    /// Wraps an underlying I/O failure.
    Io(io::Error),
}

impl fmt::Display for NetpbmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetpbmError::UnknownMagic(bytes) => {
                write!(f, "unrecognized magic number {:?}", bytes)
            }
            NetpbmError::MalformedHeader(what) => write!(f, "malformed header: {what}"),
            NetpbmError::InvalidDimensions { field, value } => {
                write!(f, "invalid {field}: {value}")
            }
            NetpbmError::ShortRead => write!(f, "unexpected end of input"),
            NetpbmError::SampleOutOfRange { sample, maxval } => {
                write!(f, "sample {sample} exceeds maxval {maxval}")
            }
            NetpbmError::InvalidDepth(depth) => write!(f, "invalid tuple depth {depth}"),
            NetpbmError::PolicyLimit(what) => write!(f, "policy limit exceeded: {what}"),
            NetpbmError::CorruptRle(what) => write!(f, "corrupt RLE stream: {what}"),
            NetpbmError::Alloc => write!(f, "allocation failed"),
            NetpbmError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for NetpbmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetpbmError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for NetpbmError {
    fn from(err: io::Error) -> NetpbmError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            NetpbmError::ShortRead
        } else {
            NetpbmError::Io(err)
        }
    }
}

pub type NetpbmResult<T> = Result<T, NetpbmError>;
