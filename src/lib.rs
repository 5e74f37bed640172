//! Shared codec and image-processing core for a Netpbm-style raster
//! toolkit: PNM/PAM stream I/O, legacy RLE interchange formats, a
//! median-cut color quantizer, a 2-D drawing engine, a deterministic
//! PRNG service, a perspective-correct triangle rasterizer, and
//! per-pixel image arithmetic.
extern crate byteorder;
extern crate log;

pub mod arith;
pub mod draw;
pub mod error;
pub mod header;
pub mod io_util;
pub mod quant;
pub mod rand;
pub mod raster;
pub mod reader;
pub mod rle;
pub mod tri;
pub mod writer;

pub use error::{NetpbmError, NetpbmResult};
pub use header::{Format, Header, TupleType};
pub use reader::{NormRow, PnmReader, Row};
pub use writer::PnmWriter;
