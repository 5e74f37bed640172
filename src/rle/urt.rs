//! University of Utah Raster Toolkit RLE (spec §4.2 "URT/Utah RLE", wire
//! format in spec §6 "URT RLE wire format"); instruction layout grounded
//! on `original_source/urt/rle.h`'s opcode and channel numbering.
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{NetpbmError, NetpbmResult};
use crate::io_util::{read_u16_le, write_u16_le};

const MAGIC: u16 = 0xCC52;

/// Header preceding the instruction stream (spec §6 "URT RLE wire format").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrtHeader {
    pub clear_first: bool,
    pub no_background: bool,
    pub has_alpha: bool,
    pub has_comment: bool,
    pub num_channels: u8,
    pub xmin: u16,
    pub ymin: u16,
    pub width: u16,
    pub height: u16,
    /// One entry per channel, padded to even total length on the wire.
    pub background: Vec<u8>,
    /// `(channel_count, log2_length)`; absent when there is no color map.
    pub colormap_descriptor: Option<(u8, u8)>,
    pub colormap: Vec<u16>,
    pub comment: Option<Vec<(String, String)>>,
}

impl UrtHeader {
    pub fn read<R: Read>(stream: &mut R) -> NetpbmResult<Self> {
        let magic = read_u16_le(stream)?;
        if magic != MAGIC {
            return Err(NetpbmError::CorruptRle("bad URT magic"));
        }
        let flags = stream.read_u8()?;
        let num_channels = stream.read_u8()?;
        let _pixel_bits = stream.read_u8()?; // fixed at 8 per spec
        let _reserved = stream.read_u8()?;
        let xmin = read_u16_le(stream)?;
        let ymin = read_u16_le(stream)?;
        let width = read_u16_le(stream)?;
        let height = read_u16_le(stream)?;

        let no_background = flags & 0x02 != 0;
        let mut bg_len = num_channels as usize;
        if bg_len % 2 != 0 {
            bg_len += 1;
        }
        let background = if no_background {
            Vec::new()
        } else {
            let mut buf = vec![0u8; bg_len];
            stream.read_exact(&mut buf)?;
            buf
        };

        let map_channels = stream.read_u8()?;
        let map_log2_len = stream.read_u8()?;
        let colormap_descriptor = if map_channels == 0 { None } else { Some((map_channels, map_log2_len)) };
        let colormap = if let Some((channels, log2_len)) = colormap_descriptor {
            let entries = (channels as usize) << (log2_len as usize);
            let mut map = Vec::with_capacity(entries);
            for _ in 0..entries {
                map.push(read_u16_le(stream)?);
            }
            map
        } else {
            Vec::new()
        };

        let has_comment = flags & 0x08 != 0;
        let comment = if has_comment {
            let len = read_u16_le(stream)? as usize;
            let mut buf = vec![0u8; len];
            stream.read_exact(&mut buf)?;
            Some(parse_comment_block(&buf)?)
        } else {
            None
        };

        Ok(UrtHeader {
            clear_first: flags & 0x01 != 0,
            no_background,
            has_alpha: flags & 0x04 != 0,
            has_comment,
            num_channels,
            xmin,
            ymin,
            width,
            height,
            background,
            colormap_descriptor,
            colormap,
            comment,
        })
    }

    pub fn write<W: Write>(&self, stream: &mut W) -> NetpbmResult<()> {
        write_u16_le(stream, MAGIC)?;
        let mut flags = 0u8;
        if self.clear_first {
            flags |= 0x01;
        }
        if self.no_background {
            flags |= 0x02;
        }
        if self.has_alpha {
            flags |= 0x04;
        }
        if self.has_comment {
            flags |= 0x08;
        }
        stream.write_u8(flags)?;
        stream.write_u8(self.num_channels)?;
        stream.write_u8(8)?;
        stream.write_u8(0)?;
        write_u16_le(stream, self.xmin)?;
        write_u16_le(stream, self.ymin)?;
        write_u16_le(stream, self.width)?;
        write_u16_le(stream, self.height)?;

        if !self.no_background {
            stream.write_all(&self.background)?;
        }

        if let Some((channels, log2_len)) = self.colormap_descriptor {
            stream.write_u8(channels)?;
            stream.write_u8(log2_len)?;
            for &entry in &self.colormap {
                write_u16_le(stream, entry)?;
            }
        } else {
            stream.write_u8(0)?;
            stream.write_u8(0)?;
        }

        if let Some(comment) = &self.comment {
            let block = encode_comment_block(comment);
            write_u16_le(stream, block.len() as u16)?;
            stream.write_all(&block)?;
        }

        Ok(())
    }
}

fn parse_comment_block(buf: &[u8]) -> NetpbmResult<Vec<(String, String)>> {
    let mut out = Vec::new();
    for chunk in buf.split(|&b| b == 0) {
        if chunk.is_empty() {
            continue;
        }
        let text = std::str::from_utf8(chunk).map_err(|_| NetpbmError::CorruptRle("non-UTF8 comment"))?;
        match text.split_once('=') {
            Some((k, v)) => out.push((k.to_string(), v.to_string())),
            None => out.push((text.to_string(), String::new())),
        }
    }
    Ok(out)
}

fn encode_comment_block(comments: &[(String, String)]) -> Vec<u8> {
    let mut block = Vec::new();
    for (k, v) in comments {
        block.extend_from_slice(k.as_bytes());
        block.push(b'=');
        block.extend_from_slice(v.as_bytes());
        block.push(0);
    }
    if block.len() % 2 != 0 {
        block.push(0);
    }
    block
}

/// A color channel selector for `SetColorOp` (spec: "0=R, 1=G, 2=B,
/// 255=alpha").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Alpha,
}

impl Channel {
    fn from_byte(b: u8) -> NetpbmResult<Self> {
        match b {
            0 => Ok(Channel::Red),
            1 => Ok(Channel::Green),
            2 => Ok(Channel::Blue),
            255 => Ok(Channel::Alpha),
            _ => Err(NetpbmError::CorruptRle("unknown URT channel selector")),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
            Channel::Alpha => 255,
        }
    }
}

/// One decoded URT instruction (spec: SkipLinesOp/SetColorOp/SkipPixelsOp/
/// ByteDataOp/RunDataOp/EOFOp).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    SkipLines(u16),
    SetColor(Channel),
    SkipPixels(u16),
    ByteData(Vec<u8>),
    RunData { count: u16, value: u8 },
    Eof,
}

const OP_SKIP_LINES: u8 = 1;
const OP_SET_COLOR: u8 = 2;
const OP_SKIP_PIXELS: u8 = 3;
const OP_BYTE_DATA: u8 = 5;
const OP_RUN_DATA: u8 = 6;
const OP_EOF: u8 = 7;
const LONG_FLAG: u8 = 0x80;

/// Reads the next instruction from an instruction-stream cursor.
pub fn read_instruction<R: Read>(stream: &mut R) -> NetpbmResult<Instruction> {
    let opcode_byte = stream.read_u8()?;
    let datum_byte = stream.read_u8()?;
    let opcode = opcode_byte & !LONG_FLAG;
    let datum = if opcode_byte & LONG_FLAG != 0 {
        let _ = datum_byte; // the low byte slot is unused in LONG form
        read_u16_le(stream)?
    } else {
        u16::from(datum_byte)
    };

    match opcode {
        OP_SKIP_LINES => Ok(Instruction::SkipLines(datum)),
        OP_SET_COLOR => Channel::from_byte(datum as u8).map(Instruction::SetColor),
        OP_SKIP_PIXELS => Ok(Instruction::SkipPixels(datum)),
        OP_BYTE_DATA => {
            let len = datum as usize + 1;
            let padded = len + (len % 2);
            let mut buf = vec![0u8; padded];
            stream.read_exact(&mut buf)?;
            buf.truncate(len);
            Ok(Instruction::ByteData(buf))
        }
        OP_RUN_DATA => {
            let value = stream.read_u16::<LittleEndian>()? as u8;
            Ok(Instruction::RunData { count: datum + 1, value })
        }
        OP_EOF => Ok(Instruction::Eof),
        _ => Err(NetpbmError::CorruptRle("unknown URT opcode")),
    }
}

/// Writes one instruction, choosing the LONG form when the datum doesn't
/// fit in a byte.
pub fn write_instruction<W: Write>(stream: &mut W, instr: &Instruction) -> NetpbmResult<()> {
    match instr {
        Instruction::SkipLines(n) => write_simple(stream, OP_SKIP_LINES, *n),
        Instruction::SetColor(ch) => write_simple(stream, OP_SET_COLOR, u16::from(ch.to_byte())),
        Instruction::SkipPixels(n) => write_simple(stream, OP_SKIP_PIXELS, *n),
        Instruction::ByteData(bytes) => {
            let len = bytes.len();
            write_simple(stream, OP_BYTE_DATA, (len - 1) as u16)?;
            stream.write_all(bytes)?;
            if len % 2 != 0 {
                stream.write_u8(0)?;
            }
            Ok(())
        }
        Instruction::RunData { count, value } => {
            write_simple(stream, OP_RUN_DATA, count - 1)?;
            stream.write_u16::<LittleEndian>(u16::from(*value))?;
            Ok(())
        }
        Instruction::Eof => write_simple(stream, OP_EOF, 0),
    }
}

fn write_simple<W: Write>(stream: &mut W, opcode: u8, datum: u16) -> NetpbmResult<()> {
    if datum <= 0xFF {
        stream.write_u8(opcode)?;
        stream.write_u8(datum as u8)?;
    } else {
        stream.write_u8(opcode | LONG_FLAG)?;
        stream.write_u8(0)?;
        write_u16_le(stream, datum)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_without_comment_or_colormap() {
        let header = UrtHeader {
            clear_first: true,
            no_background: false,
            has_alpha: false,
            has_comment: false,
            num_channels: 3,
            xmin: 0,
            ymin: 0,
            width: 3,
            height: 3,
            background: vec![0, 0, 0, 0],
            colormap_descriptor: None,
            colormap: Vec::new(),
            comment: None,
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        let parsed = UrtHeader::read(&mut &buf[..]).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn header_round_trips_with_comment() {
        let header = UrtHeader {
            clear_first: false,
            no_background: true,
            has_alpha: false,
            has_comment: true,
            num_channels: 1,
            xmin: 0,
            ymin: 0,
            width: 1,
            height: 1,
            background: Vec::new(),
            colormap_descriptor: None,
            colormap: Vec::new(),
            comment: Some(vec![("HISTORY".to_string(), "netpbm-core".to_string())]),
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        let parsed = UrtHeader::read(&mut &buf[..]).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn byte_data_instruction_round_trips_with_odd_length_padding() {
        let instr = Instruction::ByteData(vec![1, 2, 3]);
        let mut buf = Vec::new();
        write_instruction(&mut buf, &instr).unwrap();
        assert_eq!(buf.len() % 2, 0);
        let parsed = read_instruction(&mut &buf[..]).unwrap();
        assert_eq!(parsed, instr);
    }

    #[test]
    fn run_data_instruction_round_trips() {
        let instr = Instruction::RunData { count: 40, value: 0x7F };
        let mut buf = Vec::new();
        write_instruction(&mut buf, &instr).unwrap();
        let parsed = read_instruction(&mut &buf[..]).unwrap();
        assert_eq!(parsed, instr);
    }

    #[test]
    fn long_form_is_used_when_datum_exceeds_one_byte() {
        let instr = Instruction::SkipPixels(1000);
        let mut buf = Vec::new();
        write_instruction(&mut buf, &instr).unwrap();
        assert_eq!(buf[0] & LONG_FLAG, LONG_FLAG);
        let parsed = read_instruction(&mut &buf[..]).unwrap();
        assert_eq!(parsed, instr);
    }

    /// A uniform 3x3 image encoded as a single color's run across every
    /// row and decoded back is pixel-identical (spec §8 scenario 3).
    #[test]
    fn uniform_image_round_trips_through_instruction_stream() {
        let pixel = (17u8, 0u8, 0u8);
        let mut program = Vec::new();
        for _ in 0..3 {
            program.push(Instruction::SetColor(Channel::Red));
            program.push(Instruction::RunData { count: 3, value: pixel.0 });
            program.push(Instruction::SetColor(Channel::Green));
            program.push(Instruction::RunData { count: 3, value: pixel.1 });
            program.push(Instruction::SetColor(Channel::Blue));
            program.push(Instruction::RunData { count: 3, value: pixel.2 });
        }
        program.push(Instruction::Eof);

        let mut buf = Vec::new();
        for instr in &program {
            write_instruction(&mut buf, instr).unwrap();
        }

        let mut cursor = &buf[..];
        let mut decoded = Vec::new();
        loop {
            let instr = read_instruction(&mut cursor).unwrap();
            let done = instr == Instruction::Eof;
            decoded.push(instr);
            if done {
                break;
            }
        }
        assert_eq!(decoded, program);
    }
}
