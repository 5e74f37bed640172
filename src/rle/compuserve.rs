//! CompuServe RLE (spec §4.2 "CompuServe RLE", wire format in spec §6):
//! every coded byte is printable ASCII, runs alternate implicitly between
//! background and foreground starting from background.
use std::io::{Read, Write};

use byteorder::ReadBytesExt;
use log::warn;

use crate::error::{NetpbmError, NetpbmResult};

const RUN_BASE: u8 = 0x20;
const MAX_SHORT_RUN: usize = 0x5E;

/// `M` selects 128x96, `H` selects 256x192 (spec §6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Standard,
    High,
}

impl Resolution {
    pub fn dimensions(self) -> (u16, u16) {
        match self {
            Resolution::Standard => (128, 96),
            Resolution::High => (256, 192),
        }
    }

    fn marker(self) -> u8 {
        match self {
            Resolution::Standard => b'M',
            Resolution::High => b'H',
        }
    }

    fn from_marker(b: u8) -> NetpbmResult<Self> {
        match b {
            b'M' => Ok(Resolution::Standard),
            b'H' => Ok(Resolution::High),
            _ => Err(NetpbmError::CorruptRle("unknown CompuServe resolution marker")),
        }
    }
}

/// Reads the leading `ESC G [MH]` magic and the trailing `ESC G N`
/// terminator around a CompuServe coded body.
pub fn read_framed<R: Read>(stream: &mut R) -> NetpbmResult<(Resolution, Vec<u8>)> {
    let mut magic = [0u8; 3];
    stream.read_exact(&mut magic)?;
    if magic[0] != 0x1B || magic[1] != b'G' {
        return Err(NetpbmError::CorruptRle("expected ESC G CompuServe magic"));
    }
    let resolution = Resolution::from_marker(magic[2])?;
    let (width, height) = resolution.dimensions();
    if u32::from(width) * u32::from(height) > 256 * 192 {
        warn!("CompuServe input exceeds the documented 256x192 bound");
    }

    let mut body = Vec::new();
    let mut byte = [0u8; 1];
    let mut trailer = Vec::new();
    loop {
        if stream.read(&mut byte)? == 0 {
            return Err(NetpbmError::CorruptRle("unterminated CompuServe stream"));
        }
        trailer.push(byte[0]);
        if trailer.len() > 3 {
            body.push(trailer.remove(0));
        }
        if trailer == [0x1B, b'G', b'N'] {
            break;
        }
    }
    Ok((resolution, body))
}

pub fn write_framed<W: Write>(stream: &mut W, resolution: Resolution, body: &[u8]) -> NetpbmResult<()> {
    stream.write_all(&[0x1B, b'G', resolution.marker()])?;
    stream.write_all(body)?;
    stream.write_all(&[0x1B, b'G', b'N'])?;
    Ok(())
}

/// Decodes a coded body into alternating background/foreground runs,
/// starting with background (spec: "the decoder seeds state with
/// background").
pub fn decode(coded: &[u8], background: u8, foreground: u8) -> NetpbmResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut cursor = coded;
    let mut on_background = true;
    while !cursor.is_empty() {
        let c = cursor.read_u8()?;
        if !(RUN_BASE..=0x7E).contains(&c) {
            return Err(NetpbmError::CorruptRle("non-printable byte in CompuServe stream"));
        }
        let run = usize::from(c - RUN_BASE);
        let value = if on_background { background } else { foreground };
        out.extend(std::iter::repeat(value).take(run));
        on_background = !on_background;
    }
    Ok(out)
}

/// Encodes alternating background/foreground runs as printable ASCII,
/// splitting any run longer than `MAX_SHORT_RUN - 1`.
pub fn encode(runs: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    for &run in runs {
        let mut remaining = run;
        while remaining >= MAX_SHORT_RUN {
            out.push(RUN_BASE + (MAX_SHORT_RUN - 1) as u8);
            remaining -= MAX_SHORT_RUN - 1;
        }
        out.push(RUN_BASE + remaining as u8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_alternates_background_and_foreground() {
        let coded = [RUN_BASE + 3, RUN_BASE + 2, RUN_BASE + 1];
        let decoded = decode(&coded, 0, 255).unwrap();
        assert_eq!(decoded, vec![0, 0, 0, 255, 255, 0]);
    }

    #[test]
    fn encode_splits_long_runs() {
        let runs = [200usize];
        let coded = encode(&runs);
        let decoded_lengths: Vec<usize> = coded.iter().map(|&b| usize::from(b - RUN_BASE)).collect();
        assert_eq!(decoded_lengths.iter().sum::<usize>(), 200);
        assert!(decoded_lengths.iter().all(|&n| n < MAX_SHORT_RUN));
    }

    #[test]
    fn framed_round_trip_preserves_body_and_resolution() {
        let body = encode(&[10, 5, 3]);
        let mut buf = Vec::new();
        write_framed(&mut buf, Resolution::Standard, &body).unwrap();
        let (resolution, parsed_body) = read_framed(&mut &buf[..]).unwrap();
        assert_eq!(resolution, Resolution::Standard);
        assert_eq!(parsed_body, body);
    }

    #[test]
    fn rejects_non_printable_byte() {
        let coded = [0x05u8];
        assert!(decode(&coded, 0, 255).is_err());
    }
}
