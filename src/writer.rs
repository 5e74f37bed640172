//! L1: row-at-a-time PNM/PAM writing (spec §4.1 `writeRow`/`writeRowNorm`).
use std::io::Write;

use crate::error::NetpbmResult;
use crate::header::Header;
use crate::io_util::write_sample_be;
use crate::reader::{NormRow, Row};

/// A PNM/PAM stream writer attached to an arbitrary byte stream (spec §4.1).
pub struct PnmWriter<W: Write> {
    stream: W,
}

impl<W: Write> PnmWriter<W> {
    pub fn new(stream: W) -> Self {
        PnmWriter { stream }
    }

    pub fn write_header(&mut self, header: &Header) -> NetpbmResult<()> {
        header.write(&mut self.stream)
    }

    /// Writes one row; rejects any sample exceeding `header.maxval` (spec
    /// `writeRow`).
    pub fn write_row(&mut self, header: &Header, row: &Row) -> NetpbmResult<()> {
        if header.format.is_plain() {
            return self.write_row_plain(header, row);
        }

        if header.format.is_pbm() {
            return self.write_row_packed(header, row);
        }

        for &s in &row.samples {
            write_sample_be(&mut self.stream, s, header.maxval)?;
        }
        Ok(())
    }

    /// Plain-formatted files use ASCII decimal tokens separated by single
    /// spaces, with line breaks every <=70 characters for PBM and every one
    /// tuple for PPM/PGM (spec `writeInit`).
    fn write_row_plain(&mut self, header: &Header, row: &Row) -> NetpbmResult<()> {
        if header.format.is_pbm() {
            let mut line_len = 0usize;
            for &s in &row.samples {
                let token = s.to_string();
                if line_len + token.len() + 1 > 70 && line_len > 0 {
                    self.stream.write_all(b"\n")?;
                    line_len = 0;
                } else if line_len > 0 {
                    self.stream.write_all(b" ")?;
                    line_len += 1;
                }
                self.stream.write_all(token.as_bytes())?;
                line_len += token.len();
            }
            self.stream.write_all(b"\n")?;
        } else {
            let depth = header.depth as usize;
            let width = row.samples.len() / depth.max(1);
            for x in 0..width {
                let tuple = &row.samples[x * depth..(x + 1) * depth];
                let line: Vec<String> = tuple.iter().map(u32::to_string).collect();
                writeln!(self.stream, "{}", line.join(" "))?;
            }
        }
        Ok(())
    }

    /// Packs a depth-1, maxval-1 row MSB-first into `ceil(width/8)` bytes
    /// (spec §3 "Packed row"); a set bit is black.
    fn write_row_packed(&mut self, header: &Header, row: &Row) -> NetpbmResult<()> {
        let mut packed = vec![0u8; header.packed_row_bytes()];
        for (x, &s) in row.samples.iter().enumerate() {
            if s != 0 {
                packed[x / 8] |= 0x80 >> (x % 8);
            }
        }
        self.stream.write_all(&packed)?;
        Ok(())
    }

    /// Writes a pre-packed PBM row directly, bypassing per-bit assembly.
    pub fn write_row_packed_bytes(&mut self, packed: &[u8]) -> NetpbmResult<()> {
        self.stream.write_all(packed)?;
        Ok(())
    }

    /// Writes a normalized row, clamping to `[0.0, 1.0]` before scaling by
    /// `maxval` (spec `writeRowNorm`).
    pub fn write_row_norm(&mut self, header: &Header, row: &NormRow) -> NetpbmResult<()> {
        let maxval = f64::from(header.maxval);
        let samples = row
            .samples
            .iter()
            .map(|&s| (s.clamp(0.0, 1.0) * maxval).round() as u32)
            .collect();
        self.write_row(header, &Row { samples, depth: row.depth })
    }

    pub fn into_inner(self) -> W {
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{Format, TupleType};
    use crate::reader::PnmReader;

    fn pbm_header(width: u32) -> Header {
        Header { format: Format::PbmRaw, width, height: 1, depth: 1, maxval: 1, tuple_type: TupleType::BlackAndWhite }
    }

    #[test]
    fn packs_pbm_row_msb_first() {
        let header = pbm_header(10);
        let row = Row { samples: vec![1, 1, 1, 1, 1, 1, 1, 1, 1, 1], depth: 1 };
        let mut out = Vec::new();
        let mut writer = PnmWriter::new(&mut out);
        writer.write_header(&header).unwrap();
        writer.write_row(&header, &row).unwrap();
        assert_eq!(&out[out.len() - 2..], &[0xFF, 0xC0]);
    }

    #[test]
    fn write_row_norm_round_trips_within_last_bit() {
        let header = Header { format: Format::PgmRaw, width: 3, height: 1, depth: 1, maxval: 255, tuple_type: TupleType::Grayscale };
        let norm = NormRow { samples: vec![0.0, 0.5, 1.0], depth: 1 };

        let mut buf = Vec::new();
        {
            let mut writer = PnmWriter::new(&mut buf);
            writer.write_header(&header).unwrap();
            writer.write_row_norm(&header, &norm).unwrap();
        }

        let mut reader = PnmReader::new(&buf[..]);
        let parsed_header = reader.read_header().unwrap();
        let row_norm = reader.read_row_norm(&parsed_header).unwrap();
        for (a, b) in row_norm.samples.iter().zip(&norm.samples) {
            assert!((a - b).abs() < 1.0 / 255.0);
        }
    }

    #[test]
    fn plain_ppm_writes_one_tuple_per_line() {
        let header = Header { format: Format::PpmPlain, width: 2, height: 1, depth: 3, maxval: 255, tuple_type: TupleType::Rgb };
        let row = Row { samples: vec![1, 2, 3, 4, 5, 6], depth: 3 };
        let mut out = Vec::new();
        let mut writer = PnmWriter::new(&mut out);
        writer.write_header(&header).unwrap();
        writer.write_row(&header, &row).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("1 2 3\n4 5 6\n"));
    }
}
