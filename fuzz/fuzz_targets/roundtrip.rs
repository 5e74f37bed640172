#![no_main]
use libfuzzer_sys::fuzz_target;
use netpbm_core::header::{Format, Header, TupleType};
use netpbm_core::reader::{PnmReader, Row};
use netpbm_core::writer::PnmWriter;

fuzz_target!(|data: &[u8]| {
    let Some((size, data)) = data.split_at_checked(4) else {
        return;
    };
    let width = u32::from(size[0]) * 256 + u32::from(size[1]);
    let height = u32::from(size[2]) * 256 + u32::from(size[3]);

    if width == 0 || height == 0 || (width as usize) * (height as usize) * 3 > (10 << 16) {
        return;
    }

    let pixels = pad_to_size(width as usize * height as usize * 3, data);

    let header = Header {
        format: Format::PpmRaw,
        width,
        height,
        depth: 3,
        maxval: 255,
        tuple_type: TupleType::Rgb,
    };

    let mut buf = Vec::new();
    {
        let mut writer = PnmWriter::new(&mut buf);
        if writer.write_header(&header).is_err() {
            return;
        }
        for y in 0..height {
            let off = (y as usize) * (width as usize) * 3;
            let samples: Vec<u32> = pixels[off..off + width as usize * 3].iter().map(|&b| u32::from(b)).collect();
            if writer.write_row(&header, &Row { samples, depth: 3 }).is_err() {
                return;
            }
        }
    }

    let mut reader = PnmReader::new(&buf[..]);
    let parsed = reader.read_header().unwrap();
    assert_eq!(parsed.width, width);
    assert_eq!(parsed.height, height);
    for y in 0..height {
        let row = reader.read_row(&parsed).unwrap();
        let off = (y as usize) * (width as usize) * 3;
        let expected: Vec<u32> = pixels[off..off + width as usize * 3].iter().map(|&b| u32::from(b)).collect();
        assert_eq!(row.samples, expected);
    }
});

fn pad_to_size(size: usize, data: &[u8]) -> Vec<u8> {
    let mut pixels = vec![0; size];
    let data_len = data.len().min(size);
    pixels[..data_len].copy_from_slice(&data[..data_len]);
    pixels
}
