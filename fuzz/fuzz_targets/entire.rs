#![no_main]
use libfuzzer_sys::fuzz_target;
use netpbm_core::reader::PnmReader;

fuzz_target!(|data: &[u8]| {
    let mut reader = PnmReader::new(data);
    let Ok(header) = reader.read_header() else {
        return;
    };

    let size = header.width as usize * header.height as usize * header.depth as usize;
    if size > 5000 {
        return;
    }

    for _ in 0..header.height {
        if reader.read_row(&header).is_err() {
            break;
        }
    }
});
