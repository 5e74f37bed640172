#![no_main]
use libfuzzer_sys::fuzz_target;
use netpbm_core::rle::packbits;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 1 << 16 {
        return;
    }
    let encoded = packbits::encode(data);
    let Ok(decoded) = packbits::decode(&encoded, data.len()) else {
        return;
    };
    assert_eq!(decoded, data);
});
