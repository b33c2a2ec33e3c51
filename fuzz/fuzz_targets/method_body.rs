#![no_main]

use cildecode::{
    disassembler::{decode, decode_method, encode},
    metadata::resolver::OpaqueResolver,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = decode_method(data, &OpaqueResolver);

    // Whatever decodes must encode back to the same bytes
    if let Ok(instructions) = decode(data, &OpaqueResolver) {
        let total: usize = instructions.iter().map(|i| i.size()).sum();
        assert_eq!(total, data.len());
        assert_eq!(encode(&instructions).ok().as_deref(), Some(data));
    }
});
