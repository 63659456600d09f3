#![no_main]
use libfuzzer_sys::fuzz_target;
use tinytls::{ConnectionState, Record, TlsRole};

fuzz_target!(|data: &[u8]| {
    let state = ConnectionState::new(TlsRole::Server, "fuzz");
    if let Ok(record) = Record::open(&state, data) {
        // A frame that opens in the clear re-seals to the same bytes.
        assert_eq!(record.to_bytes(), data);
    }
    if data.len() >= 2 {
        let _ = tinytls::record::decode_length(data[0], data[1]);
    }
});
