#![no_main]
use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use tinytls::handshake::{codec, Handshake};
use tinytls::{ConnectionState, EngineConfig, TlsContext, TlsRole};

fn context() -> &'static TlsContext {
    static CTX: OnceLock<TlsContext> = OnceLock::new();
    CTX.get_or_init(|| TlsContext::new(EngineConfig::default()).unwrap())
}

fuzz_target!(|data: &[u8]| {
    if let Ok((_, body)) = codec::parse_handshake_header(data) {
        let _ = codec::decode_client_hello(body);
        let _ = codec::decode_server_hello(body);
        let _ = codec::decode_key_exchange(body);
    }

    // Server waiting for a ClientHello.
    let ctx = context().clone();
    let state = ConnectionState::new(TlsRole::Server, "fuzz").into_shared();
    let mut server = Handshake::new(ctx.clone(), state, TlsRole::Server);
    let _ = server.receive(data);

    // Client waiting for a ServerHello.
    let state = ConnectionState::new(TlsRole::Client, "fuzz").into_shared();
    let mut client = Handshake::new(ctx, state, TlsRole::Client);
    if client.init_new_connection().is_ok() {
        let _ = client.receive(data);
    }
});
