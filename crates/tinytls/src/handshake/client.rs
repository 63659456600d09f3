//! Client side of the handshake.

use log::debug;
use zeroize::Zeroize;

use super::codec::{self, ClientHello};
use super::{Handshake, HandshakePhase, HandshakeType};
use crate::alert::{Alert, AlertDescription};
use crate::crypt::key_schedule::derive_master_secret;
use crate::session::{read_state, write_state, RANDOM_SIZE};

fn handshake_failure(message: impl Into<String>) -> Alert {
    Alert::fatal(AlertDescription::HandshakeFailure, message)
}

impl Handshake {
    /// Queue the ClientHello. A resumable session is offered by id.
    pub(super) fn send_client_hello(&mut self) -> Result<(), Alert> {
        let config = self.ctx.config();
        let mut random = [0u8; RANDOM_SIZE];
        self.ctx.rng().fill(&mut random)?;

        let session_id = {
            let mut state = write_state(&self.state)?;
            state.set_client_random(&random)?;
            if config.session_resumption && state.is_resumable() {
                state.session_id().to_vec()
            } else {
                Vec::new()
            }
        };
        if !session_id.is_empty() {
            debug!("offering session {} for resumption", hex(&session_id));
        }

        let hello = ClientHello {
            random,
            session_id,
            cipher_suites: config.suite_ids(self.ctx.suites()),
            compression_methods: config.compression_methods.clone(),
        };
        self.enqueue(codec::encode_client_hello(&hello));
        self.phase = HandshakePhase::Negotiating;
        Ok(())
    }

    pub(super) fn client_receive(
        &mut self,
        msg_type: HandshakeType,
        body: &[u8],
        raw: &[u8],
    ) -> Result<(), Alert> {
        match (self.phase, msg_type) {
            (HandshakePhase::Negotiating, HandshakeType::ServerHello) => {
                self.process_server_hello(body, raw)
            }
            (HandshakePhase::KeyExchange, HandshakeType::ServerKeyExchange) => {
                self.process_server_key_exchange(body, raw)
            }
            (HandshakePhase::Finishing, HandshakeType::ChangeCipherSpec) => {
                self.process_change_cipher_spec(body)
            }
            (HandshakePhase::Finishing, HandshakeType::Finished) => {
                self.process_finished(body, raw)
            }
            (_, msg_type) => Err(self.unexpected(msg_type)),
        }
    }

    fn process_server_hello(&mut self, body: &[u8], raw: &[u8]) -> Result<(), Alert> {
        let sh = codec::decode_server_hello(body)?;
        let config = self.ctx.config();

        if !config.suite_ids(self.ctx.suites()).contains(&sh.cipher_suite) {
            return Err(handshake_failure(format!(
                "server selected unoffered cipher suite {:#04x}",
                sh.cipher_suite
            )));
        }
        let suite = self
            .ctx
            .suites()
            .find_by_id(sh.cipher_suite)
            .cloned()
            .ok_or_else(|| handshake_failure("selected cipher suite is not registered"))?;
        if !config.compression_methods.contains(&sh.compression_method) {
            return Err(handshake_failure(format!(
                "server selected unoffered compression {}",
                sh.compression_method
            )));
        }
        let compression = self
            .ctx
            .algorithms()
            .compression(sh.compression_method)
            .ok_or_else(|| handshake_failure("selected compression is not available"))?;
        let resumption = config.session_resumption;

        self.absorb(raw);

        let mut state = write_state(&self.state)?;
        state.set_server_random(&sh.random)?;
        let resuming = resumption
            && !sh.session_id.is_empty()
            && sh.session_id == state.session_id()
            && state.is_resumable();

        if resuming {
            if state.cipher_suite().map(|s| s.id()) != Some(suite.id()) {
                return Err(handshake_failure("resumed session changed cipher suite"));
            }
            // Same master secret, fresh randoms, fresh keys.
            let master_secret = state.master_secret().to_vec();
            state.set_compression(compression);
            state.set_master_secret(master_secret)?;
            debug!("resuming session {} with {}", hex(&sh.session_id), suite.name());
            self.abbreviated = true;
            self.phase = HandshakePhase::Finishing;
        } else {
            state.forget_session();
            state.set_session_id(sh.session_id)?;
            state.set_cipher_suite(suite);
            state.set_compression(compression);
            self.abbreviated = false;
            self.phase = HandshakePhase::KeyExchange;
        }
        Ok(())
    }

    fn process_server_key_exchange(&mut self, body: &[u8], raw: &[u8]) -> Result<(), Alert> {
        let ske = codec::decode_key_exchange(body)?;
        let suite = read_state(&self.state)?
            .cipher_suite()
            .cloned()
            .ok_or_else(|| {
                Alert::fatal(
                    AlertDescription::InternalError,
                    "ServerKeyExchange without a cipher suite",
                )
            })?;
        self.absorb(raw);

        let kx = suite.key_exchange().generate(self.ctx.rng())?;
        let mut pre_master_secret = kx
            .compute_shared_secret(&ske.public_value)
            .map_err(|e| handshake_failure(format!("key agreement failed: {e}")))?;
        self.enqueue(codec::encode_key_exchange(
            HandshakeType::ClientKeyExchange,
            kx.public_value(),
        ));

        {
            let mut state = write_state(&self.state)?;
            let master_secret = derive_master_secret(
                suite.hash(),
                &pre_master_secret,
                state.client_random(),
                state.server_random(),
            );
            pre_master_secret.zeroize();
            state.set_master_secret(master_secret?)?;
        }

        self.enqueue_change_cipher_spec();
        self.enqueue_finished()?;
        self.phase = HandshakePhase::Finishing;
        Ok(())
    }
}

pub(super) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
