//! Server side of the handshake.

use log::debug;
use zeroize::Zeroize;

use super::client::hex;
use super::codec::{self, ServerHello};
use super::{Handshake, HandshakePhase, HandshakeType};
use crate::alert::{Alert, AlertDescription};
use crate::crypt::key_schedule::derive_master_secret;
use crate::crypt::CipherSuite;
use crate::session::{write_state, MAX_SESSION_ID_SIZE, RANDOM_SIZE};
use crate::TlsRole;

fn handshake_failure(message: impl Into<String>) -> Alert {
    Alert::fatal(AlertDescription::HandshakeFailure, message)
}

impl Handshake {
    pub(super) fn server_receive(
        &mut self,
        msg_type: HandshakeType,
        body: &[u8],
        raw: &[u8],
    ) -> Result<(), Alert> {
        match (self.phase, msg_type) {
            (HandshakePhase::Start, HandshakeType::ClientHello) => {
                self.process_client_hello(body, raw)
            }
            (HandshakePhase::KeyExchange, HandshakeType::ClientKeyExchange) => {
                self.process_client_key_exchange(body, raw)
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

    fn process_client_hello(&mut self, body: &[u8], raw: &[u8]) -> Result<(), Alert> {
        let ch = codec::decode_client_hello(body)?;
        let config = self.ctx.config();
        let enabled = config.suite_ids(self.ctx.suites());

        // First suite in registry order that is both enabled and offered.
        let suite = self
            .ctx
            .suites()
            .iter()
            .find(|s| enabled.contains(&s.id()) && ch.cipher_suites.contains(&s.id()))
            .cloned()
            .ok_or_else(|| handshake_failure("no shared cipher suite"))?;
        let compression_method = config
            .compression_methods
            .iter()
            .copied()
            .find(|c| ch.compression_methods.contains(c))
            .ok_or_else(|| handshake_failure("no shared compression method"))?;
        let compression = self
            .ctx
            .algorithms()
            .compression(compression_method)
            .ok_or_else(|| handshake_failure("compression method is not available"))?;

        let resumed = if config.session_resumption && !ch.session_id.is_empty() {
            self.find_resumable(&ch.session_id, &ch.cipher_suites, &enabled)
        } else {
            None
        };

        let mut server_random = [0u8; RANDOM_SIZE];
        self.ctx.rng().fill(&mut server_random)?;
        self.absorb(raw);

        match resumed {
            Some((suite, master_secret)) => {
                debug!("resuming session {} with {}", hex(&ch.session_id), suite.name());
                let suite_id = suite.id();
                {
                    let mut state = write_state(&self.state)?;
                    state.set_client_random(&ch.random)?;
                    state.set_server_random(&server_random)?;
                    state.set_session_id(ch.session_id.clone())?;
                    state.set_cipher_suite(suite);
                    state.set_compression(compression);
                    state.set_master_secret(master_secret)?;
                }
                self.enqueue(codec::encode_server_hello(&ServerHello {
                    random: server_random,
                    session_id: ch.session_id,
                    cipher_suite: suite_id,
                    compression_method,
                }));
                self.enqueue_change_cipher_spec();
                self.enqueue_finished()?;
                self.abbreviated = true;
                self.phase = HandshakePhase::Finishing;
            }
            None => {
                let mut session_id = vec![0u8; MAX_SESSION_ID_SIZE];
                self.ctx.rng().fill(&mut session_id)?;
                let kx = suite.key_exchange().generate(self.ctx.rng())?;
                let suite_id = suite.id();
                {
                    let mut state = write_state(&self.state)?;
                    state.set_client_random(&ch.random)?;
                    state.set_server_random(&server_random)?;
                    state.forget_session();
                    state.set_session_id(session_id.clone())?;
                    state.set_cipher_suite(suite);
                    state.set_compression(compression);
                }
                self.enqueue(codec::encode_server_hello(&ServerHello {
                    random: server_random,
                    session_id,
                    cipher_suite: suite_id,
                    compression_method,
                }));
                self.enqueue(codec::encode_key_exchange(
                    HandshakeType::ServerKeyExchange,
                    kx.public_value(),
                ));
                self.key_exchange = Some(kx);
                self.abbreviated = false;
                self.phase = HandshakePhase::KeyExchange;
            }
        }
        Ok(())
    }

    /// Look up a cached session the client asked to resume. The suite it
    /// was negotiated with must still be offered and enabled.
    ///
    /// Runs without holding our own state lock: the registry read-locks
    /// every entry it visits, ours included.
    fn find_resumable(
        &self,
        session_id: &[u8],
        offered: &[u8],
        enabled: &[u8],
    ) -> Option<(CipherSuite, Vec<u8>)> {
        let shared = self
            .ctx
            .sessions()
            .find(|s| {
                s.role() == TlsRole::Server && s.session_id() == session_id && s.is_resumable()
            })?;
        let cached = shared.read().ok()?;
        let suite = cached.cipher_suite()?;
        if !offered.contains(&suite.id()) || !enabled.contains(&suite.id()) {
            debug!("cached session {} not resumable with the offered suites", hex(session_id));
            return None;
        }
        Some((suite.clone(), cached.master_secret().to_vec()))
    }

    fn process_client_key_exchange(&mut self, body: &[u8], raw: &[u8]) -> Result<(), Alert> {
        let cke = codec::decode_key_exchange(body)?;
        let kx = self.key_exchange.take().ok_or_else(|| {
            Alert::fatal(
                AlertDescription::InternalError,
                "no pending key exchange",
            )
        })?;
        let mut pre_master_secret = kx
            .compute_shared_secret(&cke.public_value)
            .map_err(|e| handshake_failure(format!("key agreement failed: {e}")))?;
        self.absorb(raw);

        {
            let mut state = write_state(&self.state)?;
            let suite = state.cipher_suite().cloned().ok_or_else(|| {
                Alert::fatal(
                    AlertDescription::InternalError,
                    "ClientKeyExchange without a cipher suite",
                )
            })?;
            let master_secret = derive_master_secret(
                suite.hash(),
                &pre_master_secret,
                state.client_random(),
                state.server_random(),
            );
            pre_master_secret.zeroize();
            state.set_master_secret(master_secret?)?;
        }
        self.phase = HandshakePhase::Finishing;
        Ok(())
    }
}
