//! Handshake protocol state machine.
//!
//! The handshake owns the ordered queue of outbound messages and the
//! transcript. It only touches the shared [`ConnectionState`] in short
//! lock scopes so the engine can seal and open records in between.
//!
//! [`ConnectionState`]: crate::session::ConnectionState

mod client;
pub mod codec;
mod server;

use std::collections::VecDeque;

use log::{debug, info};
use subtle::ConstantTimeEq;
use tinytls_crypto::KeyExchange;

use crate::alert::{Alert, AlertDescription};
use crate::config::TlsContext;
use crate::crypt::key_schedule::{compute_verify_data, finished_label, VERIFY_DATA_SIZE};
use crate::session::{read_state, write_state, SharedState};
use crate::TlsRole;

/// Handshake message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    ClientHello = 1,
    ServerHello = 2,
    ServerKeyExchange = 12,
    ClientKeyExchange = 16,
    Finished = 20,
    /// Switches the sender's records to the negotiated protection.
    ChangeCipherSpec = 253,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::ClientHello),
            2 => Some(Self::ServerHello),
            12 => Some(Self::ServerKeyExchange),
            16 => Some(Self::ClientKeyExchange),
            20 => Some(Self::Finished),
            253 => Some(Self::ChangeCipherSpec),
            _ => None,
        }
    }
}

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Nothing sent or received yet.
    Start,
    /// Client: ClientHello sent, waiting for ServerHello.
    Negotiating,
    /// Client: waiting for ServerKeyExchange.
    /// Server: waiting for ClientKeyExchange.
    KeyExchange,
    /// Waiting for the peer's ChangeCipherSpec and Finished.
    Finishing,
    /// Both Finished messages verified.
    Finished,
    /// A fatal error occurred; only a new connection leaves this phase.
    Failed,
}

struct Outbound {
    message: Vec<u8>,
    /// Sending this message turns on protection for the next one.
    activates: bool,
}

/// Handshake driver for one side of a connection.
pub struct Handshake {
    ctx: TlsContext,
    state: SharedState,
    role: TlsRole,
    phase: HandshakePhase,
    pending: VecDeque<Outbound>,
    pending_activation: bool,
    transcript: Vec<u8>,
    key_exchange: Option<Box<dyn KeyExchange>>,
    abbreviated: bool,
}

impl Handshake {
    pub fn new(ctx: TlsContext, state: SharedState, role: TlsRole) -> Self {
        Self {
            ctx,
            state,
            role,
            phase: HandshakePhase::Start,
            pending: VecDeque::new(),
            pending_activation: false,
            transcript: Vec::new(),
            key_exchange: None,
            abbreviated: false,
        }
    }

    pub fn role(&self) -> TlsRole {
        self.role
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == HandshakePhase::Finished
    }

    /// Whether the current handshake resumed a cached session.
    pub fn is_abbreviated(&self) -> bool {
        self.abbreviated
    }

    pub fn has_more_messages(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Start over: clear the queue and transcript, reset the connection
    /// state and, on the client, queue a ClientHello.
    pub fn init_new_connection(&mut self) -> Result<(), Alert> {
        self.phase = HandshakePhase::Start;
        self.pending.clear();
        self.pending_activation = false;
        self.transcript.clear();
        self.key_exchange = None;
        self.abbreviated = false;
        write_state(&self.state)?.reset_for_new_connection();

        if self.role == TlsRole::Client {
            self.send_client_hello()?;
        }
        Ok(())
    }

    /// Pop the next outbound message.
    ///
    /// Protection for our own records switches on right after the
    /// ChangeCipherSpec has been handed out, so the ChangeCipherSpec itself
    /// travels under the old state and the message after it under the new.
    pub fn get_next_message(&mut self) -> Result<Vec<u8>, Alert> {
        if self.pending_activation {
            self.pending_activation = false;
            write_state(&self.state)?.set_change_cipher_spec(self.role, true);
        }
        let next = self.pending.pop_front().ok_or_else(|| {
            Alert::fatal(
                AlertDescription::InternalError,
                "no pending handshake message",
            )
        })?;
        if next.activates {
            self.pending_activation = true;
        }
        Ok(next.message)
    }

    /// Process one inbound handshake message. Fatal errors move the
    /// handshake to [`HandshakePhase::Failed`].
    pub fn receive(&mut self, message: &[u8]) -> Result<(), Alert> {
        if self.phase == HandshakePhase::Failed {
            return Err(Alert::fatal(
                AlertDescription::UnexpectedMessage,
                "handshake already failed",
            ));
        }
        let result = self.dispatch(message);
        if let Err(alert) = &result {
            if alert.is_fatal() {
                debug!("{:?} handshake failed: {alert}", self.role);
                self.phase = HandshakePhase::Failed;
            }
        }
        result
    }

    /// Mark the handshake failed after an error outside of it.
    pub fn fail(&mut self) {
        self.phase = HandshakePhase::Failed;
        self.pending.clear();
        self.pending_activation = false;
        self.key_exchange = None;
    }

    fn dispatch(&mut self, message: &[u8]) -> Result<(), Alert> {
        let (msg_type, body) = codec::parse_handshake_header(message)?;
        debug!(
            "{:?} received {:?} in phase {:?}",
            self.role, msg_type, self.phase
        );
        match self.role {
            TlsRole::Client => self.client_receive(msg_type, body, message),
            TlsRole::Server => self.server_receive(msg_type, body, message),
        }
    }

    /// Queue a message and add it to the transcript.
    fn enqueue(&mut self, message: Vec<u8>) {
        self.transcript.extend_from_slice(&message);
        self.pending.push_back(Outbound {
            message,
            activates: false,
        });
    }

    /// ChangeCipherSpec is not part of the transcript.
    fn enqueue_change_cipher_spec(&mut self) {
        self.pending.push_back(Outbound {
            message: codec::encode_change_cipher_spec(),
            activates: true,
        });
    }

    fn enqueue_finished(&mut self) -> Result<(), Alert> {
        let verify_data = self.verify_data(self.role)?;
        self.enqueue(codec::encode_finished(&verify_data));
        Ok(())
    }

    /// verify_data for Finished sent by `sender` over the transcript so far.
    fn verify_data(&self, sender: TlsRole) -> Result<Vec<u8>, Alert> {
        let state = read_state(&self.state)?;
        let suite = state.cipher_suite().ok_or_else(|| {
            Alert::fatal(
                AlertDescription::InternalError,
                "Finished without a cipher suite",
            )
        })?;
        Ok(compute_verify_data(
            suite.hash(),
            state.master_secret(),
            finished_label(sender),
            &self.transcript,
        )?)
    }

    /// Add a received message to the transcript.
    fn absorb(&mut self, message: &[u8]) {
        self.transcript.extend_from_slice(message);
    }

    fn unexpected(&self, msg_type: HandshakeType) -> Alert {
        Alert::fatal(
            AlertDescription::UnexpectedMessage,
            format!("{msg_type:?} not expected in phase {:?}", self.phase),
        )
    }

    fn process_change_cipher_spec(&mut self, body: &[u8]) -> Result<(), Alert> {
        codec::decode_change_cipher_spec(body)?;
        let peer = self.role.peer();
        let mut state = write_state(&self.state)?;
        if state.change_cipher_spec(peer) {
            return Err(Alert::fatal(
                AlertDescription::UnexpectedMessage,
                "duplicate ChangeCipherSpec",
            ));
        }
        state.set_change_cipher_spec(peer, true);
        Ok(())
    }

    /// Verify the peer's Finished. The side that speaks second answers
    /// with its own ChangeCipherSpec and Finished.
    fn process_finished(&mut self, body: &[u8], raw: &[u8]) -> Result<(), Alert> {
        let peer = self.role.peer();
        if !read_state(&self.state)?.change_cipher_spec(peer) {
            return Err(Alert::fatal(
                AlertDescription::UnexpectedMessage,
                "Finished before ChangeCipherSpec",
            ));
        }
        let finished = codec::decode_finished(body)?;
        let expected = self.verify_data(peer)?;
        let matches = finished.verify_data.len() == VERIFY_DATA_SIZE
            && bool::from(expected.as_slice().ct_eq(&finished.verify_data));
        if !matches {
            return Err(Alert::fatal(
                AlertDescription::HandshakeFailure,
                "Finished verify data mismatch",
            ));
        }
        self.absorb(raw);

        let answers = match self.role {
            TlsRole::Client => self.abbreviated,
            TlsRole::Server => !self.abbreviated,
        };
        if answers {
            self.enqueue_change_cipher_spec();
            self.enqueue_finished()?;
        }
        self.phase = HandshakePhase::Finished;
        info!(
            "{:?} handshake finished ({})",
            self.role,
            if self.abbreviated { "resumed" } else { "full" }
        );
        Ok(())
    }
}
