//! Connection engine: drives the handshake over a [`PeerChannel`] and
//! moves application data once it has finished.
//!
//! All methods take `&self`; an `Engine` can be shared between a task
//! that polls it and tasks that send through it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info, warn};
use tokio::time::{sleep, Instant};

use crate::alert::{Alert, AlertDescription};
use crate::channel::PeerChannel;
use crate::config::TlsContext;
use crate::handshake::{Handshake, HandshakePhase};
use crate::record::{self, ContentType, Record};
use crate::session::{read_state, write_state, ConnectionState, SharedState, StateKey};
use crate::TlsRole;

/// Kind of status report handed to [`Application::on_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The handshake finished; the value is the suite name.
    ActiveCipherSuite,
    /// The peer sent an alert; the value is its description.
    AlertReceived,
    /// The connection was closed; the detail carries the reason.
    ConnectionClosed,
}

/// Receiver of decrypted data and connection status.
pub trait Application: Send + Sync {
    fn on_message(&self, plaintext: &[u8]);

    fn on_status(&self, status: Status, value: &str, detail: &str);
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, Alert> {
    mutex
        .lock()
        .map_err(|_| Alert::fatal(AlertDescription::InternalError, "engine lock poisoned"))
}

/// One endpoint of a connection.
pub struct Engine {
    ctx: TlsContext,
    role: TlsRole,
    peer_id: String,
    state: SharedState,
    handshake: Mutex<Handshake>,
    channel: Mutex<Box<dyn PeerChannel>>,
    app: Arc<dyn Application>,
    closed: AtomicBool,
    suite_reported: AtomicBool,
}

impl Engine {
    /// Create an engine on `channel`. The role follows the channel. A
    /// client inherits the resumable session it last had with the same
    /// peer, and the new state is registered with the context's sessions.
    pub fn new(
        ctx: TlsContext,
        channel: impl PeerChannel + 'static,
        app: Arc<dyn Application>,
    ) -> Self {
        let role = if channel.is_client() {
            TlsRole::Client
        } else {
            TlsRole::Server
        };
        let peer_id = channel.peer_id().to_string();
        let mut state = ConnectionState::new(role, peer_id.clone());

        if role == TlsRole::Client && ctx.config().session_resumption {
            let cached = ctx.sessions().find(|s| {
                s.peer_id() == peer_id && s.role() == TlsRole::Client && s.is_resumable()
            });
            if let Some(shared) = cached {
                if let Ok(cached) = shared.read() {
                    debug!("inheriting cached session with {peer_id}");
                    state.inherit_session(&cached);
                }
            }
        }

        let state = state.into_shared();
        ctx.sessions().register(state.clone());
        let handshake = Handshake::new(ctx.clone(), state.clone(), role);
        Self {
            ctx,
            role,
            peer_id,
            state,
            handshake: Mutex::new(handshake),
            channel: Mutex::new(Box::new(channel)),
            app,
            closed: AtomicBool::new(false),
            suite_reported: AtomicBool::new(false),
        }
    }

    pub fn role(&self) -> TlsRole {
        self.role
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn context(&self) -> &TlsContext {
        &self.ctx
    }

    /// The connection state, shared with the session registry.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.handshake
            .lock()
            .map(|hs| hs.is_finished())
            .unwrap_or(false)
    }

    /// Whether the last handshake resumed a cached session.
    pub fn is_resumed(&self) -> bool {
        self.handshake
            .lock()
            .map(|hs| hs.is_abbreviated())
            .unwrap_or(false)
    }

    pub fn handshake_phase(&self) -> HandshakePhase {
        self.handshake
            .lock()
            .map(|hs| hs.phase())
            .unwrap_or(HandshakePhase::Failed)
    }

    /// Look up a registered connection state, first match wins.
    pub fn find_state(&self, key: StateKey<'_>) -> Option<SharedState> {
        self.ctx.sessions().find_state(key)
    }

    /// Run a client handshake. See [`Engine::connect_with_cancel`].
    pub async fn connect(&self) -> Result<bool, Alert> {
        self.connect_with_cancel(std::future::pending::<()>()).await
    }

    /// Run a client handshake: send a ClientHello, then poll the channel
    /// until the handshake finishes.
    ///
    /// Returns `Ok(true)` once finished. Returns `Ok(false)` when the
    /// connection closes, `max_connect_attempts` polls in a row find
    /// nothing, `connect_timeout` passes, or `cancel` resolves. Calling it on
    /// a server endpoint is an `internal_error`.
    pub async fn connect_with_cancel<F>(&self, cancel: F) -> Result<bool, Alert>
    where
        F: Future<Output = ()>,
    {
        if self.role != TlsRole::Client {
            return Err(Alert::fatal(
                AlertDescription::InternalError,
                "connect called on a server endpoint",
            ));
        }
        self.closed.store(false, Ordering::SeqCst);
        self.suite_reported.store(false, Ordering::SeqCst);
        info!("connecting to {}", self.peer_id);

        let init = lock(&self.handshake)?.init_new_connection();
        init.map_err(|alert| self.abort(alert))?;
        if let Err(alert) = self.flush_handshake() {
            self.abort(alert);
            return Ok(false);
        }

        let config = self.ctx.config();
        let deadline = Instant::now() + config.connect_timeout;
        let mut empty_polls = 0u32;
        tokio::pin!(cancel);

        loop {
            let processed = match self.poll() {
                Ok(n) => n,
                Err(alert) => {
                    debug!("connect to {} failed: {alert}", self.peer_id);
                    return Ok(false);
                }
            };
            if self.is_finished() {
                self.report_suite_if_finished()?;
                return Ok(true);
            }
            if self.is_closed() {
                return Ok(false);
            }
            if processed == 0 {
                empty_polls += 1;
                if empty_polls >= config.max_connect_attempts {
                    warn!(
                        "no answer from {} after {empty_polls} polls",
                        self.peer_id
                    );
                    return Ok(false);
                }
            }
            if Instant::now() >= deadline {
                warn!("connect to {} timed out", self.peer_id);
                return Ok(false);
            }
            tokio::select! {
                _ = &mut cancel => {
                    info!("connect to {} cancelled", self.peer_id);
                    return Ok(false);
                }
                _ = sleep(config.poll_interval) => {}
            }
        }
    }

    /// Process every record waiting on the channel. Returns how many were
    /// processed. A fatal error has already been sent to the peer and has
    /// closed the connection when it is returned.
    pub fn poll(&self) -> Result<usize, Alert> {
        let mut processed = 0;
        while !self.is_closed() {
            let record = match self.read_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(alert) => return Err(self.abort(alert)),
            };
            processed += 1;
            self.receive(record)?;
        }
        Ok(processed)
    }

    /// Handle one inbound record.
    pub fn receive(&self, record: Record) -> Result<(), Alert> {
        if self.is_closed() {
            return Err(Alert::fatal(
                AlertDescription::CloseNotify,
                "connection is closed",
            ));
        }
        debug!(
            "{:?} received {:?} record ({} bytes)",
            self.role,
            record.content_type(),
            record.plaintext().len()
        );
        match self.dispatch(record) {
            Ok(()) => Ok(()),
            Err(alert) if alert.is_fatal() => Err(self.abort(alert)),
            Err(alert) => {
                warn!("{alert}");
                Ok(())
            }
        }
    }

    /// Send application data, split into records that fit the active
    /// protection. An empty buffer goes out as one empty record.
    pub fn send(&self, data: &[u8]) -> Result<(), Alert> {
        if self.is_closed() {
            return Err(Alert::fatal(
                AlertDescription::CloseNotify,
                "connection is closed",
            ));
        }
        // Refused without closing: the handshake may still complete.
        if !self.is_finished() {
            return Err(Alert::warning(
                AlertDescription::InsufficientSecurity,
                "handshake has not finished",
            ));
        }
        let limit = record::max_plaintext_len(&*read_state(&self.state)?, self.role);
        let result = if data.is_empty() {
            self.transmit(ContentType::ApplicationData, data)
        } else {
            data.chunks(limit)
                .try_for_each(|chunk| self.transmit(ContentType::ApplicationData, chunk))
        };
        result.map_err(|alert| self.abort(alert))
    }

    /// Write an already sealed record, reconnecting once if the channel is
    /// down. The caller is responsible for having sealed it under the
    /// current sequence number. A failed write closes the connection.
    pub fn send_record(&self, record: &Record) -> Result<(), Alert> {
        if self.is_closed() {
            return Err(Alert::fatal(
                AlertDescription::CloseNotify,
                "connection is closed",
            ));
        }
        let result = lock(&self.channel)
            .and_then(|mut channel| self.write_and_advance(&mut **channel, record));
        result.map_err(|alert| self.abort(alert))
    }

    /// Send a warning close_notify and close the connection.
    pub fn close(&self) -> Result<(), Alert> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("closing connection to {}", self.peer_id);
        let notify = Alert::warning(AlertDescription::CloseNotify, "closed by application");
        let result = self.transmit(ContentType::Alert, &notify.to_bytes());
        self.app
            .on_status(Status::ConnectionClosed, &self.peer_id, "closed locally");
        result
    }

    fn dispatch(&self, record: Record) -> Result<(), Alert> {
        match record.content_type() {
            ContentType::Alert => self.receive_alert(record.plaintext()),
            ContentType::ApplicationData => {
                self.check_application_ready()?;
                self.app.on_message(record.plaintext());
                Ok(())
            }
            ContentType::Handshake => {
                lock(&self.handshake)?.receive(record.plaintext())?;
                self.flush_handshake()?;
                self.report_suite_if_finished()
            }
        }
    }

    fn receive_alert(&self, payload: &[u8]) -> Result<(), Alert> {
        let alert = Alert::from_bytes(payload)?;
        let level = alert.level.to_string();
        self.app
            .on_status(Status::AlertReceived, alert.description.as_str(), &level);

        if alert.is_fatal() || alert.description == AlertDescription::CloseNotify {
            if alert.is_fatal() {
                error!("{} sent {level} alert {}", self.peer_id, alert.description);
            } else {
                info!("{} closed the connection", self.peer_id);
            }
            self.closed.store(true, Ordering::SeqCst);
            let mut hs = lock(&self.handshake)?;
            if !hs.is_finished() {
                hs.fail();
            }
            drop(hs);
            self.app.on_status(
                Status::ConnectionClosed,
                &self.peer_id,
                alert.description.as_str(),
            );
        } else {
            warn!("{} sent {level} alert {}", self.peer_id, alert.description);
        }
        Ok(())
    }

    fn check_application_ready(&self) -> Result<(), Alert> {
        let protected = {
            let state = read_state(&self.state)?;
            state.change_cipher_spec(TlsRole::Client) && state.change_cipher_spec(TlsRole::Server)
        };
        if !protected || !lock(&self.handshake)?.is_finished() {
            return Err(Alert::fatal(
                AlertDescription::InsufficientSecurity,
                "application data before the handshake finished",
            ));
        }
        Ok(())
    }

    /// Send every queued handshake message in order.
    fn flush_handshake(&self) -> Result<(), Alert> {
        loop {
            let message = {
                let mut hs = lock(&self.handshake)?;
                if !hs.has_more_messages() {
                    return Ok(());
                }
                hs.get_next_message()?
            };
            self.transmit(ContentType::Handshake, &message)?;
        }
    }

    fn report_suite_if_finished(&self) -> Result<(), Alert> {
        if !self.is_finished() || self.suite_reported.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let name = read_state(&self.state)?
            .cipher_suite()
            .map(|suite| suite.name().to_string());
        if let Some(name) = name {
            info!("{:?} connected to {} with {name}", self.role, self.peer_id);
            self.app
                .on_status(Status::ActiveCipherSuite, &name, &self.peer_id);
        }
        Ok(())
    }

    /// Seal, write and account for one outbound record. Sealing and the
    /// sequence advance happen under the channel lock.
    fn transmit(&self, content_type: ContentType, plaintext: &[u8]) -> Result<(), Alert> {
        let mut channel = lock(&self.channel)?;
        let record = Record::seal_as(&*read_state(&self.state)?, self.role, content_type, plaintext)?;
        self.write_and_advance(&mut **channel, &record)
    }

    /// Write `record` and step our sequence number past it if protected.
    /// Callers hold the channel lock.
    fn write_and_advance(&self, channel: &mut dyn PeerChannel, record: &Record) -> Result<(), Alert> {
        write_to(channel, record)?;
        if record.is_protected() {
            write_state(&self.state)?.advance_sequence(self.role)?;
        }
        Ok(())
    }

    fn read_record(&self) -> Result<Option<Record>, Alert> {
        let mut channel = lock(&self.channel)?;
        let record = channel.read(&*read_state(&self.state)?)?;
        if let Some(record) = &record {
            if record.is_protected() {
                write_state(&self.state)?.advance_sequence(self.role.peer())?;
            }
        }
        Ok(record)
    }

    /// Report a locally raised fatal alert: send it to the peer unless the
    /// connection is already closed, then close.
    fn abort(&self, alert: Alert) -> Alert {
        error!("{:?} connection to {} failed: {alert}", self.role, self.peer_id);
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.transmit(ContentType::Alert, &alert.to_bytes()) {
                debug!("could not send alert to {}: {e}", self.peer_id);
            }
        }
        if let Ok(mut hs) = self.handshake.lock() {
            hs.fail();
        }
        self.app.on_status(
            Status::ConnectionClosed,
            &self.peer_id,
            alert.description.as_str(),
        );
        alert
    }
}

/// Write to the channel, reconnecting once when it is down.
fn write_to(channel: &mut dyn PeerChannel, record: &Record) -> Result<(), Alert> {
    if !channel.is_connected() {
        warn!("channel to {} is down, reconnecting", channel.peer_id());
        if !channel.reconnect() {
            return Err(Alert::fatal(
                AlertDescription::CloseNotify,
                format!("reconnect to {} failed", channel.peer_id()),
            ));
        }
    }
    channel.write(record).map_err(|e| {
        Alert::fatal(
            AlertDescription::InternalError,
            format!("write to {} failed: {e}", channel.peer_id()),
        )
    })
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("role", &self.role)
            .field("peer_id", &self.peer_id)
            .field("phase", &self.handshake_phase())
            .field("closed", &self.is_closed())
            .finish()
    }
}
