//! In-process channel pair backed by shared frame queues.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, trace};

use super::PeerChannel;
use crate::alert::Alert;
use crate::record::Record;
use crate::session::ConnectionState;

type FrameQueue = Arc<Mutex<VecDeque<Vec<u8>>>>;

#[derive(Debug, Default)]
struct Link {
    connected: AtomicBool,
    refuse_reconnect: AtomicBool,
    reconnects: AtomicUsize,
}

/// One end of an in-memory connection.
pub struct MemoryChannel {
    client: bool,
    peer_id: String,
    inbound: FrameQueue,
    outbound: FrameQueue,
    link: Arc<Link>,
}

/// Test handle for poking at a [`MemoryChannel`] from outside the engine.
#[derive(Clone)]
pub struct ChannelControl {
    inbound: FrameQueue,
    outbound: FrameQueue,
    link: Arc<Link>,
}

fn lock(queue: &FrameQueue) -> std::sync::MutexGuard<'_, VecDeque<Vec<u8>>> {
    // A panicked holder cannot leave a frame half-pushed.
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryChannel {
    /// Create a connected client/server pair. Each end is labeled with the
    /// id of the peer it talks to.
    pub fn pair(client_peer_id: &str, server_peer_id: &str) -> (Self, Self) {
        let to_server = FrameQueue::default();
        let to_client = FrameQueue::default();
        let link = Arc::new(Link::default());
        link.connected.store(true, Ordering::SeqCst);

        let client = Self {
            client: true,
            peer_id: client_peer_id.to_string(),
            inbound: to_client.clone(),
            outbound: to_server.clone(),
            link: link.clone(),
        };
        let server = Self {
            client: false,
            peer_id: server_peer_id.to_string(),
            inbound: to_server,
            outbound: to_client,
            link,
        };
        (client, server)
    }

    pub fn control(&self) -> ChannelControl {
        ChannelControl {
            inbound: self.inbound.clone(),
            outbound: self.outbound.clone(),
            link: self.link.clone(),
        }
    }
}

impl PeerChannel for MemoryChannel {
    fn is_client(&self) -> bool {
        self.client
    }

    fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }

    fn reconnect(&mut self) -> bool {
        if self.link.refuse_reconnect.load(Ordering::SeqCst) {
            debug!("reconnect to {} refused", self.peer_id);
            return false;
        }
        self.link.reconnects.fetch_add(1, Ordering::SeqCst);
        self.link.connected.store(true, Ordering::SeqCst);
        debug!("reconnected to {}", self.peer_id);
        true
    }

    fn read(&mut self, state: &ConnectionState) -> Result<Option<Record>, Alert> {
        let frame = lock(&self.inbound).pop_front();
        match frame {
            Some(bytes) => {
                trace!("read {} byte frame from {}", bytes.len(), self.peer_id);
                Record::open(state, &bytes).map(Some)
            }
            None => Ok(None),
        }
    }

    fn write(&mut self, record: &Record) -> io::Result<()> {
        if !self.is_connected() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("channel to {} is down", self.peer_id),
            ));
        }
        let bytes = record.to_bytes();
        trace!("write {} byte frame to {}", bytes.len(), self.peer_id);
        lock(&self.outbound).push_back(bytes);
        Ok(())
    }

    fn peer_id(&self) -> &str {
        &self.peer_id
    }
}

impl ChannelControl {
    /// Drop the link. Both ends see it.
    pub fn disconnect(&self) {
        self.link.connected.store(false, Ordering::SeqCst);
    }

    pub fn refuse_reconnect(&self, refuse: bool) {
        self.link.refuse_reconnect.store(refuse, Ordering::SeqCst);
    }

    /// Number of successful reconnects on the link.
    pub fn reconnects(&self) -> usize {
        self.link.reconnects.load(Ordering::SeqCst)
    }

    /// Queue raw bytes for this end to read next.
    pub fn inject(&self, frame: Vec<u8>) {
        lock(&self.inbound).push_back(frame);
    }

    /// Remove and return every frame this end has written that the peer
    /// has not read yet.
    pub fn outbound_frames(&self) -> Vec<Vec<u8>> {
        lock(&self.outbound).drain(..).collect()
    }

    /// Frames this end has written that the peer has not read yet.
    pub fn pending_outbound(&self) -> usize {
        lock(&self.outbound).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ContentType;
    use crate::TlsRole;

    fn plain_state(role: TlsRole) -> ConnectionState {
        ConnectionState::new(role, "test")
    }

    #[test]
    fn test_pair_roles_and_ids() {
        let (client, server) = MemoryChannel::pair("server-1", "client-1");
        assert!(client.is_client());
        assert!(!server.is_client());
        assert_eq!(client.peer_id(), "server-1");
        assert_eq!(server.peer_id(), "client-1");
        assert!(client.is_connected() && server.is_connected());
    }

    #[test]
    fn test_write_then_read() {
        let (mut client, mut server) = MemoryChannel::pair("s", "c");
        let state = plain_state(TlsRole::Client);
        let record = Record::seal(&state, ContentType::ApplicationData, b"hello").unwrap();
        client.write(&record).unwrap();

        let server_state = plain_state(TlsRole::Server);
        let got = server.read(&server_state).unwrap().unwrap();
        assert_eq!(got.plaintext(), b"hello");
        assert_eq!(got.content_type(), ContentType::ApplicationData);
        assert!(server.read(&server_state).unwrap().is_none());
        // Nothing flows back to the writer.
        assert!(client.read(&state).unwrap().is_none());
    }

    #[test]
    fn test_disconnect_and_reconnect() {
        let (mut client, server) = MemoryChannel::pair("s", "c");
        let control = server.control();
        let state = plain_state(TlsRole::Client);
        let record = Record::seal(&state, ContentType::ApplicationData, b"x").unwrap();

        control.disconnect();
        assert!(!client.is_connected());
        let err = client.write(&record).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        control.refuse_reconnect(true);
        assert!(!client.reconnect());
        assert_eq!(control.reconnects(), 0);

        control.refuse_reconnect(false);
        assert!(client.reconnect());
        assert_eq!(control.reconnects(), 1);
        client.write(&record).unwrap();
        assert_eq!(client.control().pending_outbound(), 1);
    }

    #[test]
    fn test_inject_malformed_frame() {
        let (_client, mut server) = MemoryChannel::pair("s", "c");
        server.control().inject(vec![23, 99, 0, 0]);
        let err = server.read(&plain_state(TlsRole::Server)).unwrap_err();
        assert_eq!(err.description, crate::alert::AlertDescription::ProtocolVersion);
    }

    #[test]
    fn test_outbound_frames_drains() {
        let (mut client, _server) = MemoryChannel::pair("s", "c");
        let state = plain_state(TlsRole::Client);
        for msg in [&b"a"[..], b"b"] {
            let record = Record::seal(&state, ContentType::ApplicationData, msg).unwrap();
            client.write(&record).unwrap();
        }
        let control = client.control();
        let frames = control.outbound_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], vec![23, 33, 0, 1, b'a']);
        assert_eq!(control.pending_outbound(), 0);
    }
}
