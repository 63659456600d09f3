//! Transport seam between the engine and the peer.
//!
//! A channel moves whole record frames. Reading also opens the frame, so
//! the channel is handed the connection state to unprotect with.

mod memory;

pub use memory::{ChannelControl, MemoryChannel};

use std::io;

use crate::alert::Alert;
use crate::record::Record;
use crate::session::ConnectionState;

/// A bidirectional record transport to one peer.
pub trait PeerChannel: Send {
    /// Whether this end acts as the client.
    fn is_client(&self) -> bool;

    fn is_connected(&self) -> bool;

    /// Try to re-establish the transport. Returns whether it succeeded.
    fn reconnect(&mut self) -> bool;

    /// Read and open the next inbound record, if one is waiting.
    fn read(&mut self, state: &ConnectionState) -> Result<Option<Record>, Alert>;

    /// Write one sealed record.
    fn write(&mut self, record: &Record) -> io::Result<()>;

    /// Stable identifier of the remote peer, used to find cached sessions.
    fn peer_id(&self) -> &str;
}
