//! Record layer: framing, validation and protection binding.
//!
//! Wire format: `[content_type:1][version:1][length:2]` followed by
//! `length` bytes of payload (plaintext, or ciphertext once the sender's
//! change-cipher-spec flag is set).
//!
//! The length field uses this protocol's own encoding: `(0, size)` below
//! 256 and `(ceil(size / 256), size % 256)` otherwise. It is not a
//! big-endian u16; [`decode_length`] inverts it.

mod protection;

use crate::alert::{Alert, AlertDescription};
use crate::session::ConnectionState;
use crate::TlsRole;
use tinytls_types::CompressionId;

/// Maximum size of a whole frame, header included.
pub const RECORD_SIZE: usize = 16384;

/// Size of the frame header.
pub const HEADER_SIZE: usize = 4;

/// Maximum payload size of a single frame.
pub const FRAGMENT_SIZE: usize = RECORD_SIZE - HEADER_SIZE;

/// The single supported protocol version byte.
pub const VERSION: u8 = 33;

/// Largest size the length field can encode.
pub const MAX_ENCODABLE_LENGTH: usize = 255 * 256;

/// Record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentType {
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            21 => Some(ContentType::Alert),
            22 => Some(ContentType::Handshake),
            23 => Some(ContentType::ApplicationData),
            _ => None,
        }
    }
}

/// Encode a payload size into the two length bytes.
pub fn encode_length(size: usize) -> Result<[u8; 2], Alert> {
    if size > MAX_ENCODABLE_LENGTH {
        return Err(Alert::fatal(
            AlertDescription::RecordOverflow,
            format!("length {size} cannot be encoded"),
        ));
    }
    if size < 256 {
        Ok([0, size as u8])
    } else {
        Ok([size.div_ceil(256) as u8, (size % 256) as u8])
    }
}

/// Decode the two length bytes back into a payload size.
pub fn decode_length(hi: u8, lo: u8) -> usize {
    match (hi as usize, lo as usize) {
        (0, lo) => lo,
        (hi, 0) => hi * 256,
        (hi, lo) => (hi - 1) * 256 + lo,
    }
}

/// Headroom kept below the protected limit when a compression method may
/// grow incompressible data.
pub const COMPRESSION_EXPANSION: usize = 1024;

/// Largest plaintext one record sent by `sender` can carry under `state`.
pub fn max_plaintext_len(state: &ConnectionState, sender: TlsRole) -> usize {
    match state.cipher_suite() {
        Some(suite) if state.is_protected(sender) => {
            let limit = protection::plaintext_limit(suite);
            if state.compression().id() == CompressionId::Null {
                limit
            } else {
                limit - COMPRESSION_EXPANSION
            }
        }
        _ => FRAGMENT_SIZE,
    }
}

/// One framed unit: its content type, plaintext and wire payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    content_type: ContentType,
    plaintext: Vec<u8>,
    payload: Vec<u8>,
    protected: bool,
}

impl Record {
    /// Frame `plaintext` sent by the local role of `state`.
    pub fn seal(
        state: &ConnectionState,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Self, Alert> {
        Self::seal_as(state, state.role(), content_type, plaintext)
    }

    /// Frame `plaintext` as sent by `sender`, protecting it when the
    /// sender's change-cipher-spec flag is set.
    pub fn seal_as(
        state: &ConnectionState,
        sender: TlsRole,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Self, Alert> {
        let protected = state.is_protected(sender);
        let payload = if protected {
            protection::protect(state, sender, content_type, plaintext)?
        } else {
            if plaintext.len() > FRAGMENT_SIZE {
                return Err(Alert::fatal(
                    AlertDescription::RecordOverflow,
                    format!("{} bytes exceed the {FRAGMENT_SIZE} byte fragment", plaintext.len()),
                ));
            }
            plaintext.to_vec()
        };
        Ok(Self {
            content_type,
            plaintext: plaintext.to_vec(),
            payload,
            protected,
        })
    }

    /// Parse and validate a frame received from the peer of `state`.
    pub fn open(state: &ConnectionState, bytes: &[u8]) -> Result<Self, Alert> {
        Self::open_from(state, state.role().peer(), bytes)
    }

    /// Parse and validate a frame sent by `sender`, unprotecting it when
    /// the sender's change-cipher-spec flag is set.
    ///
    /// Checks run in a fixed order and the first failure wins.
    pub fn open_from(state: &ConnectionState, sender: TlsRole, bytes: &[u8]) -> Result<Self, Alert> {
        if bytes.is_empty() {
            return Err(Alert::fatal(AlertDescription::UnexpectedMessage, "empty record"));
        }
        if bytes.len() < HEADER_SIZE || bytes[1] != VERSION {
            return Err(Alert::fatal(
                AlertDescription::ProtocolVersion,
                "short record or unsupported version",
            ));
        }
        let content_type = ContentType::from_u8(bytes[0]).ok_or_else(|| {
            Alert::fatal(
                AlertDescription::IllegalParameter,
                format!("unknown content type {}", bytes[0]),
            )
        })?;
        let body = &bytes[HEADER_SIZE..];
        match encode_length(body.len()) {
            Ok(encoded) if encoded == [bytes[2], bytes[3]] => {}
            _ => {
                return Err(Alert::fatal(
                    AlertDescription::IllegalParameter,
                    format!("length field does not match {} payload bytes", body.len()),
                ))
            }
        }
        if body.len() > FRAGMENT_SIZE {
            return Err(Alert::fatal(
                AlertDescription::RecordOverflow,
                format!("{} byte payload exceeds the fragment size", body.len()),
            ));
        }

        let protected = state.is_protected(sender);
        let plaintext = if protected {
            protection::unprotect(state, sender, content_type, body)?
        } else {
            body.to_vec()
        };
        Ok(Self {
            content_type,
            plaintext,
            payload: body.to_vec(),
            protected,
        })
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn plaintext(&self) -> &[u8] {
        &self.plaintext
    }

    pub fn into_plaintext(self) -> Vec<u8> {
        self.plaintext
    }

    /// The payload as carried on the wire.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether the payload went through record protection.
    pub fn is_protected(&self) -> bool {
        self.protected
    }

    /// Serialize header and payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        // seal_* bound the payload to FRAGMENT_SIZE, which always encodes.
        let length = encode_length(self.payload.len()).unwrap_or([0, 0]);
        let mut out = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        out.push(self.content_type as u8);
        out.push(VERSION);
        out.extend_from_slice(&length);
        out.extend_from_slice(&self.payload);
        out
    }
}
