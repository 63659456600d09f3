//! Handshake message encoding/decoding.
//!
//! Every message is `type(1) || length(3, big-endian) || body` and travels
//! alone in one handshake record. Malformed bodies are content errors and
//! raise `handshake_failure`.

use super::HandshakeType;
use crate::alert::{Alert, AlertDescription};
use crate::session::{MAX_SESSION_ID_SIZE, RANDOM_SIZE};

/// ClientHello message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub random: [u8; RANDOM_SIZE],
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<u8>,
    pub compression_methods: Vec<u8>,
}

/// ServerHello message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub random: [u8; RANDOM_SIZE],
    pub session_id: Vec<u8>,
    pub cipher_suite: u8,
    pub compression_method: u8,
}

/// ServerKeyExchange / ClientKeyExchange body: the sender's ephemeral
/// public value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExchangeMsg {
    pub public_value: Vec<u8>,
}

/// Finished message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: Vec<u8>,
}

fn malformed(what: &str) -> Alert {
    Alert::fatal(
        AlertDescription::HandshakeFailure,
        format!("malformed {what}"),
    )
}

/// Byte cursor over a message body.
struct Reader<'a> {
    data: &'a [u8],
    what: &'static str,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], what: &'static str) -> Self {
        Self { data, what }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Alert> {
        if self.data.len() < n {
            return Err(malformed(self.what));
        }
        let (head, rest) = self.data.split_at(n);
        self.data = rest;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, Alert> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, Alert> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn vec_u8(&mut self) -> Result<Vec<u8>, Alert> {
        let len = self.u8()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn random(&mut self) -> Result<[u8; RANDOM_SIZE], Alert> {
        let mut random = [0u8; RANDOM_SIZE];
        random.copy_from_slice(self.take(RANDOM_SIZE)?);
        Ok(random)
    }

    fn session_id(&mut self) -> Result<Vec<u8>, Alert> {
        let sid = self.vec_u8()?;
        if sid.len() > MAX_SESSION_ID_SIZE {
            return Err(malformed(self.what));
        }
        Ok(sid)
    }

    fn finish(self) -> Result<(), Alert> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(malformed(self.what))
        }
    }
}

/// Wrap a body with the handshake header.
pub fn wrap_handshake(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    let len = body.len() as u32;
    let mut out = Vec::with_capacity(4 + body.len());
    out.push(msg_type as u8);
    out.extend_from_slice(&len.to_be_bytes()[1..]);
    out.extend_from_slice(body);
    out
}

/// Split one handshake message into its type and body.
pub fn parse_handshake_header(data: &[u8]) -> Result<(HandshakeType, &[u8]), Alert> {
    if data.len() < 4 {
        return Err(malformed("handshake header"));
    }
    let msg_type = HandshakeType::from_u8(data[0]).ok_or_else(|| {
        Alert::fatal(
            AlertDescription::UnexpectedMessage,
            format!("unknown handshake type {}", data[0]),
        )
    })?;
    let length = ((data[1] as usize) << 16) | ((data[2] as usize) << 8) | (data[3] as usize);
    if data.len() != 4 + length {
        return Err(malformed("handshake length"));
    }
    Ok((msg_type, &data[4..]))
}

pub fn encode_client_hello(ch: &ClientHello) -> Vec<u8> {
    let mut body = Vec::with_capacity(64 + ch.cipher_suites.len());
    body.extend_from_slice(&ch.random);
    body.push(ch.session_id.len() as u8);
    body.extend_from_slice(&ch.session_id);
    body.push(ch.cipher_suites.len() as u8);
    body.extend_from_slice(&ch.cipher_suites);
    body.push(ch.compression_methods.len() as u8);
    body.extend_from_slice(&ch.compression_methods);
    wrap_handshake(HandshakeType::ClientHello, &body)
}

pub fn decode_client_hello(body: &[u8]) -> Result<ClientHello, Alert> {
    let mut r = Reader::new(body, "ClientHello");
    let random = r.random()?;
    let session_id = r.session_id()?;
    let cipher_suites = r.vec_u8()?;
    let compression_methods = r.vec_u8()?;
    r.finish()?;
    if cipher_suites.is_empty() || compression_methods.is_empty() {
        return Err(malformed("ClientHello"));
    }
    Ok(ClientHello {
        random,
        session_id,
        cipher_suites,
        compression_methods,
    })
}

pub fn encode_server_hello(sh: &ServerHello) -> Vec<u8> {
    let mut body = Vec::with_capacity(36 + sh.session_id.len());
    body.extend_from_slice(&sh.random);
    body.push(sh.session_id.len() as u8);
    body.extend_from_slice(&sh.session_id);
    body.push(sh.cipher_suite);
    body.push(sh.compression_method);
    wrap_handshake(HandshakeType::ServerHello, &body)
}

pub fn decode_server_hello(body: &[u8]) -> Result<ServerHello, Alert> {
    let mut r = Reader::new(body, "ServerHello");
    let random = r.random()?;
    let session_id = r.session_id()?;
    let cipher_suite = r.u8()?;
    let compression_method = r.u8()?;
    r.finish()?;
    Ok(ServerHello {
        random,
        session_id,
        cipher_suite,
        compression_method,
    })
}

/// Encode a ServerKeyExchange or ClientKeyExchange.
pub fn encode_key_exchange(msg_type: HandshakeType, public_value: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + public_value.len());
    body.extend_from_slice(&(public_value.len() as u16).to_be_bytes());
    body.extend_from_slice(public_value);
    wrap_handshake(msg_type, &body)
}

pub fn decode_key_exchange(body: &[u8]) -> Result<KeyExchangeMsg, Alert> {
    let mut r = Reader::new(body, "key exchange");
    let len = r.u16()? as usize;
    let public_value = r.take(len)?.to_vec();
    r.finish()?;
    if public_value.is_empty() {
        return Err(malformed("key exchange"));
    }
    Ok(KeyExchangeMsg { public_value })
}

pub fn encode_change_cipher_spec() -> Vec<u8> {
    wrap_handshake(HandshakeType::ChangeCipherSpec, &[])
}

pub fn decode_change_cipher_spec(body: &[u8]) -> Result<(), Alert> {
    Reader::new(body, "ChangeCipherSpec").finish()
}

pub fn encode_finished(verify_data: &[u8]) -> Vec<u8> {
    wrap_handshake(HandshakeType::Finished, verify_data)
}

pub fn decode_finished(body: &[u8]) -> Result<Finished, Alert> {
    Ok(Finished {
        verify_data: body.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_and_parse_header() {
        let msg = wrap_handshake(HandshakeType::Finished, &[1, 2, 3]);
        assert_eq!(msg, vec![20, 0, 0, 3, 1, 2, 3]);
        let (t, body) = parse_handshake_header(&msg).unwrap();
        assert_eq!(t, HandshakeType::Finished);
        assert_eq!(body, &[1, 2, 3]);
    }

    #[test]
    fn test_parse_header_errors() {
        assert_eq!(
            parse_handshake_header(&[1, 0]).unwrap_err().description,
            AlertDescription::HandshakeFailure
        );
        assert_eq!(
            parse_handshake_header(&[99, 0, 0, 0]).unwrap_err().description,
            AlertDescription::UnexpectedMessage
        );
        // Declared 4 bytes, carries 2.
        assert_eq!(
            parse_handshake_header(&[20, 0, 0, 4, 1, 2]).unwrap_err().description,
            AlertDescription::HandshakeFailure
        );
        // Trailing bytes after the declared body.
        assert_eq!(
            parse_handshake_header(&[20, 0, 0, 1, 1, 2]).unwrap_err().description,
            AlertDescription::HandshakeFailure
        );
    }

    #[test]
    fn test_client_hello_codec() {
        let ch = ClientHello {
            random: [7u8; 32],
            session_id: vec![1, 2, 3],
            cipher_suites: vec![0x20, 0x22],
            compression_methods: vec![0],
        };
        let encoded = encode_client_hello(&ch);
        assert_eq!(encoded[0], HandshakeType::ClientHello as u8);
        // random + sid + suites + compressions
        assert_eq!(encoded.len(), 4 + 32 + 1 + 3 + 1 + 2 + 1 + 1);
        let (_, body) = parse_handshake_header(&encoded).unwrap();
        assert_eq!(decode_client_hello(body).unwrap(), ch);
    }

    #[test]
    fn test_client_hello_requires_suites() {
        let ch = ClientHello {
            random: [0u8; 32],
            session_id: Vec::new(),
            cipher_suites: Vec::new(),
            compression_methods: vec![0],
        };
        let encoded = encode_client_hello(&ch);
        let err = decode_client_hello(&encoded[4..]).unwrap_err();
        assert_eq!(err.description, AlertDescription::HandshakeFailure);
    }

    #[test]
    fn test_server_hello_codec() {
        let sh = ServerHello {
            random: [9u8; 32],
            session_id: vec![0xAA; 32],
            cipher_suite: 0x21,
            compression_method: 0,
        };
        let encoded = encode_server_hello(&sh);
        assert_eq!(decode_server_hello(&encoded[4..]).unwrap(), sh);
        // Truncated body.
        assert!(decode_server_hello(&encoded[4..encoded.len() - 1]).is_err());
    }

    #[test]
    fn test_session_id_too_long() {
        let mut body = vec![0u8; 32];
        body.push(33);
        body.extend_from_slice(&[0u8; 33]);
        body.extend_from_slice(&[0x20, 0]);
        assert_eq!(
            decode_server_hello(&body).unwrap_err().description,
            AlertDescription::HandshakeFailure
        );
    }

    #[test]
    fn test_key_exchange_codec() {
        let encoded = encode_key_exchange(HandshakeType::ClientKeyExchange, &[5u8; 65]);
        assert_eq!(encoded[0], 16);
        assert_eq!(&encoded[4..6], &[0, 65]);
        let msg = decode_key_exchange(&encoded[4..]).unwrap();
        assert_eq!(msg.public_value, vec![5u8; 65]);
        assert!(decode_key_exchange(&[0, 0]).is_err());
        assert!(decode_key_exchange(&[0, 5, 1]).is_err());
    }

    #[test]
    fn test_change_cipher_spec_codec() {
        let encoded = encode_change_cipher_spec();
        assert_eq!(encoded, vec![253, 0, 0, 0]);
        decode_change_cipher_spec(&[]).unwrap();
        assert!(decode_change_cipher_spec(&[1]).is_err());
    }
}
