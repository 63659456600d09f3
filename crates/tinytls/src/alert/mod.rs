//! Alert protocol: the fault taxonomy raised by every protocol layer.
//!
//! Every fallible protocol operation returns `Result<_, Alert>`. A fatal
//! alert tears the connection down; a warning is reported and the
//! connection continues. On the wire an alert record carries two bytes,
//! `[level, description]`.

use std::fmt;

use tinytls_types::CryptoError;

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
}

/// Alert description codes (RFC 5246 numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    DecryptionFailed = 21,
    RecordOverflow = 22,
    DecompressionFailure = 30,
    HandshakeFailure = 40,
    BadCertificate = 42,
    UnsupportedCertificate = 43,
    CertificateRevoked = 44,
    CertificateExpired = 45,
    CertificateUnknown = 46,
    IllegalParameter = 47,
    UnknownCa = 48,
    AccessDenied = 49,
    DecodeError = 50,
    DecryptError = 51,
    ExportRestriction = 60,
    ProtocolVersion = 70,
    InsufficientSecurity = 71,
    InternalError = 80,
    UserCanceled = 90,
    NoRenegotiation = 100,
}

/// A protocol alert: level, description code and a human readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{level} alert {description}: {message}")]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
    pub message: String,
}

impl AlertLevel {
    /// Convert from u8 to AlertLevel.
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            1 => Ok(AlertLevel::Warning),
            2 => Ok(AlertLevel::Fatal),
            _ => Err(v),
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Warning => f.write_str("warning"),
            AlertLevel::Fatal => f.write_str("fatal"),
        }
    }
}

impl AlertDescription {
    /// Convert from u8 to AlertDescription.
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(AlertDescription::CloseNotify),
            10 => Ok(AlertDescription::UnexpectedMessage),
            20 => Ok(AlertDescription::BadRecordMac),
            21 => Ok(AlertDescription::DecryptionFailed),
            22 => Ok(AlertDescription::RecordOverflow),
            30 => Ok(AlertDescription::DecompressionFailure),
            40 => Ok(AlertDescription::HandshakeFailure),
            42 => Ok(AlertDescription::BadCertificate),
            43 => Ok(AlertDescription::UnsupportedCertificate),
            44 => Ok(AlertDescription::CertificateRevoked),
            45 => Ok(AlertDescription::CertificateExpired),
            46 => Ok(AlertDescription::CertificateUnknown),
            47 => Ok(AlertDescription::IllegalParameter),
            48 => Ok(AlertDescription::UnknownCa),
            49 => Ok(AlertDescription::AccessDenied),
            50 => Ok(AlertDescription::DecodeError),
            51 => Ok(AlertDescription::DecryptError),
            60 => Ok(AlertDescription::ExportRestriction),
            70 => Ok(AlertDescription::ProtocolVersion),
            71 => Ok(AlertDescription::InsufficientSecurity),
            80 => Ok(AlertDescription::InternalError),
            90 => Ok(AlertDescription::UserCanceled),
            100 => Ok(AlertDescription::NoRenegotiation),
            _ => Err(v),
        }
    }

    /// The protocol name of the code, e.g. `handshake_failure`.
    pub fn as_str(self) -> &'static str {
        match self {
            AlertDescription::CloseNotify => "close_notify",
            AlertDescription::UnexpectedMessage => "unexpected_message",
            AlertDescription::BadRecordMac => "bad_record_mac",
            AlertDescription::DecryptionFailed => "decryption_failed",
            AlertDescription::RecordOverflow => "record_overflow",
            AlertDescription::DecompressionFailure => "decompression_failure",
            AlertDescription::HandshakeFailure => "handshake_failure",
            AlertDescription::BadCertificate => "bad_certificate",
            AlertDescription::UnsupportedCertificate => "unsupported_certificate",
            AlertDescription::CertificateRevoked => "certificate_revoked",
            AlertDescription::CertificateExpired => "certificate_expired",
            AlertDescription::CertificateUnknown => "certificate_unknown",
            AlertDescription::IllegalParameter => "illegal_parameter",
            AlertDescription::UnknownCa => "unknown_ca",
            AlertDescription::AccessDenied => "access_denied",
            AlertDescription::DecodeError => "decode_error",
            AlertDescription::DecryptError => "decrypt_error",
            AlertDescription::ExportRestriction => "export_restriction",
            AlertDescription::ProtocolVersion => "protocol_version",
            AlertDescription::InsufficientSecurity => "insufficient_security",
            AlertDescription::InternalError => "internal_error",
            AlertDescription::UserCanceled => "user_canceled",
            AlertDescription::NoRenegotiation => "no_renegotiation",
        }
    }
}

impl fmt::Display for AlertDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), *self as u8)
    }
}

impl Alert {
    pub fn new(level: AlertLevel, description: AlertDescription, message: impl Into<String>) -> Self {
        Self {
            level,
            description,
            message: message.into(),
        }
    }

    pub fn fatal(description: AlertDescription, message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Fatal, description, message)
    }

    pub fn warning(description: AlertDescription, message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Warning, description, message)
    }

    pub fn is_fatal(&self) -> bool {
        self.level == AlertLevel::Fatal
    }

    /// The numeric alert code.
    pub fn code(&self) -> u8 {
        self.description as u8
    }

    /// Encode as an alert record payload: `[level, description]`.
    pub fn to_bytes(&self) -> [u8; 2] {
        [self.level as u8, self.description as u8]
    }

    /// Decode an alert record payload received from the peer.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, Alert> {
        let [level, code] = payload else {
            return Err(Alert::fatal(
                AlertDescription::DecodeError,
                format!("alert payload must be 2 bytes, got {}", payload.len()),
            ));
        };
        let level = AlertLevel::from_u8(*level).map_err(|v| {
            Alert::fatal(
                AlertDescription::IllegalParameter,
                format!("unknown alert level {v}"),
            )
        })?;
        let description = AlertDescription::from_u8(*code).map_err(|v| {
            Alert::fatal(
                AlertDescription::IllegalParameter,
                format!("unknown alert description {v}"),
            )
        })?;
        Ok(Self::new(level, description, "received from peer"))
    }
}

impl From<CryptoError> for Alert {
    fn from(e: CryptoError) -> Self {
        Alert::fatal(AlertDescription::InternalError, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_level_values() {
        assert_eq!(AlertLevel::Warning as u8, 1);
        assert_eq!(AlertLevel::Fatal as u8, 2);
    }

    #[test]
    fn test_alert_description_values() {
        assert_eq!(AlertDescription::CloseNotify as u8, 0);
        assert_eq!(AlertDescription::UnexpectedMessage as u8, 10);
        assert_eq!(AlertDescription::BadRecordMac as u8, 20);
        assert_eq!(AlertDescription::RecordOverflow as u8, 22);
        assert_eq!(AlertDescription::HandshakeFailure as u8, 40);
        assert_eq!(AlertDescription::IllegalParameter as u8, 47);
        assert_eq!(AlertDescription::ProtocolVersion as u8, 70);
        assert_eq!(AlertDescription::InsufficientSecurity as u8, 71);
        assert_eq!(AlertDescription::InternalError as u8, 80);
        assert_eq!(AlertDescription::NoRenegotiation as u8, 100);
    }

    #[test]
    fn test_alert_description_from_u8_roundtrip() {
        for v in 0u8..=255 {
            if let Ok(desc) = AlertDescription::from_u8(v) {
                assert_eq!(desc as u8, v);
            }
        }
        assert_eq!(AlertDescription::from_u8(41), Err(41));
        assert_eq!(AlertDescription::from_u8(255), Err(255));
    }

    #[test]
    fn test_alert_level_from_u8() {
        assert_eq!(AlertLevel::from_u8(1), Ok(AlertLevel::Warning));
        assert_eq!(AlertLevel::from_u8(2), Ok(AlertLevel::Fatal));
        assert_eq!(AlertLevel::from_u8(0), Err(0));
        assert_eq!(AlertLevel::from_u8(3), Err(3));
    }

    #[test]
    fn test_alert_display() {
        let alert = Alert::fatal(AlertDescription::HandshakeFailure, "no shared cipher suite");
        assert_eq!(
            alert.to_string(),
            "fatal alert handshake_failure (40): no shared cipher suite"
        );
        assert!(alert.is_fatal());
        assert_eq!(alert.code(), 40);
    }

    #[test]
    fn test_alert_wire_bytes() {
        let alert = Alert::warning(AlertDescription::CloseNotify, "bye");
        assert_eq!(alert.to_bytes(), [1, 0]);
        let parsed = Alert::from_bytes(&alert.to_bytes()).unwrap();
        assert_eq!(parsed.level, AlertLevel::Warning);
        assert_eq!(parsed.description, AlertDescription::CloseNotify);
    }

    #[test]
    fn test_alert_from_bytes_rejects_malformed() {
        let err = Alert::from_bytes(&[2]).unwrap_err();
        assert_eq!(err.description, AlertDescription::DecodeError);
        let err = Alert::from_bytes(&[7, 40]).unwrap_err();
        assert_eq!(err.description, AlertDescription::IllegalParameter);
        let err = Alert::from_bytes(&[2, 41]).unwrap_err();
        assert_eq!(err.description, AlertDescription::IllegalParameter);
    }

    #[test]
    fn test_alert_from_crypto_error() {
        let alert: Alert = CryptoError::EntropyFail.into();
        assert!(alert.is_fatal());
        assert_eq!(alert.description, AlertDescription::InternalError);
    }
}
