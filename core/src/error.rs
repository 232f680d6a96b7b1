//! Error taxonomy for executions.
//!
//! # Design
//! Callers never see a Rust `Err` from an execution call. Every failure is
//! folded into a `Response` carrying one `ErrorKind`. The typed errors below
//! are internal stepping stones: `PrepareError` for faults before anything
//! touches the network, `TransportError` for what a backend reports.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The single failure category attached to a `Response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A fault inside the engine, or a transport failure nobody classified.
    Unknown,
    /// DNS, connect, timeout, send or receive failure.
    Network,
    /// Certificate, cipher or handshake failure.
    Tls,
    /// The exchange worked but the status is outside `200..300`.
    Http,
    /// The body could not be decoded the way the response mode asked for.
    Parse,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Unknown => "unknown",
            ErrorKind::Network => "network",
            ErrorKind::Tls => "tls",
            ErrorKind::Http => "http",
            ErrorKind::Parse => "parse",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a transport classifies its own failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Network,
    Tls,
    Unknown,
}

impl From<ErrorClass> for ErrorKind {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::Network => ErrorKind::Network,
            ErrorClass::Tls => ErrorKind::Tls,
            ErrorClass::Unknown => ErrorKind::Unknown,
        }
    }
}

/// A failure reported by a transport backend.
#[derive(Debug, Clone, Error)]
#[error("{class:?} transport error: {message}")]
pub struct TransportError {
    pub class: ErrorClass,
    pub message: String,
}

impl TransportError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unknown, message)
    }
}

/// Faults raised while turning a `RequestSpec` into a transport-ready request.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("cannot open upload file {path}: {source}")]
    UploadOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open download file {path}: {source}")]
    DownloadOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read multipart file part {path}: {source}")]
    MultipartFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON body encoding failed: {0}")]
    JsonEncode(String),

    #[error("form body encoding failed: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),

    #[error("invalid value {value:?} for transport option {key:?}")]
    InvalidOption { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_maps_onto_kind() {
        assert_eq!(ErrorKind::from(ErrorClass::Network), ErrorKind::Network);
        assert_eq!(ErrorKind::from(ErrorClass::Tls), ErrorKind::Tls);
        assert_eq!(ErrorKind::from(ErrorClass::Unknown), ErrorKind::Unknown);
    }

    #[test]
    fn prepare_error_mentions_path() {
        let err = PrepareError::UploadOpen {
            path: PathBuf::from("/missing/file.bin"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/missing/file.bin"));
    }

    #[test]
    fn kind_displays_lowercase() {
        assert_eq!(ErrorKind::Tls.to_string(), "tls");
        assert_eq!(ErrorKind::Parse.as_str(), "parse");
    }
}
