//! Sort backend errors into network, TLS and unknown failures.
//!
//! TLS is detected first by looking for a `rustls::Error` anywhere in the
//! source chain. TLS failures usually arrive wrapped in an `io::Error`, and
//! `io::Error::source` skips the wrapped error itself, so each `io::Error`
//! in the chain is unwrapped with `get_ref` as well.

use std::error::Error as StdError;
use std::io;

use crate::error::{ErrorClass, TransportError};

/// Whether a `rustls::Error` appears anywhere in `err`'s chain.
pub fn chain_has_tls(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<rustls::Error>() {
            return true;
        }
        if let Some(inner) = e.downcast_ref::<io::Error>().and_then(|io| io.get_ref()) {
            if chain_has_tls(inner) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

pub fn classify_ureq(err: &ureq::Error) -> TransportError {
    let message = err.to_string();
    if chain_has_tls(err) {
        return TransportError::new(ErrorClass::Tls, message);
    }
    let class = match err {
        ureq::Error::Io(io) => classify_io_class(io),
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed | ureq::Error::Timeout(_) => {
            ErrorClass::Network
        }
        ureq::Error::Tls(_) => ErrorClass::Tls,
        _ => ErrorClass::Unknown,
    };
    TransportError::new(class, message)
}

pub fn classify_reqwest(err: &reqwest::Error) -> TransportError {
    let message = describe_chain(err);
    let class = if chain_has_tls(err) {
        ErrorClass::Tls
    } else if err.is_builder() {
        ErrorClass::Unknown
    } else if err.is_timeout()
        || err.is_connect()
        || err.is_request()
        || err.is_body()
        || err.is_decode()
    {
        ErrorClass::Network
    } else {
        ErrorClass::Unknown
    };
    TransportError::new(class, message)
}

/// Failure while reading a response body off the wire.
pub fn classify_io(err: &io::Error) -> TransportError {
    TransportError::new(classify_io_class(err), err.to_string())
}

fn classify_io_class(err: &io::Error) -> ErrorClass {
    if chain_has_tls(err) {
        ErrorClass::Tls
    } else {
        ErrorClass::Network
    }
}

// reqwest's Display stops at the outermost layer ("error sending request"),
// which is useless as a diagnostic on its own.
fn describe_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        message.push_str(": ");
        message.push_str(&e.to_string());
        current = e.source();
    }
    message
}
