//! Single-request path on `ureq`.

use std::io::{self, Read, Write};

use log::debug;
use ureq::config::AutoHeaderValue;
use ureq::http::header::CONTENT_LENGTH;
use ureq::http::HeaderValue;
use ureq::tls::TlsConfig;
use ureq::{Agent, SendBody};

use super::classify::{classify_io, classify_ureq};
use crate::error::TransportError;
use crate::headers::HeaderSink;
use crate::http::{BodySource, PreparedRequest, RawOutcome, ResponseTarget, TransportSettings, WireBody};

const COPY_BUF: usize = 64 * 1024;

pub(super) fn new_agent(settings: &TransportSettings) -> Agent {
    let accept_encoding = if settings.accept_encoding {
        AutoHeaderValue::Default
    } else {
        AutoHeaderValue::None
    };
    Agent::config_builder()
        .http_status_as_error(false)
        .max_redirects(0)
        .timeout_connect(Some(settings.connect_timeout))
        .timeout_global(Some(settings.timeout))
        .no_delay(settings.tcp_nodelay)
        .user_agent(AutoHeaderValue::None)
        .accept_encoding(accept_encoding)
        .tls_config(
            TlsConfig::builder()
                .disable_verification(!settings.verify_tls)
                .build(),
        )
        .build()
        .new_agent()
}

pub(super) fn execute(agent: &Agent, request: PreparedRequest, sink: &mut HeaderSink) -> RawOutcome {
    let PreparedRequest {
        method,
        url,
        headers,
        body,
        target,
        ..
    } = request;
    debug!("{method} {url}");

    let mut builder = ureq::http::Request::builder()
        .method(method.as_str())
        .uri(url.as_str());
    for (name, value) in &headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let request = match builder.body(()) {
        Ok(request) => request,
        Err(e) => return RawOutcome::Failed(TransportError::unknown(format!("invalid request: {e}"))),
    };

    let result = match body {
        WireBody::Empty => agent.run(request.map(|()| SendBody::none())),
        WireBody::Bytes(bytes) => agent.run(request.map(|()| bytes.as_slice())),
        WireBody::Reader { mut reader, len } => {
            let mut request = request;
            request.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
            agent.run(request.map(|()| SendBody::from_reader(&mut *reader)))
        }
    };
    let response = match result {
        Ok(response) => response,
        Err(e) => return RawOutcome::Failed(classify_ureq(&e)),
    };

    let (parts, body) = response.into_parts();
    let status = parts.status.as_u16();
    for (name, value) in parts.headers.iter() {
        sink.record(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
    }

    let mut reader = body.into_reader();
    match target {
        ResponseTarget::Buffer => {
            let mut buf = Vec::new();
            match reader.read_to_end(&mut buf) {
                Ok(_) => RawOutcome::buffered(status, buf),
                Err(e) => RawOutcome::Failed(classify_io(&e)),
            }
        }
        ResponseTarget::Writer(mut writer) => match copy_body(&mut reader, &mut *writer) {
            Ok(()) => RawOutcome::Response {
                status,
                body: BodySource::Streamed,
            },
            Err(e) => RawOutcome::Failed(e),
        },
    }
}

/// Like `io::copy`, but a failed read is a network error while a failed
/// write to the destination is not.
fn copy_body(reader: &mut dyn Read, writer: &mut dyn Write) -> Result<(), TransportError> {
    let mut buf = vec![0u8; COPY_BUF];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(classify_io(&e)),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|e| TransportError::unknown(format!("writing response body failed: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| TransportError::unknown(format!("flushing response body failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::ConnectionReset))
        }
    }

    #[test]
    fn copy_moves_every_byte() {
        let data = vec![7u8; COPY_BUF * 2 + 3];
        let mut out = Vec::new();
        copy_body(&mut data.as_slice(), &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn write_failure_is_unknown() {
        let err = copy_body(&mut &b"abc"[..], &mut FailingWriter).unwrap_err();
        assert_eq!(err.class, ErrorClass::Unknown);
    }

    #[test]
    fn read_failure_is_network() {
        let err = copy_body(&mut FailingReader, &mut Vec::new()).unwrap_err();
        assert_eq!(err.class, ErrorClass::Network);
    }
}
