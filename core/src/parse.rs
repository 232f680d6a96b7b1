//! Map a transport outcome plus response mode onto a `Response`.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ErrorKind;
use crate::headers::HeaderSink;
use crate::http::{BodySource, RawOutcome};
use crate::params::Params;
use crate::response::{Response, ResponseData};
use crate::spec::{JsonOptions, ResponseMode};

pub fn parse(mode: &ResponseMode, outcome: RawOutcome, headers: HeaderSink) -> Response {
    let (status, body) = match outcome {
        RawOutcome::Failed(err) => {
            return Response::failed(ErrorKind::from(err.class), err.message);
        }
        RawOutcome::Response { status, body } => (status, body),
    };
    let headers = headers.into_headers();

    match (mode, body) {
        (ResponseMode::String, BodySource::Buffered(bytes)) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            Response::new(status, headers, ResponseData::Text(text), None, None)
        }
        (ResponseMode::Json(options), BodySource::Buffered(bytes)) => {
            parse_json(status, headers, &bytes, options)
        }
        (ResponseMode::File(_) | ResponseMode::Stream(_), _) => {
            Response::new(status, headers, ResponseData::None, None, None)
        }
        (_, BodySource::Streamed) => Response::new(
            status,
            headers,
            ResponseData::None,
            Some(ErrorKind::Unknown),
            Some("transport streamed a body that was expected in memory".to_string()),
        ),
    }
}

fn parse_json(status: u16, headers: Params, bytes: &[u8], options: &JsonOptions) -> Response {
    let parse_error = |headers: Params, message: String| {
        Response::new(status, headers, ResponseData::None, Some(ErrorKind::Parse), Some(message))
    };

    // Checked on the raw bytes so an over-deep document is never built.
    let depth = nesting_depth(bytes);
    if depth > options.max_depth {
        return parse_error(
            headers,
            format!("JSON body nests {depth} levels, limit is {}", options.max_depth),
        );
    }
    let value = match decode_unbounded(bytes) {
        Ok(value) => value,
        Err(e) => return parse_error(headers, format!("invalid JSON body: {e}")),
    };
    if options.structured && !(value.is_object() || value.is_array()) {
        return parse_error(headers, "JSON body is a scalar, expected object or array".to_string());
    }
    Response::new(status, headers, ResponseData::Json(value), None, None)
}

/// Decode without serde_json's fixed recursion limit; `max_depth` is the
/// only bound. `serde_stacker` grows the stack on the heap for deep input.
fn decode_unbounded(bytes: &[u8]) -> serde_json::Result<Value> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Container nesting of a JSON text; a scalar is 0, `[]` is 1, `[[1]]` is 2.
/// Brackets inside strings are skipped. Malformed input still yields a
/// number; the decoder reports the syntax error.
fn nesting_depth(bytes: &[u8]) -> usize {
    let mut depth = 0usize;
    let mut max = 0;
    let mut in_string = false;
    let mut escaped = false;
    for &b in bytes {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                max = max.max(depth);
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}
