//! Request body variants and their wire encoding.
//!
//! # Design
//! `Body` is a tagged union, so a request can only ever carry one body.
//! `encode` maps it onto a `WireBody` plus the Content-Type to use when the
//! caller did not set one.
//!
//! Handle ownership follows who opened what. A `Body::File` is opened here
//! and the `File` moves into the returned `WireBody`, so it closes when the
//! prepared request is done with. A `Body::Stream` belongs to the caller:
//! the engine only holds a shared reference and never closes it.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use uuid::Uuid;

use crate::error::PrepareError;
use crate::http::WireBody;
use crate::params::Params;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// A JSON body, or the reason it could not be turned into JSON.
///
/// Serialization happens when the body is set; a failure is carried along
/// and reported when the request executes.
#[derive(Debug, Clone)]
pub struct JsonPayload(Result<serde_json::Value, String>);

impl JsonPayload {
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        JsonPayload(serde_json::to_value(value).map_err(|e| e.to_string()))
    }

    pub fn value(&self) -> Option<&serde_json::Value> {
        self.0.as_ref().ok()
    }
}

impl From<serde_json::Value> for JsonPayload {
    fn from(value: serde_json::Value) -> Self {
        JsonPayload(Ok(value))
    }
}

/// A readable handle the caller keeps ownership of.
///
/// The engine reads `len` bytes from it and leaves it open.
#[derive(Clone)]
pub struct StreamBody {
    reader: Arc<Mutex<dyn Read + Send>>,
    len: u64,
}

impl StreamBody {
    pub fn new<R: Read + Send + 'static>(reader: Arc<Mutex<R>>, len: u64) -> Self {
        Self { reader, len }
    }

    /// Share an open file, taking its length from the file metadata.
    pub fn from_file(file: Arc<Mutex<File>>) -> io::Result<Self> {
        let len = {
            let guard = file
                .lock()
                .map_err(|_| io::Error::other("stream body lock poisoned"))?;
            guard.metadata()?.len()
        };
        Ok(Self::new(file, len))
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for StreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBody").field("len", &self.len).finish()
    }
}

/// `Read` adapter over a caller's shared reader.
struct SharedReader(Arc<Mutex<dyn Read + Send>>);

impl Read for SharedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("stream body lock poisoned"))?
            .read(buf)
    }
}

/// A writable destination the caller keeps ownership of.
#[derive(Clone)]
pub struct ResponseSink(Arc<Mutex<dyn Write + Send>>);

impl ResponseSink {
    pub fn new<W: Write + Send + 'static>(writer: Arc<Mutex<W>>) -> Self {
        ResponseSink(writer)
    }
}

impl Write for ResponseSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("response sink lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("response sink lock poisoned"))?
            .flush()
    }
}

impl fmt::Debug for ResponseSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseSink")
    }
}

#[derive(Debug, Clone)]
enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        path: PathBuf,
        filename: String,
        content_type: String,
    },
}

/// `multipart/form-data` fields, text and file parts mixed.
#[derive(Debug, Clone, Default)]
pub struct Multipart {
    parts: Vec<Part>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// File part named after the file, sent as `application/octet-stream`.
    pub fn file(self, name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        self.file_with(name, path, filename, OCTET_STREAM)
    }

    pub fn file_with(
        mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        self.parts.push(Part::File {
            name: name.into(),
            path: path.as_ref().to_path_buf(),
            filename: filename.into(),
            content_type: content_type.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Encode every part with `boundary`. File parts are read here and
    /// their handles closed before returning.
    fn encode(&self, boundary: &str) -> Result<Vec<u8>, PrepareError> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match part {
                Part::Text { name, value } => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_quoted(name)
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    path,
                    filename,
                    content_type,
                } => {
                    let contents =
                        std::fs::read(path).map_err(|source| PrepareError::MultipartFile {
                            path: path.clone(),
                            source,
                        })?;
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: {content_type}\r\n\r\n",
                            escape_quoted(name),
                            escape_quoted(filename)
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(&contents);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        Ok(out)
    }
}

fn escape_quoted(s: &str) -> String {
    s.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}

/// Exactly one body per request.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    None,
    Form(Params),
    Multipart(Multipart),
    Text(String),
    Json(JsonPayload),
    File(PathBuf),
    Stream(StreamBody),
}

/// A body ready for the wire.
#[derive(Debug)]
pub struct EncodedBody {
    pub payload: WireBody,
    /// Used only when the caller has not set `Content-Type` themselves.
    pub content_type: Option<String>,
}

impl EncodedBody {
    fn bytes(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            payload: WireBody::Bytes(bytes),
            content_type: Some(content_type.into()),
        }
    }
}

pub fn encode(body: &Body) -> Result<EncodedBody, PrepareError> {
    let encoded = match body {
        Body::None => EncodedBody {
            payload: WireBody::Empty,
            content_type: None,
        },
        Body::Form(fields) => {
            EncodedBody::bytes(serde_urlencoded::to_string(fields)?.into_bytes(), FORM_CONTENT_TYPE)
        }
        Body::Multipart(form) => {
            let boundary = format!("courier-{}", Uuid::new_v4().simple());
            let bytes = form.encode(&boundary)?;
            EncodedBody::bytes(bytes, format!("multipart/form-data; boundary={boundary}"))
        }
        Body::Text(text) => EncodedBody::bytes(text.clone().into_bytes(), TEXT_CONTENT_TYPE),
        Body::Json(JsonPayload(value)) => {
            let value = value.as_ref().map_err(|e| PrepareError::JsonEncode(e.clone()))?;
            let bytes =
                serde_json::to_vec(value).map_err(|e| PrepareError::JsonEncode(e.to_string()))?;
            EncodedBody::bytes(bytes, JSON_CONTENT_TYPE)
        }
        Body::File(path) => {
            let open_err = |source| PrepareError::UploadOpen {
                path: path.clone(),
                source,
            };
            let file = File::open(path).map_err(open_err)?;
            let len = file.metadata().map_err(open_err)?.len();
            EncodedBody {
                payload: WireBody::Reader {
                    reader: Box::new(file),
                    len,
                },
                content_type: None,
            }
        }
        Body::Stream(stream) => EncodedBody {
            payload: WireBody::Reader {
                reader: Box::new(SharedReader(Arc::clone(&stream.reader))),
                len: stream.len,
            },
            content_type: None,
        },
    };
    Ok(encoded)
}
