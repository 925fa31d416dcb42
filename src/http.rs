//! Network access.
//!
//! Every component that talks to the network goes through [`HttpTransport`],
//! so the pipeline can be driven by an in-memory transport in tests.

use crate::error::{PipelineError, Result};
use std::io::Read;
use std::time::Duration;

/// A response body ready to be streamed.
pub struct HttpBody {
    /// Length announced by the server, if any.
    pub content_length: Option<u64>,
    /// The body stream.
    pub reader: Box<dyn Read + Send>,
}

impl HttpBody {
    /// Read the whole body into memory. Only used for small documents.
    pub fn into_bytes(mut self) -> std::io::Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.content_length.unwrap_or(0) as usize);
        self.reader.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// Blocking GET access to upstream resources.
pub trait HttpTransport: Send + Sync {
    /// Issue a GET request. Non-success statuses are errors.
    fn get(&self, url: &str) -> Result<HttpBody>;
}

/// GET and parse a JSON document through any transport.
pub fn fetch_json<T: serde::de::DeserializeOwned>(
    transport: &dyn HttpTransport,
    url: &str,
) -> Result<T> {
    let body = transport.get(url)?;
    let bytes = body.into_bytes()?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Production transport backed by `reqwest`'s blocking client.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Create a transport that gives up on connecting after `connect_timeout`.
    ///
    /// Response bodies have no total deadline, so a large archive on a slow
    /// link is not cut off; long transfers are bounded by the generation's
    /// cancellation token instead, checked between chunks.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::http("<client>", e))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpBody> {
        tracing::debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::http(url, e))?;

        Ok(HttpBody {
            content_length: response.content_length(),
            reader: Box::new(response),
        })
    }
}

/// In-memory transport for tests: serves fixed bodies and counts requests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub(crate) struct MemoryTransport {
        bodies: Mutex<HashMap<String, Vec<u8>>>,
        requests: Mutex<Vec<String>>,
    }

    impl MemoryTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
            self.bodies.lock().insert(url.to_string(), body.into());
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        pub(crate) fn requests_for(&self, url: &str) -> usize {
            self.requests.lock().iter().filter(|u| *u == url).count()
        }
    }

    impl HttpTransport for MemoryTransport {
        fn get(&self, url: &str) -> Result<HttpBody> {
            self.requests.lock().push(url.to_string());
            let body = self
                .bodies
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| PipelineError::http(url, "404 Not Found"))?;
            Ok(HttpBody {
                content_length: Some(body.len() as u64),
                reader: Box::new(std::io::Cursor::new(body)),
            })
        }
    }
}
