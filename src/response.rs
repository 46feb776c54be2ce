//! Buffered outbound response.
//!
//! The response accumulates status, headers, and body in memory while the
//! handler and middleware run, so middleware downstream of a write can still
//! observe what was written. [`status`](Response::status) and
//! [`size`](Response::size) exist for exactly that kind of introspection.
//! Dispatch converts the buffer into a hyper response once the pipeline is
//! done with it.

use bytes::{Bytes, BytesMut};
use http::header::HeaderMap;
use http::StatusCode;
use http_body_util::Full;

/// An outbound HTTP response under construction.
pub struct Response {
    status: u16,
    headers: HeaderMap,
    body: BytesMut,
    size: usize,
}

impl Response {
    pub(crate) fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            size: 0,
        }
    }

    /// The status code written so far (200 until something else is written).
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Total body bytes written so far.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Records the status code for the response.
    pub fn set_status(&mut self, code: u16) {
        self.status = code;
    }

    /// Appends `bytes` to the body buffer.
    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
        self.size += bytes.len();
    }

    pub(crate) fn body(&self) -> &[u8] {
        &self.body
    }

    /// Swaps the buffered body for a recoded one, e.g. after compression.
    pub(crate) fn replace_body(&mut self, bytes: Vec<u8>) {
        self.body = BytesMut::from(&bytes[..]);
        self.size = self.body.len();
    }

    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut res = http::Response::new(Full::new(self.body.freeze()));
        *res.status_mut() = status;
        *res.headers_mut() = self.headers;
        res
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_status_and_size() {
        let mut res = Response::new();
        assert_eq!(res.status(), 200);
        assert_eq!(res.size(), 0);

        res.set_status(201);
        res.write(b"hello");
        res.write(b", world");
        assert_eq!(res.status(), 201);
        assert_eq!(res.size(), 12);

        let http = res.into_http();
        assert_eq!(http.status(), StatusCode::CREATED);
    }

    #[test]
    fn invalid_status_falls_back_to_500() {
        let mut res = Response::new();
        res.set_status(99);
        assert_eq!(res.into_http().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
