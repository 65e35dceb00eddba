//! HTTP/1.1 request head parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use super::{Headers, Method};

/// Errors that can occur while parsing an HTTP/1.1 request head.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A parsed HTTP/1.1 request.
///
/// Keeps the request target exactly as received so that cache keys are built
/// from the same bytes the client sent.
///
/// # Examples
///
/// ```
/// use pagegate::http::request::Request;
///
/// let raw = b"GET /blog/post-1?page=2 HTTP/1.1\r\nHost: example.com\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.path(), "/blog/post-1");
/// assert_eq!(request.query_string(), Some("page=2"));
/// assert_eq!(request.request_uri(), "/blog/post-1?page=2");
/// assert_eq!(request.host(), Some("example.com"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    target: String,
    // Byte offset of `?` in `target`, if any.
    query_start: Option<usize>,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf`. Everything after that offset becomes the request body.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — the header block is not terminated yet.
    /// - [`RequestError::Parse`] — the data is malformed.
    /// - [`RequestError::MissingField`] — method, path or version is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = match raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse::<Method>()
        {
            Ok(method) => method,
            Err(never) => match never {},
        };

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?
            .to_owned();

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            match std::str::from_utf8(header.value) {
                Ok(value) => header_map.insert(header.name, value),
                Err(_) => debug!(header = header.name, "dropping header value that is not UTF-8"),
            }
        }

        Ok((
            Self {
                method,
                query_start: target.find('?'),
                target,
                version,
                headers: header_map,
                body: Bytes::copy_from_slice(&buf[body_offset..]),
            },
            body_offset,
        ))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        match self.query_start {
            Some(pos) => &self.target[..pos],
            None => &self.target,
        }
    }

    /// Returns the raw query string (without the leading `?`), if a `?` was present.
    ///
    /// A bare trailing `?` yields `Some("")`.
    pub fn query_string(&self) -> Option<&str> {
        self.query_start.map(|pos| &self.target[pos + 1..])
    }

    /// Returns `true` when the request carries query parameters.
    pub fn has_query(&self) -> bool {
        self.query_string().is_some_and(|q| !q.is_empty())
    }

    /// Returns the request target exactly as received (path and query).
    pub fn request_uri(&self) -> &str {
        &self.target
    }

    /// Returns the `Host` header.
    ///
    /// `None` when the header is absent, empty or not valid UTF-8.
    pub fn host(&self) -> Option<&str> {
        self.headers.get("host").filter(|host| !host.is_empty())
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.request_uri(), "/");
        assert_eq!(req.version(), 1);
        assert_eq!(req.host(), Some("localhost"));
        assert_eq!(req.query_string(), None);
        assert!(!req.has_query());
        assert_eq!(offset, raw.len());
    }

    #[test]
    fn target_keeps_query() {
        let raw = b"GET /search?q=rust&page=2 HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query_string(), Some("q=rust&page=2"));
        assert_eq!(req.request_uri(), "/search?q=rust&page=2");
        assert!(req.has_query());
    }

    #[test]
    fn bare_question_mark_is_not_a_query() {
        let raw = b"GET /about? HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.query_string(), Some(""));
        assert!(!req.has_query());
        assert_eq!(req.request_uri(), "/about?");
    }

    #[test]
    fn missing_host_is_none() {
        let raw = b"GET / HTTP/1.0\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.host(), None);
        assert_eq!(req.version(), 0);

        let raw = b"GET / HTTP/1.1\r\nHost: \r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.host(), None);
    }

    #[test]
    fn undecodable_host_is_none() {
        let raw = b"GET / HTTP/1.1\r\nHost: caf\xe9.example\r\nAccept: */*\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.host(), None);
        assert_eq!(req.headers().get("accept"), Some("*/*"));
    }

    #[test]
    fn lowercase_method_is_custom() {
        let raw = b"get / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Custom("get".to_owned()));
    }

    #[test]
    fn body_follows_head() {
        let raw = b"POST /form HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
        let (req, body_offset) = Request::parse(raw).unwrap();
        assert_eq!(&raw[body_offset..], b"hello");
        assert_eq!(req.body().as_ref(), b"hello");
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }
}
