use std::collections::HashMap;
use std::io::Write;

use thiserror::Error;

pub const STATUS_OK: &str = "HTTP/1.1 200 OK";
pub const STATUS_BAD_REQUEST: &str = "HTTP/1.1 400 Bad Request";
pub const STATUS_NOT_FOUND: &str = "HTTP/1.1 404 Not Found";
pub const STATUS_SERVER_ERROR: &str = "HTTP/1.1 500 Internal Server Error";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("request is not valid UTF-8")]
    InvalidUtf8,
    #[error("missing header terminator")]
    MissingHeaderTerminator,
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("invalid Content-Length header")]
    InvalidContentLength,
}

/// One request, decoded from the single buffer read off the connection.
/// Requests larger than the read buffer are not supported; whatever arrived
/// in the first read is all the dispatcher ever sees.
#[derive(Debug, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    header_lines: Vec<String>,
    pub body: String,
}

impl Request {
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|_| ParseError::InvalidUtf8)?;

        let Some((header_part, body_part)) = text.split_once("\r\n\r\n") else {
            return Err(ParseError::MissingHeaderTerminator);
        };

        let mut lines = header_part.split("\r\n");
        let request_line = lines.next().unwrap_or("");
        let mut tokens = request_line.split_whitespace();
        let (Some(method), Some(target)) = (tokens.next(), tokens.next()) else {
            return Err(ParseError::MalformedRequestLine);
        };

        let (path, query_string) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };

        Ok(Self {
            method: method.to_string(),
            path: path.to_string(),
            query: parse_query(query_string),
            header_lines: lines.map(str::to_string).collect(),
            body: body_part.to_string(),
        })
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// `Ok(None)` when the header is absent, `Err` when present but not an
    /// integer. Header names match case-insensitively.
    pub fn content_length(&self) -> Result<Option<usize>, ParseError> {
        for line in &self.header_lines {
            let lower = line.to_ascii_lowercase();
            if let Some(value) = lower.strip_prefix("content-length:") {
                return value
                    .trim()
                    .parse::<usize>()
                    .map(Some)
                    .map_err(|_| ParseError::InvalidContentLength);
            }
        }
        Ok(None)
    }
}

/// Only well-formed `key=value` pairs (exactly one `=`) are recognized;
/// malformed pairs are silently skipped.
fn parse_query(query_string: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if query_string.is_empty() {
        return params;
    }

    for pair in query_string.split('&') {
        let mut pieces = pair.split('=');
        if let (Some(key), Some(value), None) = (pieces.next(), pieces.next(), pieces.next()) {
            params.insert(key.to_string(), value.to_string());
        }
    }
    params
}

#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    pub status: &'static str,
    pub body: String,
    pub content_type: &'static str,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: STATUS_OK,
            body: body.into(),
            content_type: "text/plain",
        }
    }

    pub fn json(body: String) -> Self {
        Self {
            status: STATUS_OK,
            body,
            content_type: "application/json",
        }
    }

    pub fn bad_request(body: impl Into<String>) -> Self {
        Self {
            status: STATUS_BAD_REQUEST,
            body: body.into(),
            content_type: "text/plain",
        }
    }

    pub fn not_found(body: impl Into<String>) -> Self {
        Self {
            status: STATUS_NOT_FOUND,
            body: body.into(),
            content_type: "text/plain",
        }
    }

    pub fn server_error(body: impl Into<String>) -> Self {
        Self {
            status: STATUS_SERVER_ERROR,
            body: body.into(),
            content_type: "text/plain",
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let payload = format!(
            "{}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            self.content_type,
            self.body.len(),
            self.body
        );
        writer.write_all(payload.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_request_line_query_and_body() {
        let raw = b"GET /warm/brightness?level=42&x=1 HTTP/1.1\r\nHost: device\r\n\r\nignored";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/warm/brightness");
        assert_eq!(request.query_param("level"), Some("42"));
        assert_eq!(request.query_param("x"), Some("1"));
        assert_eq!(request.body, "ignored");
    }

    #[test]
    fn missing_header_terminator_is_rejected() {
        let raw = b"GET /warm/on HTTP/1.1\r\nHost: device\r\n";
        assert_eq!(
            Request::parse(raw),
            Err(ParseError::MissingHeaderTerminator)
        );
    }

    #[test]
    fn short_request_line_is_rejected() {
        assert_eq!(
            Request::parse(b"GET\r\n\r\n"),
            Err(ParseError::MalformedRequestLine)
        );
    }

    #[test]
    fn non_utf8_request_is_rejected() {
        assert_eq!(
            Request::parse(&[0xff, 0xfe, 0x0d, 0x0a]),
            Err(ParseError::InvalidUtf8)
        );
    }

    #[test]
    fn malformed_query_pairs_are_skipped() {
        let raw = b"GET /x?level=42&broken&a=b=c HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.query.len(), 1);
        assert_eq!(request.query_param("level"), Some("42"));
        assert_eq!(request.query_param("broken"), None);
        assert_eq!(request.query_param("a"), None);
    }

    #[test]
    fn content_length_header_forms() {
        let with = Request::parse(b"POST /x HTTP/1.1\r\ncontent-LENGTH: 12\r\n\r\n").unwrap();
        assert_eq!(with.content_length(), Ok(Some(12)));

        let without = Request::parse(b"POST /x HTTP/1.1\r\nHost: device\r\n\r\n").unwrap();
        assert_eq!(without.content_length(), Ok(None));

        let bad = Request::parse(b"POST /x HTTP/1.1\r\nContent-Length: abc\r\n\r\n").unwrap();
        assert_eq!(bad.content_length(), Err(ParseError::InvalidContentLength));
    }

    #[test]
    fn response_wire_format() {
        let mut sink = Vec::new();
        Response::ok("OK").write_to(&mut sink).unwrap();

        assert_eq!(
            String::from_utf8(sink).unwrap(),
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK"
        );
    }
}
