//! Single-pass HTTP request-head scanner.
//!
//! The scanner exists to answer one question cheaply: does this first chunk
//! of client bytes carry a `Referer` we might want to act on, and if so what
//! were the request URI and `Host`? It is deliberately permissive - anything
//! that does not match is relayed verbatim, so "no match" is a normal
//! outcome, not an error. It borrows spans out of the caller's buffer and
//! never allocates.
//!
//! Known narrowness, accepted on purpose:
//! - header field names are matched case-sensitively (`Referer:`, `Host:`),
//!   as real browsers capitalize them this way;
//! - obsolete line folding is not supported;
//! - `%` is accepted anywhere in a URI, not only in percent-encodings.

use memchr::{memchr2, memrchr};

/// Spans extracted from the first chunk of a client request.
///
/// All slices borrow from the scanned buffer. A field is `None` when the
/// corresponding header line was never seen; a present-but-empty value scans
/// as `Some(&[])`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestHead<'a> {
    /// The request-target from the request line, up to the first byte that
    /// is neither pchar-like nor `/` (so a query string is excluded).
    pub request_uri: Option<&'a [u8]>,
    /// The `Referer` header value, if that header was seen.
    pub referer: Option<&'a [u8]>,
    /// The `Host` header value, if that header was seen.
    pub host: Option<&'a [u8]>,
}

// RFC3986: pchar = unreserved / pct-encoded / sub-delims / ":" / "@"
// This is looser: '%' is allowed anywhere rather than just in pct-encoded.
#[inline]
pub(crate) fn is_pchar(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
        || (b'&'..=b'.').contains(&ch) // & ' ( ) * + , - .
        || matches!(ch, b'_' | b':' | b'~' | b';' | b'=' | b'@' | b'!' | b'$' | b'%')
}

#[inline]
fn is_uri_byte(ch: u8) -> bool {
    is_pchar(ch) || ch == b'/'
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Consume `literal` if the input continues with it.
    fn eat(&mut self, literal: &[u8]) -> bool {
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    /// Capture the longest run of pchar-like bytes and `/`.
    fn take_uri_run(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.pos < self.buf.len() && is_uri_byte(self.buf[self.pos]) {
            self.pos += 1;
        }
        &self.buf[start..self.pos]
    }

    /// Consume one or more ASCII digits.
    fn eat_digits(&mut self) -> bool {
        let start = self.pos;
        while self.pos < self.buf.len() && self.buf[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        self.pos > start
    }

    fn skip_to_space(&mut self) {
        while self.pos < self.buf.len() && self.buf[self.pos] != b' ' {
            self.pos += 1;
        }
    }

    // OWS = *( SP / HTAB )
    fn skip_ows(&mut self) {
        while self.pos < self.buf.len() && matches!(self.buf[self.pos], b' ' | b'\t') {
            self.pos += 1;
        }
    }

    /// Width of the line terminator at the cursor: `\r\n` is two bytes, a
    /// lone `\r` or `\n` is one, anything else is zero.
    fn newline_width(&self) -> usize {
        match self.rest() {
            [b'\r', b'\n', ..] => 2,
            [b'\r', ..] | [b'\n', ..] => 1,
            _ => 0,
        }
    }

    /// Advance past the next line terminator. Returns false when the buffer
    /// ends before one is found.
    fn skip_past_newline(&mut self) -> bool {
        match memchr2(b'\r', b'\n', self.rest()) {
            Some(offset) => {
                self.pos += offset;
                self.pos += self.newline_width();
                true
            }
            None => false,
        }
    }
}

/// Scan the first chunk of a client request for the request URI and the
/// `Referer` and `Host` header values.
///
/// Returns `None` when the request line does not match
/// `GET <uri> HTTP/<d>.<d>`; the caller relays such chunks untouched. A
/// truncated header block yields whatever fields were seen before the end of
/// the buffer.
pub fn parse_request_head(buf: &[u8]) -> Option<RequestHead<'_>> {
    let mut cur = Cursor::new(buf);

    // Request-Line [RFC7230 3.1.1]: 'method SP request-target SP HTTP-Version CRLF'
    if !cur.eat(b"GET ") {
        return None;
    }

    let request_uri = cur.take_uri_run();
    if request_uri.is_empty() {
        return None;
    }
    cur.skip_to_space(); // any remainder of the URI we did not capture (e.g. query string)

    if !cur.eat(b" HTTP/") || !cur.eat_digits() || !cur.eat(b".") || !cur.eat_digits() {
        return None;
    }

    let mut head = RequestHead {
        request_uri: Some(request_uri),
        ..RequestHead::default()
    };

    // Header fields [RFC7230 3.2]: 'field-name ":" OWS field-value OWS'.
    let mut fields_matched = 0;
    while cur.skip_past_newline() {
        if cur.newline_width() > 0 {
            break; // empty line: end of the header block
        } else if cur.eat(b"Referer:") {
            cur.skip_ows();
            head.referer = Some(cur.take_uri_run());
            fields_matched += 1;
        } else if cur.eat(b"Host:") {
            cur.skip_ows();
            head.host = Some(cur.take_uri_run());
            fields_matched += 1;
        }
        if fields_matched == 2 {
            break;
        }
    }

    Some(head)
}

/// The file extension of a request URI: the bytes after the last `.`,
/// provided they run unbroken to the end of the URI. A dot in an earlier
/// path segment does not count, and a trailing dot yields nothing.
pub fn file_extension(uri: &[u8]) -> Option<&[u8]> {
    let dot = memrchr(b'.', uri)?;
    let ext = &uri[dot + 1..];
    if !ext.is_empty() && ext.iter().copied().all(is_pchar) {
        Some(ext)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_head() {
        let buf = b"GET /img/logo.png HTTP/1.1\r\nHost: example.com\r\nReferer: http://evil.example/page\r\n\r\n";
        let head = parse_request_head(buf).unwrap();
        assert_eq!(head.request_uri, Some(&b"/img/logo.png"[..]));
        assert_eq!(head.host, Some(&b"example.com"[..]));
        assert_eq!(head.referer, Some(&b"http://evil.example/page"[..]));
    }

    #[test]
    fn test_non_get_does_not_match() {
        assert!(parse_request_head(b"POST / HTTP/1.1\r\n\r\n").is_none());
        assert!(parse_request_head(b"get / HTTP/1.1\r\n\r\n").is_none());
        assert!(parse_request_head(b"").is_none());
    }

    #[test]
    fn test_empty_uri_does_not_match() {
        assert!(parse_request_head(b"GET  HTTP/1.1\r\n\r\n").is_none());
    }

    #[test]
    fn test_malformed_version_does_not_match() {
        assert!(parse_request_head(b"GET / HTTP/x.1\r\n\r\n").is_none());
        assert!(parse_request_head(b"GET / HTTP/1\r\n\r\n").is_none());
        assert!(parse_request_head(b"GET / FTP/1.1\r\n\r\n").is_none());
    }

    #[test]
    fn test_query_string_excluded_from_uri() {
        let head = parse_request_head(b"GET /a.png?size=2 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(head.request_uri, Some(&b"/a.png"[..]));
    }

    #[test]
    fn test_newline_variants() {
        for buf in [
            &b"GET /x HTTP/1.0\r\nHost: h\r\nReferer: r\r\n\r\n"[..],
            &b"GET /x HTTP/1.0\nHost: h\nReferer: r\n\n"[..],
            &b"GET /x HTTP/1.0\rHost: h\rReferer: r\r\r"[..],
        ] {
            let head = parse_request_head(buf).unwrap();
            assert_eq!(head.host, Some(&b"h"[..]), "input: {buf:?}");
            assert_eq!(head.referer, Some(&b"r"[..]), "input: {buf:?}");
        }
    }

    #[test]
    fn test_field_names_are_case_sensitive() {
        let head = parse_request_head(b"GET / HTTP/1.1\r\nhost: h\r\nreferer: r\r\n\r\n").unwrap();
        assert_eq!(head.host, None);
        assert_eq!(head.referer, None);
    }

    #[test]
    fn test_stops_at_end_of_header_block() {
        let head =
            parse_request_head(b"GET / HTTP/1.1\r\nHost: h\r\n\r\nReferer: r\r\n").unwrap();
        assert_eq!(head.host, Some(&b"h"[..]));
        assert_eq!(head.referer, None);
    }

    #[test]
    fn test_stops_after_two_fields() {
        let head = parse_request_head(
            b"GET / HTTP/1.1\r\nReferer: r\r\nHost: h\r\nX-Other: ignored",
        )
        .unwrap();
        assert_eq!(head.referer, Some(&b"r"[..]));
        assert_eq!(head.host, Some(&b"h"[..]));
    }

    #[test]
    fn test_truncated_head_returns_partial_fields() {
        // A value cut off by the end of the buffer is still captured; the
        // line that never began is not.
        let head = parse_request_head(b"GET / HTTP/1.1\r\nHost: h").unwrap();
        assert_eq!(head.request_uri, Some(&b"/"[..]));
        assert_eq!(head.host, Some(&b"h"[..]));
        assert_eq!(head.referer, None);
    }

    #[test]
    fn test_ows_skipped_before_values() {
        let head =
            parse_request_head(b"GET / HTTP/1.1\r\nHost: \t  h\r\n\r\n").unwrap();
        assert_eq!(head.host, Some(&b"h"[..]));
    }

    #[test]
    fn test_percent_allowed_anywhere() {
        let head = parse_request_head(b"GET /a%2Fb%zz HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(head.request_uri, Some(&b"/a%2Fb%zz"[..]));
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension(b"/img/logo.png"), Some(&b"png"[..]));
        assert_eq!(file_extension(b"/archive.tar.gz"), Some(&b"gz"[..]));
        assert_eq!(file_extension(b"/plain"), None);
        assert_eq!(file_extension(b"/"), None);
        assert_eq!(file_extension(b""), None);
        // Dot in an earlier segment is not an extension.
        assert_eq!(file_extension(b"/v1.2/data"), None);
        // Trailing dot carries no extension.
        assert_eq!(file_extension(b"/odd."), None);
    }
}
