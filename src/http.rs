use std::fs;
use std::path::Path;
use std::time::SystemTime;

use thiserror::Error;

/// Advertised in the `Server` header of every response.
pub const SERVER_NAME: &str = "iotmon";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mime {
    Html,
    Jpeg,
    Icon,
    Json,
}

impl Mime {
    pub fn as_str(self) -> &'static str {
        match self {
            Mime::Html => "text/html",
            Mime::Jpeg => "image/jpeg",
            Mime::Icon => "image/x-icon",
            Mime::Json => "application/json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
}

impl Status {
    pub fn code_text(self) -> &'static str {
        match self {
            Status::Ok => "200 OK",
            Status::NotFound => "404 Not Found",
        }
    }
}

/// Whether the server intends to keep the connection open after a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnDirective {
    Close,
    KeepAlive,
}

impl ConnDirective {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnDirective::Close => "close",
            ConnDirective::KeepAlive => "keep-alive",
        }
    }
}

/// One parsed request line. Lives for a single exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub route: String,
}

/// A malformed request line. The connection is simply not advanced; no
/// response is forced.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty request")]
    Empty,
    #[error("request line is not valid text")]
    Encoding,
    #[error("unknown method token")]
    UnknownMethod,
    #[error("request line carries no route")]
    MissingRoute,
}

/// Splits the request line on whitespace: the first token selects the method
/// from a fixed table, the second is the route, copied verbatim. A missing
/// token is a parse failure, never an out-of-bounds read.
///
/// Only the bytes up to the first line break are inspected; headers and
/// body may carry arbitrary binary data.
pub fn parse_request(raw: &[u8]) -> Result<Request, ParseError> {
    let line = raw
        .split(|&b| b == b'\r' || b == b'\n')
        .next()
        .unwrap_or(raw);
    let text = core::str::from_utf8(line).map_err(|_| ParseError::Encoding)?;
    let mut tokens = text.split_ascii_whitespace();
    let method = tokens
        .next()
        .ok_or(ParseError::Empty)
        .and_then(|tok| Method::from_token(tok).ok_or(ParseError::UnknownMethod))?;
    let route = tokens.next().ok_or(ParseError::MissingRoute)?;
    Ok(Request {
        method,
        route: route.to_string(),
    })
}

/// What to send back. A `target` starting with `/` names a file under the
/// web root; anything else is the literal response body (the `/update` JSON
/// takes that path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub target: String,
    pub mime: Mime,
    pub status: Status,
    pub conn: ConnDirective,
}

impl Response {
    pub fn not_found() -> Self {
        Self {
            target: "/not_found.html".to_string(),
            mime: Mime::Html,
            status: Status::NotFound,
            conn: ConnDirective::Close,
        }
    }
}

/// Serializes a response into the single buffer written back to the socket:
/// status line, fixed header block, blank line, raw body bytes.
///
/// A file target that cannot be opened, or that reads back zero bytes,
/// degrades to the 404 response: the connection always gets *a* response,
/// it is never left hanging. If even the 404 page is unreadable the body is
/// empty and only the header block goes out.
pub fn build_response(web_root: &Path, mut res: Response) -> Vec<u8> {
    let body = match resolve_body(web_root, &res) {
        Some(body) => body,
        None => {
            res = Response::not_found();
            resolve_body(web_root, &res).unwrap_or_default()
        }
    };
    render(&res, &body)
}

fn resolve_body(web_root: &Path, res: &Response) -> Option<Vec<u8>> {
    if let Some(rel) = res.target.strip_prefix('/') {
        match fs::read(web_root.join(rel)) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            _ => None,
        }
    } else {
        Some(res.target.clone().into_bytes())
    }
}

fn render(res: &Response, body: &[u8]) -> Vec<u8> {
    let header = format!(
        "HTTP/1.1 {}\r\n\
         Server: {}\r\n\
         Date: {}\r\n\
         Content-Length: {}\r\n\
         Content-Type: {}\r\n\
         Content-Language: en\r\n\
         Connection: {}\r\n\r\n",
        res.status.code_text(),
        SERVER_NAME,
        httpdate::fmt_http_date(SystemTime::now()),
        body.len(),
        res.mime.as_str(),
        res.conn.as_str(),
    );
    let mut out = Vec::with_capacity(header.len() + body.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(body);
    out
}
