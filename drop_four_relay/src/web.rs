// HTTP collaborator: entry pages, static assets and preference cookies.
//
// Runs on its own thread with `tiny_http` and shares nothing with the relay
// core. Routes:
//
//   GET  /                 -> <public_dir>/index.html
//   GET  /room/<id>        -> <public_dir>/game.html
//   GET  /<path>           -> <public_dir>/<path> (no `..` segments)
//   POST /username, /theme -> form field of the same name echoed back as a
//                             cookie of the same name
//
// The cookies are display preferences for the browser only; the relay never
// reads them. Routing is a pure function (`route`) so it can be tested
// without sockets.

use std::fs;
use std::io::Read;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::error::{RelayError, Result};

/// Preference fields accepted by `POST /<name>`.
const PREFERENCES: [&str; 2] = ["username", "theme"];

#[derive(Clone, Debug)]
pub struct WebConfig {
    pub bind: String,
    pub port: u16,
    pub public_dir: PathBuf,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8080,
            public_dir: PathBuf::from("public"),
        }
    }
}

pub struct WebHandle {
    server: Arc<Server>,
    thread: Option<JoinHandle<()>>,
}

impl WebHandle {
    pub fn stop(mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Start serving on a background thread. Returns the bound address.
pub fn start_web(config: WebConfig) -> Result<(WebHandle, SocketAddr)> {
    let addr = format!("{}:{}", config.bind, config.port);
    let server = Server::http(&addr).map_err(|e| RelayError::Web(format!("{addr}: {e}")))?;
    let local_addr = server
        .server_addr()
        .to_ip()
        .ok_or_else(|| RelayError::Web(format!("{addr}: not an IP listener")))?;
    let server = Arc::new(server);

    let worker = server.clone();
    let public_dir = config.public_dir;
    let thread = thread::spawn(move || {
        for request in worker.incoming_requests() {
            serve(request, &public_dir);
        }
    });

    info!(addr = %local_addr, "web server listening");
    Ok((
        WebHandle {
            server,
            thread: Some(thread),
        },
        local_addr,
    ))
}

/// Outcome of routing one request, independent of the HTTP library.
#[derive(Debug, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub set_cookie: Option<String>,
    pub body: Vec<u8>,
}

impl Reply {
    fn status(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            set_cookie: None,
            body: Vec::new(),
        }
    }
}

fn serve(mut request: Request, public_dir: &Path) {
    let mut body = Vec::new();
    if let Err(e) = request.as_reader().read_to_end(&mut body) {
        warn!(error = %e, "failed to read request body");
        return;
    }
    let reply = route(request.method(), request.url(), &body, public_dir);
    debug!(method = ?request.method(), url = request.url(), status = reply.status, "http");

    let mut response = Response::from_data(reply.body).with_status_code(reply.status);
    if let Some(content_type) = reply.content_type {
        add_header(&mut response, "Content-Type", content_type);
    }
    if let Some(cookie) = reply.set_cookie {
        add_header(&mut response, "Set-Cookie", &cookie);
    }
    if let Err(e) = request.respond(response) {
        debug!(error = %e, "failed to send response");
    }
}

fn add_header<R: Read>(response: &mut Response<R>, name: &str, value: &str) {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(header) => response.add_header(header),
        Err(()) => warn!(header = name, "invalid header value dropped"),
    }
}

/// Map a request onto a reply.
pub fn route(method: &Method, url: &str, body: &[u8], public_dir: &Path) -> Reply {
    let path = url.split(['?', '#']).next().unwrap_or_default();

    match method {
        Method::Get => match path {
            "/" => file_reply(&public_dir.join("index.html")),
            _ => match path.strip_prefix("/room/") {
                Some(id) if !id.is_empty() && !id.contains('/') => {
                    file_reply(&public_dir.join("game.html"))
                }
                _ => static_reply(path, public_dir),
            },
        },
        Method::Post => {
            let name = path.trim_start_matches('/');
            if !PREFERENCES.contains(&name) {
                return Reply::status(404);
            }
            match form_field(body, name) {
                Some(value) => {
                    info!(preference = name, %value, "setting preference cookie");
                    let encoded: String =
                        form_urlencoded::byte_serialize(value.as_bytes()).collect();
                    Reply {
                        set_cookie: Some(format!("{name}={encoded}; Path=/")),
                        ..Reply::status(200)
                    }
                }
                None => Reply::status(400),
            }
        }
        _ => Reply::status(405),
    }
}

fn form_field(body: &[u8], name: &str) -> Option<String> {
    form_urlencoded::parse(body)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn static_reply(path: &str, public_dir: &Path) -> Reply {
    let relative = Path::new(path.trim_start_matches('/'));
    let safe = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !safe || relative.as_os_str().is_empty() {
        return Reply::status(404);
    }
    file_reply(&public_dir.join(relative))
}

fn file_reply(path: &Path) -> Reply {
    match fs::read(path) {
        Ok(body) => Reply {
            status: 200,
            content_type: Some(content_type(path)),
            set_cookie: None,
            body,
        },
        Err(_) => Reply::status(404),
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
