use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use ulid::Ulid;

use crate::log_sink::{LogLevel, LogSink};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Capability used by the access log to learn which status went out.
pub trait StatusCapture {
    fn record_status(&self, status: StatusCode);

    /// Records the status carried by `response` at the moment its head is
    /// committed, then hands the response on unchanged.
    fn forward(&self, response: Response) -> Response {
        self.record_status(response.status());
        response
    }
}

/// Holds the last status recorded for one request; starts at 200.
#[derive(Debug)]
pub struct StatusRecorder {
    status: AtomicU16,
}

impl Default for StatusRecorder {
    fn default() -> Self {
        Self {
            status: AtomicU16::new(StatusCode::OK.as_u16()),
        }
    }
}

impl StatusRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> u16 {
        self.status.load(Ordering::Relaxed)
    }
}

impl StatusCapture for StatusRecorder {
    fn record_status(&self, status: StatusCode) {
        self.status.store(status.as_u16(), Ordering::Relaxed);
    }
}

#[derive(Clone)]
pub(super) struct AccessLogState {
    sink: Arc<dyn LogSink>,
    routes: Arc<[(String, &'static str)]>,
}

impl AccessLogState {
    /// `routes` maps full request paths to the metric label of their route.
    pub(super) fn new(sink: Arc<dyn LogSink>, routes: Vec<(String, &'static str)>) -> Self {
        Self {
            sink,
            routes: routes.into(),
        }
    }

    fn route_label(&self, path: &str) -> &'static str {
        self.routes
            .iter()
            .find(|(route, _)| route == path)
            .map(|(_, label)| *label)
            .unwrap_or("unmatched")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogLine {
    pub method: String,
    pub host: String,
    pub path: String,
    pub query: String,
    pub client_ip: String,
}

impl AccessLogLine {
    pub fn from_request(req: &Request) -> Self {
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .or_else(|| req.uri().authority().map(|a| a.as_str().to_string()))
            .unwrap_or_default();
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            method: req.method().as_str().to_string(),
            host,
            path: req.uri().path().to_string(),
            query: req.uri().query().unwrap_or_default().to_string(),
            client_ip: client_ip(req.headers(), peer),
        }
    }

    pub fn render(&self, status: u16) -> String {
        format!(
            "[{}] [{}] [{}] [{}] [{}] {}",
            self.method, self.host, self.path, status, self.query, self.client_ip
        )
    }
}

/// Emits the access log line exactly once: on `finish`, or on drop when the
/// request future is abandoned before completing.
struct PendingLogLine {
    line: Option<AccessLogLine>,
    recorder: StatusRecorder,
    sink: Arc<dyn LogSink>,
    route: &'static str,
    started: Instant,
}

impl PendingLogLine {
    fn new(line: AccessLogLine, route: &'static str, sink: Arc<dyn LogSink>) -> Self {
        Self {
            line: Some(line),
            recorder: StatusRecorder::new(),
            sink,
            route,
            started: Instant::now(),
        }
    }

    fn finish(mut self) {
        self.emit();
    }

    fn emit(&mut self) {
        let Some(line) = self.line.take() else {
            return;
        };
        let status = self.recorder.status();
        self.sink.emit(LogLevel::Info, &line.render(status));
        crate::metrics::observe_http_request(
            self.route,
            line.method.as_str(),
            status,
            self.started.elapsed(),
        );
    }
}

impl Drop for PendingLogLine {
    fn drop(&mut self) {
        self.emit();
    }
}

pub(super) async fn access_log(
    State(state): State<AccessLogState>,
    req: Request,
    next: Next,
) -> Response {
    let request_id = extract_request_id(req.headers());
    let route = state.route_label(req.uri().path());
    let pending = PendingLogLine::new(AccessLogLine::from_request(&req), route, state.sink.clone());

    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        method = %req.method(),
        route,
        status = tracing::field::Empty,
    );

    let mut response = next.run(req).instrument(span.clone()).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let response = pending.recorder.forward(response);
    span.record("status", pending.recorder.status());
    pending.finish();
    response
}

/// Resolves the caller address behind proxies. With neither `X-Real-Ip` nor
/// `X-Forwarded-For` present, the socket peer is used. Otherwise the first
/// public address in `X-Forwarded-For` wins, then `X-Real-Ip`. A forwarded
/// chain of only private addresses without `X-Real-Ip` resolves to an empty
/// string, not to the peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim())
            .unwrap_or_default()
    };
    let real_ip = header_str("x-real-ip");
    let forwarded_for = header_str("x-forwarded-for");

    if real_ip.is_empty() && forwarded_for.is_empty() {
        return peer.map(|addr| addr.ip().to_string()).unwrap_or_default();
    }

    for address in forwarded_for.split(',') {
        let address = address.trim();
        if let Ok(ip) = address.parse::<IpAddr>()
            && !is_private_address(ip)
        {
            return address.to_string();
        }
    }

    real_ip.to_string()
}

fn is_private_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

fn extract_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .and_then(sanitize_request_id)
        .unwrap_or_else(|| Ulid::new().to_string())
}

fn sanitize_request_id(raw: &str) -> Option<String> {
    const MAX_LEN: usize = 64;
    let mut out = String::with_capacity(raw.len().min(MAX_LEN));

    for ch in raw.chars() {
        if out.len() >= MAX_LEN {
            break;
        }
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch);
        }
    }

    (!out.is_empty()).then_some(out)
}
