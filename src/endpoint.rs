//! endpoint: expose the query service over HTTP (tiny_http).
//!
//! `Endpoint::start` is the on_start hook, `Endpoint::stop` (or Drop) is on_stop.
//! Registration is all-or-nothing: if the listener cannot be bound or the
//! serving thread cannot be spawned, nothing keeps running.
//!
//! Routes:
//! - GET /kseg?offset=N&len=M  -> window of a fresh snapshot
//!                                (header X-Kseg-Consumed: <bytes returned>)
//! - GET /metrics              -> Prometheus text
//! - GET /, /health            -> OK
//!
//! Interrupted -> 503, OutOfMemory -> 507, bad parameters -> 400.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use tiny_http::{Header, Request, Response, Server};

use crate::error::{QueryError, QueryResult};
use crate::metrics;
use crate::service::{Interrupt, SnapshotService};

pub const CONSUMED_HEADER: &str = "X-Kseg-Consumed";

pub struct Endpoint {
    server: Arc<Server>,
    local_addr: Option<SocketAddr>,
    stopping: Arc<AtomicBool>,
    intr: Interrupt,
    handle: Option<JoinHandle<()>>,
}

impl Endpoint {
    pub fn start(addr: &str, service: Arc<SnapshotService>) -> QueryResult<Self> {
        let server = Server::http(addr)
            .map_err(|e| QueryError::UnsupportedPlatform(format!("bind http at {}: {}", addr, e)))?;
        let server = Arc::new(server);
        let local_addr = server.server_addr().to_ip();

        let stopping = Arc::new(AtomicBool::new(false));
        let intr = Interrupt::new();

        let th_server = Arc::clone(&server);
        let th_stopping = Arc::clone(&stopping);
        let th_intr = intr.clone();
        // При ошибке spawn замыкание (и его клоны Arc) дропается, сокет закроется вместе с server.
        let handle = thread::Builder::new()
            .name("ksegmap-http".into())
            .spawn(move || serve_loop(&th_server, &service, &th_stopping, &th_intr))
            .map_err(|e| QueryError::UnsupportedPlatform(format!("spawn http thread: {}", e)))?;

        info!(
            "ksegmap endpoint listening on {}",
            local_addr
                .map(|a| a.to_string())
                .unwrap_or_else(|| addr.to_string())
        );
        Ok(Self {
            server,
            local_addr,
            stopping,
            intr,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// on_stop: unblock the server, abort waiting queries, join the thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Block until the serving thread exits (it exits only after stop).
    pub fn wait(mut self) {
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }

    fn shutdown(&mut self) {
        let Some(h) = self.handle.take() else {
            return;
        };
        self.stopping.store(true, Ordering::SeqCst);
        self.intr.raise();
        self.server.unblock();
        if h.join().is_err() {
            warn!("ksegmap endpoint thread panicked");
        }
        info!("ksegmap endpoint stopped");
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve_loop(server: &Server, service: &SnapshotService, stopping: &AtomicBool, intr: &Interrupt) {
    loop {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        let rq = match server.recv() {
            Ok(rq) => rq,
            Err(e) => {
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
                warn!("http recv error: {}", e);
                continue;
            }
        };
        handle(rq, service, intr);
    }
}

fn handle(rq: Request, service: &SnapshotService, intr: &Interrupt) {
    let url = rq.url().to_string();
    let method = rq.method().as_str().to_string();
    debug!("http {} {}", method, url);

    let (path, query) = match url.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (url.clone(), String::new()),
    };

    if method != "GET" {
        let _ = rq.respond(Response::from_string("method not allowed\n").with_status_code(405));
        return;
    }

    match path.as_str() {
        "/" | "/health" => {
            let _ = rq.respond(Response::from_string("OK\n").with_status_code(200));
        }
        "/metrics" => {
            let mut resp = Response::from_string(metrics::render_prometheus());
            if let Ok(ct) = Header::from_bytes(&b"Content-Type"[..], &b"text/plain; version=0.0.4"[..]) {
                resp.add_header(ct);
            }
            let _ = rq.respond(resp);
        }
        "/kseg" => {
            let (offset, len) = match parse_window(&query, service.capacity()) {
                Ok(v) => v,
                Err(msg) => {
                    let _ = rq.respond(Response::from_string(msg).with_status_code(400));
                    return;
                }
            };
            match service.query(offset, len, intr) {
                Ok(chunk) => {
                    let mut resp = Response::from_data(chunk.bytes);
                    if let Ok(h) = Header::from_bytes(
                        CONSUMED_HEADER.as_bytes(),
                        chunk.consumed.to_string().as_bytes(),
                    ) {
                        resp.add_header(h);
                    }
                    if let Ok(ct) = Header::from_bytes(&b"Content-Type"[..], &b"text/csv"[..]) {
                        resp.add_header(ct);
                    }
                    let _ = rq.respond(resp);
                }
                Err(e) => {
                    let code: u16 = match e {
                        QueryError::Interrupted => 503,
                        QueryError::OutOfMemory(_) => 507,
                        QueryError::UnsupportedPlatform(_) => 500,
                    };
                    let _ = rq.respond(Response::from_string(format!("{}\n", e)).with_status_code(code));
                }
            }
        }
        _ => {
            let _ = rq.respond(Response::from_string("not found\n").with_status_code(404));
        }
    }
}

/// "offset=10&len=20" -> (10, 20). Missing offset = 0, missing len = whole capacity.
pub fn parse_window(query: &str, default_len: usize) -> Result<(u64, usize), String> {
    let mut offset = 0u64;
    let mut len = default_len;
    for kv in query.split('&').filter(|s| !s.is_empty()) {
        let (k, v) = kv.split_once('=').unwrap_or((kv, ""));
        match k {
            "offset" => {
                offset = v
                    .parse()
                    .map_err(|_| format!("bad offset '{}'\n", v))?;
            }
            "len" => {
                len = v.parse().map_err(|_| format!("bad len '{}'\n", v))?;
            }
            _ => {}
        }
    }
    Ok((offset, len))
}
