//! Shared fixtures: sample documents, an in-process transport and a raw TCP
//! mock of the document endpoint.

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::Duration,
};

use bytes::Bytes;
use chrono::NaiveDate;
use crpt_api::{
    CrptApiConfig,
    gateway::http::HttpError,
    model::{Description, Document, DocumentRequest, DocumentStatus, DocumentType, Product},
};
use futures::future::BoxFuture;
use http::{Request as HttpRequest, Response as HttpResponse};
use serde::Deserialize;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::Instant,
};
use tower::Service;

pub const INN: &str = "7707083893";
pub const OTHER_INN: &str = "7728168971";

pub fn document(reg_number: &str) -> Document {
    Document::builder()
        .description(Description::new(INN).unwrap())
        .doc_status(DocumentStatus::New)
        .doc_type(DocumentType::LpIntroduceGoods)
        .owner_inn(INN)
        .participant_inn(INN)
        .producer_inn(OTHER_INN)
        .products(vec![
            Product::builder()
                .owner_inn(INN)
                .producer_inn(OTHER_INN)
                .production_date(NaiveDate::from_ymd_opt(2020, 1, 23).unwrap())
                .tnved_code("6401100000")
                .build()
                .unwrap(),
        ])
        .reg_date("2020-01-23")
        .reg_number(reg_number)
        .build()
        .unwrap()
}

/// Response body echoed by [`MockTransport`].
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub reg_number: String,
}

#[derive(Debug, Clone)]
pub struct Dispatch {
    pub at: Instant,
    pub reg_number: String,
}

type Latency = Arc<dyn Fn(&str) -> Duration + Send + Sync>;

/// In-process transport that records each dispatch and answers
/// `200 {"reg_number": ...}` after a per-document latency.
#[derive(Clone)]
pub struct MockTransport {
    dispatches: Arc<Mutex<Vec<Dispatch>>>,
    latency: Latency,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_latency(|_| Duration::ZERO)
    }

    pub fn with_latency(latency: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        Self {
            dispatches: Arc::default(),
            latency: Arc::new(latency),
        }
    }

    pub fn dispatches(&self) -> Vec<Dispatch> {
        self.dispatches.lock().unwrap().clone()
    }

    pub fn reg_numbers(&self) -> Vec<String> {
        self.dispatches()
            .into_iter()
            .map(|d| d.reg_number)
            .collect()
    }
}

impl Service<HttpRequest<Bytes>> for MockTransport {
    type Response = HttpResponse<Bytes>;
    type Error = HttpError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: HttpRequest<Bytes>) -> Self::Future {
        let sent: DocumentRequest =
            serde_json::from_slice(request.body()).expect("gateway sends a DocumentRequest");
        let reg_number = sent.document.reg_number;
        self.dispatches.lock().unwrap().push(Dispatch {
            at: Instant::now(),
            reg_number: reg_number.clone(),
        });
        let latency = (self.latency)(&reg_number);

        Box::pin(async move {
            tokio::time::sleep(latency).await;
            let body = serde_json::json!({ "reg_number": reg_number }).to_string();
            Ok(HttpResponse::builder()
                .status(200)
                .body(Bytes::from(body))
                .unwrap())
        })
    }
}

/// Config pointing at the default endpoint; only useful with a custom transport.
pub fn config(window: Duration, request_limit: usize) -> CrptApiConfig {
    CrptApiConfig::new(window, request_limit)
}

/// What the mock server does with each request.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Respond {
        status: u16,
        body: &'static str,
        delay: Duration,
    },
    /// Close the socket as soon as the request headers have arrived.
    DropAfterHeaders,
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub at: std::time::Instant,
    pub head: String,
    pub body: String,
}

/// One-request-per-connection HTTP/1.1 server on a random local port.
pub struct MockServer {
    addr: SocketAddr,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl MockServer {
    pub async fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits: Arc<Mutex<Vec<Hit>>> = Arc::default();

        let recorded = hits.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, reply, recorded.clone()));
            }
        });

        Self { addr, hits }
    }

    pub fn config(&self, window: Duration, request_limit: usize) -> CrptApiConfig {
        CrptApiConfig::builder()
            .window(window)
            .request_limit(request_limit)
            .host(format!("http://{}", self.addr.ip()))
            .port(self.addr.port())
            .call_timeout(Duration::from_secs(5))
            .build()
    }

    pub fn hits(&self) -> Vec<Hit> {
        let mut hits = self.hits.lock().unwrap().clone();
        hits.sort_by_key(|hit| hit.at);
        hits
    }
}

async fn serve(mut stream: TcpStream, reply: Reply, hits: Arc<Mutex<Vec<Hit>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };
    let at = std::time::Instant::now();
    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();

    if let Reply::DropAfterHeaders = reply {
        hits.lock().unwrap().push(Hit {
            at,
            head,
            body: String::new(),
        });
        return;
    }

    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let body = String::from_utf8_lossy(&buf[head_end..head_end + content_length]).into_owned();
    hits.lock().unwrap().push(Hit { at, head, body });

    if let Reply::Respond {
        status,
        body,
        delay,
    } = reply
    {
        tokio::time::sleep(delay).await;
        let response = format!(
            "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
