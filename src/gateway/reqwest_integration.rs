// src/gateway/reqwest_integration.rs
use crate::gateway::http::HttpError;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request as HttpRequest, Response as HttpResponse};
use reqwest;
use std::task::{Context, Poll};
use tower::Service;

/// A `tower::Service` wrapper for `reqwest::Client`.
///
/// Accepts a fully built `http::Request<Bytes>` and yields the response with
/// its body collected, whatever the status. Status interpretation is left to
/// the [`Gateway`](super::Gateway).
#[derive(Clone, Debug)]
pub struct ReqwestService {
    client: reqwest::Client,
}

impl ReqwestService {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn new_with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<HttpRequest<Bytes>> for ReqwestService {
    type Response = HttpResponse<Bytes>;
    type Error = HttpError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, http_request: HttpRequest<Bytes>) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move {
            let request = reqwest::Request::try_from(http_request).map_err(classify)?;
            let response = client.execute(request).await.map_err(classify)?;

            let mut builder = HttpResponse::builder()
                .status(response.status())
                .version(response.version());
            if let Some(headers) = builder.headers_mut() {
                headers.extend(response.headers().clone());
            }
            // A connection dropped mid-body surfaces here, not in `execute`.
            let body = response.bytes().await.map_err(classify)?;

            builder.body(body).map_err(|source| HttpError::BuildRequest { source })
        })
    }
}

fn classify(error: reqwest::Error) -> HttpError {
    if error.is_timeout() {
        warn!(error = %error, "Request timed out");
        HttpError::Timeout
    } else {
        if error.is_connect() {
            warn!(error = %error, "Connection error");
        } else {
            warn!(error = %error, "Transport error");
        }
        HttpError::Transport {
            source: Box::new(error),
        }
    }
}
