//! Stateless sender for the document creation endpoint.
//!
//! [`Gateway`] turns one serializable body into one `POST`, and the answer
//! into either a decoded value or an [`HttpError`]. It does not retry and
//! never logs bodies.

pub mod http;
pub mod reqwest_integration;

use std::{fmt, sync::Arc, time::Instant};

use ::http::{
    HeaderMap, HeaderValue, Method, Request as HttpRequest, Response as HttpResponse, StatusCode,
    header::{CONTENT_TYPE, USER_AGENT},
};
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use snafu::ResultExt;
use tower::{Service, ServiceExt};
use url::Url;

use crate::{Error as CrateError, submitter::internal_event::GatewayResponded};
use self::http::{BuildRequestSnafu, HttpError, ResponseParseSnafu, SerializationSnafu};

/// Supplies extra headers (typically authentication) for each outgoing request.
pub type HeaderProvider = Arc<dyn Fn() -> HeaderMap + Send + Sync>;

#[derive(Clone)]
pub struct Gateway<S> {
    service: S,
    endpoint: Url,
    user_agent: HeaderValue,
    header_provider: Option<HeaderProvider>,
}

impl<S> Gateway<S>
where
    S: Service<HttpRequest<Bytes>, Response = HttpResponse<Bytes>> + Clone,
    S::Error: Into<CrateError>,
{
    pub fn new(
        service: S,
        endpoint: Url,
        user_agent: HeaderValue,
        header_provider: Option<HeaderProvider>,
    ) -> Self {
        Self {
            service,
            endpoint,
            user_agent,
            header_provider,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Posts `body` as JSON and decodes a 200/201 answer as `Resp`.
    pub async fn call<Req, Resp>(&self, body: &Req) -> Result<Resp, HttpError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let request = self.build_request(body)?;
        let started = Instant::now();

        let mut service = self.service.clone();
        let response = service
            .ready()
            .await
            .map_err(|e| HttpError::from_boxed(e.into()))?
            .call(request)
            .await
            .map_err(|e| HttpError::from_boxed(e.into()))?;

        let (parts, body) = response.into_parts();
        GatewayResponded {
            path: self.endpoint.path(),
            status: parts.status,
            body_len: body.len(),
            elapsed: started.elapsed(),
        }
        .emit();

        decode(parts.status, body)
    }

    fn build_request<Req>(&self, body: &Req) -> Result<HttpRequest<Bytes>, HttpError>
    where
        Req: Serialize + ?Sized,
    {
        let payload = Bytes::from(serde_json::to_vec(body).context(SerializationSnafu)?);

        let mut request = HttpRequest::builder()
            .method(Method::POST)
            .uri(self.endpoint.as_str())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(USER_AGENT, self.user_agent.clone())
            .body(payload)
            .context(BuildRequestSnafu)?;

        if let Some(provider) = &self.header_provider {
            // Provided headers replace the defaults of the same name.
            request.headers_mut().extend(provider());
        }
        Ok(request)
    }
}

fn decode<Resp: DeserializeOwned>(status: StatusCode, body: Bytes) -> Result<Resp, HttpError> {
    match status {
        StatusCode::OK | StatusCode::CREATED => {
            serde_json::from_slice(&body).with_context(|_| ResponseParseSnafu {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        }
        s if s.is_client_error() => Err(HttpError::ClientError {
            status: s.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        }),
        s if s.is_server_error() => Err(HttpError::ServerError {
            status: s.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        }),
        s => Err(HttpError::UnexpectedStatus {
            status: s.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        }),
    }
}

impl<S> fmt::Debug for Gateway<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("endpoint", &self.endpoint.as_str())
            .field("user_agent", &self.user_agent)
            .field("header_provider", &self.header_provider.is_some())
            .finish()
    }
}
