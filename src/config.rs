use std::{fmt, time::Duration};

use bon::Builder;
use http::HeaderValue;
use snafu::ensure;
use tokio::sync::Semaphore;
use url::Url;

use crate::{
    error::{ConfigurationSnafu, CrptApiError},
    gateway::HeaderProvider,
};

pub const DEFAULT_HOST: &str = "https://ismp.crpt.ru";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_PATH: &str = "/api/v3/lk/documents/create";
pub const DEFAULT_USER_AGENT: &str = "CrptApi";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Workers per unit of `request_limit` when the pool size is not given.
const DEFAULT_WORKERS_PER_REQUEST: usize = 20;

/// HTTP protocol used to talk to the endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HttpVersion {
    #[default]
    Http11,
    Http2,
}

/// Sizing of the pool that runs admitted submissions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Builder)]
pub struct WorkerPoolConfig {
    /// Submissions allowed in flight (or waiting for admission) at once.
    /// Defaults to twenty per unit of `request_limit`.
    pub max_workers: Option<usize>,
}

/// Everything needed to construct a [`CrptApi`](crate::CrptApi).
///
/// Only `window` and `request_limit` are required:
///
/// ```rust
/// use std::time::Duration;
/// use crpt_api::CrptApiConfig;
///
/// let config = CrptApiConfig::builder()
///     .window(Duration::from_secs(1))
///     .request_limit(10)
///     .call_timeout(Duration::from_secs(5))
///     .build();
/// assert_eq!(config.endpoint().unwrap().as_str(), "https://ismp.crpt.ru/api/v3/lk/documents/create");
/// ```
#[derive(Clone, Builder)]
pub struct CrptApiConfig {
    /// Length of the sliding window `request_limit` applies to.
    pub window: Duration,
    /// Dispatches allowed in any one window.
    pub request_limit: usize,
    /// Scheme and host, e.g. `https://ismp.crpt.ru`.
    #[builder(into, default = DEFAULT_HOST.to_string())]
    pub host: String,
    #[builder(default = DEFAULT_PORT)]
    pub port: u16,
    #[builder(into, default = DEFAULT_PATH.to_string())]
    pub path: String,
    #[builder(default)]
    pub http_version: HttpVersion,
    #[builder(default = DEFAULT_CONNECT_TIMEOUT)]
    pub connect_timeout: Duration,
    /// Whole-exchange timeout enforced by the HTTP client.
    #[builder(default = DEFAULT_CALL_TIMEOUT)]
    pub call_timeout: Duration,
    #[builder(into, default = DEFAULT_USER_AGENT.to_string())]
    pub user_agent: String,
    pub header_provider: Option<HeaderProvider>,
    #[builder(default)]
    pub worker_pool: WorkerPoolConfig,
    /// Deadline for one `submit`, admission wait included. `None` waits for
    /// admission as long as it takes.
    pub call_deadline: Option<Duration>,
}

impl CrptApiConfig {
    pub fn new(window: Duration, request_limit: usize) -> Self {
        Self::builder()
            .window(window)
            .request_limit(request_limit)
            .build()
    }

    pub fn endpoint(&self) -> Result<Url, CrptApiError> {
        let raw = format!("{}:{}{}", self.host.trim_end_matches('/'), self.port, self.path);
        Url::parse(&raw).map_err(|e| CrptApiError::Configuration {
            message: format!("invalid endpoint `{raw}`: {e}"),
        })
    }

    pub(crate) fn user_agent_header(&self) -> Result<HeaderValue, CrptApiError> {
        HeaderValue::from_str(&self.user_agent).map_err(|e| CrptApiError::Configuration {
            message: format!("invalid user agent `{}`: {e}", self.user_agent),
        })
    }

    pub(crate) fn max_workers(&self) -> usize {
        self.worker_pool
            .max_workers
            .unwrap_or_else(|| self.request_limit.saturating_mul(DEFAULT_WORKERS_PER_REQUEST))
            .min(Semaphore::MAX_PERMITS)
            .min(u32::MAX as usize)
    }

    /// Checks every value that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), CrptApiError> {
        ensure!(
            self.request_limit > 0,
            ConfigurationSnafu {
                message: format!("request_limit must be positive, got {}", self.request_limit),
            }
        );
        ensure!(
            !self.window.is_zero(),
            ConfigurationSnafu {
                message: "window must be longer than zero",
            }
        );
        ensure!(
            self.max_workers() > 0,
            ConfigurationSnafu {
                message: "worker_pool.max_workers must be positive",
            }
        );
        self.endpoint()?;
        self.user_agent_header()?;
        Ok(())
    }

    pub(crate) fn reqwest_client(&self) -> Result<reqwest::Client, CrptApiError> {
        let builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.call_timeout);
        let builder = match self.http_version {
            HttpVersion::Http11 => builder.http1_only(),
            HttpVersion::Http2 => builder.http2_prior_knowledge(),
        };
        builder.build().map_err(|e| CrptApiError::Configuration {
            message: format!("failed to build HTTP client: {e}"),
        })
    }
}

impl fmt::Debug for CrptApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrptApiConfig")
            .field("window", &self.window)
            .field("request_limit", &self.request_limit)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("http_version", &self.http_version)
            .field("connect_timeout", &self.connect_timeout)
            .field("call_timeout", &self.call_timeout)
            .field("user_agent", &self.user_agent)
            .field("header_provider", &self.header_provider.is_some())
            .field("worker_pool", &self.worker_pool)
            .field("call_deadline", &self.call_deadline)
            .finish()
    }
}
