use crate::config::LokiConfig;
use crate::error::LokiError;
use crate::push::PushRequest;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Certificate, Client, Identity, StatusCode};
use std::error::Error;
use std::fmt;

/// Result of a single push attempt. Every variant is final: the batch is
/// never retried.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The server answered `204 No Content`.
    Delivered,
    /// The server answered with any other status.
    Rejected { status: u16, body: String },
    /// The request never got a response (connect, TLS, timeout, encoding).
    Failed(Box<dyn Error + Send + Sync>),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Delivered => write!(f, "delivered"),
            DeliveryOutcome::Rejected { status, body } => {
                write!(f, "rejected with status {}: {}", status, body)
            }
            DeliveryOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Destination for batches drained by the flush loop.
///
/// The loop awaits `send` inline, so at most one call is in flight per sink
/// and batches arrive in the order they were drained. Implementations report
/// problems through the returned [`DeliveryOutcome`] rather than panicking.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one batch, already grouped into streams.
    async fn send(&self, request: &PushRequest) -> DeliveryOutcome;
}

/// Loki push API client over HTTP(S).
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    auth_header: Option<String>,
}

impl HttpTransport {
    /// Build the HTTP client once; it is reused (and pooled) for every push.
    pub fn new(config: &LokiConfig) -> Result<Self, LokiError> {
        let mut builder = Client::builder().timeout(config.request_timeout);

        if let Some(tls) = &config.tls {
            builder = builder.use_rustls_tls();
            if let Some(pem) = &tls.ca_cert_pem {
                let cert = Certificate::from_pem(pem).map_err(LokiError::Certificate)?;
                builder = builder.add_root_certificate(cert);
            }
            if let Some(pem) = &tls.identity_pem {
                let identity = Identity::from_pem(pem).map_err(LokiError::Identity)?;
                builder = builder.identity(identity);
            }
            if tls.accept_invalid_certs {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        let client = builder.build().map_err(LokiError::Client)?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            auth_header: config.basic_auth_header(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn auth_header(&self) -> Option<&str> {
        self.auth_header.as_deref()
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("basic_auth", &self.auth_header.is_some())
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &PushRequest) -> DeliveryOutcome {
        let body = match serde_json::to_vec(request) {
            Ok(body) => body,
            Err(e) => return DeliveryOutcome::Failed(Box::new(e)),
        };

        let mut req = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(auth) = &self.auth_header {
            req = req.header(AUTHORIZATION, auth);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => return DeliveryOutcome::Failed(Box::new(e)),
        };

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            DeliveryOutcome::Delivered
        } else {
            let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            DeliveryOutcome::Rejected {
                status: status.as_u16(),
                body,
            }
        }
    }
}
