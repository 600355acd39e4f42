use crate::error::LokiError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ADDR: &str = "localhost:3100";
pub const DEFAULT_PATH: &str = "/loki/api/v1/push";
pub const DEFAULT_MAX_BATCH_WAIT: Duration = Duration::from_millis(3000);
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Client-side TLS settings. Supplying any `TlsConfig` switches the sink to
/// `https`, even when every field is left at its default.
#[derive(Clone, Default)]
pub struct TlsConfig {
    /// Extra root certificate, PEM encoded.
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Client certificate chain and private key, PEM encoded.
    pub identity_pem: Option<Vec<u8>>,
    pub accept_invalid_certs: bool,
}

impl TlsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ca_file(mut self, path: impl AsRef<Path>) -> Result<Self, LokiError> {
        self.ca_cert_pem = Some(read_file(path.as_ref())?);
        Ok(self)
    }

    pub fn with_identity_file(mut self, path: impl AsRef<Path>) -> Result<Self, LokiError> {
        self.identity_pem = Some(read_file(path.as_ref())?);
        Ok(self)
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca_cert_pem", &self.ca_cert_pem.as_ref().map(Vec::len))
            .field("identity_pem", &self.identity_pem.as_ref().map(|_| "<redacted>"))
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, LokiError> {
    fs::read(path).map_err(|source| LokiError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Configuration for [`LokiSink`](crate::sink::LokiSink).
///
/// Every field is optional. The `with_*` setters ignore values that would
/// break the sink (empty address, zero batch size, sub-millisecond wait)
/// and keep the current value instead, and [`normalized`](Self::normalized)
/// applies the same rules to fields set directly.
#[derive(Clone)]
pub struct LokiConfig {
    /// `host:port` of the Loki server. A leading `http://` or `https://` is
    /// stripped; the scheme follows from `tls`.
    pub addr: String,
    pub path: String,
    pub username: String,
    pub password: String,
    pub tls: Option<TlsConfig>,
    /// Static labels. Invalid names are dropped when the sink is built.
    pub labels: Vec<(String, String)>,
    pub max_batch_wait: Duration,
    pub max_batch_size: usize,
    /// Timeout applied to every push request.
    pub request_timeout: Duration,
    /// Upper bound on the final push performed by `stop`.
    pub shutdown_timeout: Duration,
}

impl Default for LokiConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            path: DEFAULT_PATH.to_string(),
            username: String::new(),
            password: String::new(),
            tls: None,
            labels: Vec::new(),
            max_batch_wait: DEFAULT_MAX_BATCH_WAIT,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl LokiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        let addr = addr.into();
        if !addr.is_empty() {
            self.addr = addr;
        }
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !path.is_empty() {
            self.path = path;
        }
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    pub fn with_max_batch_wait(mut self, wait: Duration) -> Self {
        if wait.as_millis() > 0 {
            self.max_batch_wait = wait;
        }
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        if size > 0 {
            self.max_batch_size = size;
        }
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.request_timeout = timeout;
        }
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.shutdown_timeout = timeout;
        }
        self
    }

    /// Replace unusable values with their defaults and strip any scheme from
    /// the address.
    pub fn normalized(mut self) -> Self {
        let addr = strip_scheme(&self.addr).to_string();
        self.addr = if addr.is_empty() { DEFAULT_ADDR.to_string() } else { addr };
        if self.path.is_empty() {
            self.path = DEFAULT_PATH.to_string();
        }
        if self.max_batch_wait.as_millis() == 0 {
            self.max_batch_wait = DEFAULT_MAX_BATCH_WAIT;
        }
        if self.max_batch_size == 0 {
            self.max_batch_size = DEFAULT_MAX_BATCH_SIZE;
        }
        if self.request_timeout.is_zero() {
            self.request_timeout = DEFAULT_REQUEST_TIMEOUT;
        }
        if self.shutdown_timeout.is_zero() {
            self.shutdown_timeout = DEFAULT_SHUTDOWN_TIMEOUT;
        }
        self
    }

    /// Address with the scheme chosen by the TLS setting, e.g.
    /// `https://loki:3100`.
    pub fn effective_addr(&self) -> String {
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        format!("{}://{}", scheme, strip_scheme(&self.addr))
    }

    /// Full push URL.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.effective_addr(), self.path)
    }

    /// `Authorization` header value, present only when both username and
    /// password are set.
    pub fn basic_auth_header(&self) -> Option<String> {
        if self.username.is_empty() || self.password.is_empty() {
            return None;
        }
        let credentials = format!("{}:{}", self.username, self.password);
        Some(format!("Basic {}", STANDARD.encode(credentials)))
    }
}

impl fmt::Debug for LokiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LokiConfig")
            .field("addr", &self.addr)
            .field("path", &self.path)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .field("tls", &self.tls)
            .field("labels", &self.labels)
            .field("max_batch_wait", &self.max_batch_wait)
            .field("max_batch_size", &self.max_batch_size)
            .field("request_timeout", &self.request_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

fn strip_scheme(addr: &str) -> &str {
    addr.strip_prefix("http://")
        .or_else(|| addr.strip_prefix("https://"))
        .unwrap_or(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LokiConfig::default();
        assert_eq!(config.effective_addr(), "http://localhost:3100");
        assert_eq!(config.endpoint(), "http://localhost:3100/loki/api/v1/push");
        assert_eq!(config.max_batch_wait, Duration::from_millis(3000));
        assert_eq!(config.max_batch_size, 1000);
        assert!(config.tls.is_none());
        assert!(config.basic_auth_header().is_none());
    }

    #[test]
    fn scheme_follows_tls() {
        let plain = LokiConfig::new().with_addr("ut-addr");
        assert_eq!(plain.effective_addr(), "http://ut-addr");

        let tls = LokiConfig::new().with_addr("ut-addr").with_tls(TlsConfig::new());
        assert_eq!(tls.effective_addr(), "https://ut-addr");

        let prefixed = LokiConfig::new().with_addr("http://ut-addr").with_tls(TlsConfig::new());
        assert_eq!(prefixed.effective_addr(), "https://ut-addr");
    }

    #[test]
    fn basic_auth_header() {
        let config = LokiConfig::new().with_username("ut-name").with_password("ut-pass");
        assert_eq!(
            config.basic_auth_header().as_deref(),
            Some(format!("Basic {}", STANDARD.encode("ut-name:ut-pass")).as_str())
        );
        assert_eq!(config.basic_auth_header().as_deref(), Some("Basic dXQtbmFtZTp1dC1wYXNz"));

        let user_only = LokiConfig::new().with_username("ut-name");
        assert!(user_only.basic_auth_header().is_none());
    }

    #[test]
    fn setters_ignore_unusable_values() {
        let config = LokiConfig::new()
            .with_addr("")
            .with_path("")
            .with_max_batch_size(0)
            .with_max_batch_wait(Duration::from_micros(10));

        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.path, DEFAULT_PATH);
        assert_eq!(config.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert_eq!(config.max_batch_wait, DEFAULT_MAX_BATCH_WAIT);
    }

    #[test]
    fn normalized_replaces_direct_zero_values() {
        let config = LokiConfig {
            addr: "https://".to_string(),
            max_batch_size: 0,
            max_batch_wait: Duration::ZERO,
            shutdown_timeout: Duration::ZERO,
            ..LokiConfig::default()
        }
        .normalized();

        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert_eq!(config.max_batch_wait, DEFAULT_MAX_BATCH_WAIT);
        assert_eq!(config.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT);
    }

    #[test]
    fn debug_redacts_password() {
        let config = LokiConfig::new().with_password("secret");
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn missing_ca_file_is_reported() {
        let err = TlsConfig::new().with_ca_file("/nonexistent/ca.pem").unwrap_err();
        assert!(matches!(err, LokiError::ReadFile { .. }));
    }
}
