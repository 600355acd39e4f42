//! Environment variable names used by this crate for convenient
//! configuration of the sink from microservices.
//!
//! These are purely helpers; [`LokiConfig`] itself never reads the
//! environment.

use crate::config::{LokiConfig, TlsConfig};
use crate::error::EnvError;
use std::time::Duration;

/// Loki `host:port`, e.g. `loki:3100`.
pub const LOKI_SINK_ADDR_ENV: &str = "LOKI_SINK_ADDR";

/// Push path, defaults to `/loki/api/v1/push`.
pub const LOKI_SINK_PATH_ENV: &str = "LOKI_SINK_PATH";

/// Optional basic auth user name.
pub const LOKI_SINK_USERNAME_ENV: &str = "LOKI_SINK_USERNAME";

/// Optional basic auth password.
pub const LOKI_SINK_PASSWORD_ENV: &str = "LOKI_SINK_PASSWORD";

/// Static labels as `key=value` pairs separated by commas.
pub const LOKI_SINK_LABELS_ENV: &str = "LOKI_SINK_LABELS";

/// Maximum entries per push.
pub const LOKI_SINK_MAX_BATCH_SIZE_ENV: &str = "LOKI_SINK_MAX_BATCH_SIZE";

/// Maximum time in milliseconds an entry waits before being pushed.
pub const LOKI_SINK_MAX_BATCH_WAIT_MS_ENV: &str = "LOKI_SINK_MAX_BATCH_WAIT_MS";

/// Set to `true` or `1` to push over https.
pub const LOKI_SINK_TLS_ENV: &str = "LOKI_SINK_TLS";

/// Path to an extra PEM root certificate. Implies https.
pub const LOKI_SINK_CA_CERT_ENV: &str = "LOKI_SINK_CA_CERT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Build a [`LokiConfig`] from the `LOKI_SINK_*` variables. Unset variables
/// keep their defaults.
pub fn config_from_env() -> Result<LokiConfig, EnvError> {
    config_from_lookup(|key| std::env::var(key).ok())
}

fn config_from_lookup<F>(lookup: F) -> Result<LokiConfig, EnvError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let mut config = LokiConfig::new();

    if let Some(addr) = get(LOKI_SINK_ADDR_ENV) {
        config = config.with_addr(addr.trim());
    }
    if let Some(path) = get(LOKI_SINK_PATH_ENV) {
        config = config.with_path(path.trim());
    }
    if let Some(username) = get(LOKI_SINK_USERNAME_ENV) {
        config = config.with_username(username);
    }
    if let Some(password) = get(LOKI_SINK_PASSWORD_ENV) {
        config = config.with_password(password);
    }
    if let Some(labels) = get(LOKI_SINK_LABELS_ENV) {
        for (key, value) in parse_labels(&labels) {
            config = config.with_label(key, value);
        }
    }
    if let Some(size) = get(LOKI_SINK_MAX_BATCH_SIZE_ENV) {
        config = config.with_max_batch_size(parse_number(LOKI_SINK_MAX_BATCH_SIZE_ENV, &size)? as usize);
    }
    if let Some(wait) = get(LOKI_SINK_MAX_BATCH_WAIT_MS_ENV) {
        let ms = parse_number(LOKI_SINK_MAX_BATCH_WAIT_MS_ENV, &wait)?;
        config = config.with_max_batch_wait(Duration::from_millis(ms));
    }

    let tls_flag = get(LOKI_SINK_TLS_ENV)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    match get(LOKI_SINK_CA_CERT_ENV) {
        Some(path) => config = config.with_tls(TlsConfig::new().with_ca_file(path.trim())?),
        None if tls_flag => config = config.with_tls(TlsConfig::new()),
        None => {}
    }

    Ok(config)
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, EnvError> {
    value.trim().parse().map_err(|_| EnvError::InvalidNumber {
        key,
        value: value.to_string(),
    })
}

/// Split `a=1, b=2` into pairs. Malformed items are skipped; label names
/// are validated later by the sink.
fn parse_labels(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|item| item.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = config_from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.endpoint(), "http://localhost:3100/loki/api/v1/push");
        assert_eq!(config.max_batch_size, 1000);
    }

    #[test]
    fn reads_all_variables() {
        let config = config_from_lookup(lookup(&[
            (LOKI_SINK_ADDR_ENV, "loki:3100"),
            (LOKI_SINK_PATH_ENV, "/push"),
            (LOKI_SINK_USERNAME_ENV, "ut-name"),
            (LOKI_SINK_PASSWORD_ENV, "ut-pass"),
            (LOKI_SINK_LABELS_ENV, "app=billing, env = prod,broken"),
            (LOKI_SINK_MAX_BATCH_SIZE_ENV, "10"),
            (LOKI_SINK_MAX_BATCH_WAIT_MS_ENV, "250"),
            (LOKI_SINK_TLS_ENV, "true"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint(), "https://loki:3100/push");
        assert_eq!(config.basic_auth_header().as_deref(), Some("Basic dXQtbmFtZTp1dC1wYXNz"));
        assert_eq!(
            config.labels,
            vec![
                ("app".to_string(), "billing".to_string()),
                ("env".to_string(), "prod".to_string())
            ]
        );
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.max_batch_wait, Duration::from_millis(250));
    }

    #[test]
    fn zero_batch_values_keep_defaults() {
        let config = config_from_lookup(lookup(&[
            (LOKI_SINK_MAX_BATCH_SIZE_ENV, "0"),
            (LOKI_SINK_MAX_BATCH_WAIT_MS_ENV, "0"),
        ]))
        .unwrap();
        assert_eq!(config.max_batch_size, 1000);
        assert_eq!(config.max_batch_wait, Duration::from_millis(3000));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = config_from_lookup(lookup(&[(LOKI_SINK_MAX_BATCH_SIZE_ENV, "-5")])).unwrap_err();
        assert!(matches!(err, EnvError::InvalidNumber { key, .. } if key == LOKI_SINK_MAX_BATCH_SIZE_ENV));
    }

    #[test]
    fn missing_ca_file_is_an_error() {
        let err = config_from_lookup(lookup(&[(LOKI_SINK_CA_CERT_ENV, "/nonexistent/ca.pem")])).unwrap_err();
        assert!(matches!(err, EnvError::Loki(_)));
    }
}
