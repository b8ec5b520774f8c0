// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client construction for the collector transport.
//!
//! One client is built per sink and reused across flushes. TLS verification
//! settings live on that client, so disabling verification for one sink
//! leaves every other client in the process untouched.

use crate::config::SinkConfig;
use crate::errors::SinkError;
use core::time::Duration;
use reqwest::ClientBuilder;
use std::error::Error;
use tracing::{debug, error};

/// Creates the collector client, falling back to a direct connection when the
/// proxy configuration cannot be used.
pub fn get_client(config: &SinkConfig) -> Result<reqwest::Client, SinkError> {
    match build_client(config, true) {
        Ok(client) => Ok(client),
        Err(e) => {
            error!(
                "SINK | Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            build_client(config, false).map_err(|inner| SinkError::Client(inner.to_string()))
        }
    }
}

fn build_client(config: &SinkConfig, allow_proxy: bool) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut client = create_client_builder(config.insecure)
        .timeout(config.request_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(https_uri) = &config.https_proxy {
            let proxy = reqwest::Proxy::https(https_uri.clone())?;
            client = client.proxy(proxy);
        }
    }

    Ok(client.build()?)
}

fn create_client_builder(insecure: bool) -> ClientBuilder {
    let builder = reqwest::Client::builder().use_rustls_tls();
    if insecure {
        debug!("SINK | TLS certificate verification disabled for collector client");
        return builder.danger_accept_invalid_certs(true);
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_get_client_default() {
        let config = SinkConfig::new("https://collector.local");
        assert!(get_client(&config).is_ok());
    }

    #[test]
    fn test_get_client_insecure() {
        let config = SinkConfig {
            insecure: true,
            ..SinkConfig::new("https://collector.local")
        };
        assert!(get_client(&config).is_ok());
    }

    #[test]
    fn test_get_client_with_proxy() {
        let config = SinkConfig {
            https_proxy: Some("http://proxy.local:3128".to_string()),
            ..SinkConfig::new("https://collector.local")
        };
        assert!(build_client(&config, true).is_ok());
    }

    #[test]
    #[traced_test]
    fn test_get_client_bad_proxy_falls_back() {
        let config = SinkConfig {
            https_proxy: Some("http://[invalid".to_string()),
            ..SinkConfig::new("https://collector.local")
        };
        assert!(build_client(&config, true).is_err());
        assert!(build_client(&config, false).is_ok());
        assert!(get_client(&config).is_ok());
        assert!(logs_contain("falling back to direct connection"));
    }
}
