//! SPARQL endpoint collaborator.
//!
//! The ranking code only depends on [`Endpoint`]; [`HttpEndpoint`] is the
//! SPARQL 1.1 Protocol implementation (query via URL-encoded POST).

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::results::{decode, Binding, SPARQL_RESULTS_JSON};

/// Executes SELECT queries and returns their solutions.
pub trait Endpoint {
    fn select(&self, query: &str) -> Result<Vec<Binding>, EndpointError>;
}

impl<E: Endpoint + ?Sized> Endpoint for &E {
    fn select(&self, query: &str) -> Result<Vec<Binding>, EndpointError> {
        (**self).select(query)
    }
}

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid endpoint url `{url}`: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("failed to reach SPARQL endpoint {url}: {message}")]
    Transport { url: String, message: String },
    #[error("SPARQL endpoint {url} returned http {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode SPARQL results from {url}: {message}")]
    Decode { url: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointConfig {
    pub url: String,
    /// Per-request timeout in seconds (0 disables the timeout).
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8890/sparql".to_string(),
            timeout_secs: 60,
            user_agent: format!(
                "sparqled/{} (+https://github.com/sparqled/sparqled)",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    url: Url,
    client: Client,
}

impl HttpEndpoint {
    pub fn new(config: &EndpointConfig) -> Result<Self, EndpointError> {
        let url = Url::parse(&config.url).map_err(|e| EndpointError::InvalidUrl {
            url: config.url.clone(),
            message: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(EndpointError::InvalidUrl {
                url: config.url.clone(),
                message: format!("unsupported scheme `{}`", url.scheme()),
            });
        }

        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder.build().map_err(|e| EndpointError::Transport {
            url: config.url.clone(),
            message: format!("failed to build http client: {e}"),
        })?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Endpoint for HttpEndpoint {
    fn select(&self, query: &str) -> Result<Vec<Binding>, EndpointError> {
        let url = self.url.to_string();
        tracing::debug!(endpoint = %url, bytes = query.len(), "sending SPARQL query");

        let resp = self
            .client
            .post(self.url.clone())
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .form(&[("query", query)])
            .send()
            .map_err(|e| EndpointError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(EndpointError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().map_err(|e| EndpointError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;
        let results = decode(&body).map_err(|e| EndpointError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;
        tracing::debug!(
            endpoint = %url,
            bindings = results.results.bindings.len(),
            "received SPARQL results"
        );
        Ok(results.results.bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_urls() {
        let config = EndpointConfig {
            url: "not a url".to_string(),
            ..EndpointConfig::default()
        };
        assert!(matches!(
            HttpEndpoint::new(&config),
            Err(EndpointError::InvalidUrl { .. })
        ));

        let config = EndpointConfig {
            url: "ftp://example.org/sparql".to_string(),
            ..EndpointConfig::default()
        };
        assert!(matches!(
            HttpEndpoint::new(&config),
            Err(EndpointError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn url_is_normalised() {
        let config = EndpointConfig {
            url: "HTTP://Example.org:80/sparql".to_string(),
            ..EndpointConfig::default()
        };
        let endpoint = HttpEndpoint::new(&config).expect("endpoint");
        assert_eq!(endpoint.url().as_str(), "http://example.org/sparql");
    }

    #[test]
    fn config_fills_missing_fields_from_defaults() {
        let config: EndpointConfig =
            serde_json::from_str(r#"{ "url": "https://dbpedia.org/sparql" }"#).expect("config");
        assert_eq!(config.url, "https://dbpedia.org/sparql");
        assert_eq!(config.timeout_secs, EndpointConfig::default().timeout_secs);
        assert!(config.user_agent.starts_with("sparqled/"));
    }
}
