use anyhow::Result;
use note_relay_core::config::Config;
use note_relay_core::{Message, Origin};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

/// Base URL of the relay described by `config`.
///
/// A wildcard listen address is reached through loopback.
pub fn base_url_from_config(config: &Config) -> String {
    let host = match config.server.host.as_str() {
        "0.0.0.0" | "" => "127.0.0.1",
        "::" | "[::]" => "[::1]",
        host if host.contains(':') && !host.starts_with('[') => {
            return format!("http://[{}]:{}", host, config.server.port)
        }
        host => host,
    };
    format!("http://{}:{}", host, config.server.port)
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    kind: String,
    message: String,
    message_id: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn publish(&self, envelope: &Value) -> Result<Message> {
        let url = format!("{}/messages/local", self.base_url);
        let response = self.client.post(&url).json(envelope).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Message>().await?);
        }

        match response.json::<ErrorBody>().await {
            Ok(body) if body.kind == "relay" => anyhow::bail!(
                "stored locally as {} but not relayed: {}",
                body.message_id.unwrap_or_default(),
                body.message
            ),
            Ok(body) => anyhow::bail!("rejected ({}): {}", body.kind, body.message),
            Err(_) => anyhow::bail!("Server returned error: {}", status),
        }
    }

    pub async fn list(&self, origin: Origin) -> Result<Vec<Message>> {
        let url = format!("{}/messages/{}", self.base_url, origin);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Server returned error: {}", response.status());
        }

        Ok(response.json::<Vec<Message>>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new(Some("http://localhost:9000/".to_string()));
        assert_eq!(client.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_default_base_url() {
        let client = ApiClient::new(None);
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_base_url_follows_config() {
        let mut config = Config::default();
        assert_eq!(base_url_from_config(&config), DEFAULT_BASE_URL);

        config.server.port = 8081;
        config.server.host = "localhost".to_string();
        assert_eq!(base_url_from_config(&config), "http://localhost:8081");

        config.server.host = "0.0.0.0".to_string();
        assert_eq!(base_url_from_config(&config), "http://127.0.0.1:8081");

        config.server.host = "::1".to_string();
        assert_eq!(base_url_from_config(&config), "http://[::1]:8081");
    }
}
