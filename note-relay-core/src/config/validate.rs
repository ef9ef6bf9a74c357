//! Configuration validation rules.

use super::schema::Config;
use std::net::SocketAddr;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    let local = config.topics.local_outbound.trim();
    let remote = config.topics.remote_inbound.trim();
    if local.is_empty() {
        errors.push("topics.local_outbound must not be empty".to_string());
    }
    if remote.is_empty() {
        errors.push("topics.remote_inbound must not be empty".to_string());
    }
    if !local.is_empty() && local == remote {
        errors.push(
            "topics.local_outbound and topics.remote_inbound must be different".to_string(),
        );
    }

    if config.store.capacity == 0 {
        errors.push("store.capacity must be > 0".to_string());
    }

    if config.server.host.trim().is_empty() {
        errors.push("server.host must not be empty".to_string());
    }
    if config.server.port == 0 {
        errors.push("server.port must be > 0".to_string());
    }

    let format = config.logging.format.to_ascii_lowercase();
    if format != "text" && format != "json" {
        errors.push(format!(
            "logging.format must be one of text, json (got {})",
            config.logging.format
        ));
    }

    if let Some(listen) = &config.peer.listen {
        if listen.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "peer.listen must be an address like 0.0.0.0:3100 (got {})",
                listen
            ));
        }
    }
    if let Some(connect) = &config.peer.connect {
        if !connect.starts_with("ws://") {
            errors.push(format!(
                "peer.connect must be a ws:// URL (got {})",
                connect
            ));
        }
    }
    if config.peer.retry_secs == 0 {
        errors.push("peer.retry_secs must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
