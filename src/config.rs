//! Play client configuration.

use url::Url;

use crate::error::ConfigError;
use crate::ice::{google_stun_servers, IceServerConfig};
use crate::signaling::UserData;

/// Configuration for a play session
#[derive(Clone, Debug)]
pub struct PlayConfig {
    /// WebSocket signaling URL (e.g., "wss://host/webrtc-session.json")
    pub signaling_url: String,
    /// Server application name (e.g., "live")
    pub application_name: String,
    /// Stream to play
    pub stream_name: String,
    /// ICE servers for NAT traversal
    pub ice_servers: Vec<IceServerConfig>,
    /// Optional `userData.param1` sent with the play request
    pub user_data: Option<String>,
    /// Outbound signaling frames that may be queued before sends fail
    pub outbound_queue_depth: usize,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            signaling_url: String::new(),
            application_name: String::new(),
            stream_name: String::new(),
            ice_servers: google_stun_servers(),
            user_data: None,
            outbound_queue_depth: 64,
        }
    }
}

impl PlayConfig {
    pub fn new(signaling_url: &str, application_name: &str, stream_name: &str) -> Self {
        Self {
            signaling_url: signaling_url.to_string(),
            application_name: application_name.to_string(),
            stream_name: stream_name.to_string(),
            ..Default::default()
        }
    }

    /// Check the URL scheme and required names
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.signaling_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.signaling_url.clone(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ConfigError::InvalidUrl {
                url: self.signaling_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        if self.application_name.is_empty() {
            return Err(ConfigError::Empty("application_name"));
        }
        if self.stream_name.is_empty() {
            return Err(ConfigError::Empty("stream_name"));
        }

        Ok(())
    }

    pub fn user_data(&self) -> Option<UserData> {
        self.user_data.as_ref().map(|p| UserData {
            param1: Some(p.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_ws_and_wss() {
        assert!(PlayConfig::new("ws://127.0.0.1:8080/webrtc-session.json", "live", "s1")
            .validate()
            .is_ok());
        assert!(PlayConfig::new("wss://example.com/webrtc-session.json", "live", "s1")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let err = PlayConfig::new("http://example.com", "live", "s1").validate();
        assert!(matches!(err, Err(ConfigError::InvalidUrl { .. })));

        let err = PlayConfig::new("not a url", "live", "s1").validate();
        assert!(matches!(err, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_validate_requires_names() {
        let err = PlayConfig::new("ws://localhost", "", "s1").validate();
        assert!(matches!(err, Err(ConfigError::Empty("application_name"))));

        let err = PlayConfig::new("ws://localhost", "live", "").validate();
        assert!(matches!(err, Err(ConfigError::Empty("stream_name"))));
    }

    #[test]
    fn test_defaults() {
        let config = PlayConfig::default();
        assert_eq!(config.ice_servers, google_stun_servers());
        assert_eq!(config.outbound_queue_depth, 64);
        assert!(config.user_data().is_none());
    }
}
