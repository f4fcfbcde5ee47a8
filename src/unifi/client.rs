//! UniFi Network integration API client.
//!
//! The controller exposes exactly one port-level power primitive: a power
//! cycle. Everything the rest of the crate does is built on that single
//! action, so the client surface is one trait method. The trait exists so
//! tests can substitute a fake device.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::UnifiSettings;

/// Bounded timeout for controller calls. A hang here stalls the deferred
/// worker for all ports, so it must not be unbounded.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from a device-level call.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The controller answered with a non-success HTTP status.
    #[error("HTTP {0}")]
    Api(u16),

    /// The request never completed (connect failure, TLS, timeout).
    #[error("request failed: {0}")]
    Transport(String),
}

/// The one opaque call the power coordinator makes against the outside world.
#[async_trait]
pub trait PortActionClient: Send + Sync {
    /// Issue a `POWER_CYCLE` action for the given switch port.
    async fn power_cycle(&self, port: u16) -> Result<(), DeviceError>;
}

/// Real client over the UniFi Network integration API.
#[derive(Clone)]
pub struct UnifiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    site_id: String,
    device_id: String,
}

impl UnifiClient {
    pub fn new(settings: &UnifiSettings) -> Result<Self, DeviceError> {
        // Controllers ship with a self-signed certificate.
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DeviceError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            site_id: settings.site_id.clone(),
            device_id: settings.device_id.clone(),
        })
    }

    fn action_url(&self, port: u16) -> String {
        format!(
            "{}/sites/{}/devices/{}/interfaces/ports/{}/actions",
            self.base_url, self.site_id, self.device_id, port
        )
    }
}

#[async_trait]
impl PortActionClient for UnifiClient {
    async fn power_cycle(&self, port: u16) -> Result<(), DeviceError> {
        let url = self.action_url(port);
        debug!(port, %url, "sending POWER_CYCLE to controller");

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .header("Accept", "application/json")
            .json(&serde_json::json!({ "action": "POWER_CYCLE" }))
            .send()
            .await
            .map_err(|e| DeviceError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DeviceError::Api(response.status().as_u16()))
        }
    }
}
