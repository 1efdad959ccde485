//! Smart outlets switched by plain HTTP GET requests.
//!
//! Requests are fire-and-forget: the call returns as soon as the request is
//! spawned and the outcome is only logged.

use std::time::Duration;

use cadenza_core::config::OutletConfig;
use thiserror::Error;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = "cadenza";

#[derive(Debug, Error)]
pub enum OutletError {
    #[error("no outlet configured at index {index}")]
    UnknownDevice { index: usize },
}

impl OutletError {
    pub fn code(&self) -> &'static str {
        match self {
            OutletError::UnknownDevice { .. } => "UNKNOWN_DEVICE",
        }
    }
}

/// On/off switch for the outlets, addressed by zero-based index.
pub trait OutletController: Send + Sync {
    fn turn_on(&self, index: usize) -> Result<(), OutletError>;
    fn turn_off(&self, index: usize) -> Result<(), OutletError>;
}

pub struct HttpOutlets {
    client: reqwest::Client,
    outlets: Vec<OutletConfig>,
}

impl HttpOutlets {
    pub fn new(outlets: Vec<OutletConfig>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, outlets })
    }

    fn switch(&self, index: usize, on: bool) -> Result<(), OutletError> {
        let outlet = self
            .outlets
            .get(index)
            .ok_or(OutletError::UnknownDevice { index })?;
        let url = if on { outlet.on_url.clone() } else { outlet.off_url.clone() };
        let name = outlet.name.clone();
        let client = self.client.clone();

        info!(index, outlet = %name, on, "switching outlet");
        tokio::spawn(async move {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(outlet = %name, status = %resp.status(), "outlet acknowledged");
                }
                Ok(resp) => warn!(outlet = %name, status = %resp.status(), "outlet returned error status"),
                Err(e) => warn!(outlet = %name, error = %e, "outlet request failed"),
            }
        });
        Ok(())
    }
}

impl OutletController for HttpOutlets {
    fn turn_on(&self, index: usize) -> Result<(), OutletError> {
        self.switch(index, true)
    }

    fn turn_off(&self, index: usize) -> Result<(), OutletError> {
        self.switch(index, false)
    }
}
