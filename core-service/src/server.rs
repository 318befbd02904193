//! Embedded API server placeholder.

use crate::error::{Result, ServiceError};
use tracing::warn;

/// Address and port an API server would bind to. Serving is not available
/// yet; `start` always fails with [`ServiceError::NotImplemented`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiServer {
    host: String,
    port: u16,
}

impl ApiServer {
    pub const DEFAULT_PORT: u16 = 4533;

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub async fn start(&self) -> Result<()> {
        warn!("API server requested on {} but serving is not implemented", self.address());
        Err(ServiceError::NotImplemented("api server"))
    }
}

impl Default for ApiServer {
    fn default() -> Self {
        Self::new("127.0.0.1", Self::DEFAULT_PORT)
    }
}
