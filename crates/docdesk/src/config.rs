use std::time::Duration;

use clap::Args;
use docs_api::DocumentsClient;
use socket_channel::{ChannelConfig, ReconnectPolicy};

use crate::error::{DeskError, DeskResult};

pub(crate) const DEFAULT_SERVER: &str = "http://localhost:5000";

/// Backend endpoints and reconnect tuning, shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Base URL of the REST API
    #[arg(long, env = "DOCDESK_API_BASE", default_value = DEFAULT_SERVER, global = true)]
    pub api_base: String,
    /// Base URL of the realtime server
    #[arg(long, env = "DOCDESK_SOCKET_URL", default_value = DEFAULT_SERVER, global = true)]
    pub socket_url: String,
    /// Reconnect attempts after the channel drops
    #[arg(long, default_value_t = 5, global = true)]
    pub reconnect_attempts: u32,
    /// Fixed delay before each reconnect attempt, in milliseconds
    #[arg(long, default_value_t = 1000, global = true)]
    pub reconnect_delay_ms: u64,
}

impl ServerArgs {
    pub fn documents_client(&self) -> DeskResult<DocumentsClient> {
        if self.api_base.is_empty() {
            return Err(DeskError::Config(
                "api base is required (set --api-base / DOCDESK_API_BASE)".into(),
            ));
        }
        Ok(DocumentsClient::new(&self.api_base)?)
    }

    pub fn channel_config(&self) -> DeskResult<ChannelConfig> {
        if self.socket_url.is_empty() {
            return Err(DeskError::Config(
                "socket url is required (set --socket-url / DOCDESK_SOCKET_URL)".into(),
            ));
        }
        let mut config = ChannelConfig::new(self.socket_url.clone());
        config.reconnect = ReconnectPolicy {
            max_attempts: self.reconnect_attempts,
            delay: Duration::from_millis(self.reconnect_delay_ms),
        };
        Ok(config)
    }
}
