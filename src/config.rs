use crate::depot::DEFAULT_DEPOT_CAPACITY;
use crate::types::events::DEFAULT_CHANNEL_CAPACITY;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub peer_id: String,
    /// Device tag sent with signature opens.
    pub tag: Option<String>,
    pub depot_capacity: usize,
    pub event_channel_capacity: usize,
    /// Seconds added to the reconnect delay per consecutive failure.
    pub reconnect_base_delay: u64,
    pub reconnect_max_delay: u64,
    pub enable_auto_reconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            peer_id: String::new(),
            tag: None,
            depot_capacity: DEFAULT_DEPOT_CAPACITY,
            event_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            reconnect_base_delay: 2,
            reconnect_max_delay: 30,
            enable_auto_reconnect: true,
        }
    }
}

impl ClientConfig {
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            ..Default::default()
        }
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Delay before reconnect attempt number `errors + 1`.
    pub fn reconnect_delay_secs(&self, errors: u32) -> u64 {
        u64::from(errors)
            .saturating_mul(self.reconnect_base_delay)
            .min(self.reconnect_max_delay)
    }
}
