use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Warm,
    Natural,
}

impl ChannelKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Warm => "Warm LED",
            Self::Natural => "Natural LED",
        }
    }
}

/// Body of the registry heartbeat PUT. Field names are the wire format
/// expected by the remote device registry.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationPayload {
    pub ip_address: String,
    pub device_name: String,
    pub last_online: i64,
    pub device_type: String,
}
