use std::str::FromStr;

const DEFAULT_NTP_SERVERS: &[&str] = &[
    "pool.ntp.org",
    "time.google.com",
    "time.cloudflare.com",
    "time.apple.com",
    "time.windows.com",
];

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub http_port: u16,
    pub data_dir: String,
    pub device_name: String,
    pub device_type: String,
    pub registry_url: String,
    pub timezone: String,
    pub ntp_servers: Vec<String>,
    pub warm_pin: u8,
    pub natural_pin: u8,
    pub pwm_freq_hz: u32,
    pub pwm_max_duty: u32,
    pub schedule_check_secs: u64,
    pub time_sync_secs: u64,
    pub registration_secs: u64,
    pub accept_wait_ms: u64,
    pub loop_fault_delay_secs: u64,
    pub max_request_bytes: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            http_port: 80,
            data_dir: "./.lumen".to_string(),
            device_name: "Smart Lighting Controller".to_string(),
            device_type: "lighting".to_string(),
            registry_url: "http://192.168.1.100:8000".to_string(),
            timezone: "America/Los_Angeles".to_string(),
            ntp_servers: DEFAULT_NTP_SERVERS
                .iter()
                .map(|server| server.to_string())
                .collect(),
            warm_pin: 18,
            natural_pin: 26,
            pwm_freq_hz: 1_000,
            pwm_max_duty: 1_023,
            schedule_check_secs: 10,
            time_sync_secs: 3_600,
            registration_secs: 3_600,
            accept_wait_ms: 1_000,
            loop_fault_delay_secs: 5,
            max_request_bytes: 2_048,
        }
    }
}

impl ControllerConfig {
    /// Defaults overridden by environment variables so a deployment can be
    /// retargeted without a rebuild.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(port) = env_parse("LUMEN_HTTP_PORT") {
            config.http_port = port;
        }
        if let Ok(dir) = std::env::var("LUMEN_DATA_DIR") {
            config.data_dir = dir;
        }
        if let Ok(url) = std::env::var("LUMEN_REGISTRY_URL") {
            config.registry_url = url;
        }
        if let Ok(name) = std::env::var("LUMEN_DEVICE_NAME") {
            config.device_name = name;
        }
        if let Ok(timezone) = std::env::var("LUMEN_TIMEZONE") {
            config.timezone = timezone;
        }
        if let Some(pin) = env_parse("LUMEN_WARM_PIN") {
            config.warm_pin = pin;
        }
        if let Some(pin) = env_parse("LUMEN_NATURAL_PIN") {
            config.natural_pin = pin;
        }

        config
    }

    pub fn sanitize(&mut self) {
        if self.pwm_freq_hz == 0 {
            self.pwm_freq_hz = 1_000;
        }
        self.pwm_max_duty = self.pwm_max_duty.clamp(1, 65_535);
        self.schedule_check_secs = self.schedule_check_secs.max(1);
        self.accept_wait_ms = self.accept_wait_ms.clamp(50, 10_000);
        self.max_request_bytes = self.max_request_bytes.clamp(512, 65_536);
        if self.ntp_servers.is_empty() {
            self.ntp_servers = DEFAULT_NTP_SERVERS
                .iter()
                .map(|server| server.to_string())
                .collect();
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sanitize_restores_unusable_values() {
        let mut config = ControllerConfig {
            pwm_freq_hz: 0,
            pwm_max_duty: 0,
            schedule_check_secs: 0,
            accept_wait_ms: 0,
            max_request_bytes: 16,
            ntp_servers: Vec::new(),
            ..ControllerConfig::default()
        };
        config.sanitize();

        assert_eq!(config.pwm_freq_hz, 1_000);
        assert_eq!(config.pwm_max_duty, 1);
        assert_eq!(config.schedule_check_secs, 1);
        assert_eq!(config.accept_wait_ms, 50);
        assert_eq!(config.max_request_bytes, 512);
        assert_eq!(config.ntp_servers.len(), 5);
    }
}
