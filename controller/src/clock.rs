use std::net::UdpSocket;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

const NTP_PORT: u16 = 123;
const NTP_UNIX_OFFSET_SECS: i64 = 2_208_988_800;
const NTP_TIMEOUT: Duration = Duration::from_secs(2);

/// Wall-clock collaborator. Until the first successful sync the clock is
/// unusable and schedule evaluation stays off; afterwards it applies the
/// NTP-derived correction to the system clock.
#[derive(Debug)]
pub struct WallClock {
    tz: Tz,
    synced: bool,
    offset_secs: i64,
    #[cfg(test)]
    fixed_now: Option<DateTime<FixedOffset>>,
}

impl WallClock {
    pub fn new(timezone: &str) -> Self {
        let tz = timezone.parse::<Tz>().unwrap_or_else(|_| {
            warn!("unrecognized timezone {timezone:?}, falling back to UTC");
            Tz::UTC
        });
        Self {
            tz,
            synced: false,
            offset_secs: 0,
            #[cfg(test)]
            fixed_now: None,
        }
    }

    #[cfg(test)]
    pub fn fixed(now: DateTime<FixedOffset>) -> Self {
        Self {
            tz: Tz::UTC,
            synced: true,
            offset_secs: 0,
            fixed_now: Some(now),
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Tries each NTP server in order until one answers. All of them failing
    /// is non-fatal; the caller retries on the next interval.
    pub fn sync(&mut self, servers: &[String]) -> bool {
        #[cfg(test)]
        if self.fixed_now.is_some() {
            return true;
        }

        for server in servers {
            match query_sntp(server) {
                Ok(unix_secs) => {
                    self.offset_secs = unix_secs - Utc::now().timestamp();
                    self.synced = true;
                    info!(
                        "time synchronized with NTP server {server}, current time: {}",
                        self.format_time()
                    );
                    return true;
                }
                Err(err) => warn!("failed to sync time with {server}: {err:#}"),
            }
        }

        warn!("all NTP servers failed, will retry later");
        false
    }

    pub fn now_local(&self) -> Option<DateTime<FixedOffset>> {
        #[cfg(test)]
        if let Some(now) = self.fixed_now {
            return Some(now);
        }

        if !self.synced {
            return None;
        }
        let corrected = Utc::now() + chrono::Duration::seconds(self.offset_secs);
        let local = corrected.with_timezone(&self.tz);
        Some(local.with_timezone(&local.offset().fix()))
    }

    pub fn minutes_since_midnight(&self) -> Option<u16> {
        self.now_local()
            .map(|now| (now.hour() * 60 + now.minute()) as u16)
    }

    pub fn format_time(&self) -> String {
        match self.now_local() {
            Some(now) => now.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "Time not synchronized yet".to_string(),
        }
    }
}

/// One SNTP round-trip over UDP. Returns the server's transmit timestamp as
/// unix seconds.
fn query_sntp(server: &str) -> anyhow::Result<i64> {
    let socket = UdpSocket::bind("0.0.0.0:0").context("binding SNTP socket")?;
    socket.set_read_timeout(Some(NTP_TIMEOUT))?;
    socket.set_write_timeout(Some(NTP_TIMEOUT))?;

    // 48-byte request: LI=0, VN=3, mode=3 (client).
    let mut request = [0u8; 48];
    request[0] = 0x1b;
    socket
        .send_to(&request, (server, NTP_PORT))
        .with_context(|| format!("sending SNTP request to {server}"))?;

    let mut response = [0u8; 48];
    let (len, _) = socket
        .recv_from(&mut response)
        .context("waiting for SNTP response")?;
    if len < 44 {
        bail!("short SNTP response ({len} bytes)");
    }

    // Transmit timestamp, seconds since 1900-01-01.
    let seconds = u32::from_be_bytes([response[40], response[41], response[42], response[43]]);
    if seconds == 0 {
        bail!("SNTP response carries no transmit timestamp");
    }
    Ok(i64::from(seconds) - NTP_UNIX_OFFSET_SECS)
}
