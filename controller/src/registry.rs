use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use lumen_common::{ControllerConfig, RegistrationPayload};
use tracing::info;

const REGISTRY_TIMEOUT: Duration = Duration::from_secs(5);

/// Announces the device to the remote registry with a plain HTTP PUT.
/// Anything but a 200 is a failure; the caller retries on the next interval.
pub fn register(config: &ControllerConfig, device_id: &str, ip: &str) -> anyhow::Result<()> {
    let (host, port, base_path) = split_url(&config.registry_url)?;

    let payload = RegistrationPayload {
        ip_address: ip.to_string(),
        device_name: config.device_name.clone(),
        last_online: Utc::now().timestamp(),
        device_type: config.device_type.clone(),
    };
    let body = serde_json::to_string(&payload)?;
    let path = format!("{base_path}/devices/{device_id}.json");

    let addr = (host.as_str(), port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {host}:{port}"))?
        .next()
        .with_context(|| format!("no address for {host}:{port}"))?;
    let mut stream = TcpStream::connect_timeout(&addr, REGISTRY_TIMEOUT)
        .with_context(|| format!("connecting to registry at {host}:{port}"))?;
    stream.set_read_timeout(Some(REGISTRY_TIMEOUT))?;
    stream.set_write_timeout(Some(REGISTRY_TIMEOUT))?;

    let request = format!(
        "PUT {path} HTTP/1.1\r\nHost: {host}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream
        .write_all(request.as_bytes())
        .context("sending registration request")?;

    let mut response = String::new();
    stream
        .take(1_024)
        .read_to_string(&mut response)
        .context("reading registration response")?;
    let status = response_status(&response)?;
    if status != 200 {
        bail!("registry answered with status {status}");
    }

    info!("registered device {device_id} with registry");
    Ok(())
}

fn split_url(url: &str) -> anyhow::Result<(String, u16, String)> {
    let Some(rest) = url.strip_prefix("http://") else {
        bail!("registry URL must be plain http: {url}");
    };

    let (authority, path) = match rest.split_once('/') {
        Some((authority, path)) => (authority, format!("/{path}")),
        None => (rest, String::new()),
    };
    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (
            host.to_string(),
            port.parse::<u16>().context("invalid registry port")?,
        ),
        None => (authority.to_string(), 80),
    };
    if host.is_empty() {
        bail!("registry URL has no host: {url}");
    }

    Ok((host, port, path.trim_end_matches('/').to_string()))
}

fn response_status(response: &str) -> anyhow::Result<u16> {
    let status_line = response.lines().next().unwrap_or("");
    let code = status_line
        .split_whitespace()
        .nth(1)
        .with_context(|| format!("malformed registry response: {status_line:?}"))?;
    code.parse::<u16>().context("non-numeric registry status")
}
