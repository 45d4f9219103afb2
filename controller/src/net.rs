use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use anyhow::Context;

/// Discovers the primary local IPv4 address with a throwaway UDP socket;
/// no packets are sent.
pub fn local_ipv4() -> anyhow::Result<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").context("binding discovery socket")?;
    socket
        .connect("8.8.8.8:80")
        .context("routing discovery socket")?;
    let addr = socket.local_addr().context("reading local address")?;
    match addr.ip() {
        IpAddr::V4(ip) => Ok(ip),
        IpAddr::V6(_) => anyhow::bail!("no local IPv4 address"),
    }
}

/// Device identifier derived from the local network address, stable as long
/// as the DHCP lease holds.
pub fn device_id(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("lumen-{a:02x}{b:02x}{c:02x}{d:02x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn device_id_is_hex_of_the_address() {
        let id = device_id(Ipv4Addr::new(192, 168, 1, 42));
        assert_eq!(id, "lumen-c0a8012a");
    }
}
