// src/remote.rs

//! Remote restart trigger.
//!
//! A UDP socket on which any non-empty datagram counts as one restart
//! trigger. The payload is ignored.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use nix::ifaddrs::getifaddrs;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::config::ServerSettings;
use crate::errors::Result;

/// Datagrams are read into a buffer this large; the rest is discarded.
const RECV_BUFFER: usize = 32;

#[derive(Debug)]
pub struct RemoteTrigger {
    socket: UdpSocket,
    local: SocketAddr,
}

impl RemoteTrigger {
    /// Bind the trigger socket.
    ///
    /// An interface that cannot be resolved disables the trigger with a
    /// warning (`Ok(None)`). Failing to bind a resolved address is an error.
    pub async fn bind(settings: &ServerSettings) -> Result<Option<Self>> {
        let Some(ip) = resolve_interface(&settings.interface) else {
            warn!(
                interface = %settings.interface,
                "network interface not found; remote trigger disabled"
            );
            return Ok(None);
        };

        let socket = UdpSocket::bind(SocketAddr::new(ip, settings.port)).await?;
        let local = socket.local_addr()?;
        info!(address = %local, "remote trigger listening");

        Ok(Some(Self { socket, local }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Wait for the next datagram; `true` when it should trigger a restart.
    ///
    /// Cancel safe.
    pub async fn recv(&self) -> bool {
        let mut buf = [0u8; RECV_BUFFER];
        match self.socket.recv_from(&mut buf).await {
            Ok((len, peer)) => {
                debug!(%peer, len, "remote trigger datagram");
                len > 0
            }
            Err(e) => {
                warn!(error = %e, "remote trigger receive failed");
                false
            }
        }
    }
}

/// `any` means every IPv4 address; otherwise an IP literal or the first
/// address of the named interface.
pub fn resolve_interface(name: &str) -> Option<IpAddr> {
    if name.eq_ignore_ascii_case("any") {
        return Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
    if let Ok(ip) = name.parse::<IpAddr>() {
        return Some(ip);
    }

    let addrs = match getifaddrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            warn!(error = %e, "unable to list network interfaces");
            return None;
        }
    };

    addrs
        .filter(|ifa| ifa.interface_name == name)
        .filter_map(|ifa| {
            let addr = ifa.address?;
            if let Some(v4) = addr.as_sockaddr_in() {
                return Some(IpAddr::V4(*SocketAddrV4::from(*v4).ip()));
            }
            addr.as_sockaddr_in6()
                .map(|v6| IpAddr::V6(*SocketAddrV6::from(*v6).ip()))
        })
        .next()
}
