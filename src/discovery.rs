use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info};

use crate::config::NetworkConfig;
use crate::error::DiscoveryError;

pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);
pub const MULTICAST_PORT: u16 = 50000;

/// Local subnet plus one hop, not the wider network.
pub const MULTICAST_TTL: u32 = 2;
pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(10);

/// Connect target used to make the OS pick the outward-facing interface.
/// Nothing is ever sent to it.
const ROUTE_PROBE_ADDR: (Ipv4Addr, u16) = (Ipv4Addr::new(192, 168, 1, 1), 1);

/// One discovery beacon, built fresh for every broadcast tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Announcement {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub qos: u8,
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BROKER_IP | {} | {} | {}", self.ip, self.port, self.qos)
    }
}

/// Determines the host's outward-facing IPv4 address. The connect call only
/// exercises the routing table; no datagram leaves the host.
pub fn resolve_local_ip() -> Result<Ipv4Addr, DiscoveryError> {
    let socket =
        StdUdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(DiscoveryError::Socket)?;
    socket
        .connect(ROUTE_PROBE_ADDR)
        .map_err(DiscoveryError::NoInterface)?;

    match socket.local_addr().map_err(DiscoveryError::NoInterface)? {
        SocketAddr::V4(addr) => Ok(*addr.ip()),
        SocketAddr::V6(_) => Err(DiscoveryError::NoInterface(io::Error::other(
            "route probe resolved a non-IPv4 local address",
        ))),
    }
}

/// How the announcer discovers the outward-facing address. Injectable so
/// callers can pin the no-interface behavior down deterministically.
pub type AddressResolver = fn() -> Result<Ipv4Addr, DiscoveryError>;

/// Broadcasts the broker's location to the multicast group until the
/// shutdown channel fires. Reports the resolved address (or the resolution
/// failure) exactly once over `ready_tx` before the first broadcast.
pub async fn run_announcer(
    network: NetworkConfig,
    ready_tx: oneshot::Sender<Result<Ipv4Addr, DiscoveryError>>,
    shutdown_rx: watch::Receiver<()>,
) {
    run_announcer_with_resolver(network, resolve_local_ip, ready_tx, shutdown_rx).await
}

pub async fn run_announcer_with_resolver(
    network: NetworkConfig,
    resolver: AddressResolver,
    ready_tx: oneshot::Sender<Result<Ipv4Addr, DiscoveryError>>,
    mut shutdown_rx: watch::Receiver<()>,
) {
    let ip = match resolver() {
        Ok(ip) => ip,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let socket = match open_multicast_socket().await {
        Ok(socket) => socket,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let _ = ready_tx.send(Ok(ip));
    info!(
        "announcing broker at {} to {}:{} every {:?}",
        ip, MULTICAST_GROUP, MULTICAST_PORT, ANNOUNCE_INTERVAL
    );

    let mut ticker = tokio::time::interval(ANNOUNCE_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let message = Announcement {
                    ip,
                    port: network.broker_port,
                    qos: network.broker_qos,
                }
                .to_string();

                match socket.send_to(message.as_bytes(), (MULTICAST_GROUP, MULTICAST_PORT)).await {
                    Ok(_) => debug!("sent announcement: {message}"),
                    // Fire-and-forget: a failed beacon is retried next tick.
                    Err(e) => error!("announcement send failed: {e}"),
                }
            }

            _ = shutdown_rx.changed() => {
                info!("shutdown signal received, stopping broker announcements");
                break;
            }
        }
    }
}

async fn open_multicast_socket() -> Result<UdpSocket, DiscoveryError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .map_err(DiscoveryError::Socket)?;
    socket
        .set_multicast_ttl_v4(MULTICAST_TTL)
        .map_err(DiscoveryError::Socket)?;
    Ok(socket)
}
