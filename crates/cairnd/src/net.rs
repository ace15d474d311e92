//! Socket setup for link-local IPv6 discovery traffic.

use std::net::{Ipv6Addr, SocketAddrV6};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};

use cairn_core::wire::MULTICAST_ADDR;

/// Where discovery requests go: ff02::1 on `port`, scoped to the interface.
pub fn multicast_dest(port: u16, interface_index: u32) -> Result<SocketAddrV6> {
    let multicast: Ipv6Addr = MULTICAST_ADDR.parse().context("multicast address")?;
    Ok(SocketAddrV6::new(multicast, port, 0, interface_index))
}

/// Ephemeral UDP socket that sends multicast requests and receives the
/// unicast replies to them.
pub fn request_socket(interface_index: u32) -> Result<tokio::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_only_v6(true).context("IPV6_V6ONLY")?;
    socket.set_multicast_if_v6(interface_index).context("IPV6_MULTICAST_IF")?;
    // Link-local only, never routed.
    socket.set_multicast_hops_v6(1).context("IPV6_MULTICAST_HOPS")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0);
    socket.bind(&bind_addr.into()).context("bind()")?;

    tokio::net::UdpSocket::from_std(socket.into()).context("failed to convert to tokio UdpSocket")
}

/// UDP socket bound to the discovery port and joined to ff02::1.
pub fn responder_socket(port: u16, interface_index: u32) -> Result<tokio::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_only_v6(true).context("IPV6_V6ONLY")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0);
    socket.bind(&bind_addr.into()).context("bind()")?;

    let multicast: Ipv6Addr = MULTICAST_ADDR.parse().context("multicast address")?;
    socket
        .join_multicast_v6(&multicast, interface_index)
        .context("IPV6_JOIN_GROUP")?;

    tokio::net::UdpSocket::from_std(socket.into()).context("failed to convert to tokio UdpSocket")
}

/// OS interface index for a named network interface.
pub fn if_index(name: &str) -> Result<u32> {
    let name_cstr = std::ffi::CString::new(name).context("interface name contains null byte")?;
    let index = unsafe { libc::if_nametoindex(name_cstr.as_ptr()) };
    if index == 0 {
        anyhow::bail!("interface '{}' not found", name);
    }
    Ok(index)
}
