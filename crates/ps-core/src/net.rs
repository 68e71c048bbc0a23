//! Local address resolution for advertising an instance

use local_ip_address::Error as IpError;
use std::net::IpAddr;
use tracing::warn;

use crate::{Address, RoleConfig};

/// Source of the machine's local IP addresses
pub trait IpResolver {
    fn local_ip(&self) -> Result<IpAddr, IpError>;
    fn local_ipv6(&self) -> Result<IpAddr, IpError>;
}

/// Resolver backed by the operating system's interfaces
pub struct DefaultIpResolver;

impl IpResolver for DefaultIpResolver {
    fn local_ip(&self) -> Result<IpAddr, IpError> {
        local_ip_address::local_ip()
    }

    fn local_ipv6(&self) -> Result<IpAddr, IpError> {
        local_ip_address::local_ipv6()
    }
}

/// Resolve the local IP, preferring IPv4, falling back to `127.0.0.1`
pub fn local_address_with_resolver<R: IpResolver>(resolver: &R) -> IpAddr {
    match resolver.local_ip().or_else(|_| resolver.local_ipv6()) {
        Ok(addr) => addr,
        Err(e) => {
            warn!(error = %e, "Local IP resolution failed, using loopback");
            IpAddr::from([127, 0, 0, 1])
        }
    }
}

/// Resolve the machine's primary IP address
pub fn local_address() -> IpAddr {
    local_address_with_resolver(&DefaultIpResolver)
}

/// Address this instance should advertise on `port`
///
/// The configured override wins verbatim; otherwise the resolved local IP is
/// combined with `port`.
pub fn advertise_address(config: &RoleConfig, port: u16) -> Address {
    match &config.advertise_address {
        Some(address) => address.clone(),
        None => format_socket_addr(&local_address().to_string(), port),
    }
}

/// Join host and port, bracketing bare IPv6 hosts
pub fn format_socket_addr(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
