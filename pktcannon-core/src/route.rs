//! Best-effort discovery of the outbound interface, local IPv4 address and a
//! guessed gateway address.
//!
//! This is explicitly a heuristic, not a netlink routing-table walk: it
//! picks the first up, non-loopback interface with an IPv4 address and
//! guesses the gateway as "network base + 1". `-l/--local-addr` and
//! `-g/--gateway-addr` exist to override it when it guesses wrong.

use std::net::Ipv4Addr;

use pnet::datalink;
use pnet::ipnetwork::IpNetwork;

use crate::codec::MacAddr;

#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub interface_name: String,
    pub local_ip: Ipv4Addr,
    pub local_mac: MacAddr,
    pub gateway_ip: Ipv4Addr,
}

pub fn default_route() -> Option<RouteInfo> {
    for iface in datalink::interfaces() {
        if iface.is_loopback() || !iface.is_up() {
            continue;
        }
        let mac = match iface.mac {
            Some(m) => MacAddr::new(m.0, m.1, m.2, m.3, m.4, m.5),
            None => continue,
        };
        for ip_network in &iface.ips {
            if let IpNetwork::V4(v4) = ip_network {
                let network_base = u32::from(v4.network());
                let gateway_ip = Ipv4Addr::from(network_base.wrapping_add(1));
                return Some(RouteInfo {
                    interface_name: iface.name.clone(),
                    local_ip: v4.ip(),
                    local_mac: mac,
                    gateway_ip,
                });
            }
        }
    }
    None
}
