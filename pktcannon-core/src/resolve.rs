//! Synchronous ARP resolution, run once before the pipeline starts.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use crate::codec::{self, arp, eth, Layer, MacAddr};
use crate::device::{RawDevice, TxBuf};
use crate::error::{CoreError, Result};

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Broadcasts an ARP request for `gateway_ip` and polls `device` for a
/// matching reply for up to [`RESOLVE_TIMEOUT`]. Returns the gateway's MAC
/// address on success.
pub fn resolve_gateway_mac(
    device: &dyn RawDevice,
    local_mac: MacAddr,
    local_ip: Ipv4Addr,
    gateway_ip: Ipv4Addr,
) -> Result<MacAddr> {
    let chain = vec![
        Layer::Eth(codec::build_eth(eth::BROADCAST, local_mac)),
        Layer::Arp(codec::build_arp(
            arp::OP_REQUEST,
            local_mac,
            local_ip,
            eth::ZERO,
            gateway_ip,
        )),
    ];
    let bytes = codec::pack(&chain)?;
    device.inject(TxBuf(bytes))?;

    let start = Instant::now();
    loop {
        if start.elapsed() > RESOLVE_TIMEOUT {
            return Err(CoreError::ResolverTimeout(RESOLVE_TIMEOUT));
        }
        let rx = match device.capture() {
            Some(rx) => rx,
            None => continue,
        };
        let reply = codec::unpack(&rx.0);
        device.release(rx);
        if reply.len() < 2 {
            continue;
        }
        if let Layer::Arp(h) = &reply[1] {
            if h.spa == gateway_ip && h.tpa == local_ip {
                return Ok(h.sha);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockDevice;

    fn local() -> (MacAddr, Ipv4Addr) {
        (MacAddr::new(0, 1, 2, 3, 4, 5), Ipv4Addr::new(10, 0, 0, 1))
    }

    #[test]
    fn matching_reply_resolves_gateway_mac() {
        let (local_mac, local_ip) = local();
        let gateway_ip = Ipv4Addr::new(10, 0, 0, 254);
        let gateway_mac = MacAddr::new(9, 8, 7, 6, 5, 4);
        let dev = MockDevice::new(local_mac);

        let reply = vec![
            Layer::Eth(codec::build_eth(local_mac, gateway_mac)),
            Layer::Arp(codec::build_arp(
                arp::OP_REPLY,
                gateway_mac,
                gateway_ip,
                local_mac,
                local_ip,
            )),
        ];
        dev.push_inbound(codec::pack(&reply).unwrap());

        let resolved = resolve_gateway_mac(&dev, local_mac, local_ip, gateway_ip).unwrap();
        assert_eq!(resolved, gateway_mac);

        let injected = dev.injected_frames();
        assert_eq!(injected.len(), 1);
        let sent = codec::unpack(&injected[0]);
        assert!(matches!(&sent[0], Layer::Eth(h) if h.dst == eth::BROADCAST));
    }

    #[test]
    fn mismatched_psrc_does_not_resolve() {
        // Exercise the matching predicate directly: a reply whose `psrc`
        // does not match the gateway IP must not be treated as a match.
        let (local_mac, local_ip) = local();
        let gateway_ip = Ipv4Addr::new(10, 0, 0, 254);
        let other_mac = MacAddr::new(1, 1, 1, 1, 1, 1);

        let reply = vec![
            Layer::Eth(codec::build_eth(local_mac, other_mac)),
            Layer::Arp(codec::build_arp(
                arp::OP_REPLY,
                other_mac,
                Ipv4Addr::new(10, 0, 0, 99), // wrong psrc
                local_mac,
                local_ip,
            )),
        ];
        let parsed = codec::unpack(&codec::pack(&reply).unwrap());
        let matches = match &parsed[1] {
            Layer::Arp(h) => h.spa == gateway_ip && h.tpa == local_ip,
            _ => false,
        };
        assert!(!matches);
    }
}
