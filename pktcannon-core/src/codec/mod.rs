//! Layered packet codec: build, pack and unpack chains of Ethernet / ARP /
//! IPv4 / TCP / UDP / ICMP headers.
//!
//! This is the hard part of the crate. There is no general "protocol
//! registry": each layer knows how to emit and parse its own fixed (or, for
//! IPv4/TCP, IHL/data-offset-driven) header, and [`pack`]/[`unpack`] drive
//! the chaining, checksum back-patching, and next-protocol selection.

pub mod arp;
pub mod checksum;
pub mod eth;
pub mod icmp;
pub mod ipv4;
pub mod tcp;
pub mod udp;

pub use arp::{build_arp, ArpHeader};
pub use eth::{build_eth, EthHeader, MacAddr};
pub use icmp::{build_icmp_echo, IcmpHeader};
pub use ipv4::{build_ipv4, Ipv4Header};
pub use tcp::{build_tcp, TcpHeader};
pub use udp::{build_udp, UdpHeader};

use crate::error::{CoreError, Result};

/// One layer of a packet chain, outermost-first.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Eth(EthHeader),
    Arp(ArpHeader),
    Ipv4(Ipv4Header),
    Tcp(TcpHeader),
    Udp(UdpHeader),
    Icmp(IcmpHeader),
    /// Opaque trailing bytes. If present, always the last element of a
    /// chain.
    Payload(Vec<u8>),
}

/// An ordered, outermost-first sequence of packet layers.
pub type Chain = Vec<Layer>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Eth,
    Arp,
    Ipv4,
    Tcp,
    Udp,
    Icmp,
    Payload,
}

impl Layer {
    fn kind(&self) -> Kind {
        match self {
            Layer::Eth(_) => Kind::Eth,
            Layer::Arp(_) => Kind::Arp,
            Layer::Ipv4(_) => Kind::Ipv4,
            Layer::Tcp(_) => Kind::Tcp,
            Layer::Udp(_) => Kind::Udp,
            Layer::Icmp(_) => Kind::Icmp,
            Layer::Payload(_) => Kind::Payload,
        }
    }
}

fn legal_pair(outer: Kind, inner: Kind) -> bool {
    matches!(
        (outer, inner),
        (Kind::Eth, Kind::Ipv4)
            | (Kind::Eth, Kind::Arp)
            | (Kind::Ipv4, Kind::Tcp)
            | (Kind::Ipv4, Kind::Udp)
            | (Kind::Ipv4, Kind::Icmp)
            | (Kind::Eth, Kind::Payload)
            | (Kind::Arp, Kind::Payload)
            | (Kind::Ipv4, Kind::Payload)
            | (Kind::Tcp, Kind::Payload)
            | (Kind::Udp, Kind::Payload)
            | (Kind::Icmp, Kind::Payload)
    )
}

/// Checks that every adjacent pair of layers in `chain` is a legal
/// encapsulation (Ethernet wraps IPv4 or ARP; IPv4 wraps TCP/UDP/ICMP; any
/// layer may be followed by an opaque payload as the last element).
pub fn validate_chain(chain: &[Layer]) -> Result<()> {
    if chain.is_empty() {
        return Err(CoreError::MalformedChain("empty chain".into()));
    }
    for w in chain.windows(2) {
        let (outer, inner) = (w[0].kind(), w[1].kind());
        if !legal_pair(outer, inner) {
            return Err(CoreError::MalformedChain(format!(
                "illegal encapsulation: {outer:?} cannot wrap {inner:?}"
            )));
        }
    }
    if let Some(pos) = chain.iter().position(|l| l.kind() == Kind::Payload) {
        if pos != chain.len() - 1 {
            return Err(CoreError::MalformedChain(
                "payload layer must be last".into(),
            ));
        }
    }
    Ok(())
}

fn next_ethertype(next: Option<&Layer>) -> Result<u16> {
    match next.map(Layer::kind) {
        Some(Kind::Ipv4) => Ok(eth::ETHERTYPE_IPV4),
        Some(Kind::Arp) => Ok(eth::ETHERTYPE_ARP),
        _ => Err(CoreError::MalformedChain(
            "Ethernet layer must be followed by IPv4 or ARP".into(),
        )),
    }
}

fn next_ip_protocol(next: Option<&Layer>) -> Result<u8> {
    match next.map(Layer::kind) {
        Some(Kind::Tcp) => Ok(ipv4::PROTO_TCP),
        Some(Kind::Udp) => Ok(ipv4::PROTO_UDP),
        Some(Kind::Icmp) => Ok(ipv4::PROTO_ICMP),
        _ => Err(CoreError::MalformedChain(
            "IPv4 layer must be followed by TCP, UDP or ICMP".into(),
        )),
    }
}

#[derive(Clone, Copy)]
enum Transport {
    Tcp,
    Udp,
    Icmp,
}

/// Packs `chain` into wire bytes, computing IPv4/TCP/UDP/ICMP checksums and
/// the IPv4 total length and TCP/UDP length fields along the way.
pub fn pack(chain: &[Layer]) -> Result<Vec<u8>> {
    validate_chain(chain)?;

    let mut buf = Vec::new();
    let mut ipv4_offset: Option<usize> = None;
    let mut ipv4_addrs: Option<(std::net::Ipv4Addr, std::net::Ipv4Addr)> = None;
    let mut transport: Option<(usize, Transport)> = None;

    for (idx, layer) in chain.iter().enumerate() {
        match layer {
            Layer::Eth(h) => {
                let mut h = *h;
                h.ethertype = next_ethertype(chain.get(idx + 1))?;
                eth::write(&mut buf, &h);
            }
            Layer::Arp(h) => arp::write(&mut buf, h),
            Layer::Ipv4(h) => {
                let mut h = h.clone();
                h.protocol = next_ip_protocol(chain.get(idx + 1))?;
                h.total_length = 0;
                h.checksum = 0;
                ipv4_offset = Some(buf.len());
                ipv4_addrs = Some((h.src, h.dst));
                ipv4::write(&mut buf, &h);
            }
            Layer::Tcp(h) => {
                if h.options.len() % 4 != 0 || h.options.len() > tcp::MAX_OPTIONS_LEN {
                    return Err(CoreError::MalformedChain(
                        "TCP options must be a multiple of 4 bytes, at most 40".into(),
                    ));
                }
                transport = Some((buf.len(), Transport::Tcp));
                let mut h = h.clone();
                h.checksum = 0;
                tcp::write(&mut buf, &h);
            }
            Layer::Udp(h) => {
                transport = Some((buf.len(), Transport::Udp));
                let mut h = *h;
                h.length = 0;
                h.checksum = 0;
                udp::write(&mut buf, &h);
            }
            Layer::Icmp(h) => {
                transport = Some((buf.len(), Transport::Icmp));
                let mut h = *h;
                h.checksum = 0;
                icmp::write(&mut buf, &h);
            }
            Layer::Payload(bytes) => buf.extend_from_slice(bytes),
        }
    }

    if let Some(off) = ipv4_offset {
        let total_length = (buf.len() - off) as u16;
        buf[off + 2..off + 4].copy_from_slice(&total_length.to_be_bytes());
        let csum = checksum::ones_complement(&buf[off..off + ipv4::MIN_HEADER_LEN]);
        buf[off + 10..off + 12].copy_from_slice(&csum.to_be_bytes());
    }

    if let Some((off, kind)) = transport {
        let (src, dst) = ipv4_addrs.ok_or_else(|| {
            CoreError::MalformedChain("transport layer without a preceding IPv4 layer".into())
        })?;
        match kind {
            Transport::Tcp => {
                let data_offset = ((buf[off + 12] >> 4) as usize) * 4;
                let header_bytes = buf[off..off + data_offset].to_vec();
                let payload = buf[off + data_offset..].to_vec();
                let csum = tcp::compute_checksum(src, dst, &header_bytes, &payload);
                buf[off + 16..off + 18].copy_from_slice(&csum.to_be_bytes());
            }
            Transport::Udp => {
                let length = (buf.len() - off) as u16;
                buf[off + 4..off + 6].copy_from_slice(&length.to_be_bytes());
                let header_bytes = buf[off..off + udp::HEADER_LEN].to_vec();
                let payload = buf[off + udp::HEADER_LEN..].to_vec();
                let csum = udp::compute_checksum(src, dst, &header_bytes, &payload);
                buf[off + 6..off + 8].copy_from_slice(&csum.to_be_bytes());
            }
            Transport::Icmp => {
                let header_bytes = buf[off..off + icmp::HEADER_LEN].to_vec();
                let payload = buf[off + icmp::HEADER_LEN..].to_vec();
                let csum = icmp::compute_checksum(&header_bytes, &payload);
                buf[off + 2..off + 4].copy_from_slice(&csum.to_be_bytes());
            }
        }
    }

    Ok(buf)
}

/// Parses `buf` outermost-first, starting from Ethernet, stopping when the
/// buffer is consumed or an unknown next-protocol selector is hit (the
/// remainder becomes an opaque payload). Returns the parsed chain; an empty
/// chain means the frame was truncated before a complete Ethernet header.
pub fn unpack(buf: &[u8]) -> Chain {
    let mut chain = Vec::new();
    let (eth_header, mut offset) = match eth::read(buf) {
        Some(v) => v,
        None => return chain,
    };
    let mut next_kind = match eth_header.ethertype {
        eth::ETHERTYPE_IPV4 => Some(Kind::Ipv4),
        eth::ETHERTYPE_ARP => Some(Kind::Arp),
        _ => None,
    };
    chain.push(Layer::Eth(eth_header));

    loop {
        let rest = &buf[offset..];
        match next_kind {
            Some(Kind::Arp) => {
                if let Some((h, len)) = arp::read(rest) {
                    offset += len;
                    chain.push(Layer::Arp(h));
                }
                break;
            }
            Some(Kind::Ipv4) => {
                let (h, len) = match ipv4::read(rest) {
                    Some(v) => v,
                    None => break,
                };
                offset += len;
                let proto = h.protocol;
                next_kind = match proto {
                    ipv4::PROTO_TCP => Some(Kind::Tcp),
                    ipv4::PROTO_UDP => Some(Kind::Udp),
                    ipv4::PROTO_ICMP => Some(Kind::Icmp),
                    _ => None,
                };
                chain.push(Layer::Ipv4(h));
                continue;
            }
            Some(Kind::Tcp) => {
                if let Some((h, len)) = tcp::read(&buf[offset..]) {
                    offset += len;
                    chain.push(Layer::Tcp(h));
                }
                break;
            }
            Some(Kind::Udp) => {
                if let Some((h, len)) = udp::read(&buf[offset..]) {
                    offset += len;
                    chain.push(Layer::Udp(h));
                }
                break;
            }
            Some(Kind::Icmp) => {
                if let Some((h, len)) = icmp::read(&buf[offset..]) {
                    offset += len;
                    chain.push(Layer::Icmp(h));
                }
                break;
            }
            _ => break,
        }
    }

    if offset < buf.len() {
        chain.push(Layer::Payload(buf[offset..].to_vec()));
    }

    chain
}

/// Validates every checksum present in `chain` that this codec knows how to
/// check (IPv4, TCP, UDP, ICMP). Returns `Ok(())` if all present checksums
/// are valid, or the first `MalformedChain` mismatch found. Unpack itself
/// never calls this; it is an explicit, separate operation per spec §4.4.
pub fn verify_checksums(chain: &Chain) -> Result<()> {
    let mut ipv4_addrs: Option<(std::net::Ipv4Addr, std::net::Ipv4Addr)> = None;
    for (idx, layer) in chain.iter().enumerate() {
        match layer {
            Layer::Ipv4(h) => {
                ipv4_addrs = Some((h.src, h.dst));
                let mut raw = Vec::new();
                ipv4::write(&mut raw, h);
                if !checksum::verify(&raw[..ipv4::MIN_HEADER_LEN]) {
                    return Err(CoreError::MalformedChain(
                        "IPv4 header checksum invalid".into(),
                    ));
                }
            }
            Layer::Tcp(h) => {
                let (src, dst) = ipv4_addrs.ok_or_else(|| {
                    CoreError::MalformedChain("TCP layer without preceding IPv4".into())
                })?;
                let mut header_bytes = Vec::new();
                tcp::write(&mut header_bytes, h);
                let payload = trailing_payload(chain, idx);
                let total_len = header_bytes.len() + payload.len();
                let mut data = checksum::pseudo_header(src, dst, ipv4::PROTO_TCP, total_len as u16);
                data.extend_from_slice(&header_bytes);
                data.extend_from_slice(payload);
                if !checksum::verify(&data) {
                    return Err(CoreError::MalformedChain("TCP checksum invalid".into()));
                }
            }
            Layer::Udp(h) => {
                let (src, dst) = ipv4_addrs.ok_or_else(|| {
                    CoreError::MalformedChain("UDP layer without preceding IPv4".into())
                })?;
                let mut header_bytes = Vec::new();
                udp::write(&mut header_bytes, h);
                let payload = trailing_payload(chain, idx);
                let total_len = header_bytes.len() + payload.len();
                let mut data = checksum::pseudo_header(src, dst, ipv4::PROTO_UDP, total_len as u16);
                data.extend_from_slice(&header_bytes);
                data.extend_from_slice(payload);
                if !checksum::verify(&data) {
                    return Err(CoreError::MalformedChain("UDP checksum invalid".into()));
                }
            }
            Layer::Icmp(h) => {
                let mut header_bytes = Vec::new();
                icmp::write(&mut header_bytes, h);
                let payload = trailing_payload(chain, idx);
                let mut data = header_bytes;
                data.extend_from_slice(payload);
                if !checksum::verify(&data) {
                    return Err(CoreError::MalformedChain("ICMP checksum invalid".into()));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn trailing_payload(chain: &Chain, idx: usize) -> &[u8] {
    match chain.get(idx + 1) {
        Some(Layer::Payload(bytes)) => bytes,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample_chain() -> Chain {
        let eth = build_eth(
            MacAddr::new(0xaa, 0xbb, 0xcc, 0, 0, 1),
            MacAddr::new(0xaa, 0xbb, 0xcc, 0, 0, 2),
        );
        let ip = build_ipv4(
            Ipv4Addr::new(1, 2, 3, 4),
            Ipv4Addr::new(5, 6, 7, 8),
            0,
            64,
        );
        let tcp = build_tcp(1234, 80, 0x1000, 0, tcp::SYN, 65535);
        vec![Layer::Eth(eth), Layer::Ipv4(ip), Layer::Tcp(tcp)]
    }

    #[test]
    fn pack_produces_expected_length_and_valid_checksums() {
        let chain = sample_chain();
        let bytes = pack(&chain).unwrap();
        assert_eq!(bytes.len(), eth::HEADER_LEN + ipv4::MIN_HEADER_LEN + tcp::MIN_HEADER_LEN);

        let ip_off = eth::HEADER_LEN;
        assert!(checksum::verify(&bytes[ip_off..ip_off + ipv4::MIN_HEADER_LEN]));

        let tcp_off = ip_off + ipv4::MIN_HEADER_LEN;
        let pseudo = checksum::pseudo_header(
            Ipv4Addr::new(1, 2, 3, 4),
            Ipv4Addr::new(5, 6, 7, 8),
            ipv4::PROTO_TCP,
            tcp::MIN_HEADER_LEN as u16,
        );
        let mut full = pseudo;
        full.extend_from_slice(&bytes[tcp_off..]);
        assert!(checksum::verify(&full));
    }

    #[test]
    fn unpack_round_trips_pack() {
        let chain = sample_chain();
        let bytes = pack(&chain).unwrap();
        let parsed = unpack(&bytes);
        assert_eq!(parsed.len(), 3);
        match &parsed[1] {
            Layer::Ipv4(h) => {
                assert_eq!(h.src, Ipv4Addr::new(1, 2, 3, 4));
                assert_eq!(h.dst, Ipv4Addr::new(5, 6, 7, 8));
                assert_eq!(h.total_length as usize, ipv4::MIN_HEADER_LEN + tcp::MIN_HEADER_LEN);
            }
            other => panic!("expected IPv4 layer, got {other:?}"),
        }
        match &parsed[2] {
            Layer::Tcp(h) => {
                assert_eq!(h.src_port, 1234);
                assert_eq!(h.dst_port, 80);
                assert_eq!(h.flags, tcp::SYN);
            }
            other => panic!("expected TCP layer, got {other:?}"),
        }
        verify_checksums(&parsed).unwrap();
    }

    #[test]
    fn pack_repack_byte_identical_for_valid_chain() {
        let chain = sample_chain();
        let once = pack(&chain).unwrap();
        let parsed = unpack(&once);
        let twice = pack(&parsed).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn unpack_unknown_ethertype_yields_eth_only_plus_payload() {
        let mut bytes = vec![0u8; eth::HEADER_LEN + 4];
        bytes[12] = 0x88;
        bytes[13] = 0xcc; // some unrelated EtherType (LLDP)
        bytes[eth::HEADER_LEN..].copy_from_slice(&[1, 2, 3, 4]);
        let chain = unpack(&bytes);
        assert_eq!(chain.len(), 2);
        assert!(matches!(chain[0], Layer::Eth(_)));
        assert!(matches!(&chain[1], Layer::Payload(p) if p == &[1,2,3,4]));
    }

    #[test]
    fn unpack_truncated_before_eth_header_is_empty() {
        let chain = unpack(&[0u8; 4]);
        assert!(chain.is_empty());
    }

    #[test]
    fn malformed_chain_rejected() {
        let eth = build_eth(eth::ZERO, eth::ZERO);
        let udp = build_udp(1, 2);
        let chain = vec![Layer::Eth(eth), Layer::Udp(udp)];
        assert!(matches!(pack(&chain), Err(CoreError::MalformedChain(_))));
    }

    #[test]
    fn udp_chain_checksum_validates() {
        let eth = build_eth(
            MacAddr::new(1, 2, 3, 4, 5, 6),
            MacAddr::new(6, 5, 4, 3, 2, 1),
        );
        let ip = build_ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), 0, 32);
        let udp = build_udp(53, 12345);
        let chain = vec![
            Layer::Eth(eth),
            Layer::Ipv4(ip),
            Layer::Udp(udp),
            Layer::Payload(vec![0xde, 0xad, 0xbe, 0xef]),
        ];
        let bytes = pack(&chain).unwrap();
        let parsed = unpack(&bytes);
        verify_checksums(&parsed).unwrap();
    }

    #[test]
    fn icmp_echo_checksum_validates() {
        let eth = build_eth(eth::ZERO, eth::ZERO);
        let ip = build_ipv4(Ipv4Addr::new(192, 168, 0, 1), Ipv4Addr::new(192, 168, 0, 2), 0, 64);
        let icmp = build_icmp_echo(icmp::TYPE_ECHO_REQUEST, 0x1234, 1);
        let chain = vec![
            Layer::Eth(eth),
            Layer::Ipv4(ip),
            Layer::Icmp(icmp),
            Layer::Payload(vec![0; 16]),
        ];
        let bytes = pack(&chain).unwrap();
        let parsed = unpack(&bytes);
        verify_checksums(&parsed).unwrap();

        match &parsed[2] {
            Layer::Icmp(h) => {
                assert_eq!(icmp::identifier(h), 0x1234);
                assert_eq!(icmp::sequence(h), 1);
            }
            other => panic!("expected ICMP layer, got {other:?}"),
        }
    }
}
