//! UDP (RFC 768).

use std::net::Ipv4Addr;

use super::checksum;

pub const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    /// Filled in by `pack`/`read`; zero immediately after `build_udp`.
    pub length: u16,
    /// Filled in by `pack`/`read`; zero immediately after `build_udp`.
    pub checksum: u16,
}

pub fn build_udp(src_port: u16, dst_port: u16) -> UdpHeader {
    UdpHeader {
        src_port,
        dst_port,
        length: 0,
        checksum: 0,
    }
}

pub fn write(buf: &mut Vec<u8>, h: &UdpHeader) {
    buf.extend_from_slice(&h.src_port.to_be_bytes());
    buf.extend_from_slice(&h.dst_port.to_be_bytes());
    buf.extend_from_slice(&h.length.to_be_bytes());
    buf.extend_from_slice(&h.checksum.to_be_bytes());
}

pub fn read(buf: &[u8]) -> Option<(UdpHeader, usize)> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let src_port = u16::from_be_bytes([buf[0], buf[1]]);
    let dst_port = u16::from_be_bytes([buf[2], buf[3]]);
    let length = u16::from_be_bytes([buf[4], buf[5]]);
    let checksum = u16::from_be_bytes([buf[6], buf[7]]);
    Some((
        UdpHeader {
            src_port,
            dst_port,
            length,
            checksum,
        },
        HEADER_LEN,
    ))
}

/// Computes the UDP checksum over the pseudo-header, the header bytes (with
/// the checksum field zeroed) and the payload.
pub fn compute_checksum(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    header_bytes: &[u8],
    payload: &[u8],
) -> u16 {
    let total_len = header_bytes.len() + payload.len();
    let mut data = checksum::pseudo_header(src, dst, super::ipv4::PROTO_UDP, total_len as u16);
    data.extend_from_slice(header_bytes);
    data.extend_from_slice(payload);
    checksum::ones_complement(&data)
}
