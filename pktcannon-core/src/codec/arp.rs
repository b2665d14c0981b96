//! ARP (RFC 826), fixed layout for the Ethernet/IPv4 combination this codec
//! cares about.

use std::net::Ipv4Addr;

use super::eth::MacAddr;

pub const HEADER_LEN: usize = 28;

pub const HTYPE_ETHERNET: u16 = 1;
pub const PTYPE_IPV4: u16 = 0x0800;

pub const OP_REQUEST: u16 = 1;
pub const OP_REPLY: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpHeader {
    pub htype: u16,
    pub ptype: u16,
    pub op: u16,
    pub sha: MacAddr,
    pub spa: Ipv4Addr,
    pub tha: MacAddr,
    pub tpa: Ipv4Addr,
}

pub fn build_arp(op: u16, sha: MacAddr, spa: Ipv4Addr, tha: MacAddr, tpa: Ipv4Addr) -> ArpHeader {
    ArpHeader {
        htype: HTYPE_ETHERNET,
        ptype: PTYPE_IPV4,
        op,
        sha,
        spa,
        tha,
        tpa,
    }
}

pub fn write(buf: &mut Vec<u8>, h: &ArpHeader) {
    buf.extend_from_slice(&h.htype.to_be_bytes());
    buf.extend_from_slice(&h.ptype.to_be_bytes());
    buf.push(6); // hlen
    buf.push(4); // plen
    buf.extend_from_slice(&h.op.to_be_bytes());
    buf.extend_from_slice(&h.sha.octets());
    buf.extend_from_slice(&h.spa.octets());
    buf.extend_from_slice(&h.tha.octets());
    buf.extend_from_slice(&h.tpa.octets());
}

pub fn read(buf: &[u8]) -> Option<(ArpHeader, usize)> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let htype = u16::from_be_bytes([buf[0], buf[1]]);
    let ptype = u16::from_be_bytes([buf[2], buf[3]]);
    // buf[4] = hlen, buf[5] = plen: fixed for Ethernet/IPv4, not re-validated.
    let op = u16::from_be_bytes([buf[6], buf[7]]);
    let sha = MacAddr::new(buf[8], buf[9], buf[10], buf[11], buf[12], buf[13]);
    let spa = Ipv4Addr::new(buf[14], buf[15], buf[16], buf[17]);
    let tha = MacAddr::new(buf[18], buf[19], buf[20], buf[21], buf[22], buf[23]);
    let tpa = Ipv4Addr::new(buf[24], buf[25], buf[26], buf[27]);
    Some((
        ArpHeader {
            htype,
            ptype,
            op,
            sha,
            spa,
            tha,
            tpa,
        },
        HEADER_LEN,
    ))
}
