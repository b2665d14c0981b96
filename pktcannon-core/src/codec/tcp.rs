//! TCP (RFC 793). Supports the six classic control bits and raw, pre-padded
//! options bytes (data offset is derived from their length).

use std::net::Ipv4Addr;

use super::checksum;

pub const MIN_HEADER_LEN: usize = 20;
pub const MAX_OPTIONS_LEN: usize = 40;

pub const FIN: u8 = 0x01;
pub const SYN: u8 = 0x02;
pub const RST: u8 = 0x04;
pub const PSH: u8 = 0x08;
pub const ACK: u8 = 0x10;
pub const URG: u8 = 0x20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: u8,
    pub window: u16,
    pub urgent_ptr: u16,
    /// Raw option bytes; must already be a multiple of 4 and at most
    /// [`MAX_OPTIONS_LEN`]. Empty by default.
    pub options: Vec<u8>,
    /// Filled in by `pack`/`read`; zero immediately after `build_tcp`.
    pub checksum: u16,
}

pub fn build_tcp(src_port: u16, dst_port: u16, seq: u32, ack: u32, flags: u8, window: u16) -> TcpHeader {
    TcpHeader {
        src_port,
        dst_port,
        seq,
        ack,
        flags,
        window,
        urgent_ptr: 0,
        options: Vec::new(),
        checksum: 0,
    }
}

pub fn header_len(h: &TcpHeader) -> usize {
    MIN_HEADER_LEN + h.options.len()
}

pub fn write(buf: &mut Vec<u8>, h: &TcpHeader) {
    buf.extend_from_slice(&h.src_port.to_be_bytes());
    buf.extend_from_slice(&h.dst_port.to_be_bytes());
    buf.extend_from_slice(&h.seq.to_be_bytes());
    buf.extend_from_slice(&h.ack.to_be_bytes());
    let data_offset_words = (header_len(h) / 4) as u8;
    buf.push(data_offset_words << 4);
    buf.push(h.flags);
    buf.extend_from_slice(&h.window.to_be_bytes());
    buf.extend_from_slice(&h.checksum.to_be_bytes());
    buf.extend_from_slice(&h.urgent_ptr.to_be_bytes());
    buf.extend_from_slice(&h.options);
}

pub fn read(buf: &[u8]) -> Option<(TcpHeader, usize)> {
    if buf.len() < MIN_HEADER_LEN {
        return None;
    }
    let src_port = u16::from_be_bytes([buf[0], buf[1]]);
    let dst_port = u16::from_be_bytes([buf[2], buf[3]]);
    let seq = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let ack = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
    let data_offset = (buf[12] >> 4) as usize * 4;
    if data_offset < MIN_HEADER_LEN || buf.len() < data_offset {
        return None;
    }
    let flags = buf[13];
    let window = u16::from_be_bytes([buf[14], buf[15]]);
    let checksum = u16::from_be_bytes([buf[16], buf[17]]);
    let urgent_ptr = u16::from_be_bytes([buf[18], buf[19]]);
    let options = buf[MIN_HEADER_LEN..data_offset].to_vec();
    Some((
        TcpHeader {
            src_port,
            dst_port,
            seq,
            ack,
            flags,
            window,
            urgent_ptr,
            options,
            checksum,
        },
        data_offset,
    ))
}

/// Computes the TCP checksum over the pseudo-header, the header bytes (with
/// the checksum field zeroed) and the payload.
pub fn compute_checksum(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    header_bytes: &[u8],
    payload: &[u8],
) -> u16 {
    let total_len = header_bytes.len() + payload.len();
    let mut data = checksum::pseudo_header(src, dst, super::ipv4::PROTO_TCP, total_len as u16);
    data.extend_from_slice(header_bytes);
    data.extend_from_slice(payload);
    checksum::ones_complement(&data)
}
