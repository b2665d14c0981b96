//! The script host boundary: the minimum interface the pipeline relies on
//! to build outbound probes and interpret inbound replies.
//!
//! The actual scripting engine is out of scope for this crate (see spec
//! §1/§4.8) — only the trait and a no-op, built-in host live here.

use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::codec::{self, ipv4, tcp, Layer};
use crate::pipeline::Args;

/// Per-probe and per-reply upcalls a scripting engine would implement.
pub trait ScriptHost: Send {
    /// Called by the generator once per `(dst_addr, dst_port)` tuple. May
    /// enqueue zero or more chains onto `args.send_queue`. Returning a
    /// negative value skips the tuple without consuming a token.
    fn on_loop(&mut self, args: &Args, dst_addr: Ipv4Addr, dst_port: u16) -> i32;

    /// Called by the receiver once per captured, successfully unpacked
    /// frame. Returning a negative value is not treated as an error; it
    /// just means this frame was not interesting to the script.
    fn on_recv(&mut self, args: &Args, chain: &codec::Chain) -> i32;
}

/// A no-op host used for device-level and pipeline tests: emits a single
/// TCP SYN probe per tuple and only counts replies.
pub struct NoopHost {
    pub probes_built: u64,
    pub replies_seen: u64,
}

impl NoopHost {
    pub fn new() -> Self {
        Self {
            probes_built: 0,
            replies_seen: 0,
        }
    }
}

impl Default for NoopHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptHost for NoopHost {
    fn on_loop(&mut self, args: &Args, dst_addr: Ipv4Addr, dst_port: u16) -> i32 {
        let chain = vec![
            Layer::Eth(codec::build_eth(args.gateway_mac, args.local_mac)),
            Layer::Ipv4(codec::build_ipv4(args.local_ip, dst_addr, ipv4::PROTO_TCP, 64)),
            Layer::Tcp(codec::build_tcp(
                args.source_port(),
                dst_port,
                0x1000_0000,
                0,
                tcp::SYN,
                65535,
            )),
        ];
        args.send_queue.enqueue(chain, true);
        self.probes_built += 1;
        0
    }

    fn on_recv(&mut self, _args: &Args, _chain: &codec::Chain) -> i32 {
        self.replies_seen += 1;
        0
    }
}

/// Convenience constructor matching the spec's `load(args) -> handle`
/// upcall shape.
pub fn load_noop_host(_args: &Arc<Args>) -> NoopHost {
    NoopHost::new()
}
