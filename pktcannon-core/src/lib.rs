//! Core library for `pktcannon`: the packet codec, range lists, token
//! bucket, raw-device abstraction, ARP resolver and the concurrent scan
//! pipeline. The `pktcannon` binary crate is a thin CLI wrapper around this.

pub mod bucket;
pub mod codec;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod range;
pub mod resolve;
pub mod route;
pub mod script;

pub use bucket::TokenBucket;
pub use codec::{Chain, Layer, MacAddr};
pub use device::{DatalinkDevice, MockDevice, RawDevice, RxBuf, TxBuf};
pub use error::{CoreError, Result};
pub use pipeline::{run_pipeline, Args, PipelineStats};
pub use queue::SendQueue;
pub use range::RangeList;
pub use route::{default_route, RouteInfo};
