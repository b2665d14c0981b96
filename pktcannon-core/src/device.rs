//! Abstraction over a raw link: inject outbound frames, capture inbound
//! frames, independent of the OS-specific backend underneath.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use pnet::datalink;

use crate::codec::MacAddr;
use crate::error::{CoreError, Result};

/// A buffer reserved for an outbound frame.
pub struct TxBuf(pub Vec<u8>);

/// A captured inbound frame.
pub struct RxBuf(pub Vec<u8>);

/// How long `capture` is allowed to block waiting for a frame before
/// returning `None`.
const CAPTURE_TIMEOUT: Duration = Duration::from_millis(200);

/// The raw-device contract: reserve a transmit slot, commit it, poll for an
/// inbound frame, release its storage. Implementations must support
/// `inject` and `capture` being called concurrently from different threads.
pub trait RawDevice: Send + Sync {
    fn get_buf(&self, len: usize) -> TxBuf {
        TxBuf(vec![0u8; len])
    }
    fn inject(&self, buf: TxBuf) -> Result<()>;
    fn capture(&self) -> Option<RxBuf>;
    /// Returns the captured frame's storage. A no-op for backends that
    /// don't pool buffers, but always called by the receiver so the trait
    /// boundary matches backends that do.
    fn release(&self, _buf: RxBuf) {}
    fn local_mac(&self) -> MacAddr;
}

/// Production backend: Ethernet frames over `pnet::datalink`'s channel
/// (AF_PACKET / BPF, depending on what `pnet` picks for the host OS).
pub struct DatalinkDevice {
    tx: Mutex<Box<dyn datalink::DataLinkSender>>,
    rx: Mutex<Box<dyn datalink::DataLinkReceiver>>,
    local_mac: MacAddr,
}

impl DatalinkDevice {
    pub fn open(interface_name: &str) -> Result<Self> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|i| i.name == interface_name)
            .ok_or_else(|| CoreError::DeviceOpen(format!("no such interface: {interface_name}")))?;

        let local_mac = interface
            .mac
            .map(|m| MacAddr::new(m.0, m.1, m.2, m.3, m.4, m.5))
            .ok_or_else(|| {
                CoreError::DeviceOpen(format!("interface {interface_name} has no MAC address"))
            })?;

        let config = datalink::Config {
            read_timeout: Some(CAPTURE_TIMEOUT),
            ..datalink::Config::default()
        };

        let (tx, rx) = match datalink::channel(&interface, config) {
            Ok(datalink::Channel::Ethernet(tx, rx)) => (tx, rx),
            Ok(_) => {
                return Err(CoreError::DeviceOpen(
                    "unsupported datalink channel type".into(),
                ))
            }
            Err(e) => return Err(CoreError::DeviceOpen(e.to_string())),
        };

        Ok(Self {
            tx: Mutex::new(tx),
            rx: Mutex::new(rx),
            local_mac,
        })
    }
}

impl RawDevice for DatalinkDevice {
    fn inject(&self, buf: TxBuf) -> Result<()> {
        let mut tx = self.tx.lock().expect("datalink tx mutex poisoned");
        match tx.send_to(&buf.0, None) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(CoreError::DeviceOpen(format!("inject failed: {e}"))),
            None => Err(CoreError::DeviceOpen(
                "inject failed: device reported no outbound interface".into(),
            )),
        }
    }

    fn capture(&self) -> Option<RxBuf> {
        let mut rx = self.rx.lock().expect("datalink rx mutex poisoned");
        match rx.next() {
            Ok(frame) => Some(RxBuf(frame.to_vec())),
            Err(_) => None,
        }
    }

    fn local_mac(&self) -> MacAddr {
        self.local_mac
    }
}

/// Deterministic in-memory backend used by the ARP resolver tests and the
/// pipeline integration tests: `inject`ed frames are recorded for
/// inspection, and `capture` drains a pre-seeded inbound queue.
#[derive(Default)]
pub struct MockDevice {
    injected: Mutex<Vec<Vec<u8>>>,
    inbound: Mutex<VecDeque<Vec<u8>>>,
    local_mac: MacAddr,
}

impl MockDevice {
    pub fn new(local_mac: MacAddr) -> Self {
        Self {
            injected: Mutex::new(Vec::new()),
            inbound: Mutex::new(VecDeque::new()),
            local_mac,
        }
    }

    /// Queues a frame to be returned by a future `capture` call.
    pub fn push_inbound(&self, frame: Vec<u8>) {
        self.inbound.lock().expect("mock inbound mutex poisoned").push_back(frame);
    }

    /// Returns every frame injected so far, in injection order.
    pub fn injected_frames(&self) -> Vec<Vec<u8>> {
        self.injected.lock().expect("mock injected mutex poisoned").clone()
    }
}

impl RawDevice for MockDevice {
    fn inject(&self, buf: TxBuf) -> Result<()> {
        self.injected.lock().expect("mock injected mutex poisoned").push(buf.0);
        Ok(())
    }

    fn capture(&self) -> Option<RxBuf> {
        self.inbound
            .lock()
            .expect("mock inbound mutex poisoned")
            .pop_front()
            .map(RxBuf)
    }

    fn local_mac(&self) -> MacAddr {
        self.local_mac
    }
}
