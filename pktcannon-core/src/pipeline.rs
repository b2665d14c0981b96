//! The three-worker concurrent pipeline: generator (loop) → send queue →
//! transmitter (send), with the receiver (recv) running independently, plus
//! the shutdown protocol and shared counters described in spec §4.7/§5.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use crate::bucket::TokenBucket;
use crate::codec::{self, MacAddr};
use crate::device::RawDevice;
use crate::queue::SendQueue;
use crate::range::{self, RangeList};
use crate::script::ScriptHost;

const STATUS_INTERVAL: Duration = Duration::from_millis(250);
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Process-wide shared state, read by every worker and the status loop.
pub struct Args {
    pub targets: RangeList,
    pub ports: RangeList,
    pub rate: u64,
    pub seed: u64,
    pub wait: u64,
    pub count: u64,
    pub quiet: bool,

    pub local_mac: MacAddr,
    pub local_ip: Ipv4Addr,
    pub gateway_mac: MacAddr,
    pub gateway_ip: Ipv4Addr,

    pub device: Arc<dyn RawDevice>,
    pub send_queue: SendQueue,

    /// Total number of `(target, port)` tuples the generator will enumerate
    /// (`T * P * count`), fixed at construction time.
    pub pkt_count: u64,
    pub pkt_sent: AtomicU64,
    pub pkt_probe: AtomicU64,
    pub pkt_recv: AtomicU64,

    pub done: AtomicBool,
    pub stop: AtomicBool,
}

impl Args {
    pub fn new(
        targets: RangeList,
        ports: RangeList,
        rate: u64,
        seed: u64,
        wait: u64,
        count: u64,
        quiet: bool,
        local_mac: MacAddr,
        local_ip: Ipv4Addr,
        gateway_mac: MacAddr,
        gateway_ip: Ipv4Addr,
        device: Arc<dyn RawDevice>,
    ) -> Self {
        let pkt_count = targets.count() * ports.count() * count;
        Self {
            targets,
            ports,
            rate,
            seed,
            wait,
            count,
            quiet,
            local_mac,
            local_ip,
            gateway_mac,
            gateway_ip,
            device,
            send_queue: SendQueue::new(),
            pkt_count,
            pkt_sent: AtomicU64::new(0),
            pkt_probe: AtomicU64::new(0),
            pkt_recv: AtomicU64::new(0),
            done: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        }
    }

    /// A deterministic ephemeral source port derived from the scan seed.
    /// A real script would normally choose this itself; the no-op host
    /// uses it so outbound probes have a stable, reproducible source port.
    pub fn source_port(&self) -> u16 {
        40000u16.wrapping_add((self.seed % 20_000) as u16)
    }
}

/// Final counters reported after the pipeline has fully shut down.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    pub pkt_sent: u64,
    pub pkt_recv: u64,
    pub pkt_probe: u64,
}

type HostFactory = Arc<dyn Fn() -> Box<dyn ScriptHost> + Send + Sync>;

/// Runs the full pipeline to completion: spawns generator/transmitter/
/// receiver on their own OS threads (waiting for each to signal it has
/// finished per-thread init before starting the next), drives the status
/// loop on the calling thread, then executes the shutdown protocol.
pub fn run_pipeline(args: Arc<Args>, host_factory: HostFactory) -> PipelineStats {
    let (gen_started_tx, gen_started_rx) = mpsc::sync_channel(0);
    let gen_args = args.clone();
    let gen_host = host_factory();
    let generator = thread::Builder::new()
        .name("pktcannon-loop".into())
        .spawn(move || generator_thread(gen_args, gen_host, gen_started_tx))
        .expect("failed to spawn generator thread");
    gen_started_rx.recv().expect("generator thread did not start");

    let (send_started_tx, send_started_rx) = mpsc::sync_channel(0);
    let send_args = args.clone();
    let transmitter = thread::Builder::new()
        .name("pktcannon-send".into())
        .spawn(move || transmitter_thread(send_args, send_started_tx))
        .expect("failed to spawn transmitter thread");
    send_started_rx.recv().expect("transmitter thread did not start");

    let (recv_started_tx, recv_started_rx) = mpsc::sync_channel(0);
    let recv_args = args.clone();
    let recv_host = host_factory();
    let receiver = thread::Builder::new()
        .name("pktcannon-recv".into())
        .spawn(move || receiver_thread(recv_args, recv_host, recv_started_tx))
        .expect("failed to spawn receiver thread");
    recv_started_rx.recv().expect("receiver thread did not start");

    status_loop(&args);

    generator.join().expect("generator thread panicked");
    thread::sleep(Duration::from_secs(args.wait));
    args.done.store(true, Ordering::Relaxed);
    transmitter.join().expect("transmitter thread panicked");
    receiver.join().expect("receiver thread panicked");

    PipelineStats {
        pkt_sent: args.pkt_sent.load(Ordering::Relaxed),
        pkt_recv: args.pkt_recv.load(Ordering::Relaxed),
        pkt_probe: args.pkt_probe.load(Ordering::Relaxed),
    }
}

fn generator_thread(args: Arc<Args>, mut host: Box<dyn ScriptHost>, started: mpsc::SyncSender<()>) {
    let mut bucket = TokenBucket::new(args.rate);
    let _ = started.send(());

    let targets_count = args.targets.count();
    let n = args.pkt_count;
    if targets_count == 0 || n == 0 {
        return;
    }

    let mut i = 0u64;
    while i < n {
        if args.stop.load(Ordering::Relaxed) {
            break;
        }
        let granted = bucket.consume();
        let mut drained = 0u64;
        while drained < granted && i < n {
            if args.stop.load(Ordering::Relaxed) {
                break;
            }
            let (target_idx, port_idx) = range::enumeration_indices(i, targets_count, args.count);
            let target_ip = Ipv4Addr::from(args.targets.pick(target_idx));
            let port = args.ports.pick(port_idx) as u16;
            i += 1;

            let rc = host.on_loop(&args, target_ip, port);
            if rc >= 0 {
                bucket.take();
                drained += 1;
            }
        }
    }
}

fn transmitter_thread(args: Arc<Args>, started: mpsc::SyncSender<()>) {
    let mut bucket = TokenBucket::new(args.rate);
    let _ = started.send(());

    loop {
        if args.done.load(Ordering::Relaxed) {
            break;
        }
        let granted = bucket.consume();
        let mut drained = 0u64;
        while drained < granted {
            let queued = match args.send_queue.dequeue() {
                Some(q) => q,
                None => break,
            };
            match codec::pack(&queued.chain) {
                Ok(bytes) => {
                    let mut buf = args.device.get_buf(bytes.len());
                    buf.0.copy_from_slice(&bytes);
                    match args.device.inject(buf) {
                        Ok(()) => {
                            args.pkt_sent.fetch_add(1, Ordering::Relaxed);
                            if queued.probe {
                                args.pkt_probe.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        Err(e) => log::warn!("inject failed: {e}"),
                    }
                }
                Err(e) => log::warn!("pack failed, dropping packet: {e}"),
            }
            bucket.take();
            drained += 1;
        }
        if args.send_queue.is_empty() {
            thread::sleep(IDLE_SLEEP);
        }
    }
}

fn receiver_thread(args: Arc<Args>, mut host: Box<dyn ScriptHost>, started: mpsc::SyncSender<()>) {
    let _ = started.send(());

    loop {
        if args.done.load(Ordering::Relaxed) {
            break;
        }
        let rx = match args.device.capture() {
            Some(rx) => rx,
            None => {
                thread::sleep(IDLE_SLEEP);
                continue;
            }
        };
        let chain = codec::unpack(&rx.0);
        args.device.release(rx);
        if chain.len() < 2 {
            continue;
        }
        args.pkt_recv.fetch_add(1, Ordering::Relaxed);
        let _ = host.on_recv(&args, &chain);
    }
}

fn status_loop(args: &Args) {
    loop {
        thread::sleep(STATUS_INTERVAL);
        if !args.quiet {
            log::info!(
                "sent={} probe={}/{} recv={}",
                args.pkt_sent.load(Ordering::Relaxed),
                args.pkt_probe.load(Ordering::Relaxed),
                args.pkt_count,
                args.pkt_recv.load(Ordering::Relaxed),
            );
        }
        if args.stop.load(Ordering::Relaxed) {
            break;
        }
        if args.pkt_probe.load(Ordering::Relaxed) >= args.pkt_count {
            args.stop.store(true, Ordering::Relaxed);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockDevice;
    use crate::script::NoopHost;

    fn test_args(targets: &str, ports: &str, rate: u64, count: u64) -> Arc<Args> {
        let device: Arc<dyn RawDevice> = Arc::new(MockDevice::new(MacAddr::new(1, 1, 1, 1, 1, 1)));
        Arc::new(Args::new(
            range::parse_targets(targets).unwrap(),
            range::parse_ports(ports).unwrap(),
            rate,
            42,
            0,
            count,
            true,
            MacAddr::new(1, 1, 1, 1, 1, 1),
            Ipv4Addr::new(10, 0, 0, 1),
            MacAddr::new(2, 2, 2, 2, 2, 2),
            Ipv4Addr::new(10, 0, 0, 254),
            device,
        ))
    }

    #[test]
    fn single_target_single_port_produces_one_probe_and_one_frame() {
        let args = test_args("10.0.0.1", "22", 0, 1);
        let factory: HostFactory = Arc::new(|| Box::new(NoopHost::new()));
        let stats = run_pipeline(args.clone(), factory);
        assert_eq!(stats.pkt_probe, 1);
        assert_eq!(stats.pkt_sent, 1);
    }

    #[test]
    fn enumeration_matches_expected_pkt_count() {
        let args = test_args("10.0.0.1-10.0.0.3", "22,80", 0, 2);
        assert_eq!(args.pkt_count, 12);
        let factory: HostFactory = Arc::new(|| Box::new(NoopHost::new()));
        let stats = run_pipeline(args, factory);
        assert_eq!(stats.pkt_probe, 12);
        assert_eq!(stats.pkt_sent, 12);
    }

    #[test]
    fn stop_flag_halts_generator_before_completion() {
        let args = test_args("10.0.0.0/16", "1-100", 0, 1);
        // Flip `stop` immediately so the generator exits almost at once,
        // standing in for a SIGINT during a huge scan (spec §8 scenario 5)
        // without a real OS signal or a multi-second wall-clock run.
        args.stop.store(true, Ordering::Relaxed);
        let factory: HostFactory = Arc::new(|| Box::new(NoopHost::new()));
        let stats = run_pipeline(args.clone(), factory);
        assert!(stats.pkt_probe < args.pkt_count);
    }
}
