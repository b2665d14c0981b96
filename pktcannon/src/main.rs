mod cli;

use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::OsRng;
use rand::RngCore;

use pktcannon_core::device::{DatalinkDevice, RawDevice};
use pktcannon_core::pipeline::Args;
use pktcannon_core::range::{parse_ports, parse_targets};
use pktcannon_core::resolve::resolve_gateway_mac;
use pktcannon_core::route::default_route;
use pktcannon_core::script::{load_noop_host, ScriptHost};
use pktcannon_core::{run_pipeline, PipelineStats};

fn main() {
    let opts = cli::Opts::parse();
    init_logging(opts.verbose);

    match run(opts) {
        Ok(stats) => {
            log::info!(
                "done: sent={} probe={} recv={}",
                stats.pkt_sent,
                stats.pkt_probe,
                stats.pkt_recv
            );
        }
        Err(e) => {
            log::error!("{e:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn run(opts: cli::Opts) -> Result<PipelineStats> {
    let targets = parse_targets(&opts.targets).context("parsing target range-list")?;
    let ports = parse_ports(&opts.ports).context("parsing port range-list")?;

    log::info!(
        "script engine is not implemented in this build; ignoring '{}', using the built-in no-op host",
        opts.script
    );

    let seed = match opts.seed {
        Some(s) => s,
        None => OsRng.next_u64(),
    };

    let route = default_route().context("could not determine a default route")?;
    let local_ip: Ipv4Addr = match &opts.local_addr {
        Some(s) => s.parse().context("parsing --local-addr")?,
        None => route.local_ip,
    };
    let gateway_ip: Ipv4Addr = match &opts.gateway_addr {
        Some(s) => s.parse().context("parsing --gateway-addr")?,
        None => route.gateway_ip,
    };
    let local_mac = route.local_mac;

    log::info!(
        "interface={} local={} ({}) gateway={}",
        route.interface_name,
        local_ip,
        local_mac,
        gateway_ip
    );

    let device: Arc<dyn RawDevice> = Arc::new(
        DatalinkDevice::open(&route.interface_name)
            .with_context(|| format!("opening interface '{}'", route.interface_name))?,
    );

    let gateway_mac = resolve_gateway_mac(device.as_ref(), local_mac, local_ip, gateway_ip)
        .context("resolving gateway MAC address")?;
    log::info!("gateway MAC resolved: {gateway_mac}");

    let args = Arc::new(Args::new(
        targets,
        ports,
        opts.rate,
        seed,
        opts.wait,
        opts.count,
        opts.quiet,
        local_mac,
        local_ip,
        gateway_mac,
        gateway_ip,
        device,
    ));

    let signal_args = args.clone();
    ctrlc::set_handler(move || {
        log::info!("signal received, shutting down");
        signal_args.stop.store(true, Ordering::Relaxed);
    })
    .context("installing Ctrl-C handler")?;

    let factory_args = args.clone();
    let host_factory: Arc<dyn Fn() -> Box<dyn ScriptHost> + Send + Sync> =
        Arc::new(move || Box::new(load_noop_host(&factory_args)));

    Ok(run_pipeline(args, host_factory))
}
