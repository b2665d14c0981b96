use clap::Parser;

/// Scriptable, asynchronous, stateless packet generator and analyzer.
#[derive(Parser, Debug)]
#[command(version, author = "David Martinez Marti <deavidsedice@gmail.com>")]
pub struct Opts {
    /// Target range-list: comma-separated IPv4 literals, ranges
    /// (`a.b.c.d-e.f.g.h`), or CIDR blocks.
    pub targets: String,

    /// Script file driving the loop/recv upcalls. Required; only the
    /// built-in no-op host is wired in (see pktcannon_core::script), so the
    /// path is accepted and logged rather than loaded.
    #[arg(short = 'S', long)]
    pub script: String,

    /// Destination ports, as a range-list.
    #[arg(short, long, default_value = "1")]
    pub ports: String,

    /// Packets per second; 0 disables rate limiting.
    #[arg(short, long, default_value_t = 100)]
    pub rate: u64,

    /// Seed passed to the script host; defaults to a value drawn from
    /// the OS random source.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Seconds to wait after the scan completes, to catch straggler replies.
    #[arg(short, long, default_value_t = 5)]
    pub wait: u64,

    /// Duplicate probes per (target, port) tuple.
    #[arg(short, long, default_value_t = 1)]
    pub count: u64,

    /// Override the source IP address (default: resolved from interface).
    #[arg(short, long = "local-addr")]
    pub local_addr: Option<String>,

    /// Override the gateway IP address (default: from default route).
    #[arg(short, long = "gateway-addr")]
    pub gateway_addr: Option<String>,

    /// Suppress the periodic status line (log output is unaffected).
    #[arg(short, long)]
    pub quiet: bool,

    /// Raise log verbosity; repeatable.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
