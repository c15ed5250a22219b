use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};

use std::sync::Arc;

use KsegMap::config::KsegConfig;
use KsegMap::endpoint::Endpoint;
use KsegMap::service::SnapshotService;

#[derive(Parser, Debug)]
#[command(
    name = "ksegmap_http",
    version,
    about = "KsegMap HTTP endpoint (procmap CSV over GET /kseg, Prometheus on /metrics)"
)]
struct Opt {
    /// Listen address (default: KSEG_HTTP_ADDR or 127.0.0.1:9899)
    #[arg(long)]
    addr: Option<String>,
    /// Snapshot capacity in bytes
    #[arg(long)]
    capacity: Option<usize>,
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let opt = Opt::parse();

    let mut cfg = KsegConfig::from_env();
    if let Some(c) = opt.capacity {
        cfg = cfg.with_snapshot_capacity(c);
    }
    let addr = opt.addr.unwrap_or_else(|| cfg.http_addr.clone());
    log::info!("{}", cfg);

    let svc = Arc::new(SnapshotService::from_config(&cfg));
    let ep = Endpoint::start(&addr, svc)?;
    println!("ksegmap_http listening on {}", addr);

    // Сервер работает до завершения процесса.
    ep.wait();
    Ok(())
}
