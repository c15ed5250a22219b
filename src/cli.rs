use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::catalog::build_catalog;
use crate::config::{parse_hex_u64, KsegConfig, Style};
use crate::endpoint::Endpoint;
use crate::facts::variant::matched_marker;
use crate::facts::{resolve_variant, ArchFamily, FactsSource, HostFacts, WordWidth};
use crate::render::render_table;
use crate::service::{Interrupt, SnapshotService};

#[derive(Parser, Debug)]
#[command(
    name = "ksegmap",
    version,
    about = "Kernel segment (kernel VAS) map: regions as procmap CSV or a table",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override detected arch family (x86|arm|other)
    #[arg(long, global = true)]
    arch: Option<ArchFamily>,
    /// Override detected word width (32|64)
    #[arg(long, global = true)]
    word_width: Option<u32>,
    /// Override the kernel release string
    #[arg(long, global = true)]
    release: Option<String>,
    /// Force KASAN shadow region on/off
    #[arg(long, global = true)]
    kasan: Option<bool>,
    /// Force HIGHMEM region on/off
    #[arg(long, global = true)]
    highmem: Option<bool>,
    /// Override PAGE_OFFSET (hex)
    #[arg(long, global = true)]
    page_offset: Option<String>,
    /// Snapshot capacity in bytes
    #[arg(long, global = true)]
    capacity: Option<usize>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Print the current region catalog
    ///
    /// Пример:
    ///   ksegmap show
    ///   ksegmap show --style table
    ///   ksegmap show --json
    Show {
        /// csv (procmap format) | table (human-readable)
        #[arg(long)]
        style: Option<Style>,
        /// JSON array of regions
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Read one window of the snapshot (raw bytes to stdout)
    Read {
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long)]
        len: Option<usize>,
        /// Print consumed byte count to stderr
        #[arg(long, default_value_t = false)]
        verbose: bool,
    },
    /// Print detected platform facts
    Facts {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Resolve a release string to its variant code
    Variant { release: String },
    /// Serve the snapshot over HTTP until stdin is closed (or Enter)
    Serve {
        #[arg(long)]
        addr: Option<String>,
    },
}

impl Cli {
    /// Env config with command-line overrides applied on top.
    fn config(&self) -> Result<KsegConfig> {
        let mut cfg = KsegConfig::from_env();
        if self.arch.is_some() {
            cfg = cfg.with_arch(self.arch);
        }
        if let Some(bits) = self.word_width {
            let w = WordWidth::from_bits(bits)
                .ok_or_else(|| anyhow!("--word-width must be 32 or 64, got {}", bits))?;
            cfg = cfg.with_word_width(Some(w));
        }
        if self.release.is_some() {
            cfg = cfg.with_release(self.release.clone());
        }
        if self.kasan.is_some() {
            cfg = cfg.with_kasan(self.kasan);
        }
        if self.highmem.is_some() {
            cfg = cfg.with_highmem(self.highmem);
        }
        if let Some(po) = &self.page_offset {
            let v = parse_hex_u64(po).ok_or_else(|| anyhow!("bad --page-offset '{}'", po))?;
            cfg = cfg.with_page_offset(Some(v));
        }
        if let Some(c) = self.capacity {
            cfg = cfg.with_snapshot_capacity(c);
        }
        Ok(cfg.build())
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.config()?;
    log::debug!("{}", cfg);

    match cli.cmd {
        Cmd::Show { style, json } => cmd_show(&cfg, style.unwrap_or(cfg.style), json),
        Cmd::Read { offset, len, verbose } => cmd_read(&cfg, offset, len, verbose),
        Cmd::Facts { json } => cmd_facts(&cfg, json),
        Cmd::Variant { release } => {
            match matched_marker(&release) {
                Some(m) => log::debug!("variant marker '{}' in '{}'", m, release),
                None => log::debug!("no variant marker in '{}'", release),
            }
            println!("{}", resolve_variant(&release));
            Ok(())
        }
        Cmd::Serve { addr } => cmd_serve(&cfg, addr),
    }
}

pub fn cmd_show(cfg: &KsegConfig, style: Style, json: bool) -> Result<()> {
    if json {
        let facts = HostFacts::new(cfg).facts();
        let regions = build_catalog(&facts);
        let s = serde_json::to_string_pretty(&regions).context("serialize regions")?;
        println!("{}", s);
        return Ok(());
    }
    match style {
        Style::Csv => {
            let svc = SnapshotService::from_config(cfg);
            let snap = svc.snapshot(&Interrupt::new())?;
            let mut out = io::stdout().lock();
            out.write_all(snap.as_bytes())?;
            out.flush()?;
            if snap.is_truncated() {
                log::warn!(
                    "snapshot truncated at {} bytes: {} line(s) dropped",
                    snap.capacity(),
                    snap.dropped()
                );
            }
        }
        Style::Table => {
            let facts = HostFacts::new(cfg).facts();
            let regions = build_catalog(&facts);
            print!("{}", render_table(&regions, facts.word_width));
        }
    }
    Ok(())
}

pub fn cmd_read(cfg: &KsegConfig, offset: u64, len: Option<usize>, verbose: bool) -> Result<()> {
    let svc = SnapshotService::from_config(cfg);
    let chunk = svc.query(offset, len.unwrap_or(cfg.snapshot_capacity), &Interrupt::new())?;
    let mut out = io::stdout().lock();
    out.write_all(&chunk.bytes)?;
    out.flush()?;
    if verbose {
        eprintln!("consumed={}", chunk.consumed);
    }
    Ok(())
}

pub fn cmd_facts(cfg: &KsegConfig, json: bool) -> Result<()> {
    let f = HostFacts::new(cfg).facts();
    if json {
        let s = serde_json::to_string_pretty(&f).context("serialize facts")?;
        println!("{}", s);
        return Ok(());
    }
    println!("release:         {}", if f.release.is_empty() { "?" } else { f.release.as_str() });
    println!("arch_family:     {}", f.arch_family);
    println!("word_width:      {}", f.word_width.bits());
    println!("feature_version: {:#x}", f.feature_version);
    println!("variant_code:    {}", f.variant_code);
    println!("total_memory:    {:#x}", f.total_memory_bytes);
    println!("kasan:           {}", f.caps.kasan);
    println!("highmem:         {}", f.caps.highmem);
    println!("page_offset:     {:#x}", f.layout.page_offset);
    Ok(())
}

pub fn cmd_serve(cfg: &KsegConfig, addr: Option<String>) -> Result<()> {
    let addr = addr.unwrap_or_else(|| cfg.http_addr.clone());
    let svc = Arc::new(SnapshotService::from_config(cfg));
    let ep = Endpoint::start(&addr, svc)?;
    eprintln!("serving on {} (press Enter or close stdin to stop)", addr);

    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
    ep.stop();
    Ok(())
}
