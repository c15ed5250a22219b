//! Centralized configuration for KsegMap.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - KsegConfig::from_env() reads KSEG_* env vars; fluent with_* setters override.
//! - Detection overrides (arch, word width, release, capability flags, PAGE_OFFSET)
//!   are None by default: None means "detect on the host".
//!
//! Defaults:
//! - snapshot_capacity = 2048 bytes
//! - style = csv (the machine format; `table` is the human-readable view)
//! - diagnostics = on (trailer key/value lines after the regions)

use std::fmt;
use std::str::FromStr;

use crate::consts::{
    DEFAULT_HTTP_ADDR, DEFAULT_SNAPSHOT_CAPACITY, ENV_ARCH, ENV_DIAGNOSTICS, ENV_HIGHMEM,
    ENV_HTTP_ADDR, ENV_KASAN, ENV_PAGE_OFFSET, ENV_RELEASE, ENV_SNAPSHOT_CAPACITY, ENV_STYLE,
    ENV_WORD_WIDTH,
};
use crate::facts::{ArchFamily, WordWidth};

/// Presentation switch (module parameter `show_procmap_style` in the kernel version).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    Csv,
    Table,
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "1" | "procmap" => Ok(Style::Csv),
            "table" | "0" | "human" => Ok(Style::Table),
            other => Err(format!("unknown style '{}' (expected csv|table)", other)),
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Style::Csv => f.write_str("csv"),
            Style::Table => f.write_str("table"),
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug)]
pub struct KsegConfig {
    /// Snapshot buffer capacity in bytes.
    /// Env: KSEG_SNAPSHOT_CAPACITY (default 2048)
    pub snapshot_capacity: usize,

    /// Env: KSEG_STYLE = csv|table (default csv)
    pub style: Style,

    /// Emit diagnostic trailer lines (PAGE_SIZE, TOTAL_RAM, ...).
    /// Env: KSEG_DIAGNOSTICS (default true; "0|false|off|no" => false)
    pub diagnostics: bool,

    // ---------- detection overrides ----------
    /// Env: KSEG_ARCH = x86|arm|other
    pub arch: Option<ArchFamily>,

    /// Env: KSEG_WORD_WIDTH = 32|64
    pub word_width: Option<WordWidth>,

    /// Env: KSEG_RELEASE (otherwise /proc/sys/kernel/osrelease)
    pub release: Option<String>,

    /// Env: KSEG_KASAN = 0|1 (otherwise kernel config)
    pub kasan: Option<bool>,

    /// Env: KSEG_HIGHMEM = 0|1 (otherwise kernel config)
    pub highmem: Option<bool>,

    /// Env: KSEG_PAGE_OFFSET = hex (KASLR direct-map base)
    pub page_offset: Option<u64>,

    // ---------- exposure ----------
    /// Env: KSEG_HTTP_ADDR (default 127.0.0.1:9899)
    pub http_addr: String,
}

impl Default for KsegConfig {
    fn default() -> Self {
        Self {
            snapshot_capacity: DEFAULT_SNAPSHOT_CAPACITY,
            style: Style::Csv,
            diagnostics: true,

            arch: None,
            word_width: None,
            release: None,
            kasan: None,
            highmem: None,
            page_offset: None,

            http_addr: DEFAULT_HTTP_ADDR.to_string(),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// "0xffff888000000000" / "ffff888000000000" -> u64.
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let t = s.trim();
    let t = t
        .strip_prefix("0x")
        .or_else(|| t.strip_prefix("0X"))
        .unwrap_or(t);
    let t: String = t.chars().filter(|c| *c != '_').collect();
    u64::from_str_radix(&t, 16).ok()
}

impl KsegConfig {
    /// Load configuration from environment variables. Malformed values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var(ENV_SNAPSHOT_CAPACITY) {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.snapshot_capacity = n;
            }
        }

        if let Ok(v) = std::env::var(ENV_STYLE) {
            if let Ok(s) = v.parse::<Style>() {
                cfg.style = s;
            }
        }

        if let Ok(v) = std::env::var(ENV_DIAGNOSTICS) {
            if let Some(b) = parse_bool(&v) {
                cfg.diagnostics = b;
            }
        }

        // ----- detection overrides -----
        if let Ok(v) = std::env::var(ENV_ARCH) {
            if let Ok(a) = v.parse::<ArchFamily>() {
                cfg.arch = Some(a);
            }
        }

        if let Ok(v) = std::env::var(ENV_WORD_WIDTH) {
            cfg.word_width = v.trim().parse::<u32>().ok().and_then(WordWidth::from_bits);
        }

        if let Ok(v) = std::env::var(ENV_RELEASE) {
            let s = v.trim();
            if !s.is_empty() {
                cfg.release = Some(s.to_string());
            }
        }

        if let Ok(v) = std::env::var(ENV_KASAN) {
            cfg.kasan = parse_bool(&v);
        }
        if let Ok(v) = std::env::var(ENV_HIGHMEM) {
            cfg.highmem = parse_bool(&v);
        }

        if let Ok(v) = std::env::var(ENV_PAGE_OFFSET) {
            cfg.page_offset = parse_hex_u64(&v);
        }

        if let Ok(v) = std::env::var(ENV_HTTP_ADDR) {
            let s = v.trim();
            if !s.is_empty() {
                cfg.http_addr = s.to_string();
            }
        }

        cfg
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_snapshot_capacity(mut self, bytes: usize) -> Self {
        self.snapshot_capacity = bytes;
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_diagnostics(mut self, on: bool) -> Self {
        self.diagnostics = on;
        self
    }

    pub fn with_arch(mut self, arch: Option<ArchFamily>) -> Self {
        self.arch = arch;
        self
    }

    pub fn with_word_width(mut self, width: Option<WordWidth>) -> Self {
        self.word_width = width;
        self
    }

    pub fn with_release<S: Into<String>>(mut self, release: Option<S>) -> Self {
        self.release = release.map(Into::into);
        self
    }

    pub fn with_kasan(mut self, on: Option<bool>) -> Self {
        self.kasan = on;
        self
    }

    pub fn with_highmem(mut self, on: Option<bool>) -> Self {
        self.highmem = on;
        self
    }

    pub fn with_page_offset(mut self, page_offset: Option<u64>) -> Self {
        self.page_offset = page_offset;
        self
    }

    pub fn with_http_addr<S: Into<String>>(mut self, addr: S) -> Self {
        self.http_addr = addr.into();
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> Self {
        self
    }
}

impl fmt::Display for KsegConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt_bool = |v: Option<bool>| match v {
            Some(b) => b.to_string(),
            None => "detect".to_string(),
        };
        write!(
            f,
            "KsegConfig {{ \
             snapshot_capacity: {}, \
             style: {}, \
             diagnostics: {}, \
             arch: {}, \
             word_width: {}, \
             release: {}, \
             kasan: {}, \
             highmem: {}, \
             page_offset: {}, \
             http_addr: {} \
             }}",
            self.snapshot_capacity,
            self.style,
            self.diagnostics,
            self.arch
                .map(|a| a.to_string())
                .unwrap_or_else(|| "detect".to_string()),
            self.word_width
                .map(|w| w.bits().to_string())
                .unwrap_or_else(|| "detect".to_string()),
            self.release.as_deref().unwrap_or("detect"),
            opt_bool(self.kasan),
            opt_bool(self.highmem),
            self.page_offset
                .map(|p| format!("{:#x}", p))
                .unwrap_or_else(|| "layout".to_string()),
            self.http_addr,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex_u64("0xffff888000000000"), Some(0xffff_8880_0000_0000));
        assert_eq!(parse_hex_u64("C000_0000"), Some(0xc000_0000));
        assert_eq!(parse_hex_u64("zz"), None);
    }

    #[test]
    fn builder_overrides() {
        let cfg = KsegConfig::default()
            .with_snapshot_capacity(512)
            .with_style(Style::Table)
            .with_arch(Some(ArchFamily::Arm))
            .with_word_width(Some(WordWidth::W32))
            .with_release(Some("5.10.0"))
            .build();
        assert_eq!(cfg.snapshot_capacity, 512);
        assert_eq!(cfg.style, Style::Table);
        let s = cfg.to_string();
        assert!(s.contains("arch: arm"));
        assert!(s.contains("word_width: 32"));
        assert!(s.contains("kasan: detect"));
    }

    #[test]
    fn style_parse() {
        assert_eq!("TABLE".parse::<Style>(), Ok(Style::Table));
        assert_eq!("1".parse::<Style>(), Ok(Style::Csv));
        assert!("xml".parse::<Style>().is_err());
    }
}
