//! facts/host: detect Platform Facts from the running host.
//!
//! Re-detected on every call (cheap: a handful of small /proc reads).
//! Config overrides win over detection; detection failures degrade.

use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use super::memory::total_memory_bytes;
use super::probe::{kconfig_enabled, FsProbe, HostProbe};
use super::{
    parse_feature_version, resolve_variant, ArchFamily, Capabilities, FactsSource, PlatformFacts,
    WordWidth,
};
use crate::config::KsegConfig;
use crate::consts::{BOOT_CONFIG_PREFIX, OSRELEASE_PATH, PROC_CONFIG_GZ};
use crate::layout::Layout;

/// Detection overrides (subset of KsegConfig).
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub arch: Option<ArchFamily>,
    pub word_width: Option<WordWidth>,
    pub release: Option<String>,
    pub kasan: Option<bool>,
    pub highmem: Option<bool>,
    pub page_offset: Option<u64>,
}

impl From<&KsegConfig> for Overrides {
    fn from(cfg: &KsegConfig) -> Self {
        Self {
            arch: cfg.arch,
            word_width: cfg.word_width,
            release: cfg.release.clone(),
            kasan: cfg.kasan,
            highmem: cfg.highmem,
            page_offset: cfg.page_offset,
        }
    }
}

pub struct HostFacts {
    overrides: Overrides,
    probe: Arc<dyn HostProbe>,
}

impl HostFacts {
    pub fn new(cfg: &KsegConfig) -> Self {
        Self::with_probe(Overrides::from(cfg), Arc::new(FsProbe))
    }

    pub fn with_probe(overrides: Overrides, probe: Arc<dyn HostProbe>) -> Self {
        Self { overrides, probe }
    }

    fn release(&self) -> String {
        if let Some(r) = &self.overrides.release {
            return r.clone();
        }
        match self.probe.read_text(Path::new(OSRELEASE_PATH)) {
            Some(s) => s.trim().to_string(),
            None => {
                warn!("cannot read {}, feature version unknown", OSRELEASE_PATH);
                String::new()
            }
        }
    }

    /// Kernel .config text: /proc/config.gz, else /boot/config-<release>.
    fn kernel_config(&self, release: &str) -> Option<String> {
        if let Some(t) = self.probe.read_gz_text(Path::new(PROC_CONFIG_GZ)) {
            return Some(t);
        }
        if release.is_empty() {
            return None;
        }
        let p = format!("{}{}", BOOT_CONFIG_PREFIX, release);
        self.probe.read_text(Path::new(&p))
    }

    fn capabilities(&self, release: &str) -> Capabilities {
        let need_probe = self.overrides.kasan.is_none() || self.overrides.highmem.is_none();
        let cfg_text = if need_probe {
            let t = self.kernel_config(release);
            if t.is_none() {
                debug!("kernel config not available, optional regions assumed absent");
            }
            t
        } else {
            None
        };
        let probed = |sym: &str| {
            cfg_text
                .as_deref()
                .map(|t| kconfig_enabled(t, sym))
                .unwrap_or(false)
        };
        Capabilities {
            kasan: self.overrides.kasan.unwrap_or_else(|| probed("CONFIG_KASAN")),
            highmem: self.overrides.highmem.unwrap_or_else(|| probed("CONFIG_HIGHMEM")),
        }
    }

    pub fn detect(&self) -> PlatformFacts {
        let arch = self.overrides.arch.unwrap_or_else(ArchFamily::host);
        let width = self.overrides.word_width.unwrap_or_else(WordWidth::host);
        let release = self.release();
        let fv = parse_feature_version(&release);

        let mut layout = Layout::resolve(arch, width, fv);
        if let Some(po) = self.overrides.page_offset {
            layout = layout.with_page_offset(po);
        }

        let facts = PlatformFacts {
            word_width: width,
            arch_family: arch,
            feature_version: fv,
            variant_code: resolve_variant(&release),
            total_memory_bytes: total_memory_bytes(fv, arch, self.probe.as_ref()),
            caps: self.capabilities(&release),
            layout,
            release,
        };
        debug!(
            "facts: arch={} width={} fv={:#x} variant={} ram={:#x} kasan={} highmem={}",
            facts.arch_family,
            facts.word_width.bits(),
            facts.feature_version,
            facts.variant_code,
            facts.total_memory_bytes,
            facts.caps.kasan,
            facts.caps.highmem
        );
        facts
    }
}

impl FactsSource for HostFacts {
    fn facts(&self) -> PlatformFacts {
        self.detect()
    }
}
