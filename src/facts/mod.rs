//! facts: Platform Facts: everything region resolution depends on.
//!
//! Submodules:
//! - variant: release string -> distribution variant code
//! - memory:  total RAM accessor strategies
//! - probe:   host file access (trait, real fs impl)
//! - host:    HostFacts (fresh detection per query) + config overrides
//!
//! Detection never fails: unknown values degrade to 0 / false / generic.

pub mod host;
pub mod memory;
pub mod probe;
pub mod variant;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::layout::Layout;

pub use host::HostFacts;
pub use probe::{FsProbe, HostProbe};
pub use variant::resolve_variant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchFamily {
    X86,
    Arm,
    Other,
}

impl ArchFamily {
    /// Architecture this binary was built for.
    pub fn host() -> Self {
        if cfg!(any(target_arch = "x86", target_arch = "x86_64")) {
            ArchFamily::X86
        } else if cfg!(any(target_arch = "arm", target_arch = "aarch64")) {
            ArchFamily::Arm
        } else {
            ArchFamily::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArchFamily::X86 => "x86",
            ArchFamily::Arm => "arm",
            ArchFamily::Other => "other",
        }
    }
}

impl FromStr for ArchFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x86" | "x86_64" | "i386" | "i686" | "amd64" => Ok(ArchFamily::X86),
            "arm" | "arm64" | "aarch64" | "armv7" | "armv7l" => Ok(ArchFamily::Arm),
            "other" => Ok(ArchFamily::Other),
            other => Err(format!("unknown arch family '{}'", other)),
        }
    }
}

impl fmt::Display for ArchFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WordWidth {
    W32,
    W64,
}

impl WordWidth {
    pub fn host() -> Self {
        if cfg!(target_pointer_width = "64") {
            WordWidth::W64
        } else {
            WordWidth::W32
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(WordWidth::W32),
            64 => Some(WordWidth::W64),
            _ => None,
        }
    }

    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            WordWidth::W32 => 32,
            WordWidth::W64 => 64,
        }
    }

    /// Hex digits needed for one address.
    #[inline]
    pub fn nibbles(self) -> usize {
        (self.bits() / 4) as usize
    }

    #[inline]
    pub fn max_addr(self) -> u64 {
        match self {
            WordWidth::W32 => u32::MAX as u64,
            WordWidth::W64 => u64::MAX,
        }
    }
}

impl Serialize for WordWidth {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u32(self.bits())
    }
}

/// Optional kernel features that add regions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// CONFIG_KASAN: sanitizer shadow region present.
    pub kasan: bool,
    /// CONFIG_HIGHMEM: persistent kmap window present (32-bit).
    pub highmem: bool,
}

/// Immutable snapshot of the environment for one query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlatformFacts {
    pub word_width: WordWidth,
    pub arch_family: ArchFamily,
    /// KERNEL_VERSION(major, minor, patch) of the running kernel; 0 if unknown.
    pub feature_version: u32,
    /// Distribution variant (see `resolve_variant`); 0 = generic/unknown.
    pub variant_code: u32,
    pub total_memory_bytes: u64,
    pub caps: Capabilities,
    pub layout: Layout,
    pub release: String,
}

impl PlatformFacts {
    /// Facts with the layout for (arch, width, feature_version); no RAM, no optional features.
    pub fn new(arch_family: ArchFamily, word_width: WordWidth, feature_version: u32) -> Self {
        Self {
            word_width,
            arch_family,
            feature_version,
            variant_code: 0,
            total_memory_bytes: 0,
            caps: Capabilities::default(),
            layout: Layout::resolve(arch_family, word_width, feature_version),
            release: String::new(),
        }
    }

    /// Derive feature_version, variant and layout from a release string.
    pub fn from_release(arch_family: ArchFamily, word_width: WordWidth, release: &str) -> Self {
        let fv = parse_feature_version(release);
        let mut f = Self::new(arch_family, word_width, fv);
        f.variant_code = resolve_variant(release);
        f.release = release.to_string();
        f
    }

    pub fn with_total_memory(mut self, bytes: u64) -> Self {
        self.total_memory_bytes = bytes;
        self
    }

    pub fn with_caps(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }
}

/// "5.15.0-91-generic" -> KERNEL_VERSION(5, 15, 0). Anything unparseable -> 0.
pub fn parse_feature_version(release: &str) -> u32 {
    let head = release
        .trim()
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .next()
        .unwrap_or("");
    let mut parts = head.split('.').filter(|s| !s.is_empty()).map(|s| s.parse::<u32>());
    let major = match parts.next() {
        Some(Ok(v)) if v <= 255 => v,
        _ => return 0,
    };
    let minor = match parts.next() {
        Some(Ok(v)) if v <= 255 => v,
        _ => 0,
    };
    let patch = match parts.next() {
        Some(Ok(v)) => v,
        _ => 0,
    };
    crate::consts::kernel_version(major, minor, patch)
}

/// Where the query service gets its facts from. Called once per query.
pub trait FactsSource: Send + Sync {
    fn facts(&self) -> PlatformFacts;
}

/// Fixed facts (tests, replay of a captured platform).
#[derive(Clone, Debug)]
pub struct StaticFacts(pub PlatformFacts);

impl FactsSource for StaticFacts {
    fn facts(&self) -> PlatformFacts {
        self.0.clone()
    }
}
