//! facts/memory: total RAM size via a strategy table keyed by feature version.
//!
//! Newest accessor first; the first entry whose `since` is <= feature_version
//! is selected. If the selected accessor is not available on the architecture,
//! or the host cannot answer, the size is 0 (lowmem degenerates to start == end).

use std::path::Path;

use log::{debug, warn};

use super::probe::HostProbe;
use super::ArchFamily;
use crate::consts::{kernel_version, MEMINFO_PATH, MEMORY_BLOCKS_DIR};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryAccessor {
    /// MemTotal from /proc/meminfo (totalram_pages() era).
    TotalRamPages,
    /// Online sysfs memory blocks x block_size_bytes.
    MemoryBlocks,
}

struct MemoryStrategy {
    since: u32,
    accessor: MemoryAccessor,
}

static MEMORY_STRATEGIES: &[MemoryStrategy] = &[
    MemoryStrategy {
        since: kernel_version(5, 0, 0),
        accessor: MemoryAccessor::TotalRamPages,
    },
    MemoryStrategy {
        since: 0,
        accessor: MemoryAccessor::MemoryBlocks,
    },
];

impl MemoryAccessor {
    pub fn available_on(self, arch: ArchFamily) -> bool {
        match self {
            MemoryAccessor::TotalRamPages => true,
            MemoryAccessor::MemoryBlocks => matches!(arch, ArchFamily::X86 | ArchFamily::Arm),
        }
    }

    fn read(self, probe: &dyn HostProbe) -> Option<u64> {
        match self {
            MemoryAccessor::TotalRamPages => {
                let text = probe.read_text(Path::new(MEMINFO_PATH))?;
                parse_meminfo_total(&text)
            }
            MemoryAccessor::MemoryBlocks => read_memory_blocks(probe),
        }
    }
}

/// Accessor for this feature version / arch, or None when nothing applies.
pub fn select_accessor(feature_version: u32, arch: ArchFamily) -> Option<MemoryAccessor> {
    MEMORY_STRATEGIES
        .iter()
        .find(|s| feature_version >= s.since)
        .map(|s| s.accessor)
        .filter(|a| a.available_on(arch))
}

pub fn total_memory_bytes(feature_version: u32, arch: ArchFamily, probe: &dyn HostProbe) -> u64 {
    let Some(acc) = select_accessor(feature_version, arch) else {
        warn!(
            "total memory: no accessor for arch={:?} feature_version={:#x}, using 0",
            arch, feature_version
        );
        return 0;
    };
    match acc.read(probe) {
        Some(n) => {
            debug!("total memory: {:?} -> {:#x}", acc, n);
            n
        }
        None => {
            warn!("total memory: {:?} unavailable on this host, using 0", acc);
            0
        }
    }
}

/// "MemTotal:   16314164 kB" -> bytes.
pub fn parse_meminfo_total(text: &str) -> Option<u64> {
    let line = text.lines().find(|l| l.starts_with("MemTotal:"))?;
    let mut it = line["MemTotal:".len()..].split_whitespace();
    let n: u64 = it.next()?.parse().ok()?;
    let mult = match it.next() {
        Some("kB") | Some("KB") | Some("kb") => 1024,
        Some("mB") | Some("MB") => 1024 * 1024,
        None => 1,
        Some(_) => return None,
    };
    n.checked_mul(mult)
}

fn read_memory_blocks(probe: &dyn HostProbe) -> Option<u64> {
    let dir = Path::new(MEMORY_BLOCKS_DIR);
    let bs_text = probe.read_text(&dir.join("block_size_bytes"))?;
    let block_size = u64::from_str_radix(bs_text.trim().trim_start_matches("0x"), 16).ok()?;

    let mut online = 0u64;
    for name in probe.list_dir(dir)? {
        if !name.starts_with("memory") || name["memory".len()..].parse::<u64>().is_err() {
            continue;
        }
        let st = probe
            .read_text(&dir.join(&name).join("online"))
            .unwrap_or_default();
        if st.trim() == "1" {
            online += 1;
        }
    }
    if online == 0 {
        return None;
    }
    online.checked_mul(block_size)
}
