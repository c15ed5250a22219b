//! Общие константы: ABI-имена регионов, размеры, ENV-ключи.

// -------- Pages --------
pub const PAGE_SIZE: u64 = 4096;

// -------- Snapshot buffer --------
/// Default capacity of one serialized snapshot (bytes).
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 2048;

// -------- Region names (ABI) --------
// Внешний скрипт матчит строки по имени: не переименовывать без миграции потребителя.
pub const REGION_VECTORS: &str = "vector table";
pub const REGION_FIXMAP: &str = "fixmap region";
pub const REGION_MODULES: &str = "module region";
pub const REGION_KASAN: &str = "KASAN shadow";
pub const REGION_VMALLOC: &str = "vmalloc region";
pub const REGION_LOWMEM: &str = "lowmem region";
pub const REGION_HIGHMEM: &str = "HIGHMEM region";

// -------- Diagnostic trailer keys --------
pub const DIAG_PAGE_SIZE: &str = "PAGE_SIZE";
pub const DIAG_TOTAL_RAM: &str = "TOTAL_RAM";
pub const DIAG_FEATURE_VERSION: &str = "FEATURE_VERSION";
pub const DIAG_VARIANT: &str = "VARIANT";

// -------- Host paths --------
pub const OSRELEASE_PATH: &str = "/proc/sys/kernel/osrelease";
pub const MEMINFO_PATH: &str = "/proc/meminfo";
pub const MEMORY_BLOCKS_DIR: &str = "/sys/devices/system/memory";
pub const PROC_CONFIG_GZ: &str = "/proc/config.gz";
pub const BOOT_CONFIG_PREFIX: &str = "/boot/config-";

// -------- ENV --------
pub const ENV_SNAPSHOT_CAPACITY: &str = "KSEG_SNAPSHOT_CAPACITY";
pub const ENV_STYLE: &str = "KSEG_STYLE";
pub const ENV_ARCH: &str = "KSEG_ARCH";
pub const ENV_WORD_WIDTH: &str = "KSEG_WORD_WIDTH";
pub const ENV_RELEASE: &str = "KSEG_RELEASE";
pub const ENV_KASAN: &str = "KSEG_KASAN";
pub const ENV_HIGHMEM: &str = "KSEG_HIGHMEM";
pub const ENV_PAGE_OFFSET: &str = "KSEG_PAGE_OFFSET";
pub const ENV_DIAGNOSTICS: &str = "KSEG_DIAGNOSTICS";
pub const ENV_HTTP_ADDR: &str = "KSEG_HTTP_ADDR";

pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:9899";

/// Encode `major.minor.patch` the way the kernel's KERNEL_VERSION() does.
/// Patch saturates at 255.
#[inline]
pub const fn kernel_version(major: u32, minor: u32, patch: u32) -> u32 {
    let p = if patch > 255 { 255 } else { patch };
    (major << 16) + (minor << 8) + p
}
