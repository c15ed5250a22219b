//! layout: fixed kernel address constants per (architecture, word width).
//!
//! These are the values the kernel headers carry as VECTORS_BASE, FIXADDR_*,
//! MODULES_*, KASAN_SHADOW_*, VMALLOC_*, PAGE_OFFSET and PKMAP_BASE/LAST_PKMAP.
//! A few of them moved between releases; `Layout::resolve` picks the set that
//! matches the feature version.
//!
//! Boundary conventions (kept as the kernel defines them):
//! - fixmap:   start + size (exclusive)
//! - modules:  MODULES_VADDR .. MODULES_END (end constant used directly)
//! - KASAN:    KASAN_SHADOW_START .. KASAN_SHADOW_END (end constant used directly)
//! - vmalloc:  VMALLOC_START .. VMALLOC_END (end constant used directly)
//! - vectors, lowmem, highmem: computed, exclusive upper bound

use serde::Serialize;

use crate::consts::{kernel_version, PAGE_SIZE};
use crate::facts::{ArchFamily, WordWidth};

/// x86_64 direct map moved from 0xffff880000000000 to 0xffff888000000000 in 4.20.
pub const X86_64_PAGE_OFFSET_MOVE: u32 = kernel_version(4, 20, 0);
/// arm64 flipped its VA layout (linear map at the bottom) in 5.4.
pub const ARM64_FLIPPED_VA: u32 = kernel_version(5, 4, 0);
/// KASAN became available for 32-bit ARM in 5.11.
pub const ARM32_KASAN_SINCE: u32 = kernel_version(5, 11, 0);

/// Half-open span as the kernel header names it (start constant, end constant).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: u64,
    pub end: u64,
}

impl Span {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Layout {
    pub page_size: u64,
    /// PAGE_OFFSET: base of the lowmem (direct-mapped) region.
    pub page_offset: u64,
    /// Upper bound on the lowmem size (32-bit: VMSPLIT-limited). None = unbounded.
    pub lowmem_limit: Option<u64>,
    /// High vector page (ARM 32-bit only).
    pub vectors_base: Option<u64>,
    pub fixaddr_start: u64,
    pub fixaddr_size: u64,
    pub modules: Span,
    pub kasan: Option<Span>,
    pub vmalloc: Span,
    /// PKMAP_BASE for the persistent kmap window (32-bit HIGHMEM).
    pub pkmap_base: Option<u64>,
    /// LAST_PKMAP: number of temporary kernel mappings.
    pub last_pkmap: u64,
}

impl Layout {
    /// Constants for the given platform. Never fails: unknown combinations get
    /// the generic layout for their word width.
    pub fn resolve(arch: ArchFamily, width: WordWidth, feature_version: u32) -> Self {
        match (arch, width) {
            (ArchFamily::X86, WordWidth::W64) => x86_64(feature_version),
            (ArchFamily::X86, WordWidth::W32) => x86_32(),
            (ArchFamily::Arm, WordWidth::W64) => arm64(feature_version),
            (ArchFamily::Arm, WordWidth::W32) => arm32(feature_version),
            (ArchFamily::Other, WordWidth::W64) => generic_64(),
            (ArchFamily::Other, WordWidth::W32) => generic_32(),
        }
    }

    /// Override PAGE_OFFSET (KASLR-randomized direct map base).
    pub fn with_page_offset(mut self, page_offset: u64) -> Self {
        self.page_offset = page_offset;
        self
    }

    pub fn fixmap(&self) -> Span {
        Span::new(
            self.fixaddr_start,
            self.fixaddr_start.saturating_add(self.fixaddr_size),
        )
    }
}

fn x86_64(fv: u32) -> Layout {
    let page_offset = if fv >= X86_64_PAGE_OFFSET_MOVE {
        0xffff_8880_0000_0000
    } else {
        0xffff_8800_0000_0000
    };
    Layout {
        page_size: PAGE_SIZE,
        page_offset,
        lowmem_limit: None,
        vectors_base: None,
        fixaddr_start: 0xffff_ffff_ff57_8000,
        fixaddr_size: 0x0008_7000,
        modules: Span::new(0xffff_ffff_c000_0000, 0xffff_ffff_ff00_0000),
        kasan: Some(Span::new(0xffff_ec00_0000_0000, 0xffff_fc00_0000_0000)),
        vmalloc: Span::new(0xffff_c900_0000_0000, 0xffff_e8ff_ffff_ffff),
        pkmap_base: None,
        last_pkmap: 0,
    }
}

fn x86_32() -> Layout {
    // 3G/1G split, non-PAE: modules share the vmalloc window.
    Layout {
        page_size: PAGE_SIZE,
        page_offset: 0xc000_0000,
        lowmem_limit: Some(0x3800_0000),
        vectors_base: None,
        fixaddr_start: 0xfff1_6000,
        fixaddr_size: 0x000e_9000,
        modules: Span::new(0xf880_0000, 0xff7f_e000),
        kasan: None,
        vmalloc: Span::new(0xf880_0000, 0xff7f_e000),
        pkmap_base: Some(0xff80_0000),
        last_pkmap: 1024,
    }
}

fn arm64(fv: u32) -> Layout {
    // 48-bit VA, 4K pages.
    if fv >= ARM64_FLIPPED_VA {
        Layout {
            page_size: PAGE_SIZE,
            page_offset: 0xffff_0000_0000_0000,
            lowmem_limit: None,
            vectors_base: None,
            fixaddr_start: 0xffff_fdff_fe5f_9000,
            fixaddr_size: 0x0040_7000,
            modules: Span::new(0xffff_8000_0800_0000, 0xffff_8000_1000_0000),
            kasan: Some(Span::new(0xffff_6000_0000_0000, 0xffff_8000_0000_0000)),
            vmalloc: Span::new(0xffff_8000_1000_0000, 0xffff_fdff_bfff_0000),
            pkmap_base: None,
            last_pkmap: 0,
        }
    } else {
        Layout {
            page_size: PAGE_SIZE,
            page_offset: 0xffff_8000_0000_0000,
            lowmem_limit: None,
            vectors_base: None,
            fixaddr_start: 0xffff_7dff_fe5f_9000,
            fixaddr_size: 0x0040_7000,
            modules: Span::new(0xffff_0000_0800_0000, 0xffff_0000_1000_0000),
            kasan: Some(Span::new(0xffff_0000_0000_0000, 0xffff_2000_0000_0000)),
            vmalloc: Span::new(0xffff_0000_1000_0000, 0xffff_7dff_bfff_0000),
            pkmap_base: None,
            last_pkmap: 0,
        }
    }
}

fn arm32(fv: u32) -> Layout {
    // FIXADDR_END is a named constant on ARM (0xfff00000), so size = end - start.
    Layout {
        page_size: PAGE_SIZE,
        page_offset: 0xc000_0000,
        lowmem_limit: Some(0x3000_0000),
        vectors_base: Some(0xffff_0000),
        fixaddr_start: 0xffc0_0000,
        fixaddr_size: 0xfff0_0000 - 0xffc0_0000,
        modules: Span::new(0xbf00_0000, 0xbfe0_0000),
        kasan: if fv >= ARM32_KASAN_SINCE {
            Some(Span::new(0xb6e0_0000, 0xbf00_0000))
        } else {
            None
        },
        vmalloc: Span::new(0xf080_0000, 0xff80_0000),
        pkmap_base: Some(0xbfe0_0000),
        last_pkmap: 512,
    }
}

fn generic_64() -> Layout {
    // riscv64 sv39 shaped
    Layout {
        page_size: PAGE_SIZE,
        page_offset: 0xffff_ffe0_0000_0000,
        lowmem_limit: None,
        vectors_base: None,
        fixaddr_start: 0xffff_ffce_fee0_0000,
        fixaddr_size: 0x0020_0000,
        modules: Span::new(0xffff_ffff_0000_0000, 0xffff_ffff_8000_0000),
        kasan: None,
        vmalloc: Span::new(0xffff_ffd0_0000_0000, 0xffff_ffdf_ffff_ffff),
        pkmap_base: None,
        last_pkmap: 0,
    }
}

fn generic_32() -> Layout {
    Layout {
        page_size: PAGE_SIZE,
        page_offset: 0xc000_0000,
        lowmem_limit: Some(0x3000_0000),
        vectors_base: None,
        fixaddr_start: 0xffc0_0000,
        fixaddr_size: 0x0030_0000,
        modules: Span::new(0xbf00_0000, 0xbfe0_0000),
        kasan: None,
        vmalloc: Span::new(0xf080_0000, 0xff80_0000),
        pkmap_base: Some(0xbfe0_0000),
        last_pkmap: 512,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x86_64_page_offset_moves_at_4_20() {
        let old = Layout::resolve(ArchFamily::X86, WordWidth::W64, kernel_version(4, 19, 255));
        let new = Layout::resolve(ArchFamily::X86, WordWidth::W64, kernel_version(4, 20, 0));
        assert_eq!(old.page_offset, 0xffff_8800_0000_0000);
        assert_eq!(new.page_offset, 0xffff_8880_0000_0000);
    }

    #[test]
    fn arm32_fixmap_ends_at_named_constant() {
        let l = Layout::resolve(ArchFamily::Arm, WordWidth::W32, kernel_version(5, 10, 0));
        assert_eq!(l.fixmap(), Span::new(0xffc0_0000, 0xfff0_0000));
        assert!(l.kasan.is_none());
        let l2 = Layout::resolve(ArchFamily::Arm, WordWidth::W32, ARM32_KASAN_SINCE);
        assert!(l2.kasan.is_some());
    }

    #[test]
    fn all_spans_ordered_and_fit_word() {
        for arch in [ArchFamily::X86, ArchFamily::Arm, ArchFamily::Other] {
            for width in [WordWidth::W32, WordWidth::W64] {
                let l = Layout::resolve(arch, width, kernel_version(6, 1, 0));
                let max = width.max_addr();
                for s in [l.fixmap(), l.modules, l.vmalloc] {
                    assert!(s.start <= s.end, "{arch:?}/{width:?}: {s:?}");
                    assert!(s.end <= max, "{arch:?}/{width:?}: {s:?} exceeds word");
                }
                if let Some(k) = l.kasan {
                    assert!(k.start <= k.end);
                }
            }
        }
    }
}
