//! catalog: Region Catalog Builder.
//!
//! Facts -> ordered list of regions. Each region comes from one rule:
//! (name, mode, gate predicate, span deriver). The rule order is a static
//! sequence per word width approximating "descending start address":
//! on 64-bit the module area sits high and is emitted early, on 32-bit it
//! sits below PAGE_OFFSET and is emitted last. The builder never sorts.
//!
//! Span conventions per region:
//! - vector table:   [VECTORS_BASE, VECTORS_BASE + PAGE_SIZE)
//! - fixmap region:  [FIXADDR_START, FIXADDR_START + FIXADDR_SIZE)
//! - module region:  MODULES_VADDR .. MODULES_END (header end constant)
//! - KASAN shadow:   KASAN_SHADOW_START .. KASAN_SHADOW_END (header end constant)
//! - vmalloc region: VMALLOC_START .. VMALLOC_END (header end pointer)
//! - lowmem region:  [PAGE_OFFSET, PAGE_OFFSET + RAM)  (RAM capped by lowmem_limit)
//! - HIGHMEM region: [PKMAP_BASE, PKMAP_BASE + LAST_PKMAP * PAGE_SIZE)

use std::fmt;

use serde::{Serialize, Serializer};

use crate::consts::{
    kernel_version, REGION_FIXMAP, REGION_HIGHMEM, REGION_KASAN, REGION_LOWMEM, REGION_MODULES,
    REGION_VECTORS, REGION_VMALLOC,
};
use crate::facts::{ArchFamily, PlatformFacts, WordWidth};

/// ARM high vector page is reported from this release on.
pub const VECTORS_MIN_VERSION: u32 = kernel_version(3, 0, 0);

/// Access mode: rendered as exactly three chars, `{r,-}{w,-}{x,-}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Mode {
    pub read: bool,
    pub write: bool,
    pub exec: bool,
}

impl Mode {
    pub const RO: Mode = Mode {
        read: true,
        write: false,
        exec: false,
    };
    pub const RW: Mode = Mode {
        read: true,
        write: true,
        exec: false,
    };
    pub const RWX: Mode = Mode {
        read: true,
        write: true,
        exec: true,
    };

    pub fn as_bytes(self) -> [u8; 3] {
        [
            if self.read { b'r' } else { b'-' },
            if self.write { b'w' } else { b'-' },
            if self.exec { b'x' } else { b'-' },
        ]
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.as_bytes();
        // as_bytes() отдаёт только ASCII
        f.write_str(std::str::from_utf8(&b).unwrap_or("---"))
    }
}

impl Serialize for Mode {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// One named kernel address range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Region {
    pub name: &'static str,
    pub start: u64,
    pub end: u64,
    pub mode: Mode,
}

impl Region {
    #[inline]
    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Inclusion rule: `applies` gates the region, `span` derives (start, end).
pub struct Rule {
    pub name: &'static str,
    pub mode: Mode,
    pub applies: fn(&PlatformFacts) -> bool,
    pub span: fn(&PlatformFacts) -> (u64, u64),
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .finish()
    }
}

// -------------------- rules --------------------

const VECTORS: Rule = Rule {
    name: REGION_VECTORS,
    mode: Mode::RO,
    applies: |f| {
        f.arch_family == ArchFamily::Arm
            && f.feature_version >= VECTORS_MIN_VERSION
            && f.layout.vectors_base.is_some()
    },
    span: |f| {
        let base = f.layout.vectors_base.unwrap_or(0);
        (base, base.saturating_add(f.layout.page_size))
    },
};

const FIXMAP: Rule = Rule {
    name: REGION_FIXMAP,
    mode: Mode::RO,
    applies: |_| true,
    span: |f| {
        let s = f.layout.fixmap();
        (s.start, s.end)
    },
};

const MODULES: Rule = Rule {
    name: REGION_MODULES,
    mode: Mode::RWX,
    applies: |_| true,
    span: |f| (f.layout.modules.start, f.layout.modules.end),
};

const KASAN: Rule = Rule {
    name: REGION_KASAN,
    mode: Mode::RW,
    applies: |f| f.caps.kasan && f.layout.kasan.is_some(),
    span: |f| f.layout.kasan.map(|s| (s.start, s.end)).unwrap_or((0, 0)),
};

const VMALLOC: Rule = Rule {
    name: REGION_VMALLOC,
    mode: Mode::RW,
    applies: |_| true,
    span: |f| (f.layout.vmalloc.start, f.layout.vmalloc.end),
};

const LOWMEM: Rule = Rule {
    name: REGION_LOWMEM,
    mode: Mode::RWX,
    applies: |_| true,
    span: |f| {
        let start = f.layout.page_offset;
        let ram = match f.layout.lowmem_limit {
            Some(lim) => f.total_memory_bytes.min(lim),
            None => f.total_memory_bytes,
        };
        (start, start.saturating_add(ram))
    },
};

const HIGHMEM: Rule = Rule {
    name: REGION_HIGHMEM,
    mode: Mode::RWX,
    applies: |f| {
        f.word_width == WordWidth::W32 && f.caps.highmem && f.layout.pkmap_base.is_some()
    },
    span: |f| {
        let base = f.layout.pkmap_base.unwrap_or(0);
        let len = f.layout.last_pkmap.saturating_mul(f.layout.page_size);
        (base, base.saturating_add(len))
    },
};

static RULES_64: [Rule; 6] = [VECTORS, FIXMAP, MODULES, KASAN, VMALLOC, LOWMEM];
static RULES_32: [Rule; 7] = [VECTORS, FIXMAP, KASAN, VMALLOC, LOWMEM, HIGHMEM, MODULES];

/// Static rule sequence for a word width.
pub fn rules_for(width: WordWidth) -> &'static [Rule] {
    match width {
        WordWidth::W64 => &RULES_64,
        WordWidth::W32 => &RULES_32,
    }
}

/// Build the ordered region list. Never fails; every region satisfies
/// start <= end <= word max (a malformed span collapses to zero length).
pub fn build_catalog(facts: &PlatformFacts) -> Vec<Region> {
    let max = facts.word_width.max_addr();
    let rules = rules_for(facts.word_width);
    let mut out = Vec::with_capacity(rules.len());
    for rule in rules {
        if !(rule.applies)(facts) {
            continue;
        }
        let (start, end) = (rule.span)(facts);
        let start = start.min(max);
        let end = end.min(max).max(start);
        out.push(Region {
            name: rule.name,
            start,
            end,
            mode: rule.mode,
        });
    }
    out
}
