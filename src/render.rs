//! render: human-readable table over the same Region list.
//!
//! Presentation only: the CSV snapshot is the contract, this is for people.
//!
//! ```text
//! Some Kernel Details [by decreasing address]
//! +-------------------------------------------------------------+
//! |                           [ . . . ]                         |
//! |fixmap region:       0xffffffffff578000 - 0xffffffffff5ff000 | [        0 MB]
//! ```

use std::fmt::Write as _;

use crate::catalog::Region;
use crate::consts::{REGION_FIXMAP, REGION_LOWMEM};
use crate::facts::WordWidth;

const HEADER: &str = "Some Kernel Details [by decreasing address]\n\
+-------------------------------------------------------------+\n";
const ELLIPSIS: &str = "|                           [ . . . ]                         |\n";
const LOWMEM_NOTE_32: &str = "|             (above:PAGE_OFFSET - highmem)                   |\n";
const LOWMEM_NOTE_64: &str = "|                  (above:PAGE_OFFSET    -      highmem)      |\n";

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// "[   4 KB]", "[  12 MB]", "[ 2047 MB =  1 GB]" with the decimal field
/// width of the word size (7 on 32-bit, 9 on 64-bit).
pub fn human_size(bytes: u64, width: WordWidth) -> String {
    let w = match width {
        WordWidth::W32 => 7,
        WordWidth::W64 => 9,
    };
    if bytes < MB {
        format!("[{:>w$} KB]", bytes / KB, w = w)
    } else if bytes < GB {
        format!("[{:>w$} MB]", bytes / MB, w = w)
    } else {
        format!("[{:>w$} MB = {:>w$} GB]", bytes / MB, bytes / GB, w = w)
    }
}

pub fn render_table(regions: &[Region], width: WordWidth) -> String {
    let nib = width.nibbles();
    let mut out = String::from(HEADER);
    for r in regions {
        if r.name == REGION_FIXMAP {
            out.push_str(ELLIPSIS);
        }
        let label = format!("{}:", r.name);
        let _ = writeln!(
            out,
            "|{:<20} 0x{:0nib$x} - 0x{:0nib$x} | {}",
            label,
            r.start,
            r.end,
            human_size(r.size(), width),
            nib = nib
        );
        if r.name == REGION_LOWMEM {
            out.push_str(match width {
                WordWidth::W32 => LOWMEM_NOTE_32,
                WordWidth::W64 => LOWMEM_NOTE_64,
            });
        }
    }
    out.push_str(ELLIPSIS);
    out
}
