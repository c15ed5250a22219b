// tests/catalog_matrix.rs
//
// Каталог регионов по всей матрице (arch x word width x feature version):
// - fixmap / vmalloc / lowmem присутствуют всегда, start <= end;
// - имена уникальны;
// - порядок статический (module region рано на 64-bit, последним на 32-bit);
// - end-to-end строка lowmem для x86_64 с заданным PAGE_OFFSET.
//
// Запуск:
//   cargo test --test catalog_matrix -- --nocapture

use std::collections::HashSet;

use anyhow::Result;
use oorandom::Rand64;

use KsegMap::consts::{
    kernel_version, REGION_FIXMAP, REGION_HIGHMEM, REGION_KASAN, REGION_LOWMEM, REGION_MODULES,
    REGION_VECTORS, REGION_VMALLOC,
};
use KsegMap::serialize::serialize_with_trailer;
use KsegMap::{build_catalog, serialize, ArchFamily, Capabilities, Layout, PlatformFacts, WordWidth};

const ARCHES: [ArchFamily; 3] = [ArchFamily::X86, ArchFamily::Arm, ArchFamily::Other];
const WIDTHS: [WordWidth; 2] = [WordWidth::W32, WordWidth::W64];

fn versions() -> Vec<u32> {
    vec![
        0,
        kernel_version(2, 6, 32),
        kernel_version(3, 10, 0),
        kernel_version(4, 19, 0),
        kernel_version(4, 20, 0),
        kernel_version(5, 4, 0),
        kernel_version(5, 11, 0),
        kernel_version(6, 8, 0),
    ]
}

#[test]
fn every_platform_has_core_regions() -> Result<()> {
    for arch in ARCHES {
        for width in WIDTHS {
            for fv in versions() {
                for caps in [
                    Capabilities::default(),
                    Capabilities { kasan: true, highmem: true },
                ] {
                    let f = PlatformFacts::new(arch, width, fv)
                        .with_total_memory(0x4000_0000)
                        .with_caps(caps);
                    let cat = build_catalog(&f);
                    assert!(!cat.is_empty());

                    let names: Vec<&str> = cat.iter().map(|r| r.name).collect();
                    for must in [REGION_FIXMAP, REGION_VMALLOC, REGION_LOWMEM, REGION_MODULES] {
                        assert!(
                            names.contains(&must),
                            "{arch:?}/{width:?}/fv={fv:#x}: missing {must}"
                        );
                    }
                    let uniq: HashSet<&str> = names.iter().copied().collect();
                    assert_eq!(uniq.len(), names.len(), "duplicate names: {names:?}");

                    for r in &cat {
                        assert!(r.start <= r.end, "{}: {:#x} > {:#x}", r.name, r.start, r.end);
                        assert!(r.end <= width.max_addr(), "{} exceeds word", r.name);
                    }
                }
            }
        }
    }
    Ok(())
}

#[test]
fn module_region_position_depends_on_word_width() -> Result<()> {
    let caps = Capabilities { kasan: true, highmem: true };
    for arch in ARCHES {
        let f64 = PlatformFacts::new(arch, WordWidth::W64, kernel_version(6, 1, 0)).with_caps(caps);
        let cat = build_catalog(&f64);
        let pos = cat.iter().position(|r| r.name == REGION_MODULES).unwrap();
        let vm = cat.iter().position(|r| r.name == REGION_VMALLOC).unwrap();
        assert!(pos < vm, "{arch:?}/64: module region must precede vmalloc");

        let f32 = PlatformFacts::new(arch, WordWidth::W32, kernel_version(6, 1, 0)).with_caps(caps);
        let cat = build_catalog(&f32);
        assert_eq!(cat.last().map(|r| r.name), Some(REGION_MODULES), "{arch:?}/32");
    }
    Ok(())
}

#[test]
fn optional_regions_follow_capabilities() -> Result<()> {
    let fv = kernel_version(6, 1, 0);
    let plain = build_catalog(&PlatformFacts::new(ArchFamily::Arm, WordWidth::W32, fv));
    let names: Vec<&str> = plain.iter().map(|r| r.name).collect();
    assert!(!names.contains(&REGION_KASAN));
    assert!(!names.contains(&REGION_HIGHMEM));
    assert!(names.contains(&REGION_VECTORS));

    let full = build_catalog(
        &PlatformFacts::new(ArchFamily::Arm, WordWidth::W32, fv)
            .with_caps(Capabilities { kasan: true, highmem: true }),
    );
    let names: Vec<&str> = full.iter().map(|r| r.name).collect();
    assert!(names.contains(&REGION_KASAN));
    assert!(names.contains(&REGION_HIGHMEM));

    // x86 never has a vector table
    let x86 = build_catalog(&PlatformFacts::new(ArchFamily::X86, WordWidth::W32, fv));
    assert!(!x86.iter().any(|r| r.name == REGION_VECTORS));
    Ok(())
}

#[test]
fn lowmem_end_to_end_line() -> Result<()> {
    let fv = kernel_version(6, 1, 0);
    let layout = Layout::resolve(ArchFamily::X86, WordWidth::W64, fv).with_page_offset(0xFFFF_8000_0000_0000);
    let f = PlatformFacts::new(ArchFamily::X86, WordWidth::W64, fv)
        .with_layout(layout)
        .with_total_memory(0x7FF0_0000);

    let cat = build_catalog(&f);
    let snap = serialize(&cat, f.word_width, 2048)?;
    let text = String::from_utf8(snap.as_bytes().to_vec())?;
    assert!(
        text.contains("ffff800000000000,ffff80007ff00000,rwx,lowmem region\n"),
        "got:\n{text}"
    );
    Ok(())
}

#[test]
fn zero_memory_still_lists_lowmem() -> Result<()> {
    for arch in ARCHES {
        for width in WIDTHS {
            let f = PlatformFacts::new(arch, width, kernel_version(5, 15, 0));
            let cat = build_catalog(&f);
            let lm = cat.iter().find(|r| r.name == REGION_LOWMEM).unwrap();
            assert_eq!(lm.start, lm.end);
        }
    }
    Ok(())
}

#[test]
fn random_facts_never_break_invariants() -> Result<()> {
    let mut rng = Rand64::new(0x6b5e_6d61_70);
    for _ in 0..2000 {
        let arch = ARCHES[(rng.rand_u64() % 3) as usize];
        let width = WIDTHS[(rng.rand_u64() % 2) as usize];
        let fv = (rng.rand_u64() % (kernel_version(7, 0, 0) as u64)) as u32;
        let mut layout = Layout::resolve(arch, width, fv);
        if rng.rand_u64() % 4 == 0 {
            // произвольный (даже бессмысленный) PAGE_OFFSET
            layout = layout.with_page_offset(rng.rand_u64());
        }
        let f = PlatformFacts::new(arch, width, fv)
            .with_layout(layout)
            .with_total_memory(rng.rand_u64() >> (rng.rand_u64() % 64))
            .with_caps(Capabilities {
                kasan: rng.rand_u64() % 2 == 0,
                highmem: rng.rand_u64() % 2 == 0,
            });

        let cat = build_catalog(&f);
        for r in &cat {
            assert!(r.start <= r.end);
            assert!(r.end <= width.max_addr());
        }

        let snap = serialize_with_trailer(&cat, &f, 2048, true)?;
        assert!(!snap.is_truncated());
        let text = std::str::from_utf8(snap.as_bytes())?;
        let nib = width.nibbles();
        for line in text.lines().take(cat.len()) {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 4, "bad record {line:?}");
            assert_eq!(fields[0].len(), nib);
            assert_eq!(fields[1].len(), nib);
            assert_eq!(fields[2].len(), 3);
        }
    }
    Ok(())
}
