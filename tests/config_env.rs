// tests/config_env.rs
//
// KSEG_* переменные окружения -> KsegConfig -> HostFacts -> snapshot.
// Один тест на бинарник: env процесса общий, параллельные тесты бы мешали друг другу.
//
// Запуск:
//   cargo test --test config_env -- --nocapture

use anyhow::Result;

use KsegMap::consts::{
    kernel_version, DEFAULT_HTTP_ADDR, DEFAULT_SNAPSHOT_CAPACITY, ENV_ARCH, ENV_DIAGNOSTICS,
    ENV_HIGHMEM, ENV_HTTP_ADDR, ENV_KASAN, ENV_PAGE_OFFSET, ENV_RELEASE, ENV_SNAPSHOT_CAPACITY,
    ENV_STYLE, ENV_WORD_WIDTH, REGION_HIGHMEM, REGION_KASAN,
};
use KsegMap::facts::HostFacts;
use KsegMap::{
    build_catalog, resolve_variant, ArchFamily, FactsSource, Interrupt, KsegConfig,
    SnapshotService, Style, WordWidth,
};

const ALL: [&str; 10] = [
    ENV_SNAPSHOT_CAPACITY,
    ENV_STYLE,
    ENV_ARCH,
    ENV_WORD_WIDTH,
    ENV_RELEASE,
    ENV_KASAN,
    ENV_HIGHMEM,
    ENV_PAGE_OFFSET,
    ENV_DIAGNOSTICS,
    ENV_HTTP_ADDR,
];

#[test]
fn env_overrides_drive_detection() -> Result<()> {
    for k in ALL {
        std::env::remove_var(k);
    }
    let d = KsegConfig::from_env();
    assert_eq!(d.snapshot_capacity, DEFAULT_SNAPSHOT_CAPACITY);
    assert_eq!(d.style, Style::Csv);
    assert_eq!(d.http_addr, DEFAULT_HTTP_ADDR);
    assert!(d.arch.is_none() && d.release.is_none());

    std::env::set_var(ENV_SNAPSHOT_CAPACITY, "4096");
    std::env::set_var(ENV_STYLE, "table");
    std::env::set_var(ENV_ARCH, "arm");
    std::env::set_var(ENV_WORD_WIDTH, "32");
    std::env::set_var(ENV_RELEASE, "5.14.0-362.el9_3.armv7hl");
    std::env::set_var(ENV_KASAN, "1");
    std::env::set_var(ENV_HIGHMEM, "true");
    std::env::set_var(ENV_PAGE_OFFSET, "0xC000_0000");
    std::env::set_var(ENV_DIAGNOSTICS, "0");
    std::env::set_var(ENV_HTTP_ADDR, "0.0.0.0:9000");

    let cfg = KsegConfig::from_env().build();
    assert_eq!(cfg.snapshot_capacity, 4096);
    assert_eq!(cfg.style, Style::Table);
    assert_eq!(cfg.arch, Some(ArchFamily::Arm));
    assert_eq!(cfg.word_width, Some(WordWidth::W32));
    assert_eq!(cfg.kasan, Some(true));
    assert_eq!(cfg.highmem, Some(true));
    assert_eq!(cfg.page_offset, Some(0xC000_0000));
    assert!(!cfg.diagnostics);
    assert_eq!(cfg.http_addr, "0.0.0.0:9000");

    let f = HostFacts::new(&cfg).facts();
    assert_eq!(f.arch_family, ArchFamily::Arm);
    assert_eq!(f.word_width, WordWidth::W32);
    assert_eq!(f.feature_version, kernel_version(5, 14, 0));
    assert_eq!(f.variant_code, resolve_variant("el9_3"));
    assert_eq!(f.variant_code, 903);
    assert_eq!(f.layout.page_offset, 0xC000_0000);

    let names: Vec<&str> = build_catalog(&f).iter().map(|r| r.name).collect();
    assert!(names.contains(&REGION_KASAN));
    assert!(names.contains(&REGION_HIGHMEM));

    // диагностика выключена -> в snapshot нет trailer-строк
    let svc = SnapshotService::from_config(&cfg);
    let snap = svc.snapshot(&Interrupt::new())?;
    let text = std::str::from_utf8(snap.as_bytes())?;
    assert!(!text.contains("PAGE_SIZE,"));
    assert_eq!(snap.capacity(), 4096);

    // мусор игнорируется, а не роняет загрузку
    std::env::set_var(ENV_SNAPSHOT_CAPACITY, "lots");
    std::env::set_var(ENV_WORD_WIDTH, "48");
    std::env::set_var(ENV_STYLE, "fancy");
    let cfg = KsegConfig::from_env();
    assert_eq!(cfg.snapshot_capacity, DEFAULT_SNAPSHOT_CAPACITY);
    assert_eq!(cfg.word_width, None);
    assert_eq!(cfg.style, Style::Csv);

    for k in ALL {
        std::env::remove_var(k);
    }
    Ok(())
}
