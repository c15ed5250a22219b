//! facts/variant: release string -> distribution variant code.
//!
//! Ordered substring match over a fixed marker table. Markers that are a
//! prefix of another marker ("el8_1" vs "el8_10", "el9" vs "el9_3") must come
//! after it, otherwise the shorter one wins on the newer release.
//! Code = major * 100 + minor; bare major markers map to minor 0.
//! No match -> 0 (generic / unknown).

/// Marker table, most specific first.
static VARIANT_MARKERS: &[(&str, u32)] = &[
    // RHEL 10
    ("el10_1", 1001),
    ("el10_0", 1000),
    ("el10", 1000),
    // RHEL 9
    ("el9_7", 907),
    ("el9_6", 906),
    ("el9_5", 905),
    ("el9_4", 904),
    ("el9_3", 903),
    ("el9_2", 902),
    ("el9_1", 901),
    ("el9_0", 900),
    ("el9", 900),
    // RHEL 8: el8_10 before el8_1
    ("el8_10", 810),
    ("el8_9", 809),
    ("el8_8", 808),
    ("el8_7", 807),
    ("el8_6", 806),
    ("el8_5", 805),
    ("el8_4", 804),
    ("el8_3", 803),
    ("el8_2", 802),
    ("el8_1", 801),
    ("el8_0", 800),
    ("el8", 800),
    // RHEL 7
    ("el7_9", 709),
    ("el7_8", 708),
    ("el7_7", 707),
    ("el7_6", 706),
    ("el7", 700),
];

/// Resolve a release string (e.g. `4.18.0-513.5.1.el8_9.x86_64`) to a variant code.
pub fn resolve_variant(release: &str) -> u32 {
    VARIANT_MARKERS
        .iter()
        .find(|(marker, _)| release.contains(marker))
        .map(|&(_, code)| code)
        .unwrap_or(0)
}

/// Marker that produced `resolve_variant(release)`, if any.
pub fn matched_marker(release: &str) -> Option<&'static str> {
    VARIANT_MARKERS
        .iter()
        .find(|(marker, _)| release.contains(marker))
        .map(|&(marker, _)| marker)
}
