//! facts/probe: read-only access to host files used by detection.
//!
//! Every accessor returns Option: a missing or unreadable file is a degraded
//! fact, never an error.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::debug;

pub trait HostProbe: Send + Sync {
    /// Whole file as UTF-8 text.
    fn read_text(&self, path: &Path) -> Option<String>;

    /// Gzip-compressed file (e.g. /proc/config.gz), decompressed to text.
    fn read_gz_text(&self, path: &Path) -> Option<String>;

    /// Entry names of a directory.
    fn list_dir(&self, path: &Path) -> Option<Vec<String>>;
}

/// Real filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsProbe;

impl FsProbe {
    fn gz_text(path: &Path) -> Result<String> {
        let f = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut out = String::new();
        GzDecoder::new(f)
            .read_to_string(&mut out)
            .with_context(|| format!("gunzip {}", path.display()))?;
        Ok(out)
    }

    fn dir_names(path: &Path) -> Result<Vec<String>> {
        let rd = fs::read_dir(path).with_context(|| format!("read_dir {}", path.display()))?;
        let mut names = Vec::new();
        for e in rd.flatten() {
            names.push(e.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }
}

/// Ошибка чтения = отсутствующий факт; причина уходит в debug-лог.
fn degrade<T>(r: Result<T>) -> Option<T> {
    match r {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("host probe: {:#}", e);
            None
        }
    }
}

impl HostProbe for FsProbe {
    fn read_text(&self, path: &Path) -> Option<String> {
        degrade(fs::read_to_string(path).with_context(|| format!("read {}", path.display())))
    }

    fn read_gz_text(&self, path: &Path) -> Option<String> {
        degrade(Self::gz_text(path))
    }

    fn list_dir(&self, path: &Path) -> Option<Vec<String>> {
        degrade(Self::dir_names(path))
    }
}

/// `CONFIG_<name>=y` (or `=m`) present in a kernel .config text.
pub fn kconfig_enabled(config_text: &str, name: &str) -> bool {
    config_text.lines().any(|l| {
        let l = l.trim();
        match l.strip_prefix(name) {
            Some(rest) => rest == "=y" || rest == "=m",
            None => false,
        }
    })
}
