use crate::error::Result;
use chrono::Local;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// First unused name derived from `base`: the base itself, then `-1`, `-2`,
/// and so on. Keeps two runs within the same second from clobbering each
/// other's backup.
fn unique_path(base: PathBuf) -> PathBuf {
    if !base.exists() {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = sibling(&base, &format!("-{n}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Copy the configuration file to a timestamped backup next to it and
/// return the backup path. Backups accumulate; nothing here deletes them.
pub fn create(config_path: &Path) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let target = unique_path(sibling(config_path, &format!(".backup.{stamp}")));
    std::fs::copy(config_path, &target)?;
    debug!(backup = %target.display(), "backup created");
    Ok(target)
}

/// Sort key for the part after the `.backup.` prefix: the stamp, then the
/// numeric collision suffix. The suffix must be compared as a number;
/// string order would put `-10` before `-2`.
fn recency_key(rest: &str) -> (String, u32) {
    const STAMP_LEN: usize = "20000101-000000".len();
    if rest.len() > STAMP_LEN + 1 && rest.as_bytes()[STAMP_LEN] == b'-' {
        if let Ok(n) = rest[STAMP_LEN + 1..].parse::<u32>() {
            return (rest[..STAMP_LEN].to_string(), n);
        }
    }
    (rest.to_string(), 0)
}

/// The most recent timestamped backup of `config_path`: greatest stamp,
/// then greatest collision suffix. The stamp format sorts chronologically,
/// so greatest means newest.
pub fn latest(config_path: &Path) -> Result<Option<PathBuf>> {
    let dir = match config_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let Some(file_name) = config_path.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    let prefix = format!("{file_name}.backup.");

    let mut newest: Option<((String, u32), PathBuf)> = None;
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };
        let key = recency_key(rest);
        if newest.as_ref().is_none_or(|(k, _)| key > *k) {
            newest = Some((key, entry.path()));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

/// Copy a backup back over the configuration file.
pub fn restore(backup: &Path, config_path: &Path) -> Result<()> {
    std::fs::copy(backup, config_path)?;
    Ok(())
}

/// Fixed-name backup used by the dry-run check. Overwrites any leftover from
/// a previous run; consumed and deleted unconditionally at the end.
pub fn create_check(config_path: &Path) -> Result<PathBuf> {
    let target = sibling(config_path, ".check-backup");
    std::fs::copy(config_path, &target)?;
    Ok(target)
}
