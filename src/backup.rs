use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache_store::DataPaths;
use crate::clock::iso_timestamp;

pub const BACKUP_PREFIX: &str = "backup_";
pub const BACKUP_METADATA_FILE: &str = "backup_metadata.json";
const BACKUP_STAMP: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub backup_date: String,
    pub directories_backed_up: Vec<String>,
    pub total_files: usize,
}

/// Copies `selections/` and `fixtures/` into a timestamped snapshot under
/// `backups/` and writes its manifest.
pub fn backup_data(paths: &DataPaths, now: NaiveDateTime) -> Result<PathBuf> {
    let dir = paths
        .backups
        .join(format!("{BACKUP_PREFIX}{}", now.format(BACKUP_STAMP)));
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;

    let mut directories = Vec::new();
    let mut total_files = 0;
    for source in [&paths.selections, &paths.fixtures] {
        let Some(name) = source.file_name() else {
            continue;
        };
        directories.push(name.to_string_lossy().into_owned());
        if !source.exists() {
            continue;
        }
        let dest = dir.join(name);
        if dest.exists() {
            fs::remove_dir_all(&dest).with_context(|| format!("clear {}", dest.display()))?;
        }
        total_files += copy_dir(source, &dest)?;
    }

    let metadata = BackupMetadata {
        backup_date: iso_timestamp(now),
        directories_backed_up: directories,
        total_files,
    };
    let raw = serde_json::to_string_pretty(&metadata).context("serialize backup metadata")?;
    fs::write(dir.join(BACKUP_METADATA_FILE), raw).context("write backup metadata")?;
    info!(dir = %dir.display(), total_files, "created data backup");
    Ok(dir)
}

fn copy_dir(source: &Path, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest).with_context(|| format!("create {}", dest.display()))?;
    let mut copied = 0;
    for entry in fs::read_dir(source).with_context(|| format!("read {}", source.display()))? {
        let entry = entry?;
        let path = entry.path();
        let target = dest.join(entry.file_name());
        if path.is_dir() {
            copied += copy_dir(&path, &target)?;
        } else {
            fs::copy(&path, &target)
                .with_context(|| format!("copy {} to {}", path.display(), target.display()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Removes snapshots whose directory stamp is older than `keep_days`.
/// Directories with an unreadable stamp are left alone.
pub fn cleanup_old_backups(paths: &DataPaths, now: NaiveDateTime, keep_days: i64) -> Result<usize> {
    let cutoff = now - Duration::days(keep_days);
    let mut removed = 0;
    let entries = match fs::read_dir(&paths.backups) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err).context("list backups"),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(stamp) = name.strip_prefix(BACKUP_PREFIX) else {
            continue;
        };
        if !entry.path().is_dir() {
            continue;
        }
        let Ok(taken) = NaiveDateTime::parse_from_str(stamp, BACKUP_STAMP) else {
            warn!(name, "skipping backup with unreadable timestamp");
            continue;
        };
        if taken < cutoff {
            fs::remove_dir_all(entry.path()).with_context(|| format!("remove backup {name}"))?;
            info!(name, "removed old backup");
            removed += 1;
        }
    }
    Ok(removed)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirStats {
    pub files: usize,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub selections: DirStats,
    pub fixtures: DirStats,
    pub backups: DirStats,
}

/// File counts and byte sizes of the top level of each data directory.
pub fn storage_stats(paths: &DataPaths) -> StorageStats {
    StorageStats {
        selections: dir_stats(&paths.selections),
        fixtures: dir_stats(&paths.fixtures),
        backups: dir_stats(&paths.backups),
    }
}

fn dir_stats(dir: &Path) -> DirStats {
    let Ok(entries) = fs::read_dir(dir) else {
        return DirStats::default();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .fold(DirStats::default(), |mut acc, meta| {
            acc.files += 1;
            acc.size += meta.len();
            acc
        })
}
