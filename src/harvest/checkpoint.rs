//! Harvest checkpoint files
//!
//! A checkpoint is a JSON Lines file holding one flattened listing record per
//! line. It is read once when a harvest starts and rewritten in full after
//! every page. Writes go to a sibling temporary file that is renamed over the
//! checkpoint, so a crash mid-write leaves the previous checkpoint intact.

use crate::listing::ListingRecord;
use crate::CheckpointError;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Loads every record from a checkpoint file
///
/// Blank lines are ignored. Any other line must be a JSON object.
pub fn load_checkpoint(path: &Path) -> Result<Vec<ListingRecord>, CheckpointError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(&line).map_err(|source| CheckpointError::Parse {
            line: index + 1,
            source,
        })?;

        match value {
            Value::Object(fields) => records.push(ListingRecord::from_map(fields)),
            _ => return Err(CheckpointError::NotAnObject { line: index + 1 }),
        }
    }

    Ok(records)
}

/// Overwrites the checkpoint with the given records
///
/// Output is deterministic: the same records always produce the same bytes.
pub fn save_checkpoint(path: &Path, records: &[ListingRecord]) -> Result<(), CheckpointError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temporary_path(path);
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut writer, record).map_err(CheckpointError::Encode)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    sync_parent_dir(path)?;
    Ok(())
}

/// Default checkpoint location for a (city, building type) pair
///
/// The city is reduced to a lowercase slug: `"Ottawa, ON"` with building
/// type 17 becomes `<dir>/ottawa_on_17.jsonl`.
pub fn checkpoint_path(dir: &Path, city: &str, building_type: u32) -> PathBuf {
    dir.join(format!("{}_{}.jsonl", slugify(city), building_type))
}

fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }

    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "city".to_string()
    } else {
        slug.to_string()
    }
}

/// Flushes the directory entry so the rename survives a power loss
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
