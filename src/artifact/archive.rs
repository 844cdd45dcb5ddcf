use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    Skipped,
    Extracted { entries: usize },
}

/// Unpacks `archive` into `target_dir` unless `expected` is already present.
///
/// Entries that would land outside `target_dir` are skipped.
pub fn extract_if_missing(archive: &Path, target_dir: &Path, expected: &Path) -> Result<ExtractOutcome> {
    if expected.exists() {
        tracing::debug!("{:?} already unpacked, skipping extraction", expected);
        return Ok(ExtractOutcome::Skipped);
    }

    let failed = |what: &str, e: &dyn std::fmt::Display| {
        Error::ExtractionFailed(format!("{} {:?}: {}", what, archive, e))
    };

    let file = File::open(archive).map_err(|e| failed("cannot open", &e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| failed("invalid archive", &e))?;

    tracing::info!("Extracting {} entries from {:?}", zip.len(), archive);

    let mut extracted = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| failed("corrupt entry in", &e))?;

        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe archive entry '{}'", entry.name());
            continue;
        };
        let out_path = target_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out).map_err(|e| failed("cannot read entry from", &e))?;
        extracted += 1;
    }

    if !expected.exists() {
        return Err(Error::ExtractionFailed(format!(
            "{:?} did not contain {:?}",
            archive, expected
        )));
    }

    Ok(ExtractOutcome::Extracted { entries: extracted })
}
