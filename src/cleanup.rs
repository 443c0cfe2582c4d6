//! `edutube cleanup`: drop data files the catalog no longer refers to.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::catalog::{self, SourceCatalog, SourceCategory};
use crate::model::Channel;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupSummary {
  pub kept: usize,
  pub deleted: usize,
  pub removed_dirs: usize,
}

fn is_wanted(category: &SourceCategory, path: &Path) -> bool {
  match catalog::read_channel(path) {
    Ok(channel) => category.keeps(&channel),
    Err(e) => {
      // Unreadable: fall back to the file name as channel id.
      warn!(path = %path.display(), err = %format!("{:#}", e), "cleanup: unreadable channel file");
      let id = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
      category.keeps(&Channel { id, ..Default::default() })
    }
  }
}

/// Remove `data/<category>/` directories absent from the catalog and channel
/// files no category entry keeps. With `dry_run` nothing is touched.
pub fn run(catalog: &SourceCatalog, data_dir: &Path, dry_run: bool) -> Result<CleanupSummary> {
  let mut summary = CleanupSummary::default();
  if !data_dir.is_dir() {
    info!(dir = %data_dir.display(), "cleanup: no data directory, nothing to do");
    return Ok(summary);
  }

  let mut entries: Vec<_> = std::fs::read_dir(data_dir)
    .with_context(|| format!("Failed to list {}", data_dir.display()))?
    .filter_map(|e| e.ok())
    .filter(|e| e.path().is_dir())
    .collect();
  entries.sort_by_key(|e| e.file_name());

  for entry in entries {
    let name = entry.file_name().to_string_lossy().into_owned();
    if name.starts_with('.') {
      continue;
    }
    let path = entry.path();

    let Some(category) = catalog.category(&name) else {
      let files = catalog::json_files(&path)?.len();
      info!(category = %name, files, dry_run, "cleanup: category not in catalog, removing directory");
      if !dry_run {
        std::fs::remove_dir_all(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
      }
      summary.deleted += files;
      summary.removed_dirs += 1;
      continue;
    };

    for file in catalog::json_files(&path)? {
      if is_wanted(category, &file) {
        summary.kept += 1;
        continue;
      }
      info!(file = %file.display(), dry_run, "cleanup: not in catalog, deleting");
      if !dry_run {
        std::fs::remove_file(&file).with_context(|| format!("Failed to delete {}", file.display()))?;
      }
      summary.deleted += 1;
    }
  }

  info!(kept = summary.kept, deleted = summary.deleted, removed_dirs = summary.removed_dirs, "cleanup: done");
  Ok(summary)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn setup() -> (tempfile::TempDir, SourceCatalog) {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();
    let keep = Channel { id: "UC1".into(), handle: Some("@labo".into()), ..Default::default() };
    let stale = Channel { id: "UC2".into(), handle: Some("@ancien".into()), ..Default::default() };
    catalog::write_channel(data, "sciences", &keep).unwrap();
    catalog::write_channel(data, "sciences", &stale).unwrap();
    catalog::write_channel(data, "retiree", &keep).unwrap();
    std::fs::create_dir_all(data.join(".git")).unwrap();
    let source =
      SourceCatalog::parse("title = \"t\"\n[[categories]]\nid = \"sciences\"\nname = \"S\"\nchannels = [\"@labo\"]\n")
        .unwrap();
    (dir, source)
  }

  #[test]
  fn removes_stale_files_and_categories() {
    let (dir, source) = setup();
    let summary = run(&source, dir.path(), false).unwrap();
    assert_eq!(summary, CleanupSummary { kept: 1, deleted: 2, removed_dirs: 1 });
    assert!(dir.path().join("sciences/UC1.json").exists());
    assert!(!dir.path().join("sciences/UC2.json").exists());
    assert!(!dir.path().join("retiree").exists());
    assert!(dir.path().join(".git").exists());
  }

  #[test]
  fn dry_run_touches_nothing() {
    let (dir, source) = setup();
    let summary = run(&source, dir.path(), true).unwrap();
    assert_eq!(summary.deleted, 2);
    assert!(dir.path().join("sciences/UC2.json").exists());
    assert!(dir.path().join("retiree").exists());
  }

  #[test]
  fn missing_data_dir_is_fine() {
    let dir = tempfile::tempdir().unwrap();
    let source = SourceCatalog::parse("title = \"t\"\n").unwrap();
    assert_eq!(run(&source, &dir.path().join("data"), false).unwrap(), CleanupSummary::default());
  }
}
