//! The hand-edited source catalog (`catalog.toml`) and the `data/` tree the
//! tooling keeps next to it, one `data/<category>/<channel_id>.json` per channel.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::model::Channel;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceCatalog {
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub categories: Vec<SourceCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceCategory {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  /// Handles (`@name`) or channel ids (`UC…`).
  #[serde(default)]
  pub channels: Vec<String>,
  /// Individual videos picked from channels that are not listed whole.
  #[serde(default)]
  pub videos: Vec<String>,
}

impl SourceCatalog {
  pub fn parse(content: &str) -> Result<Self> {
    let catalog: SourceCatalog = toml::from_str(content).context("Invalid catalog")?;
    catalog.validate()?;
    Ok(catalog)
  }

  pub fn load(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Self::parse(&content).with_context(|| format!("In {}", path.display()))
  }

  fn validate(&self) -> Result<()> {
    let mut seen = HashSet::new();
    for category in &self.categories {
      if !is_safe_segment(&category.id) {
        bail!("Invalid category id: {:?}", category.id);
      }
      if !seen.insert(category.id.as_str()) {
        bail!("Duplicate category id: {}", category.id);
      }
    }
    Ok(())
  }

  pub fn category(&self, id: &str) -> Option<&SourceCategory> {
    self.categories.iter().find(|c| c.id == id)
  }
}

impl SourceCategory {
  /// Whether a stored channel is still wanted by this category: listed by
  /// handle or id, or holding one of the standalone videos.
  pub fn keeps(&self, channel: &Channel) -> bool {
    let listed = |entry: &String| {
      *entry == channel.id || channel.handle.as_deref().is_some_and(|h| same_handle(h, entry))
    };
    self.channels.iter().any(listed) || channel.videos.iter().any(|v| self.videos.contains(&v.id))
  }
}

fn same_handle(a: &str, b: &str) -> bool {
  a.trim_start_matches('@').eq_ignore_ascii_case(b.trim_start_matches('@'))
}

/// A single path component usable as a directory or file stem.
pub fn is_safe_segment(s: &str) -> bool {
  !s.is_empty() && !s.starts_with('.') && !s.contains(['/', '\\'])
}

pub fn category_dir(data_dir: &Path, category: &str) -> PathBuf {
  data_dir.join(category)
}

pub fn channel_path(data_dir: &Path, category: &str, channel_id: &str) -> PathBuf {
  category_dir(data_dir, category).join(format!("{}.json", channel_id))
}

pub fn read_channel(path: &Path) -> Result<Channel> {
  let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
  serde_json::from_str(&content).with_context(|| format!("Malformed channel file {}", path.display()))
}

/// The stored channel, if any. An unreadable file counts as absent so a
/// fresh fetch replaces it.
pub fn load_existing(data_dir: &Path, category: &str, channel_id: &str) -> Option<Channel> {
  let path = channel_path(data_dir, category, channel_id);
  if !path.exists() {
    return None;
  }
  match read_channel(&path) {
    Ok(channel) => Some(channel),
    Err(e) => {
      tracing::warn!(path = %path.display(), err = %format!("{:#}", e), "catalog: ignoring unreadable channel file");
      None
    }
  }
}

pub fn write_channel(data_dir: &Path, category: &str, channel: &Channel) -> Result<PathBuf> {
  let dir = category_dir(data_dir, category);
  std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
  let path = channel_path(data_dir, category, &channel.id);
  let content = serde_json::to_string_pretty(channel).context("Failed to serialize channel")?;
  std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
  Ok(path)
}

/// `*.json` files directly inside `dir`, sorted by name. A missing directory is empty.
pub fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
  if !dir.is_dir() {
    return Ok(Vec::new());
  }
  let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
    .with_context(|| format!("Failed to list {}", dir.display()))?
    .filter_map(|entry| entry.ok().map(|e| e.path()))
    .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
    .collect();
  files.sort();
  Ok(files)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Video;

  const CATALOG: &str = r#"
title = "EduTube"
description = "Chaînes éducatives"

[[categories]]
id = "sciences"
name = "Sciences"
description = "Physique, chimie, biologie"
channels = ["@labo", "UCsXVk37bltHxD1rDPwtNM8Q"]
videos = ["v42"]

[[categories]]
id = "arts"
name = "Arts"
"#;

  #[test]
  fn parses_catalog_with_defaults() {
    let catalog = SourceCatalog::parse(CATALOG).unwrap();
    assert_eq!(catalog.categories.len(), 2);
    let arts = catalog.category("arts").unwrap();
    assert!(arts.channels.is_empty());
    assert!(arts.videos.is_empty());
    assert_eq!(catalog.category("sciences").unwrap().videos, vec!["v42".to_string()]);
  }

  #[test]
  fn rejects_bad_category_ids() {
    let dup = "title = \"t\"\n[[categories]]\nid = \"a\"\nname = \"A\"\n[[categories]]\nid = \"a\"\nname = \"B\"\n";
    assert!(SourceCatalog::parse(dup).is_err());
    let escape = "title = \"t\"\n[[categories]]\nid = \"../x\"\nname = \"A\"\n";
    assert!(SourceCatalog::parse(escape).is_err());
  }

  #[test]
  fn category_keeps_by_id_handle_or_video() {
    let catalog = SourceCatalog::parse(CATALOG).unwrap();
    let sciences = catalog.category("sciences").unwrap();
    let by_handle = Channel { id: "UCzzz".into(), handle: Some("@Labo".into()), ..Default::default() };
    let by_id = Channel { id: "UCsXVk37bltHxD1rDPwtNM8Q".into(), ..Default::default() };
    let by_video = Channel {
      id: "UCother".into(),
      videos: vec![Video { id: "v42".into(), ..Default::default() }],
      ..Default::default()
    };
    let stale = Channel { id: "UCgone".into(), handle: Some("@gone".into()), ..Default::default() };
    assert!(sciences.keeps(&by_handle));
    assert!(sciences.keeps(&by_id));
    assert!(sciences.keeps(&by_video));
    assert!(!sciences.keeps(&stale));
  }

  #[test]
  fn channel_files_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Channel { id: "UC1".into(), name: "Labo".into(), ..Default::default() };
    let path = write_channel(dir.path(), "sciences", &channel).unwrap();
    assert_eq!(path, dir.path().join("sciences").join("UC1.json"));
    assert_eq!(load_existing(dir.path(), "sciences", "UC1"), Some(channel));
    assert_eq!(load_existing(dir.path(), "sciences", "UC2"), None);

    std::fs::write(dir.path().join("sciences").join("notes.txt"), "x").unwrap();
    assert_eq!(json_files(&dir.path().join("sciences")).unwrap(), vec![path]);
    assert!(json_files(&dir.path().join("absent")).unwrap().is_empty());
  }
}
