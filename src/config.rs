use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::filter::FilterSelection;
use crate::player::PlayerKind;

const NAMESPACE: &str = "edutube";

fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", NAMESPACE)
}

/// Per-user preferences, `prefs.toml` in the platform config dir.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub theme_name: Option<String>,
  /// Keep search text and filter pills between sessions.
  #[serde(default)]
  pub remember_filters: bool,
  /// Bundle location used when `browse` is run without `--source`.
  pub source: Option<String>,
  /// Player used when `browse` is run without `--player`.
  #[serde(default)]
  pub player: Option<PlayerKind>,
}

impl Config {
  pub fn load() -> Self {
    project_dirs().map(|dirs| Self::load_from(&dirs.config_dir().join("prefs.toml"))).unwrap_or_default()
  }

  pub fn load_from(path: &Path) -> Self {
    if let Ok(content) = std::fs::read_to_string(path)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }
    Self::default()
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = project_dirs() {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok()
        && let Ok(content) = toml::to_string(self)
      {
        let _ = std::fs::write(config_dir.join("prefs.toml"), content);
      }
    }
  }
}

/// Where the file log of the browser goes.
pub fn log_dir() -> PathBuf {
  project_dirs().map(|d| d.data_local_dir().to_path_buf()).unwrap_or_else(std::env::temp_dir)
}

/// Durable home for the filter selection. Loading never fails: anything
/// unreadable comes back as an empty selection.
pub trait FilterStore {
  fn load(&self) -> FilterSelection;
  fn save(&self, selection: &FilterSelection);
}

/// `filters.toml` next to `prefs.toml`.
#[derive(Debug, Clone)]
pub struct TomlFilterStore {
  path: PathBuf,
}

impl TomlFilterStore {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }

  pub fn in_config_dir() -> Option<Self> {
    project_dirs().map(|dirs| Self::new(dirs.config_dir().join("filters.toml")))
  }
}

impl FilterStore for TomlFilterStore {
  fn load(&self) -> FilterSelection {
    let Ok(content) = std::fs::read_to_string(&self.path) else { return FilterSelection::default() };
    match toml::from_str(&content) {
      Ok(selection) => selection,
      Err(e) => {
        warn!(path = %self.path.display(), err = %e, "filters: discarding unreadable saved state");
        FilterSelection::default()
      }
    }
  }

  fn save(&self, selection: &FilterSelection) {
    if let Some(dir) = self.path.parent()
      && let Err(e) = std::fs::create_dir_all(dir)
    {
      warn!(err = %e, "filters: cannot create config dir");
      return;
    }
    match toml::to_string(selection) {
      Ok(content) => {
        if let Err(e) = std::fs::write(&self.path, content) {
          warn!(path = %self.path.display(), err = %e, "filters: save failed");
        }
      }
      Err(e) => warn!(err = %e, "filters: cannot serialize selection"),
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};

  /// In-memory store for session tests. `saved` is shared so a test can keep
  /// a handle after the store moves into the session.
  #[derive(Default)]
  pub(crate) struct MemoryFilterStore {
    pub(crate) saved: Arc<Mutex<Vec<FilterSelection>>>,
    pub(crate) initial: FilterSelection,
  }

  impl FilterStore for MemoryFilterStore {
    fn load(&self) -> FilterSelection {
      self.initial.clone()
    }

    fn save(&self, selection: &FilterSelection) {
      self.saved.lock().unwrap().push(selection.clone());
    }
  }

  #[test]
  fn toml_store_round_trips_groups_only() {
    let dir = tempfile::tempdir().unwrap();
    let store = TomlFilterStore::new(dir.path().join("nested").join("filters.toml"));
    let mut sel = FilterSelection { search: "volcans".into(), tags: vec!["sciences".into()], ..Default::default() };
    sel.cycle_duration();
    store.save(&sel);

    let loaded = store.load();
    assert_eq!(loaded.search, "volcans");
    assert_eq!(loaded.tags, vec!["sciences".to_string()]);
    assert_eq!(loaded.duration, None);
  }

  #[test]
  fn corrupt_filter_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filters.toml");
    std::fs::write(&path, "tags = [unterminated").unwrap();
    assert_eq!(TomlFilterStore::new(path).load(), FilterSelection::default());
  }

  #[test]
  fn missing_filter_file_is_empty_selection() {
    let dir = tempfile::tempdir().unwrap();
    assert!(TomlFilterStore::new(dir.path().join("none.toml")).load().is_empty());
  }

  #[test]
  fn prefs_parse_and_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.toml");
    std::fs::write(&path, "theme_name = \"Menthe\"\nremember_filters = true\nplayer = \"browser\"\n").unwrap();
    let config = Config::load_from(&path);
    assert_eq!(config.theme_name.as_deref(), Some("Menthe"));
    assert!(config.remember_filters);
    assert_eq!(config.player, Some(PlayerKind::Browser));
    assert_eq!(Config::load_from(&dir.path().join("missing.toml")), Config::default());
  }
}
