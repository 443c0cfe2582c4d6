//! `edutube compile`: turn `data/` into the bundles the browser loads.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::catalog::{self, SourceCatalog, SourceCategory};
use crate::constants::constants;
use crate::model::{CatalogBundle, Category, Channel};

async fn read_channel(path: PathBuf) -> Result<Channel> {
  let content =
    tokio::fs::read_to_string(&path).await.with_context(|| format!("Failed to read {}", path.display()))?;
  serde_json::from_str(&content).with_context(|| format!("Malformed channel file {}", path.display()))
}

/// Every stored channel of a category, in file-name order.
pub async fn load_category(data_dir: &Path, category: &str) -> Result<Vec<Channel>> {
  let files = catalog::json_files(&catalog::category_dir(data_dir, category))?;
  stream::iter(files).map(read_channel).buffered(constants().compile_concurrency.max(1)).try_collect().await
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
  if let Some(dir) = path.parent() {
    tokio::fs::create_dir_all(dir).await.with_context(|| format!("Failed to create {}", dir.display()))?;
  }
  let content = serde_json::to_string(value).context("Failed to serialize bundle")?;
  tokio::fs::write(path, content).await.with_context(|| format!("Failed to write {}", path.display()))
}

fn summarize(category: &SourceCategory, channels: &[Channel]) -> Category {
  Category {
    id: category.id.clone(),
    name: category.name.clone(),
    description: Some(category.description.clone()).filter(|d| !d.is_empty()),
    channel_count: channels.len(),
    video_count: channels.iter().map(|c| c.videos.len()).sum(),
  }
}

/// Write `<out>/channels/<id>.json` for each catalog category and
/// `<out>/catalog.json` describing them all.
pub async fn run(catalog: &SourceCatalog, data_dir: &Path, out_dir: &Path) -> Result<CatalogBundle> {
  let mut categories = Vec::with_capacity(catalog.categories.len());
  for category in &catalog.categories {
    let channels = load_category(data_dir, &category.id).await?;
    let path = out_dir.join("channels").join(format!("{}.json", category.id));
    write_json(&path, &channels).await?;
    let summary = summarize(category, &channels);
    info!(
      category = %category.id,
      channels = summary.channel_count,
      videos = summary.video_count,
      "compile: bundle written"
    );
    categories.push(summary);
  }

  let bundle =
    CatalogBundle { title: catalog.title.clone(), description: catalog.description.clone(), categories };
  write_json(&out_dir.join("catalog.json"), &bundle).await?;
  info!(out = %out_dir.display(), categories = bundle.categories.len(), "compile: catalog written");
  Ok(bundle)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Video;

  fn stored(id: &str, videos: usize) -> Channel {
    Channel {
      id: id.into(),
      name: format!("Chaîne {}", id),
      videos: (0..videos).map(|i| Video { id: format!("{}-{}", id, i), ..Default::default() }).collect(),
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn compiles_counts_and_empty_categories() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    catalog::write_channel(data.path(), "sciences", &stored("UC2", 3)).unwrap();
    catalog::write_channel(data.path(), "sciences", &stored("UC1", 2)).unwrap();
    let source = SourceCatalog::parse(
      "title = \"EduTube\"\n[[categories]]\nid = \"sciences\"\nname = \"Sciences\"\ndescription = \"Tout\"\n\
       [[categories]]\nid = \"arts\"\nname = \"Arts\"\n",
    )
    .unwrap();

    let bundle = run(&source, data.path(), out.path()).await.unwrap();
    assert_eq!(bundle.categories[0].channel_count, 2);
    assert_eq!(bundle.categories[0].video_count, 5);
    assert_eq!(bundle.categories[0].description.as_deref(), Some("Tout"));
    assert_eq!(bundle.categories[1].channel_count, 0);
    assert_eq!(bundle.categories[1].description, None);

    let written: Vec<Channel> =
      serde_json::from_str(&std::fs::read_to_string(out.path().join("channels/sciences.json")).unwrap()).unwrap();
    let ids: Vec<&str> = written.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["UC1", "UC2"]);
    let catalog: CatalogBundle =
      serde_json::from_str(&std::fs::read_to_string(out.path().join("catalog.json")).unwrap()).unwrap();
    assert_eq!(catalog, bundle);
  }

  #[tokio::test]
  async fn malformed_channel_file_fails_the_compile() {
    let data = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(data.path().join("sciences")).unwrap();
    std::fs::write(data.path().join("sciences/UC1.json"), "[").unwrap();
    let source = SourceCatalog::parse("title = \"t\"\n[[categories]]\nid = \"sciences\"\nname = \"S\"\n").unwrap();
    let err = run(&source, data.path(), data.path()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("UC1.json"));
  }
}
