//! Fetching the browser's JSON bundles.
//!
//! Bundles come either from an HTTP(S) base URL or from a local directory
//! laid out the same way (`catalog.json`, `channels/<category>.json`).

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};
use url::Url;

use crate::model::{CatalogBundle, Channel};

#[derive(Debug, Clone, PartialEq)]
pub enum BundleSource {
  Http(Url),
  Dir(PathBuf),
}

impl BundleSource {
  /// `http://` / `https://` → remote, anything else is a directory path.
  pub fn parse(input: &str) -> Result<Self> {
    if input.starts_with("http://") || input.starts_with("https://") {
      let mut url = Url::parse(input).with_context(|| format!("Invalid bundle URL: {}", input))?;
      if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
      }
      Ok(BundleSource::Http(url))
    } else {
      Ok(BundleSource::Dir(PathBuf::from(input)))
    }
  }

  pub fn describe(&self) -> String {
    match self {
      BundleSource::Http(url) => url.to_string(),
      BundleSource::Dir(dir) => dir.display().to_string(),
    }
  }
}

pub fn http_client() -> Result<Client> {
  Client::builder()
    .user_agent(format!("edutube/{}", env!("CARGO_PKG_VERSION")))
    .timeout(Duration::from_secs(30))
    .build()
    .context("Failed to build HTTP client")
}

#[derive(Debug, Clone)]
pub struct BundleLoader {
  source: BundleSource,
  client: Client,
}

impl BundleLoader {
  pub fn new(source: BundleSource, client: Client) -> Self {
    Self { source, client }
  }

  pub fn source(&self) -> &BundleSource {
    &self.source
  }

  async fn fetch_json<T: DeserializeOwned>(&self, relative: &str) -> Result<T> {
    match &self.source {
      BundleSource::Http(base) => {
        let url = base.join(relative).with_context(|| format!("Invalid bundle path: {}", relative))?;
        let response = self.client.get(url.clone()).send().await.with_context(|| format!("GET {} failed", url))?;
        if !response.status().is_success() {
          return Err(anyhow!("GET {} returned {}", url, response.status()));
        }
        response.json::<T>().await.with_context(|| format!("Malformed JSON at {}", url))
      }
      BundleSource::Dir(dir) => {
        let path = dir.join(relative);
        let content =
          tokio::fs::read_to_string(&path).await.with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Malformed JSON in {}", path.display()))
      }
    }
  }

  pub async fn catalog(&self) -> Result<CatalogBundle> {
    self.fetch_json("catalog.json").await
  }

  pub async fn channels(&self, category: &str) -> Result<Vec<Channel>> {
    if category.is_empty() || category.contains(['/', '\\']) || category.starts_with('.') {
      return Err(anyhow!("Category not found: {}", category));
    }
    self
      .fetch_json(&format!("channels/{}.json", category))
      .await
      .with_context(|| format!("Category not found: {}", category))
  }
}

/// A channel bundle load in flight. The ticket identifies the request so a
/// result arriving after the user moved on can be recognised and dropped.
pub struct PendingLoad {
  pub category: String,
  pub ticket: u64,
  rx: oneshot::Receiver<Result<Vec<Channel>>>,
}

pub enum LoadPoll {
  Pending(PendingLoad),
  Ready { category: String, ticket: u64, result: Result<Vec<Channel>> },
  Lost { category: String, ticket: u64 },
}

impl PendingLoad {
  pub fn spawn(loader: &BundleLoader, category: &str, ticket: u64) -> Self {
    let (tx, rx) = oneshot::channel();
    let loader = loader.clone();
    let requested = category.to_string();
    info!(category = %requested, ticket, "loader: fetching channel bundle");
    tokio::spawn(async move {
      let _ = tx.send(loader.channels(&requested).await);
    });
    Self { category: category.to_string(), ticket, rx }
  }

  pub fn poll(mut self) -> LoadPoll {
    match self.rx.try_recv() {
      Ok(result) => LoadPoll::Ready { category: self.category, ticket: self.ticket, result },
      Err(oneshot::error::TryRecvError::Empty) => LoadPoll::Pending(self),
      Err(oneshot::error::TryRecvError::Closed) => {
        warn!(category = %self.category, "loader: load task ended without a result");
        LoadPoll::Lost { category: self.category, ticket: self.ticket }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use httpmock::prelude::*;

  const BUNDLE: &str = r#"[{"id":"UC1","name":"Labo","public":"tout public","tags":["chimie"],
    "videos":[{"id":"v1","title":"Atomes","duration":"PT4M"}]}]"#;

  #[test]
  fn parse_source_kinds() {
    let http = BundleSource::parse("https://example.org/site").unwrap();
    assert_eq!(http, BundleSource::Http(Url::parse("https://example.org/site/").unwrap()));
    assert_eq!(BundleSource::parse("./public").unwrap(), BundleSource::Dir(PathBuf::from("./public")));
    assert!(BundleSource::parse("https://").is_err());
  }

  #[tokio::test]
  async fn loads_channels_over_http() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/channels/sciences.json");
        then.status(200).header("Content-Type", "application/json").body(BUNDLE);
      })
      .await;
    let source = BundleSource::parse(&server.url("/")).unwrap();
    let loader = BundleLoader::new(source, http_client().unwrap());
    let channels = loader.channels("sciences").await.unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].videos[0].id, "v1");
  }

  #[tokio::test]
  async fn missing_category_is_an_error() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/channels/nope.json");
        then.status(404);
      })
      .await;
    let loader = BundleLoader::new(BundleSource::parse(&server.url("/")).unwrap(), http_client().unwrap());
    let err = loader.channels("nope").await.unwrap_err();
    assert!(format!("{:#}", err).contains("Category not found"));
  }

  #[tokio::test]
  async fn malformed_json_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("channels")).unwrap();
    std::fs::write(dir.path().join("channels/broken.json"), "{not json").unwrap();
    let loader = BundleLoader::new(BundleSource::Dir(dir.path().to_path_buf()), http_client().unwrap());
    assert!(loader.channels("broken").await.is_err());
    assert!(loader.channels("../escape").await.is_err());
  }

  #[tokio::test]
  async fn loads_catalog_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
      dir.path().join("catalog.json"),
      r#"{"title":"T","description":"D","categories":[{"id":"sciences","name":"Sciences","channelCount":1,"videoCount":1}]}"#,
    )
    .unwrap();
    let loader = BundleLoader::new(BundleSource::Dir(dir.path().to_path_buf()), http_client().unwrap());
    let catalog = loader.catalog().await.unwrap();
    assert_eq!(catalog.categories[0].id, "sciences");
  }

  #[tokio::test]
  async fn pending_load_reports_ticket() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("channels")).unwrap();
    std::fs::write(dir.path().join("channels/sciences.json"), BUNDLE).unwrap();
    let loader = BundleLoader::new(BundleSource::Dir(dir.path().to_path_buf()), http_client().unwrap());
    let mut pending = PendingLoad::spawn(&loader, "sciences", 7);
    loop {
      match pending.poll() {
        LoadPoll::Pending(p) => {
          pending = p;
          tokio::task::yield_now().await;
        }
        LoadPoll::Ready { category, ticket, result } => {
          assert_eq!(category, "sciences");
          assert_eq!(ticket, 7);
          assert_eq!(result.unwrap().len(), 1);
          break;
        }
        LoadPoll::Lost { .. } => panic!("load task lost"),
      }
    }
  }
}
