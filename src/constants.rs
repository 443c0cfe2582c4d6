//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Feed
  pub page_size: usize,
  pub fuzzy_threshold: f64,
  pub short_duration_secs: u64,
  pub medium_duration_secs: u64,

  // Defaults for fetched channels
  pub default_age_group: String,
  pub default_language: String,
  pub default_video_limit: usize,

  // YouTube Data API
  pub youtube_api_base: String,
  pub youtube_page_size: usize,
  pub youtube_batch_size: usize,
  pub watch_url: String,
  pub embed_url: String,

  // LLM inference
  pub llm_api_base: String,
  pub llm_model: String,
  pub llm_api_version: String,
  pub channel_max_tokens: u32,
  pub video_max_tokens: u32,
  pub inference_batch_size: usize,
  pub channel_sample_titles: usize,

  // Tooling
  pub compile_concurrency: usize,
  pub link_base: String,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
