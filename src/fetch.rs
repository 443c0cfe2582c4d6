//! `edutube fetch`: refresh `data/` from the YouTube Data API, tagging new
//! material through the LLM.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

use crate::catalog::{self, SourceCatalog, SourceCategory};
use crate::constants::constants;
use crate::infer::{self, Completion};
use crate::model::{Channel, Video};
use crate::youtube::{ChannelItem, YouTubeClient};

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
  /// Upload count per channel, `None` for the whole playlist.
  pub limit: Option<usize>,
  /// Re-run inference on videos and channels that already have tags.
  pub force_infer: bool,
  /// Only this category.
  pub category: Option<String>,
}

impl FetchOptions {
  /// Uploads to list per channel. A zero limit means the default one, never
  /// an empty listing that would erase stored videos.
  pub fn upload_limit(&self) -> Option<usize> {
    self.limit.map(|l| if l == 0 { constants().default_video_limit } else { l })
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchSummary {
  pub saved: usize,
  pub not_found: usize,
  pub failed: usize,
}

/// Order `ids` from `existing` and `fresh`, preferring the stored copy so
/// tags survive. Ids found in neither are dropped.
pub fn merge_videos(ids: &[String], existing: &[Video], fresh: Vec<Video>) -> Vec<Video> {
  let mut by_id: HashMap<String, Video> = existing.iter().map(|v| (v.id.clone(), v.clone())).collect();
  for video in fresh {
    by_id.entry(video.id.clone()).or_insert(video);
  }
  ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// Infer tags for the videos at `targets`, leaving the others untouched.
async fn tag_videos<C: Completion>(llm: &C, videos: &mut [Video], targets: &[usize]) {
  if targets.is_empty() {
    return;
  }
  info!(count = targets.len(), "fetch: inferring video tags");
  let titles: Vec<String> = targets.iter().map(|&i| videos[i].title.clone()).collect();
  let inferred = infer::infer_video_tags(llm, &titles).await;
  for (pos, &i) in targets.iter().enumerate() {
    if let Some(tags) = inferred.get(&pos) {
      videos[i].tags = tags.clone();
    }
  }
}

/// Assemble the stored channel from fresh platform metadata, keeping the
/// stored labels unless inference is due.
async fn finish_channel<C: Completion>(
  llm: &C,
  item: &ChannelItem,
  existing: Option<&Channel>,
  videos: Vec<Video>,
  handle: Option<String>,
  force_infer: bool,
) -> Channel {
  let c = constants();
  let mut tags = existing.map(|e| e.tags.clone()).unwrap_or_default();
  let mut public = existing.map(|e| e.public.clone()).filter(|p| !p.is_empty()).unwrap_or(c.default_age_group.clone());

  if force_infer || existing.is_none() || tags.is_empty() {
    info!(channel = %item.snippet.title, "fetch: inferring channel metadata");
    let samples: Vec<String> = videos.iter().map(|v| v.title.clone()).collect();
    let inference = infer::infer_channel(llm, &item.snippet.title, &item.snippet.description, &samples).await;
    info!(tags = %inference.tags.join(", "), public = %inference.public, "fetch: channel labels");
    tags = inference.tags;
    public = inference.public;
  }

  Channel {
    id: item.id.clone(),
    name: item.snippet.title.clone(),
    description: item.snippet.description.clone(),
    thumbnail: item.snippet.thumbnails.best(),
    public,
    language: existing.map(|e| e.language.clone()).filter(|l| !l.is_empty()).unwrap_or(c.default_language.clone()),
    tags,
    videos,
    handle: handle.or_else(|| existing.and_then(|e| e.handle.clone())),
  }
}

/// Fetch one catalog channel entry. `Ok(None)` when the platform does not know it.
pub async fn fetch_channel<C: Completion>(
  yt: &YouTubeClient,
  llm: &C,
  data_dir: &Path,
  category: &str,
  entry: &str,
  opts: &FetchOptions,
) -> Result<Option<Channel>> {
  let Some(item) = yt.channel(entry).await? else {
    warn!(entry, "fetch: channel not found");
    return Ok(None);
  };
  info!(entry, name = %item.snippet.title, id = %item.id, "fetch: found channel");

  let existing = catalog::load_existing(data_dir, category, &item.id);
  let stored: &[Video] = existing.as_ref().map_or(&[], |e| e.videos.as_slice());
  let known: HashSet<&str> = stored.iter().map(|v| v.id.as_str()).collect();

  let ids = yt.playlist_video_ids(&item.content_details.related_playlists.uploads, opts.upload_limit()).await?;
  let new_ids: Vec<String> = ids.iter().filter(|id| !known.contains(id.as_str())).cloned().collect();
  info!(total = ids.len(), new = new_ids.len(), "fetch: uploads listed");

  let fresh: Vec<Video> = yt.video_details(&new_ids).await?.into_iter().map(|v| v.into_video()).collect();
  let mut videos = merge_videos(&ids, stored, fresh);

  let new_set: HashSet<&str> = new_ids.iter().map(String::as_str).collect();
  let targets: Vec<usize> = videos
    .iter()
    .enumerate()
    .filter(|(_, v)| opts.force_infer || new_set.contains(v.id.as_str()))
    .map(|(i, _)| i)
    .collect();
  tag_videos(llm, &mut videos, &targets).await;

  Ok(Some(finish_channel(llm, &item, existing.as_ref(), videos, Some(entry.to_string()), opts.force_infer).await))
}

/// Fetch a category's standalone videos, filed under their own channels.
/// Each channel keeps its previously stored videos.
pub async fn fetch_standalone<C: Completion>(
  yt: &YouTubeClient,
  llm: &C,
  data_dir: &Path,
  category: &str,
  video_ids: &[String],
  opts: &FetchOptions,
) -> Result<Vec<Channel>> {
  let mut by_channel: BTreeMap<String, Vec<Video>> = BTreeMap::new();
  for item in yt.video_details(video_ids).await? {
    by_channel.entry(item.snippet.channel_id.clone()).or_default().push(item.into_video());
  }

  let mut channels = Vec::new();
  for (channel_id, picked) in by_channel {
    let Some(item) = yt.channel(&channel_id).await? else {
      warn!(channel = %channel_id, "fetch: owner channel of standalone videos not found");
      continue;
    };
    let existing = catalog::load_existing(data_dir, category, &item.id);
    let stored: Vec<Video> = existing.as_ref().map(|e| e.videos.clone()).unwrap_or_default();
    let known: HashSet<String> = stored.iter().map(|v| v.id.clone()).collect();

    let fresh: Vec<Video> = picked.into_iter().filter(|v| !known.contains(&v.id)).collect();
    let fresh_ids: HashSet<String> = fresh.iter().map(|v| v.id.clone()).collect();
    let mut videos = stored;
    videos.extend(fresh);

    let targets: Vec<usize> = videos
      .iter()
      .enumerate()
      .filter(|(_, v)| opts.force_infer || fresh_ids.contains(&v.id))
      .map(|(i, _)| i)
      .collect();
    tag_videos(llm, &mut videos, &targets).await;
    channels.push(finish_channel(llm, &item, existing.as_ref(), videos, None, opts.force_infer).await);
  }
  Ok(channels)
}

async fn fetch_category<C: Completion>(
  yt: &YouTubeClient,
  llm: &C,
  data_dir: &Path,
  category: &SourceCategory,
  opts: &FetchOptions,
  summary: &mut FetchSummary,
) {
  info!(category = %category.id, channels = category.channels.len(), videos = category.videos.len(), "fetch: category");

  for entry in &category.channels {
    match fetch_channel(yt, llm, data_dir, &category.id, entry, opts).await {
      Ok(Some(channel)) => save(data_dir, &category.id, &channel, summary),
      Ok(None) => summary.not_found += 1,
      Err(e) => {
        warn!(entry = %entry, err = %format!("{:#}", e), "fetch: channel failed, skipping");
        summary.failed += 1;
      }
    }
  }

  if !category.videos.is_empty() {
    match fetch_standalone(yt, llm, data_dir, &category.id, &category.videos, opts).await {
      Ok(channels) => {
        for channel in &channels {
          save(data_dir, &category.id, channel, summary);
        }
      }
      Err(e) => {
        warn!(category = %category.id, err = %format!("{:#}", e), "fetch: standalone videos failed");
        summary.failed += 1;
      }
    }
  }
}

fn save(data_dir: &Path, category: &str, channel: &Channel, summary: &mut FetchSummary) {
  match catalog::write_channel(data_dir, category, channel) {
    Ok(path) => {
      info!(path = %path.display(), videos = channel.videos.len(), "fetch: saved");
      summary.saved += 1;
    }
    Err(e) => {
      warn!(channel = %channel.id, err = %format!("{:#}", e), "fetch: save failed");
      summary.failed += 1;
    }
  }
}

/// Walk the catalog. Failures are per channel: logged, counted and skipped.
pub async fn run<C: Completion>(
  yt: &YouTubeClient,
  llm: &C,
  catalog: &SourceCatalog,
  data_dir: &Path,
  opts: &FetchOptions,
) -> Result<FetchSummary> {
  if let Some(ref only) = opts.category
    && catalog.category(only).is_none()
  {
    anyhow::bail!("Category not found: {}", only);
  }
  info!(
    categories = catalog.categories.len(),
    limit = %opts.upload_limit().map_or("all".to_string(), |l| l.to_string()),
    force_infer = opts.force_infer,
    "fetch: starting"
  );

  let mut summary = FetchSummary::default();
  for category in &catalog.categories {
    if opts.category.as_ref().is_some_and(|only| *only != category.id) {
      continue;
    }
    fetch_category(yt, llm, data_dir, category, opts, &mut summary).await;
  }
  info!(saved = summary.saved, not_found = summary.not_found, failed = summary.failed, "fetch: done");
  Ok(summary)
}
