//! Read-only client for the YouTube Data API v3: channel lookup, uploads
//! playlist enumeration and batched video details.

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::constants::constants;
use crate::model::Video;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnail {
  pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
  pub default: Option<Thumbnail>,
  pub medium: Option<Thumbnail>,
  pub high: Option<Thumbnail>,
}

impl Thumbnails {
  /// Largest available of high, medium, default.
  pub fn best(&self) -> String {
    self.high.as_ref().or(self.medium.as_ref()).or(self.default.as_ref()).map(|t| t.url.clone()).unwrap_or_default()
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSnippet {
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedPlaylists {
  pub uploads: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
  pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
  pub id: String,
  pub snippet: ChannelSnippet,
  pub content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
  #[serde(default = "Vec::new")]
  items: Vec<T>,
  #[serde(rename = "nextPageToken")]
  next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
  video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemSnippet {
  resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
  snippet: PlaylistItemSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub published_at: String,
  #[serde(default)]
  pub channel_id: String,
  #[serde(default)]
  pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoContentDetails {
  #[serde(default)]
  pub duration: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
  pub id: String,
  pub snippet: VideoSnippet,
  #[serde(default)]
  pub content_details: VideoContentDetails,
}

impl VideoItem {
  /// Convert to a catalog video, with no tags yet.
  pub fn into_video(self) -> Video {
    Video {
      thumbnail: self.snippet.thumbnails.best(),
      id: self.id,
      title: self.snippet.title,
      description: self.snippet.description,
      duration: self.content_details.duration,
      published_at: self.snippet.published_at,
      tags: Vec::new(),
    }
  }
}

/// A catalog entry is either a channel id (`UC` + 22 chars) or a handle,
/// with or without the leading `@`.
pub fn is_channel_id(entry: &str) -> bool {
  entry.len() == 24
    && entry.starts_with("UC")
    && entry.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Clone)]
pub struct YouTubeClient {
  client: Client,
  base: String,
  key: String,
}

impl YouTubeClient {
  pub fn new(client: Client, key: String) -> Self {
    Self::with_base(client, key, constants().youtube_api_base.clone())
  }

  pub fn with_base(client: Client, key: String, base: String) -> Self {
    Self { client, base: base.trim_end_matches('/').to_string(), key }
  }

  async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, String)]) -> Result<T> {
    let url = format!("{}/{}", self.base, endpoint);
    let response = self
      .client
      .get(&url)
      .query(&[("key", self.key.as_str())])
      .query(params)
      .send()
      .await
      .with_context(|| format!("YouTube API request to {} failed", endpoint))?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(anyhow!("YouTube API error: {} - {}", status, body));
    }
    response.json::<T>().await.with_context(|| format!("Malformed YouTube API response from {}", endpoint))
  }

  /// Look a channel up by handle or id. `Ok(None)` when the API knows no such channel.
  pub async fn channel(&self, entry: &str) -> Result<Option<ChannelItem>> {
    let entry = entry.trim();
    let mut params = vec![("part", "snippet,contentDetails".to_string())];
    if is_channel_id(entry) {
      params.push(("id", entry.to_string()));
    } else {
      params.push(("forHandle", entry.trim_start_matches('@').to_string()));
    }
    let response: ListResponse<ChannelItem> = self.get_json("channels", &params).await?;
    Ok(response.items.into_iter().next())
  }

  /// Video ids of an uploads playlist, newest first, stopping at `limit` when given.
  pub async fn playlist_video_ids(&self, playlist_id: &str, limit: Option<usize>) -> Result<Vec<String>> {
    let page_size = constants().youtube_page_size;
    let mut ids: Vec<String> = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
      let wanted = limit.map_or(page_size, |l| l.saturating_sub(ids.len()).min(page_size));
      if wanted == 0 {
        break;
      }
      let mut params = vec![
        ("playlistId", playlist_id.to_string()),
        ("part", "snippet".to_string()),
        ("maxResults", wanted.to_string()),
      ];
      if let Some(ref token) = page_token {
        params.push(("pageToken", token.clone()));
      }
      let response: ListResponse<PlaylistItem> = self.get_json("playlistItems", &params).await?;
      ids.extend(response.items.into_iter().map(|item| item.snippet.resource_id.video_id));
      debug!(playlist = playlist_id, fetched = ids.len(), "youtube: playlist page");

      page_token = response.next_page_token;
      if page_token.is_none() || limit.is_some_and(|l| ids.len() >= l) {
        break;
      }
      info!(fetched = ids.len(), "youtube: fetched video ids so far");
    }

    if let Some(l) = limit {
      ids.truncate(l);
    }
    Ok(ids)
  }

  /// Details for `ids`, requested in batches of at most 50. Unknown ids are
  /// silently absent from the result.
  pub async fn video_details(&self, ids: &[String]) -> Result<Vec<VideoItem>> {
    let mut items = Vec::with_capacity(ids.len());
    let batch_size = constants().youtube_batch_size.clamp(1, 50);
    for batch in ids.chunks(batch_size) {
      let params = [("id", batch.join(",")), ("part", "snippet,contentDetails".to_string())];
      let response: ListResponse<VideoItem> = self.get_json("videos", &params).await?;
      items.extend(response.items);
      debug!(fetched = items.len(), total = ids.len(), "youtube: video details");
    }
    Ok(items)
  }
}
