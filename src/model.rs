use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duration;

/// Subject tags a channel or video may carry. Anything else returned by
/// inference is dropped.
pub const VALID_TAGS: [&str; 26] = [
  "scolaire",
  "elementaire",
  "college",
  "lycee",
  "orientation",
  "metiers",
  "mathematiques",
  "sciences",
  "francais",
  "anglais",
  "espagnol",
  "langues",
  "histoire",
  "geographie",
  "physique",
  "chimie",
  "biologie",
  "economie",
  "arts",
  "musique",
  "litterature",
  "philosophie",
  "informatique",
  "technologie",
  "sport",
  "environnement",
];

/// Audience bands a channel may be labelled with.
pub const VALID_AGE_GROUPS: [&str; 6] =
  ["tout public", "3-5 ans", "5-10 ans", "10-15 ans", "15 ans et plus", "adultes"];

pub fn is_valid_tag(tag: &str) -> bool {
  VALID_TAGS.contains(&tag)
}

pub fn is_valid_age_group(group: &str) -> bool {
  VALID_AGE_GROUPS.contains(&group)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Video {
  pub id: String,
  pub title: String,
  pub description: String,
  /// ISO-8601 duration as reported by the platform, e.g. `PT4M13S`.
  pub duration: String,
  pub published_at: String,
  pub thumbnail: String,
  pub tags: Vec<String>,
}

impl Video {
  /// Publish timestamp, `None` when missing or not RFC 3339.
  pub fn published(&self) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&self.published_at).ok().map(|d| d.with_timezone(&Utc))
  }

  pub fn duration_secs(&self) -> u64 {
    duration::parse_iso8601(&self.duration)
  }

  pub fn has_tag(&self, tag: &str) -> bool {
    self.tags.iter().any(|t| t == tag)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
  pub id: String,
  pub name: String,
  pub description: String,
  pub thumbnail: String,
  /// Age-group label, one of [`VALID_AGE_GROUPS`].
  pub public: String,
  pub language: String,
  pub tags: Vec<String>,
  /// Newest first, in the order the platform lists uploads.
  pub videos: Vec<Video>,
  /// Catalog entry (handle or id) the channel was fetched from.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub handle: Option<String>,
}

/// A video together with a snapshot of its channel, built when the feed is
/// assembled and never written back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoWithChannel {
  #[serde(flatten)]
  pub video: Video,
  pub channel_id: String,
  pub channel_name: String,
  pub channel_thumbnail: String,
  pub channel_public: String,
  pub channel_tags: Vec<String>,
}

impl VideoWithChannel {
  pub fn new(video: &Video, channel: &Channel) -> Self {
    Self {
      video: video.clone(),
      channel_id: channel.id.clone(),
      channel_name: channel.name.clone(),
      channel_thumbnail: channel.thumbnail.clone(),
      channel_public: channel.public.clone(),
      channel_tags: channel.tags.clone(),
    }
  }

  /// True if `tag` is on the video itself or on its channel.
  pub fn has_tag(&self, tag: &str) -> bool {
    self.video.has_tag(tag) || self.channel_tags.iter().any(|t| t == tag)
  }
}

/// Summary of one browsing section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
  pub id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub channel_count: usize,
  #[serde(default)]
  pub video_count: usize,
}

/// Top-level `catalog.json` bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogBundle {
  pub title: String,
  pub description: String,
  pub categories: Vec<Category>,
}
