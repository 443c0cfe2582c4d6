use serde::{Deserialize, Serialize};

use crate::duration::DurationBucket;
use crate::model::VideoWithChannel;
use crate::search::FuzzyMatcher;

/// How the filtered list is ordered when no search query ranks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  /// Keep the session's shuffled order.
  #[default]
  Shuffled,
  /// Newest publish date first.
  Recent,
}

/// Everything the user can narrow the feed with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSelection {
  pub search: String,
  pub tags: Vec<String>,
  pub public: Vec<String>,
  pub channels: Vec<String>,
  #[serde(skip)]
  pub duration: Option<DurationBucket>,
  #[serde(skip)]
  pub sort: SortOrder,
}

impl FilterSelection {
  pub fn is_empty(&self) -> bool {
    self.search.trim().is_empty()
      && self.tags.is_empty()
      && self.public.is_empty()
      && self.channels.is_empty()
      && self.duration.is_none()
      && self.sort == SortOrder::Shuffled
  }
}

/// Run the filter pipeline over `videos` and return the indices that survive,
/// in display order.
///
/// Stages, each narrowing the previous one: fuzzy search, tags (video or
/// channel), age group, channel name, duration bucket, then the optional
/// recency sort.
pub fn apply(videos: &[VideoWithChannel], selection: &FilterSelection, matcher: &FuzzyMatcher) -> Vec<usize> {
  let mut result: Vec<usize> = (0..videos.len()).collect();

  let query = selection.search.trim();
  if !query.is_empty() {
    result = matcher.search(query, videos, &result);
  }

  if !selection.tags.is_empty() {
    result.retain(|&i| selection.tags.iter().any(|tag| videos[i].has_tag(tag)));
  }

  if !selection.public.is_empty() {
    result.retain(|&i| selection.public.contains(&videos[i].channel_public));
  }

  if !selection.channels.is_empty() {
    result.retain(|&i| selection.channels.contains(&videos[i].channel_name));
  }

  if let Some(bucket) = selection.duration {
    result.retain(|&i| bucket.admits(videos[i].video.duration_secs()));
  }

  if selection.sort == SortOrder::Recent {
    // Stable: equal or missing timestamps keep their relative order, missing last.
    result.sort_by(|&a, &b| videos[b].video.published().cmp(&videos[a].video.published()));
  }

  result
}
