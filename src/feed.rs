use rand::Rng;
use std::sync::Arc;
use tracing::debug;

use crate::model::{Channel, VideoWithChannel};

/// Identifies one load of channel data. Each successful load gets a fresh id,
/// which is what invalidates the shuffle cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LoadId(pub u64);

impl LoadId {
  pub fn next(self) -> Self {
    LoadId(self.0 + 1)
  }
}

/// Flatten channels into one list, channel by channel, each video keeping a
/// snapshot of its channel.
pub fn flatten(channels: &[Channel]) -> Vec<VideoWithChannel> {
  channels
    .iter()
    .flat_map(|channel| channel.videos.iter().map(move |video| VideoWithChannel::new(video, channel)))
    .collect()
}

/// Fisher-Yates: uniform permutation in place.
pub fn shuffle<T, R: Rng>(items: &mut [T], rng: &mut R) {
  for i in (1..items.len()).rev() {
    let j = rng.gen_range(0..=i);
    items.swap(i, j);
  }
}

/// Holds the shuffled feed for the current load so filters and redraws keep
/// seeing the same order.
#[derive(Debug, Default)]
pub struct ShuffleCache {
  entry: Option<(LoadId, Arc<Vec<VideoWithChannel>>)>,
}

impl ShuffleCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// The shuffled feed for `load`, building it on first use.
  pub fn get_or_build<R: Rng>(
    &mut self,
    load: LoadId,
    channels: &[Channel],
    rng: &mut R,
  ) -> Arc<Vec<VideoWithChannel>> {
    if let Some((cached, ref videos)) = self.entry
      && cached == load
    {
      return Arc::clone(videos);
    }
    let mut videos = flatten(channels);
    shuffle(&mut videos, rng);
    debug!(load = load.0, videos = videos.len(), "feed: shuffled");
    let videos = Arc::new(videos);
    self.entry = Some((load, Arc::clone(&videos)));
    videos
  }

  pub fn invalidate(&mut self) {
    self.entry = None;
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::model::Video;
  use rand::SeedableRng;
  use rand::rngs::StdRng;

  pub(crate) fn channel(id: &str, videos: usize) -> Channel {
    Channel {
      id: id.to_string(),
      name: format!("Channel {}", id),
      description: String::new(),
      thumbnail: format!("https://img/{}.jpg", id),
      public: "tout public".to_string(),
      language: "fr".to_string(),
      tags: vec![format!("tag-{}", id)],
      videos: (0..videos)
        .map(|i| Video { id: format!("{}-{}", id, i), title: format!("Video {} of {}", i, id), ..Default::default() })
        .collect(),
      handle: None,
    }
  }

  #[test]
  fn flatten_keeps_channel_order_and_snapshots() {
    let channels = vec![channel("a", 2), channel("b", 1)];
    let feed = flatten(&channels);
    let ids: Vec<&str> = feed.iter().map(|v| v.video.id.as_str()).collect();
    assert_eq!(ids, vec!["a-0", "a-1", "b-0"]);
    assert_eq!(feed[2].channel_id, "b");
    assert_eq!(feed[2].channel_name, "Channel b");
    assert_eq!(feed[2].channel_thumbnail, "https://img/b.jpg");
    assert_eq!(feed[2].channel_tags, vec!["tag-b".to_string()]);
  }

  #[test]
  fn feed_length_is_sum_of_channel_videos() {
    let channels = vec![channel("a", 5), channel("b", 0), channel("c", 7)];
    let mut cache = ShuffleCache::new();
    let mut rng = StdRng::seed_from_u64(7);
    let feed = cache.get_or_build(LoadId(1), &channels, &mut rng);
    assert_eq!(feed.len(), 12);
    for item in feed.iter() {
      let owner = channels.iter().find(|c| c.videos.iter().any(|v| v.id == item.video.id)).unwrap();
      assert_eq!(item.channel_id, owner.id);
      assert_eq!(item.channel_public, owner.public);
    }
  }

  #[test]
  fn shuffle_is_a_permutation() {
    let mut items: Vec<u32> = (0..100).collect();
    let mut rng = StdRng::seed_from_u64(42);
    shuffle(&mut items, &mut rng);
    let mut sorted = items.clone();
    sorted.sort();
    assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    assert_ne!(items, sorted);
  }

  #[test]
  fn cache_is_stable_within_a_load() {
    let channels = vec![channel("a", 20), channel("b", 20)];
    let mut cache = ShuffleCache::new();
    let mut rng = StdRng::seed_from_u64(1);
    let first = cache.get_or_build(LoadId(1), &channels, &mut rng);
    let second = cache.get_or_build(LoadId(1), &channels, &mut rng);
    assert!(Arc::ptr_eq(&first, &second));
  }

  #[test]
  fn new_load_reshuffles() {
    let channels = vec![channel("a", 30)];
    let mut cache = ShuffleCache::new();
    let mut rng = StdRng::seed_from_u64(3);
    let first = cache.get_or_build(LoadId(1), &channels, &mut rng);
    let second = cache.get_or_build(LoadId(2), &channels, &mut rng);
    assert!(!Arc::ptr_eq(&first, &second));
    cache.invalidate();
    let third = cache.get_or_build(LoadId(2), &channels, &mut rng);
    assert!(!Arc::ptr_eq(&second, &third));
  }
}
