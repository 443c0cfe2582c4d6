use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::FilterStore;
use crate::feed::{LoadId, ShuffleCache};
use crate::filter::{self, FilterSelection};
use crate::model::{Channel, VideoWithChannel};
use crate::paginate::{Paginator, Sentinel};
use crate::search::FuzzyMatcher;
use crate::selection::FilterGroup;

/// One category's worth of browsing state: the loaded channels, their
/// shuffled feed, the filter selection and the visible window.
pub struct FeedSession {
  category: Option<String>,
  channels: Vec<Channel>,
  load: LoadId,
  cache: ShuffleCache,
  videos: Arc<Vec<VideoWithChannel>>,
  filtered: Vec<usize>,
  selection: FilterSelection,
  paginator: Paginator,
  sentinel: Sentinel,
  matcher: FuzzyMatcher,
  store: Option<Box<dyn FilterStore + Send>>,
  rng: StdRng,
}

impl Default for FeedSession {
  fn default() -> Self {
    Self::new(Paginator::default(), FuzzyMatcher::default(), StdRng::from_entropy())
  }
}

impl FeedSession {
  pub fn new(paginator: Paginator, matcher: FuzzyMatcher, rng: StdRng) -> Self {
    Self {
      category: None,
      channels: Vec::new(),
      load: LoadId::default(),
      cache: ShuffleCache::new(),
      videos: Arc::new(Vec::new()),
      filtered: Vec::new(),
      selection: FilterSelection::default(),
      paginator,
      sentinel: Sentinel::default(),
      matcher,
      store: None,
      rng,
    }
  }

  /// Attach a durable filter store. The saved selection is read once, here,
  /// and every later change is written back.
  pub fn with_store(mut self, store: Box<dyn FilterStore + Send>) -> Self {
    self.selection = store.load();
    self.store = Some(store);
    self.recompute();
    self
  }

  pub fn remembers_filters(&self) -> bool {
    self.store.is_some()
  }

  /// Install freshly loaded channels for `category`. Reshuffles the feed and
  /// goes back to the first page. Without a filter store the selection is
  /// cleared as well.
  pub fn load(&mut self, category: &str, channels: Vec<Channel>) {
    self.load = self.load.next();
    self.category = Some(category.to_string());
    self.channels = channels;
    self.videos = self.cache.get_or_build(self.load, &self.channels, &mut self.rng);
    if self.store.is_none() {
      self.selection.reset();
    }
    self.paginator.reset();
    self.sentinel.reset();
    self.recompute();
    info!(category, load = self.load.0, channels = self.channels.len(), videos = self.videos.len(), "session: loaded");
  }

  /// Drop all data, e.g. after a failed load.
  pub fn clear(&mut self, category: &str) {
    self.load = self.load.next();
    self.category = Some(category.to_string());
    self.channels.clear();
    self.cache.invalidate();
    self.videos = Arc::new(Vec::new());
    self.paginator.reset();
    self.sentinel.reset();
    self.recompute();
  }

  pub fn category(&self) -> Option<&str> {
    self.category.as_deref()
  }

  pub fn load_id(&self) -> LoadId {
    self.load
  }

  pub fn channels(&self) -> &[Channel] {
    &self.channels
  }

  /// The full feed in its session order.
  pub fn all_videos(&self) -> &[VideoWithChannel] {
    &self.videos
  }

  pub fn selection(&self) -> &FilterSelection {
    &self.selection
  }

  pub fn filtered_indices(&self) -> &[usize] {
    &self.filtered
  }

  pub fn filtered(&self) -> impl Iterator<Item = &VideoWithChannel> {
    self.filtered.iter().map(|&i| &self.videos[i])
  }

  /// The currently shown page(s) of the filtered feed.
  pub fn visible(&self) -> Vec<&VideoWithChannel> {
    let shown = self.paginator.shown(self.filtered.len());
    self.filtered[..shown].iter().map(|&i| &self.videos[i]).collect()
  }

  pub fn visible_count(&self) -> usize {
    self.paginator.shown(self.filtered.len())
  }

  pub fn total_count(&self) -> usize {
    self.filtered.len()
  }

  pub fn has_more(&self) -> bool {
    self.paginator.has_more(self.filtered.len())
  }

  pub fn remaining(&self) -> usize {
    self.paginator.remaining(self.filtered.len())
  }

  pub fn load_more(&mut self) {
    if self.has_more() {
      self.paginator.load_more();
      debug!(visible = self.paginator.visible_count(), total = self.filtered.len(), "session: load more");
    }
  }

  /// Report whether the end-of-list marker is on screen. Loads the next page
  /// when it has just come into view; returns whether it did.
  pub fn observe_sentinel(&mut self, in_view: bool) -> bool {
    if self.sentinel.observe(in_view) && self.has_more() {
      self.load_more();
      return true;
    }
    false
  }

  /// Every tag found on channels or videos, sorted.
  pub fn all_tags(&self) -> Vec<String> {
    let mut tags = BTreeSet::new();
    for channel in &self.channels {
      tags.extend(channel.tags.iter().cloned());
      for video in &channel.videos {
        tags.extend(video.tags.iter().cloned());
      }
    }
    tags.into_iter().collect()
  }

  pub fn all_public(&self) -> Vec<String> {
    self.channels.iter().map(|c| c.public.clone()).collect::<BTreeSet<_>>().into_iter().collect()
  }

  pub fn all_channel_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.channels.iter().map(|c| c.name.clone()).collect();
    names.sort();
    names
  }

  pub fn options(&self, group: FilterGroup) -> Vec<String> {
    match group {
      FilterGroup::Tag => self.all_tags(),
      FilterGroup::Public => self.all_public(),
      FilterGroup::Channel => self.all_channel_names(),
    }
  }

  pub fn find_video(&self, id: &str) -> Option<&VideoWithChannel> {
    self.videos.iter().find(|v| v.video.id == id)
  }

  // --- Selection changes ---

  pub fn toggle(&mut self, group: FilterGroup, value: &str) {
    self.selection.toggle(group, value);
    self.selection_changed();
  }

  pub fn filter_by_tag_only(&mut self, tag: &str) {
    self.selection.filter_by_tag_only(tag);
    self.selection_changed();
  }

  pub fn set_search(&mut self, text: &str) {
    self.selection.set_search(text);
    self.selection_changed();
  }

  pub fn cycle_duration(&mut self) {
    self.selection.cycle_duration();
    self.selection_changed();
  }

  pub fn toggle_recent(&mut self) {
    self.selection.toggle_recent();
    self.selection_changed();
  }

  pub fn reset_filters(&mut self) {
    self.selection.reset();
    self.selection_changed();
  }

  fn selection_changed(&mut self) {
    self.paginator.reset();
    self.sentinel.reset();
    self.recompute();
    if let Some(ref store) = self.store {
      store.save(&self.selection);
    }
  }

  fn recompute(&mut self) {
    self.filtered = filter::apply(&self.videos, &self.selection, &self.matcher);
  }
}
