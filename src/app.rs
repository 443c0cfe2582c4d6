use ratatui::widgets::ListState;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::deeplink;
use crate::feed;
use crate::loader::{BundleLoader, LoadPoll, PendingLoad};
use crate::model::{CatalogBundle, Category, Channel, VideoWithChannel};
use crate::player::Player;
use crate::selection::FilterGroup;
use crate::session::FeedSession;
use crate::theme::{THEMES, Theme, theme_index};

// --- Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Categories,
  Feed,
  Search,
  Filters,
  Modal,
}

/// The detail panel shown over the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalState {
  pub video_id: String,
  /// Highlighted entry in the panel's tag row.
  pub tag_index: usize,
}

/// In-flight async task receivers.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) catalog_rx: Option<oneshot::Receiver<anyhow::Result<CatalogBundle>>>,
  pub(crate) load: Option<PendingLoad>,
}

pub struct App {
  pub mode: AppMode,
  pub theme_index: usize,
  pub should_quit: bool,
  pub loader: BundleLoader,
  pub catalog: Option<CatalogBundle>,
  /// Catalog categories in home-page order.
  pub categories: Vec<Category>,
  pub category_state: ListState,
  pub session: FeedSession,
  pub feed_state: ListState,
  /// Rows the feed list had on the last draw.
  pub feed_rows: usize,
  pub search_cursor: usize,
  pub search_scroll: usize,
  pub pill_group: FilterGroup,
  pub pill_index: usize,
  pub modal: Option<ModalState>,
  pub share_base: Url,
  pub player: Player,
  pub loading: bool,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  config: Config,
  error_time: Option<Instant>,
  /// Video to open once the next category load lands.
  pending_video: Option<String>,
  /// Category to open once the catalog arrives.
  initial_category: Option<String>,
  load_ticket: u64,
  pub(crate) tasks: AsyncTasks,
}

impl App {
  pub fn new(loader: BundleLoader, session: FeedSession, config: Config, share_base: Url, player: Player) -> Self {
    Self {
      mode: AppMode::Categories,
      theme_index: theme_index(config.theme_name.as_deref()),
      should_quit: false,
      loader,
      catalog: None,
      categories: Vec::new(),
      category_state: ListState::default(),
      session,
      feed_state: ListState::default(),
      feed_rows: 0,
      search_cursor: 0,
      search_scroll: 0,
      pill_group: FilterGroup::ALL[0],
      pill_index: 0,
      modal: None,
      share_base,
      player,
      loading: false,
      last_error: None,
      status_message: None,
      config,
      error_time: None,
      pending_video: None,
      initial_category: None,
      load_ticket: 0,
      tasks: AsyncTasks::default(),
    }
  }

  /// Open `category` as soon as the catalog is in, and then `video` once its feed is.
  pub fn with_deep_link(mut self, category: Option<String>, video: Option<String>) -> Self {
    self.initial_category = category;
    self.pending_video = video;
    self
  }

  pub fn theme(&self) -> &'static Theme {
    // theme_index only ever comes from theme_index() or modular arithmetic.
    &THEMES[self.theme_index % THEMES.len()]
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after 5 seconds.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.clear_error();
    }
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.save();
  }

  // --- Loading ---

  /// Kick off the catalog fetch.
  pub fn start(&mut self) {
    let loader = self.loader.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(loader.catalog().await);
    });
    self.tasks.catalog_rx = Some(rx);
    self.loading = true;
    self.status_message = Some(format!("Loading catalog from {}…", self.loader.source().describe()));
    info!(source = %self.loader.source().describe(), "app: loading catalog");
  }

  pub fn apply_catalog(&mut self, bundle: CatalogBundle) {
    let mut categories = bundle.categories.clone();
    feed::shuffle(&mut categories, &mut rand::thread_rng());
    info!(title = %bundle.title, categories = categories.len(), "app: catalog loaded");
    self.category_state.select(if categories.is_empty() { None } else { Some(0) });
    self.categories = categories;
    self.catalog = Some(bundle);

    if let Some(id) = self.initial_category.take() {
      if let Some(pos) = self.categories.iter().position(|c| c.id == id) {
        self.category_state.select(Some(pos));
      }
      self.open_category(&id);
    }
  }

  pub fn selected_category(&self) -> Option<&Category> {
    self.category_state.selected().and_then(|i| self.categories.get(i))
  }

  pub fn category_name(&self, id: &str) -> String {
    self.categories.iter().find(|c| c.id == id).map_or_else(|| id.to_string(), |c| c.name.clone())
  }

  /// Start loading a category's channels. Any load still in flight is superseded.
  pub fn open_category(&mut self, id: &str) {
    self.load_ticket += 1;
    self.loading = true;
    self.clear_error();
    self.status_message = Some(format!("Loading {}…", self.category_name(id)));
    self.tasks.load = Some(PendingLoad::spawn(&self.loader, id, self.load_ticket));
    self.modal = None;
    self.feed_state.select(None);
    self.mode = AppMode::Feed;
  }

  /// Install the outcome of a channel load. Outcomes for anything but the
  /// latest request are dropped.
  pub fn finish_load(&mut self, category: &str, ticket: u64, result: anyhow::Result<Vec<Channel>>) {
    if ticket != self.load_ticket {
      info!(category, ticket, latest = self.load_ticket, "app: discarding stale load result");
      return;
    }
    self.loading = false;
    self.status_message = None;
    match result {
      Ok(channels) => {
        self.session.load(category, channels);
        info!(
          category,
          load = self.session.load_id().0,
          videos = self.session.all_videos().len(),
          "app: category loaded"
        );
        self.reset_feed_selection();
        if let Some(video_id) = self.pending_video.take() {
          if self.session.find_video(&video_id).is_some() {
            self.open_modal_for(&video_id);
          } else {
            warn!(video = %video_id, category, "app: linked video not in category");
            self.set_error(format!("Video not found: {}", video_id));
          }
        }
      }
      Err(e) => {
        warn!(category, err = %format!("{:#}", e), "app: category load failed");
        self.session.clear(category);
        self.reset_feed_selection();
        self.set_error(format!("Failed to load {}: {:#}", self.category_name(category), e));
      }
    }
  }

  pub fn check_pending(&mut self) {
    if let Some(mut rx) = self.tasks.catalog_rx.take() {
      match rx.try_recv() {
        Ok(Ok(bundle)) => {
          self.loading = false;
          self.status_message = None;
          self.apply_catalog(bundle);
        }
        Ok(Err(e)) => {
          self.loading = false;
          self.status_message = None;
          warn!(err = %format!("{:#}", e), "app: catalog load failed");
          self.set_error(format!("Failed to load catalog: {:#}", e));
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.catalog_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.loading = false;
          self.status_message = None;
          self.set_error("Catalog task failed.".to_string());
        }
      }
    }

    if let Some(pending) = self.tasks.load.take() {
      match pending.poll() {
        LoadPoll::Pending(p) => self.tasks.load = Some(p),
        LoadPoll::Ready { category, ticket, result } => self.finish_load(&category, ticket, result),
        LoadPoll::Lost { category, ticket } => {
          self.finish_load(&category, ticket, Err(anyhow::anyhow!("Load task failed")));
        }
      }
    }
  }

  // --- Feed ---

  fn reset_feed_selection(&mut self) {
    *self.feed_state.offset_mut() = 0;
    self.feed_state.select(if self.session.visible_count() > 0 { Some(0) } else { None });
  }

  /// The selection or search changed: back to the top of the new result.
  pub fn after_filter_change(&mut self) {
    self.reset_feed_selection();
    self.pill_index = self.pill_index.min(self.session.options(self.pill_group).len().saturating_sub(1));
  }

  pub fn selected_video(&self) -> Option<&VideoWithChannel> {
    let i = self.feed_state.selected()?;
    let &idx = self.session.filtered_indices().get(i)?;
    if i >= self.session.visible_count() {
      return None;
    }
    self.session.all_videos().get(idx)
  }

  pub fn select_next(&mut self) {
    let count = self.session.visible_count();
    if count == 0 {
      return;
    }
    let i = self.feed_state.selected().map_or(0, |i| (i + 1).min(count - 1));
    self.feed_state.select(Some(i));
    self.sync_sentinel();
  }

  pub fn select_prev(&mut self) {
    if self.session.visible_count() == 0 {
      return;
    }
    let i = self.feed_state.selected().map_or(0, |i| i.saturating_sub(1));
    self.feed_state.select(Some(i));
  }

  pub fn page_down(&mut self) {
    for _ in 0..self.feed_rows.max(1) {
      self.select_next();
    }
  }

  /// Whether the end of the shown list is inside the viewport.
  pub fn sentinel_in_view(&self) -> bool {
    let count = self.session.visible_count();
    if count == 0 || self.feed_rows == 0 {
      return false;
    }
    let offset = self.feed_state.offset();
    let last_shown = self.feed_state.selected().map_or(offset, |s| s.max(offset));
    offset + self.feed_rows >= count || last_shown + 1 >= count
  }

  /// Feed the sentinel with the current viewport; grows the list on entry.
  pub fn sync_sentinel(&mut self) {
    let in_view = self.sentinel_in_view();
    if self.session.observe_sentinel(in_view) {
      debug!(visible = self.session.visible_count(), "app: sentinel loaded another page");
    }
  }

  // --- Filters ---

  pub fn pill_options(&self) -> Vec<String> {
    self.session.options(self.pill_group)
  }

  pub fn next_pill_group(&mut self, forward: bool) {
    let groups = FilterGroup::ALL;
    let i = groups.iter().position(|g| *g == self.pill_group).unwrap_or(0);
    let next = if forward { (i + 1) % groups.len() } else { (i + groups.len() - 1) % groups.len() };
    self.pill_group = groups[next];
    self.pill_index = 0;
  }

  pub fn move_pill(&mut self, forward: bool) {
    let count = self.pill_options().len();
    if count == 0 {
      return;
    }
    self.pill_index = if forward { (self.pill_index + 1) % count } else { (self.pill_index + count - 1) % count };
  }

  pub fn toggle_pill(&mut self) {
    let Some(value) = self.pill_options().get(self.pill_index).cloned() else { return };
    self.session.toggle(self.pill_group, &value);
    self.search_cursor = 0;
    self.search_scroll = 0;
    self.after_filter_change();
  }

  pub fn set_search(&mut self, text: &str) {
    self.session.set_search(text);
    self.after_filter_change();
  }

  pub fn cycle_duration(&mut self) {
    self.session.cycle_duration();
    self.after_filter_change();
  }

  pub fn toggle_recent(&mut self) {
    self.session.toggle_recent();
    self.after_filter_change();
  }

  pub fn reset_filters(&mut self) {
    self.session.reset_filters();
    self.search_cursor = 0;
    self.search_scroll = 0;
    self.after_filter_change();
  }

  // --- Modal ---

  pub fn open_modal(&mut self) {
    let Some(id) = self.selected_video().map(|v| v.video.id.clone()) else { return };
    self.open_modal_for(&id);
  }

  fn open_modal_for(&mut self, video_id: &str) {
    info!(video = video_id, "app: opening detail panel");
    self.modal = Some(ModalState { video_id: video_id.to_string(), tag_index: 0 });
    self.mode = AppMode::Modal;
  }

  pub fn close_modal(&mut self) {
    self.modal = None;
    self.mode = AppMode::Feed;
  }

  pub fn modal_video(&self) -> Option<&VideoWithChannel> {
    self.modal.as_ref().and_then(|m| self.session.find_video(&m.video_id))
  }

  /// Tags shown in the panel: the video's own, then its channel's.
  pub fn modal_tags(&self) -> Vec<String> {
    let Some(video) = self.modal_video() else { return Vec::new() };
    let mut tags = video.video.tags.clone();
    for tag in &video.channel_tags {
      if !tags.contains(tag) {
        tags.push(tag.clone());
      }
    }
    tags
  }

  /// Share link of the open video.
  pub fn share_link(&self) -> Option<Url> {
    self.modal.as_ref().map(|m| deeplink::with_video_param(&self.share_base, &m.video_id))
  }

  /// Position of the open video within the filtered feed.
  fn modal_position(&self) -> Option<usize> {
    let id = &self.modal.as_ref()?.video_id;
    self.session.filtered().position(|v| &v.video.id == id)
  }

  pub fn has_modal_neighbor(&self, forward: bool) -> bool {
    match self.modal_position() {
      Some(pos) if forward => pos + 1 < self.session.total_count(),
      Some(pos) => pos > 0,
      None => false,
    }
  }

  /// Move the panel to the next or previous video of the filtered feed,
  /// keeping the list selection on it.
  pub fn modal_step(&mut self, forward: bool) {
    if !self.has_modal_neighbor(forward) {
      return;
    }
    let Some(pos) = self.modal_position() else { return };
    let target = if forward { pos + 1 } else { pos - 1 };
    while target >= self.session.visible_count() && self.session.has_more() {
      self.session.load_more();
    }
    let Some(&idx) = self.session.filtered_indices().get(target) else { return };
    let Some(id) = self.session.all_videos().get(idx).map(|v| v.video.id.clone()) else { return };
    self.feed_state.select(Some(target));
    self.modal = Some(ModalState { video_id: id, tag_index: 0 });
  }

  pub fn move_modal_tag(&mut self, forward: bool) {
    let count = self.modal_tags().len();
    if let Some(modal) = self.modal.as_mut()
      && count > 0
    {
      modal.tag_index = if forward { (modal.tag_index + 1) % count } else { (modal.tag_index + count - 1) % count };
    }
  }

  /// Narrow the feed to the highlighted tag and close the panel.
  pub fn filter_by_modal_tag(&mut self) {
    let tags = self.modal_tags();
    let Some(tag) = self.modal.as_ref().and_then(|m| tags.get(m.tag_index)).cloned() else { return };
    self.session.filter_by_tag_only(&tag);
    self.search_cursor = 0;
    self.search_scroll = 0;
    self.close_modal();
    self.after_filter_change();
  }

  /// Open the highlighted video (or the panel's) in the external player.
  pub async fn play_current(&mut self) {
    let video = if self.mode == AppMode::Modal { self.modal_video() } else { self.selected_video() };
    let Some(video) = video.cloned() else { return };
    match self.player.play(&video).await {
      Ok(()) => self.status_message = None,
      Err(e) => self.set_error(format!("Playback error: {:#}", e)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::feed::tests::channel;
  use crate::loader::{BundleSource, http_client};
  use crate::paginate::Paginator;
  use crate::player::PlayerKind;
  use crate::search::FuzzyMatcher;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use std::path::PathBuf;

  fn app_at(dir: PathBuf) -> App {
    let loader = BundleLoader::new(BundleSource::Dir(dir), http_client().unwrap());
    let session = FeedSession::new(Paginator::default(), FuzzyMatcher::default(), StdRng::seed_from_u64(7));
    let base = Url::parse("https://edutube.example/").unwrap();
    App::new(loader, session, Config::default(), base, Player::new(PlayerKind::Browser))
  }

  fn app() -> App {
    app_at(PathBuf::from("/nonexistent"))
  }

  /// Loaded app with 3 channels of 5, 0 and 7 videos.
  fn loaded() -> App {
    let mut app = app();
    app.load_ticket = 1;
    app.finish_load("sciences", 1, Ok(vec![channel("a", 5), channel("b", 0), channel("c", 7)]));
    app
  }

  #[test]
  fn load_fills_feed_and_selects_first() {
    let app = loaded();
    assert_eq!(app.session.total_count(), 12);
    assert_eq!(app.session.visible_count(), 12);
    assert_eq!(app.feed_state.selected(), Some(0));
    assert!(!app.loading);
  }

  #[test]
  fn stale_load_results_are_ignored() {
    let mut app = loaded();
    app.load_ticket = 3;
    app.finish_load("arts", 2, Ok(vec![channel("z", 30)]));
    assert_eq!(app.session.category(), Some("sciences"));
    assert_eq!(app.session.total_count(), 12);
  }

  #[test]
  fn failed_load_empties_feed_and_reports() {
    let mut app = loaded();
    app.load_ticket = 2;
    app.finish_load("arts", 2, Err(anyhow::anyhow!("Category not found: arts")));
    assert_eq!(app.session.total_count(), 0);
    assert_eq!(app.feed_state.selected(), None);
    assert!(app.last_error.as_deref().unwrap().contains("Category not found"));
    assert!(!app.loading);
  }

  #[test]
  fn deep_linked_video_opens_after_load() {
    let mut app = app().with_deep_link(None, Some("c-3".into()));
    app.load_ticket = 1;
    app.finish_load("sciences", 1, Ok(vec![channel("c", 7)]));
    assert_eq!(app.mode, AppMode::Modal);
    assert_eq!(app.share_link().unwrap().as_str(), "https://edutube.example/?v=c-3");
    app.close_modal();
    assert_eq!(app.share_link(), None);
  }

  #[test]
  fn unknown_deep_link_sets_error() {
    let mut app = app().with_deep_link(None, Some("nope".into()));
    app.load_ticket = 1;
    app.finish_load("sciences", 1, Ok(vec![channel("c", 2)]));
    assert_eq!(app.mode, AppMode::Categories);
    assert!(app.last_error.is_some());
  }

  #[test]
  fn modal_navigation_follows_filtered_feed() {
    let mut app = loaded();
    app.open_modal();
    let first = app.modal.clone().unwrap().video_id;
    assert!(!app.has_modal_neighbor(false));
    app.modal_step(true);
    assert_ne!(app.modal.as_ref().unwrap().video_id, first);
    assert_eq!(app.feed_state.selected(), Some(1));
    app.modal_step(false);
    assert_eq!(app.modal.as_ref().unwrap().video_id, first);
  }

  #[test]
  fn modal_step_pages_in_beyond_visible_window() {
    let mut app = app();
    app.load_ticket = 1;
    app.finish_load("big", 1, Ok(vec![channel("a", 25)]));
    assert_eq!(app.session.visible_count(), 20);
    app.feed_state.select(Some(19));
    app.open_modal();
    app.modal_step(true);
    assert_eq!(app.session.visible_count(), 25);
    assert_eq!(app.feed_state.selected(), Some(20));
  }

  #[test]
  fn tag_in_modal_filters_feed() {
    let mut app = loaded();
    app.open_modal();
    let tags = app.modal_tags();
    assert_eq!(tags.len(), 1);
    app.filter_by_modal_tag();
    assert_eq!(app.mode, AppMode::Feed);
    assert_eq!(app.session.selection().tags, tags);
    assert!(app.session.total_count() > 0);
    assert!(app.session.filtered().all(|v| v.has_tag(&tags[0])));
  }

  #[test]
  fn sentinel_grows_list_once_per_entry() {
    let mut app = app();
    app.load_ticket = 1;
    app.finish_load("big", 1, Ok(vec![channel("a", 50)]));
    app.feed_rows = 10;
    for _ in 0..19 {
      app.select_next();
    }
    assert_eq!(app.session.visible_count(), 40);
    // Still at the same spot: no second page.
    app.sync_sentinel();
    assert_eq!(app.session.visible_count(), 40);
  }

  #[test]
  fn pills_toggle_and_clamp() {
    let mut app = loaded();
    app.pill_group = FilterGroup::Channel;
    app.pill_index = 0;
    app.toggle_pill();
    assert_eq!(app.session.total_count(), 5);
    app.toggle_pill();
    assert_eq!(app.session.total_count(), 12);
    app.next_pill_group(false);
    assert_eq!(app.pill_group, FilterGroup::Tag);
  }

  #[tokio::test]
  async fn opening_a_category_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("channels")).unwrap();
    let bundle = serde_json::to_string(&vec![channel("a", 3)]).unwrap();
    std::fs::write(dir.path().join("channels/sciences.json"), bundle).unwrap();
    std::fs::write(
      dir.path().join("catalog.json"),
      r#"{"title":"EduTube","description":"","categories":[{"id":"sciences","name":"Sciences"}]}"#,
    )
    .unwrap();

    let mut app = app_at(dir.path().to_path_buf()).with_deep_link(Some("sciences".into()), None);
    app.start();
    for _ in 0..200 {
      app.check_pending();
      if app.catalog.is_some() && !app.loading {
        break;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(app.categories.len(), 1);
    assert_eq!(app.session.total_count(), 3);
    assert_eq!(app.mode, AppMode::Feed);
  }
}
