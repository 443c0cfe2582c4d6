use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return;
  }

  match app.mode {
    AppMode::Categories => handle_categories_key(app, key),
    AppMode::Feed => handle_feed_key(app, key).await,
    AppMode::Search => handle_search_key(app, key),
    AppMode::Filters => handle_filters_key(app, key),
    AppMode::Modal => handle_modal_key(app, key).await,
  }
}

fn handle_categories_key(app: &mut App, key: event::KeyEvent) {
  let count = app.categories.len();
  match key.code {
    KeyCode::Down | KeyCode::Char('j') if count > 0 => {
      let i = app.category_state.selected().map_or(0, |i| (i + 1) % count);
      app.category_state.select(Some(i));
    }
    KeyCode::Up | KeyCode::Char('k') if count > 0 => {
      let i = app.category_state.selected().map_or(0, |i| if i == 0 { count - 1 } else { i - 1 });
      app.category_state.select(Some(i));
    }
    KeyCode::Enter => {
      if let Some(id) = app.selected_category().map(|c| c.id.clone()) {
        app.open_category(&id);
      }
    }
    KeyCode::Esc | KeyCode::Char('q') => {
      app.should_quit = true;
    }
    _ => {}
  }
}

async fn handle_feed_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => app.select_next(),
    KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
    KeyCode::PageDown => app.page_down(),
    KeyCode::Enter => app.open_modal(),
    KeyCode::Char(' ') | KeyCode::Char('o') => app.play_current().await,
    KeyCode::Char('/') => {
      app.search_cursor = app.session.selection().search.chars().count();
      app.mode = AppMode::Search;
    }
    KeyCode::Char('f') => app.mode = AppMode::Filters,
    KeyCode::Char('d') => app.cycle_duration(),
    KeyCode::Char('r') => app.toggle_recent(),
    KeyCode::Char('x') => app.reset_filters(),
    KeyCode::Esc | KeyCode::Backspace => app.mode = AppMode::Categories,
    KeyCode::Char('q') => app.should_quit = true,
    _ => {}
  }
}

fn handle_search_key(app: &mut App, key: event::KeyEvent) {
  let mut text = app.session.selection().search.clone();
  let len = text.chars().count();
  app.search_cursor = app.search_cursor.min(len);
  match key.code {
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&text, app.search_cursor);
      text.insert(byte_idx, c);
      app.search_cursor += 1;
      app.set_search(&text);
    }
    KeyCode::Backspace => {
      if app.search_cursor > 0 {
        app.search_cursor -= 1;
        let byte_idx = char_to_byte_index(&text, app.search_cursor);
        text.remove(byte_idx);
        app.set_search(&text);
      }
    }
    KeyCode::Delete => {
      if app.search_cursor < len {
        let byte_idx = char_to_byte_index(&text, app.search_cursor);
        text.remove(byte_idx);
        app.set_search(&text);
      }
    }
    KeyCode::Left => {
      app.search_cursor = app.search_cursor.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.search_cursor < len {
        app.search_cursor += 1;
      }
    }
    KeyCode::Home => {
      app.search_cursor = 0;
    }
    KeyCode::End => {
      app.search_cursor = len;
    }
    KeyCode::Enter | KeyCode::Down => {
      app.mode = AppMode::Feed;
    }
    KeyCode::Esc => {
      // Clear the query and return to the feed
      app.search_cursor = 0;
      app.search_scroll = 0;
      app.set_search("");
      app.mode = AppMode::Feed;
    }
    _ => {}
  }
}

fn handle_filters_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Tab | KeyCode::Down | KeyCode::Char('j') => app.next_pill_group(true),
    KeyCode::BackTab | KeyCode::Up | KeyCode::Char('k') => app.next_pill_group(false),
    KeyCode::Right | KeyCode::Char('l') => app.move_pill(true),
    KeyCode::Left | KeyCode::Char('h') => app.move_pill(false),
    KeyCode::Enter | KeyCode::Char(' ') => app.toggle_pill(),
    KeyCode::Char('d') => app.cycle_duration(),
    KeyCode::Char('r') => app.toggle_recent(),
    KeyCode::Char('x') => app.reset_filters(),
    KeyCode::Esc | KeyCode::Char('f') => app.mode = AppMode::Feed,
    _ => {}
  }
}

async fn handle_modal_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('n') => app.modal_step(true),
    KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('p') => app.modal_step(false),
    KeyCode::Tab => app.move_modal_tag(true),
    KeyCode::BackTab => app.move_modal_tag(false),
    KeyCode::Enter => app.filter_by_modal_tag(),
    KeyCode::Char(' ') | KeyCode::Char('o') => app.play_current().await,
    KeyCode::Esc | KeyCode::Char('q') => app.close_modal(),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::feed::tests::channel;
  use crate::loader::{BundleLoader, BundleSource, http_client};
  use crate::paginate::Paginator;
  use crate::player::{Player, PlayerKind};
  use crate::search::FuzzyMatcher;
  use crate::session::FeedSession;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use ratatui::crossterm::event::KeyEvent;
  use std::path::PathBuf;
  use url::Url;

  fn loaded_app() -> App {
    let loader = BundleLoader::new(BundleSource::Dir(PathBuf::from("/nonexistent")), http_client().unwrap());
    let session = FeedSession::new(Paginator::default(), FuzzyMatcher::default(), StdRng::seed_from_u64(5));
    let base = Url::parse("https://edutube.example/").unwrap();
    let mut app = App::new(loader, session, Config::default(), base, Player::new(PlayerKind::Browser));
    app.finish_load("sciences", 0, Ok(vec![channel("a", 3), channel("b", 4)]));
    app.mode = AppMode::Feed;
    app
  }

  fn press(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  // --- char_to_byte_index ---

  #[test]
  fn char_to_byte_ascii() {
    assert_eq!(char_to_byte_index("hello", 0), 0);
    assert_eq!(char_to_byte_index("hello", 3), 3);
    assert_eq!(char_to_byte_index("hello", 5), 5); // past end
  }

  #[test]
  fn char_to_byte_multibyte() {
    let s = "aé日"; // a=1 byte, é=2 bytes, 日=3 bytes
    assert_eq!(char_to_byte_index(s, 0), 0);
    assert_eq!(char_to_byte_index(s, 1), 1);
    assert_eq!(char_to_byte_index(s, 2), 3);
    assert_eq!(char_to_byte_index(s, 3), 6);
  }

  // --- key flows ---

  #[tokio::test]
  async fn typing_a_query_filters_live() {
    let mut app = loaded_app();
    handle_key_event(&mut app, press(KeyCode::Char('/'))).await;
    assert_eq!(app.mode, AppMode::Search);
    for c in "video 2 of b".chars() {
      handle_key_event(&mut app, press(KeyCode::Char(c))).await;
    }
    assert_eq!(app.session.selection().search, "video 2 of b");
    assert_eq!(app.session.all_videos()[app.session.filtered_indices()[0]].video.id, "b-2");

    handle_key_event(&mut app, press(KeyCode::Esc)).await;
    assert_eq!(app.mode, AppMode::Feed);
    assert!(app.session.selection().search.is_empty());
    assert_eq!(app.session.total_count(), 7);
  }

  #[tokio::test]
  async fn filter_mode_toggles_pills() {
    let mut app = loaded_app();
    handle_key_event(&mut app, press(KeyCode::Char('f'))).await;
    // Public → Tags
    handle_key_event(&mut app, press(KeyCode::Tab)).await;
    handle_key_event(&mut app, press(KeyCode::Right)).await;
    handle_key_event(&mut app, press(KeyCode::Enter)).await;
    assert_eq!(app.session.selection().tags, vec!["tag-b".to_string()]);
    assert_eq!(app.session.total_count(), 4);
    handle_key_event(&mut app, press(KeyCode::Char('x'))).await;
    assert!(app.session.selection().is_empty());
  }

  #[tokio::test]
  async fn modal_keys_navigate_and_close() {
    let mut app = loaded_app();
    handle_key_event(&mut app, press(KeyCode::Enter)).await;
    assert_eq!(app.mode, AppMode::Modal);
    handle_key_event(&mut app, press(KeyCode::Right)).await;
    assert_eq!(app.feed_state.selected(), Some(1));
    handle_key_event(&mut app, press(KeyCode::Esc)).await;
    assert_eq!(app.mode, AppMode::Feed);
    assert!(app.modal.is_none());
  }

  #[tokio::test]
  async fn ctrl_c_quits_from_anywhere() {
    let mut app = loaded_app();
    app.mode = AppMode::Search;
    handle_key_event(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)).await;
    assert!(app.should_quit);
  }
}
