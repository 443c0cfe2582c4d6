use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::{Child as TokioChild, Command};
use tracing::info;

use crate::constants::constants;
use crate::model::VideoWithChannel;

pub fn watch_url(video_id: &str) -> String {
  format!("{}{}", constants().watch_url, video_id)
}

/// Privacy-enhanced embed address, shown in the detail panel.
pub fn embed_url(video_id: &str) -> String {
  format!("{}{}", constants().embed_url, video_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
  /// Play in an mpv window.
  #[default]
  Mpv,
  /// Hand the watch URL to the system browser.
  Browser,
}

/// Opens videos outside the terminal. At most one mpv process runs at a time.
pub struct Player {
  kind: PlayerKind,
  current_process: Option<TokioChild>,
  pub now_playing: Option<String>,
}

impl Player {
  pub fn new(kind: PlayerKind) -> Self {
    Self { kind, current_process: None, now_playing: None }
  }

  pub fn kind(&self) -> PlayerKind {
    self.kind
  }

  pub fn is_playing(&mut self) -> bool {
    if let Some(child) = self.current_process.as_mut()
      && let Ok(Some(_)) = child.try_wait()
    {
      self.current_process = None;
      self.now_playing = None;
    }
    self.current_process.is_some()
  }

  pub async fn play(&mut self, video: &VideoWithChannel) -> Result<()> {
    let url = watch_url(&video.video.id);
    info!(video = %video.video.id, player = ?self.kind, "player: opening");
    match self.kind {
      PlayerKind::Mpv => {
        self.stop().await.context("Failed to stop previous playback")?;
        let child = Command::new("mpv")
          .args([&format!("--title={}", video.video.title), &url])
          .stdin(Stdio::null())
          .stdout(Stdio::null())
          .stderr(Stdio::null())
          .kill_on_drop(true)
          .spawn()
          .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
              anyhow!("mpv not found. Install it, or run with --player browser")
            } else {
              anyhow!(e).context("Failed to spawn mpv process")
            }
          })?;
        self.current_process = Some(child);
      }
      PlayerKind::Browser => open_in_browser(&url)?,
    }
    self.now_playing = Some(video.video.title.clone());
    Ok(())
  }

  pub async fn stop(&mut self) -> Result<()> {
    if let Some(mut child) = self.current_process.take() {
      child.kill().await.context("Failed to kill mpv process")?;
      let _ = child.wait().await;
    }
    self.now_playing = None;
    Ok(())
  }
}

pub fn open_in_browser(url: &str) -> Result<()> {
  #[cfg(target_os = "macos")]
  let cmd = "open";
  #[cfg(not(target_os = "macos"))]
  let cmd = "xdg-open";
  let mut child = std::process::Command::new(cmd)
    .arg(url)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .spawn()
    .with_context(|| format!("Failed to open browser with {}", cmd))?;
  // Reap in the background so no zombie is left behind.
  std::thread::spawn(move || {
    let _ = child.wait();
  });
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn urls_use_configured_bases() {
    assert_eq!(watch_url("abc"), "https://www.youtube.com/watch?v=abc");
    assert_eq!(embed_url("abc"), "https://www.youtube-nocookie.com/embed/abc");
  }

  #[test]
  fn player_kind_parses_from_config() {
    let kind: PlayerKind = toml::from_str::<std::collections::HashMap<String, PlayerKind>>("p = \"browser\"")
      .unwrap()
      .remove("p")
      .unwrap();
    assert_eq!(kind, PlayerKind::Browser);
    assert_eq!(PlayerKind::default(), PlayerKind::Mpv);
  }

  #[tokio::test]
  async fn idle_player_stops_cleanly() {
    let mut player = Player::new(PlayerKind::Mpv);
    assert!(!player.is_playing());
    player.stop().await.unwrap();
    assert!(player.now_playing.is_none());
  }
}
