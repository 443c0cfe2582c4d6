//! `edutube readme`: regenerate the channel table section of a README.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::catalog::{self, SourceCatalog};
use crate::model::Channel;

const HEADING: &str = "## Chaines";

fn cell(text: &str) -> String {
  text.lines().next().unwrap_or("").trim().replace('|', "\\|")
}

/// Markdown for the channel section: one table per non-empty category,
/// channels sorted by name.
pub fn render_section(categories: &[(String, Vec<Channel>)]) -> String {
  let mut lines = vec![HEADING.to_string(), String::new()];
  for (name, channels) in categories {
    if channels.is_empty() {
      continue;
    }
    let mut channels: Vec<&Channel> = channels.iter().collect();
    channels.sort_by_key(|c| c.name.to_lowercase());

    lines.push(format!("### {}", name));
    lines.push(String::new());
    lines.push("| Chaîne | Description |".to_string());
    lines.push("|--------|-------------|".to_string());
    for channel in channels {
      lines.push(format!(
        "| [{}](https://youtube.com/channel/{}) | {} |",
        cell(&channel.name),
        channel.id,
        cell(&channel.description)
      ));
    }
    lines.push(String::new());
  }
  lines.join("\n")
}

/// Put `section` in place of the existing one, or before `## Setup`, or at the end.
pub fn splice(readme: &str, section: &str) -> String {
  if let Some(start) = find_heading(readme, HEADING) {
    let body_start = start + HEADING.len();
    let end = next_heading(readme, body_start).unwrap_or(readme.len());
    let tail = &readme[end..];
    let sep = if tail.is_empty() { "" } else { "\n" };
    return format!("{}{}{}{}", &readme[..start], section, sep, tail);
  }
  if let Some(setup) = find_heading(readme, "## Setup") {
    return format!("{}{}\n{}", &readme[..setup], section, &readme[setup..]);
  }
  let sep = if readme.is_empty() || readme.ends_with('\n') { "" } else { "\n" };
  format!("{}{}\n{}", readme, sep, section)
}

/// Byte offset of a line that is exactly `heading`.
fn find_heading(text: &str, heading: &str) -> Option<usize> {
  let mut offset = 0;
  for line in text.split_inclusive('\n') {
    if line.trim_end() == heading {
      return Some(offset);
    }
    offset += line.len();
  }
  None
}

/// Byte offset of the next level-two heading at or after `from`.
fn next_heading(text: &str, from: usize) -> Option<usize> {
  let mut offset = from;
  for line in text[from..].split_inclusive('\n') {
    if line.starts_with("## ") && offset > from {
      return Some(offset);
    }
    offset += line.len();
  }
  None
}

pub fn run(catalog: &SourceCatalog, data_dir: &Path, readme: &Path) -> Result<()> {
  let mut categories = Vec::new();
  for category in &catalog.categories {
    let mut channels = Vec::new();
    for file in catalog::json_files(&catalog::category_dir(data_dir, &category.id))? {
      channels.push(catalog::read_channel(&file)?);
    }
    categories.push((category.name.clone(), channels));
  }

  let current = match std::fs::read_to_string(readme) {
    Ok(content) => content,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
    Err(e) => return Err(e).with_context(|| format!("Failed to read {}", readme.display())),
  };
  let updated = splice(&current, &render_section(&categories));
  std::fs::write(readme, updated).with_context(|| format!("Failed to write {}", readme.display()))?;
  info!(path = %readme.display(), "readme: channel section updated");
  Ok(())
}
