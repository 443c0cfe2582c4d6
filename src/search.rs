//! Approximate text matching for the search box.
//!
//! Scores run from 0.0 (exact) to 1.0 (nothing in common): the fewest edits
//! turning the query into some substring of the field, divided by the query
//! length. Where that substring sits in the field, even mid-word, does not
//! matter.

use crate::constants::constants;
use crate::model::VideoWithChannel;

#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
  threshold: f64,
}

impl Default for FuzzyMatcher {
  fn default() -> Self {
    Self::new(constants().fuzzy_threshold)
  }
}

/// Lowercase words joined by single spaces.
fn normalize(s: &str) -> String {
  s.split(|c: char| !c.is_alphanumeric())
    .filter(|w| !w.is_empty())
    .map(str::to_lowercase)
    .collect::<Vec<_>>()
    .join(" ")
}

/// Fewest edits from `needle` to any substring of `haystack` (Sellers'
/// semi-global Levenshtein: free leading and trailing text).
fn substring_distance(needle: &[char], haystack: &str) -> usize {
  // column[i]: edits to match needle[..i] ending at the current haystack char
  let mut column: Vec<usize> = (0..=needle.len()).collect();
  let mut best = needle.len();
  for h in haystack.chars() {
    let mut diagonal = column[0];
    column[0] = 0;
    for (i, &n) in needle.iter().enumerate() {
      let substitute = diagonal + usize::from(n != h);
      diagonal = column[i + 1];
      column[i + 1] = substitute.min(column[i] + 1).min(diagonal + 1);
    }
    best = best.min(column[needle.len()]);
    if best == 0 {
      break;
    }
  }
  best
}

impl FuzzyMatcher {
  pub fn new(threshold: f64) -> Self {
    Self { threshold }
  }

  /// Distance between `query` and the best-matching part of `text`.
  pub fn score(&self, query: &str, text: &str) -> f64 {
    let needle: Vec<char> = normalize(query).chars().collect();
    if needle.is_empty() {
      return 1.0;
    }
    let haystack = normalize(text);
    if haystack.is_empty() {
      return 1.0;
    }
    let edits = substring_distance(&needle, &haystack);
    (edits as f64 / needle.len() as f64).min(1.0)
  }

  /// Best score across the searchable fields of a video.
  pub fn score_video(&self, query: &str, video: &VideoWithChannel) -> f64 {
    [video.video.title.as_str(), video.channel_name.as_str(), video.video.description.as_str()]
      .iter()
      .map(|field| self.score(query, field))
      .fold(1.0, f64::min)
  }

  pub fn is_match(&self, score: f64) -> bool {
    score <= self.threshold
  }

  /// Indices into `videos` that match `query`, best match first. Equal scores
  /// keep their input order.
  pub fn search(&self, query: &str, videos: &[VideoWithChannel], candidates: &[usize]) -> Vec<usize> {
    let mut scored: Vec<(usize, f64)> = candidates
      .iter()
      .map(|&i| (i, self.score_video(query, &videos[i])))
      .filter(|(_, score)| self.is_match(*score))
      .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.into_iter().map(|(i, _)| i).collect()
  }
}
