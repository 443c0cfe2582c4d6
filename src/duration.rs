//! ISO-8601 durations as the video platform reports them (`PT1H2M3S`).
//!
//! Parsing never fails: anything that does not look like a duration counts as
//! zero seconds, so unknown lengths always pass the "under N minutes" filters.

use crate::constants::constants;

/// Total seconds in an ISO-8601 duration, or 0 when the string is empty or malformed.
///
/// Accepts any subset of day/hour/minute/second components (`P1DT2H`, `PT45S`, `PT3M`).
/// Fractional seconds are truncated.
pub fn parse_iso8601(input: &str) -> u64 {
  try_parse(input.trim()).unwrap_or(0)
}

fn try_parse(s: &str) -> Option<u64> {
  let rest = s.strip_prefix('P')?;
  let (date_part, time_part) = match rest.split_once('T') {
    Some((d, t)) => (d, Some(t)),
    None => (rest, None),
  };

  let mut total = 0u64;
  let mut seen_any = false;

  for (value, unit) in components(date_part)? {
    let secs = match unit {
      'D' => 86_400,
      'W' => 7 * 86_400,
      _ => return None,
    };
    total = total.checked_add(value.checked_mul(secs)?)?;
    seen_any = true;
  }

  if let Some(time) = time_part {
    if time.is_empty() {
      return None;
    }
    for (value, unit) in components(time)? {
      let secs = match unit {
        'H' => 3600,
        'M' => 60,
        'S' => 1,
        _ => return None,
      };
      total = total.checked_add(value.checked_mul(secs)?)?;
      seen_any = true;
    }
  }

  seen_any.then_some(total)
}

/// Split `1H2M3.5S` into `[(1, 'H'), (2, 'M'), (3, 'S')]`.
fn components(s: &str) -> Option<Vec<(u64, char)>> {
  let mut out = Vec::new();
  let mut digits = String::new();
  let mut fraction = false;
  for c in s.chars() {
    match c {
      '0'..='9' => {
        if !fraction {
          digits.push(c);
        }
      }
      '.' | ',' if !digits.is_empty() && !fraction => fraction = true,
      'A'..='Z' if !digits.is_empty() => {
        out.push((digits.parse().ok()?, c));
        digits.clear();
        fraction = false;
      }
      _ => return None,
    }
  }
  digits.is_empty().then_some(out)
}

/// `3723` → `1:02:03`, `190` → `3:10`. Empty for zero-length or unknown durations.
pub fn format_clock(input: &str) -> String {
  let total = parse_iso8601(input);
  if total == 0 {
    return String::new();
  }
  let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
  if h > 0 { format!("{}:{:02}:{:02}", h, m, s) } else { format!("{}:{:02}", m, s) }
}

/// Length filter offered next to the tag pills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DurationBucket {
  /// Under 5 minutes.
  #[serde(rename = "5min")]
  #[value(name = "5min")]
  Short,
  /// Under 30 minutes.
  #[serde(rename = "30min")]
  #[value(name = "30min")]
  Medium,
}

impl DurationBucket {
  pub fn max_secs(self) -> u64 {
    match self {
      DurationBucket::Short => constants().short_duration_secs,
      DurationBucket::Medium => constants().medium_duration_secs,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      DurationBucket::Short => "< 5 min",
      DurationBucket::Medium => "< 30 min",
    }
  }

  pub fn admits(self, secs: u64) -> bool {
    secs < self.max_secs()
  }

  /// Cycle used by the browser key binding: none → 5 min → 30 min → none.
  pub fn cycle(current: Option<Self>) -> Option<Self> {
    match current {
      None => Some(DurationBucket::Short),
      Some(DurationBucket::Short) => Some(DurationBucket::Medium),
      Some(DurationBucket::Medium) => None,
    }
  }
}
