//! Drill-down filter navigation.
//!
//! The tag, age-group and channel groups are single-select and mutually
//! exclusive: picking a value in one group clears the other two and the
//! search text, and picking the active value again turns the filter off.
//! Duration and sort order are modifiers layered on top and never clear
//! anything.

use crate::duration::DurationBucket;
use crate::filter::{FilterSelection, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterGroup {
  Tag,
  Public,
  Channel,
}

impl FilterGroup {
  pub const ALL: [FilterGroup; 3] = [FilterGroup::Public, FilterGroup::Tag, FilterGroup::Channel];

  pub fn label(self) -> &'static str {
    match self {
      FilterGroup::Tag => "Tags",
      FilterGroup::Public => "Public",
      FilterGroup::Channel => "Chaînes",
    }
  }
}

impl FilterSelection {
  pub fn group(&self, group: FilterGroup) -> &[String] {
    match group {
      FilterGroup::Tag => &self.tags,
      FilterGroup::Public => &self.public,
      FilterGroup::Channel => &self.channels,
    }
  }

  fn group_mut(&mut self, group: FilterGroup) -> &mut Vec<String> {
    match group {
      FilterGroup::Tag => &mut self.tags,
      FilterGroup::Public => &mut self.public,
      FilterGroup::Channel => &mut self.channels,
    }
  }

  pub fn is_selected(&self, group: FilterGroup, value: &str) -> bool {
    self.group(group).iter().any(|v| v == value)
  }

  /// Select `value` in `group`, or clear the group if it was already the selection.
  pub fn toggle(&mut self, group: FilterGroup, value: &str) {
    let was_selected = self.is_selected(group, value);
    self.search.clear();
    self.tags.clear();
    self.public.clear();
    self.channels.clear();
    if !was_selected {
      self.group_mut(group).push(value.to_string());
    }
  }

  /// Show only videos carrying `tag`, dropping every other filter and the search text.
  pub fn filter_by_tag_only(&mut self, tag: &str) {
    self.search.clear();
    self.tags = vec![tag.to_string()];
    self.public.clear();
    self.channels.clear();
  }

  pub fn set_search(&mut self, text: &str) {
    self.search = text.to_string();
  }

  pub fn cycle_duration(&mut self) {
    self.duration = DurationBucket::cycle(self.duration);
  }

  pub fn toggle_recent(&mut self) {
    self.sort = match self.sort {
      SortOrder::Shuffled => SortOrder::Recent,
      SortOrder::Recent => SortOrder::Shuffled,
    };
  }

  pub fn reset(&mut self) {
    *self = FilterSelection::default();
  }
}
