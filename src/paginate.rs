use crate::constants::constants;

/// Growing window over the filtered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
  page_size: usize,
  visible: usize,
}

impl Default for Paginator {
  fn default() -> Self {
    Self::new(constants().page_size)
  }
}

impl Paginator {
  pub fn new(page_size: usize) -> Self {
    let page_size = page_size.max(1);
    Self { page_size, visible: page_size }
  }

  pub fn visible_count(&self) -> usize {
    self.visible
  }

  pub fn load_more(&mut self) {
    self.visible += self.page_size;
  }

  pub fn has_more(&self, total: usize) -> bool {
    self.visible < total
  }

  /// Items of a `total`-long list not shown yet.
  pub fn remaining(&self, total: usize) -> usize {
    total.saturating_sub(self.visible)
  }

  /// How many items of a `total`-long list are on screen.
  pub fn shown(&self, total: usize) -> usize {
    self.visible.min(total)
  }

  /// Back to the first page, after the query or a filter changed.
  pub fn reset(&mut self) {
    self.visible = self.page_size;
  }
}

/// Edge detector for the "end of list" marker: reports `true` only when the
/// marker enters view, not while it stays there.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sentinel {
  in_view: bool,
}

impl Sentinel {
  pub fn observe(&mut self, in_view: bool) -> bool {
    let entered = in_view && !self.in_view;
    self.in_view = in_view;
    entered
  }

  pub fn reset(&mut self) {
    self.in_view = false;
  }
}
