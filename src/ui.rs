use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Flex, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, Clear, List, ListItem, Padding, Paragraph, Wrap},
};

use crate::app::{App, AppMode};
use crate::duration::format_clock;
use crate::filter::SortOrder;
use crate::player::embed_url;
use crate::selection::FilterGroup;
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

fn rounded(theme: &Theme, focused: bool) -> Block<'static> {
  Block::bordered()
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(if focused { theme.accent } else { theme.border }))
}

/// `YYYY-MM-DD` of a publish timestamp, or nothing.
fn short_date(published_at: &str) -> String {
  published_at.get(..10).filter(|d| d.len() == 10 && d.as_bytes()[4] == b'-').unwrap_or("").to_string()
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  match app.mode {
    AppMode::Categories => render_categories(frame, app, main_area),
    _ => render_feed(frame, app, main_area),
  }
  render_status(frame, app, status_area);
  render_search(frame, app, input_area);
  render_footer(frame, app, footer_area);

  if app.mode == AppMode::Modal {
    render_modal(frame, app, main_area);
  }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let mut spans = vec![Span::styled(" ▶ edutube ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))];
  if let Some(catalog) = &app.catalog {
    spans.push(Span::styled(catalog.title.clone(), Style::default().fg(theme.fg)));
  }
  if app.mode != AppMode::Categories
    && let Some(category) = app.session.category()
  {
    spans.push(Span::styled(format!("  › {}", app.category_name(category)), Style::default().fg(theme.muted)));
  }
  frame.render_widget(Line::from(spans), area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_categories(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let inner_w = area.width.saturating_sub(4) as usize;

  if app.categories.is_empty() {
    let mut text = vec![Line::from("")];
    if let Some(catalog) = &app.catalog {
      text.push(Line::from(Span::styled(
        catalog.title.clone(),
        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
      )));
      text.push(Line::from(Span::styled(catalog.description.clone(), Style::default().fg(theme.muted))));
      text.push(Line::from(""));
      text.push(Line::from(Span::styled("No categories yet.", Style::default().fg(theme.fg))));
    } else if app.loading {
      text.push(Line::from(Span::styled("Loading the catalog…", Style::default().fg(theme.muted))));
    } else {
      text.push(Line::from(Span::styled("The catalog could not be loaded.", Style::default().fg(theme.error))));
    }
    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(rounded(theme, false));
    frame.render_widget(paragraph, area);
    return;
  }

  let selected = app.category_state.selected();
  let items: Vec<ListItem> = app
    .categories
    .iter()
    .enumerate()
    .map(|(i, category)| {
      let is_selected = Some(i) == selected;
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let counts = format!("{} chaînes · {} vidéos", category.channel_count, category.video_count);
      let name_w = inner_w.saturating_sub(counts.chars().count() + 2);
      let name = truncate_str(&category.name, name_w);
      let gap = inner_w.saturating_sub(name.chars().count() + counts.chars().count());
      let mut lines = vec![Line::from(vec![
        Span::styled(name, Style::default().fg(fg).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(gap)),
        Span::styled(counts, Style::default().fg(theme.muted)),
      ])];
      if let Some(description) = category.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(Line::from(Span::styled(truncate_str(description, inner_w), Style::default().fg(theme.muted))));
      }
      let bg = if i % 2 == 1 { theme.stripe_bg } else { theme.bg };
      ListItem::new(lines).bg(bg)
    })
    .collect();

  let title = app.catalog.as_ref().map_or(" Catégories ".to_string(), |c| format!(" {} ", c.title));
  let list = List::new(items)
    .block(
      rounded(theme, true)
        .title(title)
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));
  frame.render_stateful_widget(list, area, &mut app.category_state);
}

fn render_feed(frame: &mut Frame, app: &mut App, area: Rect) {
  let [pills_area, list_area] = Layout::vertical([Constraint::Length(6), Constraint::Min(3)]).areas(area);
  render_pills(frame, app, pills_area);
  render_list(frame, app, list_area);
}

fn render_pills(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let focused = app.mode == AppMode::Filters;
  let selection = app.session.selection();
  let inner_w = area.width.saturating_sub(4) as usize;

  let lines: Vec<Line> = FilterGroup::ALL
    .iter()
    .map(|&group| {
      let group_focused = focused && group == app.pill_group;
      let label_style = if group_focused {
        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
      } else {
        Style::default().fg(theme.muted)
      };
      let mut spans = vec![Span::styled(format!("{:<8}", group.label()), label_style)];
      let mut used = 8;
      for (i, option) in app.session.options(group).iter().enumerate() {
        let text = format!(" {} ", option);
        used += text.chars().count() + 1;
        if used > inner_w {
          spans.push(Span::styled("…", Style::default().fg(theme.muted)));
          break;
        }
        let style = if group_focused && i == app.pill_index {
          Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD)
        } else if selection.is_selected(group, option) {
          Style::default().fg(theme.fg).bg(theme.pill_bg).add_modifier(Modifier::BOLD)
        } else {
          Style::default().fg(theme.fg)
        };
        spans.push(Span::styled(text, style));
        spans.push(Span::raw(" "));
      }
      Line::from(spans)
    })
    .collect();

  let duration = selection.duration.map_or("toutes", |d| d.label());
  let sort = match selection.sort {
    SortOrder::Shuffled => "aléatoire",
    SortOrder::Recent => "récentes",
  };
  let modifiers = Line::from(vec![
    Span::styled(format!("{:<8}", "Durée"), Style::default().fg(theme.muted)),
    Span::styled(duration, Style::default().fg(theme.fg)),
    Span::styled("   Ordre ", Style::default().fg(theme.muted)),
    Span::styled(sort, Style::default().fg(theme.fg)),
  ]);
  let block = rounded(theme, focused).title(" Filtres ").padding(Padding::horizontal(1));
  let [groups_area, modifiers_area] =
    Layout::vertical([Constraint::Length(3), Constraint::Length(1)]).areas(block.inner(area));
  frame.render_widget(block, area);
  frame.render_widget(Paragraph::new(lines), groups_area);
  frame.render_widget(modifiers, modifiers_area);
}

fn render_list(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;
  app.feed_rows = area.height.saturating_sub(2) as usize;

  let selected = app.feed_state.selected();
  let mut items: Vec<ListItem> = app
    .session
    .visible()
    .into_iter()
    .enumerate()
    .map(|(i, item)| {
      let is_selected = Some(i) == selected;
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if i % 2 == 1 { theme.stripe_bg } else { theme.bg };

      let clock = format_clock(&item.video.duration);
      let date = short_date(&item.video.published_at);
      let right = [item.channel_name.as_str(), clock.as_str(), date.as_str()]
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("  ");
      let right_w = right.chars().count();
      let title = truncate_str(&item.video.title, inner_w.saturating_sub(right_w + 2));
      let gap = inner_w.saturating_sub(title.chars().count() + right_w);
      let line = Line::from(vec![
        Span::styled(title, Style::default().fg(fg)),
        Span::raw(" ".repeat(gap)),
        Span::styled(right, Style::default().fg(theme.muted)),
      ]);
      ListItem::new(line).bg(bg)
    })
    .collect();

  if app.session.has_more() {
    let more = format!("… {} de plus", app.session.remaining());
    items.push(ListItem::new(Line::from(Span::styled(more, Style::default().fg(theme.muted)))));
  }

  let title = if app.loading {
    " Chargement… ".to_string()
  } else {
    format!(
      " {} / {} vidéos · {} chaînes ",
      app.session.visible_count(),
      app.session.total_count(),
      app.session.channels().len()
    )
  };
  let list = List::new(items)
    .block(
      rounded(theme, app.mode == AppMode::Feed)
        .title(title)
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.feed_state);
}

fn render_modal(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let Some(video) = app.modal_video() else { return };
  let [modal_area] = Layout::horizontal([Constraint::Percentage(80)]).flex(Flex::Center).areas(area);
  let [modal_area] = Layout::vertical([Constraint::Percentage(90)]).flex(Flex::Center).areas(modal_area);
  let inner_w = modal_area.width.saturating_sub(4) as usize;

  let label = |s: &'static str| Span::styled(format!("{:<10}", s), Style::default().fg(theme.muted));
  let mut lines = vec![
    Line::from(Span::styled(
      truncate_str(&video.video.title, inner_w),
      Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
    )),
    Line::from(""),
    Line::from(vec![label("Chaîne"), Span::styled(video.channel_name.clone(), Style::default().fg(theme.fg))]),
    Line::from(vec![label("Public"), Span::styled(video.channel_public.clone(), Style::default().fg(theme.fg))]),
  ];
  let clock = format_clock(&video.video.duration);
  if !clock.is_empty() {
    lines.push(Line::from(vec![label("Durée"), Span::styled(clock, Style::default().fg(theme.fg))]));
  }
  let date = short_date(&video.video.published_at);
  if !date.is_empty() {
    lines.push(Line::from(vec![label("Publiée"), Span::styled(date, Style::default().fg(theme.fg))]));
  }

  let tag_index = app.modal.as_ref().map_or(0, |m| m.tag_index);
  let mut tag_spans = vec![label("Tags")];
  for (i, tag) in app.modal_tags().iter().enumerate() {
    let style = if i == tag_index {
      Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg)
    } else {
      Style::default().fg(theme.fg).bg(theme.pill_bg)
    };
    tag_spans.push(Span::styled(format!(" {} ", tag), style));
    tag_spans.push(Span::raw(" "));
  }
  lines.push(Line::from(tag_spans));
  lines.push(Line::from(""));

  lines.push(Line::from(vec![
    label("Lecteur"),
    Span::styled(embed_url(&video.video.id), Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED)),
  ]));
  if let Some(link) = app.share_link() {
    lines.push(Line::from(vec![
      label("Partager"),
      Span::styled(link.to_string(), Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED)),
    ]));
  }
  lines.push(Line::from(""));
  for paragraph in video.video.description.lines() {
    lines.push(Line::from(Span::styled(paragraph.to_string(), Style::default().fg(theme.fg))));
  }

  let prev = if app.has_modal_neighbor(false) { "◀ " } else { "  " };
  let next = if app.has_modal_neighbor(true) { " ▶" } else { "  " };
  let block = rounded(theme, true)
    .title(Line::from(format!(" {}Vidéo{} ", prev, next)).style(Style::default().fg(theme.accent)))
    .padding(Padding::horizontal(1))
    .style(Style::default().bg(theme.bg));

  frame.render_widget(Clear, modal_area);
  frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(block), modal_area);
}

fn render_status(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if app.player.is_playing()
    && let Some(title) = &app.player.now_playing
  {
    (format!(" ♪ {}", title), Style::default().fg(theme.status))
  } else {
    (" Prêt".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_search(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let focused = app.mode == AppMode::Search;
  let border_color = if focused { theme.accent } else { theme.border };
  let input_block = rounded(theme, focused)
    .title(" Rechercher ")
    .title_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let input = app.session.selection().search.clone();
  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&input, app.search_cursor);

  if cursor_col < app.search_scroll {
    app.search_scroll = cursor_col;
  } else if cursor_col >= app.search_scroll + inner_w {
    app.search_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.search_scroll)
    .take_while(|(start, _, _)| *start < app.search_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if focused {
    let cursor_x = area.x + 2 + (cursor_col - app.search_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Categories => vec![("Enter", "Ouvrir"), ("j/k", "Naviguer"), ("^t", "Thème"), ("q", "Quitter")],
    AppMode::Feed => vec![
      ("Enter", "Détails"),
      ("o", "Lire"),
      ("/", "Chercher"),
      ("f", "Filtres"),
      ("d", "Durée"),
      ("r", "Récentes"),
      ("x", "Effacer"),
      ("Esc", "Catégories"),
    ],
    AppMode::Search => vec![("Enter", "Valider"), ("Esc", "Effacer")],
    AppMode::Filters => vec![
      ("Tab", "Groupe"),
      ("←/→", "Déplacer"),
      ("Enter", "Choisir"),
      ("d", "Durée"),
      ("r", "Récentes"),
      ("Esc", "Retour"),
    ],
    AppMode::Modal => vec![
      ("←/→", "Préc./Suiv."),
      ("Tab", "Tag"),
      ("Enter", "Filtrer"),
      ("o", "Lire"),
      ("Esc", "Fermer"),
    ],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}
