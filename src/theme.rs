use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
  /// Background of an active filter pill.
  pub pill_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "Craie",
    bg: Color::Rgb(250, 248, 242),
    fg: Color::Rgb(52, 58, 64),
    accent: Color::Rgb(38, 120, 178),
    muted: Color::Rgb(134, 142, 150),
    border: Color::Rgb(206, 212, 218),
    highlight_fg: Color::Rgb(255, 255, 255),
    highlight_bg: Color::Rgb(38, 120, 178),
    stripe_bg: Color::Rgb(241, 239, 232),
    status: Color::Rgb(47, 158, 68),
    error: Color::Rgb(224, 49, 49),
    key_fg: Color::Rgb(255, 255, 255),
    key_bg: Color::Rgb(73, 80, 87),
    pill_bg: Color::Rgb(208, 235, 255),
  },
  Theme {
    name: "Tableau",
    bg: Color::Rgb(30, 46, 38),
    fg: Color::Rgb(232, 236, 228),
    accent: Color::Rgb(255, 212, 121),
    muted: Color::Rgb(150, 170, 158),
    border: Color::Rgb(70, 96, 82),
    highlight_fg: Color::Rgb(30, 46, 38),
    highlight_bg: Color::Rgb(255, 212, 121),
    stripe_bg: Color::Rgb(36, 54, 45),
    status: Color::Rgb(170, 220, 160),
    error: Color::Rgb(255, 135, 135),
    key_fg: Color::Rgb(30, 46, 38),
    key_bg: Color::Rgb(150, 170, 158),
    pill_bg: Color::Rgb(70, 96, 82),
  },
  Theme {
    name: "Menthe",
    bg: Color::Rgb(236, 248, 243),
    fg: Color::Rgb(33, 60, 52),
    accent: Color::Rgb(12, 133, 107),
    muted: Color::Rgb(120, 150, 140),
    border: Color::Rgb(180, 220, 205),
    highlight_fg: Color::Rgb(255, 255, 255),
    highlight_bg: Color::Rgb(12, 133, 107),
    stripe_bg: Color::Rgb(224, 242, 235),
    status: Color::Rgb(12, 133, 107),
    error: Color::Rgb(201, 42, 42),
    key_fg: Color::Rgb(255, 255, 255),
    key_bg: Color::Rgb(33, 60, 52),
    pill_bg: Color::Rgb(195, 235, 220),
  },
];

/// Index of the theme called `name`, case-insensitively; the first theme otherwise.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(n))).unwrap_or(0)
}
