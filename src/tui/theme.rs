//! Color mapping for series, chrome and status text.

#![allow(missing_docs)]

use std::env;

use crossterm::style::Color;

use crate::chart::registry::ChartColor;

/// Whether ANSI colors are emitted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Enabled,
    Disabled,
}

/// Semantic roles for non-series text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Title,
    Frame,
    Axis,
    Muted,
    Ok,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub color: ColorMode,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            color: ColorMode::Enabled,
        }
    }
}

impl Theme {
    /// `--no-color` wins; otherwise `NO_COLOR` in the environment disables color.
    #[must_use]
    pub fn from_flags(no_color: bool) -> Self {
        Self::resolve(no_color, env::var_os("NO_COLOR").is_some())
    }

    #[must_use]
    pub const fn resolve(no_color_flag: bool, no_color_env: bool) -> Self {
        Self {
            color: if no_color_flag || no_color_env {
                ColorMode::Disabled
            } else {
                ColorMode::Enabled
            },
        }
    }

    #[must_use]
    pub const fn no_color(self) -> bool {
        matches!(self.color, ColorMode::Disabled)
    }

    /// Terminal color for a series.
    ///
    /// Black is drawn as white: the dashboard assumes a dark terminal.
    #[must_use]
    pub const fn series(self, color: ChartColor) -> Color {
        if self.no_color() {
            return Color::Reset;
        }
        match color {
            ChartColor::Black | ChartColor::White => Color::White,
            ChartColor::Blue => Color::Blue,
            ChartColor::Green => Color::Green,
            ChartColor::Red => Color::Red,
            ChartColor::Yellow => Color::Yellow,
            ChartColor::Orange => Color::DarkYellow,
            ChartColor::Magenta => Color::Magenta,
            ChartColor::Purple => Color::DarkMagenta,
            ChartColor::Cyan => Color::Cyan,
            ChartColor::Grey => Color::Grey,
        }
    }

    #[must_use]
    pub const fn role(self, role: Role) -> Color {
        if self.no_color() {
            return Color::Reset;
        }
        match role {
            Role::Title => Color::Cyan,
            Role::Frame | Role::Axis => Color::DarkGrey,
            Role::Muted => Color::Grey,
            Role::Ok => Color::Green,
            Role::Warning => Color::Yellow,
            Role::Danger => Color::Red,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_or_env_disables_color() {
        assert!(Theme::resolve(true, false).no_color());
        assert!(Theme::resolve(false, true).no_color());
        assert!(!Theme::resolve(false, false).no_color());
    }

    #[test]
    fn disabled_theme_resets_every_color() {
        let theme = Theme::resolve(true, false);
        assert_eq!(theme.series(ChartColor::Red), Color::Reset);
        assert_eq!(theme.role(Role::Danger), Color::Reset);
    }

    #[test]
    fn black_series_stays_visible() {
        let theme = Theme::default();
        assert_ne!(theme.series(ChartColor::Black), Color::Black);
        assert_eq!(theme.series(ChartColor::Green), Color::Green);
    }
}
