//! Color theme system for revtree.
//!
//! A `Theme` holds named `ratatui::style::Color` fields covering every UI surface
//! revtree renders. Two built-in themes are provided:
//!
//! - `dark`: ANSI 16 colors only, so it works on any terminal including
//!   256-color SSH sessions with no truecolor support.
//! - `catppuccin_mocha`: the Catppuccin Mocha palette in RGB; requires truecolor.

use ratatui::style::Color;

/// All color values used across revtree's UI surfaces.
#[derive(Debug, Clone)]
pub struct Theme {
    // Panel borders
    /// Border color for the panel receiving keys.
    pub border_active: Color,
    /// Border color for the other panels and dimmed labels.
    pub border_inactive: Color,

    // File tree
    /// File status: newly added.
    pub file_added: Color,
    /// File status: deleted.
    pub file_removed: Color,
    /// File status: modified.
    pub file_modified: Color,

    // Review markers
    /// `[x]`: every file below is reviewed.
    pub marker_checked: Color,
    /// `[-]`: some files below are reviewed.
    pub marker_partial: Color,
    /// `[ ]`
    pub marker_unchecked: Color,
    /// `[?]`: reviewed flags still loading. Also used for status messages.
    pub marker_pending: Color,

    // Status bar
    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
    /// Mode indicator color in NORMAL mode.
    pub status_mode_normal: Color,
    /// Mode indicator color while the help overlay is open.
    pub status_mode_help: Color,
}

impl Theme {
    /// Returns the built-in dark theme using ANSI 16 colors.
    pub fn dark() -> Self {
        Self {
            border_active: Color::Cyan,
            border_inactive: Color::DarkGray,

            file_added: Color::Green,
            file_removed: Color::Red,
            file_modified: Color::Yellow,

            marker_checked: Color::Green,
            marker_partial: Color::Yellow,
            marker_unchecked: Color::Reset,
            marker_pending: Color::Magenta,

            status_bar_bg: Color::DarkGray,
            status_bar_fg: Color::White,
            status_mode_normal: Color::Cyan,
            status_mode_help: Color::Green,
        }
    }

    /// Returns the Catppuccin Mocha theme using RGB truecolor values.
    ///
    /// Palette source: <https://github.com/catppuccin/catppuccin> Mocha variant.
    pub fn catppuccin_mocha() -> Self {
        let green = Color::Rgb(166, 227, 161); // #a6e3a1
        let red = Color::Rgb(243, 139, 168); // #f38ba8
        let yellow = Color::Rgb(249, 226, 175); // #f9e2af
        let mauve = Color::Rgb(203, 166, 247); // #cba6f7
        let peach = Color::Rgb(250, 179, 135); // #fab387
        let lavender = Color::Rgb(180, 190, 254); // #b4befe
        let overlay1 = Color::Rgb(127, 132, 156); // #7f849c
        let surface1 = Color::Rgb(69, 71, 90); // #45475a
        let text = Color::Rgb(205, 214, 244); // #cdd6f4

        Self {
            border_active: lavender,
            border_inactive: overlay1,

            file_added: green,
            file_removed: red,
            file_modified: yellow,

            marker_checked: green,
            marker_partial: peach,
            marker_unchecked: text,
            marker_pending: mauve,

            status_bar_bg: surface1,
            status_bar_fg: text,
            status_mode_normal: lavender,
            status_mode_help: green,
        }
    }

    /// Resolves a theme name from the config file to a built-in theme.
    ///
    /// Unknown names fall back to `dark()` so a typo in config never prevents
    /// startup.
    pub fn from_name(name: &str) -> Self {
        match name {
            "catppuccin-mocha" | "catppuccin_mocha" => Self::catppuccin_mocha(),
            "dark" => Self::dark(),
            other => {
                tracing::warn!(theme = other, "unknown theme, falling back to 'dark'");
                Self::dark()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_theme_falls_back_to_dark() {
        assert_eq!(Theme::from_name("solarized").border_active, Theme::dark().border_active);
        assert_eq!(
            Theme::from_name("catppuccin_mocha").marker_pending,
            Theme::catppuccin_mocha().marker_pending
        );
    }
}
