//! Theme configuration for the TUI.

use ratatui::style::{Color, Modifier, Style};

/// Color theme for the application
#[derive(Debug, Clone)]
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub highlight_bg: Color,
    pub highlight_fg: Color,
    pub border: Color,
    /// Border and title of the focused panel
    pub focus: Color,
    pub title: Color,
    pub accent: Color,
    pub error: Color,
    pub selected_marker: Color,
    pub country_colors: Vec<Color>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            bg: Color::Reset,
            fg: Color::White,
            highlight_bg: Color::Rgb(60, 60, 80),
            highlight_fg: Color::White,
            border: Color::Rgb(100, 100, 120),
            focus: Color::Yellow,
            title: Color::Cyan,
            accent: Color::Green,
            error: Color::Red,
            selected_marker: Color::Yellow,
            // Using named colors instead of RGB for better terminal compatibility
            country_colors: vec![
                Color::Red,
                Color::Green,
                Color::Yellow,
                Color::Blue,
                Color::Magenta,
                Color::Cyan,
                Color::LightRed,
                Color::LightGreen,
                Color::LightYellow,
                Color::LightBlue,
                Color::LightMagenta,
                Color::LightCyan,
            ],
        }
    }
}

impl Theme {
    /// Base surface style used to paint widget backgrounds
    pub fn surface_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    /// `(border, title)` styles for a panel, by focus
    pub fn panel_styles(&self, focused: bool) -> (Style, Style) {
        if focused {
            (self.focused_border_style(), self.focused_border_style())
        } else {
            (self.border_style(), self.dimmed_title_style())
        }
    }

    /// Get style for normal text
    pub fn normal_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    /// Get style for highlighted/selected items
    pub fn highlight_style(&self) -> Style {
        Style::default()
            .fg(self.highlight_fg)
            .bg(self.highlight_bg)
            .add_modifier(Modifier::BOLD)
    }

    /// Get style for borders
    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    fn focused_border_style(&self) -> Style {
        Style::default().fg(self.focus).add_modifier(Modifier::BOLD)
    }

    /// Get style for titles
    pub fn title_style(&self) -> Style {
        Style::default()
            .fg(self.title)
            .add_modifier(Modifier::BOLD)
    }

    fn dimmed_title_style(&self) -> Style {
        Style::default().fg(self.border).add_modifier(Modifier::DIM)
    }

    /// Inline error blocks
    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error).add_modifier(Modifier::BOLD)
    }

    /// Secondary text such as hints and axis titles
    pub fn muted_style(&self) -> Style {
        Style::default().add_modifier(Modifier::DIM)
    }

    /// Color for a country, by its index in the loaded country list.
    /// An empty palette falls back to the foreground color.
    pub fn country_color(&self, index: usize) -> Color {
        if self.country_colors.is_empty() {
            return self.fg;
        }
        self.country_colors[index % self.country_colors.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_colors_are_distinct() {
        let theme = Theme::default();
        let c0 = theme.country_color(0);
        let c1 = theme.country_color(1);
        let c2 = theme.country_color(2);
        assert_ne!(c0, c1, "Colors 0 and 1 should be different");
        assert_ne!(c1, c2, "Colors 1 and 2 should be different");
        assert_ne!(c0, c2, "Colors 0 and 2 should be different");
    }

    #[test]
    fn test_country_color_cycles() {
        let theme = Theme::default();
        let len = theme.country_colors.len();
        assert_eq!(theme.country_color(0), theme.country_color(len));
        assert_eq!(theme.country_color(1), theme.country_color(len + 1));
    }

    #[test]
    fn test_country_colors_are_not_gray() {
        let theme = Theme::default();
        for (i, color) in theme.country_colors.iter().enumerate() {
            let gray_colors = [Color::Gray, Color::DarkGray, Color::White, Color::Black];
            assert!(
                !gray_colors.contains(color),
                "Country color {i} should not be a gray shade: {:?}",
                color
            );
        }
    }

    #[test]
    fn test_panel_styles_follow_focus() {
        let theme = Theme::default();
        let (border, title) = theme.panel_styles(true);
        assert_eq!(border.fg, Some(theme.focus));
        assert_eq!(title, border);

        let (border, title) = theme.panel_styles(false);
        assert_eq!(border.fg, Some(theme.border));
        assert!(title.add_modifier.contains(Modifier::DIM));
    }

    #[test]
    fn test_empty_palette_uses_foreground() {
        let theme = Theme {
            country_colors: Vec::new(),
            ..Theme::default()
        };
        assert_eq!(theme.country_color(3), theme.fg);
    }
}
