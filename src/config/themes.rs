use std::collections::HashMap;

use ratatui::style::Color;

pub const DEFAULT_THEME: &str = "violet";

/// Colours handed to the renderer once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub accent: Color,
    pub title_fg: Color,
    pub text: Color,
    pub muted: Color,
    pub highlight: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Rgb(0x7d, 0x56, 0xf4),
            title_fg: Color::Rgb(0xfa, 0xfa, 0xfa),
            text: Color::Reset,
            muted: Color::Rgb(0x99, 0x99, 0x99),
            highlight: Color::Yellow,
            error: Color::Red,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThemeRegistry {
    themes: HashMap<&'static str, Theme>,
}

impl ThemeRegistry {
    pub fn contains(&self, name: &str) -> bool {
        self.themes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Theme> {
        self.themes.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.themes.keys().copied()
    }
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        let violet = Theme::default();
        let themes = [
            (DEFAULT_THEME, violet),
            (
                "dark",
                Theme {
                    accent: Color::Cyan,
                    title_fg: Color::Black,
                    muted: Color::DarkGray,
                    ..violet
                },
            ),
            (
                "light",
                Theme {
                    accent: Color::Blue,
                    title_fg: Color::White,
                    text: Color::Black,
                    muted: Color::Gray,
                    highlight: Color::Magenta,
                    ..violet
                },
            ),
            (
                "high-contrast",
                Theme {
                    accent: Color::White,
                    title_fg: Color::Black,
                    text: Color::White,
                    muted: Color::White,
                    highlight: Color::LightYellow,
                    error: Color::LightRed,
                },
            ),
        ]
        .into_iter()
        .collect();
        Self { themes }
    }
}
