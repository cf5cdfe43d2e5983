//! Identity mapping -- login -> display color and track offset.
//!
//! Keyed on the first character of the login. Four seats exist (`A`..`D`);
//! anything else is unmapped and callers decide the fallback.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Blue,
    Cyan,
    Magenta,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Cyan => "cyan",
            Color::Magenta => "magenta",
        }
    }

    /// RGB triple for renderers that want one.
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            Color::Red => (255, 0, 0),
            Color::Blue => (0, 0, 255),
            Color::Cyan => (0, 255, 255),
            Color::Magenta => (255, 0, 255),
        }
    }
    /// `#rrggbb` form of `rgb`.
    pub fn hex(&self) -> String {
        let (r, g, b) = self.rgb();
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seat table: prefix, color, offset from the first track.
const SEATS: [(char, Color, u32); 4] = [
    ('A', Color::Red, 0),
    ('B', Color::Blue, 1),
    ('C', Color::Cyan, 2),
    ('D', Color::Magenta, 3),
];

fn seat(user: &str) -> Option<(Color, u32)> {
    let first = user.chars().next()?;
    SEATS
        .iter()
        .find(|(prefix, _, _)| *prefix == first)
        .map(|(_, color, offset)| (*color, *offset))
}

/// Display color for `user`, `None` when unmapped.
pub fn color_for(user: &str) -> Option<Color> {
    seat(user).map(|(color, _)| color)
}

/// Track offset (relative to the first track) for `user`, `None` when unmapped.
pub fn track_offset_for(user: &str) -> Option<u32> {
    seat(user).map(|(_, offset)| offset)
}
