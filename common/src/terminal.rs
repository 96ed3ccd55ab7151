//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Terminal capability descriptors
//!
//! A [`TerminalDescriptor`] is plain data: two capability flags and a name.
//! All escape sequences are produced by small pure functions that take the
//! descriptor into account where it matters (rendition, scroll regions).

pub mod registry;

use crate::decoder::FunctionCode;
use crate::markup;
use serde::{Deserialize, Serialize};

pub use registry::{RegistryError, TerminalDefinition, TerminalRegistry};

/// Escape
pub const ESC: u8 = 27;
/// Bell
pub const BEL: u8 = 7;
/// Backspace
pub const BS: u8 = 8;
/// Horizontal tab
pub const HT: u8 = 9;
/// End of transmission
pub const EOT: u8 = 4;
/// Delete
pub const DEL: u8 = 127;
/// Carriage return
pub const CR: u8 = 13;
/// Line feed
pub const LF: u8 = 10;

/// Outcome of translating one inbound byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translated {
    /// The byte carries a fixed function
    Function(FunctionCode),
    /// The byte introduces an escape sequence
    Escape,
    /// The byte passes through unchanged
    Byte(u8),
}

/// Map control bytes with fixed NVT/ANSI meanings onto function codes
pub fn translate_control(byte: u8) -> Translated {
    match byte {
        DEL => Translated::Function(FunctionCode::Delete),
        BS => Translated::Function(FunctionCode::Backspace),
        HT => Translated::Function(FunctionCode::Tab),
        ESC => Translated::Escape,
        markup::MARKER => Translated::Function(FunctionCode::ColorInit),
        EOT => Translated::Function(FunctionCode::LogoutRequest),
        other => Translated::Byte(other),
    }
}

/// Built-in terminal families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalKind {
    Dumb,
    Vt100,
    Ansi,
    Xterm,
}

impl TerminalKind {
    /// Capability descriptor for this family
    pub fn descriptor(self) -> TerminalDescriptor {
        match self {
            TerminalKind::Dumb => TerminalDescriptor {
                kind: self,
                supports_rendition: false,
                supports_scrolling: false,
            },
            TerminalKind::Vt100 => TerminalDescriptor {
                kind: self,
                supports_rendition: false,
                supports_scrolling: true,
            },
            TerminalKind::Ansi | TerminalKind::Xterm => TerminalDescriptor {
                kind: self,
                supports_rendition: true,
                supports_scrolling: true,
            },
        }
    }
}

impl std::str::FromStr for TerminalKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dumb" => Ok(TerminalKind::Dumb),
            "vt100" => Ok(TerminalKind::Vt100),
            "ansi" => Ok(TerminalKind::Ansi),
            "xterm" => Ok(TerminalKind::Xterm),
            other => Err(RegistryError::UnknownKind(other.to_string())),
        }
    }
}

/// Cursor movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Right,
    Left,
}

impl Direction {
    fn final_byte(self) -> u8 {
        match self {
            Direction::Up => b'A',
            Direction::Down => b'B',
            Direction::Right => b'C',
            Direction::Left => b'D',
        }
    }
}

/// Erase functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Erase {
    ToEndOfLine,
    ToBeginningOfLine,
    Line,
    ToEndOfScreen,
    ToBeginningOfScreen,
    Screen,
}

impl Erase {
    fn parameter_and_final(self) -> (Option<u8>, u8) {
        match self {
            Erase::ToEndOfLine => (None, b'K'),
            Erase::ToBeginningOfLine => (Some(b'1'), b'K'),
            Erase::Line => (Some(b'2'), b'K'),
            Erase::ToEndOfScreen => (None, b'J'),
            Erase::ToBeginningOfScreen => (Some(b'1'), b'J'),
            Erase::Screen => (Some(b'2'), b'J'),
        }
    }
}

/// Special terminal functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    StoreCursor,
    RestoreCursor,
    DeviceReset,
    LineWrap,
    NoLineWrap,
}

/// Select-Graphic-Rendition attribute codes
pub mod sgr {
    pub const RESET: u8 = 0;
    pub const BOLD: u8 = 1;
    pub const ITALIC: u8 = 3;
    pub const UNDERLINED: u8 = 4;
    pub const BLINK: u8 = 5;
    pub const INVISIBLE: u8 = 8;
    pub const BOLD_OFF: u8 = 22;
    pub const ITALIC_OFF: u8 = 23;
    pub const UNDERLINED_OFF: u8 = 24;
    pub const BLINK_OFF: u8 = 25;
}

/// The eight basic ANSI colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
}

impl Color {
    /// All colors in SGR order
    pub const ALL: [Color; 8] = [
        Color::Black,
        Color::Red,
        Color::Green,
        Color::Yellow,
        Color::Blue,
        Color::Magenta,
        Color::Cyan,
        Color::White,
    ];

    /// SGR foreground code
    pub fn foreground(self) -> u8 {
        30 + self as u8
    }

    /// SGR background code
    pub fn background(self) -> u8 {
        40 + self as u8
    }
}

/// Graphics rendition requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendition {
    Foreground(Color),
    Background(Color),
    /// One of the [`sgr`] style codes
    Style(u8),
    Reset,
}

impl Rendition {
    /// Numeric SGR parameter
    pub fn code(self) -> u8 {
        match self {
            Rendition::Foreground(color) => color.foreground(),
            Rendition::Background(color) => color.background(),
            Rendition::Style(code) => code,
            Rendition::Reset => sgr::RESET,
        }
    }
}

/// Capability descriptor for one terminal type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalDescriptor {
    /// Terminal family
    pub kind: TerminalKind,
    /// Whether SGR color and style sequences are understood
    pub supports_rendition: bool,
    /// Whether scroll regions are understood
    pub supports_scrolling: bool,
}

impl TerminalDescriptor {
    /// Move the cursor `times` cells in `direction`
    pub fn cursor_move(&self, direction: Direction, times: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 * times);
        for _ in 0..times {
            out.extend_from_slice(&[ESC, b'[', direction.final_byte()]);
        }
        out
    }

    /// Erase part of the line or screen
    pub fn erase(&self, erase: Erase) -> Vec<u8> {
        let (parameter, final_byte) = erase.parameter_and_final();
        let mut out = vec![ESC, b'['];
        out.extend(parameter);
        out.push(final_byte);
        out
    }

    /// Position the cursor at `row`/`column`, passed through as given.
    /// `(0, 0)` selects the shorter home sequence.
    pub fn position(&self, row: u16, column: u16) -> Vec<u8> {
        if row == 0 && column == 0 {
            return vec![ESC, b'[', b'H'];
        }
        format!("\x1b[{};{}H", row, column).into_bytes()
    }

    /// Special function sequences
    pub fn special(&self, special: Special) -> Vec<u8> {
        match special {
            Special::StoreCursor => vec![ESC, b'7'],
            Special::RestoreCursor => vec![ESC, b'8'],
            Special::DeviceReset => vec![ESC, b'c'],
            Special::LineWrap => vec![ESC, b'[', b'7', b'h'],
            Special::NoLineWrap => vec![ESC, b'[', b'7', b'l'],
        }
    }

    /// SGR sequence for `rendition`, empty when rendition is unsupported
    pub fn rendition(&self, rendition: Rendition) -> Vec<u8> {
        if !self.supports_rendition {
            return Vec::new();
        }
        sgr_sequence(&[rendition.code()])
    }

    /// Scroll region between `top` and `bottom`, `None` when unsupported
    pub fn scroll_margins(&self, top: u16, bottom: u16) -> Option<Vec<u8>> {
        self.supports_scrolling
            .then(|| format!("\x1b[{};{}r", top, bottom).into_bytes())
    }

    /// Sequence sent when this terminal is selected
    pub fn init_sequence(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Translate rendition markup into bytes for this terminal
    pub fn format(&self, text: &str) -> Vec<u8> {
        markup::format(text, self.supports_rendition, false)
    }

    /// Translate rendition markup, combining bold with every color
    pub fn format_bold(&self, text: &str) -> Vec<u8> {
        markup::format(text, self.supports_rendition, true)
    }
}

/// Build `ESC [ p1;p2;...m`
pub fn sgr_sequence(codes: &[u8]) -> Vec<u8> {
    let params = codes
        .iter()
        .map(|code| code.to_string())
        .collect::<Vec<_>>()
        .join(";");
    format!("\x1b[{}m", params).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_move() {
        let term = TerminalKind::Ansi.descriptor();
        assert_eq!(term.cursor_move(Direction::Up, 1), b"\x1b[A");
        assert_eq!(term.cursor_move(Direction::Left, 2), b"\x1b[D\x1b[D");
        assert!(term.cursor_move(Direction::Down, 0).is_empty());
    }

    #[test]
    fn test_erase_sequences() {
        let term = TerminalKind::Vt100.descriptor();
        assert_eq!(term.erase(Erase::ToEndOfLine), b"\x1b[K");
        assert_eq!(term.erase(Erase::ToBeginningOfLine), b"\x1b[1K");
        assert_eq!(term.erase(Erase::Line), b"\x1b[2K");
        assert_eq!(term.erase(Erase::ToEndOfScreen), b"\x1b[J");
        assert_eq!(term.erase(Erase::ToBeginningOfScreen), b"\x1b[1J");
        assert_eq!(term.erase(Erase::Screen), b"\x1b[2J");
    }

    #[test]
    fn test_home_is_short_form() {
        let term = TerminalKind::Dumb.descriptor();
        assert_eq!(term.position(0, 0), b"\x1b[H");
        assert_eq!(term.position(5, 12), b"\x1b[5;12H");
        assert_eq!(term.position(0, 3), b"\x1b[0;3H");
    }

    #[test]
    fn test_special_sequences() {
        let term = TerminalKind::Xterm.descriptor();
        assert_eq!(term.special(Special::StoreCursor), b"\x1b7");
        assert_eq!(term.special(Special::RestoreCursor), b"\x1b8");
        assert_eq!(term.special(Special::DeviceReset), b"\x1bc");
        assert_eq!(term.special(Special::LineWrap), b"\x1b[7h");
        assert_eq!(term.special(Special::NoLineWrap), b"\x1b[7l");
    }

    #[test]
    fn test_rendition_depends_on_capability() {
        let ansi = TerminalKind::Ansi.descriptor();
        let dumb = TerminalKind::Dumb.descriptor();
        assert_eq!(ansi.rendition(Rendition::Foreground(Color::Red)), b"\x1b[31m");
        assert_eq!(ansi.rendition(Rendition::Background(Color::Blue)), b"\x1b[44m");
        assert_eq!(ansi.rendition(Rendition::Style(sgr::BOLD)), b"\x1b[1m");
        assert_eq!(ansi.rendition(Rendition::Reset), b"\x1b[0m");
        assert!(dumb.rendition(Rendition::Reset).is_empty());
    }

    #[test]
    fn test_scroll_margins() {
        assert_eq!(
            TerminalKind::Vt100.descriptor().scroll_margins(2, 20),
            Some(b"\x1b[2;20r".to_vec())
        );
        assert_eq!(TerminalKind::Dumb.descriptor().scroll_margins(2, 20), None);
    }

    #[test]
    fn test_translate_control() {
        assert_eq!(translate_control(27), Translated::Escape);
        assert_eq!(
            translate_control(127),
            Translated::Function(FunctionCode::Delete)
        );
        assert_eq!(translate_control(b'a'), Translated::Byte(b'a'));
        assert_eq!(translate_control(13), Translated::Byte(13));
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("XTerm".parse::<TerminalKind>().unwrap(), TerminalKind::Xterm);
        assert!("vt52".parse::<TerminalKind>().is_err());
    }
}
