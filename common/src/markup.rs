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

//! Rendition markup
//!
//! Styled text is written with an in-band marker byte (`0x01`) followed by a
//! single code character. Upper case color letters select a foreground,
//! lower case ones a background:
//!
//! | Code | Meaning | Code | Meaning |
//! |------|---------|------|---------|
//! | `S` `R` `G` `Y` `B` `M` `C` `W` | foreground 30-37 | `s` ... `w` | background 40-47 |
//! | `f` | bold | `d` | bold off |
//! | `i` | italic | `j` | italic off |
//! | `u` | underlined | `v` | underlined off |
//! | `e` | blink | `n` | blink off |
//! | `h` | invisible | `a` | reset all |
//!
//! Unknown codes render as a reset.

use crate::terminal::{Color, sgr, sgr_sequence};

/// In-band marker byte
pub const MARKER: u8 = 0x01;

/// In-band marker as a character
pub const MARKER_CHAR: char = '\u{1}';

pub const BOLD: char = 'f';
pub const BOLD_OFF: char = 'd';
pub const ITALIC: char = 'i';
pub const ITALIC_OFF: char = 'j';
pub const UNDERLINED: char = 'u';
pub const UNDERLINED_OFF: char = 'v';
pub const BLINK: char = 'e';
pub const BLINK_OFF: char = 'n';
pub const INVISIBLE: char = 'h';
pub const RESET_ALL: char = 'a';

/// Foreground code letter for `color`
pub fn color_code(color: Color) -> char {
    match color {
        Color::Black => 'S',
        Color::Red => 'R',
        Color::Green => 'G',
        Color::Yellow => 'Y',
        Color::Blue => 'B',
        Color::Magenta => 'M',
        Color::Cyan => 'C',
        Color::White => 'W',
    }
}

/// Background code letter for `color`
pub fn background_code(color: Color) -> char {
    color_code(color).to_ascii_lowercase()
}

/// SGR parameter for a code character and whether it selects a color
fn attribute(code: char) -> (u8, bool) {
    if let Some(color) = Color::ALL.iter().find(|c| color_code(**c) == code) {
        return (color.foreground(), true);
    }
    if let Some(color) = Color::ALL.iter().find(|c| background_code(**c) == code) {
        return (color.background(), true);
    }
    let style = match code {
        BOLD => sgr::BOLD,
        BOLD_OFF => sgr::BOLD_OFF,
        ITALIC => sgr::ITALIC,
        ITALIC_OFF => sgr::ITALIC_OFF,
        UNDERLINED => sgr::UNDERLINED,
        UNDERLINED_OFF => sgr::UNDERLINED_OFF,
        BLINK => sgr::BLINK,
        BLINK_OFF => sgr::BLINK_OFF,
        INVISIBLE => sgr::INVISIBLE,
        _ => sgr::RESET,
    };
    (style, false)
}

/// Translate marked-up `text` into terminal bytes.
///
/// With `supported` false every marker pair is dropped. Otherwise each marker
/// becomes an SGR sequence and a reset is appended. `force_bold` adds bold to
/// every color marker. A trailing marker without a code is dropped.
pub fn format(text: &str, supported: bool, force_bold: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 16);
    let mut chars = text.char_indices();
    let mut start = 0;

    while let Some((at, ch)) = chars.next() {
        if ch != MARKER_CHAR {
            continue;
        }
        out.extend_from_slice(text[start..at].as_bytes());
        match chars.next() {
            Some((code_at, code)) => {
                if supported {
                    let (param, is_color) = attribute(code);
                    if force_bold && is_color {
                        out.extend(sgr_sequence(&[param, sgr::BOLD]));
                    } else {
                        out.extend(sgr_sequence(&[param]));
                    }
                }
                start = code_at + code.len_utf8();
            }
            None => start = text.len(),
        }
    }
    out.extend_from_slice(text[start..].as_bytes());

    if supported {
        out.extend(sgr_sequence(&[sgr::RESET]));
    }
    out
}

/// Remove every marker pair from `text`
pub fn strip(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == MARKER_CHAR {
            chars.next();
        } else {
            out.push(ch);
        }
    }
    out
}

/// Number of visible columns, counting each marker pair as zero
pub fn visible_length(text: &str) -> usize {
    let markers = text.chars().filter(|ch| *ch == MARKER_CHAR).count();
    text.chars().count().saturating_sub(2 * markers)
}

fn marked(code: char) -> String {
    let mut out = String::with_capacity(2);
    out.push(MARKER_CHAR);
    out.push(code);
    out
}

/// Foreground colored text followed by a reset
pub fn colorize_text(text: &str, color: Color) -> String {
    format!("{}{}{}", marked(color_code(color)), text, marked(RESET_ALL))
}

/// Foreground colored text without a trailing reset
pub fn colorize_text_open(text: &str, color: Color) -> String {
    format!("{}{}", marked(color_code(color)), text)
}

/// Background colored text followed by a reset
pub fn colorize_background(text: &str, color: Color) -> String {
    format!("{}{}{}", marked(background_code(color)), text, marked(RESET_ALL))
}

/// Foreground and background colored text followed by a reset
pub fn colorize_text_on(text: &str, foreground: Color, background: Color) -> String {
    format!(
        "{}{}{}{}",
        marked(color_code(foreground)),
        marked(background_code(background)),
        text,
        marked(RESET_ALL)
    )
}

/// Bold foreground colored text followed by a reset
pub fn bold_colorize_text(text: &str, color: Color) -> String {
    format!(
        "{}{}{}{}",
        marked(BOLD),
        marked(color_code(color)),
        text,
        marked(RESET_ALL)
    )
}

/// Bold text
pub fn bold_text(text: &str) -> String {
    format!("{}{}{}", marked(BOLD), text, marked(BOLD_OFF))
}

/// Italic text
pub fn italic_text(text: &str) -> String {
    format!("{}{}{}", marked(ITALIC), text, marked(ITALIC_OFF))
}

/// Underlined text
pub fn underlined_text(text: &str) -> String {
    format!("{}{}{}", marked(UNDERLINED), text, marked(UNDERLINED_OFF))
}

/// Blinking text
pub fn blinking_text(text: &str) -> String {
    format!("{}{}{}", marked(BLINK), text, marked(BLINK_OFF))
}
