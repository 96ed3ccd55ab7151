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

//! Byte-stream decoder
//!
//! Turns the raw octets arriving from a terminal into logical input units:
//! - Single control codes (after terminal control translation)
//! - UTF-8 runs of one to six bytes
//! - ANSI/VT escape sequences matched against [`ESCAPE_SEQUENCES`]
//!
//! The decoder never blocks. Each call to [`Decoder::decode`] is a pure
//! function of the current state and the next byte.

use crate::terminal::{self, Translated};
use std::fmt;

/// Capacity of the decoder's working buffer
pub const BUFFER_CAPACITY: usize = 6;

/// Decoded identity of a control character or recognized escape sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// Raw control byte without a special translation
    Control(u8),
    /// BS (8)
    Backspace,
    /// HT (9)
    Tab,
    /// DEL (127) or `ESC [ 3 ~`
    Delete,
    /// In-band rendition markup marker (1)
    ColorInit,
    /// EOT (4)
    LogoutRequest,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    CursorUp,
    CursorDown,
    CursorRight,
    CursorLeft,
    ShiftCursorUp,
    ShiftCursorDown,
    ShiftCursorRight,
    ShiftCursorLeft,
    CtrlCursorRight,
    CtrlCursorLeft,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    /// Escape sequence that matched no table entry
    Unsupported,
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionCode::Control(byte) => write!(f, "Control(0x{:02x})", byte),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Escape sequence table: the bytes following ESC for each recognized symbol.
///
/// No entry may be a strict prefix of another.
pub const ESCAPE_SEQUENCES: &[(FunctionCode, &[u8])] = &[
    (FunctionCode::CursorUp, b"[A"),
    (FunctionCode::CursorRight, b"[C"),
    (FunctionCode::CursorDown, b"[B"),
    (FunctionCode::CursorLeft, b"[D"),
    (FunctionCode::Home, b"[H"),
    (FunctionCode::End, b"[F"),
    (FunctionCode::Insert, b"[2~"),
    (FunctionCode::Delete, b"[3~"),
    (FunctionCode::PageUp, b"[5~"),
    (FunctionCode::PageDown, b"[6~"),
    (FunctionCode::CtrlCursorLeft, b"[1;5D"),
    (FunctionCode::CtrlCursorRight, b"[1;5C"),
    (FunctionCode::ShiftCursorUp, b"[1;2A"),
    (FunctionCode::ShiftCursorDown, b"[1;2B"),
    (FunctionCode::ShiftCursorRight, b"[1;2C"),
    (FunctionCode::ShiftCursorLeft, b"[1;2D"),
    (FunctionCode::F1, b"OP"),
    (FunctionCode::F2, b"OQ"),
    (FunctionCode::F3, b"OR"),
    (FunctionCode::F4, b"OS"),
    (FunctionCode::F5, b"[15~"),
    (FunctionCode::F6, b"[17~"),
    (FunctionCode::F7, b"[18~"),
    (FunctionCode::F8, b"[19~"),
    (FunctionCode::F9, b"[20~"),
    (FunctionCode::F10, b"[21~"),
    (FunctionCode::F11, b"[23~"),
    (FunctionCode::F12, b"[24~"),
];

/// Result of feeding one byte to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// Another byte is required before the unit completes
    Incomplete,
    /// A printable run completed; fetch it with [`Decoder::printable`]
    Printable,
    /// A control code or escape sequence completed
    FunctionCode(FunctionCode),
}

/// A decoded logical input unit, as handed to input consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// One printable character (or the replacement character for invalid UTF-8)
    Text(String),
    /// A control code or escape-sequence symbol
    Function(FunctionCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitType {
    Control,
    EscapeSequence,
    Printable,
}

/// Per-session decoding state machine
#[derive(Debug, Clone)]
pub struct Decoder {
    buffer: [u8; BUFFER_CAPACITY],
    index: usize,
    unit: UnitType,
    expected_length: usize,
    function_code: FunctionCode,
    complete: bool,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// Create a decoder waiting for the start of a new unit
    pub fn new() -> Self {
        Self {
            buffer: [0; BUFFER_CAPACITY],
            index: 0,
            unit: UnitType::Printable,
            expected_length: 1,
            function_code: FunctionCode::Unsupported,
            complete: true,
        }
    }

    /// Feed the next byte of the stream
    pub fn decode(&mut self, byte: u8) -> Decoded {
        self.buffer[self.index] = byte;

        if self.complete {
            match terminal::translate_control(byte) {
                Translated::Function(code) => {
                    self.unit = UnitType::Control;
                    self.function_code = code;
                }
                Translated::Escape => {
                    self.unit = UnitType::EscapeSequence;
                    self.function_code = FunctionCode::Unsupported;
                    self.complete = false;
                }
                Translated::Byte(byte) if byte < 32 => {
                    self.unit = UnitType::Control;
                    self.function_code = FunctionCode::Control(byte);
                }
                Translated::Byte(byte) => {
                    self.unit = UnitType::Printable;
                    self.expected_length = run_length(byte);
                    self.complete = self.expected_length == 1;
                }
            }
        }

        // Not an else branch: a unit that just started may already need matching.
        if !self.complete {
            if self.unit == UnitType::EscapeSequence {
                self.match_escape_sequence();
            } else {
                self.complete = self.index == self.expected_length - 1;
            }
        }

        if self.complete {
            self.index = 0;
            match self.unit {
                UnitType::Printable => Decoded::Printable,
                UnitType::Control | UnitType::EscapeSequence => {
                    Decoded::FunctionCode(self.function_code)
                }
            }
        } else {
            self.index += 1;
            Decoded::Incomplete
        }
    }

    /// Interpret the buffered run as text
    pub fn printable(&self) -> String {
        String::from_utf8_lossy(&self.buffer[..self.expected_length]).into_owned()
    }

    /// The most recently completed function code
    pub fn function_code(&self) -> FunctionCode {
        self.function_code
    }

    /// Number of bytes buffered for the unit in progress
    pub fn pending(&self) -> usize {
        self.index
    }

    /// Drop any partially decoded unit
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn match_escape_sequence(&mut self) {
        self.complete = false;
        self.function_code = FunctionCode::Unsupported;

        // Slot 0 holds the escape byte itself.
        if self.index == 0 {
            return;
        }

        let consumed = &self.buffer[1..=self.index];
        let mut candidates = 0;
        for (code, pattern) in ESCAPE_SEQUENCES {
            if pattern.len() < consumed.len() || !pattern.starts_with(consumed) {
                continue;
            }
            if pattern.len() == consumed.len() {
                self.function_code = *code;
                self.complete = true;
                return;
            }
            candidates += 1;
        }
        self.complete = candidates == 0;
    }
}

/// Length of the UTF-8 run introduced by `lead`
pub fn run_length(lead: u8) -> usize {
    if lead & 0b1111_1100 == 0b1111_1100 {
        6
    } else if lead & 0b1111_1000 == 0b1111_1000 {
        5
    } else if lead & 0b1111_0000 == 0b1111_0000 {
        4
    } else if lead & 0b1110_0000 == 0b1110_0000 {
        3
    } else if lead & 0b1100_0000 == 0b1100_0000 {
        2
    } else {
        1
    }
}

/// Decode a complete byte slice, skipping incomplete intermediate states
pub fn decode_all(bytes: &[u8]) -> Vec<InputEvent> {
    let mut decoder = Decoder::new();
    let mut events = Vec::new();
    for &byte in bytes {
        match decoder.decode(byte) {
            Decoded::Incomplete => {}
            Decoded::Printable => events.push(InputEvent::Text(decoder.printable())),
            Decoded::FunctionCode(code) => events.push(InputEvent::Function(code)),
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ESC: u8 = 0x1b;

    #[test]
    fn test_every_table_entry_decodes_on_final_byte() {
        for (code, pattern) in ESCAPE_SEQUENCES {
            let mut decoder = Decoder::new();
            assert_eq!(decoder.decode(ESC), Decoded::Incomplete, "{:?}", code);
            let (last, prefix) = pattern.split_last().unwrap();
            for &byte in prefix {
                assert_eq!(decoder.decode(byte), Decoded::Incomplete, "{:?}", code);
            }
            assert_eq!(decoder.decode(*last), Decoded::FunctionCode(*code));
            assert_eq!(decoder.pending(), 0);
        }
    }

    #[test]
    fn test_no_entry_is_prefix_of_another() {
        for (a, pa) in ESCAPE_SEQUENCES {
            for (b, pb) in ESCAPE_SEQUENCES {
                if a != b || pa != pb {
                    assert!(
                        !(pb.len() > pa.len() && pb.starts_with(pa)),
                        "{:?} shadows {:?}",
                        a,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn test_broken_prefix_is_unsupported() {
        for (code, pattern) in ESCAPE_SEQUENCES {
            for cut in 1..pattern.len() {
                let prefix = &pattern[..cut];
                // A breaker byte that continues no table entry after this prefix
                let breaker = b'z';
                let mut decoder = Decoder::new();
                decoder.decode(ESC);
                for &byte in prefix {
                    assert_eq!(decoder.decode(byte), Decoded::Incomplete, "{:?}", code);
                }
                assert_eq!(
                    decoder.decode(breaker),
                    Decoded::FunctionCode(FunctionCode::Unsupported),
                    "{:?} cut at {}",
                    code,
                    cut
                );
                assert_eq!(decoder.pending(), 0);
            }
        }
    }

    #[test]
    fn test_escape_then_unknown_byte_is_unsupported() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(ESC), Decoded::Incomplete);
        assert_eq!(
            decoder.decode(b'x'),
            Decoded::FunctionCode(FunctionCode::Unsupported)
        );
        // The decoder is ready for a new unit afterwards.
        assert_eq!(decoder.decode(b'a'), Decoded::Printable);
        assert_eq!(decoder.printable(), "a");
    }

    #[test]
    fn test_cursor_up() {
        assert_eq!(
            decode_all(&[ESC, b'[', b'A']),
            vec![InputEvent::Function(FunctionCode::CursorUp)]
        );
    }

    #[test]
    fn test_page_down_is_distinct_from_page_up() {
        assert_eq!(
            decode_all(b"\x1b[5~\x1b[6~"),
            vec![
                InputEvent::Function(FunctionCode::PageUp),
                InputEvent::Function(FunctionCode::PageDown),
            ]
        );
    }

    #[test]
    fn test_two_byte_utf8() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(0xC3), Decoded::Incomplete);
        assert_eq!(decoder.decode(0xA9), Decoded::Printable);
        assert_eq!(decoder.printable(), "é");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_four_byte_utf8() {
        assert_eq!(
            decode_all("🦀".as_bytes()),
            vec![InputEvent::Text("🦀".to_string())]
        );
    }

    #[test]
    fn test_control_translation() {
        assert_eq!(
            decode_all(&[8, 9, 127, 1, 4, 13, 3]),
            vec![
                InputEvent::Function(FunctionCode::Backspace),
                InputEvent::Function(FunctionCode::Tab),
                InputEvent::Function(FunctionCode::Delete),
                InputEvent::Function(FunctionCode::ColorInit),
                InputEvent::Function(FunctionCode::LogoutRequest),
                InputEvent::Function(FunctionCode::Control(13)),
                InputEvent::Function(FunctionCode::Control(3)),
            ]
        );
    }

    #[test]
    fn test_run_length_table() {
        for byte in 0..=255u8 {
            let expected = match byte {
                0x00..=0xBF => 1,
                0xC0..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF7 => 4,
                0xF8..=0xFB => 5,
                0xFC..=0xFF => 6,
            };
            assert_eq!(run_length(byte), expected, "byte 0x{:02x}", byte);
        }
    }

    #[test]
    fn test_ascii_is_single_printable() {
        for byte in 32..=126u8 {
            let mut decoder = Decoder::new();
            assert_eq!(decoder.decode(byte), Decoded::Printable);
            assert_eq!(decoder.printable(), (byte as char).to_string());
        }
    }

    #[test]
    fn test_reset_discards_partial_unit() {
        let mut decoder = Decoder::new();
        decoder.decode(0xE2);
        decoder.decode(0x82);
        decoder.reset();
        assert_eq!(decoder.decode(b'q'), Decoded::Printable);
        assert_eq!(decoder.printable(), "q");
    }

    proptest! {
        #[test]
        fn prop_index_stays_in_bounds(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut decoder = Decoder::new();
            for byte in bytes {
                decoder.decode(byte);
                prop_assert!(decoder.pending() < BUFFER_CAPACITY);
            }
        }

        #[test]
        fn prop_valid_text_round_trips(text in "[^\\x00-\\x1f\\x7f]{0,64}") {
            let decoded: String = decode_all(text.as_bytes())
                .into_iter()
                .map(|event| match event {
                    InputEvent::Text(text) => text,
                    InputEvent::Function(code) => panic!("unexpected {:?}", code),
                })
                .collect();
            prop_assert_eq!(decoded, text);
        }
    }
}
