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

//! Telnet protocol constants and utilities
//!
//! Only the options needed for a byte-transparent channel are understood:
//! echo and suppress-go-ahead for character mode, plus window size, terminal
//! type and environment reports from the client.

use crate::config::InputMode;

/// Telnet command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TelnetCommand {
    /// Interpret As Command
    IAC = 255,
    /// Don't do option
    DONT = 254,
    /// Do option
    DO = 253,
    /// Won't do option
    WONT = 252,
    /// Will do option
    WILL = 251,
    /// Subnegotiation begin
    SB = 250,
    /// Go ahead
    GA = 249,
    /// Erase line
    EL = 248,
    /// Erase character
    EC = 247,
    /// Are you there
    AYT = 246,
    /// Abort output
    AO = 245,
    /// Interrupt process
    IP = 244,
    /// Break
    BRK = 243,
    /// Data mark
    DM = 242,
    /// No operation
    NOP = 241,
    /// Subnegotiation end
    SE = 240,
}

impl TelnetCommand {
    /// Convert byte to telnet command
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            255 => Some(Self::IAC),
            254 => Some(Self::DONT),
            253 => Some(Self::DO),
            252 => Some(Self::WONT),
            251 => Some(Self::WILL),
            250 => Some(Self::SB),
            249 => Some(Self::GA),
            248 => Some(Self::EL),
            247 => Some(Self::EC),
            246 => Some(Self::AYT),
            245 => Some(Self::AO),
            244 => Some(Self::IP),
            243 => Some(Self::BRK),
            242 => Some(Self::DM),
            241 => Some(Self::NOP),
            240 => Some(Self::SE),
            _ => None,
        }
    }

    /// Convert command to byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Telnet option codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TelnetOption {
    /// Binary transmission
    Binary = 0,
    /// Echo
    Echo = 1,
    /// Suppress go ahead
    SuppressGoAhead = 3,
    /// Status
    Status = 5,
    /// Timing mark
    TimingMark = 6,
    /// Terminal type
    TerminalType = 24,
    /// Negotiate about window size (NAWS)
    NAWS = 31,
    /// Terminal speed
    TerminalSpeed = 32,
    /// Remote flow control
    RemoteFlowControl = 33,
    /// Linemode
    Linemode = 34,
    /// Environment variables (obsolete form)
    EnvironmentVariables = 36,
    /// New environment variables
    NewEnvironment = 39,
}

impl TelnetOption {
    /// Convert byte to telnet option
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Binary),
            1 => Some(Self::Echo),
            3 => Some(Self::SuppressGoAhead),
            5 => Some(Self::Status),
            6 => Some(Self::TimingMark),
            24 => Some(Self::TerminalType),
            31 => Some(Self::NAWS),
            32 => Some(Self::TerminalSpeed),
            33 => Some(Self::RemoteFlowControl),
            34 => Some(Self::Linemode),
            36 => Some(Self::EnvironmentVariables),
            39 => Some(Self::NewEnvironment),
            _ => None,
        }
    }

    /// Convert option to byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Subnegotiation verbs shared by TTYPE and NEW-ENVIRON
pub mod verb {
    pub const IS: u8 = 0;
    pub const SEND: u8 = 1;
    pub const INFO: u8 = 2;
}

/// NEW-ENVIRON field markers
pub mod environ {
    pub const VAR: u8 = 0;
    pub const VALUE: u8 = 1;
    pub const ESC: u8 = 2;
    pub const USERVAR: u8 = 3;
}

/// Build a telnet negotiation sequence
pub fn build_negotiation(command: TelnetCommand, option: TelnetOption) -> Vec<u8> {
    vec![
        TelnetCommand::IAC.to_byte(),
        command.to_byte(),
        option.to_byte(),
    ]
}

/// Build a refusal for an option we do not recognize
pub fn build_refusal(command: TelnetCommand, option: u8) -> Vec<u8> {
    vec![TelnetCommand::IAC.to_byte(), command.to_byte(), option]
}

/// Build a telnet subnegotiation sequence
pub fn build_subnegotiation(option: TelnetOption, data: &[u8]) -> Vec<u8> {
    let mut result = vec![
        TelnetCommand::IAC.to_byte(),
        TelnetCommand::SB.to_byte(),
        option.to_byte(),
    ];
    result.extend(escape_iac(data));
    result.push(TelnetCommand::IAC.to_byte());
    result.push(TelnetCommand::SE.to_byte());
    result
}

/// Double every IAC byte so data passes through unchanged
pub fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    for &byte in data {
        result.push(byte);
        if byte == TelnetCommand::IAC.to_byte() {
            result.push(byte);
        }
    }
    result
}

/// Parse window size from NAWS subnegotiation data
pub fn parse_window_size(data: &[u8]) -> Option<(u16, u16)> {
    if data.len() >= 4 {
        let width = u16::from_be_bytes([data[0], data[1]]);
        let height = u16::from_be_bytes([data[2], data[3]]);
        Some((width, height))
    } else {
        None
    }
}

/// Parse the variable list of a NEW-ENVIRON `IS` or `INFO` report
pub fn parse_environment(data: &[u8]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut name: Option<Vec<u8>> = None;
    let mut value: Option<Vec<u8>> = None;
    let mut escaped = false;

    let mut flush = |name: &mut Option<Vec<u8>>, value: &mut Option<Vec<u8>>| {
        if let Some(name) = name.take() {
            let value = value.take().unwrap_or_default();
            pairs.push((
                String::from_utf8_lossy(&name).into_owned(),
                String::from_utf8_lossy(&value).into_owned(),
            ));
        }
    };

    for &byte in data {
        if escaped {
            escaped = false;
        } else {
            match byte {
                environ::VAR | environ::USERVAR => {
                    flush(&mut name, &mut value);
                    name = Some(Vec::new());
                    continue;
                }
                environ::VALUE => {
                    value = Some(Vec::new());
                    continue;
                }
                environ::ESC => {
                    escaped = true;
                    continue;
                }
                _ => {}
            }
        }
        match (&mut name, &mut value) {
            (Some(_), Some(value)) => value.push(byte),
            (Some(name), None) => name.push(byte),
            _ => {}
        }
    }
    flush(&mut name, &mut value);
    pairs
}

/// Negotiation sent when a session starts
pub fn initial_negotiation(mode: InputMode) -> Vec<u8> {
    let mut out = Vec::new();
    if mode == InputMode::Character {
        out.extend(build_negotiation(TelnetCommand::WILL, TelnetOption::Echo));
        out.extend(build_negotiation(
            TelnetCommand::WILL,
            TelnetOption::SuppressGoAhead,
        ));
    }
    out.extend(build_negotiation(TelnetCommand::DO, TelnetOption::NAWS));
    out.extend(build_negotiation(TelnetCommand::DO, TelnetOption::TerminalType));
    out.extend(build_negotiation(
        TelnetCommand::DO,
        TelnetOption::NewEnvironment,
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telnet_command_conversion() {
        assert_eq!(TelnetCommand::from_byte(255), Some(TelnetCommand::IAC));
        assert_eq!(TelnetCommand::from_byte(253), Some(TelnetCommand::DO));
        assert_eq!(TelnetCommand::from_byte(243), Some(TelnetCommand::BRK));
        assert_eq!(TelnetCommand::from_byte(100), None);

        assert_eq!(TelnetCommand::IAC.to_byte(), 255);
        assert_eq!(TelnetCommand::DO.to_byte(), 253);
    }

    #[test]
    fn test_telnet_option_conversion() {
        assert_eq!(TelnetOption::from_byte(1), Some(TelnetOption::Echo));
        assert_eq!(TelnetOption::from_byte(31), Some(TelnetOption::NAWS));
        assert_eq!(TelnetOption::from_byte(39), Some(TelnetOption::NewEnvironment));
        assert_eq!(TelnetOption::from_byte(200), None);

        assert_eq!(TelnetOption::TerminalType.to_byte(), 24);
    }

    #[test]
    fn test_build_subnegotiation_escapes_iac() {
        let subneg = build_subnegotiation(TelnetOption::TerminalType, &[verb::SEND, 255]);
        assert_eq!(subneg, vec![255, 250, 24, 1, 255, 255, 255, 240]);
    }

    #[test]
    fn test_parse_window_size() {
        assert_eq!(parse_window_size(&[0, 80, 0, 24]), Some((80, 24)));
        assert_eq!(parse_window_size(&[1, 0, 0, 200]), Some((256, 200)));
        assert_eq!(parse_window_size(&[0, 80]), None);
    }

    #[test]
    fn test_parse_environment() {
        let mut data = vec![environ::VAR];
        data.extend(b"USER");
        data.push(environ::VALUE);
        data.extend(b"alice");
        data.push(environ::USERVAR);
        data.extend(b"LANG");
        data.push(environ::VALUE);
        data.extend(b"de_");
        data.push(environ::ESC);
        data.push(environ::VAR);
        data.push(environ::VAR);
        data.extend(b"EMPTY");

        assert_eq!(
            parse_environment(&data),
            vec![
                ("USER".to_string(), "alice".to_string()),
                ("LANG".to_string(), "de_\u{0}".to_string()),
                ("EMPTY".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_initial_negotiation_depends_on_mode() {
        let character = initial_negotiation(InputMode::Character);
        let line = initial_negotiation(InputMode::Line);
        assert!(character.starts_with(&[255, 251, 1, 255, 251, 3]));
        assert_eq!(&line[..3], &[255, 253, 31]);
        assert_eq!(character.len(), line.len() + 6);
    }
}
