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

//! Telnet channel handling
//!
//! [`TelnetCodec`] strips telnet commands out of the inbound stream and
//! reports the few that matter to a session:
//! - NAWS window size reports
//! - TTYPE terminal type reports
//! - NEW-ENVIRON variable reports
//! - BREAK
//!
//! Everything else arrives as plain data bytes, with `CR NUL` and `CR LF`
//! collapsed to `CR`.

pub mod protocol;

use bytes::{Buf, BytesMut};
use protocol::{TelnetCommand, TelnetOption, verb};
use tokio_util::codec::Decoder;

/// Largest subnegotiation payload kept; longer payloads are truncated.
const MAX_SUBNEGOTIATION: usize = 1024;

/// Inbound item surfaced by [`TelnetCodec`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    /// A data byte
    Data(u8),
    /// The client reported its window size
    WindowSize { columns: u16, rows: u16 },
    /// The client reported its terminal type
    TerminalType(String),
    /// The client reported environment variables
    Environment(Vec<(String, String)>),
    /// The client sent BREAK
    Break,
    /// WILL, WONT, DO or DONT for the raw option byte
    Negotiation(TelnetCommand, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Command,
    Option(TelnetCommand),
    Subnegotiation,
    SubnegotiationIac,
}

/// Incremental inbound telnet parser
#[derive(Debug)]
pub struct TelnetCodec {
    state: State,
    subnegotiation: Vec<u8>,
    after_cr: bool,
}

impl Default for TelnetCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetCodec {
    pub fn new() -> Self {
        Self {
            state: State::Data,
            subnegotiation: Vec::new(),
            after_cr: false,
        }
    }

    fn data(&mut self, byte: u8) -> Option<TelnetEvent> {
        let after_cr = std::mem::replace(&mut self.after_cr, byte == b'\r');
        if after_cr && (byte == 0 || byte == b'\n') {
            return None;
        }
        Some(TelnetEvent::Data(byte))
    }

    fn push(&mut self, byte: u8) -> Option<TelnetEvent> {
        match self.state {
            State::Data => {
                if byte == TelnetCommand::IAC.to_byte() {
                    self.state = State::Command;
                    None
                } else {
                    self.data(byte)
                }
            }
            State::Command => {
                self.state = State::Data;
                match TelnetCommand::from_byte(byte) {
                    Some(TelnetCommand::IAC) => self.data(byte),
                    Some(
                        command @ (TelnetCommand::WILL
                        | TelnetCommand::WONT
                        | TelnetCommand::DO
                        | TelnetCommand::DONT),
                    ) => {
                        self.state = State::Option(command);
                        None
                    }
                    Some(TelnetCommand::SB) => {
                        self.subnegotiation.clear();
                        self.state = State::Subnegotiation;
                        None
                    }
                    Some(TelnetCommand::BRK) => Some(TelnetEvent::Break),
                    Some(command) => {
                        tracing::trace!("Ignoring telnet command {:?}", command);
                        None
                    }
                    None => None,
                }
            }
            State::Option(command) => {
                self.state = State::Data;
                Some(TelnetEvent::Negotiation(command, byte))
            }
            State::Subnegotiation => {
                if byte == TelnetCommand::IAC.to_byte() {
                    self.state = State::SubnegotiationIac;
                } else if self.subnegotiation.len() < MAX_SUBNEGOTIATION {
                    self.subnegotiation.push(byte);
                }
                None
            }
            State::SubnegotiationIac => {
                if byte == TelnetCommand::SE.to_byte() {
                    self.state = State::Data;
                    self.finish_subnegotiation()
                } else {
                    if byte == TelnetCommand::IAC.to_byte()
                        && self.subnegotiation.len() < MAX_SUBNEGOTIATION
                    {
                        self.subnegotiation.push(byte);
                    }
                    self.state = State::Subnegotiation;
                    None
                }
            }
        }
    }

    fn finish_subnegotiation(&mut self) -> Option<TelnetEvent> {
        let payload = std::mem::take(&mut self.subnegotiation);
        let (&option, body) = payload.split_first()?;
        match TelnetOption::from_byte(option) {
            Some(TelnetOption::NAWS) => protocol::parse_window_size(body)
                .map(|(columns, rows)| TelnetEvent::WindowSize { columns, rows }),
            Some(TelnetOption::TerminalType) => match body.split_first() {
                Some((&verb::IS, name)) => Some(TelnetEvent::TerminalType(
                    String::from_utf8_lossy(name).trim().to_string(),
                )),
                _ => None,
            },
            Some(TelnetOption::NewEnvironment | TelnetOption::EnvironmentVariables) => {
                match body.split_first() {
                    Some((&(verb::IS | verb::INFO), vars)) => {
                        Some(TelnetEvent::Environment(protocol::parse_environment(vars)))
                    }
                    _ => None,
                }
            }
            _ => {
                tracing::trace!("Ignoring subnegotiation for option {}", option);
                None
            }
        }
    }
}

impl Decoder for TelnetCodec {
    type Item = TelnetEvent;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.has_remaining() {
            let byte = src.get_u8();
            if let Some(event) = self.push(byte) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}
