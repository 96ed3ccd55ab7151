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

//! Per-session terminal I/O
//!
//! The read side is a single reader behind a mutex: the telnet codec strips
//! protocol traffic, and the byte-stream decoder turns the remaining data
//! into input events. The write side is a second mutex. Holding an
//! [`OutputGuard`] lets one task issue compound writes (erase, write,
//! reposition) that no other writer can interleave with.
//!
//! Never hold an [`OutputGuard`] across [`TerminalIo::read_input`]: the read
//! side answers telnet negotiation through the same output lock.

use crate::config::InputMode;
use crate::error::{SessionError, SessionResult};
use crate::session::metadata::SessionMetadata;
use crate::telnet::protocol::{self, TelnetCommand, TelnetOption, verb};
use crate::telnet::{TelnetCodec, TelnetEvent};
use futures::StreamExt;
use keybridge_common::decoder::{Decoded, Decoder, InputEvent};
use keybridge_common::terminal::{
    self, Color, Direction, Erase, Rendition, Special, TerminalDescriptor, TerminalRegistry, sgr,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

/// Longest wait for buffered output when a session closes
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Boxed read half of a session channel
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed write half of a session channel
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// What a read produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalInput {
    /// A decoded input unit
    Event(InputEvent),
    /// The client pressed the logout key (EOT)
    LogoutRequest,
    /// The client sent a telnet BREAK
    Break,
}

#[derive(Debug, Clone, Copy)]
enum Inbound {
    Byte(u8),
    Break,
}

struct InputState {
    frames: FramedRead<BoxedReader, TelnetCodec>,
    decoder: Decoder,
    pending: VecDeque<Inbound>,
    terminal_type_requested: bool,
    environment_requested: bool,
}

/// Write side state, reachable through [`OutputGuard`]
pub struct OutputState {
    writer: BoxedWriter,
    buffer: Vec<u8>,
    autoflush: bool,
    force_bold: bool,
    linewrap: bool,
    signalling: bool,
    closed: bool,
}

/// Terminal I/O for one session
pub struct TerminalIo {
    input: Mutex<InputState>,
    output: Mutex<OutputState>,
    terminal: std::sync::RwLock<Arc<TerminalDescriptor>>,
    terminals: Arc<TerminalRegistry>,
    metadata: Arc<RwLock<SessionMetadata>>,
    cancel: CancellationToken,
    mode: InputMode,
}

impl TerminalIo {
    pub fn new(
        reader: BoxedReader,
        writer: BoxedWriter,
        metadata: Arc<RwLock<SessionMetadata>>,
        terminals: Arc<TerminalRegistry>,
        mode: InputMode,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            input: Mutex::new(InputState {
                frames: FramedRead::new(reader, TelnetCodec::new()),
                decoder: Decoder::new(),
                pending: VecDeque::new(),
                terminal_type_requested: false,
                environment_requested: false,
            }),
            output: Mutex::new(OutputState {
                writer,
                buffer: Vec::with_capacity(1024),
                autoflush: true,
                force_bold: false,
                linewrap: true,
                signalling: true,
                closed: false,
            }),
            terminal: std::sync::RwLock::new(terminals.default_terminal()),
            terminals,
            metadata,
            cancel,
            mode,
        }
    }

    /// Send the opening telnet negotiation
    pub async fn initialize(&self) -> SessionResult<()> {
        let mut out = self.output().await;
        out.write_raw(&protocol::initial_negotiation(self.mode));
        out.flush().await
    }

    /// Read the next input unit, waiting for more bytes as needed
    pub async fn read_input(&self) -> SessionResult<TerminalInput> {
        let mut input = self.input.lock().await;
        loop {
            let Some(inbound) = input.pending.pop_front() else {
                self.fill(&mut input).await?;
                continue;
            };
            match inbound {
                Inbound::Break => return Ok(TerminalInput::Break),
                Inbound::Byte(terminal::EOT) => {
                    input.decoder.reset();
                    return Ok(TerminalInput::LogoutRequest);
                }
                Inbound::Byte(byte) => match input.decoder.decode(byte) {
                    Decoded::Incomplete => {}
                    Decoded::Printable => {
                        let text = input.decoder.printable();
                        return Ok(TerminalInput::Event(InputEvent::Text(text)));
                    }
                    Decoded::FunctionCode(code) => {
                        return Ok(TerminalInput::Event(InputEvent::Function(code)));
                    }
                },
            }
        }
    }

    async fn fill(&self, input: &mut InputState) -> SessionResult<()> {
        let frame = tokio::select! {
            _ = self.cancel.cancelled() => return Err(SessionError::Closed),
            frame = input.frames.next() => frame,
        };
        let event = match frame {
            Some(Ok(event)) => event,
            Some(Err(err)) => return Err(SessionError::Io(err)),
            None => return Err(SessionError::Closed),
        };

        self.metadata.write().await.touch();

        match event {
            TelnetEvent::Data(byte) => input.pending.push_back(Inbound::Byte(byte)),
            TelnetEvent::Break => input.pending.push_back(Inbound::Break),
            TelnetEvent::WindowSize { columns, rows } => {
                tracing::debug!("Window size reported: {}x{}", columns, rows);
                self.metadata.write().await.set_geometry(columns, rows);
            }
            TelnetEvent::TerminalType(name) => {
                tracing::debug!("Terminal type reported: {}", name);
                self.metadata.write().await.terminal_type = name.clone();
                self.set_terminal(&name).await?;
            }
            TelnetEvent::Environment(vars) => {
                tracing::debug!("Client reported {} environment variables", vars.len());
                self.metadata.write().await.environment.extend(vars);
            }
            TelnetEvent::Negotiation(command, option) => {
                self.answer_negotiation(input, command, option).await?;
            }
        }
        Ok(())
    }

    async fn answer_negotiation(
        &self,
        input: &mut InputState,
        command: TelnetCommand,
        option: u8,
    ) -> SessionResult<()> {
        let known = TelnetOption::from_byte(option);
        let reply = match (command, known) {
            (TelnetCommand::WILL, Some(TelnetOption::TerminalType)) => {
                if std::mem::replace(&mut input.terminal_type_requested, true) {
                    return Ok(());
                }
                protocol::build_subnegotiation(TelnetOption::TerminalType, &[verb::SEND])
            }
            (TelnetCommand::WILL, Some(TelnetOption::NewEnvironment)) => {
                if std::mem::replace(&mut input.environment_requested, true) {
                    return Ok(());
                }
                protocol::build_subnegotiation(TelnetOption::NewEnvironment, &[verb::SEND])
            }
            (TelnetCommand::WILL, Some(TelnetOption::NAWS)) => return Ok(()),
            (TelnetCommand::WILL, _) => protocol::build_refusal(TelnetCommand::DONT, option),
            (
                TelnetCommand::DO,
                Some(TelnetOption::Echo | TelnetOption::SuppressGoAhead),
            ) if self.mode == InputMode::Character => return Ok(()),
            (TelnetCommand::DO, _) => protocol::build_refusal(TelnetCommand::WONT, option),
            _ => return Ok(()),
        };
        let mut out = self.output().await;
        out.write_raw(&reply);
        out.flush().await
    }

    /// Lock the output for a sequence of writes
    pub async fn output(&self) -> OutputGuard<'_> {
        let state = self.output.lock().await;
        OutputGuard {
            io: self,
            terminal: self.terminal(),
            state,
        }
    }

    /// Write marked-up text
    pub async fn write(&self, text: &str) -> SessionResult<()> {
        let mut out = self.output().await;
        out.write(text);
        out.commit().await
    }

    /// Write marked-up text followed by a line break
    pub async fn write_line(&self, text: &str) -> SessionResult<()> {
        let mut out = self.output().await;
        out.write(text);
        out.write("\r\n");
        out.commit().await
    }

    /// Flush buffered output
    pub async fn flush(&self) -> SessionResult<()> {
        self.output().await.flush().await
    }

    /// Active capability descriptor
    pub fn terminal(&self) -> Arc<TerminalDescriptor> {
        match self.terminal.read() {
            Ok(terminal) => Arc::clone(&terminal),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Select the descriptor registered for `name`
    pub async fn set_terminal(&self, name: &str) -> SessionResult<()> {
        let descriptor = self.terminals.lookup(name);
        match self.terminal.write() {
            Ok(mut terminal) => *terminal = Arc::clone(&descriptor),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&descriptor),
        }
        tracing::debug!("Using {:?} terminal for '{}'", descriptor.kind, name);
        let init = descriptor.init_sequence();
        if !init.is_empty() {
            let mut out = self.output().await;
            out.write_raw(&init);
            out.commit().await?;
        }
        Ok(())
    }

    /// Window height in rows
    pub async fn rows(&self) -> u16 {
        self.metadata.read().await.rows
    }

    /// Window width in columns
    pub async fn columns(&self) -> u16 {
        self.metadata.read().await.columns
    }

    /// Whether the window size changed since the last call
    pub async fn is_terminal_geometry_changed(&self) -> bool {
        self.metadata.write().await.take_geometry_changed()
    }

    /// Flush what is buffered and shut the write side down
    pub async fn close(&self) {
        let mut state = self.output.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;
        let pending = std::mem::take(&mut state.buffer);
        let writer = &mut state.writer;
        let shutdown = async {
            if !pending.is_empty() {
                writer.write_all(&pending).await?;
            }
            writer.shutdown().await
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::trace!("Shutdown of session channel failed: {}", err),
            Err(_) => tracing::trace!("Shutdown of session channel timed out"),
        }
    }
}

/// Exclusive access to a session's output
pub struct OutputGuard<'a> {
    io: &'a TerminalIo,
    terminal: Arc<TerminalDescriptor>,
    state: MutexGuard<'a, OutputState>,
}

impl OutputGuard<'_> {
    /// Append marked-up text, formatted for the active terminal
    pub fn write(&mut self, text: &str) {
        let bytes = if self.state.force_bold {
            self.terminal.format_bold(text)
        } else {
            self.terminal.format(text)
        };
        self.write_bytes(&bytes);
    }

    /// Append data bytes, escaping IAC
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let escaped = protocol::escape_iac(bytes);
        self.state.buffer.extend_from_slice(&escaped);
    }

    fn write_raw(&mut self, bytes: &[u8]) {
        self.state.buffer.extend_from_slice(bytes);
    }

    /// Ring the bell when signalling is enabled
    pub fn bell(&mut self) {
        if self.state.signalling {
            self.write_raw(&[terminal::BEL]);
        }
    }

    pub fn erase(&mut self, erase: Erase) {
        let bytes = self.terminal.erase(erase);
        self.write_raw(&bytes);
    }

    pub fn erase_to_end_of_line(&mut self) {
        self.erase(Erase::ToEndOfLine);
    }

    pub fn erase_to_beginning_of_line(&mut self) {
        self.erase(Erase::ToBeginningOfLine);
    }

    pub fn erase_line(&mut self) {
        self.erase(Erase::Line);
    }

    pub fn erase_to_end_of_screen(&mut self) {
        self.erase(Erase::ToEndOfScreen);
    }

    pub fn erase_to_beginning_of_screen(&mut self) {
        self.erase(Erase::ToBeginningOfScreen);
    }

    pub fn erase_screen(&mut self) {
        self.erase(Erase::Screen);
    }

    pub fn move_cursor(&mut self, direction: Direction, times: usize) {
        let bytes = self.terminal.cursor_move(direction, times);
        self.write_raw(&bytes);
    }

    pub fn move_left(&mut self, times: usize) {
        self.move_cursor(Direction::Left, times);
    }

    pub fn move_right(&mut self, times: usize) {
        self.move_cursor(Direction::Right, times);
    }

    pub fn move_up(&mut self, times: usize) {
        self.move_cursor(Direction::Up, times);
    }

    pub fn move_down(&mut self, times: usize) {
        self.move_cursor(Direction::Down, times);
    }

    /// Position the cursor, `(0, 0)` homes it
    pub fn set_cursor(&mut self, row: u16, column: u16) {
        let bytes = self.terminal.position(row, column);
        self.write_raw(&bytes);
    }

    pub fn home_cursor(&mut self) {
        self.set_cursor(0, 0);
    }

    pub fn store_cursor(&mut self) {
        self.special(Special::StoreCursor);
    }

    pub fn restore_cursor(&mut self) {
        self.special(Special::RestoreCursor);
    }

    fn special(&mut self, special: Special) {
        let bytes = self.terminal.special(special);
        self.write_raw(&bytes);
    }

    /// Restrict scrolling to rows `top..=bottom`, false when unsupported
    pub fn define_scroll_region(&mut self, top: u16, bottom: u16) -> bool {
        match self.terminal.scroll_margins(top, bottom) {
            Some(bytes) => {
                self.write_raw(&bytes);
                true
            }
            None => false,
        }
    }

    fn rendition(&mut self, rendition: Rendition) {
        let bytes = self.terminal.rendition(rendition);
        self.write_raw(&bytes);
    }

    pub fn set_foreground(&mut self, color: Color) {
        self.rendition(Rendition::Foreground(color));
    }

    pub fn set_background(&mut self, color: Color) {
        self.rendition(Rendition::Background(color));
    }

    pub fn set_bold(&mut self, on: bool) {
        self.rendition(Rendition::Style(if on { sgr::BOLD } else { sgr::BOLD_OFF }));
    }

    pub fn set_italic(&mut self, on: bool) {
        self.rendition(Rendition::Style(if on { sgr::ITALIC } else { sgr::ITALIC_OFF }));
    }

    pub fn set_underlined(&mut self, on: bool) {
        self.rendition(Rendition::Style(if on {
            sgr::UNDERLINED
        } else {
            sgr::UNDERLINED_OFF
        }));
    }

    pub fn set_blink(&mut self, on: bool) {
        self.rendition(Rendition::Style(if on { sgr::BLINK } else { sgr::BLINK_OFF }));
    }

    pub fn reset_attributes(&mut self) {
        self.rendition(Rendition::Reset);
    }

    pub fn reset_terminal(&mut self) {
        self.special(Special::DeviceReset);
    }

    /// Toggle line wrapping, emitting only on change
    pub fn set_linewrapping(&mut self, on: bool) {
        if self.state.linewrap != on {
            self.state.linewrap = on;
            self.special(if on {
                Special::LineWrap
            } else {
                Special::NoLineWrap
            });
        }
    }

    pub fn is_linewrapping(&self) -> bool {
        self.state.linewrap
    }

    /// Combine bold with every color in later writes
    pub fn force_bold(&mut self, on: bool) {
        self.state.force_bold = on;
    }

    pub fn set_autoflush(&mut self, on: bool) {
        self.state.autoflush = on;
    }

    pub fn is_autoflushing(&self) -> bool {
        self.state.autoflush
    }

    pub fn set_signalling(&mut self, on: bool) {
        self.state.signalling = on;
    }

    /// Flush when autoflush is on
    pub async fn commit(&mut self) -> SessionResult<()> {
        if self.state.autoflush {
            self.flush().await
        } else {
            Ok(())
        }
    }

    /// Send everything buffered
    pub async fn flush(&mut self) -> SessionResult<()> {
        if self.state.closed {
            return Err(SessionError::Closed);
        }
        if self.state.buffer.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.state.buffer);
        let state = &mut *self.state;
        tokio::select! {
            _ = self.io.cancel.cancelled() => Err(SessionError::Closed),
            result = async {
                state.writer.write_all(&pending).await?;
                state.writer.flush().await
            } => result.map_err(SessionError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keybridge_common::decoder::FunctionCode;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn terminal_io(mode: InputMode) -> (TerminalIo, DuplexStream, Arc<RwLock<SessionMetadata>>) {
        let (server, client) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(server);
        let metadata = Arc::new(RwLock::new(SessionMetadata::new(
            "127.0.0.1:5000".parse().unwrap(),
            "editor",
            mode,
        )));
        let io = TerminalIo::new(
            Box::new(reader),
            Box::new(writer),
            Arc::clone(&metadata),
            Arc::new(TerminalRegistry::standard()),
            mode,
            CancellationToken::new(),
        );
        (io, client, metadata)
    }

    async fn read_available(client: &mut DuplexStream) -> Vec<u8> {
        let mut buf = vec![0u8; 1024];
        let n = client.read(&mut buf).await.unwrap();
        buf.truncate(n);
        buf
    }

    #[tokio::test]
    async fn test_initialize_sends_negotiation() {
        let (io, mut client, _) = terminal_io(InputMode::Character);
        io.initialize().await.unwrap();
        let sent = read_available(&mut client).await;
        assert_eq!(sent, protocol::initial_negotiation(InputMode::Character));
    }

    #[tokio::test]
    async fn test_scripted_exchange() {
        let reader = tokio_test::io::Builder::new()
            .read(&[255, 243])
            .read(b"q")
            .build();
        let writer = tokio_test::io::Builder::new()
            .write(&protocol::initial_negotiation(InputMode::Character))
            .write(b"\x1b[31mred\x1b[0m")
            .build();
        let metadata = Arc::new(RwLock::new(SessionMetadata::new(
            "127.0.0.1:5000".parse().unwrap(),
            "editor",
            InputMode::Character,
        )));
        let io = TerminalIo::new(
            Box::new(reader),
            Box::new(writer),
            metadata,
            Arc::new(TerminalRegistry::standard()),
            InputMode::Character,
            CancellationToken::new(),
        );

        io.initialize().await.unwrap();
        assert_eq!(io.read_input().await.unwrap(), TerminalInput::Break);
        assert_eq!(
            io.read_input().await.unwrap(),
            TerminalInput::Event(InputEvent::Text("q".to_string()))
        );
        io.write("\u{1}Rred").await.unwrap();
    }

    #[tokio::test]
    async fn test_reads_decoded_events() {
        let (io, mut client, _) = terminal_io(InputMode::Character);
        client.write_all(b"a\x1b[A\xc3\xa9").await.unwrap();

        assert_eq!(
            io.read_input().await.unwrap(),
            TerminalInput::Event(InputEvent::Text("a".to_string()))
        );
        assert_eq!(
            io.read_input().await.unwrap(),
            TerminalInput::Event(InputEvent::Function(FunctionCode::CursorUp))
        );
        assert_eq!(
            io.read_input().await.unwrap(),
            TerminalInput::Event(InputEvent::Text("é".to_string()))
        );
    }

    #[tokio::test]
    async fn test_logout_request_and_break() {
        let (io, mut client, _) = terminal_io(InputMode::Character);
        client.write_all(&[4, 255, 243]).await.unwrap();
        assert_eq!(io.read_input().await.unwrap(), TerminalInput::LogoutRequest);
        assert_eq!(io.read_input().await.unwrap(), TerminalInput::Break);
    }

    #[tokio::test]
    async fn test_negotiation_updates_metadata_and_terminal() {
        let (io, mut client, metadata) = terminal_io(InputMode::Character);
        let mut bytes = vec![255, 251, 24];
        bytes.extend([255, 250, 31, 0, 100, 0, 30, 255, 240]);
        bytes.extend([255, 250, 24, 0]);
        bytes.extend(b"DUMB");
        bytes.extend([255, 240]);
        bytes.push(b'x');
        client.write_all(&bytes).await.unwrap();

        assert_eq!(
            io.read_input().await.unwrap(),
            TerminalInput::Event(InputEvent::Text("x".to_string()))
        );
        assert_eq!(io.columns().await, 100);
        assert_eq!(io.rows().await, 30);
        assert!(io.is_terminal_geometry_changed().await);
        assert!(!io.is_terminal_geometry_changed().await);
        assert_eq!(metadata.read().await.terminal_type, "DUMB");
        assert!(!io.terminal().supports_rendition);

        // WILL TTYPE is answered with a SEND request.
        let reply = read_available(&mut client).await;
        assert_eq!(reply, vec![255, 250, 24, 1, 255, 240]);
    }

    #[tokio::test]
    async fn test_unknown_options_are_refused() {
        let (io, mut client, _) = terminal_io(InputMode::Line);
        client.write_all(&[255, 253, 1, 255, 251, 86, b'z']).await.unwrap();
        io.read_input().await.unwrap();
        let reply = read_available(&mut client).await;
        assert_eq!(reply, vec![255, 252, 1, 255, 254, 86]);
    }

    #[tokio::test]
    async fn test_write_formats_for_terminal() {
        let (io, mut client, _) = terminal_io(InputMode::Character);
        io.write("\u{1}Rred").await.unwrap();
        assert_eq!(read_available(&mut client).await, b"\x1b[31mred\x1b[0m");

        io.set_terminal("dumb").await.unwrap();
        io.write("\u{1}Rred").await.unwrap();
        assert_eq!(read_available(&mut client).await, b"red");
    }

    #[tokio::test]
    async fn test_compound_write_without_autoflush() {
        let (io, mut client, _) = terminal_io(InputMode::Character);
        {
            let mut out = io.output().await;
            out.set_autoflush(false);
            out.erase_screen();
            out.home_cursor();
            out.set_linewrapping(true);
            out.set_linewrapping(false);
            out.commit().await.unwrap();
            out.flush().await.unwrap();
        }
        assert_eq!(read_available(&mut client).await, b"\x1b[2J\x1b[H\x1b[7l");
    }

    #[tokio::test]
    async fn test_reads_fail_after_cancel_and_eof() {
        let (io, client, _) = terminal_io(InputMode::Character);
        drop(client);
        assert!(matches!(io.read_input().await, Err(SessionError::Closed)));

        let (io, _client, _) = terminal_io(InputMode::Character);
        io.cancel.cancel();
        assert!(matches!(io.read_input().await, Err(SessionError::Closed)));
    }

    #[tokio::test]
    async fn test_close_is_final() {
        let (io, _client, _) = terminal_io(InputMode::Character);
        io.close().await;
        io.close().await;
        assert!(matches!(io.write("late").await, Err(SessionError::Closed)));
    }
}
