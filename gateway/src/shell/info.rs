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

//! Connection information shell

use crate::error::SessionResult;
use crate::session::Session;
use crate::shell::{Shell, TimeoutListener};
use async_trait::async_trait;
use keybridge_common::decoder::{FunctionCode, InputEvent};
use keybridge_common::markup;
use keybridge_common::terminal::{CR, Color};
use std::sync::Arc;

/// Shows what the server knows about the connection
#[derive(Debug, Default)]
pub struct InfoShell;

impl InfoShell {
    pub fn new() -> Self {
        Self
    }

    async fn greet(&self, session: &Session) -> SessionResult<()> {
        let mut out = session.io().output().await;
        out.erase_screen();
        out.home_cursor();
        out.write(&markup::bold_colorize_text("Keybridge", Color::Cyan));
        out.write("\r\n\r\n");
        out.write(&format!(
            "Press {} for connection info, {} for terminal types, {} to log out.\r\n",
            markup::bold_text("i"),
            markup::bold_text("t"),
            markup::bold_text("Enter"),
        ));
        out.flush().await
    }

    async fn show_connection(&self, session: &Session) -> SessionResult<()> {
        let meta = session.metadata().read().await.clone();
        let mut lines = vec![
            format!("Session:   {}", session.id()),
            format!("Address:   {}:{}", meta.address, meta.port),
            format!("Host:      {}", meta.host_name),
            format!("Locale:    {}", meta.locale),
            format!("Terminal:  {}", meta.terminal_type),
            format!("Geometry:  {}x{}", meta.columns, meta.rows),
            format!("Mode:      {:?}", meta.input_mode),
            format!("Connected: {}", meta.connected_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ];
        let mut environment: Vec<_> = meta.environment.iter().collect();
        environment.sort();
        for (name, value) in environment {
            lines.push(format!("  {}={}", name, value));
        }

        let mut out = session.io().output().await;
        out.write("\r\n");
        for line in lines {
            out.write(&line);
            out.write("\r\n");
        }
        out.flush().await
    }

    async fn show_terminals(&self, session: &Session) -> SessionResult<()> {
        let names = session.context().terminals.names();
        let active = session.io().terminal();
        let mut out = session.io().output().await;
        out.write("\r\nKnown terminal types:\r\n");
        for name in names {
            out.write(&format!("  {}\r\n", name));
        }
        out.write(&format!("Active: {:?}\r\n", active.kind));
        out.flush().await
    }

    async fn interact(&self, session: &Arc<Session>) -> SessionResult<()> {
        self.greet(session).await?;
        while session.is_active() {
            match session.read_input().await? {
                None => break,
                Some(InputEvent::Function(FunctionCode::Control(CR))) => break,
                Some(InputEvent::Text(text)) if text.eq_ignore_ascii_case("i") => {
                    self.show_connection(session).await?;
                }
                Some(InputEvent::Text(text)) if text.eq_ignore_ascii_case("t") => {
                    self.show_terminals(session).await?;
                }
                Some(_) => {
                    let mut out = session.io().output().await;
                    out.bell();
                    out.flush().await?;
                }
            }
        }
        session.io().write_line("Goodbye.").await
    }
}

#[async_trait]
impl Shell for InfoShell {
    async fn run(&mut self, session: Arc<Session>) -> SessionResult<()> {
        let listener = TimeoutListener::attach(&session);
        let result = self.interact(&session).await;
        session.remove_listener(&listener);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_utils::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_info_shell_reports_and_logs_out() {
        let (session, mut client, mut closed) = session_with(test_context(), "info");
        let task = tokio::spawn(Arc::clone(&session).run());

        client.write_all(b"i\r").await.unwrap();
        task.await.unwrap();

        assert!(!session.is_active());
        assert_eq!(closed.recv().await, Some(session.id()));

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        let text = String::from_utf8_lossy(&received);
        assert!(text.contains("Address:   127.0.0.1:40000"));
        assert!(text.contains("Terminal:  default"));
        assert!(text.contains("Goodbye."));
    }
}
