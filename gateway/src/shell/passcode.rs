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

//! Passcode prompt guarding the next shell

use crate::error::{SessionError, SessionResult};
use crate::session::Session;
use crate::shell::{Shell, TimeoutListener};
use async_trait::async_trait;
use keybridge_common::decoder::{FunctionCode, InputEvent};
use keybridge_common::terminal::{CR, LF};
use std::sync::Arc;
use std::time::Duration;

/// Pause before a failed attempt closes the session
pub const FAILURE_DELAY: Duration = Duration::from_secs(3);

/// Longest passcode accepted from the client
const MAX_PASSCODE_LENGTH: usize = 64;

/// Asks for the configured passcode, then queues the next shell
#[derive(Debug, Clone)]
pub struct PasscodeShell {
    passcode: String,
    next: String,
}

impl PasscodeShell {
    pub fn new(passcode: &str, next: &str) -> Self {
        Self {
            passcode: passcode.to_string(),
            next: next.to_string(),
        }
    }

    /// Read one line without echoing it
    async fn read_secret(&self, session: &Arc<Session>) -> SessionResult<Option<String>> {
        let mut entered = String::new();
        loop {
            match session.read_input().await? {
                None => return Ok(None),
                Some(InputEvent::Function(FunctionCode::Control(CR | LF))) => {
                    return Ok(Some(entered));
                }
                Some(InputEvent::Function(FunctionCode::Backspace | FunctionCode::Delete)) => {
                    entered.pop();
                }
                Some(InputEvent::Text(text)) if entered.len() + text.len() <= MAX_PASSCODE_LENGTH => {
                    entered.push_str(&text);
                }
                Some(_) => {
                    let mut out = session.io().output().await;
                    out.bell();
                    out.flush().await?;
                }
            }
        }
    }

    async fn challenge(&self, session: &Arc<Session>) -> SessionResult<()> {
        if self.passcode.is_empty() {
            tracing::debug!(session_id = %session.id(), "No passcode configured");
            session.set_next_shell(&self.next);
            return Ok(());
        }

        session.io().write("Passcode: ").await?;
        let Some(entered) = self.read_secret(session).await? else {
            return Ok(());
        };

        if entered == self.passcode {
            tracing::info!(session_id = %session.id(), "Passcode accepted");
            session.io().write_line("").await?;
            if !session.set_next_shell(&self.next) {
                return Err(SessionError::UnknownShell(self.next.clone()));
            }
            return Ok(());
        }

        tracing::warn!(session_id = %session.id(), peer = %session.peer(), "Passcode mismatch");
        tokio::time::sleep(FAILURE_DELAY).await;
        let _ = session.io().write_line("\r\nWrong passcode.").await;
        Err(SessionError::Authentication)
    }
}

#[async_trait]
impl Shell for PasscodeShell {
    async fn run(&mut self, session: Arc<Session>) -> SessionResult<()> {
        let listener = TimeoutListener::attach(&session);
        let result = self.challenge(&session).await;
        session.remove_listener(&listener);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ServerContext;
    use crate::dispatch::LoggingSink;
    use crate::session::test_utils::*;
    use crate::shell::ShellRegistry;
    use crate::config::{SessionSettings, ShellConfig};
    use crate::session::manager::SessionManager;
    use keybridge_common::terminal::TerminalRegistry;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn context_with_passcode(passcode: &str) -> ServerContext {
        let mut shells = ShellRegistry::with_builtins(&ShellConfig::default());
        let code = passcode.to_string();
        shells.register("passcode", move || Box::new(PasscodeShell::new(&code, "info")));
        ServerContext::new(shells, TerminalRegistry::standard(), LoggingSink::factory())
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatch_waits_then_closes() {
        let (session, mut client, _closed) = session_with(context_with_passcode("s3cret"), "passcode");
        let started = tokio::time::Instant::now();
        let task = tokio::spawn(Arc::clone(&session).run());

        client.write_all(b"guess\r").await.unwrap();
        task.await.unwrap();

        assert!(started.elapsed() >= FAILURE_DELAY);
        assert!(!session.is_active());

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        let text = String::from_utf8_lossy(&received);
        assert!(text.contains("Passcode: "));
        assert!(!text.contains("guess"));
        assert!(text.contains("Wrong passcode."));
    }

    #[tokio::test]
    async fn test_match_queues_next_shell() {
        let (session, mut client, _closed) = session_with(context_with_passcode("s3cret"), "passcode");
        let task = tokio::spawn(Arc::clone(&session).run());

        // The info shell runs next; Enter leaves it.
        client.write_all(b"s3cx\x7fret\r\r").await.unwrap();
        task.await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        let text = String::from_utf8_lossy(&received);
        assert!(text.contains("for connection info"));
        assert!(text.contains("Goodbye."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_prompt_times_out_and_frees_slot() {
        let settings = SessionSettings {
            max_connections: 1,
            warning_timeout: Duration::from_secs(60),
            disconnect_timeout: Duration::from_secs(30),
            login_shell: "passcode".to_string(),
            ..SessionSettings::default()
        };
        let manager = SessionManager::new(settings, Arc::new(context_with_passcode("s3cret")));
        let (server, mut client) = tokio::io::duplex(4096);
        let session = manager
            .admit(server, "10.0.0.1:5000".parse().unwrap())
            .await
            .unwrap();

        let mut buf = vec![0u8; 1024];
        let mut seen = String::new();
        while !seen.contains("Passcode: ") {
            let n = client.read(&mut buf).await.unwrap();
            seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        }

        tokio::time::advance(Duration::from_secs(91)).await;
        manager.housekeep().await;
        assert!(!session.is_active());

        manager.housekeep().await;
        assert_eq!(manager.session_count().await, 0);
        let (late, _late_client) = tokio::io::duplex(4096);
        assert!(
            manager
                .admit(late, "10.0.0.2:5000".parse().unwrap())
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_empty_passcode_skips_prompt() {
        let (session, mut client, _closed) = session_with(context_with_passcode(""), "passcode");
        let task = tokio::spawn(Arc::clone(&session).run());
        client.write_all(b"\r").await.unwrap();
        task.await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert!(!String::from_utf8_lossy(&received).contains("Passcode"));
    }
}
