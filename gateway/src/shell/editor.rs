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

//! Remote keyboard shell
//!
//! Draws a title bar and a status bar, then forwards every decoded input
//! event to the host application's [`InputSink`](crate::dispatch::InputSink)
//! through the session's dispatcher.

use crate::dispatch::Dispatcher;
use crate::error::SessionResult;
use crate::session::{Session, SessionEvent, SessionEventKind, SessionListener};
use crate::shell::Shell;
use async_trait::async_trait;
use keybridge_common::markup;
use keybridge_common::terminal::Color;
use std::sync::Arc;

const TITLE: &str = " Keybridge remote keyboard";

/// Forwards keystrokes to the host
#[derive(Debug, Default)]
pub struct EditorShell;

impl EditorShell {
    pub fn new() -> Self {
        Self
    }

    async fn draw_welcome(&self, session: &Session) -> SessionResult<()> {
        let columns = usize::from(session.io().columns().await);
        let rows = session.io().rows().await;
        let terminal_type = session.metadata().read().await.terminal_type.clone();
        let status = format!(
            " {} | {}x{} | Ctrl-D logs out",
            terminal_type, columns, rows
        );

        let mut out = session.io().output().await;
        out.erase_screen();
        out.home_cursor();
        out.write(&markup::colorize_text_on(
            &bar(TITLE, columns),
            Color::Black,
            Color::Cyan,
        ));
        out.set_cursor(rows, 1);
        out.write(&markup::colorize_text_on(
            &bar(&status, columns),
            Color::Black,
            Color::Cyan,
        ));
        out.define_scroll_region(2, rows.saturating_sub(1).max(2));
        out.set_cursor(3, 1);
        out.write("Connected. Everything you type is sent to the host.\r\n");
        out.flush().await
    }
}

/// Pad or cut `text` to exactly `width` columns
fn bar(text: &str, width: usize) -> String {
    let mut line: String = text.chars().take(width).collect();
    let visible = line.chars().count();
    line.extend(std::iter::repeat_n(' ', width.saturating_sub(visible)));
    line
}

/// Reacts to lifecycle events while the editor runs
struct EditorListener;

#[async_trait]
impl SessionListener for EditorListener {
    async fn on_event(&self, event: &SessionEvent) -> SessionResult<()> {
        let session = &event.session;
        match event.kind {
            SessionEventKind::Idle => {
                let notice = markup::colorize_text(
                    "\r\nYou have been idle for a while and will be disconnected soon.",
                    Color::Yellow,
                );
                session.io().write_line(&notice).await?;
            }
            SessionEventKind::TimedOut => {
                let _ = session.io().write_line("\r\nIdle timeout, disconnecting.").await;
                session.close().await;
            }
            SessionEventKind::LogoutRequest => {
                let _ = session.io().write_line("\r\nLogging out.").await;
                session.close().await;
            }
            SessionEventKind::Break => {
                tracing::debug!(session_id = %session.id(), "Break received in editor");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Shell for EditorShell {
    async fn run(&mut self, session: Arc<Session>) -> SessionResult<()> {
        let metadata = session.metadata().read().await.clone();
        let sink = (session.context().sink_factory)(session.id(), &metadata);
        let dispatcher = Dispatcher::spawn(session.id(), sink, session.cancellation().clone());

        let listener: Arc<dyn SessionListener> = Arc::new(EditorListener);
        session.add_listener(Arc::clone(&listener));

        let result = match self.draw_welcome(&session).await {
            Ok(()) => loop {
                if !session.is_active() {
                    break Ok(());
                }
                match session.read_input().await {
                    Ok(Some(event)) => {
                        if !dispatcher.post(event).await {
                            break Ok(());
                        }
                    }
                    Ok(None) => {}
                    Err(err) => break Err(err),
                }
            },
            Err(err) => Err(err),
        };

        session.remove_listener(&listener);
        dispatcher.shutdown().await;
        result
    }
}
