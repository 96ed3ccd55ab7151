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

//! Gateway session management
//!
//! A [`Session`] is one accepted connection. It runs a chain of shells: the
//! login shell first, then whatever shell the previous one queued with
//! [`Session::set_next_shell`]. The session closes when a shell returns
//! without queueing a successor, when a shell fails, or when anything calls
//! [`Session::close`]. Closing happens once no matter how many callers race.

pub mod manager;
pub mod metadata;

use crate::context::ServerContext;
use crate::error::{SessionError, SessionResult};
use crate::shell::Shell;
use crate::terminal_io::{BoxedReader, BoxedWriter, TerminalInput, TerminalIo};
use async_trait::async_trait;
use futures::FutureExt;
use keybridge_common::decoder::InputEvent;
use metadata::SessionMetadata;
use std::fmt;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Lifecycle event kinds delivered to [`SessionListener`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    /// No input for longer than the warning timeout
    Idle,
    /// No input for longer than the warning plus disconnect timeouts
    TimedOut,
    /// The client pressed the logout key
    LogoutRequest,
    /// The client sent a telnet BREAK
    Break,
}

impl fmt::Display for SessionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionEventKind::Idle => "idle",
            SessionEventKind::TimedOut => "timed-out",
            SessionEventKind::LogoutRequest => "logout-request",
            SessionEventKind::Break => "break",
        };
        f.write_str(name)
    }
}

/// A lifecycle event and the session it came from
#[derive(Clone)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub session: Arc<Session>,
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEvent")
            .field("kind", &self.kind)
            .field("session", &self.session.id())
            .finish()
    }
}

/// Receiver of session lifecycle events
#[async_trait]
pub trait SessionListener: Send + Sync {
    async fn on_event(&self, event: &SessionEvent) -> SessionResult<()>;
}

/// Represents a client session in the gateway
pub struct Session {
    id: Uuid,
    peer: SocketAddr,
    metadata: Arc<RwLock<SessionMetadata>>,
    io: TerminalIo,
    context: Arc<ServerContext>,
    listeners: Mutex<Vec<Arc<dyn SessionListener>>>,
    next_shell: Mutex<Option<(String, Box<dyn Shell>)>>,
    dead: AtomicBool,
    cancel: CancellationToken,
    closed: mpsc::UnboundedSender<Uuid>,
}

impl Session {
    /// Create a session over the two halves of an accepted channel.
    ///
    /// `closed` receives the session id once the session has closed.
    pub fn new(
        metadata: SessionMetadata,
        reader: BoxedReader,
        writer: BoxedWriter,
        context: Arc<ServerContext>,
        closed: mpsc::UnboundedSender<Uuid>,
    ) -> Arc<Self> {
        let peer = metadata.peer();
        let mode = metadata.input_mode;
        let metadata = Arc::new(RwLock::new(metadata));
        let cancel = CancellationToken::new();
        let io = TerminalIo::new(
            reader,
            writer,
            Arc::clone(&metadata),
            Arc::clone(&context.terminals),
            mode,
            cancel.clone(),
        );
        Arc::new(Self {
            id: Uuid::new_v4(),
            peer,
            metadata,
            io,
            context,
            listeners: Mutex::new(Vec::new()),
            next_shell: Mutex::new(None),
            dead: AtomicBool::new(false),
            cancel,
            closed,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remote endpoint
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn metadata(&self) -> &Arc<RwLock<SessionMetadata>> {
        &self.metadata
    }

    /// Terminal I/O for this session
    pub fn io(&self) -> &TerminalIo {
        &self.io
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    /// Token cancelled when the session closes
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the session has not been closed
    pub fn is_active(&self) -> bool {
        !self.dead.load(Ordering::Acquire)
    }

    /// Register a lifecycle listener
    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) {
        if self.is_active() {
            self.listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(listener);
        }
    }

    /// Remove a previously registered listener
    pub fn remove_listener(&self, listener: &Arc<dyn SessionListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    /// Deliver `kind` to every listener in registration order.
    ///
    /// A failing or panicking listener does not stop delivery to the rest.
    /// Returns the number of listeners that failed.
    pub async fn fire_event(self: &Arc<Self>, kind: SessionEventKind) -> usize {
        let listeners: Vec<Arc<dyn SessionListener>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let event = SessionEvent {
            kind,
            session: Arc::clone(self),
        };

        let mut failures = 0;
        for listener in listeners {
            match AssertUnwindSafe(listener.on_event(&event))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(session_id = %self.id, "Listener failed on {} event: {}", kind, err);
                    failures += 1;
                }
                Err(_) => {
                    tracing::error!(session_id = %self.id, "Listener panicked on {} event", kind);
                    failures += 1;
                }
            }
        }
        failures
    }

    /// Queue the shell to run after the current one returns.
    ///
    /// Returns false when no shell is registered under `name`. A second call
    /// before the queued shell starts replaces it.
    pub fn set_next_shell(&self, name: &str) -> bool {
        let Some(shell) = self.context.shells.create(name) else {
            tracing::warn!(session_id = %self.id, "Unknown shell '{}' requested", name);
            return false;
        };
        *self
            .next_shell
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((name.to_string(), shell));
        true
    }

    fn take_next_shell(&self) -> Option<(String, Box<dyn Shell>)> {
        self.next_shell
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Read the next input event.
    ///
    /// A logout request fires [`SessionEventKind::LogoutRequest`] and yields
    /// `None`. A BREAK fires [`SessionEventKind::Break`] and reading goes on.
    pub async fn read_input(self: &Arc<Self>) -> SessionResult<Option<InputEvent>> {
        loop {
            match self.io.read_input().await? {
                TerminalInput::Event(event) => return Ok(Some(event)),
                TerminalInput::LogoutRequest => {
                    self.fire_event(SessionEventKind::LogoutRequest).await;
                    return Ok(None);
                }
                TerminalInput::Break => {
                    self.fire_event(SessionEventKind::Break).await;
                }
            }
        }
    }

    /// Run the login shell and every shell queued after it, then close
    pub async fn run(self: Arc<Self>) {
        tracing::info!(session_id = %self.id, peer = %self.peer, "Session started");

        if let Err(err) = self.io.initialize().await {
            tracing::debug!(session_id = %self.id, "Negotiation failed: {}", err);
            self.close().await;
            return;
        }

        let login_shell = self.metadata.read().await.login_shell.clone();
        let mut current = match self.context.shells.create(&login_shell) {
            Some(shell) => (login_shell, shell),
            None => {
                tracing::error!(session_id = %self.id, "Login shell '{}' is not registered", login_shell);
                self.close().await;
                return;
            }
        };

        loop {
            let (name, mut shell) = current;
            tracing::debug!(session_id = %self.id, "Running shell '{}'", name);

            let result = AssertUnwindSafe(shell.run(Arc::clone(&self)))
                .catch_unwind()
                .await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(SessionError::Closed)) => {
                    tracing::debug!(session_id = %self.id, "Shell '{}' ended on closed channel", name);
                    break;
                }
                Ok(Err(err)) => {
                    tracing::warn!(session_id = %self.id, "Shell '{}' failed: {}", name, err);
                    break;
                }
                Err(_) => {
                    tracing::error!(session_id = %self.id, "Shell '{}' panicked", name);
                    break;
                }
            }

            if !self.is_active() {
                break;
            }
            match self.take_next_shell() {
                Some(next) => {
                    tracing::debug!(session_id = %self.id, "Switching from '{}' to '{}'", name, next.0);
                    current = next;
                }
                None => break,
            }
        }

        self.close().await;
    }

    /// Tear the session down. Only the first call has any effect.
    pub async fn close(&self) {
        if self.dead.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(session_id = %self.id, peer = %self.peer, "Closing session");

        self.cancel.cancel();
        self.io.close().await;
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.take_next_shell();

        if self.closed.send(self.id).is_err() {
            tracing::trace!(session_id = %self.id, "Session manager is gone");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use crate::config::InputMode;
    use crate::shell::ShellRegistry;
    use keybridge_common::terminal::TerminalRegistry;
    use tokio::io::DuplexStream;

    /// A session over an in-memory channel, plus the client end and the
    /// closed-session queue
    pub fn session_with(
        context: ServerContext,
        login_shell: &str,
    ) -> (Arc<Session>, DuplexStream, mpsc::UnboundedReceiver<Uuid>) {
        let (server, client) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(server);
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        let metadata = SessionMetadata::new(
            "127.0.0.1:40000".parse().unwrap(),
            login_shell,
            InputMode::Character,
        );
        let session = Session::new(
            metadata,
            Box::new(reader),
            Box::new(writer),
            Arc::new(context),
            closed_tx,
        );
        (session, client, closed_rx)
    }

    pub fn test_context() -> ServerContext {
        ServerContext::new(
            ShellRegistry::with_builtins(&Default::default()),
            TerminalRegistry::standard(),
            crate::dispatch::LoggingSink::factory(),
        )
    }
}
