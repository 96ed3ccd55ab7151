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

use crate::config::SessionSettings;
use crate::context::ServerContext;
use crate::session::metadata::SessionMetadata;
use crate::session::{Session, SessionEventKind};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Written to connections refused because the session limit is reached
pub const CONNECTION_LIMIT_NOTICE: &[u8] = b"Too many connections, try again later.\r\n";

/// Longest wait for the refusal notice to go out
const NOTICE_TIMEOUT: Duration = Duration::from_secs(1);

/// Session manager for in-memory session tracking
pub struct SessionManager {
    /// Live sessions by id
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,

    /// Ids reported by sessions that closed themselves
    closed_tx: mpsc::UnboundedSender<Uuid>,
    closed_rx: Mutex<mpsc::UnboundedReceiver<Uuid>>,

    settings: SessionSettings,
    context: Arc<ServerContext>,

    stopping: AtomicBool,
    cancel: CancellationToken,
    housekeeping: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(settings: SessionSettings, context: Arc<ServerContext>) -> Arc<Self> {
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            closed_tx,
            closed_rx: Mutex::new(closed_rx),
            settings,
            context,
            stopping: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            housekeeping: std::sync::Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Start a session for an accepted connection.
    ///
    /// Connections over the limit get a short notice and are closed; `None`
    /// is returned for them and for connections arriving while stopping.
    pub async fn admit<S>(&self, mut stream: S, peer: SocketAddr) -> Option<Arc<Session>>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        if self.stopping.load(Ordering::Acquire) {
            tracing::debug!(peer = %peer, "Refusing connection while stopping");
            tokio::spawn(async move {
                let _ = tokio::time::timeout(NOTICE_TIMEOUT, stream.shutdown()).await;
            });
            return None;
        }

        let mut sessions = self.sessions.lock().await;
        self.reap_closed(&mut sessions).await;

        if sessions.len() >= self.settings.max_connections {
            drop(sessions);
            tracing::warn!(
                peer = %peer,
                "Connection limit of {} reached, refusing connection",
                self.settings.max_connections
            );
            // Refused peers may never read; the notice must not stall admission.
            tokio::spawn(async move {
                let refuse = async {
                    stream.write_all(CONNECTION_LIMIT_NOTICE).await?;
                    stream.shutdown().await
                };
                match tokio::time::timeout(NOTICE_TIMEOUT, refuse).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        tracing::trace!(peer = %peer, "Refusal notice not delivered: {}", err);
                    }
                    Err(_) => {
                        tracing::trace!(peer = %peer, "Refusal notice timed out");
                    }
                }
            });
            return None;
        }

        let metadata = SessionMetadata::new(
            peer,
            &self.settings.login_shell,
            self.settings.input_mode,
        );
        let (reader, writer) = tokio::io::split(stream);
        let session = Session::new(
            metadata,
            Box::new(reader),
            Box::new(writer),
            Arc::clone(&self.context),
            self.closed_tx.clone(),
        );
        sessions.insert(session.id(), Arc::clone(&session));
        let live = sessions.len();
        drop(sessions);

        tracing::info!(
            session_id = %session.id(),
            peer = %peer,
            "Admitted connection ({}/{})",
            live,
            self.settings.max_connections
        );
        tokio::spawn(Arc::clone(&session).run());
        Some(session)
    }

    /// Remove every session that reported itself closed
    async fn reap_closed(&self, sessions: &mut HashMap<Uuid, Arc<Session>>) -> usize {
        let mut closed = self.closed_rx.lock().await;
        let mut reaped = 0;
        while let Ok(id) = closed.try_recv() {
            if sessions.remove(&id).is_some() {
                reaped += 1;
            }
        }
        let before = sessions.len();
        sessions.retain(|_, session| session.is_active());
        reaped + before - sessions.len()
    }

    /// Start the periodic housekeeping sweep. Calling it again is a no-op.
    pub fn start_housekeeping(self: &Arc<Self>) {
        let mut slot = self
            .housekeeping
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.is_some() {
            return;
        }

        let manager = Arc::clone(self);
        let cancel = self.cancel.clone();
        let period = self.settings.housekeeping_interval;
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => manager.housekeep().await,
                }
            }
            tracing::debug!("Housekeeping stopped");
        }));
    }

    /// One housekeeping pass: reclaim closed sessions, then check idle time
    pub async fn housekeep(&self) {
        let live: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().await;
            let reaped = self.reap_closed(&mut sessions).await;
            if reaped > 0 {
                tracing::debug!("Reclaimed {} closed sessions, {} live", reaped, sessions.len());
            }
            sessions.values().cloned().collect()
        };

        let warning = self.settings.warning_timeout;
        let timeout = warning + self.settings.disconnect_timeout;

        for session in live {
            if !session.is_active() {
                continue;
            }
            let (idle, warned) = {
                let meta = session.metadata().read().await;
                (meta.inactivity(), meta.warned)
            };

            if idle > timeout {
                tracing::info!(session_id = %session.id(), "Session timed out after {:?}", idle);
                session.fire_event(SessionEventKind::TimedOut).await;
            } else if idle > warning && !warned {
                tracing::info!(session_id = %session.id(), "Session idle for {:?}", idle);
                session.metadata().write().await.warned = true;
                session.fire_event(SessionEventKind::Idle).await;
            }
        }
    }

    /// Stop housekeeping, close every live session and clear the registry
    pub async fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        self.cancel.cancel();

        let handle = self
            .housekeeping
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let sessions: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().map(|(_, session)| session).collect()
        };
        tracing::info!("Closing {} sessions", sessions.len());
        for session in sessions {
            session.close().await;
        }

        let mut closed = self.closed_rx.lock().await;
        while closed.try_recv().is_ok() {}
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Number of sessions in the registry
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Every session in the registry
    pub async fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.lock().await.values().cloned().collect()
    }

    /// Look a session up by id
    pub async fn session(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(&id).cloned()
    }

    /// Sessions connected from `address`
    pub async fn sessions_by_address(&self, address: IpAddr) -> Vec<Arc<Session>> {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|session| session.peer().ip() == address)
            .cloned()
            .collect()
    }
}
