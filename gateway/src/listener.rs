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

//! TCP listener feeding a session manager
//!
//! Each [`PortListener`] owns one bound socket and one accept task. Accepted
//! connections pass the availability flag and the optional connection filter
//! before they reach [`SessionManager::admit`].

pub mod filter;

use crate::config::ListenerSettings;
use crate::context::ServerContext;
use crate::error::BootError;
use crate::session::manager::SessionManager;
use filter::ConnectionFilter;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Pause after an accept error so a persistent fault does not spin
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// One listening port
pub struct PortListener {
    settings: ListenerSettings,
    manager: Arc<SessionManager>,
    filter: Option<Arc<dyn ConnectionFilter>>,
    available: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl PortListener {
    pub fn new(
        settings: ListenerSettings,
        context: Arc<ServerContext>,
        filter: Option<Arc<dyn ConnectionFilter>>,
    ) -> Self {
        let manager = SessionManager::new(settings.session.clone(), context);
        Self {
            settings,
            manager,
            filter,
            available: Arc::new(AtomicBool::new(true)),
            stopping: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Address actually bound, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether accepted connections are handed to the session manager
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Accept and immediately close new connections while false
    pub fn set_available(&self, available: bool) {
        tracing::info!(listener = %self.settings.name, "Listener available: {}", available);
        self.available.store(available, Ordering::Release);
    }

    fn bind(&self) -> Result<TcpListener, BootError> {
        let port = self.settings.port;
        let address = self.settings.address;
        let bind_error = |err| BootError::Bind(self.settings.name.clone(), port, err);
        let socket = if address.is_ipv6() {
            TcpSocket::new_v6()
        } else {
            TcpSocket::new_v4()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket
            .bind(SocketAddr::new(address, port))
            .map_err(bind_error)?;
        socket.listen(self.settings.backlog).map_err(bind_error)
    }

    /// Bind the port and start accepting
    pub fn start(&self) -> Result<SocketAddr, BootError> {
        let listener = self.bind()?;
        let addr = listener
            .local_addr()
            .map_err(|err| BootError::Bind(self.settings.name.clone(), self.settings.port, err))?;
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(addr);

        self.manager.start_housekeeping();

        let accept = AcceptLoop {
            name: self.settings.name.clone(),
            listener,
            manager: Arc::clone(&self.manager),
            filter: self.filter.clone(),
            available: Arc::clone(&self.available),
            stopping: Arc::clone(&self.stopping),
            cancel: self.cancel.clone(),
        };
        let handle = tokio::spawn(accept.run());
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        tracing::info!(listener = %self.settings.name, "Listening on {}", addr);
        Ok(addr)
    }

    /// Close the port, wait for the accept loop, then close every session
    pub async fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        self.cancel.cancel();

        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.manager.stop().await;
        tracing::info!(listener = %self.settings.name, "Listener stopped");
    }
}

struct AcceptLoop {
    name: String,
    listener: TcpListener,
    manager: Arc<SessionManager>,
    filter: Option<Arc<dyn ConnectionFilter>>,
    available: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl AcceptLoop {
    async fn run(self) {
        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    if !self.available.load(Ordering::Acquire) {
                        tracing::debug!(listener = %self.name, peer = %peer, "Listener unavailable, closing connection");
                        continue;
                    }
                    if let Some(filter) = &self.filter {
                        if !filter.is_allowed(&peer.ip()) {
                            tracing::info!(listener = %self.name, peer = %peer, "Connection rejected by filter");
                            continue;
                        }
                    }
                    if let Err(err) = stream.set_nodelay(true) {
                        tracing::trace!(peer = %peer, "Unable to set TCP_NODELAY: {}", err);
                    }
                    self.manager.admit(stream, peer).await;
                }
                Err(err) if self.stopping.load(Ordering::Acquire) => {
                    tracing::debug!(listener = %self.name, "Accept interrupted while stopping: {}", err);
                    break;
                }
                Err(err) => {
                    tracing::warn!(listener = %self.name, "Accept failed: {}", err);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
        tracing::debug!(listener = %self.name, "Accept loop exited");
    }
}
