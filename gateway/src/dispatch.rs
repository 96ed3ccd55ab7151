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

//! Serialized delivery of decoded input to the host application
//!
//! Each session owns one [`Dispatcher`]. The dispatcher task is the only
//! place the session's [`InputSink`] is called, so the sink never sees
//! concurrent calls. [`Dispatcher::post`] waits until the event has been
//! applied, which keeps events in arrival order. Cancelling the session
//! token releases a pending [`Dispatcher::post`] and stops the task, even
//! while the sink is stuck inside `apply`.

use crate::session::metadata::SessionMetadata;
use async_trait::async_trait;
use keybridge_common::decoder::InputEvent;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Receiver of decoded input, supplied by the embedding application
#[async_trait]
pub trait InputSink: Send {
    /// Apply one event. Called from a single task, one event at a time.
    async fn apply(&mut self, event: InputEvent);
}

/// Builds the sink for a newly started session
pub type SinkFactory = Arc<dyn Fn(Uuid, &SessionMetadata) -> Box<dyn InputSink> + Send + Sync>;

/// Sink that only logs what it receives
#[derive(Debug)]
pub struct LoggingSink {
    session_id: Uuid,
}

impl LoggingSink {
    pub fn new(session_id: Uuid) -> Self {
        Self { session_id }
    }

    /// Factory producing a [`LoggingSink`] per session
    pub fn factory() -> SinkFactory {
        Arc::new(
            |session_id: Uuid, _: &SessionMetadata| -> Box<dyn InputSink> {
                Box::new(LoggingSink::new(session_id))
            },
        )
    }
}

#[async_trait]
impl InputSink for LoggingSink {
    async fn apply(&mut self, event: InputEvent) {
        tracing::debug!(session_id = %self.session_id, "Input: {:?}", event);
    }
}

/// Sink forwarding every event, tagged with its session, to a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    session_id: Uuid,
    sender: mpsc::UnboundedSender<(Uuid, InputEvent)>,
}

impl ChannelSink {
    pub fn new(session_id: Uuid, sender: mpsc::UnboundedSender<(Uuid, InputEvent)>) -> Self {
        Self { session_id, sender }
    }

    /// Factory producing a [`ChannelSink`] per session, all feeding `sender`
    pub fn factory(sender: mpsc::UnboundedSender<(Uuid, InputEvent)>) -> SinkFactory {
        Arc::new(
            move |session_id: Uuid, _: &SessionMetadata| -> Box<dyn InputSink> {
                Box::new(ChannelSink::new(session_id, sender.clone()))
            },
        )
    }
}

#[async_trait]
impl InputSink for ChannelSink {
    async fn apply(&mut self, event: InputEvent) {
        if self.sender.send((self.session_id, event)).is_err() {
            tracing::trace!(session_id = %self.session_id, "Input receiver is gone");
        }
    }
}

/// Message types for the dispatcher task
#[derive(Debug)]
enum DispatchMessage {
    /// Apply an event, then signal completion
    Apply {
        event: InputEvent,
        done: oneshot::Sender<()>,
    },

    /// Stop the dispatcher task
    Shutdown,
}

/// Single serialization point between a session and its sink
pub struct Dispatcher {
    sender: mpsc::Sender<DispatchMessage>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn the dispatcher task for `sink`, stopping when `cancel` fires
    pub fn spawn(session_id: Uuid, mut sink: Box<dyn InputSink>, cancel: CancellationToken) -> Self {
        let (sender, mut receiver) = mpsc::channel(1);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    _ = token.cancelled() => break,
                    message = receiver.recv() => message,
                };
                match message {
                    Some(DispatchMessage::Apply { event, done }) => {
                        tokio::select! {
                            _ = token.cancelled() => {
                                tracing::debug!(session_id = %session_id, "Input sink abandoned mid-apply");
                                break;
                            }
                            _ = sink.apply(event) => {
                                let _ = done.send(());
                            }
                        }
                    }
                    Some(DispatchMessage::Shutdown) | None => break,
                }
            }
            tracing::trace!(session_id = %session_id, "Dispatcher stopped");
        });
        Self {
            sender,
            cancel,
            task: Some(task),
        }
    }

    /// Hand `event` to the sink and wait until it has been applied.
    ///
    /// Returns false when the dispatcher stopped or the session was
    /// cancelled before the event was applied; callers treat that as a
    /// request to stop.
    pub async fn post(&self, event: InputEvent) -> bool {
        let (done, applied) = oneshot::channel();
        let message = DispatchMessage::Apply { event, done };
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            delivered = async {
                self.sender.send(message).await.is_ok() && applied.await.is_ok()
            } => delivered,
        }
    }

    /// Stop the task once already posted events are applied
    pub async fn shutdown(mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if self.cancel.is_cancelled() {
            task.abort();
            return;
        }
        let abort = task.abort_handle();
        tokio::select! {
            _ = self.cancel.cancelled() => abort.abort(),
            _ = async {
                let _ = self.sender.send(DispatchMessage::Shutdown).await;
                let _ = task.await;
            } => {}
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
