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

//! Gateway shell system
//!
//! A shell is the behavior a session runs. Shells are created by name from
//! a [`ShellRegistry`] of constructor functions; the registry is filled at
//! startup and never changes afterwards.

pub mod editor;
pub mod info;
pub mod passcode;

use crate::config::ShellConfig;
use crate::error::SessionResult;
use crate::session::{Session, SessionEvent, SessionEventKind, SessionListener};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Behavior run by a session
#[async_trait]
pub trait Shell: Send + Sync {
    /// Run until done. Returning `Ok` lets the session continue with a
    /// queued next shell; returning an error closes it.
    async fn run(&mut self, session: Arc<Session>) -> SessionResult<()>;
}

/// Closes the session when housekeeping reports it timed out.
///
/// Shells without their own lifecycle handling attach this while they run.
pub(crate) struct TimeoutListener;

impl TimeoutListener {
    /// Register a new listener on `session`, returning it for removal
    pub(crate) fn attach(session: &Session) -> Arc<dyn SessionListener> {
        let listener: Arc<dyn SessionListener> = Arc::new(TimeoutListener);
        session.add_listener(Arc::clone(&listener));
        listener
    }
}

#[async_trait]
impl SessionListener for TimeoutListener {
    async fn on_event(&self, event: &SessionEvent) -> SessionResult<()> {
        if event.kind == SessionEventKind::TimedOut {
            let session = &event.session;
            tracing::info!(session_id = %session.id(), "Closing idle session");
            let _ = session.io().write_line("\r\nIdle timeout, disconnecting.").await;
            session.close().await;
        }
        Ok(())
    }
}

/// Builds a fresh shell instance
pub type ShellConstructor = Arc<dyn Fn() -> Box<dyn Shell> + Send + Sync>;

/// Shell that returns at once
#[derive(Debug, Default)]
pub struct DummyShell;

#[async_trait]
impl Shell for DummyShell {
    async fn run(&mut self, _session: Arc<Session>) -> SessionResult<()> {
        Ok(())
    }
}

/// Shell constructors by name
#[derive(Clone, Default)]
pub struct ShellRegistry {
    constructors: HashMap<String, ShellConstructor>,
}

impl ShellRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `dummy`, `info`, `editor` and `passcode`
    pub fn with_builtins(config: &ShellConfig) -> Self {
        let mut registry = Self::new();
        registry.register("dummy", || Box::new(DummyShell));
        registry.register("info", || Box::new(info::InfoShell::new()));
        registry.register("editor", || Box::new(editor::EditorShell::new()));

        let code = config.passcode.as_str().to_string();
        let next = config.next.clone();
        registry.register("passcode", move || {
            Box::new(passcode::PasscodeShell::new(&code, &next))
        });
        registry
    }

    /// Register `constructor` under `name`, replacing any earlier entry
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn Shell> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_string(), Arc::new(constructor));
    }

    /// Create the shell registered under `name`
    pub fn create(&self, name: &str) -> Option<Box<dyn Shell>> {
        self.constructors.get(name).map(|constructor| constructor())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = ShellRegistry::with_builtins(&ShellConfig::default());
        assert_eq!(
            registry.names(),
            vec!["dummy", "editor", "info", "passcode"]
        );
        assert!(registry.contains("editor"));
        assert!(!registry.contains("Editor"));
        assert!(registry.create("info").is_some());
        assert!(registry.create("nope").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ShellRegistry::new();
        registry.register("login", || Box::new(DummyShell));
        registry.register("login", || Box::new(info::InfoShell::new()));
        assert_eq!(registry.names(), vec!["login"]);
    }
}
