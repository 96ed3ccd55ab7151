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

//! Telnet daemon
//!
//! Builds the shared context and one [`PortListener`] per configured
//! listener. All validation happens in [`TelnetDaemon::from_config`], so a
//! daemon that was built has a consistent configuration.

use crate::config::Configuration;
use crate::context::ServerContext;
use crate::dispatch::{LoggingSink, SinkFactory};
use crate::error::BootError;
use crate::listener::PortListener;
use crate::listener::filter;
use crate::shell::ShellRegistry;
use keybridge_common::terminal::TerminalRegistry;
use std::net::SocketAddr;
use std::sync::Arc;

/// Every listener of one configuration
pub struct TelnetDaemon {
    context: Arc<ServerContext>,
    listeners: Vec<PortListener>,
}

impl TelnetDaemon {
    /// Validate `config` and build the daemon with a logging input sink
    pub fn from_config(config: &Configuration) -> Result<Self, BootError> {
        Self::with_sink(config, LoggingSink::factory())
    }

    /// Validate `config` and build the daemon feeding `sink_factory`
    pub fn with_sink(config: &Configuration, sink_factory: SinkFactory) -> Result<Self, BootError> {
        config.validate()?;

        let terminals = TerminalRegistry::from_definitions(
            config
                .terminals
                .iter()
                .map(|(name, definition)| (name.as_str(), definition)),
        )?;
        let shells = ShellRegistry::with_builtins(&config.shells);
        let context = Arc::new(ServerContext::new(shells, terminals, sink_factory));

        let mut listeners = Vec::with_capacity(config.listeners.len());
        for (name, listener_config) in &config.listeners {
            let settings = listener_config.settings(name);
            if !context.shells.contains(&settings.session.login_shell) {
                return Err(BootError::UnknownShell {
                    listener: name.clone(),
                    shell: settings.session.login_shell,
                });
            }
            let connection_filter = filter::connection_filter(
                listener_config.connectionfilter.as_deref(),
            )
            .map_err(|filter| BootError::UnknownFilter {
                listener: name.clone(),
                filter,
            })?;
            listeners.push(PortListener::new(
                settings,
                Arc::clone(&context),
                connection_filter,
            ));
        }

        Ok(Self { context, listeners })
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    /// Start every listener, returning the bound addresses in name order
    pub fn start(&self) -> Result<Vec<SocketAddr>, BootError> {
        let mut addresses = Vec::with_capacity(self.listeners.len());
        for listener in &self.listeners {
            addresses.push(listener.start()?);
        }
        Ok(addresses)
    }

    /// Stop every listener and close every session
    pub async fn stop(&self) {
        for listener in &self.listeners {
            listener.set_available(false);
        }
        for listener in &self.listeners {
            listener.stop().await;
        }
    }

    /// Look a listener up by name
    pub fn listener(&self, name: &str) -> Option<&PortListener> {
        self.listeners.iter().find(|listener| listener.name() == name)
    }

    pub fn listeners(&self) -> &[PortListener] {
        &self.listeners
    }
}
