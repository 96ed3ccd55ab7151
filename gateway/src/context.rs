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

use crate::dispatch::{LoggingSink, SinkFactory};
use crate::shell::ShellRegistry;
use keybridge_common::terminal::TerminalRegistry;
use std::sync::Arc;

/// Server context containing shared resources
#[derive(Clone)]
pub struct ServerContext {
    /// Shell constructors by name
    pub shells: Arc<ShellRegistry>,

    /// Terminal descriptors by name
    pub terminals: Arc<TerminalRegistry>,

    /// Builds the input sink for each session
    pub sink_factory: SinkFactory,
}

impl ServerContext {
    /// Create a new server context
    pub fn new(shells: ShellRegistry, terminals: TerminalRegistry, sink_factory: SinkFactory) -> Self {
        Self {
            shells: Arc::new(shells),
            terminals: Arc::new(terminals),
            sink_factory,
        }
    }

    /// Built-in shells, the stock terminal set and a logging sink
    pub fn standard() -> Self {
        Self::new(
            ShellRegistry::with_builtins(&Default::default()),
            TerminalRegistry::standard(),
            LoggingSink::factory(),
        )
    }

    /// Get the shell registry
    pub fn shells(&self) -> &Arc<ShellRegistry> {
        &self.shells
    }

    /// Get the terminal registry
    pub fn terminals(&self) -> &Arc<TerminalRegistry> {
        &self.terminals
    }
}
