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

//! Gateway error types

use keybridge_common::terminal::RegistryError;
use thiserror::Error;

/// Fatal startup failures. The gateway never runs with partial configuration.
#[derive(Debug, Error)]
pub enum BootError {
    /// The configuration file could not be read.
    #[error("Failed to open config file {0}: {1}")]
    Io(String, #[source] std::io::Error),

    /// The configuration file is not valid YAML for this schema.
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// No listener was declared.
    #[error("No listeners configured")]
    NoListeners,

    /// A listener has no login shell.
    #[error("Listener '{0}' has no login shell")]
    MissingLoginShell(String),

    /// A listener names a shell that is not registered.
    #[error("Listener '{listener}' uses unknown login shell '{shell}'")]
    UnknownShell { listener: String, shell: String },

    /// A listener names a connection filter that does not exist.
    #[error("Listener '{listener}' uses unknown connection filter '{filter}'")]
    UnknownFilter { listener: String, filter: String },

    /// A listener setting is out of range.
    #[error("Listener '{0}': {1}")]
    InvalidSetting(String, String),

    /// The terminal table is inconsistent.
    #[error("Terminal configuration error: {0}")]
    Terminal(#[from] RegistryError),

    /// The listening socket could not be set up.
    #[error("Failed to bind listener '{0}' on port {1}: {2}")]
    Bind(String, u16, #[source] std::io::Error),
}

/// Failures scoped to a single session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading from or writing to the channel failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session was closed or the peer went away.
    #[error("Session closed")]
    Closed,

    /// A shell name was not found in the registry.
    #[error("Unknown shell: {0}")]
    UnknownShell(String),

    /// The client failed the passcode prompt.
    #[error("Authentication failed")]
    Authentication,

    /// A lifecycle listener reported a failure.
    #[error("Listener failure: {0}")]
    Listener(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
