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

//! Keybridge Gateway Library
//!
//! This library provides the runtime of the Keybridge telnet server: port
//! listeners, session management, telnet channel handling and the shells
//! sessions run.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod listener;
pub mod server;
pub mod session;
pub mod shell;
pub mod telnet;
pub mod terminal_io;

// Re-export commonly used types
pub use context::ServerContext;
pub use dispatch::{ChannelSink, InputSink, LoggingSink, SinkFactory};
pub use error::{BootError, SessionError, SessionResult};
pub use server::TelnetDaemon;
pub use session::manager::SessionManager;
pub use session::{Session, SessionEvent, SessionEventKind, SessionListener};
pub use shell::{Shell, ShellRegistry};
