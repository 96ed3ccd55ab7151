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

use crate::config::InputMode;
use chrono::{DateTime, Utc};
use keybridge_common::locale;
use keybridge_common::terminal::registry::DEFAULT_ALIAS;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::time::Instant;

/// Columns assumed until the client reports its window size
pub const DEFAULT_COLUMNS: u16 = 80;

/// Rows assumed until the client reports its window size
pub const DEFAULT_ROWS: u16 = 25;

/// Per-connection record
#[derive(Debug, Clone)]
pub struct SessionMetadata {
    /// Remote address
    pub address: IpAddr,

    /// Remote port
    pub port: u16,

    /// Remote host name, the address text until the host sets one
    pub host_name: String,

    /// Locale guessed from the host name's domain
    pub locale: String,

    /// Terminal type reported by the client
    pub terminal_type: String,

    /// Window width in columns
    pub columns: u16,

    /// Window height in rows
    pub rows: u16,

    /// Set when the window size changed since it was last read
    pub geometry_changed: bool,

    /// Time of the last inbound byte
    pub last_activity: Instant,

    /// Set once the idle warning fired
    pub warned: bool,

    /// First shell the session runs
    pub login_shell: String,

    pub input_mode: InputMode,

    /// Variables reported by the client
    pub environment: HashMap<String, String>,

    /// Wall clock time of acceptance
    pub connected_at: DateTime<Utc>,
}

impl SessionMetadata {
    pub fn new(peer: SocketAddr, login_shell: &str, input_mode: InputMode) -> Self {
        let host_name = peer.ip().to_string();
        Self {
            address: peer.ip(),
            port: peer.port(),
            locale: locale::guess_locale(&host_name).to_string(),
            host_name,
            terminal_type: DEFAULT_ALIAS.to_string(),
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
            geometry_changed: false,
            last_activity: Instant::now(),
            warned: false,
            login_shell: login_shell.to_string(),
            input_mode,
            environment: HashMap::new(),
            connected_at: Utc::now(),
        }
    }

    /// Record activity, clearing the idle warning
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
        self.warned = false;
    }

    /// Time since the last recorded activity
    pub fn inactivity(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_activity)
    }

    /// Set the host name and re-guess the locale from it
    pub fn set_host_name(&mut self, host_name: &str) {
        self.host_name = host_name.to_string();
        self.locale = locale::guess_locale(host_name).to_string();
    }

    /// Store a reported window size
    pub fn set_geometry(&mut self, columns: u16, rows: u16) {
        if columns > 0 && rows > 0 {
            self.columns = columns;
            self.rows = rows;
            self.geometry_changed = true;
        }
    }

    /// Read and clear the geometry changed flag
    pub fn take_geometry_changed(&mut self) -> bool {
        std::mem::take(&mut self.geometry_changed)
    }

    /// Remote endpoint
    pub fn peer(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> SessionMetadata {
        SessionMetadata::new("10.1.2.3:4567".parse().unwrap(), "editor", InputMode::Character)
    }

    #[test]
    fn test_new_metadata() {
        let meta = metadata();
        assert_eq!(meta.host_name, "10.1.2.3");
        assert_eq!(meta.port, 4567);
        assert_eq!(meta.locale, locale::DEFAULT_LOCALE);
        assert_eq!(meta.terminal_type, "default");
        assert_eq!((meta.columns, meta.rows), (80, 25));
        assert!(!meta.warned);
    }

    #[test]
    fn test_host_name_changes_locale() {
        let mut meta = metadata();
        meta.set_host_name("client.example.fr");
        assert_eq!(meta.locale, "fr_FR");
    }

    #[test]
    fn test_geometry_flag_reads_once() {
        let mut meta = metadata();
        meta.set_geometry(132, 43);
        assert!(meta.take_geometry_changed());
        assert!(!meta.take_geometry_changed());
        meta.set_geometry(0, 10);
        assert_eq!(meta.columns, 132);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_resets_warning() {
        let mut meta = metadata();
        meta.warned = true;
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(meta.inactivity(), Duration::from_secs(5));
        meta.touch();
        assert!(!meta.warned);
        assert_eq!(meta.inactivity(), Duration::ZERO);
    }
}
