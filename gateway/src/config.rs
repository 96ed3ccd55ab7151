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

use crate::error::BootError;
use clap::Parser;
use keybridge_common::terminal::registry::{TerminalDefinition, standard_definitions};
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "gateway/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "gateway/.env"
    )]
    pub env_file: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Configuration {
    /// Listeners keyed by name
    #[serde(default)]
    pub listeners: BTreeMap<String, ListenerConfig>,

    /// Terminal types keyed by name
    #[serde(default = "default_terminals")]
    pub terminals: BTreeMap<String, TerminalDefinition>,

    #[serde(default)]
    pub shells: ShellConfig,
}

fn default_terminals() -> BTreeMap<String, TerminalDefinition> {
    standard_definitions().into_iter().collect()
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            listeners: BTreeMap::from([("std".to_string(), ListenerConfig::default())]),
            terminals: default_terminals(),
            shells: ShellConfig::default(),
        }
    }
}

impl Configuration {
    pub fn load(path: &str) -> Result<Self, BootError> {
        tracing::debug!("Loading configuration from file: {}", path);
        let file = std::fs::File::open(path).map_err(|e| BootError::Io(path.to_string(), e))?;
        let conf = serde_yaml::from_reader(file)?;
        Ok(conf)
    }

    /// Parse configuration from a YAML string
    pub fn parse(yaml: &str) -> Result<Self, BootError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check everything that must hold before any listener starts
    pub fn validate(&self) -> Result<(), BootError> {
        if self.listeners.is_empty() {
            return Err(BootError::NoListeners);
        }
        for (name, listener) in &self.listeners {
            listener.validate(name)?;
        }
        Ok(())
    }
}

/// Input mode negotiated with the client
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// The client edits lines locally and sends them on return
    Line,
    /// Every keystroke is sent as it is typed
    #[default]
    Character,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Port to bind, may reference the environment (`"${PORT:-6023}"`)
    pub port: EnvField<u16>,

    /// Local address to bind, IPv4 or IPv6
    #[serde(default = "default_address")]
    pub address: IpAddr,

    /// Accept queue backlog
    #[serde(default = "default_floodprotection")]
    pub floodprotection: u32,

    /// Maximum number of concurrent sessions
    #[serde(default = "default_maxcon")]
    pub maxcon: usize,

    /// Inactivity before the idle warning, in milliseconds
    #[serde(default = "default_time_to_warning")]
    pub time_to_warning: u64,

    /// Inactivity after the warning before the timeout, in milliseconds
    #[serde(default = "default_time_to_timedout")]
    pub time_to_timedout: u64,

    /// Pause between housekeeping sweeps, in milliseconds
    #[serde(default = "default_housekeepinginterval")]
    pub housekeepinginterval: u64,

    /// Name of the first shell every session runs
    #[serde(default)]
    pub loginshell: String,

    #[serde(default)]
    pub inputmode: InputMode,

    /// Connection filter name, `none` or absent for no filtering
    #[serde(default)]
    pub connectionfilter: Option<String>,
}

fn default_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_floodprotection() -> u32 {
    5
}

fn default_maxcon() -> usize {
    25
}

fn default_time_to_warning() -> u64 {
    3_600_000
}

fn default_time_to_timedout() -> u64 {
    60_000
}

fn default_housekeepinginterval() -> u64 {
    1_000
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: EnvField::from(6023),
            address: default_address(),
            floodprotection: default_floodprotection(),
            maxcon: default_maxcon(),
            time_to_warning: default_time_to_warning(),
            time_to_timedout: default_time_to_timedout(),
            housekeepinginterval: default_housekeepinginterval(),
            loginshell: "editor".to_string(),
            inputmode: InputMode::default(),
            connectionfilter: None,
        }
    }
}

impl ListenerConfig {
    fn validate(&self, name: &str) -> Result<(), BootError> {
        if self.loginshell.trim().is_empty() {
            return Err(BootError::MissingLoginShell(name.to_string()));
        }
        if self.maxcon == 0 {
            return Err(BootError::InvalidSetting(
                name.to_string(),
                "maxcon must be at least 1".to_string(),
            ));
        }
        if self.housekeepinginterval == 0 {
            return Err(BootError::InvalidSetting(
                name.to_string(),
                "housekeepinginterval must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved runtime settings for this listener
    pub fn settings(&self, name: &str) -> ListenerSettings {
        ListenerSettings {
            name: name.to_string(),
            port: *self.port,
            address: self.address,
            backlog: self.floodprotection.max(1),
            session: SessionSettings {
                max_connections: self.maxcon,
                warning_timeout: Duration::from_millis(self.time_to_warning),
                disconnect_timeout: Duration::from_millis(self.time_to_timedout),
                housekeeping_interval: Duration::from_millis(self.housekeepinginterval),
                login_shell: self.loginshell.trim().to_string(),
                input_mode: self.inputmode,
            },
        }
    }
}

/// Listener settings after validation
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub name: String,
    pub port: u16,
    pub address: IpAddr,
    pub backlog: u32,
    pub session: SessionSettings,
}

/// Settings the session manager applies to every admitted connection
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_connections: usize,
    pub warning_timeout: Duration,
    pub disconnect_timeout: Duration,
    pub housekeeping_interval: Duration,
    pub login_shell: String,
    pub input_mode: InputMode,
}

impl Default for SessionSettings {
    fn default() -> Self {
        ListenerConfig::default().settings("std").session
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Passcode required by the `passcode` shell, empty to skip the prompt
    #[serde(default)]
    pub passcode: EnvField<String>,

    /// Shell started after a successful passcode prompt
    #[serde(default = "default_next_shell")]
    pub next: String,
}

fn default_next_shell() -> String {
    "editor".to_string()
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            passcode: EnvField::default(),
            next: default_next_shell(),
        }
    }
}
