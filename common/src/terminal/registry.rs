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

//! Name to descriptor mapping with aliases and a mandatory default

use super::{TerminalDescriptor, TerminalKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use thiserror::Error;

/// Alias that marks the fallback terminal
pub const DEFAULT_ALIAS: &str = "default";

/// Errors raised while building a [`TerminalRegistry`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No terminal declared the `default` alias
    #[error("No terminal declares the 'default' alias")]
    MissingDefault,

    /// More than one terminal declared the `default` alias
    #[error("Terminals '{0}' and '{1}' both declare the 'default' alias")]
    DuplicateDefault(String, String),

    /// A terminal named an unknown family
    #[error("Unknown terminal kind: {0}")]
    UnknownKind(String),
}

/// Declaration of one terminal type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalDefinition {
    /// Terminal family providing the capabilities
    pub kind: TerminalKind,

    /// Additional names, one of which may be `default`
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl TerminalDefinition {
    pub fn new(kind: TerminalKind, aliases: &[&str]) -> Self {
        Self {
            kind,
            aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
        }
    }
}

/// Insert `key` unless an earlier declaration already claimed it
fn register(
    terminals: &mut HashMap<String, Arc<TerminalDescriptor>>,
    key: String,
    descriptor: &Arc<TerminalDescriptor>,
    declared_by: &str,
) -> bool {
    match terminals.entry(key) {
        Entry::Occupied(entry) => {
            tracing::warn!(
                "Terminal name '{}' declared by '{}' is already taken, keeping the first declaration",
                entry.key(),
                declared_by
            );
            false
        }
        Entry::Vacant(entry) => {
            entry.insert(Arc::clone(descriptor));
            true
        }
    }
}

/// Registry of negotiated terminal type names
#[derive(Debug, Clone)]
pub struct TerminalRegistry {
    terminals: HashMap<String, Arc<TerminalDescriptor>>,
    default: Arc<TerminalDescriptor>,
}

impl TerminalRegistry {
    /// Build a registry from `(name, definition)` pairs.
    ///
    /// Names and aliases are case insensitive. The first declaration of a
    /// name wins. Exactly one alias must be `default`.
    pub fn from_definitions<'a, I>(definitions: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (&'a str, &'a TerminalDefinition)>,
    {
        let mut terminals = HashMap::new();
        let mut default: Option<(String, Arc<TerminalDescriptor>)> = None;

        for (name, definition) in definitions {
            let descriptor = Arc::new(definition.kind.descriptor());
            register(&mut terminals, name.to_ascii_lowercase(), &descriptor, name);

            for alias in &definition.aliases {
                let alias = alias.to_ascii_lowercase();
                if alias == DEFAULT_ALIAS {
                    if let Some((existing, _)) = &default {
                        return Err(RegistryError::DuplicateDefault(
                            existing.clone(),
                            name.to_string(),
                        ));
                    }
                    default = Some((name.to_string(), Arc::clone(&descriptor)));
                } else {
                    register(&mut terminals, alias, &descriptor, name);
                }
            }
        }

        let (name, default) = default.ok_or(RegistryError::MissingDefault)?;
        tracing::debug!(
            "Terminal registry holds {} names, default is {}",
            terminals.len(),
            name
        );
        Ok(Self { terminals, default })
    }

    /// The stock terminal set: vt100, ansi (default), xterm and dumb
    pub fn standard() -> Self {
        let definitions = standard_definitions();
        let mut names: Vec<&String> = definitions.keys().collect();
        names.sort();
        let pairs = names
            .into_iter()
            .filter_map(|name| definitions.get(name).map(|def| (name.as_str(), def)));
        match Self::from_definitions(pairs) {
            Ok(registry) => registry,
            // The stock table always declares exactly one default.
            Err(_) => Self {
                terminals: HashMap::new(),
                default: Arc::new(TerminalKind::Ansi.descriptor()),
            },
        }
    }

    /// Look up `name`, falling back to the default terminal
    pub fn lookup(&self, name: &str) -> Arc<TerminalDescriptor> {
        let key = name.to_ascii_lowercase();
        if key == DEFAULT_ALIAS {
            return Arc::clone(&self.default);
        }
        match self.terminals.get(&key) {
            Some(descriptor) => Arc::clone(descriptor),
            None => {
                tracing::trace!("Unknown terminal type '{}', using default", name);
                Arc::clone(&self.default)
            }
        }
    }

    /// Whether `name` is registered explicitly
    pub fn contains(&self, name: &str) -> bool {
        self.terminals.contains_key(&name.to_ascii_lowercase())
    }

    /// The default descriptor
    pub fn default_terminal(&self) -> Arc<TerminalDescriptor> {
        Arc::clone(&self.default)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.terminals.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Definitions of the stock terminal set
pub fn standard_definitions() -> HashMap<String, TerminalDefinition> {
    HashMap::from([
        (
            "vt100".to_string(),
            TerminalDefinition::new(TerminalKind::Vt100, &["vt100-am", "vt102", "dec-vt100"]),
        ),
        (
            "ansi".to_string(),
            TerminalDefinition::new(
                TerminalKind::Ansi,
                &["default", "color-xterm", "vt320", "vt220", "linux", "screen"],
            ),
        ),
        (
            "xterm".to_string(),
            TerminalDefinition::new(TerminalKind::Xterm, &[]),
        ),
        (
            "dumb".to_string(),
            TerminalDefinition::new(TerminalKind::Dumb, &[]),
        ),
    ])
}
