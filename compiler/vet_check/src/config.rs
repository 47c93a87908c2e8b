//! Configuration consulted by every contract.
//!
//! `Config` is the mutable, process-level part (enable switch, variance mode,
//! named groups). It is shared as a `SharedConfig` and updated through
//! `ConfigUpdate`, which can be deserialized from any serde format.
//!
//! `Settings` is the per-contract view: which group a contract belongs to,
//! an optional local enable override, and the hierarchy used for nominal
//! checks. Contracts read it on every pass and never mutate it.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use vet_ir::Name;
use vet_types::{Hierarchy, Variance};

/// Name of the group every contract belongs to unless told otherwise.
pub const DEFAULT_GROUP: &str = "default";

/// Type checking mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Invariant,
    Covariant,
    Contravariant,
    Bivariant,
}

impl Mode {
    pub fn variance(self) -> Variance {
        match self {
            Mode::Invariant => Variance::INVARIANT,
            Mode::Covariant => Variance::COVARIANT,
            Mode::Contravariant => Variance::CONTRAVARIANT,
            Mode::Bivariant => Variance::BIVARIANT,
        }
    }
}

/// Errors raised by invalid configuration updates.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot set the 'default' group status through `set`; use the `default` option")]
    DefaultGroupInSet,
}

/// Process-level switches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Master switch. When off, no contract validates anything.
    pub enabled: bool,
    pub mode: Mode,
    /// Status of the `default` group.
    pub default_group: bool,
    /// Status of every other named group. Unknown groups are disabled.
    pub groups: BTreeMap<String, bool>,
}

/// A configuration shared between contracts.
pub type SharedConfig = Arc<RwLock<Config>>;

static GLOBAL_CONFIG: Lazy<SharedConfig> = Lazy::new(|| Arc::new(RwLock::new(Config::default())));

impl Default for Config {
    fn default() -> Self {
        Config {
            enabled: true,
            mode: Mode::Invariant,
            default_group: true,
            groups: BTreeMap::new(),
        }
    }
}

impl Config {
    /// The process-wide configuration.
    pub fn global() -> SharedConfig {
        Arc::clone(&GLOBAL_CONFIG)
    }

    /// A fresh, unshared configuration with default values.
    pub fn shared() -> SharedConfig {
        Arc::new(RwLock::new(Config::default()))
    }

    /// Restore every option to its default.
    pub fn reset(&mut self) {
        *self = Config::default();
    }

    /// Whether `group` is switched on, ignoring the master switch.
    pub fn group_enabled(&self, group: &str) -> bool {
        if group == DEFAULT_GROUP {
            self.default_group
        } else {
            self.groups.get(group).copied().unwrap_or(false)
        }
    }

    /// Apply an update. Nothing changes if the update is rejected.
    ///
    /// Group switches apply in this order: `default`, then the `*_previous`
    /// switches (disable, enable, clear; a later one overrides an earlier
    /// one), then `set`.
    pub fn apply(&mut self, update: ConfigUpdate) -> Result<(), ConfigError> {
        if let Some(groups) = &update.groups {
            if groups.set.contains_key(DEFAULT_GROUP) {
                return Err(ConfigError::DefaultGroupInSet);
            }
        }

        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(groups) = update.groups {
            if let Some(default) = groups.default {
                self.default_group = default;
            }
            if groups.disable_previous {
                self.groups.values_mut().for_each(|status| *status = false);
            }
            if groups.enable_previous {
                self.groups.values_mut().for_each(|status| *status = true);
            }
            if groups.clear_previous {
                self.groups.clear();
            }
            for (name, status) in groups.set {
                if let Some(status) = status {
                    self.groups.insert(name, status);
                }
            }
        }
        tracing::debug!(config = ?self, "configuration updated");
        Ok(())
    }
}

/// A partial configuration change. Absent fields leave options untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigUpdate {
    pub enabled: Option<bool>,
    pub mode: Option<Mode>,
    pub groups: Option<GroupsUpdate>,
}

/// Changes to named groups.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupsUpdate {
    /// Group statuses to set. `None` leaves a group untouched.
    pub set: BTreeMap<String, Option<bool>>,
    /// New status of the `default` group.
    pub default: Option<bool>,
    pub disable_previous: bool,
    pub enable_previous: bool,
    pub clear_previous: bool,
}

/// Per-contract view of the configuration.
#[derive(Clone, Debug)]
pub struct Settings {
    group: Name,
    enabled: Option<bool>,
    config: SharedConfig,
    hierarchy: Arc<Hierarchy>,
}

impl Settings {
    pub fn new(config: SharedConfig, hierarchy: Arc<Hierarchy>) -> Self {
        Settings {
            group: Name::new(DEFAULT_GROUP),
            enabled: None,
            config,
            hierarchy,
        }
    }

    /// Settings backed by the process-wide configuration and hierarchy.
    pub fn global() -> Self {
        Settings::new(Config::global(), Hierarchy::global())
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<Name>) -> Self {
        self.group = group.into();
        self
    }

    /// Override the group status for this contract. `None` defers to the
    /// group.
    #[must_use]
    pub fn with_enabled(mut self, enabled: Option<bool>) -> Self {
        self.enabled = enabled;
        self
    }

    /// Master switch AND (local override, else group status).
    pub fn enabled(&self) -> bool {
        let config = self.config.read();
        if !config.enabled {
            return false;
        }
        match self.enabled {
            Some(enabled) => enabled,
            None => config.group_enabled(self.group.as_str()),
        }
    }

    /// The variance requested by the current mode.
    pub fn variance(&self) -> Variance {
        self.config.read().mode.variance()
    }

    #[inline]
    pub fn group(&self) -> &Name {
        &self.group
    }

    #[inline]
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    #[inline]
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    #[inline]
    pub fn shared_hierarchy(&self) -> &Arc<Hierarchy> {
        &self.hierarchy
    }
}
