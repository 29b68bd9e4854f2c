// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing runtime control.

use ordermap::OrderMap;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, prelude::*, reload};

use crate::targets::TRACING_TARGETS;
use crate::trace_target;

trace_target!("tracectl", LevelFilter::INFO, &[]);

/// Errors raised while changing the tracing configuration.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// A level string did not parse.
    #[error("invalid level '{0}'")]
    InvalidLevel(String),
    /// A configuration item was not of the form `tag=level`.
    #[error("invalid item '{0}': expected tag=level")]
    Syntax(String),
    /// A target produced an invalid filter directive.
    #[error("invalid filter directive: {0}")]
    Directive(#[from] tracing_subscriber::filter::ParseError),
    /// A thread panicked while holding the configuration.
    #[error("tracing configuration lock is poisoned")]
    Poisoned,
}

/// Configuration of one target.
#[derive(Debug, Clone)]
pub struct TargetCfg {
    pub target: &'static str,
    pub name: &'static str,
    pub level: LevelFilter,
    pub tags: Vec<&'static str>,
}

impl TargetCfg {
    fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        // the name always doubles as a tag
        let mut tags = tags.to_vec();
        if !tags.contains(&name) {
            tags.push(name);
        }
        Self {
            target,
            name,
            level,
            tags,
        }
    }
}

/// Targets sharing a tag.
#[derive(Debug, Clone)]
pub struct Tag {
    pub tag: &'static str,
    pub targets: HashSet<&'static str>,
}

#[derive(Debug)]
pub(crate) struct TargetCfgDb {
    pub(crate) level: LevelFilter,
    pub(crate) targets: OrderMap<&'static str, TargetCfg>,
    pub(crate) tags: OrderMap<&'static str, Tag>,
}

impl TargetCfgDb {
    fn new(level: LevelFilter) -> Self {
        let mut db = Self {
            level,
            targets: OrderMap::new(),
            tags: OrderMap::new(),
        };
        for decl in TRACING_TARGETS {
            db.register(decl.target, decl.name, decl.level, decl.tags);
        }
        db
    }

    fn register(
        &mut self,
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) {
        let cfg = TargetCfg::new(target, name, level, tags);
        for &tag in &cfg.tags {
            self.tags
                .entry(tag)
                .or_insert_with(|| Tag {
                    tag,
                    targets: HashSet::new(),
                })
                .targets
                .insert(target);
        }
        if self.targets.insert(target, cfg).is_some() {
            warn!("Target {target} has been declared more than once");
        }
    }

    fn env_filter(&self) -> Result<EnvFilter, TracingError> {
        let mut filter = EnvFilter::new(self.level.to_string());
        for target in self.targets.values() {
            filter = filter.add_directive(format!("{}={}", target.target, target.level).parse()?);
        }
        Ok(filter)
    }

    fn tag_targets_mut(&mut self, tag: &str) -> impl Iterator<Item = &mut TargetCfg> {
        let members = self.tags.get(tag).map(|t| t.targets.clone()).unwrap_or_default();
        self.targets
            .values_mut()
            .filter(move |target| members.contains(target.target))
    }

    pub(crate) fn as_config_string(&self) -> String {
        let mut out = format!("default={}", self.level);
        for target in self.targets.values() {
            out += &format!(",{}={}", target.name, target.level);
        }
        out
    }
}

/// Owner of the global subscriber's filter.
#[derive(Debug)]
pub struct TracingControl {
    db: Mutex<TargetCfgDb>,
    reload_filter: reload::Handle<EnvFilter, Registry>,
}

static TRACING_CTL: OnceLock<TracingControl> = OnceLock::new();

/// Get the process-wide [`TracingControl`], installing the subscriber on first use.
pub fn get_trace_ctl() -> &'static TracingControl {
    TRACING_CTL.get_or_init(TracingControl::new)
}

impl TracingControl {
    fn new() -> Self {
        let db = TargetCfgDb::new(LevelFilter::INFO);
        let initial = db
            .env_filter()
            .unwrap_or_else(|_| EnvFilter::new(db.level.to_string()));
        let (filter, reload_filter) = reload::Layer::new(initial);

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_line_number(true)
            .with_target(true)
            .with_thread_names(true)
            .with_level(true);

        if let Err(e) = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
        {
            warn!("A global subscriber is already installed: {e}");
        }

        Self {
            db: Mutex::new(db),
            reload_filter,
        }
    }

    /// Install the subscriber if it is not installed yet.
    pub fn init() {
        get_trace_ctl();
    }

    fn db(&self) -> Result<MutexGuard<'_, TargetCfgDb>, TracingError> {
        self.db.lock().map_err(|_| TracingError::Poisoned)
    }

    fn reload(&self, db: &TargetCfgDb) -> Result<(), TracingError> {
        let filter = db.env_filter()?;
        if let Err(e) = self.reload_filter.reload(filter) {
            warn!("Failed to reload tracing filter: {e}");
        }
        Ok(())
    }

    /// Set the level of every target carrying `tag`. Returns the number of targets changed.
    ///
    /// # Errors
    ///
    /// Fails if the resulting filter cannot be built.
    pub fn set_tag_level(&self, tag: &str, level: LevelFilter) -> Result<usize, TracingError> {
        let mut db = self.db()?;
        let mut changed = 0;
        for target in db.tag_targets_mut(tag) {
            if target.level != level {
                target.level = level;
                changed += 1;
            }
        }
        if changed > 0 {
            self.reload(&db)?;
        }
        info!("Changed log level for tag '{tag}' to {level}. Targets changed: {changed}");
        Ok(changed)
    }

    /// Set the level applied to events from undeclared targets.
    ///
    /// # Errors
    ///
    /// Fails if the resulting filter cannot be built.
    pub fn set_default_level(&self, level: LevelFilter) -> Result<(), TracingError> {
        let mut db = self.db()?;
        if db.level != level {
            db.level = level;
            info!("Set default log level to {level}");
            self.reload(&db)?;
        }
        Ok(())
    }

    /// The level applied to events from undeclared targets.
    ///
    /// # Errors
    ///
    /// Fails if the configuration lock is poisoned.
    pub fn default_level(&self) -> Result<LevelFilter, TracingError> {
        Ok(self.db()?.level)
    }

    /// Parse comma separated `tag=level` items; `default` sets the default level.
    fn parse_config(input: &str) -> Result<OrderMap<String, LevelFilter>, TracingError> {
        let mut result = OrderMap::new();
        for item in input.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (tag, level) = item
                .split_once('=')
                .ok_or_else(|| TracingError::Syntax(item.to_string()))?;
            let level = LevelFilter::from_str(level.trim())
                .map_err(|_| TracingError::InvalidLevel(level.trim().to_string()))?;
            result.insert(tag.trim().to_string(), level);
        }
        Ok(result)
    }

    /// Apply a configuration string such as `default=warn,nat=debug,ndisc=trace`.
    ///
    /// Nothing is applied if any item is malformed.
    ///
    /// # Errors
    ///
    /// Fails on malformed items or unknown levels.
    pub fn setup_from_string(&self, input: &str) -> Result<(), TracingError> {
        let config = Self::parse_config(input)?;
        for (tag, level) in &config {
            if tag == "default" {
                self.set_default_level(*level)?;
            } else {
                self.set_tag_level(tag, *level)?;
            }
        }
        Ok(())
    }

    /// Configuration of `target`, if declared.
    #[must_use]
    pub fn get_target(&self, target: &str) -> Option<TargetCfg> {
        self.db().ok()?.targets.get(target).cloned()
    }

    /// Targets carrying `tag`.
    #[must_use]
    pub fn get_targets_by_tag(&self, tag: &str) -> Vec<TargetCfg> {
        let Ok(db) = self.db() else {
            return vec![];
        };
        let Some(members) = db.tags.get(tag) else {
            return vec![];
        };
        db.targets
            .values()
            .filter(|t| members.targets.contains(t.target))
            .cloned()
            .collect()
    }

    /// A configuration string reproducing the current levels.
    ///
    /// # Errors
    ///
    /// Fails if the configuration lock is poisoned.
    pub fn as_config_string(&self) -> Result<String, TracingError> {
        Ok(self.db()?.as_config_string())
    }

    /// Log the current configuration.
    pub fn dump(&self) {
        if let Ok(db) = self.db() {
            info!("{db}");
        }
    }
}
