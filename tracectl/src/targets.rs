// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Link-time registry of tracing targets declared across all linked crates

use crate::LevelFilter;
use linkme::distributed_slice;

/// A tracing target declared with [`trace_target!`] or [`custom_target!`].
///
/// [`trace_target!`]: crate::trace_target
/// [`custom_target!`]: crate::custom_target
#[derive(Debug)]
pub struct TargetDecl {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: &'static [&'static str],
}

impl TargetDecl {
    #[must_use]
    pub const fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        Self {
            target,
            name,
            level,
            tags,
        }
    }
}

/// Every target declared in the final binary.
#[distributed_slice]
pub static TRACING_TARGETS: [TargetDecl];

#[doc(hidden)]
#[macro_export]
macro_rules! trace_target_deps {
    () => {
        use linkme::distributed_slice;
        use $crate::LevelFilter;
        use $crate::targets::{TRACING_TARGETS, TargetDecl};
    };
}

/// Declare the tracing target of the calling module, with a name, a default level and tags.
///
/// Callers need `linkme` among their dependencies.
#[macro_export]
macro_rules! trace_target {
    // The const scope lets the macro be invoked several times per crate without name clashes.
    ($name:expr, $level:expr, $tags:expr) => {
        const _: () = {
            $crate::trace_target_deps!();

            #[distributed_slice(TRACING_TARGETS)]
            static TRACE_TGT: TargetDecl = TargetDecl::new(module_path!(), $name, $level, $tags);
        };
    };
}

/// Declare a tracing target with an explicit target string.
#[macro_export]
macro_rules! custom_target {
    ($target:expr, $level:expr, $tags:expr) => {
        const _: () = {
            $crate::trace_target_deps!();

            #[distributed_slice(TRACING_TARGETS)]
            static TRACE_TGT: TargetDecl = TargetDecl::new($target, $target, $level, $tags);
        };
    };
}
