//! Name-keyed registry of executable actions.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{ActionContext, ActionExecutor, ActionFlags, ActionResult};

struct RegisteredAction {
    executor: Arc<dyn ActionExecutor>,
    flags: ActionFlags,
}

/// Maps action names to executors.
///
/// Built once at startup with the consuming `register*` methods, then shared
/// behind an [`Arc`] by the turn runner. Execution is total: an unknown name
/// or a failing executor produces a failed [`ActionResult`] rather than an
/// error, so a turn always has something truthful to report.
#[derive(Default)]
pub struct ActionRegistry {
    executors: FxHashMap<String, RegisteredAction>,
}

impl ActionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an executor under `name` with default flags. Re-registering
    /// a name replaces the previous executor.
    #[must_use]
    pub fn register(
        self,
        name: impl Into<String>,
        executor: impl ActionExecutor + 'static,
    ) -> Self {
        self.register_with(name, executor, ActionFlags::default())
    }

    /// Registers an executor with explicit flags.
    #[must_use]
    pub fn register_with(
        mut self,
        name: impl Into<String>,
        executor: impl ActionExecutor + 'static,
        flags: ActionFlags,
    ) -> Self {
        let name = name.into();
        if self.executors.contains_key(&name) {
            warn!(action = %name, "re-registering action; previous executor replaced");
        }
        self.executors.insert(
            name,
            RegisteredAction {
                executor: Arc::new(executor),
                flags,
            },
        );
        self
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    /// Registration flags for `name`, if registered.
    #[must_use]
    pub fn flags(&self, name: &str) -> Option<ActionFlags> {
        self.executors.get(name).map(|entry| entry.flags)
    }

    /// Registered names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.executors.keys().map(String::as_str)
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    /// Runs the named action, flattening every failure mode into the result.
    #[instrument(skip(self, params, ctx), fields(action = %name))]
    pub async fn execute(
        &self,
        name: &str,
        params: serde_json::Value,
        ctx: &mut ActionContext<'_>,
    ) -> ActionResult {
        let Some(entry) = self.executors.get(name) else {
            warn!(action = %name, "decider invoked unregistered action");
            return ActionResult::fail(format!("unknown action `{name}`"));
        };
        debug!(action = %name, "executing action");
        match entry.executor.execute(params, ctx).await {
            Ok(result) => {
                if !result.success {
                    warn!(
                        action = %name,
                        error = result.error.as_deref().unwrap_or("unspecified"),
                        "action reported failure"
                    );
                }
                result
            }
            Err(source) => {
                warn!(action = %name, error = %source, "action executor errored");
                ActionResult::fail(source.to_string())
            }
        }
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ActionRegistry")
            .field("actions", &names)
            .finish()
    }
}
