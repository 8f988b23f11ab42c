use crate::factory::{LoadError, LoadFailure, RegistryError, ToolFactory};
use crate::orphan::OrphanSupervisor;
use crate::validate;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use switchboard_core::{
    AppError, CallScope, ErrorCode, Interrupt, ParamMap, RegistryConfig, Tool, ToolDescriptor,
    ToolEntry,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_ORPHAN_GRACE: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Catalog {
    tools: HashMap<String, Arc<dyn Tool>>,
    factories: HashMap<String, Arc<dyn ToolFactory>>,
}

// ============================================================================
// Registry
// ============================================================================

/// Concurrency-safe catalog of tools with timeout-bounded execution.
///
/// Structural changes take the write lock. Lookups take the read lock only
/// long enough to clone the tool handle, so no lock is held while a tool body
/// runs and tool bodies may call back into the registry.
pub struct Registry {
    catalog: RwLock<Catalog>,
    timeout: Duration,
    orphans: OrphanSupervisor,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            catalog: RwLock::new(Catalog::default()),
            timeout,
            orphans: OrphanSupervisor::new(DEFAULT_ORPHAN_GRACE),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::with_timeout(config.timeout()).with_orphan_grace(config.orphan_grace())
    }

    pub fn with_orphan_grace(mut self, grace: Duration) -> Self {
        self.orphans = OrphanSupervisor::new(grace);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Executions abandoned on timeout or cancellation that are still running.
    pub fn orphaned(&self) -> usize {
        self.orphans.live()
    }

    pub fn orphans(&self) -> &OrphanSupervisor {
        &self.orphans
    }

    /// A poisoned lock only means a panic happened elsewhere while holding
    /// it; every write below leaves the maps consistent, so keep going.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Add a tool. A name that is already taken is rejected and the existing
    /// tool stays in place.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        let mut catalog = self.write();
        if catalog.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        catalog.tools.insert(name.clone(), tool);
        drop(catalog);
        tracing::debug!("Registered tool: {}", name);
        Ok(())
    }

    /// Associate a type tag with a factory. Replaces any previous factory
    /// for the same tag.
    pub fn register_factory(&self, kind: &str, factory: impl ToolFactory + 'static) {
        let replaced = self
            .write()
            .factories
            .insert(kind.to_string(), Arc::new(factory))
            .is_some();
        if replaced {
            tracing::debug!("Replaced tool factory: {}", kind);
        } else {
            tracing::debug!("Registered tool factory: {}", kind);
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.write().tools.remove(name).is_some();
        if removed {
            tracing::debug!("Unregistered tool: {}", name);
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.read().tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Descriptors for every registered tool, sorted by name.
    pub fn describe(&self) -> Vec<ToolDescriptor> {
        let tools: Vec<Arc<dyn Tool>> = self.read().tools.values().cloned().collect();
        let mut descriptors: Vec<ToolDescriptor> = tools.iter().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn factory_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.read().factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    // ------------------------------------------------------------------
    // Bulk loading
    // ------------------------------------------------------------------

    /// Build and register every enabled entry. A failing entry is recorded
    /// and loading moves on to the next one.
    ///
    /// Returns the number of tools registered, or every failure together with
    /// that number.
    pub fn load_from_config(&self, entries: &[ToolEntry]) -> Result<usize, LoadError> {
        let mut loaded = 0;
        let mut failures = Vec::new();

        for entry in entries {
            if !entry.enabled {
                tracing::info!("Skipping tool '{}' (enabled=false)", entry.name);
                continue;
            }
            match self.load_entry(entry) {
                Ok(()) => loaded += 1,
                Err(error) => {
                    tracing::warn!(
                        "Failed to load tool '{}' (type '{}'): {}",
                        entry.name,
                        entry.kind,
                        error
                    );
                    failures.push(LoadFailure {
                        name: entry.name.clone(),
                        kind: entry.kind.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            "Loaded {} tool(s) from config ({} failed)",
            loaded,
            failures.len()
        );
        if failures.is_empty() {
            Ok(loaded)
        } else {
            Err(LoadError { loaded, failures })
        }
    }

    fn load_entry(&self, entry: &ToolEntry) -> Result<(), RegistryError> {
        let factory = self
            .read()
            .factories
            .get(&entry.kind)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownType(entry.kind.clone()))?;
        let tool = factory.build(entry).map_err(RegistryError::Build)?;
        self.register(tool)
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Validate `params` and run the named tool on its own task, bounded by
    /// the registry timeout and by `scope`'s deadline and cancellation.
    ///
    /// The tool's own result or error is returned unchanged, unless the
    /// caller's scope was cancelled by the time it arrived. If the caller
    /// stops waiting first, the tool's scope is cancelled and the task is
    /// handed to the orphan supervisor.
    pub async fn execute(
        &self,
        scope: &CallScope,
        name: &str,
        params: ParamMap,
    ) -> Result<ParamMap, AppError> {
        let tool = self.get(name).ok_or_else(|| AppError::tool_not_found(name))?;
        let params =
            validate::validate(&tool.schema(), params).map_err(|e| e.with_extra("tool", name))?;

        let child = scope.with_timeout(self.timeout);
        let task_scope = child.clone();
        let mut handle = tokio::spawn(async move { tool.execute(&task_scope, params).await });

        tokio::select! {
            biased;
            joined = &mut handle => match joined {
                // Cancelling the caller wakes the tool and `done()` together;
                // whatever the tool returned in reaction is not its answer.
                Ok(_) if scope.is_cancelled() => {
                    Err(self.interrupted(name, Interrupt::Cancelled))
                }
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(AppError::wrap(
                    ErrorCode::Internal,
                    format!("tool '{}' panicked", name),
                    e,
                )
                .with_extra("tool", name)),
                Err(e) => Err(AppError::wrap(
                    ErrorCode::Internal,
                    format!("tool '{}' was aborted", name),
                    e,
                )
                .with_extra("tool", name)),
            },
            reason = child.done() => {
                child.cancel();
                self.orphans.adopt(name, handle);
                Err(self.interrupted(name, reason))
            }
        }
    }

    fn interrupted(&self, name: &str, reason: Interrupt) -> AppError {
        match reason {
            Interrupt::DeadlineExceeded => {
                tracing::warn!("Tool '{}' timed out", name);
                AppError::wrap(
                    ErrorCode::ToolTimeout,
                    format!("tool '{}' did not finish before its deadline", name),
                    reason,
                )
                .with_extra("tool", name)
                .with_extra("timeout_ms", self.timeout.as_millis() as u64)
            }
            Interrupt::Cancelled => {
                tracing::info!("Tool '{}' cancelled by caller", name);
                AppError::wrap(
                    ErrorCode::Internal,
                    format!("tool '{}' was cancelled", name),
                    reason,
                )
                .with_extra("tool", name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::{ParamSpec, ParamValue};

    struct Fixed(&'static str);

    #[async_trait::async_trait]
    impl Tool for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "returns nothing"
        }

        fn schema(&self) -> Vec<ParamSpec> {
            vec![ParamSpec::string("q")]
        }

        async fn execute(&self, _scope: &CallScope, _params: ParamMap) -> Result<ParamMap, AppError> {
            let mut out = ParamMap::new();
            out.insert("from".into(), ParamValue::from(self.0));
            Ok(out)
        }
    }

    #[test]
    fn test_list_is_sorted() {
        let registry = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(Arc::new(Fixed(name))).unwrap();
        }
        assert_eq!(registry.list(), vec!["alpha", "mid", "zeta"]);
        let described: Vec<String> = registry.describe().into_iter().map(|d| d.name).collect();
        assert_eq!(described, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_duplicate_keeps_original() {
        let registry = Registry::new();
        let first: Arc<dyn Tool> = Arc::new(Fixed("dup"));
        registry.register(first.clone()).unwrap();
        let err = registry.register(Arc::new(Fixed("dup"))).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(ref n) if n == "dup"));
        let got = registry.get("dup").unwrap();
        assert!(Arc::ptr_eq(&got, &first));
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = Registry::new();
        registry.register(Arc::new(Fixed("gone"))).unwrap();
        assert!(registry.unregister("gone"));
        assert!(!registry.unregister("gone"));
        assert!(registry.get("gone").is_none());
    }

    #[test]
    fn test_from_config() {
        let cfg = RegistryConfig {
            timeout_secs: 3,
            orphan_grace_ms: 250,
        };
        let registry = Registry::from_config(&cfg);
        assert_eq!(registry.timeout(), Duration::from_secs(3));
        assert_eq!(registry.orphans().grace(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_execute_returns_tool_result() {
        let registry = Registry::new();
        registry.register(Arc::new(Fixed("fixed"))).unwrap();
        let out = registry
            .execute(&CallScope::new(), "fixed", ParamMap::new())
            .await
            .unwrap();
        assert_eq!(out["from"], ParamValue::from("fixed"));
    }
}
