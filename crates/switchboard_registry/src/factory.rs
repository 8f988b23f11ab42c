use std::fmt;
use std::sync::Arc;
use switchboard_core::{AppError, Tool, ToolEntry};

/// Builds a tool from a `[[tools]]` config entry.
pub trait ToolFactory: Send + Sync {
    fn build(&self, entry: &ToolEntry) -> Result<Arc<dyn Tool>, AppError>;
}

impl<F> ToolFactory for F
where
    F: Fn(&ToolEntry) -> Result<Arc<dyn Tool>, AppError> + Send + Sync,
{
    fn build(&self, entry: &ToolEntry) -> Result<Arc<dyn Tool>, AppError> {
        self(entry)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(String),
    #[error("unknown tool type '{0}'")]
    UnknownType(String),
    #[error("failed to build tool")]
    Build(#[source] AppError),
}

/// One config entry that could not be turned into a registered tool.
#[derive(Debug)]
pub struct LoadFailure {
    pub name: String,
    pub kind: String,
    pub error: RegistryError,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' (type '{}'): {}", self.name, self.kind, self.error)?;
        if let RegistryError::Build(inner) = &self.error {
            write!(f, ": {}", inner)?;
        }
        Ok(())
    }
}

/// Every failure from one `load_from_config` pass. Entries that did load
/// stay registered.
#[derive(Debug)]
pub struct LoadError {
    pub loaded: usize,
    pub failures: Vec<LoadFailure>,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tool(s) failed to load: ", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for LoadError {}
