//! Shared types for switchboard: the error taxonomy, the tool abstraction,
//! message shapes exchanged with platform adapters and backends, the explicit
//! call scope, and configuration.

pub mod config;
pub mod error;
pub mod message;
pub mod scope;
pub mod tools;

pub use config::{RegistryConfig, SwitchboardConfig, ToolEntry};
pub use error::{AppError, ErrorCode, Interrupt, ServiceError};
pub use message::{ChatRequest, ChatResponse, Message, Platform, Response};
pub use scope::CallScope;
pub use tools::{ParamKind, ParamMap, ParamSpec, ParamValue, Tool, ToolDescriptor};
