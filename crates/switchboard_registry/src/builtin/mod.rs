//! Tools that ship with switchboard, available as `type = "echo"` and
//! `type = "shell"` in `[[tools]]` entries.

pub mod echo;
pub mod shell;

use crate::Registry;

pub use echo::EchoTool;
pub use shell::ShellTool;

/// Register the factories for every built-in tool type.
pub fn register_factories(registry: &Registry) {
    registry.register_factory("echo", echo::build);
    registry.register_factory("shell", shell::build);
}
