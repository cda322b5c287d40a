//! Built-in services exposed by the agent.
//!
//! - [`SystemService`] (`system.*`): clock, liveness and platform info.
//! - [`GitService`] (`git.*`): publish, checkout and list branches of a
//!   local working copy.

pub mod git;
pub mod system;

pub use git::GitService;
pub use system::SystemService;

use crate::error::RegisterError;
use crate::rpc::ServiceRegistry;

/// Registers the built-in services under their default names.
///
/// # Errors
///
/// Returns [`RegisterError`] if a service declares no methods.
pub fn register_defaults(registry: &mut ServiceRegistry) -> Result<(), RegisterError> {
    registry
        .register(SystemService::new(), "system")?
        .register(GitService::new(), "git")?;
    Ok(())
}
