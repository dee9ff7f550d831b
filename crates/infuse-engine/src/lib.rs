//! Build engine seam and injection chaining for infuse.
//!
//! [`Injector`] drives one injection call end to end: it stages the assets,
//! builds the context, synthesizes the Dockerfile and hands a
//! [`BuildRequest`] to a [`BuildEngine`]. [`DockerBuildx`] is the engine used
//! in production; tests substitute mockall-generated engines.

pub mod buildx;
pub mod engine;
pub mod error;
pub mod executor;
pub mod inject;

pub use buildx::DockerBuildx;
pub use engine::{BuildEngine, BuildRequest, BuiltImage};
pub use error::{EngineError, ExecError};
pub use executor::{CommandExecutor, RealExecutor};
pub use inject::{CapacityWarning, InjectError, InjectOptions, Injection, Injector};
