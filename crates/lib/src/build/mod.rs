//! Build invocation.
//!
//! A build is two external processes, configure and compile, run against a
//! work directory. Everything the processes need comes from a
//! [`ConfigurationMapping`](crate::configure::ConfigurationMapping); nothing
//! here decides option values.
//!
//! # Submodules
//!
//! - [`execute`] - The [`BuildInvoker`] and its state machine
//! - [`process`] - The [`ProcessRunner`] seam and its tokio implementation
//! - [`requirements`] - Pre-build dependency resolution
//! - [`toolchain`] - Scoped Visual Studio environment activation

pub mod execute;
pub mod process;
pub mod requirements;
mod stamp;
pub mod toolchain;
mod types;

pub use execute::{BuildInvoker, CMAKE_ENV, InvokerConfig};
pub use process::{CommandSpec, ProcessOutput, ProcessRunner, SystemRunner};
pub use stamp::ConfigureStamp;
pub use types::*;
