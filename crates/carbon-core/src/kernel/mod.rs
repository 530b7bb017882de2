//! # Carbon Core Kernel
//!
//! The `kernel` module holds what every other part of `carbon-core` leans on:
//!
//! - **Application handle**: [`Carbon`](bootstrap::Carbon) owns the immutable
//!   [`Config`](crate::storage::Config), the run uid, and the
//!   [`PluginRegistry`](crate::plugin_system::PluginRegistry), and hands out
//!   scenario loaders and drivers bound to them.
//! - **Core Constants**: system-wide defaults via the `constants` submodule.
//! - **Error Handling**: the crate-wide [`Error`](error::Error) aggregating every
//!   subsystem error, and the `Result` alias.
pub mod bootstrap;
pub mod constants;
pub mod error;

pub use bootstrap::{generate_uid, Carbon};
pub use error::{Error, Result};
