//! Paradigms Example Runtime
//!
//! Paced producers over an injected fixture catalog, the five named CSP
//! examples of the tutorial, and a runner that executes one example and
//! reports what it left behind.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod catalog;
pub mod config;
pub mod errors;
pub mod examples;
pub mod producers;
pub mod runner;
pub mod sink;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use catalog::{Catalog, Category};
pub use config::{Delay, PacingConfig, ProducerPacing, RuntimeConfig};
pub use errors::{RuntimeError, RuntimeResult};
pub use examples::{Example, ExampleContext};
pub use producers::Producers;
pub use runner::{ExampleRunner, RunReport};
pub use sink::{ConsoleLogger, ExampleLogger, MemoryLogger, SharedLogger};
