//! # netback
//!
//! Concurrent configuration backup for network devices over SSH.
//!
//! netback drives each device's interactive shell the way an operator
//! would: wait for the prompt, type a command, read until the prompt comes
//! back. Pagers and confirmations are answered on the fly by interrupt
//! rules. The captured text is redacted, commented and written to one file
//! per device.
//!
//! ## Features
//!
//! - Async SSH sessions via russh
//! - Prompt detection by regex over a tail-searched buffer
//! - Interrupt rules evaluated on every chunk (pagers, confirmations)
//! - Secret redaction and line commenting of captured output
//! - Bounded concurrency across devices with one result per device
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netback::{ModelSet, Orchestrator, OutputWriter, RouterDb, SshConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netback::Error> {
//!     let devices = RouterDb::load("routerdb.yaml")?;
//!     let models = ModelSet::load("models.yaml")?;
//!
//!     let writer = OutputWriter::new("./configs");
//!     writer.ensure_root().await?;
//!
//!     let orchestrator = Orchestrator::new(SshConnector::default(), models, writer).with_workers(5);
//!     for result in orchestrator.run(devices.devices).await {
//!         println!("{}: {}", result.name(), result.is_success());
//!     }
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod output;
pub mod transport;

// Re-export main types for convenience
pub use channel::{InterruptRule, PromptPattern, SecretRule, Session, Stream};
pub use config::{Device, Model, ModelSet, RouterDb};
pub use driver::{BackupResult, DeviceTask, Summary};
pub use error::{Error, ErrorKind, Result};
pub use orchestrator::Orchestrator;
pub use output::OutputWriter;
pub use transport::{Connector, HostKeyVerification, SshConnector, SshOptions};
