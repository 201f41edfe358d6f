//! # flash-b2g
//!
//! Flash nightly B2G builds onto a device.
//!
//! A run picks a nightly build on the build server from a few selectors
//! (device, channel, date, engineering build), downloads its UI bundle and
//! platform package side by side, runs the flash script while streaming its
//! output, and can back up and restore the device profile or switch the
//! device into development mode afterwards.
//!
//! ## Quick Start
//!
//! ```no_run
//! use flash_b2g::{Config, FlashRequest, Flasher, SelectorArgs};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let flasher = Flasher::from_config(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = flasher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = FlashRequest {
//!         selector: SelectorArgs {
//!             device: "flame".to_string(),
//!             channel: Some("1.4".to_string()),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!     flasher.run(&request).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Command-line interface
pub mod cli;
/// Configuration types
pub mod config;
/// Device provisioning over adb
pub mod device;
/// Error types
pub mod error;
/// Flash pipeline
pub mod pipeline;
/// External process supervision
pub mod process;
/// Build server listing and transfers
pub mod remote;
/// Build selectors
pub mod selector;
/// Staging directory
pub mod staging;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DeviceConfig, FlagStyle, RemoteConfig, ToolsConfig};
pub use device::{AdbShell, DeviceSession, DeviceShell, ShellCommand, ShellScript};
pub use error::{Error, Result};
pub use pipeline::{Collaborators, FlashReport, FlashRequest, Flasher};
pub use process::{ProcessOutcome, ProcessSpec, Supervisor};
pub use remote::{ArtifactSource, HttpIndex, HttpSource, RemoteEntry, RemoteIndex, RemoteLocation};
pub use selector::{ArtifactPaths, BuildDate, MatchPattern, Resolved, Selector, SelectorArgs};
pub use staging::Staging;
pub use types::{ArtifactKind, DeviceState, Event, OutputStream, Step};
