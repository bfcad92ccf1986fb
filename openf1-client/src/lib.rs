//! # OpenF1 client
//!
//! Typed, fail-soft access to the [OpenF1](https://openf1.org) telemetry API.
//!
//! Every call is routed through one [`tower_pace::FetchQueue`], so however many
//! tasks share an [`OpenF1`] handle, the upstream sees at most one dispatch per
//! spacing interval and transient failures are retried before anyone notices.
//!
//! ```no_run
//! use openf1_client::OpenF1;
//! use tower_pace::QueueConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let f1 = OpenF1::from_config(&QueueConfig::default())?;
//!     if let Some(session) = f1.latest_session().await {
//!         let laps = f1.laps(session.session_key, Some(1)).await;
//!         println!("{} laps at {}", laps.len(), session.circuit_short_name);
//!     }
//!     Ok(())
//! }
//! ```

mod client;
pub mod records;

pub use client::DateWindow;
pub use client::OpenF1;
pub use client::SESSION_TYPE_RACE;
pub use records::Session;
