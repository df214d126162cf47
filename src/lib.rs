//! # Meshmon - Crawler and Link-Quality Monitor for AREDN-Compatible Meshes
//!
//! Meshmon watches an amateur-radio IP mesh from the inside. It talks to the
//! same surfaces the nodes themselves expose: the per-node `sysinfo.json`
//! HTTP endpoint and the Babel routing daemon's local control socket.
//!
//! ## Features
//!
//! - **Mesh Walker**: Concurrent breadth-first crawl of the whole mesh from a
//!   configured root node, streaming every node's system-information document
//!   into a single map artifact.
//! - **Versioned Sysinfo Decoder**: Tolerant decoding of every published
//!   sysinfo schema revision (1.0 through 2.0), including the string/number
//!   drift in coordinates, gateway flags, and memory counters.
//! - **Link-Quality Monitor**: A 30-second control loop that reads Babel
//!   neighbor and route dumps, samples kernel interface counters, pings
//!   neighbors, fetches their sysinfo, and publishes derived quality signals
//!   as a JSON state document.
//! - **Babel Socket Client**: Line-oriented client for the routing daemon's
//!   UNIX control socket (`dump-neighbors`, `dump-installed-routes`, tunnel
//!   mutations).
//! - **Async Design**: Built with Tokio; crawl fan-out and per-neighbor
//!   probing are bounded and cancellable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshmon::config::Config;
//! use meshmon::walker::Walker;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!
//!     let walker = Arc::new(Walker::new(
//!         config.walker.timeout(),
//!         config.walker.retries,
//!         config.walker.jitter(),
//!     ));
//!     let mut responses = walker.clone().walk(&config.node.name).await?;
//!     while let Some(response) = responses.recv().await {
//!         // None marks a node that could not be fetched.
//!         if let Some(info) = response {
//!             println!("{}", info.node());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`walker`] - Mesh crawl: retrying fetcher, seen-set, task fan-out, map
//!   artifact assembly
//! - [`sysinfo`] - Schema-versioned sysinfo document and tolerant decoders
//! - [`lqm`] - Link-quality monitor service and tracker table
//! - [`babel`] - Babel control-socket client
//! - [`netutil`] - MAC / IPv6 link-local / hostname helpers
//! - [`config`] - Configuration management and validation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │     Walker      │     │   LQM Service   │ ← 30 s tick loop
//! └─────────────────┘     └─────────────────┘
//!          │                   │         │
//! ┌─────────────────┐  ┌────────────┐ ┌──────────────┐
//! │ Sysinfo Decoder │  │   Babel    │ │ ping6 / sysfs│
//! │  (1.0 … 2.0)    │  │   Socket   │ │   counters   │
//! └─────────────────┘  └────────────┘ └──────────────┘
//! ```
//!
//! The walker and the monitor are independent pipelines; they share the
//! sysinfo decoding layer and the network helpers.

pub mod babel;
pub mod config;
pub mod lqm;
pub mod netutil;
pub mod sysinfo;
pub mod walker;
