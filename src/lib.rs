//! Prop Metrics
//!
//! Normalization and a reactive store for the loosely-shaped metrics
//! payloads served by a sports-betting analytics backend.
//!
//! # Features
//!
//! - Tolerant normalization of flat, nested and camelCase payloads
//! - Unknown underscore keys carried through as camelCased extras
//! - Merge-on-update store publishing immutable snapshots via `tokio::sync::watch`
//! - Cache hit rate view with configurable unit and health thresholds
//!
//! # Quick Start
//!
//! ```bash
//! echo '{"source":"health","data":{"performance":{"cache_hit_rate":85}}}' | ./prop-metrics
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  raw JSON   ┌──────────────┐  patch   ┌──────────────┐
//! │ health /     │────────────▶│  normalize   │─────────▶│    store     │──▶ subscribers
//! │ analytics    │             │              │          │ (watch<Arc>) │
//! └──────────────┘             └──────────────┘          └──────┬───────┘
//!                                                               │
//!                                                               ▼
//!                                                           selectors
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod selectors;
pub mod store;
pub mod traits;

#[cfg(test)]
mod test_utils;
