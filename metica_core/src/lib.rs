//! `metica_core` is the core library behind the Metica Rust SDK. If you're integrating Metica
//! into an application, you probably want the `metica` crate instead.
//!
//! # Overview
//!
//! `metica_core` is organized as a set of building blocks that the SDK crate assembles into a
//! client. The SDK's job is threefold: fetch personalized offers and remote-config values from
//! the backend while caching aggressively, enforce per-offer display-frequency limits against a
//! persisted history, and batch outgoing telemetry events.
//!
//! [`SdkSession`](session::SdkSession) is the explicit per-session context (user, app, API key,
//! endpoints). It is an owned value passed to each coordinator at construction, so multiple
//! sessions can coexist and tests don't touch global state.
//!
//! [`DiskCache`](disk_cache::DiskCache) is a single-file key-value store with per-write TTLs.
//! Reads are served from memory with lazy invalidation; writes persist synchronously.
//!
//! [`DisplayLog`](display_log::DisplayLog) keeps the per-offer display history and filters
//! candidate offer lists against their display limits. It is persisted periodically (not on
//! every append) by an [`IntervalTask`](background::IntervalTask).
//!
//! [`OffersCoordinator`](offers::OffersCoordinator) and
//! [`RemoteConfigCoordinator`](remote_config::RemoteConfigCoordinator) orchestrate "check
//! cache, fetch what's missing, merge, write back" for offers and config values respectively.
//! Both degrade gracefully: a failed fetch falls back to whatever the caches can still serve.
//!
//! [`EventBatcher`](events::batcher::EventBatcher) and
//! [`EventDispatcher`](events::dispatcher::EventDispatcher) accumulate telemetry events in
//! memory and ship them in batches under count/time triggers. Delivery is best-effort.
//!
//! Network access goes through the [`HttpClient`](http::HttpClient) trait and time through
//! [`TimeSource`], which keeps every freshness rule and trigger deterministic in tests.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod background;
pub mod disk_cache;
pub mod display_log;
pub mod events;
pub mod http;
pub mod offers;
pub mod remote_config;
pub mod session;

mod error;
mod sdk_metadata;
mod timesource;
mod value;

pub use error::{Error, Result};
pub use sdk_metadata::SdkMetadata;
pub use timesource::{SystemTimeSource, TimeSource};
pub use value::Value;
