//! The Rust SDK for Metica, a personalization platform for mobile games: personalized offers,
//! remote configuration, and analytics event ingestion.
//!
//! # Overview
//!
//! The SDK revolves around a [`Client`] created from a [`ClientConfig`]. The client keeps
//! disk-backed caches for offers and remote-config values, so repeated calls are served locally
//! while fresh and only missing or stale data is fetched. Offers carrying display-frequency
//! limits are filtered against a persisted display history before they are returned.
//!
//! ```no_run
//! # use metica::ClientConfig;
//! let client = ClientConfig::from_api_key("api-key")
//!     .app_id("my-game")
//!     .user_id("user-1")
//!     .to_client()
//!     .unwrap();
//!
//! let offers = client.get_offers(&["shop"]).unwrap();
//! let configs = client.get_configs(Some(&["welcome_pack"])).unwrap();
//! ```
//!
//! # Telemetry
//!
//! Gameplay and offer-lifecycle events logged through [`Client::log_offer_display`],
//! [`Client::log_offer_purchase`], [`Client::log_offer_interaction`], and
//! [`Client::log_custom_event`] are batched in memory and shipped in the background. Delivery
//! is best-effort: a batch that fails to send is dropped, not retried. Call
//! [`Client::shutdown`] before exiting to flush what is left and persist the display history.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum and returned as values; the SDK never exposes
//! exception-like control flow. Fetch operations degrade gracefully before erroring: a network
//! failure is surfaced only when not even a stale cache snapshot can be served.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging
//! messages. Consider integrating a `log`-compatible logger implementation for better
//! visibility into SDK operations.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod client;
mod config;

#[doc(inline)]
pub use metica_core::{
    display_log::DisplayLogEntry,
    events::PendingEvent,
    offers::{DisplayLimit, Offer, OfferItem},
    session::DeviceInfo,
    Error, Result, Value,
};

pub use client::Client;
pub use config::ClientConfig;

pub(crate) const SDK_METADATA: metica_core::SdkMetadata = metica_core::SdkMetadata {
    name: "rust",
    version: env!("CARGO_PKG_VERSION"),
};
