//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The WeatherAPI.com provider behind a narrow trait
//! - Local preferences (the last remembered city)
//! - The view model: one observable state cell driven by search intents
//!
//! It is used by `weather-cli`, but can also be reused by other front-ends.

pub mod config;
pub mod model;
pub mod prefs;
pub mod provider;
pub mod view_model;

pub use config::Config;
pub use model::WeatherSnapshot;
pub use prefs::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use provider::{WeatherProvider, provider_from_config, weatherapi::WeatherApiProvider};
pub use view_model::{FetchError, ViewState, WeatherViewModel};
