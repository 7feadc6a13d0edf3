//! Configuration module for vidfetch.
//!
//! Handles loading application settings from a TOML file.

mod settings;

pub use settings::{BatchSettings, DownloadSettings, GeneralSettings, Settings};
