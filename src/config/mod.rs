//! Immutable crypto and storage configuration.

pub mod settings;

pub use settings::CoreConfig;
