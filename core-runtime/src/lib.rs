//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the lesson media core:
//! - Logging and tracing bootstrap
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its event types and
//! configuration. It owns no playback or storage logic itself.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
