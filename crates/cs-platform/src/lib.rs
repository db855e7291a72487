//! ConfSite Platform
//!
//! Conference backend core providing:
//! - Registration, password login and rotating refresh sessions
//! - Role resolution and role-gated authorization
//! - Talk submission with validation and per-speaker quota
//! - Moderation of users and talks with first-decision notifications
//! - Sections, responsible addresses and an audit trail

pub mod api;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod mail;
pub mod platform;
pub mod repository;
pub mod service;

pub use config::PlatformConfig;
pub use domain::*;
pub use error::PlatformError;
pub use platform::Platform;
