//! Domain Models
//!
//! Core entities for accounts, registration, sessions, talks and sections.

pub mod audit_log;
pub mod events;
pub mod registration;
pub mod section;
pub mod session;
pub mod talk;
pub mod user;

pub use audit_log::*;
pub use events::*;
pub use registration::*;
pub use section::*;
pub use session::*;
pub use talk::*;
pub use user::*;
