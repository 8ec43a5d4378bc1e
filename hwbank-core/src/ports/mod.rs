//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external collaborators. Services depend
//! only on these traits, not on concrete implementations.

mod clock;
mod email;

pub use clock::{Clock, SystemClock};
pub use email::{EmailMessage, EmailSender};
