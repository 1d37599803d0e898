//! Session lifecycle guard for SessionWarden.
//!
//! [`SessionGuard`] wraps an injected [`SessionFacility`] with lazy
//! initialization, a read-only mode, and strict lifecycle checks. The
//! bundled [`MemoryFacility`] backs tests and demos.

pub mod facility;
pub mod guard;
pub mod memory;

pub use facility::{ExpiredCookie, FacilityStatus, OpenOptions, SessionFacility};
pub use guard::{GuardState, SessionGuard};
pub use memory::MemoryFacility;
