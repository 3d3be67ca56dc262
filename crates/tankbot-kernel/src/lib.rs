//! `tankbot-kernel` – Safety & Command Policy
//!
//! Pure decision logic with no hardware or async dependencies.  The runtime
//! consults it before anything moves.
//!
//! # Modules
//!
//! - [`safety`] – [`SafetyMonitor`][safety::SafetyMonitor]: evaluates every
//!   drive request against ordered [`SafetyRule`][safety::SafetyRule]s (cliff
//!   and proximity by default) and returns the first veto.
//! - [`command_policy`] – [`CommandPolicy`][command_policy::CommandPolicy]:
//!   per-autonomy-level allow-list deciding which operator commands are
//!   accepted.

pub mod command_policy;
pub mod safety;

pub use command_policy::{CommandPolicy, FULL_AUTO_COMMANDS};
pub use safety::{
    CliffRule, DriveProfile, DriveRequest, ProximityRule, SafetyContext, SafetyMonitor, SafetyRule,
    SafetyVerdict,
};
