//! `ueventd`: a userspace device manager that consumes kernel uevents (cold
//! sysfs enumeration plus live netlink traffic) and turns them into `/dev`
//! nodes, SELinux labels, module autoloads, and firmware delivery.
//!
//! See [`context::UeventdContext`] for the top-level entry point.

#[macro_use]
extern crate bitflags;

pub mod autoload;
pub mod coldboot;
pub mod context;
pub mod device_node;
mod error;
pub mod firmware;
pub mod log;
pub mod mode;
pub mod netlink;
pub mod platform;
pub mod router;
pub mod rules;
pub mod selinux;
pub mod uevent;
pub mod util;

pub use context::UeventdContext;
pub use error::{Error, Result};
pub use mode::Mode;
pub use uevent::Uevent;
