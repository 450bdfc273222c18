//! Database models split into domain-specific modules.
//!
//! Every type is re-exported so callers can use `crate::db::*`.

pub mod common;
pub mod customer;
pub mod finance;
pub mod inventory;
pub mod notification;
pub mod profile;
pub mod quality;
pub mod schedule;
pub mod team_member;
pub mod work_order;

pub use common::*;
pub use customer::*;
pub use finance::*;
pub use inventory::*;
pub use notification::*;
pub use profile::*;
pub use quality::*;
pub use schedule::*;
pub use team_member::*;
pub use work_order::*;
