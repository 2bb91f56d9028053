//! Role domain
//!
//! - [`value_objects::RoleId`] and the agent [`value_objects::ExecutionProfile`]
//! - [`entities::Role`]: a registered consultation profile
//! - [`registry::RoleRegistry`]: static lookup, fails with `UnknownRole`

pub mod entities;
pub mod registry;
pub mod value_objects;
