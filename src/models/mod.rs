//! Data models for the org chart backend.
//!
//! These models match the frontend TypeScript interfaces exactly for seamless interoperability.

mod datastore;
mod member;
mod role;
mod seat;

pub use datastore::*;
pub use member::*;
pub use role::*;
pub use seat::*;
