//! Data models for ShareSpace.
//!
//! Field names match the JSON the web client has always stored, so records
//! written by either backend stay interchangeable.

mod comment;
mod journal;
mod post;
mod profile;
mod user;

pub use comment::*;
pub use journal::*;
pub use post::*;
pub use profile::*;
pub use user::*;
