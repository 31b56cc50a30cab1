//! Application services: the like counter engine and its reconciler.

pub mod deadline;
pub mod error;
pub mod jobs;
pub mod likes;
pub mod repos;
