//! Application services: collaborator traits and the aggregation dispatcher.

pub mod aggregation;
pub mod error;
pub mod jobs;
pub mod repos;
pub mod transform;
