//! Cached counts and sums over scheduled events and the category terms
//! they carry, with debounced background regeneration.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
