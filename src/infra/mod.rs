pub mod error;
pub mod memory;
pub mod scheduler;
pub mod telemetry;
