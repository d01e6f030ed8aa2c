//! Repository implementations for database operations

pub mod detections;

pub use detections::*;
