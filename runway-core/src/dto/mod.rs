//! Data Transfer Objects
//!
//! This module contains DTOs exchanged between the queue, its callers and the
//! remote services it coordinates.

pub mod error;
pub mod registration;
pub mod run;
pub mod task;
