//! Core domain types
//!
//! This module contains the domain structures shared between the queue and the
//! HTTP clients that talk to the project, builder and runner services.

pub mod build;
pub mod link;
pub mod project;
pub mod request;
pub mod runner;
