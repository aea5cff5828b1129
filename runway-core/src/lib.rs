//! Runway Core
//!
//! Core types and abstractions for the Runway run queue.
//!
//! This crate contains:
//! - Domain types: run requests, links, build and runner descriptors
//! - DTOs: Data transfer objects exchanged with clients and remote services

pub mod domain;
pub mod dto;
