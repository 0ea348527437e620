//! Test fixtures for pickup-planner.
//!
//! Provides:
//! - Singapore pickup points in two residential regions
//! - A scripted routing service and a recording sleeper

#![allow(dead_code)]

pub mod singapore_locations;
pub mod stubs;

pub use singapore_locations::*;
pub use stubs::*;
