//! Scenario and property-based correctness suite for the SIS kernel.
//!
//! This crate depends on `sis-kernel` as an ordinary library and exercises
//! it from the outside, the way an integration-test crate would, rather
//! than duplicating the kernel's own inline unit tests.

pub mod correctness;
pub mod property_based;
pub mod report;
