#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Public re-export so downstream crates can access the domain logic via
// `pointcloud_tonic_core::pointcloud_stats`
pub use pointcloud_stats;
