#![doc = include_str!("../README.md")]

mod chunker;
mod client;
pub mod config;
mod reader;
mod report;

pub use crate::chunker::*;
pub use crate::client::*;
pub use crate::reader::*;
pub use crate::report::*;
