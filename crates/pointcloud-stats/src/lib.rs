#![doc = include_str!("../README.md")]

mod error;
mod estimator;
mod label;

pub use crate::error::*;
pub use crate::estimator::*;
pub use crate::label::*;
