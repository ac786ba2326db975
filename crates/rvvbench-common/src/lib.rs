//! Common types and utilities for the RVV convolution benchmarks
//!
//! This crate provides the foundational pieces shared by the kernel library,
//! the cross-validation helpers and the driver binary: the error taxonomy,
//! convolution shape validation and the benchmark configuration.

pub mod config;
pub mod error;
pub mod lanes;
pub mod shape;

pub use config::*;
pub use error::*;
pub use lanes::LaneWidth;
pub use shape::{Conv2dShape, output_dim};
