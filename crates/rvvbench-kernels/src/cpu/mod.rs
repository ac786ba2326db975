//! CPU kernel implementations

pub mod conv3x3;
pub mod direct;
pub mod gemm;
pub mod im2col;
pub mod lanes;
pub mod pipeline;

pub use conv3x3::*;
pub use direct::*;
pub use gemm::*;
pub use im2col::*;
pub use pipeline::*;

use rvvbench_common::LaneWidth;

/// Which flavour of a kernel to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Scalar,
    Vector(LaneWidth),
}

impl Variant {
    pub fn lanes(&self) -> Option<LaneWidth> {
        match self {
            Variant::Scalar => None,
            Variant::Vector(width) => Some(*width),
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Scalar => write!(f, "scalar"),
            Variant::Vector(width) => write!(f, "{}", width.variant_name()),
        }
    }
}
