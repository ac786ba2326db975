//! Vector register grouping widths.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RvvBenchError;

/// Register grouping multiplier (LMUL) for 32-bit elements on a VLEN=128
/// machine. Each step of a vectorized loop processes up to
/// [`LaneWidth::lanes`] elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneWidth {
    M1,
    M2,
    M4,
    M8,
}

impl LaneWidth {
    pub const ALL: [LaneWidth; 4] = [LaneWidth::M1, LaneWidth::M2, LaneWidth::M4, LaneWidth::M8];

    /// f32 elements per vector step.
    #[inline]
    pub const fn lanes(self) -> usize {
        match self {
            LaneWidth::M1 => 4,
            LaneWidth::M2 => 8,
            LaneWidth::M4 => 16,
            LaneWidth::M8 => 32,
        }
    }

    /// Variant name used for providers and output files (`e32m1` .. `e32m8`).
    pub const fn variant_name(self) -> &'static str {
        match self {
            LaneWidth::M1 => "e32m1",
            LaneWidth::M2 => "e32m2",
            LaneWidth::M4 => "e32m4",
            LaneWidth::M8 => "e32m8",
        }
    }

    /// Short suffix (`m1` .. `m8`).
    pub const fn suffix(self) -> &'static str {
        match self {
            LaneWidth::M1 => "m1",
            LaneWidth::M2 => "m2",
            LaneWidth::M4 => "m4",
            LaneWidth::M8 => "m8",
        }
    }
}

impl fmt::Display for LaneWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.variant_name())
    }
}

impl FromStr for LaneWidth {
    type Err = RvvBenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m1" | "e32m1" | "1" => Ok(LaneWidth::M1),
            "m2" | "e32m2" | "2" => Ok(LaneWidth::M2),
            "m4" | "e32m4" | "4" => Ok(LaneWidth::M4),
            "m8" | "e32m8" | "8" => Ok(LaneWidth::M8),
            other => Err(RvvBenchError::Config(format!("unknown lane width '{other}'"))),
        }
    }
}
