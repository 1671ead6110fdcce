use crate::errors::CostError;
use std::cmp::Ordering;
use std::fmt;

/// Integer extended with positive and negative infinity.
///
/// All comparisons are total: positive infinity is greater than any
/// finite value and negative infinity is less than any finite value.
/// Arithmetic is checked; operations that are undefined on the extended
/// line (opposite infinities added together, zero times infinity, ...)
/// return a [`CostError`] instead of producing a garbage value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cost {
    NegInf,
    Finite(i64),
    PosInf,
}

use Cost::*;

impl Cost {
    pub fn is_finite(self) -> bool {
        matches!(self, Finite(_))
    }

    pub fn is_infinite(self) -> bool {
        !self.is_finite()
    }

    /// Extract the wrapped finite value.
    pub fn finite(self) -> Result<i64, CostError> {
        match self {
            Finite(x) => Ok(x),
            _ => Err(CostError::InfiniteValue),
        }
    }

    fn is_negative(self) -> bool {
        match self {
            NegInf => true,
            Finite(x) => x < 0,
            PosInf => false,
        }
    }

    pub fn checked_add(self, rhs: Cost) -> Result<Cost, CostError> {
        match (self, rhs) {
            (Finite(a), Finite(b)) => Ok(Finite(a + b)),
            (PosInf, NegInf) | (NegInf, PosInf) => Err(CostError::OppositeInfinities),
            (PosInf, _) | (_, PosInf) => Ok(PosInf),
            (NegInf, _) | (_, NegInf) => Ok(NegInf),
        }
    }

    pub fn checked_sub(self, rhs: Cost) -> Result<Cost, CostError> {
        match (self, rhs) {
            (Finite(a), Finite(b)) => Ok(Finite(a - b)),
            (PosInf, PosInf) | (NegInf, NegInf) => Err(CostError::SameSignInfinities),
            (PosInf, _) | (_, NegInf) => Ok(PosInf),
            (NegInf, _) | (_, PosInf) => Ok(NegInf),
        }
    }

    pub fn checked_mul(self, rhs: Cost) -> Result<Cost, CostError> {
        match (self, rhs) {
            (Finite(a), Finite(b)) => Ok(Finite(a * b)),
            (Finite(0), _) | (_, Finite(0)) => Err(CostError::ZeroTimesInfinity),
            (a, b) => {
                if a.is_negative() == b.is_negative() {
                    Ok(PosInf)
                } else {
                    Ok(NegInf)
                }
            }
        }
    }

    pub fn checked_div(self, rhs: Cost) -> Result<Cost, CostError> {
        match (self, rhs) {
            (_, Finite(0)) => Err(CostError::DivisionByZero),
            (Finite(a), Finite(b)) => Ok(Finite(a / b)),
            (Finite(_), _) => Ok(Finite(0)),
            (a, Finite(_)) if a.is_negative() == rhs.is_negative() => Ok(PosInf),
            (_, Finite(_)) => Ok(NegInf),
            _ => Err(CostError::InfinityRatio),
        }
    }
}

impl From<i64> for Cost {
    fn from(x: i64) -> Self {
        Finite(x)
    }
}

impl From<usize> for Cost {
    fn from(x: usize) -> Self {
        Finite(x as i64)
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Finite(a), Finite(b)) => a.cmp(b),
            (NegInf, NegInf) | (PosInf, PosInf) => Ordering::Equal,
            (NegInf, _) | (_, PosInf) => Ordering::Less,
            (PosInf, _) | (_, NegInf) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegInf => write!(f, "-inf"),
            Finite(x) => write!(f, "{}", x),
            PosInf => write!(f, "+inf"),
        }
    }
}
