use std::io::{self, Write};

use rayon::prelude::*;
use thiserror::Error;

use crate::modarith::{self, Lane};

#[derive(Debug, Error)]
#[error("register size mismatch (expected {expected} lanes, got {got})")]
pub struct SizeMismatch {
    pub expected: usize,
    pub got: usize,
}

/// Fixed-width vector of modular lanes, the machine's natural data width.
/// Arithmetic registers hold `W` lanes; immediate registers hold one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultiRegister {
    lanes: Vec<Lane>,
}

impl MultiRegister {
    pub fn zeroed(width: usize) -> Self {
        Self {
            lanes: vec![0; width],
        }
    }

    pub fn filled(width: usize, value: Lane) -> Self {
        Self {
            lanes: vec![value; width],
        }
    }

    pub fn from_lanes(lanes: Vec<Lane>) -> Self {
        Self { lanes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    #[inline]
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    #[inline]
    pub fn lanes_mut(&mut self) -> &mut [Lane] {
        &mut self.lanes
    }

    pub fn resize(&mut self, width: usize) {
        self.lanes.resize(width, 0);
    }

    fn check_shape(&self, other: &Self) -> Result<(), SizeMismatch> {
        if self.len() != other.len() {
            return Err(SizeMismatch {
                expected: self.len(),
                got: other.len(),
            });
        }
        Ok(())
    }

    fn zip_map(
        &self,
        other: &Self,
        op: impl Fn(Lane, Lane) -> Lane + Sync,
    ) -> Result<Self, SizeMismatch> {
        self.check_shape(other)?;
        let lanes = self
            .lanes
            .par_iter()
            .zip(other.lanes.par_iter())
            .map(|(&a, &b)| op(a, b))
            .collect();
        Ok(Self { lanes })
    }

    fn map(&self, op: impl Fn(Lane) -> Lane + Sync) -> Self {
        Self {
            lanes: self.lanes.par_iter().map(|&a| op(a)).collect(),
        }
    }

    /// Lane-wise wrapping sum.
    pub fn add(&self, other: &Self) -> Result<Self, SizeMismatch> {
        self.zip_map(other, |a, b| a.wrapping_add(b))
    }

    /// Lane-wise wrapping difference.
    pub fn sub(&self, other: &Self) -> Result<Self, SizeMismatch> {
        self.zip_map(other, |a, b| a.wrapping_sub(b))
    }

    /// Lane-wise wrapping product.
    pub fn mul(&self, other: &Self) -> Result<Self, SizeMismatch> {
        self.zip_map(other, |a, b| a.wrapping_mul(b))
    }

    /// Lane-wise wrapping product by a scalar.
    pub fn scale(&self, scalar: Lane) -> Self {
        self.map(|a| a.wrapping_mul(scalar))
    }

    /// Lane-wise remainder.
    pub fn rem(&self, modulus: Lane) -> Self {
        self.map(|a| a % modulus)
    }

    /// Reduces every lane once below `modulus`. Lanes must be below
    /// `2 * modulus` (debug check).
    pub fn montgomery_add_modulus(&self, modulus: Lane) -> Self {
        self.map(|a| {
            debug_assert!(u64::from(a) < 2 * u64::from(modulus));
            a - Lane::from(a >= modulus) * modulus
        })
    }

    /// Montgomery-reduces every lane: `a -> a * R^{-1} mod q`.
    pub fn montgomery_mul_modulus(&self, modulus: Lane) -> Self {
        self.map(|a| modarith::montgomery_mul(a, 1, modulus))
    }

    /// Cyclic left rotation: lane `x` takes the value of lane `(x + n) % len`.
    pub fn rotate(&self, n: usize) -> Self {
        if self.lanes.is_empty() {
            return self.clone();
        }
        let len = self.lanes.len();
        Self {
            lanes: (0..len).map(|x| self.lanes[(x + n) % len]).collect(),
        }
    }

    /// Appends `,v` per lane, the record-body form of the memory dump.
    pub fn write_csv(&self, out: &mut impl Write) -> io::Result<()> {
        for lane in &self.lanes {
            write!(out, ",{lane}")?;
        }
        Ok(())
    }
}
