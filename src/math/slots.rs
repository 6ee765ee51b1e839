//! Fixed-width packed slot vectors and cyclic rotation.

use crate::error::{PackError, Result};
use std::ops::{Add, AddAssign, Index, IndexMut, Mul};

/// Number of slots in one packed vector.
pub const SLOTS: usize = 32 * 1024;

/// A vector of exactly `N` real slots. Stored on the heap since `N` is usually [`SLOTS`].
#[derive(Clone, Debug, PartialEq)]
pub struct SlotVector<const N: usize = SLOTS> {
    data: Vec<f64>,
}

impl<const N: usize> SlotVector<N> {
    pub fn zero() -> Self {
        Self { data: vec![0_f64; N] }
    }

    pub fn from_vec(data: Vec<f64>) -> Result<Self> {
        if data.len() != N {
            return Err(PackError::UnsupportedShape(format!(
                "slot vector needs {} values, got {}",
                N,
                data.len()
            )));
        }
        Ok(Self { data })
    }

    pub fn from_fn<F: FnMut(usize) -> f64>(f: F) -> Self {
        Self {
            data: (0..N).map(f).collect(),
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.data.iter()
    }

    /// Cyclic left rotation by `n` slots: slot `k` of the result is slot `(k + n) mod N` of
    /// `self`. Negative `n` rotates right.
    pub fn rotate(&self, n: isize) -> Self {
        let mut data = self.data.clone();
        data.rotate_left(n.rem_euclid(N as isize) as usize);
        Self { data }
    }

    /// Positions holding a nonzero value, in increasing order.
    pub fn support(&self) -> Vec<usize> {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, x)| **x != 0_f64)
            .map(|(i, _)| i)
            .collect()
    }
}

impl<const N: usize> Index<usize> for SlotVector<N> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.data[index]
    }
}

impl<const N: usize> IndexMut<usize> for SlotVector<N> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl<const N: usize> Add for &SlotVector<N> {
    type Output = SlotVector<N>;

    fn add(self, rhs: Self) -> Self::Output {
        SlotVector {
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a + b).collect(),
        }
    }
}

impl<const N: usize> AddAssign<&SlotVector<N>> for SlotVector<N> {
    fn add_assign(&mut self, rhs: &SlotVector<N>) {
        for (a, b) in self.data.iter_mut().zip(&rhs.data) {
            *a += b;
        }
    }
}

/// Slot-wise (Hadamard) product.
impl<const N: usize> Mul for &SlotVector<N> {
    type Output = SlotVector<N>;

    fn mul(self, rhs: Self) -> Self::Output {
        SlotVector {
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a * b).collect(),
        }
    }
}
