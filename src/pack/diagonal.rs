//! Generalized-diagonal representation of dense linear operators.
//!
//! Each layer scatters its weight matrix into diagonals with its own addressing rule. The rules
//! are kept as standalone placement functions so each one can be checked in isolation.

use crate::error::{PackError, Result};
use crate::math::matrix::DenseMatrix;
use crate::math::slots::{SlotVector, SLOTS};
use crate::pack::layout::{
    BsgsSplit, CONV_SPLIT, FC1_IN, FC1_OUT, FC2_BLOCK, FC2_IN, FC2_OUT, GROUP_WIDTH, IMAGE_LANES,
    LANE_STRIDE,
};
use std::ops::Index;

/// Where one weight `(row, col)` lands: slot `slot` of diagonal `diagonal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub diagonal: usize,
    pub slot: usize,
    pub row: usize,
    pub col: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiagonalOperator<const N: usize = SLOTS> {
    diagonals: Vec<SlotVector<N>>,
}

impl<const N: usize> DiagonalOperator<N> {
    pub fn zero(count: usize) -> Self {
        Self {
            diagonals: vec![SlotVector::zero(); count],
        }
    }

    pub fn from_diagonals(diagonals: Vec<SlotVector<N>>) -> Self {
        Self { diagonals }
    }

    /// Writes `weights[(row, col)]` at every placement. Placements that fall outside the operator
    /// are dropped.
    pub fn from_placements<I: IntoIterator<Item = Placement>>(
        count: usize,
        placements: I,
        weights: &DenseMatrix,
    ) -> Self {
        let mut out = Self::zero(count);
        for p in placements {
            if p.diagonal >= count || p.slot >= N {
                continue;
            }
            out.diagonals[p.diagonal][p.slot] = weights[(p.row, p.col)];
        }
        out
    }

    pub fn len(&self) -> usize {
        self.diagonals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagonals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotVector<N>> {
        self.diagonals.iter()
    }
}

impl<const N: usize> Index<usize> for DiagonalOperator<N> {
    type Output = SlotVector<N>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.diagonals[index]
    }
}

/// Diagonal `i` of an `N x N` matrix holds `m[(k, (k + i) mod N)]` at slot `k`, so that
/// `m * x = sum_i diag_i * rotate(x, i)`.
pub fn square_diagonals<const N: usize>(m: &DenseMatrix) -> Result<DiagonalOperator<N>> {
    if m.rows() != N || m.cols() != N {
        return Err(PackError::UnsupportedShape(format!(
            "expected a {}x{} matrix, got {}x{}",
            N,
            N,
            m.rows(),
            m.cols()
        )));
    }
    let placements = (0..N).flat_map(|i| {
        (0..N).map(move |k| Placement {
            diagonal: i,
            slot: k,
            row: k,
            col: (k + i) % N,
        })
    });
    Ok(DiagonalOperator::from_placements(N, placements, m))
}

/// Convolution: lane `lane` of rotation `rotation` holds tap `(lane + rotation) mod 64` of the
/// kernel for `channel`. Rotations are regrouped from babystep-major to giantstep-major order.
/// Lanes that point past the kernel footprint stay zero.
pub fn conv_placement(
    channel: usize,
    rotation: usize,
    lane: usize,
    taps: usize,
) -> Option<Placement> {
    let tap = (lane + rotation) % IMAGE_LANES;
    if tap >= taps {
        return None;
    }
    let (bs, gs) = (rotation / CONV_SPLIT.n_giant, rotation % CONV_SPLIT.n_giant);
    Some(Placement {
        diagonal: gs * CONV_SPLIT.n_baby + bs,
        slot: lane * LANE_STRIDE,
        row: channel,
        col: tap,
    })
}

/// First fully-connected layer, `i < 64`, `j < 256`, over a `256 x 64` input-major matrix.
pub fn fc1_placement(i: usize, j: usize) -> Placement {
    let idx = LANE_STRIDE * (i * FC1_IN + j);
    Placement {
        diagonal: idx / SLOTS,
        slot: idx % SLOTS,
        row: (i + j) % FC1_IN,
        col: j % FC1_OUT,
    }
}

/// Second fully-connected layer, `i < 16`, `j < 64`, over a `64 x 10` input-major matrix. Columns
/// `10..16` of each lane block are padding and carry no weight.
pub fn fc2_placement(i: usize, j: usize) -> Option<Placement> {
    if j % FC2_BLOCK >= FC2_OUT {
        return None;
    }
    let idx = LANE_STRIDE * (i * FC2_IN + j);
    Some(Placement {
        diagonal: idx / GROUP_WIDTH,
        slot: idx % GROUP_WIDTH,
        row: (i + j) % FC2_IN,
        col: j % FC2_BLOCK,
    })
}

/// Diagonals of output channel `channel` of a convolution whose kernels are the rows of
/// `kernels` (one flattened kernel per channel).
pub fn conv_diagonals(kernels: &DenseMatrix, channel: usize) -> Result<DiagonalOperator> {
    let taps = kernels.cols();
    if taps > IMAGE_LANES || channel >= kernels.rows() {
        return Err(PackError::UnsupportedShape(format!(
            "channel {} of {}x{} kernels",
            channel,
            kernels.rows(),
            taps
        )));
    }
    let placements = (0..CONV_SPLIT.diagonals()).flat_map(|rotation| {
        (0..IMAGE_LANES).filter_map(move |lane| conv_placement(channel, rotation, lane, taps))
    });
    Ok(DiagonalOperator::from_placements(
        CONV_SPLIT.diagonals(),
        placements,
        kernels,
    ))
}

fn ensure_shape(name: &str, m: &DenseMatrix, rows: usize, cols: usize) -> Result<()> {
    if m.rows() != rows || m.cols() != cols {
        return Err(PackError::UnsupportedShape(format!(
            "{} must be {}x{}, got {}x{}",
            name,
            rows,
            cols,
            m.rows(),
            m.cols()
        )));
    }
    Ok(())
}

pub fn fc1_diagonals(weights: &DenseMatrix, split: &BsgsSplit) -> Result<DiagonalOperator> {
    ensure_shape("fc1 weight", weights, FC1_IN, FC1_OUT)?;
    let placements = (0..FC1_OUT).flat_map(|i| (0..FC1_IN).map(move |j| fc1_placement(i, j)));
    Ok(DiagonalOperator::from_placements(
        split.diagonals(),
        placements,
        weights,
    ))
}

pub fn fc2_diagonals(weights: &DenseMatrix, split: &BsgsSplit) -> Result<DiagonalOperator> {
    ensure_shape("fc2 weight", weights, FC2_IN, FC2_OUT)?;
    let placements =
        (0..FC2_BLOCK).flat_map(|i| (0..FC2_IN).filter_map(move |j| fc2_placement(i, j)));
    Ok(DiagonalOperator::from_placements(
        split.diagonals(),
        placements,
        weights,
    ))
}
