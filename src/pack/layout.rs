//! Slot layout constants shared with the evaluation engine, and the per-layer BSGS splits.

/// Distance between consecutive lanes of a packed operand.
pub const LANE_STRIDE: usize = 128;
/// Width of the slot groups the first layers are laid out in.
pub const GROUP_WIDTH: usize = 8192;
/// Lanes of the packed image: output positions and kernel taps each get at most this many.
pub const IMAGE_LANES: usize = 64;
/// Shift applied per full wrap of the image index around the slot vector.
pub const WRAP_SHIFT: usize = 8;
/// Scale the image operand is encoded at, `2^72`.
pub const IMAGE_SCALE_BITS: usize = 72;
pub const CONV_STRIDE: usize = 3;

pub const FC1_IN: usize = 256;
pub const FC1_OUT: usize = 64;
pub const FC2_IN: usize = 64;
pub const FC2_OUT: usize = 10;
/// `FC2_OUT` rounded up to the lane block the second layer works in.
pub const FC2_BLOCK: usize = 16;

/// A baby-step/giant-step grid of strided rotation offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BsgsSplit {
    pub n_baby: usize,
    pub baby_stride: usize,
    pub n_giant: usize,
    pub giant_stride: usize,
}

impl BsgsSplit {
    pub const fn diagonals(&self) -> usize {
        self.n_baby * self.n_giant
    }

    pub fn babysteps(&self) -> Vec<isize> {
        (0..self.n_baby)
            .map(|b| (b * self.baby_stride) as isize)
            .collect()
    }

    pub fn giantsteps(&self) -> Vec<isize> {
        (0..self.n_giant)
            .map(|g| (g * self.giant_stride) as isize)
            .collect()
    }
}

pub const CONV_SPLIT: BsgsSplit = BsgsSplit {
    n_baby: 16,
    baby_stride: 8,
    n_giant: 4,
    giant_stride: GROUP_WIDTH,
};

pub const FC1_SPLIT: BsgsSplit = BsgsSplit {
    n_baby: 8,
    baby_stride: LANE_STRIDE,
    n_giant: 8,
    giant_stride: 1024,
};

pub const FC2_SPLIT: BsgsSplit = BsgsSplit {
    n_baby: 4,
    baby_stride: LANE_STRIDE,
    n_giant: 4,
    giant_stride: 512,
};

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_splits() {
        assert_eq!(CONV_SPLIT.diagonals(), 64);
        assert_eq!(FC1_SPLIT.diagonals(), 64);
        assert_eq!(FC2_SPLIT.diagonals(), 16);
        assert_eq!(CONV_SPLIT.giantsteps(), vec![0, 8192, 16384, 24576]);
        assert_eq!(FC2_SPLIT.babysteps(), vec![0, 128, 256, 384]);
    }
}
