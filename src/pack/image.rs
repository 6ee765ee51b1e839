//! Packing of the input image into the convolution slot layout.
//!
//! The image is first unrolled into an im2col matrix (one row per output position, one column
//! per kernel tap) and then scattered so that lane `i` of output position `j` holds tap
//! `(i + j) mod 64`. The scatter addresses are fixed by the evaluation engine.

use crate::error::{PackError, Result};
use crate::math::matrix::DenseMatrix;
use crate::math::slots::{SlotVector, SLOTS};
use crate::pack::layout::{IMAGE_LANES, LANE_STRIDE, WRAP_SHIFT};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelShape {
    pub out_channels: usize,
    pub height: usize,
    pub width: usize,
}

impl KernelShape {
    pub const fn taps(&self) -> usize {
        self.height * self.width
    }
}

/// Output height and width of a valid (unpadded) convolution.
pub fn conv_output_dims(
    image_height: usize,
    image_width: usize,
    kernel: &KernelShape,
    stride: usize,
) -> Result<(usize, usize)> {
    if stride == 0 {
        return Err(PackError::UnsupportedShape("stride must be positive".into()));
    }
    if kernel.height == 0 || kernel.width == 0 {
        return Err(PackError::UnsupportedShape("empty kernel".into()));
    }
    if image_height < kernel.height || image_width < kernel.width {
        return Err(PackError::UnsupportedShape(format!(
            "{}x{} kernel does not fit a {}x{} image",
            kernel.height, kernel.width, image_height, image_width
        )));
    }
    Ok((
        (image_height - kernel.height) / stride + 1,
        (image_width - kernel.width) / stride + 1,
    ))
}

/// Row `h * out_width + w` holds the receptive field of output `(h, w)`, flattened row by row.
pub fn im2col(image: &DenseMatrix, kernel: &KernelShape, stride: usize) -> Result<DenseMatrix> {
    let (out_height, out_width) = conv_output_dims(image.rows(), image.cols(), kernel, stride)?;
    let mut out = DenseMatrix::zero(out_height * out_width, kernel.taps());
    for h in 0..out_height {
        for w in 0..out_width {
            let region = image.window(h * stride, w * stride, kernel.height, kernel.width);
            for (t, x) in region.into_iter().enumerate() {
                out[(h * out_width + w, t)] = x;
            }
        }
    }
    Ok(out)
}

/// Slot holding lane `lane` of output position `position`.
pub const fn image_slot(lane: usize, position: usize) -> usize {
    let idx = LANE_STRIDE * (lane * IMAGE_LANES + position);
    idx % SLOTS + (idx / SLOTS) * WRAP_SHIFT
}

/// Tap stored in lane `lane` of output position `position`.
pub const fn image_tap(lane: usize, position: usize) -> usize {
    (lane + position) % IMAGE_LANES
}

pub fn pack_image(image: &DenseMatrix, kernel: &KernelShape, stride: usize) -> Result<SlotVector> {
    let (out_height, out_width) = conv_output_dims(image.rows(), image.cols(), kernel, stride)?;
    if kernel.taps() > IMAGE_LANES {
        return Err(PackError::UnsupportedShape(format!(
            "kernel footprint of {} taps exceeds {} lanes",
            kernel.taps(),
            IMAGE_LANES
        )));
    }
    if out_height * out_width > IMAGE_LANES {
        return Err(PackError::UnsupportedShape(format!(
            "{} output positions exceed {} lanes",
            out_height * out_width,
            IMAGE_LANES
        )));
    }
    let cols = im2col(image, kernel, stride)?;

    let mut packed = SlotVector::<SLOTS>::zero();
    for lane in 0..IMAGE_LANES {
        for position in 0..cols.rows() {
            let tap = image_tap(lane, position);
            if tap >= kernel.taps() {
                continue;
            }
            packed[image_slot(lane, position)] = cols[(position, tap)];
        }
    }
    Ok(packed)
}

#[cfg(test)]
mod test {
    use super::*;
    use itertools::Itertools;

    const KERNEL_3X3: KernelShape = KernelShape {
        out_channels: 1,
        height: 3,
        width: 3,
    };

    fn image_9x9() -> DenseMatrix {
        DenseMatrix::from_fn(9, 9, |r, c| (1 + r * 9 + c) as f64)
    }

    #[test]
    fn test_output_dims() {
        let k = KernelShape {
            out_channels: 4,
            height: 7,
            width: 7,
        };
        assert_eq!(conv_output_dims(28, 28, &k, 3), Ok((8, 8)));
        assert_eq!(conv_output_dims(9, 9, &KERNEL_3X3, 3), Ok((3, 3)));
        assert_eq!(conv_output_dims(10, 9, &KERNEL_3X3, 3), Ok((3, 3)));
    }

    #[test]
    fn test_output_dims_unsupported() {
        assert!(matches!(
            conv_output_dims(2, 9, &KERNEL_3X3, 1),
            Err(PackError::UnsupportedShape(_))
        ));
        assert!(matches!(
            conv_output_dims(9, 9, &KERNEL_3X3, 0),
            Err(PackError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn test_im2col() {
        let cols = im2col(&image_9x9(), &KERNEL_3X3, 3).unwrap();
        assert_eq!((cols.rows(), cols.cols()), (9, 9));
        // output (1, 2) starts at image row 3, column 6
        assert_eq!(
            cols.row(5),
            &[34_f64, 35., 36., 43., 44., 45., 52., 53., 54.]
        );
    }

    #[test]
    fn test_image_slot() {
        assert_eq!(image_slot(0, 0), 0);
        assert_eq!(image_slot(0, 1), 128);
        assert_eq!(image_slot(4, 0), 8);
        assert_eq!(image_slot(5, 3), 128 * 67 + 8);
        assert_eq!(image_slot(63, 63), (128 * 4095) % SLOTS + 15 * 8);
    }

    #[test]
    fn test_image_slots_distinct() {
        let slots = (0..IMAGE_LANES)
            .cartesian_product(0..IMAGE_LANES)
            .map(|(i, j)| image_slot(i, j))
            .collect_vec();
        assert_eq!(slots.iter().unique().count(), slots.len());
        assert!(slots.iter().all(|s| *s < SLOTS));
    }

    #[test]
    fn test_pack_9x9() {
        let image = image_9x9();
        let packed = pack_image(&image, &KERNEL_3X3, 3).unwrap();
        assert_eq!(packed.as_slice().len(), SLOTS);

        let mut expected = SlotVector::<SLOTS>::zero();
        for position in 0..9 {
            let (h, w) = (position / 3, position % 3);
            for tap in 0..9 {
                let (kr, kc) = (tap / 3, tap % 3);
                let lane = (tap + IMAGE_LANES - position) % IMAGE_LANES;
                expected[image_slot(lane, position)] = image[(3 * h + kr, 3 * w + kc)];
            }
        }
        assert_eq!(packed, expected);
        assert_eq!(packed.support().len(), 81);
    }

    #[test]
    fn test_pack_rejects_large_kernel() {
        let k = KernelShape {
            out_channels: 1,
            height: 9,
            width: 9,
        };
        assert!(matches!(
            pack_image(&image_9x9(), &k, 1),
            Err(PackError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn test_pack_rejects_many_small_windows() {
        let k = KernelShape {
            out_channels: 1,
            height: 1,
            width: 1,
        };
        let image = DenseMatrix::zero(100, 100);
        assert!(matches!(
            pack_image(&image, &k, 1),
            Err(PackError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn test_pack_rejects_too_many_positions() {
        let image = DenseMatrix::zero(28, 28);
        assert!(matches!(
            pack_image(&image, &KERNEL_3X3, 1),
            Err(PackError::UnsupportedShape(_))
        ));
    }
}
