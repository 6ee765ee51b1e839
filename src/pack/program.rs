//! End-to-end assembly of the operands for the forward pass
//! `image -> conv -> square -> fc1 -> square -> fc2`.

use crate::error::Result;
use crate::math::matrix::DenseMatrix;
use crate::math::primes::PrimeChain;
use crate::math::scale::{Scale, ScaleLevel};
use crate::pack::image::pack_image;
use crate::pack::layers::{conv2d_io, fc1_io, fc2_io};
use crate::pack::layout::{CONV_STRIDE, IMAGE_SCALE_BITS};
use crate::pack::operand::{NamedOperand, OperandBundle, OutputScaleTable};
use crate::params::ModelParams;
use log::info;
use serde::Serialize;
use std::time::Instant;

/// Names under which each stage's output scale is recorded, in trace order.
pub const STAGES: [&str; 5] = ["conv", "conv_sq", "o2", "o2_sq", "pred"];

/// Everything the evaluation engine needs for one inference.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgramIo {
    pub operands: OperandBundle,
    pub output_scales: OutputScaleTable,
}

/// Metadata of `x * x` followed by two rescales.
pub fn square(meta: &ScaleLevel, primes: &PrimeChain) -> Result<ScaleLevel> {
    meta.multiply(meta)?.rescale(primes)?.rescale(primes)
}

/// Packs `image` and all model operands for an evaluation starting at `level`.
pub fn mnist_program_io(
    image: &DenseMatrix,
    level: usize,
    model: &ModelParams,
    primes: &PrimeChain,
) -> Result<ProgramIo> {
    let mut operands = OperandBundle::new();
    let mut output_scales = OutputScaleTable::new();

    let i0 = Instant::now();
    let image_scale = Scale::pow2(IMAGE_SCALE_BITS);
    let image_meta = ScaleLevel::new(image_scale.clone(), level)?;
    operands.insert(NamedOperand::new(
        "image",
        pack_image(image, &model.kernel, CONV_STRIDE)?,
        image_scale,
    ))?;

    let i1 = Instant::now();
    let conv = conv2d_io(&image_meta, &model.conv_weight, &model.conv_bias, primes)?;
    operands.merge(conv.operands)?;
    output_scales.record(STAGES[0], conv.meta.scale().clone());
    let conv_sq = square(&conv.meta, primes)?;
    output_scales.record(STAGES[1], conv_sq.scale().clone());

    let i2 = Instant::now();
    let o2 = fc1_io(&conv_sq, &model.fc1_weight, &model.fc1_bias, primes)?;
    operands.merge(o2.operands)?;
    output_scales.record(STAGES[2], o2.meta.scale().clone());
    let o2_sq = square(&o2.meta, primes)?;
    output_scales.record(STAGES[3], o2_sq.scale().clone());

    let i3 = Instant::now();
    let pred = fc2_io(&o2_sq, &model.fc2_weight, &model.fc2_bias, primes)?;
    operands.merge(pred.operands)?;
    output_scales.record(STAGES[4], pred.meta.scale().clone());
    let i4 = Instant::now();

    info!("{:?} to pack image", i1 - i0);
    info!("{:?} to pack conv", i2 - i1);
    info!("{:?} to pack fc1", i3 - i2);
    info!("{:?} to pack fc2", i4 - i3);
    info!(
        "{} operands, level {} -> {}",
        operands.len(),
        level,
        pred.meta.level()
    );

    Ok(ProgramIo {
        operands,
        output_scales,
    })
}
