//! Per-layer drivers: build the diagonal operator and bias of each linear layer, BSGS-encode it
//! and advance the scale/level metadata through the layer.

use crate::error::{PackError, Result};
use crate::math::matrix::DenseMatrix;
use crate::math::primes::PrimeChain;
use crate::math::scale::{Scale, ScaleLevel};
use crate::math::slots::{SlotVector, SLOTS};
use crate::pack::bsgs::bsgs_encode;
use crate::pack::diagonal::{conv_diagonals, fc1_diagonals, fc2_diagonals, DiagonalOperator};
use crate::pack::layout::{
    CONV_SPLIT, FC1_OUT, FC1_SPLIT, FC2_BLOCK, FC2_OUT, FC2_SPLIT, GROUP_WIDTH, LANE_STRIDE,
};
use crate::pack::operand::{NamedOperand, OperandBundle};
use log::debug;

/// Packed operands of one layer and the metadata of its output.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerOutput {
    pub operands: OperandBundle,
    pub meta: ScaleLevel,
}

pub struct LinearLayer<'a> {
    pub weight_name: &'a str,
    pub bias_name: &'a str,
    pub diagonals: &'a DiagonalOperator,
    pub bias: SlotVector,
    pub babysteps: &'a [isize],
    pub giantsteps: &'a [isize],
}

/// Broadcasts `values` into lanes `0, LANE_STRIDE, 2 * LANE_STRIDE, ...`, repeating them every
/// `block` lanes for `lanes` lanes. Positions `values.len()..block` of each block are zero.
pub fn pack_bias(values: &[f64], block: usize, lanes: usize) -> Result<SlotVector> {
    if block == 0 || values.len() > block || lanes * LANE_STRIDE > SLOTS {
        return Err(PackError::UnsupportedShape(format!(
            "cannot broadcast {} bias values in blocks of {} over {} lanes",
            values.len(),
            block,
            lanes
        )));
    }
    let mut packed = SlotVector::<SLOTS>::zero();
    for lane in 0..lanes {
        if let Some(x) = values.get(lane % block) {
            packed[lane * LANE_STRIDE] = *x;
        }
    }
    Ok(packed)
}

/// Metadata after `sum_g rotate(sum_b diag * rotate(x, bs), gs)` and one rescale.
fn linear_meta(
    input: &ScaleLevel,
    matrix: &ScaleLevel,
    n_baby: usize,
    n_giant: usize,
    primes: &PrimeChain,
) -> Result<ScaleLevel> {
    let mut partial = input.after_rotation().multiply(matrix)?;
    for _ in 1..n_baby {
        partial = partial.add(&input.after_rotation().multiply(matrix)?)?;
    }
    let mut acc = partial.after_rotation();
    for _ in 1..n_giant {
        acc = acc.add(&partial.after_rotation())?;
    }
    acc.rescale(primes)
}

/// Encodes one linear layer at the level of `input`. The weights are scaled by the next two
/// primes of the chain and the product is rescaled once; the bias is encoded at the resulting
/// scale so it can be added directly.
pub fn pack_linear_layer(
    layer: &LinearLayer,
    input: &ScaleLevel,
    primes: &PrimeChain,
) -> Result<LayerOutput> {
    if layer.babysteps.is_empty() || layer.giantsteps.is_empty() {
        return Err(PackError::UnsupportedShape(format!(
            "{} has an empty BSGS grid",
            layer.weight_name
        )));
    }
    let (p_hi, p_lo) = primes.matrix_primes(input.level())?;
    let scale = Scale::from_integer(p_hi).times(&Scale::from_integer(p_lo));
    let mut operands = bsgs_encode(
        layer.weight_name,
        layer.diagonals,
        &scale,
        layer.babysteps,
        layer.giantsteps,
    )?;

    let matrix = ScaleLevel::new(scale, input.level())?;
    let product = linear_meta(
        input,
        &matrix,
        layer.babysteps.len(),
        layer.giantsteps.len(),
        primes,
    )?;
    let bias = ScaleLevel::new(product.scale().clone(), product.level())?;
    let meta = product.add(&bias)?;
    operands.insert(NamedOperand::new(
        layer.bias_name,
        layer.bias.clone(),
        bias.scale().clone(),
    ))?;

    debug!(
        "{}: {} operands, level {} -> {}, scale {}",
        layer.weight_name,
        operands.len(),
        input.level(),
        meta.level(),
        meta.scale()
    );
    Ok(LayerOutput { operands, meta })
}

/// Convolution with one flattened kernel per row of `kernels`. Every output channel gets its own
/// set of diagonals `conv_weight_{o}_{bs}_{gs}` and bias `conv_bias_{o}`.
pub fn conv2d_io(
    input: &ScaleLevel,
    kernels: &DenseMatrix,
    bias: &[f64],
    primes: &PrimeChain,
) -> Result<LayerOutput> {
    if kernels.rows() == 0 || bias.len() != kernels.rows() {
        return Err(PackError::UnsupportedShape(format!(
            "{} kernels with {} biases",
            kernels.rows(),
            bias.len()
        )));
    }
    let (babysteps, giantsteps) = (CONV_SPLIT.babysteps(), CONV_SPLIT.giantsteps());
    let mut operands = OperandBundle::new();
    let mut meta = None;
    for (o, b) in bias.iter().enumerate() {
        let diagonals = conv_diagonals(kernels, o)?;
        let weight_name = format!("conv_weight_{}", o);
        let bias_name = format!("conv_bias_{}", o);
        let layer = LinearLayer {
            weight_name: &weight_name,
            bias_name: &bias_name,
            diagonals: &diagonals,
            bias: pack_bias(&[*b], 1, GROUP_WIDTH / LANE_STRIDE)?,
            babysteps: &babysteps,
            giantsteps: &giantsteps,
        };
        let out = pack_linear_layer(&layer, input, primes)?;
        operands.merge(out.operands)?;
        meta = Some(out.meta);
    }
    let meta = meta.ok_or_else(|| PackError::UnsupportedShape("no conv channels".into()))?;
    Ok(LayerOutput { operands, meta })
}

/// `256 -> 64` fully-connected layer over an input-major `256 x 64` weight matrix. The bias is
/// tiled over all 256 lanes.
pub fn fc1_io(
    input: &ScaleLevel,
    weights: &DenseMatrix,
    bias: &[f64],
    primes: &PrimeChain,
) -> Result<LayerOutput> {
    if bias.len() != FC1_OUT {
        return Err(PackError::UnsupportedShape(format!(
            "fc1 bias must have {} values, got {}",
            FC1_OUT,
            bias.len()
        )));
    }
    let diagonals = fc1_diagonals(weights, &FC1_SPLIT)?;
    let (babysteps, giantsteps) = (FC1_SPLIT.babysteps(), FC1_SPLIT.giantsteps());
    let layer = LinearLayer {
        weight_name: "fc1_w",
        bias_name: "fc1_b",
        diagonals: &diagonals,
        bias: pack_bias(bias, FC1_OUT, SLOTS / LANE_STRIDE)?,
        babysteps: &babysteps,
        giantsteps: &giantsteps,
    };
    pack_linear_layer(&layer, input, primes)
}

/// `64 -> 10` fully-connected layer over an input-major `64 x 10` weight matrix. Outputs are
/// padded to blocks of 16 lanes.
pub fn fc2_io(
    input: &ScaleLevel,
    weights: &DenseMatrix,
    bias: &[f64],
    primes: &PrimeChain,
) -> Result<LayerOutput> {
    if bias.len() != FC2_OUT {
        return Err(PackError::UnsupportedShape(format!(
            "fc2 bias must have {} values, got {}",
            FC2_OUT,
            bias.len()
        )));
    }
    let diagonals = fc2_diagonals(weights, &FC2_SPLIT)?;
    let (babysteps, giantsteps) = (FC2_SPLIT.babysteps(), FC2_SPLIT.giantsteps());
    let layer = LinearLayer {
        weight_name: "fc2_w",
        bias_name: "fc2_b",
        diagonals: &diagonals,
        bias: pack_bias(bias, FC2_BLOCK, SLOTS / LANE_STRIDE)?,
        babysteps: &babysteps,
        giantsteps: &giantsteps,
    };
    pack_linear_layer(&layer, input, primes)
}
