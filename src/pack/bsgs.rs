//! Baby-step/giant-step encoding of diagonal operators.
//!
//! With babysteps `B` and giantsteps `G`, diagonal `g * |B| + b` is used with total rotation
//! `B[b] + G[g]`. Pre-rotating it by `-G[g]` lets the evaluator rotate the input only `|B|` times
//! and each giantstep partial sum once:
//!
//! ```text
//! y = sum_g rotate(sum_b rotate(diag[g * |B| + b], -G[g]) * rotate(x, B[b]), G[g])
//! ```

use crate::error::{PackError, Result};
use crate::math::scale::Scale;
use crate::math::slots::SlotVector;
use crate::pack::diagonal::DiagonalOperator;
use crate::pack::operand::{NamedOperand, OperandBundle};
use itertools::Itertools;

/// Name of the operand holding the diagonal used with babystep `bs` and giantstep `gs`.
pub fn bsgs_name(base: &str, bs: isize, gs: isize) -> String {
    format!("{}_{}_{}", base, bs, gs)
}

fn check_grid<const N: usize>(
    diagonals: &DiagonalOperator<N>,
    babysteps: &[isize],
    giantsteps: &[isize],
) -> Result<()> {
    if babysteps.len() * giantsteps.len() != diagonals.len() {
        return Err(PackError::UnsupportedShape(format!(
            "{} babysteps x {} giantsteps do not cover {} diagonals",
            babysteps.len(),
            giantsteps.len(),
            diagonals.len()
        )));
    }
    Ok(())
}

/// Emits one pre-rotated diagonal per `(giantstep, babystep)` cell, all at `scale`.
pub fn bsgs_encode<const N: usize>(
    base: &str,
    diagonals: &DiagonalOperator<N>,
    scale: &Scale,
    babysteps: &[isize],
    giantsteps: &[isize],
) -> Result<OperandBundle<N>> {
    check_grid(diagonals, babysteps, giantsteps)?;
    let mut out = OperandBundle::new();
    for ((g, &gs), (b, &bs)) in giantsteps
        .iter()
        .enumerate()
        .cartesian_product(babysteps.iter().enumerate())
    {
        let i = g * babysteps.len() + b;
        out.insert(NamedOperand::new(
            bsgs_name(base, bs, gs),
            diagonals[i].rotate(-gs),
            scale.clone(),
        ))?;
    }
    Ok(out)
}

/// Reference matrix-vector product evaluated directly from the diagonals.
pub fn bsgs_matmul<const N: usize>(
    input: &SlotVector<N>,
    diagonals: &DiagonalOperator<N>,
    babysteps: &[isize],
    giantsteps: &[isize],
) -> Result<SlotVector<N>> {
    check_grid(diagonals, babysteps, giantsteps)?;
    let rotated = babysteps.iter().map(|bs| input.rotate(*bs)).collect_vec();
    let mut prod = SlotVector::<N>::zero();
    for (g, &gs) in giantsteps.iter().enumerate() {
        let mut partial = SlotVector::<N>::zero();
        for (b, x) in rotated.iter().enumerate() {
            let i = g * babysteps.len() + b;
            partial += &(&diagonals[i].rotate(-gs) * x);
        }
        prod += &partial.rotate(gs);
    }
    Ok(prod)
}

/// Runs the rotate-multiply-accumulate circuit in plaintext against the operands `bsgs_encode`
/// produced under `base`.
pub fn bsgs_eval_encoded<const N: usize>(
    input: &SlotVector<N>,
    operands: &OperandBundle<N>,
    base: &str,
    babysteps: &[isize],
    giantsteps: &[isize],
) -> Result<SlotVector<N>> {
    let rotated = babysteps.iter().map(|bs| input.rotate(*bs)).collect_vec();
    let mut prod = SlotVector::<N>::zero();
    for &gs in giantsteps {
        let mut partial = SlotVector::<N>::zero();
        for (&bs, x) in babysteps.iter().zip(&rotated) {
            let name = bsgs_name(base, bs, gs);
            let operand = operands.get(&name).ok_or_else(|| {
                PackError::UnsupportedShape(format!("missing operand {}", name))
            })?;
            partial += &(&operand.values * x);
        }
        prod += &partial.rotate(gs);
    }
    Ok(prod)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::matrix::DenseMatrix;
    use crate::pack::diagonal::square_diagonals;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    const N: usize = 64;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!(
                (a - e).abs() <= 1e-9 * e.abs().max(1.),
                "{} != {}",
                a,
                e
            );
        }
    }

    fn random_operator(rng: &mut ChaCha20Rng) -> (DenseMatrix, SlotVector<N>) {
        let m = DenseMatrix::from_fn(N, N, |_, _| rng.gen_range(-1_f64..1_f64));
        let x = SlotVector::from_fn(|_| rng.gen_range(-1_f64..1_f64));
        (m, x)
    }

    fn strided(count: usize, stride: usize) -> Vec<isize> {
        (0..count).map(|i| (i * stride) as isize).collect()
    }

    #[test]
    fn test_encode_count_and_names() {
        let diagonals = DiagonalOperator::<16>::zero(12);
        let scale = Scale::from_integer(1 << 20);
        let (bs, gs) = (strided(4, 1), strided(3, 4));
        let bundle = bsgs_encode("w", &diagonals, &scale, &bs, &gs).unwrap();
        assert_eq!(bundle.len(), 12);
        assert!(bundle.iter().all(|op| op.scale == scale));
        assert!(bundle.get("w_3_8").is_some());
        assert!(bundle.get("w_0_0").is_some());
        assert!(bundle.get("w_4_0").is_none());
    }

    #[test]
    fn test_encode_prerotates() {
        let diagonals = DiagonalOperator::from_diagonals(vec![
            SlotVector::<8>::from_fn(|i| i as f64),
            SlotVector::<8>::from_fn(|i| 10. + i as f64),
        ]);
        let bundle =
            bsgs_encode("d", &diagonals, &Scale::from_integer(1), &[0], &[0, 2]).unwrap();
        assert_eq!(bundle.get("d_0_0").unwrap().values, diagonals[0]);
        assert_eq!(bundle.get("d_0_2").unwrap().values, diagonals[1].rotate(-2));
    }

    #[test]
    fn test_encode_grid_mismatch() {
        let diagonals = DiagonalOperator::<8>::zero(5);
        assert!(matches!(
            bsgs_encode("w", &diagonals, &Scale::from_integer(1), &[0, 1], &[0, 2]),
            Err(PackError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn test_matmul_matches_dense() {
        let mut rng = ChaCha20Rng::seed_from_u64(0x5eed);
        for (n_bs, n_gs) in [(8, 8), (16, 4), (4, 16), (1, 64), (64, 1)] {
            let (m, x) = random_operator(&mut rng);
            let diagonals = square_diagonals::<N>(&m).unwrap();
            let (bs, gs) = (strided(n_bs, 1), strided(n_gs, n_bs));
            let y = bsgs_matmul(&x, &diagonals, &bs, &gs).unwrap();
            assert_close(y.as_slice(), &m.mul_vec(x.as_slice()));
        }
    }

    #[test]
    fn test_encoded_circuit_matches_oracle() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let (m, x) = random_operator(&mut rng);
        let diagonals = square_diagonals::<N>(&m).unwrap();
        let (bs, gs) = (strided(8, 1), strided(8, 8));
        let bundle = bsgs_encode("m", &diagonals, &Scale::from_integer(1), &bs, &gs).unwrap();
        let circuit = bsgs_eval_encoded(&x, &bundle, "m", &bs, &gs).unwrap();
        let oracle = bsgs_matmul(&x, &diagonals, &bs, &gs).unwrap();
        assert_close(circuit.as_slice(), oracle.as_slice());
        assert_close(circuit.as_slice(), &m.mul_vec(x.as_slice()));
    }

    #[test]
    fn test_eval_missing_operand() {
        let bundle = OperandBundle::<8>::new();
        let x = SlotVector::<8>::zero();
        assert!(matches!(
            bsgs_eval_encoded(&x, &bundle, "m", &[0], &[0]),
            Err(PackError::UnsupportedShape(_))
        ));
    }
}
