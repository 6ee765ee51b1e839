//! Loading of the model parameter bundle and input images.
//!
//! Both are JSON. A tensor is `{"shape": [...], "data": [...]}` with `data` in row-major order;
//! the parameter bundle is an object holding one tensor per named parameter:
//!
//! - `conv1_weight`: `[out, kh, kw]` or `[out, 1, kh, kw]`
//! - `conv1_bias`: `[out]`
//! - `fc1_weight`: `[256, 64]`, input-major
//! - `fc1_bias`: `[64]`
//! - `fc2_weight`: `[64, 10]`, input-major
//! - `fc2_bias`: `[10]`

use crate::error::{PackError, Result};
use crate::math::matrix::DenseMatrix;
use crate::pack::image::KernelShape;
use crate::pack::layout::{FC1_IN, FC1_OUT, FC2_IN, FC2_OUT};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Tensor {
    /// Every dimension must be positive and their product must equal `data.len()`.
    fn validate(&self, name: &str) -> std::result::Result<(), String> {
        if self.shape.is_empty() || self.shape.contains(&0) {
            return Err(format!("{}: invalid shape {:?}", name, self.shape));
        }
        let expected = self
            .shape
            .iter()
            .try_fold(1_usize, |acc, d| acc.checked_mul(*d))
            .ok_or_else(|| format!("{}: shape {:?} overflows", name, self.shape))?;
        if expected != self.data.len() {
            return Err(format!(
                "{}: shape {:?} does not match {} values",
                name,
                self.shape,
                self.data.len()
            ));
        }
        Ok(())
    }

    fn matrix(
        &self,
        name: &str,
        rows: usize,
        cols: usize,
    ) -> std::result::Result<DenseMatrix, String> {
        self.validate(name)?;
        if self.shape != [rows, cols] {
            return Err(format!(
                "{}: expected shape [{}, {}], got {:?}",
                name, rows, cols, self.shape
            ));
        }
        DenseMatrix::from_vec(rows, cols, self.data.clone()).map_err(|e| format!("{}: {}", name, e))
    }

    fn vector(&self, name: &str, len: usize) -> std::result::Result<Vec<f64>, String> {
        self.validate(name)?;
        if self.shape != [len] {
            return Err(format!(
                "{}: expected shape [{}], got {:?}",
                name, len, self.shape
            ));
        }
        Ok(self.data.clone())
    }
}

#[derive(Deserialize)]
struct RawParams {
    conv1_weight: Tensor,
    conv1_bias: Tensor,
    fc1_weight: Tensor,
    fc1_bias: Tensor,
    fc2_weight: Tensor,
    fc2_bias: Tensor,
}

/// Validated parameters of the convolutional network.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelParams {
    pub kernel: KernelShape,
    /// One flattened kernel per output channel.
    pub conv_weight: DenseMatrix,
    pub conv_bias: Vec<f64>,
    pub fc1_weight: DenseMatrix,
    pub fc1_bias: Vec<f64>,
    pub fc2_weight: DenseMatrix,
    pub fc2_bias: Vec<f64>,
}

impl ModelParams {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let origin = path.as_ref().display().to_string();
        let data = std::fs::read_to_string(&path).map_err(|e| PackError::load(&origin, e))?;
        Self::from_json(&data, &origin)
    }

    /// Parses a parameter bundle; `origin` names the source in errors.
    pub fn from_json(data: &str, origin: &str) -> Result<Self> {
        let raw: RawParams = serde_json::from_str(data).map_err(|e| PackError::load(origin, e))?;
        Self::from_raw(raw).map_err(|reason| PackError::load(origin, reason))
    }

    fn from_raw(raw: RawParams) -> std::result::Result<Self, String> {
        raw.conv1_weight.validate("conv1_weight")?;
        let kernel = match raw.conv1_weight.shape.as_slice() {
            [out, height, width] | [out, 1, height, width] => KernelShape {
                out_channels: *out,
                height: *height,
                width: *width,
            },
            shape => return Err(format!("conv1_weight: unsupported shape {:?}", shape)),
        };
        let conv_weight =
            DenseMatrix::from_vec(kernel.out_channels, kernel.taps(), raw.conv1_weight.data)
                .map_err(|e| e.to_string())?;
        Ok(Self {
            kernel,
            conv_weight,
            conv_bias: raw.conv1_bias.vector("conv1_bias", kernel.out_channels)?,
            fc1_weight: raw.fc1_weight.matrix("fc1_weight", FC1_IN, FC1_OUT)?,
            fc1_bias: raw.fc1_bias.vector("fc1_bias", FC1_OUT)?,
            fc2_weight: raw.fc2_weight.matrix("fc2_weight", FC2_IN, FC2_OUT)?,
            fc2_bias: raw.fc2_bias.vector("fc2_bias", FC2_OUT)?,
        })
    }
}

/// Loads a 2-D image tensor.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DenseMatrix> {
    let origin = path.as_ref().display().to_string();
    let data = std::fs::read_to_string(&path).map_err(|e| PackError::load(&origin, e))?;
    image_from_json(&data, &origin)
}

/// Parses a 2-D image tensor; `origin` names the source in errors.
pub fn image_from_json(data: &str, origin: &str) -> Result<DenseMatrix> {
    let tensor: Tensor = serde_json::from_str(data).map_err(|e| PackError::load(origin, e))?;
    tensor
        .validate("image")
        .map_err(|reason| PackError::load(origin, reason))?;
    match tensor.shape.as_slice() {
        [rows, cols] => DenseMatrix::from_vec(*rows, *cols, tensor.data)
            .map_err(|e| PackError::load(origin, e)),
        shape => Err(PackError::load(
            origin,
            format!("image must be 2-D, got shape {:?}", shape),
        )),
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;
    use serde_json::json;

    fn tensor(shape: &[usize], rng: &mut ChaCha20Rng) -> Tensor {
        let len: usize = shape.iter().product();
        Tensor {
            shape: shape.to_vec(),
            data: (0..len).map(|_| rng.gen_range(-0.5_f64..0.5_f64)).collect(),
        }
    }

    /// A seeded bundle with the shapes of the MNIST network, as JSON.
    pub(crate) fn synthetic_params_json(seed: u64) -> serde_json::Value {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        json!({
            "conv1_weight": tensor(&[4, 1, 7, 7], &mut rng),
            "conv1_bias": tensor(&[4], &mut rng),
            "fc1_weight": tensor(&[256, 64], &mut rng),
            "fc1_bias": tensor(&[64], &mut rng),
            "fc2_weight": tensor(&[64, 10], &mut rng),
            "fc2_bias": tensor(&[10], &mut rng),
        })
    }

    pub(crate) fn synthetic_params(seed: u64) -> ModelParams {
        ModelParams::from_json(&synthetic_params_json(seed).to_string(), "synthetic").unwrap()
    }

    #[test]
    fn test_from_json() {
        let params = synthetic_params(1);
        assert_eq!(
            params.kernel,
            KernelShape {
                out_channels: 4,
                height: 7,
                width: 7
            }
        );
        assert_eq!((params.conv_weight.rows(), params.conv_weight.cols()), (4, 49));
        assert_eq!(params.fc2_bias.len(), 10);
    }

    #[test]
    fn test_three_dim_kernel() {
        let mut value = synthetic_params_json(2);
        value["conv1_weight"]["shape"] = json!([4, 7, 7]);
        let params = ModelParams::from_json(&value.to_string(), "p").unwrap();
        assert_eq!(params.kernel.taps(), 49);
    }

    #[test]
    fn test_missing_key() {
        let mut value = synthetic_params_json(3);
        value.as_object_mut().unwrap().remove("fc2_bias");
        assert!(matches!(
            ModelParams::from_json(&value.to_string(), "p"),
            Err(PackError::ParameterLoad { .. })
        ));
    }

    #[test]
    fn test_wrong_shape() {
        let mut value = synthetic_params_json(4);
        value["fc1_weight"]["shape"] = json!([64, 256]);
        assert!(matches!(
            ModelParams::from_json(&value.to_string(), "p"),
            Err(PackError::ParameterLoad { .. })
        ));

        let mut value = synthetic_params_json(4);
        value["conv1_bias"]["shape"] = json!([2, 2]);
        assert!(ModelParams::from_json(&value.to_string(), "p").is_err());
    }

    #[test]
    fn test_inconsistent_data() {
        let mut value = synthetic_params_json(5);
        value["fc2_bias"]["data"] = json!([1.0, 2.0]);
        assert!(ModelParams::from_json(&value.to_string(), "p").is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ModelParams::from_json("{\"conv1_weight\": ", "p"),
            Err(PackError::ParameterLoad { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ModelParams::load("/nonexistent/ConvMNIST.json").unwrap_err();
        match err {
            PackError::ParameterLoad { path, .. } => {
                assert_eq!(path, "/nonexistent/ConvMNIST.json")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_shape_overflow() {
        let huge = 1_usize << 32;
        let image = json!({"shape": [huge, huge], "data": []});
        assert!(matches!(
            image_from_json(&image.to_string(), "img"),
            Err(PackError::ParameterLoad { .. })
        ));

        let mut value = synthetic_params_json(6);
        value["fc2_bias"]["shape"] = json!([huge, huge, 10]);
        assert!(matches!(
            ModelParams::from_json(&value.to_string(), "p"),
            Err(PackError::ParameterLoad { .. })
        ));

        let mut value = synthetic_params_json(7);
        value["conv1_weight"] = json!({"shape": [0, huge, huge], "data": []});
        assert!(matches!(
            ModelParams::from_json(&value.to_string(), "p"),
            Err(PackError::ParameterLoad { .. })
        ));
    }

    #[test]
    fn test_image_from_json() {
        let image = json!({"shape": [2, 3], "data": [1., 2., 3., 4., 5., 6.]});
        let m = image_from_json(&image.to_string(), "img").unwrap();
        assert_eq!((m.rows(), m.cols()), (2, 3));
        assert_eq!(m[(1, 0)], 4.);

        let flat = json!({"shape": [6], "data": [1., 2., 3., 4., 5., 6.]});
        assert!(matches!(
            image_from_json(&flat.to_string(), "img"),
            Err(PackError::ParameterLoad { .. })
        ));
    }
}
