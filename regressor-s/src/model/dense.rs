use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::{PredictError, Predictor};
use common::FeatureVector;

/// Units of each hidden layer; the output layer always has a single unit.
pub const HIDDEN_UNITS: [usize; 2] = [50, 10];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Linear,
}

fn default_activation() -> Activation {
    Activation::Linear
}

/// Fully connected layer. `kernel` is laid out `[input][output]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub kernel: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    #[serde(default = "default_activation")]
    pub activation: Activation,
}

impl DenseLayer {
    pub fn input_dim(&self) -> usize {
        self.kernel.len()
    }

    pub fn output_dim(&self) -> usize {
        self.bias.len()
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut output = self.bias.clone();
        for (x, row) in input.iter().zip(&self.kernel) {
            for (out, w) in output.iter_mut().zip(row) {
                *out += x * w;
            }
        }
        if self.activation == Activation::Relu {
            output.iter_mut().for_each(|out| *out = out.max(0.0));
        }
        output
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeightsFile {
    pub layers: Vec<DenseLayer>,
}

/// The regression network: two relu hidden layers and a linear scalar output.
#[derive(Debug)]
pub struct RegressionModel {
    input_dim: usize,
    layers: Vec<DenseLayer>,
}

impl RegressionModel {
    /// `(inputs, outputs, activation)` for each layer of a network taking `input_dim` features.
    pub fn architecture(input_dim: usize) -> Vec<(usize, usize, Activation)> {
        let mut shapes = Vec::with_capacity(HIDDEN_UNITS.len() + 1);
        let mut fan_in = input_dim;
        for units in HIDDEN_UNITS {
            shapes.push((fan_in, units, Activation::Relu));
            fan_in = units;
        }
        shapes.push((fan_in, 1, Activation::Linear));
        shapes
    }

    /// Builds the model, rejecting any layer whose shape or activation differs from
    /// [`RegressionModel::architecture`].
    pub fn from_layers(input_dim: usize, layers: Vec<DenseLayer>) -> Result<Self> {
        let expected = Self::architecture(input_dim);
        if layers.len() != expected.len() {
            bail!(
                "expected {} layers in weights, found {}",
                expected.len(),
                layers.len()
            );
        }

        for (index, (layer, (inputs, outputs, activation))) in
            layers.iter().zip(expected).enumerate()
        {
            if layer.input_dim() != inputs || layer.output_dim() != outputs {
                bail!(
                    "layer {}: expected kernel {}x{}, found {}x{}",
                    index,
                    inputs,
                    outputs,
                    layer.input_dim(),
                    layer.output_dim()
                );
            }
            if let Some(row) = layer.kernel.iter().position(|row| row.len() != outputs) {
                bail!("layer {}: kernel row {} has the wrong width", index, row);
            }
            if layer.activation != activation {
                bail!(
                    "layer {}: expected {:?} activation, found {:?}",
                    index,
                    activation,
                    layer.activation
                );
            }
            let finite = layer.kernel.iter().flatten().chain(&layer.bias).all(|w| w.is_finite());
            if !finite {
                bail!("layer {}: weights must be finite", index);
            }
        }

        Ok(Self { input_dim, layers })
    }

    /// Loads weights from a JSON file. Any failure here must stop startup.
    pub fn load<P: AsRef<Path>>(path: P, input_dim: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("model weights not found: {}", path.display());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model weights: {}", path.display()))?;
        let weights: WeightsFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse model weights: {}", path.display()))?;
        let model = Self::from_layers(input_dim, weights.layers)
            .with_context(|| format!("Invalid model weights: {}", path.display()))?;

        info!(
            "Loaded regression model from {} ({} -> {:?} -> 1)",
            path.display(),
            input_dim,
            HIDDEN_UNITS
        );
        Ok(model)
    }
}

impl Predictor for RegressionModel {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn predict(&self, features: &FeatureVector) -> Result<f32, PredictError> {
        if features.len() != self.input_dim {
            return Err(PredictError::InputShape {
                expected: self.input_dim,
                actual: features.len(),
            });
        }

        let output = self
            .layers
            .iter()
            .fold(features.as_slice().to_vec(), |activations, layer| {
                layer.forward(&activations)
            });

        match output.as_slice() {
            [prediction] if prediction.is_finite() => Ok(*prediction),
            _ => Err(PredictError::NonFinite),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MODEL_FEATURES;
    use tempfile::tempdir;

    fn zero_layers(input_dim: usize) -> Vec<DenseLayer> {
        RegressionModel::architecture(input_dim)
            .into_iter()
            .map(|(inputs, outputs, activation)| DenseLayer {
                kernel: vec![vec![0.0; outputs]; inputs],
                bias: vec![0.0; outputs],
                activation,
            })
            .collect()
    }

    // Routes the sum of all features through the first unit of every layer, doubled at the output.
    fn summing_layers() -> Vec<DenseLayer> {
        let mut layers = zero_layers(MODEL_FEATURES);
        for row in layers[0].kernel.iter_mut() {
            row[0] = 1.0;
        }
        layers[1].kernel[0][0] = 1.0;
        layers[2].kernel[0][0] = 2.0;
        layers[2].bias[0] = 0.5;
        layers
    }

    fn features(values: Vec<f32>) -> FeatureVector {
        FeatureVector::from_values(values, MODEL_FEATURES).unwrap()
    }

    #[test]
    fn test_architecture_matches_training_definition() {
        assert_eq!(
            RegressionModel::architecture(13),
            vec![
                (13, 50, Activation::Relu),
                (50, 10, Activation::Relu),
                (10, 1, Activation::Linear),
            ]
        );
    }

    #[test]
    fn test_forward_pass() {
        let model = RegressionModel::from_layers(MODEL_FEATURES, summing_layers()).unwrap();
        let input = features((1..=13).map(|i| i as f32).collect());
        // 2 * (1 + ... + 13) + 0.5
        assert_eq!(model.predict(&input).unwrap(), 182.5);
    }

    #[test]
    fn test_relu_clamps_negative_activations() {
        let model = RegressionModel::from_layers(MODEL_FEATURES, summing_layers()).unwrap();
        let input = features(vec![-1.0; MODEL_FEATURES]);
        assert_eq!(model.predict(&input).unwrap(), 0.5);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let model = RegressionModel::from_layers(MODEL_FEATURES, summing_layers()).unwrap();
        let input = features(vec![0.25; MODEL_FEATURES]);
        assert_eq!(model.predict(&input).unwrap(), model.predict(&input).unwrap());
    }

    #[test]
    fn test_predict_rejects_wrong_input_dim() {
        let model = RegressionModel::from_layers(MODEL_FEATURES, summing_layers()).unwrap();
        let short = FeatureVector::from_values(vec![1.0; 3], 3).unwrap();
        assert!(matches!(
            model.predict(&short),
            Err(PredictError::InputShape {
                expected: 13,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_overflow_is_a_predict_error() {
        let mut layers = summing_layers();
        layers[2].kernel[0][0] = f32::MAX;
        let model = RegressionModel::from_layers(MODEL_FEATURES, layers).unwrap();
        let input = features(vec![1000.0; MODEL_FEATURES]);
        assert!(matches!(model.predict(&input), Err(PredictError::NonFinite)));
    }

    #[test]
    fn test_rejects_mismatched_shapes() {
        assert!(RegressionModel::from_layers(MODEL_FEATURES, zero_layers(12)).is_err());

        let mut layers = zero_layers(MODEL_FEATURES);
        layers.pop();
        assert!(RegressionModel::from_layers(MODEL_FEATURES, layers).is_err());

        let mut layers = zero_layers(MODEL_FEATURES);
        layers[1].kernel[3].push(0.0);
        assert!(RegressionModel::from_layers(MODEL_FEATURES, layers).is_err());

        let mut layers = zero_layers(MODEL_FEATURES);
        layers[0].activation = Activation::Linear;
        assert!(RegressionModel::from_layers(MODEL_FEATURES, layers).is_err());
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("model.json");
        let weights = WeightsFile {
            layers: summing_layers(),
        };
        fs::write(&path, serde_json::to_vec(&weights)?)?;

        let model = RegressionModel::load(&path, MODEL_FEATURES)?;
        assert_eq!(model.input_dim(), MODEL_FEATURES);
        assert_eq!(model.predict(&features(vec![1.0; MODEL_FEATURES]))?, 26.5);
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        let err = RegressionModel::load("/nonexistent/model.json", MODEL_FEATURES).unwrap_err();
        assert!(err.to_string().contains("model weights not found"));
    }

    #[test]
    fn test_load_malformed_file() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("model.json");
        fs::write(&path, "{\"layers\": [")?;
        assert!(RegressionModel::load(&path, MODEL_FEATURES).is_err());
        Ok(())
    }
}
