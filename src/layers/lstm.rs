use crate::activator::Activator;
use crate::error::{check_len, Result};
use crate::layers::Layer;
use crate::matrix::Mat;
use crate::utils::ZeroOut;
use crate::vector::Vector;

use itertools::multizip;
use log::debug;
use rand::distributions::Uniform;
use rand::Rng;
use serde_derive::{Deserialize, Serialize};
use std::mem;

pub(crate) const TYPE_NAME: &str = "lstm";

/// Half-width of the initialization range. Small weights keep the gates
/// away from saturation early in training.
const INIT_RANGE: f64 = 0.01;

const GATE: Activator = Activator::Sigmoid;
const CELL: Activator = Activator::TanH;

/// The parameters of one gate: `activation(W·x + U·p + b)`.
#[derive(Clone, Debug, Default, PartialEq)]
struct Gate {
    /// Input weights, `outputs × inputs`.
    weights: Mat,
    /// Recurrent weights applied to the previous output, `outputs × outputs`.
    state_weights: Mat,
    bias: Vector,
}

impl Gate {
    fn random<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let distribution = Uniform::new_inclusive(-INIT_RANGE, INIT_RANGE);
        Gate {
            weights: Mat::random(&distribution, outputs, inputs, rng),
            state_weights: Mat::random(&distribution, outputs, outputs, rng),
            bias: Vector::random(&distribution, outputs, rng),
        }
    }

    fn load(
        inputs: usize,
        outputs: usize,
        weights: Vec<f64>,
        state_weights: Vec<f64>,
        bias: Vec<f64>,
    ) -> Result<Self> {
        check_len(outputs, bias.len())?;
        Ok(Gate {
            weights: Mat::from_row_major(outputs, inputs, weights)?,
            state_weights: Mat::from_row_major(outputs, outputs, state_weights)?,
            bias: bias.into(),
        })
    }

    fn activate(&self, activator: Activator, input: &Vector, previous: &Vector) -> Result<Vector> {
        let activation = self
            .weights
            .mul_vec(input)?
            .try_add(&self.state_weights.mul_vec(previous)?)?
            .try_add(&self.bias)?;
        Ok(activator.apply(&activation))
    }

    fn update(
        &mut self,
        mutability: f64,
        delta: &Vector,
        input: &Vector,
        previous: &Vector,
    ) -> Result<()> {
        self.weights.add_outer(-mutability, delta, input)?;
        self.state_weights.add_outer(-mutability, delta, previous)?;
        self.bias.add_scaled(-mutability, delta)
    }
}

/// Gate outputs for one time step.
struct Activations {
    forget: Vector,
    learn: Vector,
    info: Vector,
    out_gate: Vector,
}

/// A [long short-term memory](https://en.wikipedia.org/wiki/Long_short-term_memory)
/// layer.
///
/// The layer carries a cell state and its previous output from one
/// `propagate` call to the next. Each call also keeps the state it started
/// from, so that a following `train` call sees exactly the activations that
/// produced its `output`. Gradients reach one step back in time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LstmLayer {
    forget: Gate,
    learn: Gate,
    cell: Gate,
    output: Gate,

    cell_state: Vector,
    previous_output: Vector,
    /// `cell_state` as it was before the most recent `propagate`.
    train_state: Vector,
    /// `previous_output` as it was before the most recent `propagate`.
    train_output: Vector,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Data {
    forget_weights: Vec<f64>,
    learn_weights: Vec<f64>,
    cell_weights: Vec<f64>,
    output_weights: Vec<f64>,
    forget_state_weights: Vec<f64>,
    learn_state_weights: Vec<f64>,
    cell_state_weights: Vec<f64>,
    output_state_weights: Vec<f64>,
    forget_bias: Vec<f64>,
    learn_bias: Vec<f64>,
    cell_bias: Vec<f64>,
    output_bias: Vec<f64>,
}

impl LstmLayer {
    /// Initializes a new, untrained layer with zeroed state.
    pub fn new<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let mut layer = LstmLayer::default();
        layer.resize(inputs, outputs, rng);
        layer
    }

    fn activations(&self, input: &Vector, previous: &Vector) -> Result<Activations> {
        Ok(Activations {
            forget: self.forget.activate(GATE, input, previous)?,
            learn: self.learn.activate(GATE, input, previous)?,
            info: self.cell.activate(CELL, input, previous)?,
            out_gate: self.output.activate(GATE, input, previous)?,
        })
    }

    fn zero_state(&mut self, outputs: usize) {
        self.cell_state = Vector::zeros(outputs);
        self.previous_output = Vector::zeros(outputs);
        self.train_state = Vector::zeros(outputs);
        self.train_output = Vector::zeros(outputs);
    }
}

impl Layer for LstmLayer {
    fn input_len(&self) -> usize {
        self.forget.weights.cols()
    }

    fn output_len(&self) -> usize {
        self.forget.weights.rows()
    }

    fn resize<R: Rng + ?Sized>(&mut self, inputs: usize, outputs: usize, rng: &mut R) {
        debug!("initializing {} layer {} -> {}", TYPE_NAME, inputs, outputs);
        self.forget = Gate::random(inputs, outputs, rng);
        self.learn = Gate::random(inputs, outputs, rng);
        self.cell = Gate::random(inputs, outputs, rng);
        self.output = Gate::random(inputs, outputs, rng);
        self.zero_state(outputs);
    }

    fn propagate(&mut self, input: &Vector) -> Result<Vector> {
        check_len(self.input_len(), input.len())?;
        let acts = self.activations(input, &self.previous_output)?;

        let cell_state = acts
            .forget
            .hadamard(&self.cell_state)?
            .try_add(&acts.learn.hadamard(&acts.info)?)?;
        let output = CELL.apply(&acts.out_gate.hadamard(&cell_state)?);

        self.train_state = mem::replace(&mut self.cell_state, cell_state);
        self.train_output = mem::replace(&mut self.previous_output, output.clone());
        Ok(output)
    }

    fn train(
        &mut self,
        input: &Vector,
        output: &Vector,
        delta: &Vector,
        mutability: f64,
    ) -> Result<Vector> {
        check_len(self.input_len(), input.len())?;
        check_len(self.output_len(), output.len())?;
        check_len(self.output_len(), delta.len())?;

        let delta = delta.hadamard(&CELL.derivative(output))?;
        let acts = self.activations(input, &self.train_output)?;

        let outputs = self.output_len();
        let mut forget_delta = Vector::zeros(outputs);
        let mut learn_delta = Vector::zeros(outputs);
        let mut info_delta = Vector::zeros(outputs);
        let mut out_delta = Vector::zeros(outputs);
        for (y, (&d, &f, &l, &i, &o, &prev_cell, &cell)) in multizip((
            delta.iter(),
            acts.forget.iter(),
            acts.learn.iter(),
            acts.info.iter(),
            acts.out_gate.iter(),
            self.train_state.iter(),
            self.cell_state.iter(),
        ))
        .enumerate()
        {
            forget_delta[y] = d * o * prev_cell * GATE.fprime(f);
            learn_delta[y] = d * o * i * GATE.fprime(l);
            info_delta[y] = d * o * l * CELL.fprime(i);
            out_delta[y] = d * cell * GATE.fprime(o);
        }

        let input_delta = self
            .forget
            .weights
            .vec_mul(&forget_delta)?
            .try_add(&self.learn.weights.vec_mul(&learn_delta)?)?
            .try_add(&self.cell.weights.vec_mul(&info_delta)?)?
            .try_add(&self.output.weights.vec_mul(&out_delta)?)?;

        self.forget
            .update(mutability, &forget_delta, input, &self.train_output)?;
        self.learn
            .update(mutability, &learn_delta, input, &self.train_output)?;
        self.cell
            .update(mutability, &info_delta, input, &self.train_output)?;
        self.output
            .update(mutability, &out_delta, input, &self.train_output)?;
        Ok(input_delta)
    }

    fn reset_state(&mut self) {
        for state in [
            &mut self.cell_state,
            &mut self.previous_output,
            &mut self.train_state,
            &mut self.train_output,
        ] {
            state.zero_out();
        }
    }

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn save_data(&self) -> Result<serde_json::Value> {
        fn flat(m: &Mat) -> Vec<f64> {
            m.as_slice().to_vec()
        }
        let data = Data {
            forget_weights: flat(&self.forget.weights),
            learn_weights: flat(&self.learn.weights),
            cell_weights: flat(&self.cell.weights),
            output_weights: flat(&self.output.weights),
            forget_state_weights: flat(&self.forget.state_weights),
            learn_state_weights: flat(&self.learn.state_weights),
            cell_state_weights: flat(&self.cell.state_weights),
            output_state_weights: flat(&self.output.state_weights),
            forget_bias: self.forget.bias.as_slice().to_vec(),
            learn_bias: self.learn.bias.as_slice().to_vec(),
            cell_bias: self.cell.bias.as_slice().to_vec(),
            output_bias: self.output.bias.as_slice().to_vec(),
        };
        Ok(serde_json::to_value(data)?)
    }

    fn load_data(&mut self, inputs: usize, outputs: usize, data: serde_json::Value) -> Result<()> {
        let data: Data = serde_json::from_value(data)?;
        let forget = Gate::load(
            inputs,
            outputs,
            data.forget_weights,
            data.forget_state_weights,
            data.forget_bias,
        )?;
        let learn = Gate::load(
            inputs,
            outputs,
            data.learn_weights,
            data.learn_state_weights,
            data.learn_bias,
        )?;
        let cell = Gate::load(
            inputs,
            outputs,
            data.cell_weights,
            data.cell_state_weights,
            data.cell_bias,
        )?;
        let output = Gate::load(
            inputs,
            outputs,
            data.output_weights,
            data.output_state_weights,
            data.output_bias,
        )?;
        self.forget = forget;
        self.learn = learn;
        self.cell = cell;
        self.output = output;
        self.zero_state(outputs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// A layer with parameters large enough to give clearly non-zero
    /// gradients.
    fn wide_layer(inputs: usize, outputs: usize, seed: u64) -> LstmLayer {
        let mut rng = StdRng::seed_from_u64(seed);
        let distribution = Uniform::new_inclusive(-1.0, 1.0);
        let mut gate = || Gate {
            weights: Mat::random(&distribution, outputs, inputs, &mut rng),
            state_weights: Mat::random(&distribution, outputs, outputs, &mut rng),
            bias: Vector::random(&distribution, outputs, &mut rng),
        };
        let mut layer = LstmLayer {
            forget: gate(),
            learn: gate(),
            cell: gate(),
            output: gate(),
            ..LstmLayer::default()
        };
        layer.zero_state(outputs);
        layer
    }

    fn loss(layer: &mut LstmLayer, input: &Vector, expected: &Vector) -> f64 {
        layer.reset_state();
        let output = layer.propagate(input).unwrap();
        output
            .iter()
            .zip(expected.iter())
            .map(|(a, e)| 0.5 * (a - e) * (a - e))
            .sum()
    }

    #[test]
    fn parameter_shapes() {
        let layer = LstmLayer::new(3, 2, &mut StdRng::seed_from_u64(0));
        for gate in &[&layer.forget, &layer.learn, &layer.cell, &layer.output] {
            assert_eq!((gate.weights.rows(), gate.weights.cols()), (2, 3));
            assert_eq!(
                (gate.state_weights.rows(), gate.state_weights.cols()),
                (2, 2)
            );
            assert_eq!(gate.bias.len(), 2);
            for &w in gate.weights.as_slice() {
                assert!(w.abs() <= INIT_RANGE);
            }
        }
    }

    #[test]
    fn wrong_input_size() {
        let mut layer = LstmLayer::new(3, 2, &mut StdRng::seed_from_u64(0));
        match layer.propagate(&Vector::zeros(4)) {
            Err(Error::DimensionMismatch { expected, actual }) => {
                assert_eq!((expected, actual), (3, 4));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        let out = Vector::zeros(2);
        assert!(layer.train(&Vector::zeros(3), &out, &Vector::zeros(3), 0.1).is_err());
    }

    #[test]
    fn state_carries_between_calls() {
        let mut layer = wide_layer(2, 3, 4);
        let input = Vector::from(vec![0.5, -0.5]);
        let first = layer.propagate(&input).unwrap();
        let second = layer.propagate(&input).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn reset_makes_propagation_deterministic() {
        let mut layer = wide_layer(2, 3, 4);
        let input = Vector::from(vec![0.5, -0.5]);
        layer.propagate(&input).unwrap();
        layer.reset_state();
        let first = layer.propagate(&input).unwrap();
        layer.reset_state();
        let second = layer.propagate(&input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn propagate_snapshots_previous_state() {
        let mut layer = wide_layer(2, 2, 8);
        let input = Vector::from(vec![1.0, 0.25]);
        let first = layer.propagate(&input).unwrap();
        let cell_after_first = layer.cell_state.clone();
        layer.propagate(&input).unwrap();
        assert_eq!(layer.train_output, first);
        assert_eq!(layer.train_state, cell_after_first);
    }

    #[test]
    fn train_uses_pre_propagate_state() {
        let mut layer = wide_layer(3, 2, 21);
        let input = Vector::from(vec![0.2, -0.7, 0.4]);
        layer.reset_state();
        let output = layer.propagate(&input).unwrap();
        let before = layer.clone();
        let delta = Vector::from(vec![0.5, -0.5]);
        layer.train(&input, &output, &delta, 0.1).unwrap();

        // The snapshot taken by `propagate` is all zeros, so nothing that
        // multiplies the previous output or previous cell state may move.
        for (old, new) in [
            (&before.forget, &layer.forget),
            (&before.learn, &layer.learn),
            (&before.cell, &layer.cell),
            (&before.output, &layer.output),
        ]
        .iter()
        {
            assert_eq!(old.state_weights, new.state_weights);
        }
        assert_eq!(before.forget, layer.forget);

        assert_ne!(before.learn.weights, layer.learn.weights);
        assert_ne!(before.cell.bias, layer.cell.bias);
        assert_ne!(before.output.bias, layer.output.bias);
    }

    #[test]
    fn first_step_gradients_match_finite_differences() {
        // From a zeroed state one step of backpropagation through time is
        // the exact gradient.
        let h = 1e-6;
        let rate = 1e-3;
        let layer = wide_layer(3, 2, 13);
        let input = Vector::from(vec![0.6, -0.4, 0.3]);
        let expected = Vector::from(vec![0.2, -0.1]);

        let mut trained = layer.clone();
        trained.reset_state();
        let output = trained.propagate(&input).unwrap();
        let delta = output.try_sub(&expected).unwrap();
        let input_delta = trained.train(&input, &output, &delta, rate).unwrap();

        for x in 0..3 {
            let mut plus = input.clone();
            plus[x] += h;
            let mut minus = input.clone();
            minus[x] -= h;
            let numeric = (loss(&mut layer.clone(), &plus, &expected)
                - loss(&mut layer.clone(), &minus, &expected))
                / (2.0 * h);
            assert!((numeric - input_delta[x]).abs() < 1e-3, "x[{}]", x);
        }

        fn learn_bias(l: &mut LstmLayer) -> &mut Vector {
            &mut l.learn.bias
        }
        fn cell_bias(l: &mut LstmLayer) -> &mut Vector {
            &mut l.cell.bias
        }
        fn output_bias(l: &mut LstmLayer) -> &mut Vector {
            &mut l.output.bias
        }
        let biases: [fn(&mut LstmLayer) -> &mut Vector; 3] = [learn_bias, cell_bias, output_bias];
        for bias in biases.iter() {
            for y in 0..2 {
                let mut plus = layer.clone();
                bias(&mut plus)[y] += h;
                let mut minus = layer.clone();
                bias(&mut minus)[y] -= h;
                let numeric = (loss(&mut plus, &input, &expected)
                    - loss(&mut minus, &input, &expected))
                    / (2.0 * h);
                let analytic =
                    (bias(&mut layer.clone())[y] - bias(&mut trained.clone())[y]) / rate;
                assert!((numeric - analytic).abs() < 1e-3, "bias[{}]", y);
            }
        }
    }

    fn gate_mut(layer: &mut LstmLayer, index: usize) -> &mut Gate {
        match index {
            0 => &mut layer.forget,
            1 => &mut layer.learn,
            2 => &mut layer.cell,
            _ => &mut layer.output,
        }
    }

    /// Loss of one `propagate` from whatever state `layer` currently holds.
    fn step_loss(layer: &LstmLayer, input: &Vector, expected: &Vector) -> f64 {
        let output = layer.clone().propagate(input).unwrap();
        output
            .iter()
            .zip(expected.iter())
            .map(|(a, e)| 0.5 * (a - e) * (a - e))
            .sum()
    }

    /// Compares the change `train` made to one parameter against a central
    /// difference of `step_loss`, with the recurrent state of `primed` held
    /// fixed.
    fn check_parameter<F>(
        name: &str,
        primed: &LstmLayer,
        trained: &LstmLayer,
        input: &Vector,
        expected: &Vector,
        rate: f64,
        param: F,
    ) where
        F: Fn(&mut LstmLayer) -> &mut f64,
    {
        let h = 1e-6;
        let mut plus = primed.clone();
        *param(&mut plus) += h;
        let mut minus = primed.clone();
        *param(&mut minus) -= h;
        let numeric =
            (step_loss(&plus, input, expected) - step_loss(&minus, input, expected)) / (2.0 * h);
        let analytic = (*param(&mut primed.clone()) - *param(&mut trained.clone())) / rate;
        assert!(
            (numeric - analytic).abs() < 1e-3,
            "{}: {} vs {}",
            name,
            numeric,
            analytic
        );
    }

    #[test]
    fn second_step_gradients_match_finite_differences() {
        let rate = 1e-3;
        let (inputs, outputs) = (3, 2);
        let first = Vector::from(vec![0.9, -0.3, 0.5]);
        let input = Vector::from(vec![-0.2, 0.7, 0.4]);
        let expected = Vector::from(vec![0.3, -0.4]);

        let mut primed = wide_layer(inputs, outputs, 29);
        primed.reset_state();
        primed.propagate(&first).unwrap();
        assert!(primed.cell_state.iter().all(|&c| c != 0.0));
        assert!(primed.previous_output.iter().all(|&p| p != 0.0));

        let mut trained = primed.clone();
        let output = trained.propagate(&input).unwrap();
        let delta = output.try_sub(&expected).unwrap();
        let input_delta = trained.train(&input, &output, &delta, rate).unwrap();

        for x in 0..inputs {
            let mut plus = input.clone();
            plus[x] += 1e-6;
            let mut minus = input.clone();
            minus[x] -= 1e-6;
            let numeric = (step_loss(&primed, &plus, &expected)
                - step_loss(&primed, &minus, &expected))
                / 2e-6;
            assert!((numeric - input_delta[x]).abs() < 1e-3, "x[{}]", x);
        }

        let names = ["forget", "learn", "cell", "output"];
        for (g, name) in names.iter().enumerate() {
            for y in 0..outputs {
                for x in 0..inputs {
                    check_parameter(name, &primed, &trained, &input, &expected, rate, |l| {
                        &mut gate_mut(l, g).weights[(y, x)]
                    });
                }
                for x in 0..outputs {
                    check_parameter(name, &primed, &trained, &input, &expected, rate, |l| {
                        &mut gate_mut(l, g).state_weights[(y, x)]
                    });
                }
                check_parameter(name, &primed, &trained, &input, &expected, rate, |l| {
                    &mut gate_mut(l, g).bias[y]
                });
            }
        }
    }

    #[test]
    fn reset_zeroes_all_state() {
        let mut layer = wide_layer(2, 2, 3);
        let input = Vector::from(vec![1.0, -1.0]);
        layer.propagate(&input).unwrap();
        layer.propagate(&input).unwrap();
        layer.reset_state();
        for state in &[
            &layer.cell_state,
            &layer.previous_output,
            &layer.train_state,
            &layer.train_output,
        ] {
            assert!(state.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn save_load_reproduces_output() {
        let mut layer = wide_layer(3, 2, 17);
        let data = layer.save_data().unwrap();
        assert_eq!(data["forget-state-weights"].as_array().unwrap().len(), 4);
        assert_eq!(data["output-weights"].as_array().unwrap().len(), 6);

        let mut loaded = LstmLayer::default();
        loaded.load_data(3, 2, data).unwrap();
        assert_eq!(layer, loaded);

        let input = Vector::from(vec![0.3, 0.2, 0.1]);
        for _ in 0..3 {
            assert_eq!(layer.propagate(&input).unwrap(), loaded.propagate(&input).unwrap());
        }
    }

    #[test]
    fn load_rejects_wrong_lengths() {
        let layer = wide_layer(3, 2, 17);
        let data = layer.save_data().unwrap();
        assert!(LstmLayer::default().load_data(2, 2, data).is_err());
    }
}
