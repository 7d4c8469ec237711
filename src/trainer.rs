//! Repeated gradient descent over example sequences.

use crate::error::{check_len, Error, Result};
use crate::layers::DEFAULT_MUTABILITY;
use crate::network::NeuralNetwork;
use crate::vector::Vector;

use log::{info, trace};
use std::time::{Duration, Instant};

/// One `(network input, expected output)` pair.
pub type Example = (Vector, Vector);

/// A builder for training networks on sequences of examples.
///
/// Every sequence is treated as independent: recurrent state is reset before
/// it starts, and examples within it are presented in order.
#[derive(Debug)]
pub struct Trainer {
    network: NeuralNetwork,
    learning_rate: f64,
    logging: Logging,
    stop_condition: StopCondition,
}

impl Trainer {
    /// Wraps `network` for training with a learning rate of 0.05, 1000
    /// iterations and a summary logged at completion.
    pub fn new(network: NeuralNetwork) -> Self {
        Trainer {
            network,
            learning_rate: DEFAULT_MUTABILITY,
            logging: Logging::Completion,
            stop_condition: StopCondition::Iterations(1000),
        }
    }

    /// Sets the learning rate to use during gradient descent.
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Sets the type of logging to be emitted during training.
    pub fn logging(mut self, logging: Logging) -> Self {
        self.logging = logging;
        self
    }

    /// Sets the condition to finish training.
    pub fn stop_condition<C>(mut self, condition: C) -> Self
    where
        C: Into<StopCondition>,
    {
        self.stop_condition = condition.into();
        self
    }

    /// Trains the network on the provided sequences.
    ///
    /// One iteration presents every example of every sequence once. The
    /// reported training error is the mean half squared error over all
    /// examples of the iteration.
    ///
    /// Returns:
    ///   The trained network, or an error if an example does not fit the
    ///   network.
    pub fn train<S>(mut self, sequences: &[S]) -> Result<NeuralNetwork>
    where
        S: AsRef<[Example]>,
    {
        self.validate(sequences)?;
        let examples: usize = sequences.iter().map(|s| s.as_ref().len()).sum();

        let start_time = Instant::now();
        let mut iteration = 0;
        let mut training_error;
        loop {
            training_error = 0.0;
            for sequence in sequences {
                self.network.reset_state();
                for (input, expected) in sequence.as_ref() {
                    let loss = self.network.train(input, expected, self.learning_rate)?;
                    trace!("sample loss {}", loss);
                    training_error += loss;
                }
            }
            if examples > 0 {
                training_error /= examples as f64;
            }
            iteration += 1;

            self.logging.iteration(iteration, training_error);
            if self
                .stop_condition
                .should_stop(iteration, training_error, start_time)
            {
                break;
            }
        }
        self.logging
            .completion(iteration, training_error, start_time);
        self.network.reset_state();
        Ok(self.network)
    }

    /// Verifies that every example fits the network, returning an error if
    /// something is wrong.
    fn validate<S>(&self, sequences: &[S]) -> Result<()>
    where
        S: AsRef<[Example]>,
    {
        if self.network.is_empty() {
            return Err(Error::EmptyNetwork);
        }
        for (input, output) in sequences.iter().flat_map(|s| s.as_ref()) {
            check_len(self.network.input_len(), input.len())?;
            check_len(self.network.output_len(), output.len())?;
        }
        Ok(())
    }
}

/// How much progress the trainer reports through `log`.
#[derive(Copy, Clone, Debug)]
pub enum Logging {
    /// No logs will be emitted
    Silent,
    /// A summary will be logged at completion
    Completion,
    /// A summary will be logged after every `n` training iterations
    Iterations(usize),
}

impl Logging {
    /// Performs logging at the current `iteration` of training.
    fn iteration(&self, iteration: usize, training_error: f64) {
        if let Logging::Iterations(freq) = *self {
            if freq > 0 && iteration % freq == 0 {
                info!("Iteration {}:\tloss={}", iteration, training_error);
            }
        }
    }

    /// Performs logging at the end of training.
    fn completion(&self, iterations: usize, training_error: f64, start_time: Instant) {
        if let Logging::Silent = *self {
            return;
        }
        info!(
            "Ran {} iterations in {:.2} seconds.",
            iterations,
            start_time.elapsed().as_secs_f64()
        );
        info!("Final loss: {}", training_error);
    }
}

/// When to stop training.
#[derive(Copy, Clone, Debug)]
pub enum StopCondition {
    /// Stops after the provided number of training iterations
    Iterations(usize),
    /// Stops when the training error drops below the provided threshold
    ErrorThreshold(f64),
    /// Stops after the provided duration
    Duration(Duration),
}

impl From<Duration> for StopCondition {
    fn from(duration: Duration) -> StopCondition {
        StopCondition::Duration(duration)
    }
}

impl StopCondition {
    /// Returns true once training is complete.
    fn should_stop(&self, iteration: usize, training_error: f64, start_time: Instant) -> bool {
        use self::StopCondition::*;
        match *self {
            Iterations(iterations) => iteration >= iterations,
            ErrorThreshold(threshold) => training_error < threshold,
            Duration(duration) => start_time.elapsed() > duration,
        }
    }
}
