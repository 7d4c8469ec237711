//! Trains a recurrent network to continue a waveform, then writes the model
//! file and optionally lets the network generate a continuation.
//!
//! The waveform is synthesized here; reading and writing real audio files is
//! left to other tools.

use clap::Parser;
use log::{error, info};
use recurrent_neurons::backend::Backend;
use recurrent_neurons::error::check_len;
use recurrent_neurons::layers::{FeedForwardLayer, LayerRecord, LstmLayer};
use recurrent_neurons::trainer::{Example, Logging, StopCondition, Trainer};
use recurrent_neurons::{Error, NeuralNetwork, Vector};
use serde_derive::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

/// Everything the host needs to know about a run.
#[derive(Parser, Debug)]
#[command(name = "train", version, about = "Train a recurrent network on a waveform")]
struct HostConfig {
    /// Samples per second of the waveform
    #[arg(long, default_value_t = 8000)]
    sample_rate: u32,
    /// Interleaved channels per frame
    #[arg(long, default_value_t = 1)]
    channels: usize,
    /// Frames of history fed to the network per prediction
    #[arg(long, default_value_t = 16)]
    window: usize,
    /// Frames between consecutive training examples
    #[arg(long, default_value_t = 1)]
    step: usize,
    /// Length of the synthesized training waveform
    #[arg(long, default_value_t = 0.25)]
    seconds: f64,
    /// Fundamental frequency of the synthesized waveform, in Hz
    #[arg(long, default_value_t = 220.0)]
    frequency: f64,
    /// Width of each LSTM layer
    #[arg(long, default_value_t = 16)]
    hidden: usize,
    /// Number of stacked LSTM layers before the output layer
    #[arg(long, default_value_t = 1)]
    lstm_layers: usize,
    /// Passes over the training sequence
    #[arg(long, default_value_t = 10)]
    epochs: usize,
    /// Gradient descent step size
    #[arg(long, default_value_t = 0.05)]
    learning_rate: f64,
    /// Seed for parameter initialization; random when omitted
    #[arg(long)]
    seed: Option<u64>,
    /// Continue training the model stored at this path
    #[arg(long)]
    resume: Option<PathBuf>,
    /// Where to write the trained model
    #[arg(long, short, default_value = "model.json")]
    output: PathBuf,
    /// Frames to generate after training, printed one per line
    #[arg(long, default_value_t = 0)]
    generate: usize,
    /// Use BLAS kernels when the build provides them
    #[arg(long)]
    blas: bool,
}

/// The model file: host metadata wrapped around the layer records.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ModelFile {
    sample_rate: u32,
    channels: usize,
    step: usize,
    window: usize,
    network: Vec<LayerRecord>,
}

fn synthesize(config: &HostConfig) -> Vec<f64> {
    let frames = (config.seconds * f64::from(config.sample_rate)) as usize;
    let mut samples = Vec::with_capacity(frames * config.channels);
    for t in 0..frames {
        let time = t as f64 / f64::from(config.sample_rate);
        for c in 0..config.channels {
            let phase = c as f64 * PI / 2.0;
            let fundamental = (2.0 * PI * config.frequency * time + phase).sin();
            let overtone = (4.0 * PI * config.frequency * time + phase).sin();
            samples.push(0.4 * fundamental + 0.1 * overtone);
        }
    }
    samples
}

/// Slices interleaved samples into `window`-frame inputs, each paired with
/// the frame that follows it.
fn examples(config: &HostConfig, samples: &[f64]) -> Vec<Example> {
    let channels = config.channels;
    let frames = samples.len() / channels;
    if frames <= config.window {
        return Vec::new();
    }
    (0..frames - config.window)
        .step_by(config.step.max(1))
        .map(|start| {
            let end = (start + config.window) * channels;
            let input = Vector::from(&samples[start * channels..end]);
            let expected = Vector::from(&samples[end..end + channels]);
            (input, expected)
        })
        .collect()
}

fn build_network(config: &HostConfig) -> NeuralNetwork {
    let mut network = match config.seed {
        Some(seed) => NeuralNetwork::with_seed(seed),
        None => NeuralNetwork::new(),
    };
    let inputs = config.window * config.channels;
    for _ in 0..config.lstm_layers {
        // Only the first layer's input count matters; later ones are wired.
        let layer = LstmLayer::new(inputs, config.hidden, network.rng());
        network.add_layer(layer);
    }
    let layer = FeedForwardLayer::new(inputs, config.channels, network.rng());
    network.add_layer(layer);
    network
}

fn load_model(config: &HostConfig, path: &Path) -> Result<NeuralNetwork, Error> {
    let model: ModelFile = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    check_len(config.channels, model.channels)?;
    check_len(config.window, model.window)?;
    if model.sample_rate != config.sample_rate {
        info!(
            "model was trained at {} Hz, continuing at {} Hz",
            model.sample_rate, config.sample_rate
        );
    }
    let mut network = match config.seed {
        Some(seed) => NeuralNetwork::with_seed(seed),
        None => NeuralNetwork::new(),
    };
    network.load(model.network)?;
    check_len(config.window * config.channels, network.input_len())?;
    Ok(network)
}

fn save_model(config: &HostConfig, network: &NeuralNetwork) -> Result<(), Error> {
    let model = ModelFile {
        sample_rate: config.sample_rate,
        channels: config.channels,
        step: config.step,
        window: config.window,
        network: network.save()?,
    };
    serde_json::to_writer(BufWriter::new(File::create(&config.output)?), &model)?;
    Ok(())
}

/// Feeds the network its own predictions, starting from `seed` history.
fn generate(config: &HostConfig, network: &mut NeuralNetwork, seed: &[f64]) -> Result<(), Error> {
    let mut memory = seed.to_vec();
    network.reset_state();
    for _ in 0..config.generate {
        let frame = network.propagate(&Vector::from(memory.as_slice()))?;
        let line: Vec<String> = frame.iter().map(|s| s.to_string()).collect();
        println!("{}", line.join("\t"));
        memory.drain(..config.channels);
        memory.extend(frame.iter());
    }
    Ok(())
}

fn run(config: &HostConfig) -> Result<(), Error> {
    Backend::select(config.blas);

    let network = match config.resume {
        Some(ref path) => load_model(config, path)?,
        None => build_network(config),
    };
    info!(
        "network has {} layers, {} inputs, {} outputs",
        network.len(),
        network.input_len(),
        network.output_len()
    );

    let samples = synthesize(config);
    let sequence = examples(config, &samples);
    info!("training on {} examples", sequence.len());

    let mut network = Trainer::new(network)
        .learning_rate(config.learning_rate)
        .logging(Logging::Iterations(1))
        .stop_condition(StopCondition::Iterations(config.epochs))
        .train(&[sequence])?;

    save_model(config, &network)?;
    info!("model written to {}", config.output.display());

    if config.generate > 0 {
        let history = config.window * config.channels;
        if samples.len() < history {
            return Err(Error::DimensionMismatch {
                expected: history,
                actual: samples.len(),
            });
        }
        generate(config, &mut network, &samples[samples.len() - history..])?;
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = HostConfig::parse();
    if config.channels == 0 || config.window == 0 {
        error!("channels and window must both be at least 1");
        process::exit(2);
    }
    if let Err(e) = run(&config) {
        error!("{}", e);
        process::exit(1);
    }
}
