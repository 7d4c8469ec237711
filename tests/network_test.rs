use recurrent_neurons::layers::{FeedForwardLayer, Layer, LayerRecord, LstmLayer};
use recurrent_neurons::matrix::Mat;
use recurrent_neurons::trainer::{Example, Logging, StopCondition, Trainer};
use recurrent_neurons::{Error, NeuralNetwork, Vector};

fn stacked(seed: u64) -> NeuralNetwork {
    let mut network = NeuralNetwork::with_seed(seed);
    let first = LstmLayer::new(2, 5, network.rng());
    network.add_layer(first);
    let second = LstmLayer::new(9, 3, network.rng());
    network.add_layer(second);
    let last = FeedForwardLayer::new(1, 2, network.rng());
    network.add_layer(last);
    network
}

#[test]
fn tanh_of_zero_activation() {
    let weights = Mat::from_row_major(1, 2, vec![0.5, -0.5]).unwrap();
    let layer = FeedForwardLayer::from_parameters(weights, Vector::zeros(1)).unwrap();
    let mut network = NeuralNetwork::with_seed(0);
    network.add_layer(layer);
    let output = network.propagate(&Vector::from(vec![1.0, 1.0])).unwrap();
    assert_eq!(output.as_slice(), &[0.0]);
}

#[test]
fn vector_index_wraps() {
    let v = Vector::from(vec![1.0, 2.0, 3.0]);
    assert_eq!(v.at(4), v.at(1));
}

#[test]
fn layers_are_wired_in_order() {
    let network = stacked(1);
    let shapes: Vec<(usize, usize)> = network
        .layers()
        .iter()
        .map(|layer| (layer.input_len(), layer.output_len()))
        .collect();
    assert_eq!(shapes, vec![(2, 5), (5, 3), (3, 2)]);
}

#[test]
fn propagate_rejects_wrong_input() {
    let mut network = stacked(2);
    match network.propagate(&Vector::zeros(3)) {
        Err(Error::DimensionMismatch { expected, actual }) => {
            assert_eq!((expected, actual), (2, 3));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn reset_makes_propagation_repeatable() {
    let mut network = stacked(3);
    let input = Vector::from(vec![0.3, -0.7]);
    network.reset_state();
    let first = network.propagate(&input).unwrap();
    let drifted = network.propagate(&input).unwrap();
    assert_ne!(first, drifted);
    network.reset_state();
    assert_eq!(first, network.propagate(&input).unwrap());
}

#[test]
fn saved_model_reproduces_outputs() {
    let sequence: Vec<Example> = (0..6)
        .map(|i| {
            let x = i as f64 * 0.4;
            (
                Vector::from(vec![x.sin(), x.cos()]),
                Vector::from(vec![0.5 * x.cos(), -0.5 * x.sin()]),
            )
        })
        .collect();
    let mut network = Trainer::new(stacked(4))
        .logging(Logging::Silent)
        .stop_condition(StopCondition::Iterations(5))
        .train(&[sequence.clone()])
        .unwrap();

    let mut buffer = Vec::new();
    network.save_to_writer(&mut buffer).unwrap();
    let records: Vec<LayerRecord> = serde_json::from_slice(&buffer).unwrap();
    let kinds: Vec<&str> = records.iter().map(|r| r.kind.as_str()).collect();
    assert_eq!(kinds, vec!["lstm", "lstm", "feed-forward"]);

    let mut restored = NeuralNetwork::with_seed(99);
    restored.load_from_reader(buffer.as_slice()).unwrap();

    network.reset_state();
    for (input, _) in &sequence {
        assert_eq!(
            network.propagate(input).unwrap(),
            restored.propagate(input).unwrap()
        );
    }
}

#[test]
fn bad_model_leaves_network_untouched() {
    let mut network = stacked(5);
    let before = network.to_json().unwrap();
    assert!(network.load_json("[{\"inputs\": 1}]").is_err());
    assert!(matches!(
        network.load_json(
            "[{\"inputs\":1,\"outputs\":1,\"type\":\"gru\",\"data\":{}}]"
        ),
        Err(Error::UnknownLayerType(_))
    ));
    assert_eq!(network.to_json().unwrap(), before);
}
