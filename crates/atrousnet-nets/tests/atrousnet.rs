use approx::assert_abs_diff_eq;
use atrousnet_core::{Tensor, TensorError};
use atrousnet_io::{load_json, load_weights, save_weights, IoError, ModelWeights};
use atrousnet_nets::{
    atrousnet, atrousnet_arg_scope, AtrousNet, AtrousNetConfig, Prediction, END_POINT_NAMES,
};

fn config(num_classes: usize, seed: u64) -> AtrousNetConfig {
    AtrousNetConfig {
        num_classes,
        seed: Some(seed),
        ..AtrousNetConfig::default()
    }
}

fn images(batch: usize, channels: usize, seed: u64) -> Tensor {
    Tensor::rand(vec![batch, 32, 32, channels], Some(seed))
}

fn assert_close(a: &Tensor, b: &Tensor) {
    assert_eq!(a.shape(), b.shape());
    for (x, y) in a.data().iter().zip(b.data()) {
        assert_abs_diff_eq!(x, y, epsilon = 1e-12);
    }
}

#[test]
fn test_logits_shape_for_any_class_count() {
    for (batch, num_classes) in [(2, 5), (1, 1)] {
        let c = config(num_classes, 7);
        let (logits, end_points) = atrousnet(&images(batch, 3, 1), &c, &c.arg_scope()).unwrap();
        assert_eq!(logits.shape_vec(), vec![batch, num_classes]);
        assert_eq!(end_points.predictions.shape_vec(), vec![batch, num_classes]);
    }
}

#[test]
fn test_single_class_softmax_is_one() {
    let c = config(1, 3);
    let (_, end_points) = atrousnet(&images(1, 3, 2), &c, &c.arg_scope()).unwrap();
    assert_abs_diff_eq!(end_points.predictions.data()[0], 1.0, epsilon = 1e-12);
}

#[test]
fn test_end_points_names_and_shapes() {
    let c = config(10, 11);
    let (logits, end_points) = atrousnet(&images(1, 1, 4), &c, &c.arg_scope()).unwrap();

    let names: Vec<&str> = end_points.iter().map(|(n, _)| n).collect();
    assert_eq!(names, END_POINT_NAMES.to_vec());
    assert!(end_points.get("dropout1").is_none());

    assert_eq!(end_points.conv1.shape_vec(), vec![1, 30, 30, 64]);
    assert_eq!(end_points.conv2.shape_vec(), vec![1, 26, 26, 128]);
    assert_eq!(end_points.conv3.shape_vec(), vec![1, 18, 18, 192]);
    assert_eq!(end_points.conv4.shape_vec(), vec![1, 18, 18, 256]);
    assert_eq!(end_points.conv5.shape_vec(), vec![1, 18, 18, 10]);
    assert_eq!(end_points.get("Logits"), Some(&logits));

    let total: f64 = end_points.predictions.data().iter().sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
    // conv1 through conv4 end in ReLU.
    assert!(end_points.conv4.data().iter().all(|&v| v >= 0.0));
}

#[test]
fn test_dropout_is_identity_outside_training() {
    let x = images(1, 3, 5);
    let arg_scope = atrousnet_arg_scope(0.004);
    let keep_all = AtrousNet::new(3, &AtrousNetConfig { dropout_keep_prob: 1.0, ..config(4, 9) }, &arg_scope).unwrap();
    let keep_few = AtrousNet::new(3, &AtrousNetConfig { dropout_keep_prob: 0.1, ..config(4, 9) }, &arg_scope).unwrap();

    let (a, _) = keep_all.forward(&x).unwrap();
    let (b, _) = keep_few.forward(&x).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_training_applies_dropout() {
    let x = images(1, 3, 6);
    let mut net = AtrousNet::new(3, &config(4, 10), &atrousnet_arg_scope(0.004)).unwrap();
    let (eval_logits, _) = net.forward(&x).unwrap();

    net.set_training(true);
    assert!(net.is_training());
    let (train_logits, end_points) = net.forward(&x).unwrap();
    assert_ne!(eval_logits, train_logits);
    // Dropout happens after conv4, so conv4 itself is unaffected.
    net.set_training(false);
    let (_, eval_end_points) = net.forward(&x).unwrap();
    assert_eq!(end_points.conv4, eval_end_points.conv4);
}

#[test]
fn test_prediction_function_only_changes_predictions() {
    let x = images(2, 3, 7);
    let mut net = AtrousNet::new(3, &config(6, 12), &atrousnet_arg_scope(0.004)).unwrap();
    let (softmax_logits, softmax) = net.forward(&x).unwrap();

    net.set_prediction(Prediction::Identity);
    let (identity_logits, identity) = net.forward(&x).unwrap();

    assert_eq!(softmax_logits, identity_logits);
    assert_eq!(softmax.conv5, identity.conv5);
    assert_eq!(identity.predictions, identity.logits);
    assert_ne!(softmax.predictions, identity.predictions);

    net.set_prediction(Prediction::Sigmoid);
    let (_, sigmoid) = net.forward(&x).unwrap();
    assert_close(&sigmoid.predictions, &softmax_logits.sigmoid());
}

#[test]
fn test_forward_is_deterministic() {
    let x = images(2, 3, 8);
    let net = AtrousNet::new(3, &config(8, 13), &atrousnet_arg_scope(0.004)).unwrap();
    let (a, _) = net.forward(&x).unwrap();
    let (b, _) = net.forward(&x).unwrap();
    assert_eq!(a.data(), b.data());

    let twin = AtrousNet::new(3, &config(8, 13), &atrousnet_arg_scope(0.004)).unwrap();
    assert_eq!(twin.forward(&x).unwrap().0, a);
}

#[test]
fn test_batch_rows_are_independent() {
    let x = images(2, 3, 14);
    let net = AtrousNet::new(3, &config(3, 15), &atrousnet_arg_scope(0.004)).unwrap();
    let (both, _) = net.forward(&x).unwrap();

    let half = 32 * 32 * 3;
    let second = Tensor::new(x.data()[half..].to_vec(), vec![1, 32, 32, 3]).unwrap();
    let (alone, _) = net.forward(&second).unwrap();
    assert_eq!(&both.data()[3..], alone.data());
}

#[test]
fn test_checkpoint_reload_reproduces_logits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("atrousnet.json");
    let x = images(1, 3, 16);
    let arg_scope = atrousnet_arg_scope(0.004);

    let trained = AtrousNet::new(3, &config(5, 17), &arg_scope).unwrap();
    save_weights(&trained.to_weights(), &path).unwrap();

    let mut fresh = AtrousNet::new(3, &config(5, 18), &arg_scope).unwrap();
    assert_ne!(fresh.forward(&x).unwrap().0, trained.forward(&x).unwrap().0);

    fresh.load_weights(&load_weights(&path).unwrap()).unwrap();
    assert_close(&fresh.forward(&x).unwrap().0, &trained.forward(&x).unwrap().0);
}

#[test]
fn test_load_weights_rejects_incomplete_or_mismatched() {
    let arg_scope = atrousnet_arg_scope(0.004);
    let mut net = AtrousNet::new(3, &config(5, 19), &arg_scope).unwrap();
    let before = net.to_weights();

    assert!(matches!(
        net.load_weights(&ModelWeights::new()),
        Err(IoError::MissingParameter(name)) if name == "CifarNet/conv1/weights"
    ));

    let other = AtrousNet::new(3, &config(7, 20), &arg_scope).unwrap();
    assert!(matches!(
        net.load_weights(&other.to_weights()),
        Err(IoError::Tensor(TensorError::ShapeMismatch { .. }))
    ));
    assert_eq!(net.to_weights(), before);
}

#[test]
fn test_weight_decay_never_regularizes_convs() {
    for wd in [0.0, 0.004, 0.5] {
        let c = AtrousNetConfig { weight_decay: wd, ..config(4, 21) };
        let net = AtrousNet::new(3, &c, &c.arg_scope()).unwrap();
        assert!(net.regularization_losses().is_empty());
        assert!(c.arg_scope().conv.weights_regularizer.is_none());
    }
}

#[test]
fn test_spatial_size_must_pool_to_one() {
    let c = config(4, 22);
    let arg_scope = c.arg_scope();
    // 40 -> 38 -> 34 -> 26, pooled to 5x5.
    let too_big = Tensor::rand(vec![1, 40, 40, 3], Some(0));
    assert!(matches!(
        atrousnet(&too_big, &c, &arg_scope),
        Err(TensorError::InvalidOperation(_))
    ));
    // 20 -> 18 -> 14 -> 6, smaller than the pooling window.
    let too_small = Tensor::rand(vec![1, 20, 20, 3], Some(0));
    assert!(atrousnet(&too_small, &c, &arg_scope).is_err());
    // 8 -> 6 -> 2, smaller than conv3's 9x9 effective kernel.
    let tiny = Tensor::rand(vec![1, 8, 8, 3], Some(0));
    assert!(atrousnet(&tiny, &c, &arg_scope).is_err());
}

#[test]
fn test_rejects_non_image_input() {
    let c = config(4, 23);
    let flat = Tensor::rand(vec![2, 32 * 32 * 3], Some(0));
    assert!(atrousnet(&flat, &c, &c.arg_scope()).is_err());

    let net = AtrousNet::new(3, &c, &c.arg_scope()).unwrap();
    assert!(matches!(
        net.forward(&images(1, 1, 0)),
        Err(TensorError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_largest_accepted_input() {
    let c = config(4, 24);
    let arg_scope = c.arg_scope();
    // 33 -> 31 -> 27 -> 19, one 18x18 pooling window.
    let widest = Tensor::rand(vec![1, 33, 33, 3], Some(0));
    let (logits, _) = atrousnet(&widest, &c, &arg_scope).unwrap();
    assert_eq!(logits.shape_vec(), vec![1, 4]);

    // 34 -> 32 -> 28 -> 20, two windows per axis.
    let too_wide = Tensor::rand(vec![1, 34, 34, 3], Some(0));
    assert!(matches!(
        atrousnet(&too_wide, &c, &arg_scope),
        Err(TensorError::InvalidOperation(_))
    ));
}

#[test]
fn test_malformed_image_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("images.json");
    std::fs::write(&path, r#"{"data":[0.5,0.5,0.5],"shape":{"dims":[1,32,32,3]}}"#).unwrap();
    assert!(load_json::<Tensor>(&path).is_err());
}
