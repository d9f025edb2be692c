use lw_graph::element::ElementType;
use lw_graph::function::Function;
use lw_graph::op::{ConvAttrs, PoolAttrs};
use lw_graph::shape;
use lw_graph::shape::Dimension;

use lw_legacy::network::Network;
use lw_legacy::status::StatusCode;
use lw_legacy::wrapper::GraphNetwork;

fn image_net(batch: usize) -> Function {
    let mut function = Function::new("image");
    let x = function.parameter("x", ElementType::F32, shape![batch, 3, 224, 224]);
    let w = function.constant_f32(&[8, 3, 3, 3], vec![0.1; 8 * 3 * 3 * 3]);
    let conv = function.convolution_ie(x, w, None, ConvAttrs::simple(2, 1, 1), 1);
    function.set_friendly_name(conv, "conv");
    let pool = function.max_pool(conv, PoolAttrs::simple(&[2, 2], 2, 0));
    function.set_friendly_name(pool, "pool");
    function.result(pool);
    function
}

#[test]
fn batch_through_legacy() {
    let mut network = GraphNetwork::new(image_net(1)).unwrap();
    assert_eq!(network.batch_size(), 1);

    network.set_batch_size(8).unwrap();
    assert!(network.is_legacy());
    assert!(network.function().is_none());
    assert_eq!(network.batch_size(), 8);

    assert_eq!(network.inputs_info()["x"].data.dims, vec![8, 3, 224, 224]);
    assert_eq!(network.outputs_info()["pool"].dims, vec![8, 8, 112, 112]);
    assert_eq!(network.find_data("conv").unwrap().dims, vec![8, 8, 224, 224]);
}

#[test]
fn same_batch_is_noop() {
    let mut network = GraphNetwork::new(image_net(1)).unwrap();
    network.set_batch_size(1).unwrap();
    assert!(!network.is_legacy());
    assert_eq!(network.inputs_info()["x"].data.dims, vec![1, 3, 224, 224]);
}

#[test]
fn batch_through_reshape() {
    let mut network = GraphNetwork::new(image_net(1)).unwrap();
    network.set_batch_size_reshape(8).unwrap();

    assert!(!network.is_legacy());
    let function = network.function().unwrap();
    let x = function.parameters()[0];
    assert_eq!(function[x].outputs()[0].shape, shape![8, 3, 224, 224]);

    assert_eq!(network.outputs_info()["pool"].dims, vec![8, 8, 112, 112]);
    let legacy = network.to_legacy().unwrap();
    assert_eq!(legacy.data("conv").unwrap().desc.dims, vec![8, 8, 224, 224]);
}

#[test]
fn dynamic_batch_falls_back_and_fails() {
    let mut function = Function::new("dynamic");
    let x = function.parameter("x", ElementType::F32, shape![Dimension::DYNAMIC, 16]);
    let y = function.relu(x);
    function.result(y);

    let mut network = GraphNetwork::new(function).unwrap();
    let e = network.set_batch_size_reshape(4).unwrap_err();
    assert_eq!(e.code, StatusCode::GeneralError);

    // the shapes are untouched
    let function = network.function().unwrap();
    let x = function.parameters()[0];
    assert_eq!(function[x].outputs()[0].shape, shape![Dimension::DYNAMIC, 16]);
}

#[test]
fn zero_batch_rejected() {
    let mut network = GraphNetwork::new(image_net(1)).unwrap();
    assert!(network.set_batch_size(0).is_err());
}
