use lw_graph::element::ElementType;
use lw_graph::function::Function;
use lw_graph::op::{ConvAttrs, PoolAttrs};
use lw_graph::shape;

use lw_legacy::convert::{convert_function_to_legacy, ConversionSettings};
use lw_legacy::error::ConvertError;
use lw_legacy::fusion::FusionPolicy;
use lw_legacy::lowering::global;
use lw_legacy::network::Network;
use lw_legacy::wrapper::GraphNetwork;

fn conv_net() -> Function {
    let mut function = Function::new("conv_net");
    let x = function.parameter("x", ElementType::F32, shape![1, 3, 8, 8]);
    let w = function.constant_f32(&[4, 3, 3, 3], vec![0.5; 4 * 3 * 3 * 3]);
    let b = function.constant_f32(&[4], vec![0.0; 4]);
    let conv = function.convolution_ie(x, w, Some(b.into()), ConvAttrs::simple(2, 1, 1), 1);
    function.set_friendly_name(conv, "conv");
    let relu = function.relu(conv);
    function.set_friendly_name(relu, "relu");
    let skip = function.add(relu, conv);
    function.set_friendly_name(skip, "skip");
    function.result(skip);
    function
}

fn convert(function: &Function) -> Result<lw_legacy::legacy::LegacyNetwork, ConvertError> {
    let network = GraphNetwork::new(function.clone())?;
    convert_function_to_legacy(function, &network, ConversionSettings::default(), global())
}

#[test]
fn slot_count_parity() {
    let function = conv_net();
    let legacy = convert(&function).unwrap();
    let policy = FusionPolicy::new(&function, false);

    let mut expected_layers = 0;
    for node in function.ops() {
        if policy.is_internal_node(node) {
            assert!(legacy.layer(function[node].friendly_name()).is_none());
            continue;
        }
        expected_layers += 1;

        let info = &function[node];
        let fused = info
            .inputs()
            .iter()
            .filter(|input| policy.is_skipped_edge(**input, node))
            .count();
        let layer = legacy.layer(info.friendly_name()).unwrap();
        assert_eq!(layer.ins.len(), info.inputs().len() - fused, "layer {}", layer);
    }
    assert_eq!(legacy.layer_count(), expected_layers);
    legacy.validate().unwrap();

    let conv = legacy.layer("conv").unwrap();
    assert_eq!(conv.layer_type, "Convolution");
    assert_eq!(conv.param("output"), Some("4"));
    assert_eq!(conv.param("kernel"), Some("3,3"));
    assert_eq!(conv.param("group"), Some("1"));
    assert!(conv.param("auto_pad").is_none());
    assert_eq!(conv.blobs.keys().collect::<Vec<_>>(), vec!["weights", "biases"]);

    let skip = legacy.layer("skip").unwrap();
    assert_eq!(skip.param("operation"), Some("sum"));
    assert_eq!(skip.ins, vec![Some("relu".to_owned()), Some("conv".to_owned())]);
}

#[test]
fn kept_constant_inputs_become_layers() {
    let function = conv_net();
    let network = GraphNetwork::new(function.clone()).unwrap();
    let settings = ConversionSettings {
        keep_constant_inputs: true,
        ..ConversionSettings::default()
    };
    let legacy = convert_function_to_legacy(&function, &network, settings, global()).unwrap();

    let conv = legacy.layer("conv").unwrap();
    assert_eq!(conv.ins.len(), 3);
    let consts = legacy.layers().filter(|l| l.layer_type == "Const").count();
    assert_eq!(consts, 2);
}

#[test]
fn conversion_is_repeatable() {
    let function = conv_net();
    let first = convert(&function).unwrap();
    let second = convert(&function).unwrap();
    assert_eq!(first.to_string(), second.to_string());

    let mut network = GraphNetwork::new(function).unwrap();
    let cached = network.to_legacy().unwrap().to_string();
    let mut copy = GraphNetwork::from_network(&network).unwrap();
    assert_eq!(copy.to_legacy().unwrap().to_string(), cached);
}

#[test]
fn explicit_pooling_params() {
    let mut function = Function::new("pool");
    let x = function.parameter("x", ElementType::F32, shape![1, 3, 8, 8]);
    let pool = function.avg_pool(x, PoolAttrs::simple(&[2, 2], 2, 0), true);
    function.set_friendly_name(pool, "pool");
    function.result(pool);

    let legacy = convert(&function).unwrap();
    let pool = legacy.layer("pool").unwrap();
    assert_eq!(pool.layer_type, "Pooling");
    assert!(!pool.params.contains_key("auto_pad"));
    assert!(!pool.params.contains_key("exclude_pad"));
    assert_eq!(pool.param("exclude-pad"), Some("true"));
    assert_eq!(pool.param("pool-method"), Some("avg"));
    assert_eq!(legacy.data("pool").unwrap().desc.dims, vec![1, 3, 4, 4]);
}

#[test]
fn memory_layers() {
    let mut function = Function::new("state");
    let x = function.parameter("x", ElementType::F32, shape![1, 4]);
    let init = function.constant_f32(&[1, 4], vec![0.0; 4]);
    let read = function.read_value(init, "state");
    function.set_friendly_name(read, "read");
    let sum = function.add(x, read);
    function.set_friendly_name(sum, "sum");
    let assign = function.assign(sum, "state");
    function.set_friendly_name(assign, "assign");
    function.result(sum);

    let legacy = convert(&function).unwrap();

    let read = legacy.layer("read").unwrap();
    assert_eq!(read.layer_type, "Memory");
    assert_eq!(read.param("index"), Some("1"));
    assert_eq!(read.param("id"), Some("state"));
    assert!(read.ins.is_empty());

    let assign = legacy.layer("assign").unwrap();
    assert_eq!(assign.layer_type, "Memory");
    assert_eq!(assign.param("index"), Some("0"));
    assert_eq!(assign.ins, vec![Some("sum".to_owned())]);
    assert!(assign.outs.is_empty());

    // the initializer only feeds the state read, so it has no data of its own
    let init = legacy.layers().find(|l| l.layer_type == "Const").unwrap();
    assert!(init.outs.is_empty());
}

#[test]
fn plain_convolution_rejected() {
    let mut function = Function::new("conv");
    let x = function.parameter("x", ElementType::F32, shape![1, 3, 8, 8]);
    let w = function.constant_f32(&[4, 3, 3, 3], vec![0.5; 4 * 3 * 3 * 3]);
    let conv = function.convolution(x, w, ConvAttrs::simple(2, 1, 1));
    function.set_friendly_name(conv, "conv");
    function.result(conv);

    let e = convert(&function).unwrap_err();
    assert_eq!(
        e,
        ConvertError::UnsupportedOperation {
            op_type: "Convolution".to_owned(),
            name: "conv".to_owned(),
            target: "ConvolutionIE".to_owned(),
        }
    );
    let message = e.to_string();
    assert!(message.contains("Convolution operation"));
    assert!(message.contains("ConvolutionIE"));
}

#[test]
fn one_hot_lowered_through_wrapper() {
    let mut function = Function::new("one_hot");
    let indices = function.parameter("indices", ElementType::I32, shape![1, 5]);
    let one_hot = function.one_hot(indices, 10, 1.0, 0.0, -1);
    function.set_friendly_name(one_hot, "one_hot");
    function.result(one_hot);

    let mut network = GraphNetwork::new(function).unwrap();
    assert_eq!(network.outputs_info()["one_hot"].dims, vec![1, 5, 10]);

    let legacy = network.to_legacy().unwrap();
    let layer = legacy.layer("one_hot").unwrap();
    assert_eq!(layer.layer_type, "OneHot");
    assert_eq!(layer.param("depth"), Some("10"));
    assert!(!layer.params.contains_key("type"));
    assert_eq!(layer.ins, vec![Some("indices".to_owned())]);
}
