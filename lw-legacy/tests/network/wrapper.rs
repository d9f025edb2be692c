use std::sync::Arc;

use lw_graph::attribute::{rt_keys, RtValue};
use lw_graph::element::ElementType;
use lw_graph::error::GraphResult;
use lw_graph::function::Function;
use lw_graph::op::{Op, UnaryOp};
use lw_graph::passes::GraphRewrite;
use lw_graph::shape;

use lw_legacy::data::{ColorFormat, PreProcessInfo};
use lw_legacy::error::ConvertError;
use lw_legacy::lowering::LoweringRegistry;
use lw_legacy::network::{InputShapes, Network};
use lw_legacy::precision::Precision;
use lw_legacy::serialize::TextSerializer;
use lw_legacy::wrapper::GraphNetwork;

fn tanh_net() -> Function {
    let mut function = Function::new("tanh_net");
    let x = function.parameter("x", ElementType::F32, shape![2, 16]);
    let y = function.unary(UnaryOp::Tanh, x);
    function.set_friendly_name(y, "y");
    function.result(y);
    function
}

#[test]
fn empty_reshape_keeps_outputs() {
    let mut network = GraphNetwork::new(tanh_net()).unwrap();
    network.set_output_precision("y", Precision::Fp16).unwrap();
    let before = network.outputs_info();

    network.reshape(&InputShapes::new()).unwrap();
    assert_eq!(network.outputs_info(), before);
    assert_eq!(network.outputs_info()["y"].precision, Precision::Fp16);
}

#[test]
fn duplicate_parameter_names_rejected() {
    let mut function = Function::new("dup");
    let a = function.parameter("x", ElementType::F32, shape![1, 4]);
    let b = function.parameter("x", ElementType::F32, shape![1, 4]);
    let sum = function.add(a, b);
    function.result(sum);

    let e = GraphNetwork::new(function).unwrap_err();
    assert_eq!(e, ConvertError::DuplicateFriendlyName("x".to_owned()));
    assert!(e.to_string().contains("unique friendly names"));
}

#[test]
fn input_infos_carried_into_legacy() {
    let mut network = GraphNetwork::new(tanh_net()).unwrap();
    network.set_input_precision("x", Precision::U8).unwrap();
    let pre_process = PreProcessInfo {
        color_format: ColorFormat::Bgr,
        ..PreProcessInfo::default()
    };
    network.set_pre_process("x", pre_process.clone()).unwrap();
    assert!(network.set_input_precision("missing", Precision::U8).is_err());

    let legacy = network.to_legacy().unwrap();
    let info = &legacy.inputs_info()["x"];
    assert_eq!(info.data.precision, Precision::U8);
    assert_eq!(info.pre_process, pre_process);
    assert_eq!(legacy.layer("y").unwrap().layer_type, "TanH");
}

#[test]
fn cache_dropped_on_mutation() {
    let mut network = GraphNetwork::new(tanh_net()).unwrap();
    assert_eq!(network.to_legacy().unwrap().data("y").unwrap().desc.dims, vec![2, 16]);

    let mut shapes = InputShapes::new();
    shapes.insert("x".to_owned(), shape![5, 16]);
    network.reshape(&shapes).unwrap();
    assert_eq!(network.to_legacy().unwrap().data("y").unwrap().desc.dims, vec![5, 16]);
}

/// Replaces `Tanh` by `Sigmoid`.
#[derive(Debug)]
struct TanhToSigmoid;

impl GraphRewrite for TanhToSigmoid {
    fn name(&self) -> &'static str {
        "TanhToSigmoid"
    }

    fn run_on_function(&self, function: &mut Function) -> GraphResult<bool> {
        let mut changed = false;
        for node in function.ops() {
            if let Op::Unary { op: UnaryOp::Tanh } = function[node].op() {
                let input = function[node].inputs()[0];
                let name = function[node].friendly_name().to_owned();
                let sigmoid = function.unary(UnaryOp::Sigmoid, input);
                function.set_friendly_name(sigmoid, name);
                function.replace_output_uses(node.into(), sigmoid.into());
                changed = true;
            }
        }
        Ok(changed)
    }
}

#[test]
fn failed_reshape_drops_cached_legacy() {
    let mut function = Function::new("sum");
    let x = function.parameter("x", ElementType::F32, shape![1, 4]);
    let y = function.parameter("y", ElementType::F32, shape![1, 4]);
    let sum = function.add(x, y);
    function.set_friendly_name(sum, "sum");
    function.result(sum);

    let mut network = GraphNetwork::new(function).unwrap();
    assert_eq!(network.to_legacy().unwrap().data("x").unwrap().desc.dims, vec![1, 4]);

    let mut shapes = InputShapes::new();
    shapes.insert("x".to_owned(), shape![1, 5]);
    assert!(network.reshape(&shapes).is_err());

    let function = network.function().unwrap();
    assert_eq!(function[function.parameters()[0]].outputs()[0].shape, shape![1, 5]);
    assert_eq!(network.inputs_info()["x"].data.dims, vec![1, 4]);

    // rebuilt from the mismatched function
    assert!(network.to_legacy().is_err());
}

#[test]
fn upstream_pass_runs_before_lowering() {
    let mut network = GraphNetwork::new(tanh_net()).unwrap();
    network.add_upstream_pass(Arc::new(TanhToSigmoid));

    let legacy = network.to_legacy().unwrap();
    assert_eq!(legacy.layer("y").unwrap().layer_type, "Sigmoid");

    // the wrapped function itself is not rewritten
    let function = network.function().unwrap();
    assert!(function.has_op("Tanh"));
}

#[test]
fn custom_registry() {
    let mut registry = LoweringRegistry::new();
    registry.register(&["Tanh"], |ctx, _| {
        let mut layer = ctx.layer("Activation")?;
        layer.set_param("type", "tanh");
        Ok(layer)
    });
    registry.add_default_rules();

    let mut network = GraphNetwork::new(tanh_net()).unwrap();
    network.set_registry(Arc::new(registry));
    let layer = network.to_legacy().unwrap().layer("y").unwrap().clone();
    assert_eq!(layer.layer_type, "Activation");
    assert_eq!(layer.param("type"), Some("tanh"));
}

#[test]
fn serialize_execution_graph() {
    let mut function = tanh_net();
    for node in function.ops() {
        function
            .rt_info_mut(node)
            .insert(rt_keys::EXEC_TIME_MCS.to_owned(), RtValue::String("12".to_owned()));
    }

    let mut network = GraphNetwork::new(function).unwrap();
    let mut serializer = TextSerializer::new();
    network.serialize(&mut serializer).unwrap();
    assert!(serializer.output.starts_with("ExecutionGraph"));
    assert!(serializer.output.contains("12mcs"));
}

#[test]
fn serialize_legacy() {
    let mut network = GraphNetwork::new(tanh_net()).unwrap();
    let mut serializer = TextSerializer::new();
    network.serialize(&mut serializer).unwrap();
    assert!(serializer.output.starts_with("LegacyNetwork \"tanh_net\""));
    assert!(serializer.output.contains("TanH \"y\""));
}

#[test]
fn layer_count_is_op_count() {
    let network = GraphNetwork::new(tanh_net()).unwrap();
    assert_eq!(network.layer_count(), 3);
}
