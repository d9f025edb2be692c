use itertools::Itertools;

use lw_graph::op::{EltwiseType, Op, PadType};
use lw_graph::shape::{normalize_axis, PartialShape};

use crate::error::{ConvertError, ConvertResult};
use crate::layer::{Blob, Layer, Params};
use crate::lowering::{LoweringContext, LoweringRegistry};
use crate::params::{format_bool, format_float};
use crate::precision::Precision;

/// Ops that must be rewritten by an upstream pass, with the op they should become.
const REQUIRED_REWRITES: &[(&str, &str)] = &[
    ("Broadcast", "Tile"),
    ("Interpolate", "Interp"),
    ("NormalizeL2", "NormalizeIE"),
    ("GroupConvolution", "ConvolutionIE"),
    ("ConvolutionBackpropData", "DeconvolutionIE"),
    ("GroupConvolutionBackpropData", "DeconvolutionIE"),
];

/// Ops that must be rewritten into their `IE` counterpart first.
const REQUIRED_IE_FORMS: &[&str] = &[
    "Convolution",
    "Gather",
    "GatherTree",
    "GRUCell",
    "GRUSequence",
    "HardSigmoid",
    "LRN",
    "LSTMCell",
    "LSTMSequence",
    "NonMaxSuppression",
    "RNNCell",
    "RNNSequence",
    "OneHot",
    "Pad",
    "PriorBoxClustered",
    "PriorBox",
    "Proposal",
    "Selu",
    "Swish",
    "Tile",
    "TopK",
];

const ELTWISE_TYPES: &[&str] = &[
    "Eltwise",
    "Add",
    "Subtract",
    "Multiply",
    "Divide",
    "Maximum",
    "Minimum",
    "Power",
    "SquaredDifference",
    "FloorMod",
    "Equal",
    "NotEqual",
    "Less",
    "LessEqual",
    "Greater",
    "GreaterEqual",
    "GreaterEq",
    "LogicalAnd",
    "LogicalOr",
    "LogicalXor",
];

const REDUCE_TYPES: &[&str] = &[
    "ReduceMin",
    "ReduceMax",
    "ReduceMean",
    "ReduceProd",
    "ReduceSum",
    "ReduceL1",
    "ReduceL2",
];

/// The `operation` parameter of an eltwise layer, for the opset type names.
fn eltwise_operation(type_name: &str) -> Option<&'static str> {
    let operation = match type_name {
        "Add" => "sum",
        "Subtract" => "sub",
        "Multiply" => "prod",
        "Divide" => "div",
        "Maximum" => "max",
        "Minimum" => "min",
        "Power" => "pow",
        "SquaredDifference" => "squared_diff",
        "FloorMod" => "floor_mod",
        "Equal" => "equal",
        "NotEqual" => "not_equal",
        "Less" => "less",
        "LessEqual" => "less_equal",
        "Greater" => "greater",
        "GreaterEqual" | "GreaterEq" => "greater_equal",
        "LogicalAnd" => "logical_and",
        "LogicalOr" => "logical_or",
        "LogicalXor" => "logical_xor",
        _ => return None,
    };
    Some(operation)
}

fn with_params(ctx: &LoweringContext, layer_type: &str, params: Params) -> ConvertResult<Layer> {
    let mut layer = ctx.layer(layer_type)?;
    layer.params = params;
    Ok(layer)
}

/// Drop `auto_pad` if it is the explicit default.
fn drop_explicit_auto_pad(layer: &mut Layer) {
    if layer.param("auto_pad").map_or(false, |p| p.eq_ignore_ascii_case("explicit")) {
        layer.params.remove("auto_pad");
    }
}

/// Set `kernel` and `output` from the shape of the weights, `[O, I, kernel..]`.
fn kernel_from_weights(ctx: &LoweringContext, layer: &mut Layer) -> ConvertResult<Vec<usize>> {
    let weights = ctx.static_weights_shape(1)?;
    if weights.len() < 2 {
        return Err(ConvertError::DynamicWeights {
            layer: ctx.name().to_owned(),
            layer_type: ctx.type_name().to_owned(),
            shape: PartialShape::fixed(&weights),
        });
    }
    layer.set_param("output", weights[0].to_string());
    layer.set_param("kernel", weights[2..].iter().join(","));
    Ok(weights)
}

pub(super) fn register_default_rules(registry: &mut LoweringRegistry) {
    register_structural(registry);
    register_required_rewrites(registry);
    register_eltwise_and_pooling(registry);
    register_convolutions(registry);
    register_state_and_cells(registry);
    register_reductions(registry);
    register_simple(registry);
}

fn register_structural(registry: &mut LoweringRegistry) {
    registry.register(&["Parameter"], |ctx, _| ctx.layer("Input"));

    registry.register(&["Constant"], |ctx, _| {
        let mut layer = ctx.layer("Const")?;
        if let Op::Constant { element_type, data } = ctx.info().op() {
            let precision = Precision::from_element_type(*element_type)
                .ok_or(ConvertError::UnsupportedPrecision(*element_type))?;
            layer.blobs.insert(
                "custom".to_owned(),
                Blob {
                    precision,
                    data: data.clone(),
                },
            );
        }
        Ok(layer)
    });
}

fn register_required_rewrites(registry: &mut LoweringRegistry) {
    for &(type_name, target) in REQUIRED_REWRITES {
        registry.register(&[type_name], move |ctx, _| Err(ctx.unsupported(type_name, target)));
    }

    registry.register(REQUIRED_IE_FORMS, |ctx, _| {
        let type_name = ctx.type_name();
        Err(ctx.unsupported(type_name, &format!("{}IE", type_name)))
    });
}

fn register_eltwise_and_pooling(registry: &mut LoweringRegistry) {
    registry.register(ELTWISE_TYPES, |ctx, params| {
        let mut layer = with_params(ctx, "Eltwise", params)?;

        let operation = match ctx.info().op() {
            Op::Eltwise { kind } => match kind {
                EltwiseType::Sum => "sum",
                EltwiseType::Prod => "prod",
                _ => {
                    return Err(ConvertError::UnsupportedEltwise {
                        name: ctx.name().to_owned(),
                        kind: kind.name().to_owned(),
                    })
                }
            },
            _ => eltwise_operation(ctx.type_name()).ok_or_else(|| ctx.cast_failed("Eltwise"))?,
        };
        layer.set_param("operation", operation);
        Ok(layer)
    });

    registry.register(&["Concat"], |ctx, params| with_params(ctx, "Concat", params));

    registry.register(&["AvgPool", "MaxPool"], |ctx, params| {
        let mut layer = with_params(ctx, "Pooling", params)?;
        drop_explicit_auto_pad(&mut layer);
        layer.rename_param("exclude_pad", "exclude-pad");

        let method = match ctx.type_name() {
            "MaxPool" => "max",
            _ => "avg",
        };
        layer.set_param("pool-method", method);
        Ok(layer)
    });
}

fn register_convolutions(registry: &mut LoweringRegistry) {
    registry.register(&["ConvolutionIE"], |ctx, params| {
        let group = match ctx.info().op() {
            Op::ConvolutionIE { group, .. } => *group,
            _ => return Err(ctx.cast_failed("ConvolutionIE")),
        };

        let mut layer = with_params(ctx, "Convolution", params)?;
        drop_explicit_auto_pad(&mut layer);
        kernel_from_weights(ctx, &mut layer)?;
        layer.set_param("group", group.to_string());

        ctx.attach_blobs(&mut layer, &[("weights", 1), ("biases", 2)])?;
        Ok(layer)
    });

    // typed attributes only, the generic parameters are not used here
    registry.register(&["BinaryConvolution"], |ctx, _| {
        let (conv, mode, pad_value) = match ctx.info().op() {
            Op::BinaryConvolution { conv, mode, pad_value } => (conv, mode, pad_value),
            _ => return Err(ctx.cast_failed("BinaryConvolution")),
        };

        let mut layer = ctx.layer("BinaryConvolution")?;
        layer.set_param("pads_begin", conv.pads_begin.iter().join(","));
        layer.set_param("pads_end", conv.pads_end.iter().join(","));
        match conv.auto_pad {
            PadType::Explicit => {}
            auto_pad => layer.set_param("auto_pad", auto_pad.name()),
        }
        layer.set_param("strides", conv.strides.iter().join(","));
        layer.set_param("dilations", conv.dilations.iter().join(","));

        let weights = kernel_from_weights(ctx, &mut layer)?;
        layer.set_param("mode", mode.name());
        layer.set_param("input", weights[1].to_string());
        layer.set_param("pad_value", format_float(*pad_value as f64));

        ctx.attach_blobs(&mut layer, &[("weights", 1)])?;
        Ok(layer)
    });

    registry.register(&["FullyConnected"], |ctx, params| {
        let mut layer = with_params(ctx, "FullyConnected", params)?;
        ctx.attach_blobs(&mut layer, &[("weights", 1), ("biases", 2)])?;
        Ok(layer)
    });

    registry.register(&["ScaleShiftIE"], |ctx, params| {
        let mut layer = with_params(ctx, "ScaleShift", params)?;
        ctx.attach_blobs(&mut layer, &[("weights", 1), ("biases", 2)])?;
        Ok(layer)
    });

    registry.register(&["PRelu"], |ctx, params| {
        let mut layer = with_params(ctx, "PReLU", params)?;
        if let Some(slope) = ctx.constant_input(1) {
            let shared = slope.len() == 1;
            layer.set_param("channel_shared", format_bool(shared));
        }
        ctx.attach_blobs(&mut layer, &[("weights", 1)])?;
        Ok(layer)
    });
}

fn register_state_and_cells(registry: &mut LoweringRegistry) {
    fn memory(ctx: &LoweringContext, params: Params, index: &str) -> ConvertResult<Layer> {
        let id = params.get("variable_id").ok_or_else(|| ConvertError::MissingParam {
            layer: ctx.name().to_owned(),
            layer_type: ctx.type_name().to_owned(),
            key: "variable_id".to_owned(),
        })?;

        let mut layer = ctx.layer("Memory")?;
        layer.set_param("id", id.clone());
        layer.set_param("index", index);
        layer.set_param("size", "2");
        Ok(layer)
    }

    registry.register(&["Assign"], |ctx, params| memory(ctx, params, "0"));
    registry.register(&["ReadValue"], |ctx, params| memory(ctx, params, "1"));

    registry.register(&["LSTMCellIE"], |ctx, params| {
        let mut layer = with_params(ctx, "LSTMCell", params)?;
        ctx.attach_blobs(&mut layer, &[("weights", 3), ("biases", 4)])?;
        Ok(layer)
    });
    registry.register(&["RNNCellIE"], |ctx, params| {
        let mut layer = with_params(ctx, "RNNCell", params)?;
        ctx.attach_blobs(&mut layer, &[("weights", 2), ("biases", 3)])?;
        Ok(layer)
    });
    registry.register(&["GRUCellIE"], |ctx, params| {
        let mut layer = with_params(ctx, "GRUCell", params)?;
        ctx.attach_blobs(&mut layer, &[("weights", 2), ("biases", 3)])?;
        Ok(layer)
    });
}

fn register_reductions(registry: &mut LoweringRegistry) {
    fn reduce(ctx: &LoweringContext, params: Params, layer_type: &str) -> ConvertResult<Layer> {
        let keep_dims = match ctx.info().op() {
            Op::Reduce { keep_dims, .. } => *keep_dims,
            _ => return Err(ctx.cast_failed("reduction")),
        };
        let mut layer = with_params(ctx, layer_type, params)?;
        layer.set_param("keep_dims", if keep_dims { "True" } else { "False" });
        Ok(layer)
    }

    registry.register(REDUCE_TYPES, |ctx, params| reduce(ctx, params, ctx.type_name()));
    registry.register(&["ReduceLogicalAnd"], |ctx, params| reduce(ctx, params, "ReduceAnd"));
    registry.register(&["ReduceLogicalOr"], |ctx, params| reduce(ctx, params, "ReduceOr"));
}

fn register_simple(registry: &mut LoweringRegistry) {
    let renames: &[(&str, &str)] = &[
        ("Relu", "ReLU"),
        ("Tanh", "TanH"),
        ("Elu", "elu"),
        ("Softmax", "SoftMax"),
        ("SwishIE", "Swish"),
        ("NonMaxSuppressionIE", "NonMaxSuppression"),
        ("StaticShapeTopK", "TopK"),
        ("Clamp", "Clamp"),
        ("FakeQuantize", "FakeQuantize"),
    ];
    for &(type_name, layer_type) in renames {
        registry.register(&[type_name], move |ctx, params| with_params(ctx, layer_type, params));
    }

    registry.register(&["Reshape"], |ctx, mut params| {
        let shape = ctx.info().outputs()[0].shape.to_shape().ok_or_else(|| ConvertError::DynamicOutput {
            op_type: ctx.type_name().to_owned(),
            name: ctx.name().to_owned(),
            layer_type: "Reshape".to_owned(),
            index: 0,
            shape: ctx.info().outputs()[0].shape.clone(),
        })?;
        params.insert("dim".to_owned(), shape.iter().join(","));
        with_params(ctx, "Reshape", params)
    });

    registry.register(&["Transpose"], |ctx, params| {
        let mut layer = with_params(ctx, "Permute", params)?;
        if let Some(order) = ctx.constant_input(1).and_then(|c| c.as_ints()) {
            layer.set_param("order", order.iter().join(","));
        }
        Ok(layer)
    });

    registry.register(&["Split"], |ctx, params| {
        let axis = ctx.constant_ints(1)?;
        let rank = ctx.input_shape(0).and_then(|s| s.rank());
        let axis = match (axis.as_slice(), rank) {
            (&[axis], Some(rank)) => normalize_axis(axis, rank).map(|a| a as i64),
            (&[axis], None) => Some(axis),
            _ => None,
        }
        .ok_or_else(|| ctx.cast_failed("Split axis"))?;

        let mut layer = with_params(ctx, "Split", params)?;
        layer.set_param("axis", axis.to_string());
        Ok(layer)
    });

    registry.register(&["OneHotIE"], |ctx, mut params| {
        params.remove("type");
        with_params(ctx, "OneHot", params)
    });

    registry.register(&["Convert"], |ctx, mut params| {
        if let Some(precision) = params.remove("destination_type") {
            params.insert("precision".to_owned(), precision);
        }
        with_params(ctx, "Convert", params)
    });
}
