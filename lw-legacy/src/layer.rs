use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use itertools::Itertools;

use lw_graph::op::ConstantData;

use crate::error::{ConvertError, ConvertResult};
use crate::precision::Precision;

/// Flat string parameters of a legacy layer.
pub type Params = BTreeMap<String, String>;

/// Constant weights embedded into a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub precision: Precision,
    pub data: ConstantData,
}

/// A single entry of a legacy layer list.
///
/// Input and output slots hold data names, resolved through the owning
/// [LegacyNetwork](crate::legacy::LegacyNetwork). Input slots start out unbound and are
/// filled in once all layers exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub layer_type: String,
    pub precision: Precision,
    pub ins: Vec<Option<String>>,
    pub outs: Vec<String>,
    pub params: Params,
    pub blobs: IndexMap<String, Blob>,
    pub affinity: String,
}

#[derive(Debug, Copy, Clone)]
enum ParamKind {
    UInt,
    Int,
    Float,
    Bool,
    UInts,
    Ints,
    Floats,
    OneOf(&'static [&'static str]),
    Text,
}

#[derive(Debug, Copy, Clone)]
struct ParamSpec {
    key: &'static str,
    kind: ParamKind,
    required: bool,
}

const fn req(key: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        key,
        kind,
        required: true,
    }
}

const fn opt(key: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        key,
        kind,
        required: false,
    }
}

const AUTO_PAD: ParamKind = ParamKind::OneOf(&["explicit", "same_upper", "same_lower", "valid", "notset"]);

const ELTWISE_OPERATIONS: &[&str] = &[
    "sum",
    "sub",
    "prod",
    "div",
    "max",
    "min",
    "pow",
    "squared_diff",
    "floor_mod",
    "equal",
    "not_equal",
    "less",
    "less_equal",
    "greater",
    "greater_equal",
    "logical_and",
    "logical_or",
    "logical_xor",
];

const POOLING: &[ParamSpec] = &[
    req("pool-method", ParamKind::OneOf(&["max", "avg"])),
    req("kernel", ParamKind::UInts),
    req("strides", ParamKind::UInts),
    opt("pads_begin", ParamKind::UInts),
    opt("pads_end", ParamKind::UInts),
    opt("rounding_type", ParamKind::OneOf(&["floor", "ceil"])),
    opt("exclude-pad", ParamKind::Bool),
    opt("auto_pad", AUTO_PAD),
];

const CONVOLUTION: &[ParamSpec] = &[
    req("kernel", ParamKind::UInts),
    req("output", ParamKind::UInt),
    req("group", ParamKind::UInt),
    req("strides", ParamKind::UInts),
    opt("dilations", ParamKind::UInts),
    opt("pads_begin", ParamKind::Ints),
    opt("pads_end", ParamKind::Ints),
    opt("auto_pad", AUTO_PAD),
];

const BINARY_CONVOLUTION: &[ParamSpec] = &[
    req("kernel", ParamKind::UInts),
    req("output", ParamKind::UInt),
    req("input", ParamKind::UInt),
    req("strides", ParamKind::UInts),
    req("dilations", ParamKind::UInts),
    req("pads_begin", ParamKind::Ints),
    req("pads_end", ParamKind::Ints),
    req("mode", ParamKind::OneOf(&["xnor-popcount"])),
    req("pad_value", ParamKind::Float),
    opt("auto_pad", AUTO_PAD),
];

const MEMORY: &[ParamSpec] = &[
    req("id", ParamKind::Text),
    req("index", ParamKind::OneOf(&["0", "1"])),
    req("size", ParamKind::UInt),
];

const REDUCE: &[ParamSpec] = &[req("keep_dims", ParamKind::Bool)];

const CELL: &[ParamSpec] = &[
    req("hidden_size", ParamKind::UInt),
    opt("clip", ParamKind::Float),
    opt("activations", ParamKind::Text),
    opt("activations_alpha", ParamKind::Floats),
    opt("activations_beta", ParamKind::Floats),
    opt("linear_before_reset", ParamKind::Bool),
];

const ONE_HOT: &[ParamSpec] = &[
    req("axis", ParamKind::Int),
    req("depth", ParamKind::UInt),
    req("on_value", ParamKind::Float),
    req("off_value", ParamKind::Float),
];

const ELTWISE: &[ParamSpec] = &[req("operation", ParamKind::OneOf(ELTWISE_OPERATIONS))];
const AXIS: &[ParamSpec] = &[req("axis", ParamKind::Int)];
const PERMUTE: &[ParamSpec] = &[req("order", ParamKind::Ints)];
const FULLY_CONNECTED: &[ParamSpec] = &[req("out-size", ParamKind::UInt)];
const ELU: &[ParamSpec] = &[req("alpha", ParamKind::Float)];
const CLAMP: &[ParamSpec] = &[req("min", ParamKind::Float), req("max", ParamKind::Float)];
const PRELU: &[ParamSpec] = &[opt("channel_shared", ParamKind::Bool)];
const RESHAPE: &[ParamSpec] = &[req("dim", ParamKind::Ints)];
const FAKE_QUANTIZE: &[ParamSpec] = &[req("levels", ParamKind::UInt)];
const CONVERT: &[ParamSpec] = &[req("precision", ParamKind::Text)];

fn schema(layer_type: &str) -> &'static [ParamSpec] {
    match layer_type {
        "Pooling" => POOLING,
        "Convolution" => CONVOLUTION,
        "BinaryConvolution" => BINARY_CONVOLUTION,
        "Eltwise" => ELTWISE,
        "Memory" => MEMORY,
        "ReduceMin" | "ReduceMax" | "ReduceMean" | "ReduceProd" | "ReduceSum" | "ReduceL1" | "ReduceL2"
        | "ReduceAnd" | "ReduceOr" => REDUCE,
        "LSTMCell" | "RNNCell" | "GRUCell" => CELL,
        "OneHot" => ONE_HOT,
        "Concat" | "SoftMax" | "Split" => AXIS,
        "Permute" => PERMUTE,
        "FullyConnected" => FULLY_CONNECTED,
        "elu" => ELU,
        "Clamp" => CLAMP,
        "PReLU" => PRELU,
        "Reshape" => RESHAPE,
        "FakeQuantize" => FAKE_QUANTIZE,
        "Convert" => CONVERT,
        _ => &[],
    }
}

fn list_ok<T: std::str::FromStr>(value: &str) -> bool {
    value.is_empty() || value.split(',').all(|s| s.trim().parse::<T>().is_ok())
}

impl ParamKind {
    fn expected(self) -> &'static str {
        match self {
            ParamKind::UInt => "an unsigned integer",
            ParamKind::Int => "an integer",
            ParamKind::Float => "a number",
            ParamKind::Bool => "a boolean",
            ParamKind::UInts => "a list of unsigned integers",
            ParamKind::Ints => "a list of integers",
            ParamKind::Floats => "a list of numbers",
            ParamKind::OneOf(_) => "one of the supported values",
            ParamKind::Text => "text",
        }
    }

    fn accepts(self, value: &str) -> bool {
        match self {
            ParamKind::UInt => value.parse::<u64>().is_ok(),
            ParamKind::Int => value.parse::<i64>().is_ok(),
            ParamKind::Float => value.parse::<f64>().is_ok(),
            ParamKind::Bool => value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false"),
            ParamKind::UInts => list_ok::<u64>(value),
            ParamKind::Ints => list_ok::<i64>(value),
            ParamKind::Floats => list_ok::<f64>(value),
            ParamKind::OneOf(options) => options.iter().any(|o| o.eq_ignore_ascii_case(value)),
            ParamKind::Text => true,
        }
    }
}

impl Layer {
    pub fn new(name: impl Into<String>, layer_type: impl Into<String>, precision: Precision) -> Self {
        Layer {
            name: name.into(),
            layer_type: layer_type.into(),
            precision,
            ins: vec![],
            outs: vec![],
            params: Params::new(),
            blobs: IndexMap::new(),
            affinity: String::new(),
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn set_param(&mut self, key: &str, value: impl Into<String>) {
        self.params.insert(key.to_owned(), value.into());
    }

    pub fn rename_param(&mut self, from: &str, to: &str) {
        if let Some(value) = self.params.remove(from) {
            self.params.insert(to.to_owned(), value);
        }
    }

    /// Check the parameters against the schema of this layer type.
    /// Types without a schema accept anything, keys outside the schema are ignored.
    pub fn validate_params(&self) -> ConvertResult<()> {
        for spec in schema(&self.layer_type) {
            match self.params.get(spec.key) {
                None if spec.required => {
                    return Err(ConvertError::MissingParam {
                        layer: self.name.clone(),
                        layer_type: self.layer_type.clone(),
                        key: spec.key.to_owned(),
                    })
                }
                None => {}
                Some(value) => {
                    if !spec.kind.accepts(value) {
                        return Err(ConvertError::InvalidParam {
                            layer: self.name.clone(),
                            layer_type: self.layer_type.clone(),
                            key: spec.key.to_owned(),
                            value: value.clone(),
                            expected: spec.kind.expected(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ins = self.ins.iter().map(|i| i.as_deref().unwrap_or("<unbound>")).join(", ");
        write!(
            f,
            "{} {:?} {} ({}) -> ({})",
            self.layer_type,
            self.name,
            self.precision,
            ins,
            self.outs.iter().join(", ")
        )?;

        if !self.params.is_empty() {
            let params = self.params.iter().map(|(k, v)| format!("{}={}", k, v)).join(" ");
            write!(f, " {{{}}}", params)?;
        }
        if !self.blobs.is_empty() {
            let blobs = self
                .blobs
                .iter()
                .map(|(k, b)| format!("{}: {} {:?}", k, b.precision, b.data.shape()))
                .join(", ");
            write!(f, " blobs[{}]", blobs)?;
        }
        if !self.affinity.is_empty() {
            write!(f, " @{}", self.affinity)?;
        }
        Ok(())
    }
}
