use std::fmt::{Debug, Formatter};
use std::ops::Deref;

use indexmap::IndexMap;
use ndarray::{ArcArray, IxDyn};

use crate::attribute::{AttrValue, AttributeVisitor};
use crate::element::ElementType;
use crate::shape::PartialShape;

/// Constant storage, all element types are stored widened to `f64`.
/// Integers are exact up to `2^53`.
pub type Tensor = ArcArray<f64, IxDyn>;

/// Wrapper type that prevents the Debug output from getting too large.
#[derive(Clone, PartialEq)]
pub struct ConstantData(pub Tensor);

/// Element type and shape of a single node output.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorType {
    pub element_type: ElementType,
    pub shape: PartialShape,
}

/// The operations a [Node](crate::function::Node) can perform.
///
/// Variants ending in `IE` are the hardware-lowered forms that the legacy layer list understands,
/// the plain opset forms have to be rewritten into them first.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Parameter {
        element_type: ElementType,
        shape: PartialShape,
    },
    Constant {
        element_type: ElementType,
        data: ConstantData,
    },
    /// Marks its single input as an output of the function.
    Result,

    Convert {
        destination_type: ElementType,
    },
    Unary {
        op: UnaryOp,
    },
    Elu {
        alpha: f64,
    },
    Clamp {
        min: f64,
        max: f64,
    },
    Binary {
        op: BinaryOp,
        auto_broadcast: AutoBroadcast,
    },
    /// Legacy elementwise op with its operation stored as an enum.
    Eltwise {
        kind: EltwiseType,
    },

    /// Inputs: data `[N, C, spatial..]`, weights `[O, C, kernel..]`.
    Convolution(ConvAttrs),
    /// Inputs: data, weights `[O, C / group, kernel..]`, optional bias `[O]`.
    ConvolutionIE {
        conv: ConvAttrs,
        group: usize,
    },
    /// Inputs: data, binarized weights.
    BinaryConvolution {
        conv: ConvAttrs,
        mode: BinaryConvolutionMode,
        pad_value: f32,
    },
    AvgPool {
        pool: PoolAttrs,
        exclude_pad: bool,
    },
    MaxPool {
        pool: PoolAttrs,
    },
    /// Inputs: data `[.., K]`, weights `[out_size, K]`, bias `[out_size]`.
    FullyConnected {
        out_size: usize,
    },
    /// Inputs: data, weights, biases.
    ScaleShiftIE,
    /// Inputs: data, slope.
    PRelu,

    Concat {
        axis: i64,
    },
    /// Inputs: data, target pattern.
    Reshape {
        special_zero: bool,
    },
    /// Inputs: data, permutation.
    Transpose,
    /// Inputs: data, axis.
    Split {
        num_splits: usize,
    },
    Softmax {
        axis: i64,
    },
    /// Inputs: data, axes.
    Reduce {
        op: ReduceOp,
        keep_dims: bool,
    },

    /// Reads the state variable, initialized from its input.
    ReadValue {
        variable_id: String,
    },
    /// Writes its input to the state variable.
    Assign {
        variable_id: String,
    },

    ShapeOf {
        output_type: ElementType,
    },
    /// Inputs: indices, depth, on value, off value.
    OneHot {
        axis: i64,
    },
    OneHotIE {
        axis: i64,
        depth: usize,
        on_value: f32,
        off_value: f32,
        output_type: ElementType,
    },

    /// Inputs: X, H, C, weights, biases. Outputs: H, C.
    LSTMCellIE(CellAttrs),
    /// Inputs: X, H, weights, biases.
    RNNCellIE(CellAttrs),
    /// Inputs: X, H, weights, biases.
    GRUCellIE(CellAttrs),

    /// Inputs: data, input low, input high, output low, output high.
    FakeQuantize {
        levels: usize,
        auto_broadcast: AutoBroadcast,
    },

    /// An op outside of the known set, typically provided by an extension.
    Generic(GenericOp),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericOp {
    pub type_name: String,
    pub attrs: IndexMap<String, AttrValue>,
    /// Output types used when no extension infers them.
    pub outputs: Vec<TensorType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvAttrs {
    pub strides: Vec<usize>,
    pub dilations: Vec<usize>,
    pub pads_begin: Vec<i64>,
    pub pads_end: Vec<i64>,
    pub auto_pad: PadType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolAttrs {
    pub strides: Vec<usize>,
    pub pads_begin: Vec<usize>,
    pub pads_end: Vec<usize>,
    pub kernel: Vec<usize>,
    pub rounding_type: RoundingType,
    pub auto_pad: PadType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellAttrs {
    pub hidden_size: usize,
    pub activations: Vec<String>,
    pub activations_alpha: Vec<f32>,
    pub activations_beta: Vec<f32>,
    pub clip: f64,
    /// Only meaningful for GRU cells.
    pub linear_before_reset: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PadType {
    Explicit,
    SameUpper,
    SameLower,
    Valid,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RoundingType {
    Floor,
    Ceil,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AutoBroadcast {
    None,
    Numpy,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BinaryConvolutionMode {
    XnorPopcount,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum EltwiseType {
    Sum,
    Prod,
    Max,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UnaryOp {
    Relu,
    Sigmoid,
    Tanh,
    Exp,
    Abs,
    Sqrt,
    Log,
    Floor,
    Ceiling,
    Negative,
    Erf,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Maximum,
    Minimum,
    Power,
    FloorMod,
    SquaredDifference,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ReduceOp {
    Min,
    Max,
    Mean,
    Prod,
    Sum,
    L1,
    L2,
    LogicalAnd,
    LogicalOr,
}

impl Op {
    /// The versioned-opset type name of this op, used as the lowering key.
    pub fn type_name(&self) -> &str {
        match self {
            Op::Parameter { .. } => "Parameter",
            Op::Constant { .. } => "Constant",
            Op::Result => "Result",
            Op::Convert { .. } => "Convert",
            Op::Unary { op } => op.type_name(),
            Op::Elu { .. } => "Elu",
            Op::Clamp { .. } => "Clamp",
            Op::Binary { op, .. } => op.type_name(),
            Op::Eltwise { .. } => "Eltwise",
            Op::Convolution(_) => "Convolution",
            Op::ConvolutionIE { .. } => "ConvolutionIE",
            Op::BinaryConvolution { .. } => "BinaryConvolution",
            Op::AvgPool { .. } => "AvgPool",
            Op::MaxPool { .. } => "MaxPool",
            Op::FullyConnected { .. } => "FullyConnected",
            Op::ScaleShiftIE => "ScaleShiftIE",
            Op::PRelu => "PRelu",
            Op::Concat { .. } => "Concat",
            Op::Reshape { .. } => "Reshape",
            Op::Transpose => "Transpose",
            Op::Split { .. } => "Split",
            Op::Softmax { .. } => "Softmax",
            Op::Reduce { op, .. } => op.type_name(),
            Op::ReadValue { .. } => "ReadValue",
            Op::Assign { .. } => "Assign",
            Op::ShapeOf { .. } => "ShapeOf",
            Op::OneHot { .. } => "OneHot",
            Op::OneHotIE { .. } => "OneHotIE",
            Op::LSTMCellIE(_) => "LSTMCellIE",
            Op::RNNCellIE(_) => "RNNCellIE",
            Op::GRUCellIE(_) => "GRUCellIE",
            Op::FakeQuantize { .. } => "FakeQuantize",
            Op::Generic(generic) => &generic.type_name,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Op::Constant { .. })
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self, Op::Parameter { .. })
    }

    /// Hand each declared attribute of this op to `visitor`.
    pub fn visit_attributes<V: AttributeVisitor>(&self, visitor: &mut V) -> Result<(), V::Error> {
        match self {
            Op::Parameter { element_type, shape } => {
                visitor.on_attribute("shape", AttrValue::PartialShape(shape.clone()))?;
                visitor.on_attribute("element_type", AttrValue::ElementType(*element_type))?;
            }
            Op::Constant { element_type, data } => {
                visitor.on_attribute("element_type", AttrValue::ElementType(*element_type))?;
                visitor.on_attribute("shape", AttrValue::Shape(data.shape().to_vec()))?;
            }
            Op::Result | Op::ScaleShiftIE | Op::PRelu | Op::Transpose | Op::Unary { .. } => {}
            Op::Convert { destination_type } => {
                visitor.on_attribute("destination_type", AttrValue::ElementType(*destination_type))?;
            }
            Op::Elu { alpha } => visitor.on_attribute("alpha", AttrValue::Float(*alpha))?,
            Op::Clamp { min, max } => {
                visitor.on_attribute("min", AttrValue::Float(*min))?;
                visitor.on_attribute("max", AttrValue::Float(*max))?;
            }
            Op::Binary { auto_broadcast, .. } => {
                visitor.on_attribute("auto_broadcast", AttrValue::String(auto_broadcast.name().to_owned()))?;
            }
            Op::Eltwise { kind } => {
                visitor.on_attribute("operation", AttrValue::String(kind.name().to_owned()))?;
            }
            Op::Convolution(conv) => conv.visit(visitor)?,
            Op::ConvolutionIE { conv, group } => {
                conv.visit(visitor)?;
                visitor.on_attribute("group", AttrValue::Int(*group as i64))?;
            }
            Op::BinaryConvolution { conv, mode, pad_value } => {
                conv.visit(visitor)?;
                visitor.on_attribute("mode", AttrValue::String(mode.name().to_owned()))?;
                visitor.on_attribute("pad_value", AttrValue::Float(*pad_value as f64))?;
            }
            Op::AvgPool { pool, exclude_pad } => {
                pool.visit(visitor)?;
                visitor.on_attribute("exclude_pad", AttrValue::Bool(*exclude_pad))?;
            }
            Op::MaxPool { pool } => pool.visit(visitor)?,
            Op::FullyConnected { out_size } => {
                visitor.on_attribute("out-size", AttrValue::Int(*out_size as i64))?;
            }
            Op::Concat { axis } => visitor.on_attribute("axis", AttrValue::Int(*axis))?,
            Op::Reshape { special_zero } => {
                visitor.on_attribute("special_zero", AttrValue::Bool(*special_zero))?;
            }
            Op::Split { num_splits } => {
                visitor.on_attribute("num_splits", AttrValue::Int(*num_splits as i64))?;
            }
            Op::Softmax { axis } => visitor.on_attribute("axis", AttrValue::Int(*axis))?,
            Op::Reduce { keep_dims, .. } => visitor.on_attribute("keep_dims", AttrValue::Bool(*keep_dims))?,
            Op::ReadValue { variable_id } | Op::Assign { variable_id } => {
                visitor.on_attribute("variable_id", AttrValue::String(variable_id.clone()))?;
            }
            Op::ShapeOf { output_type } => {
                visitor.on_attribute("output_type", AttrValue::ElementType(*output_type))?;
            }
            Op::OneHot { axis } => visitor.on_attribute("axis", AttrValue::Int(*axis))?,
            Op::OneHotIE {
                axis,
                depth,
                on_value,
                off_value,
                output_type,
            } => {
                visitor.on_attribute("axis", AttrValue::Int(*axis))?;
                visitor.on_attribute("depth", AttrValue::Int(*depth as i64))?;
                visitor.on_attribute("on_value", AttrValue::Float(*on_value as f64))?;
                visitor.on_attribute("off_value", AttrValue::Float(*off_value as f64))?;
                visitor.on_attribute("type", AttrValue::ElementType(*output_type))?;
            }
            Op::LSTMCellIE(cell) | Op::RNNCellIE(cell) => cell.visit(visitor, false)?,
            Op::GRUCellIE(cell) => cell.visit(visitor, true)?,
            Op::FakeQuantize { levels, auto_broadcast } => {
                visitor.on_attribute("levels", AttrValue::Int(*levels as i64))?;
                visitor.on_attribute("auto_broadcast", AttrValue::String(auto_broadcast.name().to_owned()))?;
            }
            Op::Generic(generic) => {
                for (name, value) in &generic.attrs {
                    visitor.on_attribute(name, value.clone())?;
                }
            }
        }
        Ok(())
    }
}

impl ConvAttrs {
    /// Explicit padding with the given stride, dilation and pad for every spatial axis.
    pub fn simple(rank: usize, stride: usize, pad: i64) -> ConvAttrs {
        ConvAttrs {
            strides: vec![stride; rank],
            dilations: vec![1; rank],
            pads_begin: vec![pad; rank],
            pads_end: vec![pad; rank],
            auto_pad: PadType::Explicit,
        }
    }

    fn visit<V: AttributeVisitor>(&self, visitor: &mut V) -> Result<(), V::Error> {
        visitor.on_attribute("strides", AttrValue::Strides(self.strides.clone()))?;
        visitor.on_attribute("dilations", AttrValue::Strides(self.dilations.clone()))?;
        visitor.on_attribute("pads_begin", AttrValue::Ints(self.pads_begin.clone()))?;
        visitor.on_attribute("pads_end", AttrValue::Ints(self.pads_end.clone()))?;
        visitor.on_attribute("auto_pad", AttrValue::String(self.auto_pad.name().to_owned()))?;
        Ok(())
    }
}

impl PoolAttrs {
    pub fn simple(kernel: &[usize], stride: usize, pad: usize) -> PoolAttrs {
        let rank = kernel.len();
        PoolAttrs {
            strides: vec![stride; rank],
            pads_begin: vec![pad; rank],
            pads_end: vec![pad; rank],
            kernel: kernel.to_vec(),
            rounding_type: RoundingType::Floor,
            auto_pad: PadType::Explicit,
        }
    }

    fn visit<V: AttributeVisitor>(&self, visitor: &mut V) -> Result<(), V::Error> {
        visitor.on_attribute("strides", AttrValue::Strides(self.strides.clone()))?;
        visitor.on_attribute("pads_begin", AttrValue::Shape(self.pads_begin.clone()))?;
        visitor.on_attribute("pads_end", AttrValue::Shape(self.pads_end.clone()))?;
        visitor.on_attribute("kernel", AttrValue::Shape(self.kernel.clone()))?;
        visitor.on_attribute("rounding_type", AttrValue::String(self.rounding_type.name().to_owned()))?;
        visitor.on_attribute("auto_pad", AttrValue::String(self.auto_pad.name().to_owned()))?;
        Ok(())
    }
}

impl CellAttrs {
    pub fn new(hidden_size: usize, activations: &[&str]) -> CellAttrs {
        CellAttrs {
            hidden_size,
            activations: activations.iter().map(|&s| s.to_owned()).collect(),
            activations_alpha: vec![],
            activations_beta: vec![],
            clip: 0.0,
            linear_before_reset: false,
        }
    }

    fn visit<V: AttributeVisitor>(&self, visitor: &mut V, gru: bool) -> Result<(), V::Error> {
        visitor.on_attribute("hidden_size", AttrValue::Int(self.hidden_size as i64))?;
        visitor.on_attribute("activations", AttrValue::Strings(self.activations.clone()))?;
        visitor.on_attribute("activations_alpha", AttrValue::Floats(self.activations_alpha.clone()))?;
        visitor.on_attribute("activations_beta", AttrValue::Floats(self.activations_beta.clone()))?;
        visitor.on_attribute("clip", AttrValue::Float(self.clip))?;
        if gru {
            visitor.on_attribute("linear_before_reset", AttrValue::Bool(self.linear_before_reset))?;
        }
        Ok(())
    }
}

impl PadType {
    pub fn name(self) -> &'static str {
        match self {
            PadType::Explicit => "explicit",
            PadType::SameUpper => "same_upper",
            PadType::SameLower => "same_lower",
            PadType::Valid => "valid",
        }
    }
}

impl RoundingType {
    pub fn name(self) -> &'static str {
        match self {
            RoundingType::Floor => "floor",
            RoundingType::Ceil => "ceil",
        }
    }
}

impl AutoBroadcast {
    pub fn name(self) -> &'static str {
        match self {
            AutoBroadcast::None => "none",
            AutoBroadcast::Numpy => "numpy",
        }
    }
}

impl BinaryConvolutionMode {
    pub fn name(self) -> &'static str {
        match self {
            BinaryConvolutionMode::XnorPopcount => "xnor-popcount",
        }
    }
}

impl EltwiseType {
    pub fn name(self) -> &'static str {
        match self {
            EltwiseType::Sum => "sum",
            EltwiseType::Prod => "prod",
            EltwiseType::Max => "max",
        }
    }
}

impl UnaryOp {
    pub const ALL: &'static [UnaryOp] = &[
        UnaryOp::Relu,
        UnaryOp::Sigmoid,
        UnaryOp::Tanh,
        UnaryOp::Exp,
        UnaryOp::Abs,
        UnaryOp::Sqrt,
        UnaryOp::Log,
        UnaryOp::Floor,
        UnaryOp::Ceiling,
        UnaryOp::Negative,
        UnaryOp::Erf,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            UnaryOp::Relu => "Relu",
            UnaryOp::Sigmoid => "Sigmoid",
            UnaryOp::Tanh => "Tanh",
            UnaryOp::Exp => "Exp",
            UnaryOp::Abs => "Abs",
            UnaryOp::Sqrt => "Sqrt",
            UnaryOp::Log => "Log",
            UnaryOp::Floor => "Floor",
            UnaryOp::Ceiling => "Ceiling",
            UnaryOp::Negative => "Negative",
            UnaryOp::Erf => "Erf",
        }
    }

    pub fn map(self, x: f64) -> f64 {
        match self {
            UnaryOp::Relu => x.max(0.0),
            UnaryOp::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            UnaryOp::Tanh => x.tanh(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Abs => x.abs(),
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Log => x.ln(),
            UnaryOp::Floor => x.floor(),
            UnaryOp::Ceiling => x.ceil(),
            UnaryOp::Negative => -x,
            UnaryOp::Erf => erf(x),
        }
    }
}

impl BinaryOp {
    pub const ALL: &'static [BinaryOp] = &[
        BinaryOp::Add,
        BinaryOp::Subtract,
        BinaryOp::Multiply,
        BinaryOp::Divide,
        BinaryOp::Maximum,
        BinaryOp::Minimum,
        BinaryOp::Power,
        BinaryOp::FloorMod,
        BinaryOp::SquaredDifference,
        BinaryOp::Equal,
        BinaryOp::NotEqual,
        BinaryOp::Less,
        BinaryOp::LessEqual,
        BinaryOp::Greater,
        BinaryOp::GreaterEqual,
        BinaryOp::LogicalAnd,
        BinaryOp::LogicalOr,
        BinaryOp::LogicalXor,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "Add",
            BinaryOp::Subtract => "Subtract",
            BinaryOp::Multiply => "Multiply",
            BinaryOp::Divide => "Divide",
            BinaryOp::Maximum => "Maximum",
            BinaryOp::Minimum => "Minimum",
            BinaryOp::Power => "Power",
            BinaryOp::FloorMod => "FloorMod",
            BinaryOp::SquaredDifference => "SquaredDifference",
            BinaryOp::Equal => "Equal",
            BinaryOp::NotEqual => "NotEqual",
            BinaryOp::Less => "Less",
            BinaryOp::LessEqual => "LessEqual",
            BinaryOp::Greater => "Greater",
            BinaryOp::GreaterEqual => "GreaterEqual",
            BinaryOp::LogicalAnd => "LogicalAnd",
            BinaryOp::LogicalOr => "LogicalOr",
            BinaryOp::LogicalXor => "LogicalXor",
        }
    }

    /// Whether the result is a boolean tensor.
    pub fn is_predicate(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
                | BinaryOp::LogicalAnd
                | BinaryOp::LogicalOr
                | BinaryOp::LogicalXor
        )
    }

    pub fn map(self, left: f64, right: f64) -> f64 {
        let truth = |b: bool| b as u8 as f64;
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Subtract => left - right,
            BinaryOp::Multiply => left * right,
            BinaryOp::Divide => left / right,
            BinaryOp::Maximum => left.max(right),
            BinaryOp::Minimum => left.min(right),
            BinaryOp::Power => left.powf(right),
            BinaryOp::FloorMod => left - (left / right).floor() * right,
            BinaryOp::SquaredDifference => (left - right) * (left - right),
            BinaryOp::Equal => truth(left == right),
            BinaryOp::NotEqual => truth(left != right),
            BinaryOp::Less => truth(left < right),
            BinaryOp::LessEqual => truth(left <= right),
            BinaryOp::Greater => truth(left > right),
            BinaryOp::GreaterEqual => truth(left >= right),
            BinaryOp::LogicalAnd => truth(left != 0.0 && right != 0.0),
            BinaryOp::LogicalOr => truth(left != 0.0 || right != 0.0),
            BinaryOp::LogicalXor => truth((left != 0.0) != (right != 0.0)),
        }
    }
}

impl ReduceOp {
    pub fn type_name(self) -> &'static str {
        match self {
            ReduceOp::Min => "ReduceMin",
            ReduceOp::Max => "ReduceMax",
            ReduceOp::Mean => "ReduceMean",
            ReduceOp::Prod => "ReduceProd",
            ReduceOp::Sum => "ReduceSum",
            ReduceOp::L1 => "ReduceL1",
            ReduceOp::L2 => "ReduceL2",
            ReduceOp::LogicalAnd => "ReduceLogicalAnd",
            ReduceOp::LogicalOr => "ReduceLogicalOr",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, ReduceOp::LogicalAnd | ReduceOp::LogicalOr)
    }
}

impl ConstantData {
    pub fn new(tensor: Tensor) -> Self {
        ConstantData(tensor)
    }

    /// The values of a rank-0 or rank-1 constant as integers.
    pub fn as_ints(&self) -> Option<Vec<i64>> {
        if self.0.ndim() > 1 {
            return None;
        }
        Some(self.0.iter().map(|&x| x as i64).collect())
    }

    pub fn as_scalar(&self) -> Option<f64> {
        if self.0.len() == 1 {
            self.0.iter().next().copied()
        } else {
            None
        }
    }
}

impl Deref for ConstantData {
    type Target = Tensor;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Debug for ConstantData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.len() <= 16 {
            write!(f, "{:?}", self.0.iter().collect::<Vec<_>>())
        } else {
            write!(f, "[..; {}]", self.0.len())
        }
    }
}

// Abramowitz and Stegun 7.1.26, max error 1.5e-7
fn erf(x: f64) -> f64 {
    let sign = x.signum();
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = t * (0.254829592 + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    sign * (1.0 - poly * (-x * x).exp())
}

#[cfg(test)]
mod test {
    use ndarray::{ArcArray, IxDyn};

    use crate::op::{BinaryOp, ConstantData, UnaryOp};

    #[test]
    fn constant_debug_truncates() {
        let small = ConstantData(ArcArray::from_elem(IxDyn(&[2]), 0.5));
        assert_eq!(format!("{:?}", small), "[0.5, 0.5]");

        let large = ConstantData(ArcArray::zeros(IxDyn(&[4, 8])));
        assert_eq!(format!("{:?}", large), "[..; 32]");
    }

    #[test]
    fn predicates() {
        assert!(BinaryOp::GreaterEqual.is_predicate());
        assert!(!BinaryOp::Add.is_predicate());
        assert_eq!(BinaryOp::GreaterEqual.map(2.0, 2.0), 1.0);
        assert_eq!(BinaryOp::FloorMod.map(-3.0, 2.0), 1.0);
    }

    #[test]
    fn unary_values() {
        assert_eq!(UnaryOp::Relu.map(-2.0), 0.0);
        assert!((UnaryOp::Erf.map(0.5) - 0.5205).abs() < 1e-3);
        assert!(UnaryOp::Erf.map(0.0).abs() < 1e-6);
    }
}
