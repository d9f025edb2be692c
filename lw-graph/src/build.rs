use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{ArcArray, IxDyn};

use crate::attribute::AttrValue;
use crate::element::ElementType;
use crate::function::{Function, NodeId, Output};
use crate::op::{
    AutoBroadcast, BinaryConvolutionMode, BinaryOp, CellAttrs, ConstantData, ConvAttrs, EltwiseType, GenericOp, Op,
    PoolAttrs, ReduceOp, TensorType, UnaryOp,
};
use crate::shape::PartialShape;

/// Convenience builders, these panic if the inputs don't fit the op.
impl Function {
    #[must_use]
    pub fn parameter(&mut self, name: &str, element_type: ElementType, shape: PartialShape) -> NodeId {
        let node = self.add_node(Op::Parameter { element_type, shape }, vec![]);
        self.set_friendly_name(node, name);
        node
    }

    #[must_use]
    pub fn constant(&mut self, element_type: ElementType, shape: &[usize], data: Vec<f32>) -> NodeId {
        let data = data.into_iter().map(f64::from).collect_vec();
        self.constant_f64(element_type, shape, data)
    }

    /// Like [Self::constant], but without going through `f32`.
    #[must_use]
    pub fn constant_f64(&mut self, element_type: ElementType, shape: &[usize], data: Vec<f64>) -> NodeId {
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "Constant data length does not match shape {:?}",
            shape
        );
        let data = data.into_iter().map(|x| element_type.cast_value(x)).collect_vec();
        let tensor = ArcArray::from_shape_vec(IxDyn(shape), data).unwrap_or_else(|e| panic!("{}", e));
        self.add_node(
            Op::Constant {
                element_type,
                data: ConstantData(tensor),
            },
            vec![],
        )
    }

    #[must_use]
    pub fn constant_f32(&mut self, shape: &[usize], data: Vec<f32>) -> NodeId {
        self.constant(ElementType::F32, shape, data)
    }

    /// A rank-1 `i64` constant, as used for axes, patterns and orders.
    #[must_use]
    pub fn constant_ints(&mut self, values: &[i64]) -> NodeId {
        let data = values.iter().map(|&v| v as f64).collect_vec();
        self.constant_f64(ElementType::I64, &[values.len()], data)
    }

    /// A rank-0 `i64` constant.
    #[must_use]
    pub fn constant_scalar_int(&mut self, value: i64) -> NodeId {
        self.constant_f64(ElementType::I64, &[], vec![value as f64])
    }

    pub fn result(&mut self, value: impl Into<Output>) -> NodeId {
        self.add_node(Op::Result, vec![value.into()])
    }

    #[must_use]
    pub fn convert(&mut self, value: impl Into<Output>, destination_type: ElementType) -> NodeId {
        self.add_node(Op::Convert { destination_type }, vec![value.into()])
    }

    #[must_use]
    pub fn unary(&mut self, op: UnaryOp, value: impl Into<Output>) -> NodeId {
        self.add_node(Op::Unary { op }, vec![value.into()])
    }

    #[must_use]
    pub fn relu(&mut self, value: impl Into<Output>) -> NodeId {
        self.unary(UnaryOp::Relu, value)
    }

    #[must_use]
    pub fn elu(&mut self, value: impl Into<Output>, alpha: f64) -> NodeId {
        self.add_node(Op::Elu { alpha }, vec![value.into()])
    }

    #[must_use]
    pub fn clamp(&mut self, value: impl Into<Output>, min: f64, max: f64) -> NodeId {
        self.add_node(Op::Clamp { min, max }, vec![value.into()])
    }

    #[must_use]
    pub fn binary(&mut self, op: BinaryOp, left: impl Into<Output>, right: impl Into<Output>) -> NodeId {
        let op = Op::Binary {
            op,
            auto_broadcast: AutoBroadcast::Numpy,
        };
        self.add_node(op, vec![left.into(), right.into()])
    }

    #[must_use]
    pub fn add(&mut self, left: impl Into<Output>, right: impl Into<Output>) -> NodeId {
        self.binary(BinaryOp::Add, left, right)
    }

    #[must_use]
    pub fn multiply(&mut self, left: impl Into<Output>, right: impl Into<Output>) -> NodeId {
        self.binary(BinaryOp::Multiply, left, right)
    }

    #[must_use]
    pub fn eltwise(&mut self, kind: EltwiseType, left: impl Into<Output>, right: impl Into<Output>) -> NodeId {
        self.add_node(Op::Eltwise { kind }, vec![left.into(), right.into()])
    }

    #[must_use]
    pub fn convolution(&mut self, input: impl Into<Output>, weights: impl Into<Output>, conv: ConvAttrs) -> NodeId {
        self.add_node(Op::Convolution(conv), vec![input.into(), weights.into()])
    }

    #[must_use]
    pub fn convolution_ie(
        &mut self,
        input: impl Into<Output>,
        weights: impl Into<Output>,
        bias: Option<Output>,
        conv: ConvAttrs,
        group: usize,
    ) -> NodeId {
        let mut inputs = vec![input.into(), weights.into()];
        inputs.extend(bias);
        self.add_node(Op::ConvolutionIE { conv, group }, inputs)
    }

    #[must_use]
    pub fn binary_convolution(
        &mut self,
        input: impl Into<Output>,
        weights: impl Into<Output>,
        conv: ConvAttrs,
        pad_value: f32,
    ) -> NodeId {
        let op = Op::BinaryConvolution {
            conv,
            mode: BinaryConvolutionMode::XnorPopcount,
            pad_value,
        };
        self.add_node(op, vec![input.into(), weights.into()])
    }

    #[must_use]
    pub fn avg_pool(&mut self, input: impl Into<Output>, pool: PoolAttrs, exclude_pad: bool) -> NodeId {
        self.add_node(Op::AvgPool { pool, exclude_pad }, vec![input.into()])
    }

    #[must_use]
    pub fn max_pool(&mut self, input: impl Into<Output>, pool: PoolAttrs) -> NodeId {
        self.add_node(Op::MaxPool { pool }, vec![input.into()])
    }

    #[must_use]
    pub fn fully_connected(
        &mut self,
        input: impl Into<Output>,
        weights: impl Into<Output>,
        bias: impl Into<Output>,
        out_size: usize,
    ) -> NodeId {
        let inputs = vec![input.into(), weights.into(), bias.into()];
        self.add_node(Op::FullyConnected { out_size }, inputs)
    }

    #[must_use]
    pub fn scale_shift_ie(
        &mut self,
        input: impl Into<Output>,
        weights: impl Into<Output>,
        biases: impl Into<Output>,
    ) -> NodeId {
        self.add_node(Op::ScaleShiftIE, vec![input.into(), weights.into(), biases.into()])
    }

    #[must_use]
    pub fn prelu(&mut self, input: impl Into<Output>, slope: impl Into<Output>) -> NodeId {
        self.add_node(Op::PRelu, vec![input.into(), slope.into()])
    }

    #[must_use]
    pub fn concat(&mut self, inputs: &[Output], axis: i64) -> NodeId {
        self.add_node(Op::Concat { axis }, inputs.to_vec())
    }

    #[must_use]
    pub fn reshape(&mut self, input: impl Into<Output>, pattern: &[i64], special_zero: bool) -> NodeId {
        let pattern = self.constant_ints(pattern);
        self.add_node(Op::Reshape { special_zero }, vec![input.into(), pattern.into()])
    }

    #[must_use]
    pub fn transpose(&mut self, input: impl Into<Output>, order: &[i64]) -> NodeId {
        let order = self.constant_ints(order);
        self.add_node(Op::Transpose, vec![input.into(), order.into()])
    }

    #[must_use]
    pub fn split(&mut self, input: impl Into<Output>, axis: i64, num_splits: usize) -> NodeId {
        let axis = self.constant_scalar_int(axis);
        self.add_node(Op::Split { num_splits }, vec![input.into(), axis.into()])
    }

    #[must_use]
    pub fn softmax(&mut self, input: impl Into<Output>, axis: i64) -> NodeId {
        self.add_node(Op::Softmax { axis }, vec![input.into()])
    }

    #[must_use]
    pub fn reduce(&mut self, op: ReduceOp, input: impl Into<Output>, axes: &[i64], keep_dims: bool) -> NodeId {
        let axes = self.constant_ints(axes);
        self.add_node(Op::Reduce { op, keep_dims }, vec![input.into(), axes.into()])
    }

    #[must_use]
    pub fn read_value(&mut self, init: impl Into<Output>, variable_id: &str) -> NodeId {
        let op = Op::ReadValue {
            variable_id: variable_id.to_owned(),
        };
        self.add_node(op, vec![init.into()])
    }

    pub fn assign(&mut self, value: impl Into<Output>, variable_id: &str) -> NodeId {
        let op = Op::Assign {
            variable_id: variable_id.to_owned(),
        };
        self.add_node(op, vec![value.into()])
    }

    #[must_use]
    pub fn shape_of(&mut self, input: impl Into<Output>) -> NodeId {
        let op = Op::ShapeOf {
            output_type: ElementType::I64,
        };
        self.add_node(op, vec![input.into()])
    }

    #[must_use]
    pub fn one_hot(&mut self, indices: impl Into<Output>, depth: usize, on_value: f32, off_value: f32, axis: i64) -> NodeId {
        let depth = self.constant_scalar_int(depth as i64);
        let on_value = self.constant_f32(&[], vec![on_value]);
        let off_value = self.constant_f32(&[], vec![off_value]);
        let inputs = vec![indices.into(), depth.into(), on_value.into(), off_value.into()];
        self.add_node(Op::OneHot { axis }, inputs)
    }

    #[must_use]
    pub fn lstm_cell_ie(&mut self, inputs: [Output; 5], cell: CellAttrs) -> NodeId {
        self.add_node(Op::LSTMCellIE(cell), inputs.to_vec())
    }

    #[must_use]
    pub fn rnn_cell_ie(&mut self, inputs: [Output; 4], cell: CellAttrs) -> NodeId {
        self.add_node(Op::RNNCellIE(cell), inputs.to_vec())
    }

    #[must_use]
    pub fn gru_cell_ie(&mut self, inputs: [Output; 4], cell: CellAttrs) -> NodeId {
        self.add_node(Op::GRUCellIE(cell), inputs.to_vec())
    }

    #[must_use]
    pub fn fake_quantize(&mut self, input: impl Into<Output>, low: f32, high: f32, levels: usize) -> NodeId {
        let bounds = [low, high, low, high].map(|x| Output::from(self.constant_f32(&[], vec![x])));
        let mut inputs = vec![input.into()];
        inputs.extend(bounds);
        let op = Op::FakeQuantize {
            levels,
            auto_broadcast: AutoBroadcast::Numpy,
        };
        self.add_node(op, inputs)
    }

    /// A custom op, `outputs` are used as output types unless an extension infers them.
    #[must_use]
    pub fn generic(
        &mut self,
        type_name: &str,
        inputs: &[Output],
        attrs: IndexMap<String, AttrValue>,
        outputs: Vec<TensorType>,
    ) -> NodeId {
        let op = Op::Generic(GenericOp {
            type_name: type_name.to_owned(),
            attrs,
            outputs,
        });
        self.add_node(op, inputs.to_vec())
    }
}
