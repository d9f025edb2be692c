use lw_graph::element::ElementType;
use lw_graph::error::GraphError;
use lw_graph::function::{Function, Output};
use lw_graph::op::{CellAttrs, ConvAttrs, Op, PadType, PoolAttrs, ReduceOp, RoundingType};
use lw_graph::shape;
use lw_graph::shape::{Dimension, PartialShape};

fn output_shape(function: &Function, output: impl Into<Output>) -> PartialShape {
    function.output_type(output.into()).shape.clone()
}

#[test]
fn convolution_explicit_and_same() {
    let mut function = Function::new("conv");
    let x = function.parameter("x", ElementType::F32, shape![1, 3, 224, 224]);
    let w = function.constant_f32(&[16, 3, 7, 7], vec![0.1; 16 * 3 * 7 * 7]);

    let explicit = function.convolution_ie(x, w, None, ConvAttrs::simple(2, 2, 3), 1);
    assert_eq!(output_shape(&function, explicit), shape![1, 16, 112, 112]);

    let mut same = ConvAttrs::simple(2, 2, 0);
    same.auto_pad = PadType::SameUpper;
    let same = function.convolution_ie(x, w, None, same, 1);
    assert_eq!(output_shape(&function, same), shape![1, 16, 112, 112]);

    let mut valid = ConvAttrs::simple(2, 1, 0);
    valid.auto_pad = PadType::Valid;
    let valid = function.convolution_ie(x, w, None, valid, 1);
    assert_eq!(output_shape(&function, valid), shape![1, 16, 218, 218]);
}

#[test]
fn convolution_channel_mismatch() {
    let mut function = Function::new("conv");
    let x = function.parameter("x", ElementType::F32, shape![1, 4, 8, 8]);
    let w = function.constant_f32(&[8, 3, 3, 3], vec![0.0; 8 * 3 * 3 * 3]);

    let op = Op::ConvolutionIE {
        conv: ConvAttrs::simple(2, 1, 1),
        group: 1,
    };
    let result = function.try_add_node(op, vec![x.into(), w.into()]);
    assert!(matches!(result, Err(GraphError::Validation { .. })), "{:?}", result);
}

#[test]
fn convolution_dynamic_spatial() {
    let mut function = Function::new("conv");
    let x = function.parameter("x", ElementType::F32, shape![Dimension::DYNAMIC, 3, Dimension::DYNAMIC, 32]);
    let w = function.constant_f32(&[4, 3, 3, 3], vec![0.0; 4 * 3 * 3 * 3]);
    let y = function.convolution(x, w, ConvAttrs::simple(2, 1, 1));
    assert_eq!(
        output_shape(&function, y),
        shape![Dimension::DYNAMIC, 4, Dimension::DYNAMIC, 32]
    );
}

#[test]
fn pooling_rounding() {
    let mut function = Function::new("pool");
    let x = function.parameter("x", ElementType::F32, shape![1, 8, 7, 7]);

    let floor = function.max_pool(x, PoolAttrs::simple(&[2, 2], 2, 0));
    assert_eq!(output_shape(&function, floor), shape![1, 8, 3, 3]);

    let mut ceil = PoolAttrs::simple(&[2, 2], 2, 0);
    ceil.rounding_type = RoundingType::Ceil;
    let ceil = function.avg_pool(x, ceil, false);
    assert_eq!(output_shape(&function, ceil), shape![1, 8, 4, 4]);
}

#[test]
fn concat_and_split() {
    let mut function = Function::new("concat");
    let a = function.parameter("a", ElementType::F32, shape![2, 3]);
    let b = function.parameter("b", ElementType::F32, shape![2, 5]);
    let c = function.concat(&[a.into(), b.into()], -1);
    assert_eq!(output_shape(&function, c), shape![2, 8]);

    let s = function.split(c, 1, 4);
    assert_eq!(function[s].outputs().len(), 4);
    for output in function[s].outputs() {
        assert_eq!(output.shape, shape![2, 2]);
    }

    let axis = function[s].inputs()[1];
    let bad = function.try_add_node(Op::Split { num_splits: 3 }, vec![c.into(), axis]);
    assert!(bad.is_err());
}

#[test]
fn reshape_inference() {
    let mut function = Function::new("reshape");
    let x = function.parameter("x", ElementType::F32, shape![2, 3, 4]);

    let flat = function.reshape(x, &[0, -1], true);
    assert_eq!(output_shape(&function, flat), shape![2, 12]);

    let explicit = function.reshape(x, &[4, 6], false);
    assert_eq!(output_shape(&function, explicit), shape![4, 6]);

    let d = function.parameter("d", ElementType::F32, shape![Dimension::DYNAMIC, 3, 4]);
    let flat = function.reshape(d, &[0, -1], true);
    assert_eq!(output_shape(&function, flat), shape![Dimension::DYNAMIC, Dimension::DYNAMIC]);

    let pattern = function.constant_ints(&[5, 5]);
    let bad = function.try_add_node(Op::Reshape { special_zero: false }, vec![x.into(), pattern.into()]);
    assert!(bad.is_err());
}

#[test]
fn transpose_and_reduce() {
    let mut function = Function::new("transpose");
    let x = function.parameter("x", ElementType::F32, shape![2, 3, 4]);

    let t = function.transpose(x, &[2, 0, 1]);
    assert_eq!(output_shape(&function, t), shape![4, 2, 3]);

    let keep = function.reduce(ReduceOp::Mean, x, &[1, -1], true);
    assert_eq!(output_shape(&function, keep), shape![2, 1, 1]);

    let drop = function.reduce(ReduceOp::Sum, x, &[0], false);
    assert_eq!(output_shape(&function, drop), shape![3, 4]);

    let b = function.parameter("b", ElementType::Boolean, shape![2, 3]);
    let all = function.reduce(ReduceOp::LogicalAnd, b, &[1], false);
    assert_eq!(function.output_type(all.into()).element_type, ElementType::Boolean);
}

#[test]
fn cells() {
    let mut function = Function::new("cells");
    let x = function.parameter("x", ElementType::F32, shape![2, 10]);
    let h = function.parameter("h", ElementType::F32, shape![2, 16]);
    let c = function.parameter("c", ElementType::F32, shape![2, 16]);
    let w = function.constant_f32(&[64, 26], vec![0.0; 64 * 26]);
    let b = function.constant_f32(&[64], vec![0.0; 64]);

    let lstm = function.lstm_cell_ie(
        [x.into(), h.into(), c.into(), w.into(), b.into()],
        CellAttrs::new(16, &["sigmoid", "tanh", "tanh"]),
    );
    assert_eq!(function[lstm].outputs().len(), 2);
    assert_eq!(function[lstm].outputs()[1].shape, shape![2, 16]);

    let gru = function.gru_cell_ie([x.into(), h.into(), w.into(), b.into()], CellAttrs::new(16, &["sigmoid", "tanh"]));
    assert_eq!(output_shape(&function, gru), shape![2, 16]);
}

#[test]
fn binary_type_mismatch() {
    let mut function = Function::new("mismatch");
    let a = function.parameter("a", ElementType::F32, shape![2]);
    let b = function.parameter("b", ElementType::I32, shape![2]);
    let op = Op::Binary {
        op: lw_graph::op::BinaryOp::Add,
        auto_broadcast: lw_graph::op::AutoBroadcast::Numpy,
    };
    let result = function.try_add_node(op, vec![a.into(), b.into()]);
    assert!(matches!(result, Err(GraphError::ElementTypeMismatch { .. })));
}

#[test]
fn comparisons_are_boolean() {
    let mut function = Function::new("cmp");
    let a = function.parameter("a", ElementType::F32, shape![4, 1]);
    let b = function.parameter("b", ElementType::F32, shape![3]);
    let c = function.binary(lw_graph::op::BinaryOp::GreaterEqual, a, b);
    let ty = function.output_type(c.into());
    assert_eq!(ty.element_type, ElementType::Boolean);
    assert_eq!(ty.shape, shape![4, 3]);
}
