use itertools::Itertools;
use ndarray::{concatenate, Axis, IxDyn, Zip};
use tracing::{instrument, trace};

use crate::element::ElementType;
use crate::error::{GraphError, GraphResult};
use crate::function::{Function, NodeId};
use crate::op::{BinaryOp, ConstantData, EltwiseType, Op, Tensor};
use crate::passes::GraphRewrite;
use crate::shape::normalize_axis;

/// Replace every node whose inputs are all constants by a constant holding its value.
/// Shape queries of inputs with a fully static shape are folded too.
#[derive(Debug, Default, Copy, Clone)]
pub struct ConstantFolding;

impl GraphRewrite for ConstantFolding {
    fn name(&self) -> &'static str {
        "ConstantFolding"
    }

    #[instrument(name = "ConstantFolding", skip_all, level = "debug")]
    fn run_on_function(&self, function: &mut Function) -> GraphResult<bool> {
        let mut changed = false;

        for node in function.ordered_ops() {
            if let Some((element_type, tensor)) = fold_node(function, node)? {
                trace!("Folded {:?} {}", node, function[node].friendly_name());
                function.replace_with_constant(node, element_type, ConstantData(tensor));
                changed = true;
            }
        }

        Ok(changed)
    }
}

fn fold_error(function: &Function, node: NodeId, message: impl Into<String>) -> GraphError {
    GraphError::Pass {
        pass: "ConstantFolding",
        message: format!("{:?}: {}", function[node].desc(), message.into()),
    }
}

fn fold_node(function: &Function, node: NodeId) -> GraphResult<Option<(ElementType, Tensor)>> {
    let info = &function[node];
    let output = match info.outputs() {
        [output] => output,
        _ => return Ok(None),
    };
    let element_type = output.element_type;
    let shape = match output.shape.to_shape() {
        Some(shape) => shape,
        None => return Ok(None),
    };

    // shape queries only need the input shape
    if let Op::ShapeOf { .. } = info.op() {
        let input_shape = match function.output_type(info.inputs()[0]).shape.to_shape() {
            Some(input_shape) => input_shape,
            None => return Ok(None),
        };
        let data = input_shape.iter().map(|&d| d as f64).collect_vec();
        let tensor = Tensor::from_shape_vec(IxDyn(&[data.len()]), data).map_err(|e| fold_error(function, node, e.to_string()))?;
        return Ok(Some((element_type, tensor)));
    }

    let inputs = match info
        .inputs()
        .iter()
        .map(|&i| function.constant_value(i))
        .collect::<Option<Vec<_>>>()
    {
        Some(inputs) if !inputs.is_empty() => inputs,
        _ => return Ok(None),
    };

    let result = match info.op() {
        Op::Convert { destination_type } => inputs[0].mapv(|x| destination_type.cast_value(x)).into_shared(),
        Op::Unary { op } => inputs[0].mapv(|x| op.map(x)).into_shared(),
        Op::Binary { op, .. } => fold_binary(function, node, &inputs[0].0, &inputs[1].0, &shape, |a, b| op.map(a, b))?,
        Op::Eltwise { kind } => {
            let op = match kind {
                EltwiseType::Sum => BinaryOp::Add,
                EltwiseType::Prod => BinaryOp::Multiply,
                EltwiseType::Max => BinaryOp::Maximum,
            };
            fold_binary(function, node, &inputs[0].0, &inputs[1].0, &shape, |a, b| op.map(a, b))?
        }
        Op::Reshape { .. } => reshape_tensor(function, node, &inputs[0].0, &shape)?,
        Op::Transpose => {
            let order = inputs[1].as_ints().ok_or_else(|| fold_error(function, node, "order must be rank 1"))?;
            let rank = inputs[0].ndim();
            let order = if order.is_empty() {
                (0..rank).rev().collect_vec()
            } else {
                order.iter().map(|&o| o as usize).collect_vec()
            };
            let permuted = inputs[0].0.clone().permuted_axes(IxDyn(&order));
            reshape_tensor(function, node, &permuted, &shape)?
        }
        Op::Concat { axis } => {
            let axis = normalize_axis(*axis, shape.len()).ok_or_else(|| fold_error(function, node, "invalid axis"))?;
            let views = inputs.iter().map(|c| c.view()).collect_vec();
            concatenate(Axis(axis), &views)
                .map_err(|e| fold_error(function, node, e.to_string()))?
                .into_shared()
        }
        _ => return Ok(None),
    };

    let result = result.mapv(|x| element_type.cast_value(x)).into_shared();
    Ok(Some((element_type, result)))
}

fn fold_binary(
    function: &Function,
    node: NodeId,
    left: &Tensor,
    right: &Tensor,
    shape: &[usize],
    f: impl Fn(f64, f64) -> f64,
) -> GraphResult<Tensor> {
    let left = left
        .broadcast(IxDyn(shape))
        .ok_or_else(|| fold_error(function, node, "cannot broadcast left operand"))?;
    let right = right
        .broadcast(IxDyn(shape))
        .ok_or_else(|| fold_error(function, node, "cannot broadcast right operand"))?;

    Ok(Zip::from(&left).and(&right).map_collect(|&a, &b| f(a, b)).into_shared())
}

fn reshape_tensor(function: &Function, node: NodeId, tensor: &Tensor, shape: &[usize]) -> GraphResult<Tensor> {
    // iterate in logical order so any memory layout works
    let data = tensor.iter().copied().collect_vec();
    Tensor::from_shape_vec(IxDyn(shape), data).map_err(|e| fold_error(function, node, e.to_string()))
}
