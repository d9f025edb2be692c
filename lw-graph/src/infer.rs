use std::ops::RangeInclusive;
use std::sync::Arc;

use itertools::Itertools;

use crate::element::ElementType;
use crate::error::{GraphError, GraphResult, NodeDesc};
use crate::extension::Extension;
use crate::op::{AutoBroadcast, ConvAttrs, ConstantData, Op, PadType, PoolAttrs, RoundingType, TensorType};
use crate::shape::{normalize_axis, Dimension, PartialShape};

/// Everything known about the inputs of a node while inferring its output types.
pub(crate) struct InferContext<'a> {
    pub node: NodeDesc,
    pub inputs: &'a [TensorType],
    /// The value of each input, if it is produced by a constant.
    pub constants: &'a [Option<&'a ConstantData>],
    pub extensions: &'a [Arc<dyn Extension>],
}

impl InferContext<'_> {
    fn fail(&self, message: impl Into<String>) -> GraphError {
        GraphError::Validation {
            node: self.node.clone(),
            message: message.into(),
        }
    }

    fn expect_inputs(&self, expected: RangeInclusive<usize>) -> GraphResult<()> {
        if expected.contains(&self.inputs.len()) {
            Ok(())
        } else {
            let expected = if expected.start() == expected.end() {
                expected.start().to_string()
            } else if *expected.end() == usize::MAX {
                format!("at least {}", expected.start())
            } else {
                format!("{} to {}", expected.start(), expected.end())
            };
            Err(GraphError::InputCount {
                node: self.node.clone(),
                expected,
                actual: self.inputs.len(),
            })
        }
    }

    fn shape(&self, index: usize) -> &PartialShape {
        &self.inputs[index].shape
    }

    fn element_type(&self, index: usize) -> ElementType {
        self.inputs[index].element_type
    }

    fn const_ints(&self, index: usize) -> Option<Vec<i64>> {
        self.constants.get(index).copied().flatten()?.as_ints()
    }

    fn merge_types(&self, left: ElementType, right: ElementType) -> GraphResult<ElementType> {
        left.merge(right).ok_or_else(|| GraphError::ElementTypeMismatch {
            node: self.node.clone(),
            left,
            right,
        })
    }
}

fn single(element_type: ElementType, shape: PartialShape) -> Vec<TensorType> {
    vec![TensorType { element_type, shape }]
}

fn same_as_input(ctx: &InferContext) -> Vec<TensorType> {
    vec![ctx.inputs[0].clone()]
}

/// Infer the output types of `op` given the types (and constant values) of its inputs.
pub(crate) fn infer_types(op: &Op, ctx: &InferContext) -> GraphResult<Vec<TensorType>> {
    let result = match op {
        Op::Parameter { element_type, shape } => {
            ctx.expect_inputs(0..=0)?;
            single(*element_type, shape.clone())
        }
        Op::Constant { element_type, data } => {
            ctx.expect_inputs(0..=0)?;
            single(*element_type, PartialShape::fixed(data.shape()))
        }
        Op::Result | Op::ReadValue { .. } | Op::Assign { .. } => {
            ctx.expect_inputs(1..=1)?;
            same_as_input(ctx)
        }
        Op::Convert { destination_type } => {
            ctx.expect_inputs(1..=1)?;
            single(*destination_type, ctx.shape(0).clone())
        }
        Op::Unary { .. } | Op::Elu { .. } | Op::Clamp { .. } => {
            ctx.expect_inputs(1..=1)?;
            same_as_input(ctx)
        }
        Op::Softmax { axis } => {
            ctx.expect_inputs(1..=1)?;
            if let Some(rank) = ctx.shape(0).rank() {
                normalize_axis(*axis, rank).ok_or_else(|| ctx.fail(format!("Axis {} out of range for rank {}", axis, rank)))?;
            }
            same_as_input(ctx)
        }
        Op::Binary { op, auto_broadcast } => {
            ctx.expect_inputs(2..=2)?;
            let element_type = ctx.merge_types(ctx.element_type(0), ctx.element_type(1))?;
            let shape = broadcast_shapes(ctx, *auto_broadcast)?;
            let element_type = if op.is_predicate() {
                ElementType::Boolean
            } else {
                element_type
            };
            single(element_type, shape)
        }
        Op::Eltwise { .. } => {
            ctx.expect_inputs(2..=2)?;
            let element_type = ctx.merge_types(ctx.element_type(0), ctx.element_type(1))?;
            single(element_type, broadcast_shapes(ctx, AutoBroadcast::Numpy)?)
        }
        Op::Convolution(conv) => {
            ctx.expect_inputs(2..=2)?;
            single(ctx.element_type(0), conv_output_shape(ctx, conv, 1)?)
        }
        Op::ConvolutionIE { conv, group } => {
            ctx.expect_inputs(2..=3)?;
            if *group == 0 {
                return Err(ctx.fail("Group must be positive"));
            }
            single(ctx.element_type(0), conv_output_shape(ctx, conv, *group)?)
        }
        Op::BinaryConvolution { conv, .. } => {
            ctx.expect_inputs(2..=2)?;
            single(ctx.element_type(0), conv_output_shape(ctx, conv, 1)?)
        }
        Op::AvgPool { pool, .. } | Op::MaxPool { pool } => {
            ctx.expect_inputs(1..=1)?;
            single(ctx.element_type(0), pool_output_shape(ctx, pool)?)
        }
        Op::FullyConnected { out_size } => {
            ctx.expect_inputs(2..=3)?;
            let mut shape = ctx.shape(0).clone();
            match shape.rank() {
                None => {}
                Some(0) => return Err(ctx.fail("FullyConnected input must have at least rank 1")),
                Some(rank) => shape.set_dim(rank - 1, *out_size),
            }
            single(ctx.element_type(0), shape)
        }
        Op::ScaleShiftIE => {
            ctx.expect_inputs(3..=3)?;
            same_as_input(ctx)
        }
        Op::PRelu => {
            ctx.expect_inputs(2..=2)?;
            same_as_input(ctx)
        }
        Op::Concat { axis } => {
            ctx.expect_inputs(1..=usize::MAX)?;
            concat_output(ctx, *axis)?
        }
        Op::Reshape { special_zero } => {
            ctx.expect_inputs(2..=2)?;
            single(ctx.element_type(0), reshape_output_shape(ctx, *special_zero)?)
        }
        Op::Transpose => {
            ctx.expect_inputs(2..=2)?;
            single(ctx.element_type(0), transpose_output_shape(ctx)?)
        }
        Op::Split { num_splits } => {
            ctx.expect_inputs(2..=2)?;
            split_output(ctx, *num_splits)?
        }
        Op::Reduce { op, keep_dims } => {
            ctx.expect_inputs(2..=2)?;
            let element_type = if op.is_logical() {
                ElementType::Boolean
            } else {
                ctx.element_type(0)
            };
            single(element_type, reduce_output_shape(ctx, *keep_dims)?)
        }
        Op::ShapeOf { output_type } => {
            ctx.expect_inputs(1..=1)?;
            if !matches!(output_type, ElementType::I32 | ElementType::I64) {
                return Err(ctx.fail(format!("ShapeOf output type must be i32 or i64, got {}", output_type)));
            }
            let dim = match ctx.shape(0).rank() {
                Some(rank) => Dimension::fixed(rank),
                None => Dimension::DYNAMIC,
            };
            single(*output_type, PartialShape::new(vec![dim]))
        }
        Op::OneHot { axis } => {
            ctx.expect_inputs(4..=4)?;
            if !(ctx.element_type(0).is_integral() || ctx.element_type(0).is_dynamic()) {
                return Err(ctx.fail(format!("Indices must be integral, got {}", ctx.element_type(0))));
            }
            let element_type = ctx.merge_types(ctx.element_type(2), ctx.element_type(3))?;
            let depth = match ctx.constants.get(1).copied().flatten().and_then(|c| c.as_scalar()) {
                Some(depth) if depth >= 0.0 => Dimension::fixed(depth as usize),
                Some(depth) => return Err(ctx.fail(format!("Depth must be non-negative, got {}", depth))),
                None => Dimension::DYNAMIC,
            };
            single(element_type, insert_axis(ctx, ctx.shape(0), *axis, depth)?)
        }
        Op::OneHotIE {
            axis,
            depth,
            output_type,
            ..
        } => {
            ctx.expect_inputs(1..=1)?;
            single(*output_type, insert_axis(ctx, ctx.shape(0), *axis, Dimension::fixed(*depth))?)
        }
        Op::LSTMCellIE(cell) => {
            ctx.expect_inputs(5..=5)?;
            let shape = cell_output_shape(ctx, cell.hidden_size)?;
            let output = TensorType {
                element_type: ctx.element_type(0),
                shape,
            };
            vec![output.clone(), output]
        }
        Op::RNNCellIE(cell) | Op::GRUCellIE(cell) => {
            ctx.expect_inputs(4..=4)?;
            single(ctx.element_type(0), cell_output_shape(ctx, cell.hidden_size)?)
        }
        Op::FakeQuantize { levels, .. } => {
            ctx.expect_inputs(5..=5)?;
            if *levels < 2 {
                return Err(ctx.fail(format!("FakeQuantize needs at least 2 levels, got {}", levels)));
            }
            same_as_input(ctx)
        }
        Op::Generic(generic) => {
            let inferred = ctx
                .extensions
                .iter()
                .find_map(|extension| extension.infer_types(generic, ctx.inputs));
            match inferred {
                Some(result) => result?,
                None => generic.outputs.clone(),
            }
        }
    };

    Ok(result)
}

fn broadcast_shapes(ctx: &InferContext, auto_broadcast: AutoBroadcast) -> GraphResult<PartialShape> {
    let (left, right) = (ctx.shape(0), ctx.shape(1));
    let result = match auto_broadcast {
        AutoBroadcast::None => left.merge(right),
        AutoBroadcast::Numpy => left.broadcast(right),
    };
    result.ok_or_else(|| ctx.fail(format!("Incompatible shapes {} and {}", left, right)))
}

fn conv_output_shape(ctx: &InferContext, conv: &ConvAttrs, group: usize) -> GraphResult<PartialShape> {
    let data = ctx.shape(0);
    let weights = ctx.shape(1);

    let rank = match data.rank() {
        Some(rank) => rank,
        None => return Ok(PartialShape::dynamic()),
    };
    if rank < 3 {
        return Err(ctx.fail(format!("Convolution input must have rank >= 3, got {}", data)));
    }
    let spatial = rank - 2;
    if let Some(weights_rank) = weights.rank() {
        if weights_rank != rank {
            return Err(ctx.fail(format!("Weights {} do not match input {}", weights, data)));
        }
    }
    if conv.strides.len() != spatial || conv.dilations.len() != spatial {
        return Err(ctx.fail(format!(
            "Strides {:?} and dilations {:?} must have {} elements",
            conv.strides, conv.dilations, spatial
        )));
    }
    if conv.auto_pad == PadType::Explicit && (conv.pads_begin.len() != spatial || conv.pads_end.len() != spatial) {
        return Err(ctx.fail(format!(
            "Pads {:?} and {:?} must have {} elements",
            conv.pads_begin, conv.pads_end, spatial
        )));
    }

    // input channels have to match the weights
    if let (Some(channels), Some(per_group)) = (data.dim(1).get_length(), weights.dim(1).get_length()) {
        if channels != per_group * group {
            return Err(ctx.fail(format!(
                "Input channels {} do not match weights {} with group {}",
                channels, weights, group
            )));
        }
    }

    let mut dims = vec![data.dim(0), weights.dim(0)];
    for i in 0..spatial {
        let input = data.dim(2 + i).get_length();
        let kernel = weights.dim(2 + i).get_length();
        let (input, kernel) = match (input, kernel) {
            (Some(input), Some(kernel)) => (input as i64, kernel as i64),
            _ => {
                dims.push(Dimension::DYNAMIC);
                continue;
            }
        };

        let stride = conv.strides[i] as i64;
        let effective_kernel = (kernel - 1) * conv.dilations[i] as i64 + 1;
        if stride == 0 {
            return Err(ctx.fail("Strides must be positive"));
        }

        let output = match conv.auto_pad {
            PadType::SameUpper | PadType::SameLower => (input + stride - 1) / stride,
            PadType::Explicit | PadType::Valid => {
                let padded = match conv.auto_pad {
                    PadType::Explicit => input + conv.pads_begin[i] + conv.pads_end[i],
                    _ => input,
                };
                if padded < effective_kernel {
                    return Err(ctx.fail(format!(
                        "Kernel of size {} does not fit in padded input of size {} on spatial axis {}",
                        effective_kernel, padded, i
                    )));
                }
                (padded - effective_kernel) / stride + 1
            }
        };
        dims.push(Dimension::fixed(output as usize));
    }

    Ok(PartialShape::new(dims))
}

fn pool_output_shape(ctx: &InferContext, pool: &PoolAttrs) -> GraphResult<PartialShape> {
    let data = ctx.shape(0);
    let rank = match data.rank() {
        Some(rank) => rank,
        None => return Ok(PartialShape::dynamic()),
    };
    let spatial = pool.kernel.len();
    if rank != spatial + 2 {
        return Err(ctx.fail(format!("Kernel {:?} does not match input {}", pool.kernel, data)));
    }
    if pool.strides.len() != spatial {
        return Err(ctx.fail(format!("Strides {:?} must have {} elements", pool.strides, spatial)));
    }
    if pool.auto_pad == PadType::Explicit && (pool.pads_begin.len() != spatial || pool.pads_end.len() != spatial) {
        return Err(ctx.fail(format!(
            "Pads {:?} and {:?} must have {} elements",
            pool.pads_begin, pool.pads_end, spatial
        )));
    }

    let mut dims = vec![data.dim(0), data.dim(1)];
    for i in 0..spatial {
        let input = match data.dim(2 + i).get_length() {
            Some(input) => input,
            None => {
                dims.push(Dimension::DYNAMIC);
                continue;
            }
        };
        let kernel = pool.kernel[i];
        let stride = pool.strides[i];
        if stride == 0 {
            return Err(ctx.fail("Strides must be positive"));
        }

        let div = |num: usize| match pool.rounding_type {
            RoundingType::Floor => num / stride,
            RoundingType::Ceil => (num + stride - 1) / stride,
        };

        let output = match pool.auto_pad {
            PadType::SameUpper | PadType::SameLower => (input + stride - 1) / stride,
            PadType::Explicit | PadType::Valid => {
                let padded = match pool.auto_pad {
                    PadType::Explicit => input + pool.pads_begin[i] + pool.pads_end[i],
                    _ => input,
                };
                if padded < kernel {
                    return Err(ctx.fail(format!(
                        "Kernel of size {} does not fit in padded input of size {} on spatial axis {}",
                        kernel, padded, i
                    )));
                }
                div(padded - kernel) + 1
            }
        };
        dims.push(Dimension::fixed(output));
    }

    Ok(PartialShape::new(dims))
}

fn concat_output(ctx: &InferContext, axis: i64) -> GraphResult<Vec<TensorType>> {
    let mut element_type = ElementType::Dynamic;
    for input in ctx.inputs {
        element_type = ctx.merge_types(element_type, input.element_type)?;
    }

    let rank = match ctx.inputs.iter().find_map(|input| input.shape.rank()) {
        Some(rank) => rank,
        None => return Ok(single(element_type, PartialShape::dynamic())),
    };
    let axis = normalize_axis(axis, rank).ok_or_else(|| ctx.fail(format!("Axis {} out of range for rank {}", axis, rank)))?;

    let mut dims = vec![Dimension::DYNAMIC; rank];
    let mut concat_length = Some(0);

    for input in ctx.inputs {
        let input_dims = match input.shape.dims() {
            Some(input_dims) => input_dims,
            None => {
                concat_length = None;
                continue;
            }
        };
        if input_dims.len() != rank {
            return Err(ctx.fail(format!("Concat inputs must have the same rank, got {}", input.shape)));
        }

        for (i, &dim) in input_dims.iter().enumerate() {
            if i == axis {
                concat_length = concat_length.zip(dim.get_length()).map(|(a, b)| a + b);
            } else {
                dims[i] = dims[i]
                    .merge(dim)
                    .ok_or_else(|| ctx.fail(format!("Concat inputs mismatch on axis {}: {}", i, input.shape)))?;
            }
        }
    }

    dims[axis] = concat_length.map_or(Dimension::DYNAMIC, Dimension::fixed);
    Ok(single(element_type, PartialShape::new(dims)))
}

fn reshape_output_shape(ctx: &InferContext, special_zero: bool) -> GraphResult<PartialShape> {
    let data = ctx.shape(0);
    let pattern = match ctx.const_ints(1) {
        Some(pattern) => pattern,
        None => {
            return Ok(match ctx.shape(1).to_shape().as_deref() {
                Some(&[rank]) => PartialShape::dynamic_of_rank(rank),
                _ => PartialShape::dynamic(),
            });
        }
    };

    let mut dims = vec![];
    let mut infer_index = None;
    for (i, &p) in pattern.iter().enumerate() {
        let dim = match p {
            -1 => {
                if infer_index.replace(i).is_some() {
                    return Err(ctx.fail(format!("Pattern {:?} has more than one -1", pattern)));
                }
                Dimension::DYNAMIC
            }
            0 if special_zero => match data.rank() {
                Some(rank) if i < rank => data.dim(i),
                Some(_) => return Err(ctx.fail(format!("Pattern {:?} copies a missing input axis {}", pattern, i))),
                None => Dimension::DYNAMIC,
            },
            p if p >= 0 => Dimension::fixed(p as usize),
            p => return Err(ctx.fail(format!("Invalid pattern value {}", p))),
        };
        dims.push(dim);
    }

    let input_size: Option<usize> = data.to_shape().map(|s| s.iter().product());
    let known_product: Option<usize> = dims
        .iter()
        .enumerate()
        .filter(|&(i, _)| Some(i) != infer_index)
        .map(|(_, d)| d.get_length())
        .product();

    match (infer_index, input_size, known_product) {
        (Some(index), Some(input_size), Some(known_product)) => {
            if known_product == 0 || input_size % known_product != 0 {
                return Err(ctx.fail(format!("Cannot reshape {} into pattern {:?}", data, pattern)));
            }
            dims[index] = Dimension::fixed(input_size / known_product);
        }
        (None, Some(input_size), Some(known_product)) => {
            if input_size != known_product {
                return Err(ctx.fail(format!("Cannot reshape {} into pattern {:?}", data, pattern)));
            }
        }
        _ => {}
    }

    Ok(PartialShape::new(dims))
}

fn transpose_output_shape(ctx: &InferContext) -> GraphResult<PartialShape> {
    let data = ctx.shape(0);
    let rank = data.rank();

    let order = match ctx.const_ints(1) {
        Some(order) => order,
        None => return Ok(rank.map_or(PartialShape::dynamic(), PartialShape::dynamic_of_rank)),
    };

    let dims = match data.dims() {
        Some(dims) => dims,
        None => return Ok(PartialShape::dynamic_of_rank(order.len())),
    };

    if order.is_empty() {
        return Ok(PartialShape::new(dims.iter().rev().copied().collect_vec()));
    }

    let is_permutation = order.len() == dims.len()
        && order.iter().all(|&o| o >= 0 && (o as usize) < dims.len())
        && order.iter().all_unique();
    if !is_permutation {
        return Err(ctx.fail(format!("Order {:?} is not a permutation for {}", order, data)));
    }

    Ok(PartialShape::new(order.iter().map(|&o| dims[o as usize]).collect_vec()))
}

fn split_output(ctx: &InferContext, num_splits: usize) -> GraphResult<Vec<TensorType>> {
    if num_splits == 0 {
        return Err(ctx.fail("Split needs at least one output"));
    }
    let data = ctx.shape(0);
    let element_type = ctx.element_type(0);

    let shape = match (data.rank(), ctx.const_ints(1)) {
        (None, _) => PartialShape::dynamic(),
        (Some(rank), None) => PartialShape::dynamic_of_rank(rank),
        (Some(rank), Some(axis)) => {
            let axis = match axis.as_slice() {
                &[axis] => axis,
                _ => return Err(ctx.fail(format!("Split axis must be a scalar, got {:?}", axis))),
            };
            let axis = normalize_axis(axis, rank).ok_or_else(|| ctx.fail(format!("Axis {} out of range", axis)))?;

            let mut shape = data.clone();
            if let Some(length) = data.dim(axis).get_length() {
                if length % num_splits != 0 {
                    return Err(ctx.fail(format!("Cannot split axis of length {} into {} parts", length, num_splits)));
                }
                shape.set_dim(axis, length / num_splits);
            }
            shape
        }
    };

    Ok(vec![TensorType { element_type, shape }; num_splits])
}

fn reduce_output_shape(ctx: &InferContext, keep_dims: bool) -> GraphResult<PartialShape> {
    let data = ctx.shape(0);
    let (dims, axes) = match (data.dims(), ctx.const_ints(1)) {
        (Some(dims), Some(axes)) => (dims, axes),
        (Some(dims), None) if keep_dims => return Ok(PartialShape::dynamic_of_rank(dims.len())),
        _ => return Ok(PartialShape::dynamic()),
    };

    let axes = axes
        .iter()
        .map(|&axis| normalize_axis(axis, dims.len()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ctx.fail(format!("Reduction axes {:?} out of range for {}", axes, data)))?;

    let result = dims
        .iter()
        .enumerate()
        .filter_map(|(i, &d)| match (axes.contains(&i), keep_dims) {
            (false, _) => Some(d),
            (true, true) => Some(Dimension::fixed(1)),
            (true, false) => None,
        })
        .collect_vec();
    Ok(PartialShape::new(result))
}

fn insert_axis(ctx: &InferContext, shape: &PartialShape, axis: i64, dim: Dimension) -> GraphResult<PartialShape> {
    let dims = match shape.dims() {
        Some(dims) => dims,
        None => return Ok(PartialShape::dynamic()),
    };
    let axis = normalize_axis(axis, dims.len() + 1)
        .ok_or_else(|| ctx.fail(format!("Axis {} out of range for {}", axis, shape)))?;
    let mut result = dims.to_vec();
    result.insert(axis, dim);
    Ok(PartialShape::new(result))
}

fn cell_output_shape(ctx: &InferContext, hidden_size: usize) -> GraphResult<PartialShape> {
    let x = ctx.shape(0);
    let h = ctx.shape(1);
    for shape in [x, h] {
        if let Some(rank) = shape.rank() {
            if rank != 2 {
                return Err(ctx.fail(format!("Cell inputs must have rank 2, got {}", shape)));
            }
        }
    }
    if let Some(length) = h.dim(1).get_length() {
        if length != hidden_size {
            return Err(ctx.fail(format!("Hidden state {} does not match hidden size {}", h, hidden_size)));
        }
    }
    let batch = x
        .dim(0)
        .merge(h.dim(0))
        .ok_or_else(|| ctx.fail(format!("Batch of {} and {} mismatch", x, h)))?;
    Ok(PartialShape::new(vec![batch, Dimension::fixed(hidden_size)]))
}
