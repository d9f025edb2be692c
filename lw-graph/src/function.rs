use std::fmt::{Debug, Display, Formatter};
use std::ops::Index;
use std::sync::Arc;

use itertools::Itertools;
use rand::random;
use tracing::trace;

use crate::attribute::RtInfo;
use crate::element::ElementType;
use crate::error::{GraphError, GraphResult, NodeDesc};
use crate::extension::Extension;
use crate::infer::{infer_types, InferContext};
use crate::op::{ConstantData, Op, TensorType};
use crate::shape::PartialShape;

/// A dataflow graph of versioned ops.
///
/// Nodes are stored in an append-only arena, ids stay valid for the lifetime of the function and its clones.
/// Rewrites don't delete nodes, they reroute the uses of outputs instead,
/// nodes that are no longer reachable from a result or a sink are simply skipped by [Function::ops].
///
/// This type implements `Index<NodeId>`, so `function[id]` gives access to the [Node].
///
/// ```
/// # use lw_graph::function::*;
/// # use lw_graph::element::ElementType;
/// # use lw_graph::shape;
/// let mut function = Function::new("example");
/// let x = function.parameter("x", ElementType::F32, shape![1, 3, 8, 8]);
/// let y = function.relu(x);
/// function.result(y);
///
/// assert_eq!(function.ops().len(), 3);
/// println!("{}", function);
/// ```
#[derive(Clone)]
pub struct Function {
    check: u32,
    name: String,
    nodes: Vec<Node>,
    parameters: Vec<NodeId>,
    results: Vec<NodeId>,
    sinks: Vec<NodeId>,
    extensions: Vec<Arc<dyn Extension>>,
}

/// A node in a [Function].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct NodeId {
    index: usize,
    check: u32,
}

/// An output port of a node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Output {
    pub node: NodeId,
    pub index: usize,
}

/// An input port of a node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Input {
    pub node: NodeId,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct Node {
    friendly_name: String,
    op: Op,
    inputs: Vec<Output>,
    outputs: Vec<TensorType>,
    rt_info: RtInfo,
}

/// The consuming input ports of every live output in a function, see [Function::consumers].
#[derive(Debug, Clone)]
pub struct Consumers {
    check: u32,
    ports: Vec<Vec<Vec<Input>>>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Function {
            check: random(),
            name: name.into(),
            nodes: vec![],
            parameters: vec![],
            results: vec![],
            sinks: vec![],
            extensions: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    pub fn results(&self) -> &[NodeId] {
        &self.results
    }

    /// Nodes that must be kept alive even though they are not results, currently the state writes.
    pub fn sinks(&self) -> &[NodeId] {
        &self.sinks
    }

    pub fn extensions(&self) -> &[Arc<dyn Extension>] {
        &self.extensions
    }

    pub fn add_extension(&mut self, extension: Arc<dyn Extension>) {
        self.extensions.push(extension);
    }

    fn check_contains(&self, node: NodeId) {
        assert_eq!(
            node.check, self.check,
            "Node {:?} does not belong to this function",
            node
        );
        assert!(node.index < self.nodes.len());
    }

    fn id(&self, index: usize) -> NodeId {
        NodeId {
            index,
            check: self.check,
        }
    }

    /// The output port `index` of `node`.
    pub fn output(&self, node: NodeId, index: usize) -> GraphResult<Output> {
        let info = &self[node];
        if index < info.outputs.len() {
            Ok(Output { node, index })
        } else {
            Err(GraphError::InvalidOutput {
                node: info.desc(),
                index,
            })
        }
    }

    pub fn output_type(&self, output: Output) -> &TensorType {
        &self[output.node].outputs[output.index]
    }

    /// The value flowing through `output`, if it is produced by a constant.
    pub fn constant_value(&self, output: Output) -> Option<&ConstantData> {
        match &self[output.node].op {
            Op::Constant { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Add a node, inferring its output types immediately.
    pub fn try_add_node(&mut self, op: Op, inputs: Vec<Output>) -> GraphResult<NodeId> {
        let index = self.nodes.len();
        let friendly_name = format!("{}_{}", op.type_name(), index);

        for input in &inputs {
            self.check_contains(input.node);
            self.output(input.node, input.index)?;
        }

        let outputs = self.infer_node(&friendly_name, &op, &inputs)?;
        let id = self.id(index);

        match op {
            Op::Parameter { .. } => self.parameters.push(id),
            Op::Result => self.results.push(id),
            Op::Assign { .. } => self.sinks.push(id),
            _ => {}
        }

        self.nodes.push(Node {
            friendly_name,
            op,
            inputs,
            outputs,
            rt_info: RtInfo::new(),
        });
        Ok(id)
    }

    /// Add a node, inferring its output types immediately.
    ///
    /// # Panics
    /// If the inputs are not valid for `op`, use [Function::try_add_node] to handle that case.
    pub fn add_node(&mut self, op: Op, inputs: Vec<Output>) -> NodeId {
        match self.try_add_node(op, inputs) {
            Ok(id) => id,
            Err(e) => panic!("{}", e),
        }
    }

    fn infer_node(&self, name: &str, op: &Op, inputs: &[Output]) -> GraphResult<Vec<TensorType>> {
        let input_types = inputs.iter().map(|&i| self.output_type(i).clone()).collect_vec();
        let constants = inputs.iter().map(|&i| self.constant_value(i)).collect_vec();

        let ctx = InferContext {
            node: NodeDesc::new(name, op.type_name()),
            inputs: &input_types,
            constants: &constants,
            extensions: &self.extensions,
        };
        infer_types(op, &ctx)
    }

    pub fn set_friendly_name(&mut self, node: NodeId, name: impl Into<String>) {
        self.check_contains(node);
        self.nodes[node.index].friendly_name = name.into();
    }

    pub fn rt_info_mut(&mut self, node: NodeId) -> &mut RtInfo {
        self.check_contains(node);
        &mut self.nodes[node.index].rt_info
    }

    /// Replace parameter `index` by a new parameter with the given type and shape, keeping its friendly name.
    /// Downstream types are only updated by [Function::validate_nodes_and_infer_types].
    pub fn replace_parameter(&mut self, index: usize, element_type: ElementType, shape: PartialShape) -> GraphResult<()> {
        let node = *self.parameters.get(index).ok_or(GraphError::InvalidParameter {
            index,
            count: self.parameters.len(),
        })?;

        let node = &mut self.nodes[node.index];
        trace!("Replacing parameter {} {} with {}", node.friendly_name, node.outputs[0].shape, shape);
        node.op = Op::Parameter {
            element_type,
            shape: shape.clone(),
        };
        node.outputs = vec![TensorType { element_type, shape }];
        Ok(())
    }

    /// Turn `node` into a constant with the given value, dropping its inputs.
    pub fn replace_with_constant(&mut self, node: NodeId, element_type: ElementType, data: ConstantData) {
        self.check_contains(node);
        assert!(
            !self.parameters.contains(&node) && !self.results.contains(&node) && !self.sinks.contains(&node),
            "Cannot turn {:?} into a constant",
            node
        );

        let node = &mut self.nodes[node.index];
        node.outputs = vec![TensorType {
            element_type,
            shape: PartialShape::fixed(data.shape()),
        }];
        node.inputs = vec![];
        node.op = Op::Constant { element_type, data };
    }

    /// Make every input that uses `old` use `new` instead, except for inputs of the node producing `new`.
    pub fn replace_output_uses(&mut self, old: Output, new: Output) {
        self.check_contains(old.node);
        self.check_contains(new.node);

        for (index, node) in self.nodes.iter_mut().enumerate() {
            if index == new.node.index {
                continue;
            }
            for input in &mut node.inputs {
                if *input == old {
                    *input = new;
                }
            }
        }
    }

    /// Re-run type inference for all live nodes in topological order.
    pub fn validate_nodes_and_infer_types(&mut self) -> GraphResult<()> {
        for node in self.ordered_ops() {
            let info = &self.nodes[node.index];
            let outputs = self.infer_node(&info.friendly_name, &info.op, &info.inputs)?;
            self.nodes[node.index].outputs = outputs;
        }
        Ok(())
    }

    fn live_mask(&self) -> Vec<bool> {
        let mut live = vec![false; self.nodes.len()];
        let mut todo = self
            .results
            .iter()
            .chain(&self.sinks)
            .chain(&self.parameters)
            .map(|n| n.index)
            .collect_vec();

        while let Some(index) = todo.pop() {
            if live[index] {
                continue;
            }
            live[index] = true;
            todo.extend(self.nodes[index].inputs.iter().map(|i| i.node.index));
        }

        live
    }

    /// All live nodes, in the order they were declared.
    pub fn ops(&self) -> Vec<NodeId> {
        let live = self.live_mask();
        (0..self.nodes.len()).filter(|&i| live[i]).map(|i| self.id(i)).collect()
    }

    /// All live nodes, ordered such that every node comes after the producers of its inputs.
    pub fn ordered_ops(&self) -> Vec<NodeId> {
        let live = self.live_mask();
        let mut visited = vec![false; self.nodes.len()];
        let mut order = vec![];

        for start in 0..self.nodes.len() {
            if !live[start] || visited[start] {
                continue;
            }

            let mut stack = vec![(start, false)];
            while let Some((index, expanded)) = stack.pop() {
                if expanded {
                    order.push(self.id(index));
                    continue;
                }
                if visited[index] {
                    continue;
                }
                visited[index] = true;

                stack.push((index, true));
                for input in self.nodes[index].inputs.iter().rev() {
                    if !visited[input.node.index] {
                        stack.push((input.node.index, false));
                    }
                }
            }
        }

        order
    }

    /// Enumerate the consuming input ports of every output of every live node.
    pub fn consumers(&self) -> Consumers {
        let mut ports = self.nodes.iter().map(|n| vec![vec![]; n.outputs.len()]).collect_vec();

        for node in self.ops() {
            for (index, input) in self.nodes[node.index].inputs.iter().enumerate() {
                ports[input.node.index][input.index].push(Input { node, index });
            }
        }

        Consumers {
            check: self.check,
            ports,
        }
    }

    /// Find the live node with the given friendly name.
    pub fn find_node(&self, friendly_name: &str) -> Option<NodeId> {
        self.ops().into_iter().find(|&n| self[n].friendly_name == friendly_name)
    }

    pub fn has_op(&self, type_name: &str) -> bool {
        self.ops().iter().any(|&n| self[n].op.type_name() == type_name)
    }
}

impl Node {
    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn type_name(&self) -> &str {
        self.op.type_name()
    }

    pub fn inputs(&self) -> &[Output] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TensorType] {
        &self.outputs
    }

    pub fn rt_info(&self) -> &RtInfo {
        &self.rt_info
    }

    pub fn desc(&self) -> NodeDesc {
        NodeDesc::new(&self.friendly_name, self.op.type_name())
    }
}

impl Consumers {
    pub fn of(&self, output: Output) -> &[Input] {
        assert_eq!(output.node.check, self.check, "Output {:?} does not belong to this function", output);
        &self.ports[output.node.index][output.index]
    }

    /// The consumers of all outputs of `node`.
    pub fn of_node(&self, node: NodeId) -> impl Iterator<Item = &Input> {
        assert_eq!(node.check, self.check, "Node {:?} does not belong to this function", node);
        self.ports[node.index].iter().flatten()
    }
}

impl From<NodeId> for Output {
    fn from(node: NodeId) -> Self {
        Output { node, index: 0 }
    }
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }
}

impl Index<NodeId> for Function {
    type Output = Node;

    fn index(&self, node: NodeId) -> &Self::Output {
        self.check_contains(node);
        &self.nodes[node.index]
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.index)
    }
}

impl Debug for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("check", &self.check)
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("parameters", &self.parameters)
            .field("results", &self.results)
            .field("sinks", &self.sinks)
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Function {:?} {{", self.name)?;
        writeln!(f, "  check: {},", self.check)?;
        writeln!(f, "  parameters: {:?},", self.parameters)?;
        writeln!(f, "  results: {:?},", self.results)?;
        writeln!(f, "  sinks: {:?},", self.sinks)?;

        writeln!(f, "  nodes: [")?;
        for node in self.ops() {
            let info = &self[node];
            let outputs = info.outputs.iter().map(|o| format!("{} {}", o.element_type, o.shape)).join(", ");
            writeln!(
                f,
                "    {:?} {:?} = {:?} {:?} -> [{}],",
                node, info.friendly_name, info.op, info.inputs, outputs
            )?;
        }
        writeln!(f, "  ],")?;

        writeln!(f, "}}")?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::element::ElementType;
    use crate::function::{Function, Output};
    use crate::op::Op;
    use crate::shape;

    #[test]
    fn default_names() {
        let mut function = Function::new("f");
        let x = function.parameter("x", ElementType::F32, shape![2, 3]);
        let y = function.relu(x);
        assert_eq!(function[x].friendly_name(), "x");
        assert_eq!(function[y].friendly_name(), "Relu_1");
    }

    #[test]
    fn dead_nodes_skipped() {
        let mut function = Function::new("f");
        let x = function.parameter("x", ElementType::F32, shape![2, 3]);
        let dead = function.relu(x);
        let live = function.unary(crate::op::UnaryOp::Exp, x);
        function.result(live);

        let ops = function.ops();
        assert!(!ops.contains(&dead));
        assert_eq!(ops.len(), 3);
        assert!(function.consumers().of(Output::from(x)).iter().all(|i| i.node != dead));
    }

    #[test]
    fn ordered_after_rewire() {
        let mut function = Function::new("f");
        let x = function.parameter("x", ElementType::F32, shape![4]);
        let a = function.relu(x);
        let r = function.result(a);

        // a new node created late is used by an earlier one
        let b = function.add_node(Op::Convert { destination_type: ElementType::F16 }, vec![x.into()]);
        function.replace_output_uses(a.into(), b.into());

        let order = function.ordered_ops();
        let pos = |n| order.iter().position(|&o| o == n).unwrap();
        assert!(pos(x) < pos(b));
        assert!(pos(b) < pos(r));
        assert!(!order.contains(&a));

        function.validate_nodes_and_infer_types().unwrap();
        assert_eq!(function[r].outputs()[0].element_type, ElementType::F16);
    }

    #[test]
    fn replace_parameter_keeps_name() {
        let mut function = Function::new("f");
        let x = function.parameter("data", ElementType::F32, shape![1, 4]);
        let y = function.relu(x);
        function.result(y);

        function.replace_parameter(0, ElementType::F32, shape![8, 4]).unwrap();
        function.validate_nodes_and_infer_types().unwrap();

        assert_eq!(function[x].friendly_name(), "data");
        assert_eq!(function[y].outputs()[0].shape, shape![8, 4]);
        assert!(function.replace_parameter(1, ElementType::F32, shape![1]).is_err());
    }
}
