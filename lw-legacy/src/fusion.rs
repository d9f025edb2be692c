use lw_graph::function::{Consumers, Function, NodeId, Output};
use lw_graph::op::Op;

/// Which inputs of a consumer absorb constants as embedded weights.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConstantFusion {
    /// Constants stay separate layers.
    Never,
    /// Constants on input `index` and later are fused.
    FromInput(usize),
    /// Like [ConstantFusion::FromInput], unless constant inputs are kept.
    FromInputUnlessKept(usize),
}

/// The fusion behaviour of a consumer, by op type name.
pub fn constant_fusion(type_name: &str) -> ConstantFusion {
    match type_name {
        "ConvolutionIE" | "FullyConnected" => ConstantFusion::FromInputUnlessKept(1),
        "BinaryConvolution" | "DeconvolutionIE" | "Elu" | "NormalizeIE" | "PRelu" | "Split" | "VariadicSplit"
        | "ScaleShiftIE" | "Transpose" => ConstantFusion::FromInput(1),
        "DeformableConvolution" | "GRUCellIE" | "RNNCellIE" => ConstantFusion::FromInput(2),
        "LSTMCellIE" => ConstantFusion::FromInput(3),
        _ => ConstantFusion::Never,
    }
}

/// Decides which nodes are folded into other layers instead of becoming layers themselves.
///
/// Slot counting, layer creation and wiring must all go through this one type so they can't disagree.
#[derive(Debug)]
pub struct FusionPolicy<'a> {
    function: &'a Function,
    consumers: Consumers,
    keep_constants: bool,
}

impl<'a> FusionPolicy<'a> {
    /// Constants are always kept when the function contains a `FakeQuantize`.
    pub fn new(function: &'a Function, keep_constant_inputs: bool) -> Self {
        FusionPolicy {
            function,
            consumers: function.consumers(),
            keep_constants: keep_constant_inputs || function.has_op("FakeQuantize"),
        }
    }

    pub fn consumers(&self) -> &Consumers {
        &self.consumers
    }

    /// Whether the constant `node` is fused into `consumer`, which is the case if it feeds any
    /// of the inputs from the fusion cutoff of `consumer` onwards.
    pub fn is_internal_const(&self, node: NodeId, consumer: NodeId) -> bool {
        if !self.function[node].op().is_constant() {
            return false;
        }

        let info = &self.function[consumer];
        let first = match constant_fusion(info.type_name()) {
            ConstantFusion::Never => return false,
            ConstantFusion::FromInputUnlessKept(_) if self.keep_constants => return false,
            ConstantFusion::FromInput(first) | ConstantFusion::FromInputUnlessKept(first) => first,
        };
        info.inputs().iter().skip(first).any(|input| input.node == node)
    }

    /// Whether `node` gets no layer of its own.
    ///
    /// Results are always internal, constants are internal if every consumer fuses them.
    pub fn is_internal_node(&self, node: NodeId) -> bool {
        match self.function[node].op() {
            Op::Result => true,
            Op::Constant { .. } => self
                .consumers
                .of_node(node)
                .all(|input| self.is_internal_const(node, input.node)),
            _ => false,
        }
    }

    /// Whether the edge from `input` into `consumer` is skipped when wiring layers.
    pub fn is_skipped_edge(&self, input: Output, consumer: NodeId) -> bool {
        self.is_internal_const(input.node, consumer)
    }

    /// The number of input slots the layer of `node` gets.
    pub fn input_slot_count(&self, node: NodeId) -> usize {
        let info = &self.function[node];
        if matches!(info.op(), Op::ReadValue { .. }) {
            return 0;
        }
        info.inputs()
            .iter()
            .filter(|&&input| !self.is_skipped_edge(input, node))
            .count()
    }
}

#[cfg(test)]
mod test {
    use lw_graph::element::ElementType;
    use lw_graph::function::Function;
    use lw_graph::op::{CellAttrs, ConvAttrs};
    use lw_graph::shape;

    use crate::fusion::FusionPolicy;

    #[test]
    fn conv_weights_internal() {
        let mut function = Function::new("f");
        let x = function.parameter("x", ElementType::F32, shape![1, 3, 8, 8]);
        let w = function.constant_f32(&[4, 3, 3, 3], vec![0.0; 4 * 3 * 3 * 3]);
        let b = function.constant_f32(&[4], vec![0.0; 4]);
        let conv = function.convolution_ie(x, w, Some(b.into()), ConvAttrs::simple(2, 1, 1), 1);
        function.result(conv);

        let policy = FusionPolicy::new(&function, false);
        assert!(policy.is_internal_node(w));
        assert!(policy.is_internal_node(b));
        assert!(!policy.is_internal_node(x));
        assert_eq!(policy.input_slot_count(conv), 1);

        let policy = FusionPolicy::new(&function, true);
        assert!(!policy.is_internal_node(w));
        assert_eq!(policy.input_slot_count(conv), 3);
    }

    #[test]
    fn shared_constant_not_internal() {
        let mut function = Function::new("f");
        let x = function.parameter("x", ElementType::F32, shape![1, 4]);
        let slope = function.constant_f32(&[4], vec![0.1; 4]);
        let prelu = function.prelu(x, slope);
        let add = function.add(prelu, slope);
        function.result(add);

        let policy = FusionPolicy::new(&function, false);
        assert!(!policy.is_internal_node(slope));
        assert_eq!(policy.input_slot_count(prelu), 1);
        assert_eq!(policy.input_slot_count(add), 2);
    }

    #[test]
    fn cell_cutoffs() {
        let mut function = Function::new("f");
        let x = function.parameter("x", ElementType::F32, shape![2, 8]);
        let h = function.constant_f32(&[2, 4], vec![0.0; 8]);
        let c = function.constant_f32(&[2, 4], vec![0.0; 8]);
        let w = function.constant_f32(&[16, 12], vec![0.0; 16 * 12]);
        let b = function.constant_f32(&[16], vec![0.0; 16]);
        let lstm = function.lstm_cell_ie(
            [x.into(), h.into(), c.into(), w.into(), b.into()],
            CellAttrs::new(4, &["sigmoid", "tanh", "tanh"]),
        );
        function.result(lstm);

        let policy = FusionPolicy::new(&function, false);
        assert!(!policy.is_internal_node(h));
        assert!(!policy.is_internal_node(c));
        assert!(policy.is_internal_node(w));
        assert!(policy.is_internal_node(b));
        assert_eq!(policy.input_slot_count(lstm), 3);
    }

    #[test]
    fn fake_quantize_keeps_constants() {
        let mut function = Function::new("f");
        let x = function.parameter("x", ElementType::F32, shape![1, 4]);
        let q = function.fake_quantize(x, 0.0, 1.0, 256);
        let w = function.constant_f32(&[2, 4], vec![0.0; 8]);
        let b = function.constant_f32(&[2], vec![0.0; 2]);
        let fc = function.fully_connected(q, w, b, 2);
        function.result(fc);

        let policy = FusionPolicy::new(&function, false);
        assert!(!policy.is_internal_node(w));
        assert_eq!(policy.input_slot_count(fc), 3);
    }
}
