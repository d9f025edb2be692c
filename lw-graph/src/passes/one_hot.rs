use tracing::{instrument, trace};

use crate::element::ElementType;
use crate::error::GraphResult;
use crate::function::{Function, Output};
use crate::op::Op;
use crate::passes::GraphRewrite;

/// Replace `OneHot` ops with constant depth and values by `OneHotIE`.
///
/// `OneHotIE` produces `f16` if the function has any `f16` parameter and `f32` otherwise,
/// a `Convert` back to the original type is inserted when that differs.
#[derive(Debug, Default, Copy, Clone)]
pub struct ConvertOneHotToOneHotIE;

impl GraphRewrite for ConvertOneHotToOneHotIE {
    fn name(&self) -> &'static str {
        "ConvertOneHotToOneHotIE"
    }

    #[instrument(name = "ConvertOneHotToOneHotIE", skip_all, level = "debug")]
    fn run_on_function(&self, function: &mut Function) -> GraphResult<bool> {
        let is_f16 = function
            .parameters()
            .iter()
            .any(|&p| function[p].outputs()[0].element_type == ElementType::F16);
        let float_type = if is_f16 { ElementType::F16 } else { ElementType::F32 };

        let mut changed = false;

        for node in function.ops() {
            let info = &function[node];
            let axis = match info.op() {
                &Op::OneHot { axis } => axis,
                _ => continue,
            };

            let inputs = info.inputs().to_vec();
            let scalar = |index: usize| function.constant_value(inputs[index]).and_then(|c| c.as_scalar());
            let (depth, on_value, off_value) = match (scalar(1), scalar(2), scalar(3)) {
                (Some(depth), Some(on_value), Some(off_value)) => (depth, on_value, off_value),
                _ => continue,
            };

            let name = info.friendly_name().to_owned();
            let rt_info = info.rt_info().clone();
            let original_type = info.outputs()[0].element_type;

            let one_hot_ie = Op::OneHotIE {
                axis,
                depth: depth as usize,
                on_value: on_value as f32,
                off_value: off_value as f32,
                output_type: float_type,
            };
            let one_hot_ie = function.try_add_node(one_hot_ie, vec![inputs[0]])?;
            *function.rt_info_mut(one_hot_ie) = rt_info.clone();

            let replacement = if original_type == float_type {
                function.set_friendly_name(one_hot_ie, name);
                one_hot_ie
            } else {
                function.set_friendly_name(one_hot_ie, format!("{}/FloatOutput_", name));
                let convert = Op::Convert {
                    destination_type: original_type,
                };
                let convert = function.try_add_node(convert, vec![one_hot_ie.into()])?;
                function.set_friendly_name(convert, name);
                *function.rt_info_mut(convert) = rt_info;
                convert
            };

            trace!("Replaced OneHot {:?} with {:?}", node, replacement);
            function.replace_output_uses(Output::from(node), replacement.into());
            changed = true;
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod test {
    use crate::element::ElementType;
    use crate::function::Function;
    use crate::op::Op;
    use crate::passes::{ConvertOneHotToOneHotIE, GraphRewrite};
    use crate::shape;

    #[test]
    fn lower_float_one_hot() {
        let mut function = Function::new("f");
        let indices = function.parameter("indices", ElementType::I64, shape![4]);
        let one_hot = function.one_hot(indices, 10, 1.0, 0.0, -1);
        function.set_friendly_name(one_hot, "one_hot");
        let result = function.result(one_hot);

        assert!(ConvertOneHotToOneHotIE.run_on_function(&mut function).unwrap());
        function.validate_nodes_and_infer_types().unwrap();

        let producer = function[result].inputs()[0].node;
        assert_eq!(function[producer].friendly_name(), "one_hot");
        assert!(matches!(function[producer].op(), Op::OneHotIE { depth: 10, .. }));
        assert_eq!(function[result].outputs()[0].shape, shape![4, 10]);
        assert!(!function.has_op("OneHot"));
    }

    #[test]
    fn lower_integer_one_hot_adds_convert() {
        let mut function = Function::new("f");
        let indices = function.parameter("indices", ElementType::I32, shape![3]);
        let depth = function.constant_scalar_int(5);
        let on = function.constant(ElementType::I32, &[], vec![1.0]);
        let off = function.constant(ElementType::I32, &[], vec![0.0]);
        let one_hot = function.add_node(
            Op::OneHot { axis: 0 },
            vec![indices.into(), depth.into(), on.into(), off.into()],
        );
        function.set_friendly_name(one_hot, "one_hot");
        let result = function.result(one_hot);

        ConvertOneHotToOneHotIE.run_on_function(&mut function).unwrap();
        function.validate_nodes_and_infer_types().unwrap();

        let convert = function[result].inputs()[0].node;
        assert_eq!(function[convert].friendly_name(), "one_hot");
        assert_eq!(function[convert].type_name(), "Convert");
        assert_eq!(function[result].outputs()[0].element_type, ElementType::I32);
        assert_eq!(function[result].outputs()[0].shape, shape![5, 3]);
    }
}
