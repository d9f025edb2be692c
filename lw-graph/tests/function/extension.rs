use std::sync::Arc;

use indexmap::IndexMap;

use lw_graph::attribute::AttrValue;
use lw_graph::element::ElementType;
use lw_graph::error::GraphResult;
use lw_graph::extension::Extension;
use lw_graph::function::Function;
use lw_graph::op::{GenericOp, TensorType};
use lw_graph::shape;
use lw_graph::shape::PartialShape;

/// Provides `Duplicate`, which concatenates its input with itself along axis 0.
#[derive(Debug)]
struct DuplicateExtension;

impl Extension for DuplicateExtension {
    fn name(&self) -> &str {
        "duplicate"
    }

    fn infer_types(&self, op: &GenericOp, inputs: &[TensorType]) -> Option<GraphResult<Vec<TensorType>>> {
        if op.type_name != "Duplicate" {
            return None;
        }

        let input = &inputs[0];
        let mut shape = input.shape.clone();
        if let Some(length) = shape.dim(0).get_length() {
            shape.set_dim(0, length * 2);
        }
        Some(Ok(vec![TensorType {
            element_type: input.element_type,
            shape,
        }]))
    }
}

#[test]
fn extension_infers_generic() {
    let mut function = Function::new("ext");
    function.add_extension(Arc::new(DuplicateExtension));

    let x = function.parameter("x", ElementType::F32, shape![3, 2]);
    let mut attrs = IndexMap::new();
    attrs.insert("mode".to_owned(), AttrValue::String("Copy".to_owned()));
    let y = function.generic("Duplicate", &[x.into()], attrs, vec![]);
    let result = function.result(y);

    assert_eq!(function[result].outputs()[0].shape, shape![6, 2]);

    function.replace_parameter(0, ElementType::F32, shape![5, 2]).unwrap();
    function.validate_nodes_and_infer_types().unwrap();
    assert_eq!(function[result].outputs()[0].shape, shape![10, 2]);
}

#[test]
fn declared_outputs_without_extension() {
    let mut function = Function::new("ext");
    let x = function.parameter("x", ElementType::F32, shape![3, 2]);
    let declared = TensorType {
        element_type: ElementType::I32,
        shape: PartialShape::dynamic(),
    };
    let y = function.generic("Mystery", &[x.into()], IndexMap::new(), vec![declared.clone()]);
    assert_eq!(function[y].outputs(), &[declared]);
}
