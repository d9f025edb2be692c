use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use indexmap::IndexMap;
use itertools::Itertools;
use lazy_static::lazy_static;
use tracing::trace;

use lw_graph::function::{Function, Node, NodeId, Output};
use lw_graph::op::ConstantData;
use lw_graph::shape::PartialShape;

use crate::error::{ConvertError, ConvertResult};
use crate::layer::{Blob, Layer, Params};
use crate::params::extract_params;
use crate::precision::Precision;

mod rules;

/// Builds the legacy layer of a single node from the node and its extracted parameters.
pub type Creator = Arc<dyn Fn(&LoweringContext, Params) -> ConvertResult<Layer> + Send + Sync>;

/// Maps op type names to layer creators.
///
/// Lookup is by exact type name. Types without a creator become a layer of the same type
/// carrying the extracted parameters.
#[derive(Clone, Default)]
pub struct LoweringRegistry {
    creators: IndexMap<String, Creator>,
}

/// The node being lowered, with accessors for the things creators typically need.
#[derive(Debug, Copy, Clone)]
pub struct LoweringContext<'a> {
    pub function: &'a Function,
    pub node: NodeId,
}

lazy_static! {
    static ref GLOBAL: LoweringRegistry = LoweringRegistry::with_default_rules();
}

/// The shared registry with the default rules.
pub fn global() -> &'static LoweringRegistry {
    &GLOBAL
}

impl LoweringRegistry {
    /// An empty registry, every op becomes a generic layer.
    pub fn new() -> Self {
        LoweringRegistry::default()
    }

    pub fn with_default_rules() -> Self {
        let mut registry = LoweringRegistry::new();
        registry.add_default_rules();
        registry
    }

    /// Register the default rules. Types that already have a creator keep it.
    pub fn add_default_rules(&mut self) {
        rules::register_default_rules(self);
    }

    /// Register `creator` for each of `types`. Types that already have a creator keep it.
    pub fn register<F>(&mut self, types: &[&str], creator: F)
    where
        F: Fn(&LoweringContext, Params) -> ConvertResult<Layer> + Send + Sync + 'static,
    {
        let creator: Creator = Arc::new(creator);
        for &type_name in types {
            self.creators
                .entry(type_name.to_owned())
                .or_insert_with(|| creator.clone());
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.creators.contains_key(type_name)
    }

    /// Build the layer for `node`. Its slots are left empty, the converter sizes and wires them.
    pub fn create(&self, function: &Function, node: NodeId) -> ConvertResult<Layer> {
        let ctx = LoweringContext { function, node };
        let params = extract_params(ctx.info().op())?;

        match self.creators.get(ctx.type_name()) {
            Some(creator) => creator(&ctx, params),
            None => {
                trace!("No creator for {}, using a generic layer", ctx.type_name());
                let mut layer = ctx.layer(ctx.type_name())?;
                layer.params = params;
                Ok(layer)
            }
        }
    }
}

impl<'a> LoweringContext<'a> {
    pub fn info(&self) -> &'a Node {
        &self.function[self.node]
    }

    pub fn name(&self) -> &'a str {
        self.info().friendly_name()
    }

    pub fn type_name(&self) -> &'a str {
        self.info().type_name()
    }

    /// The precision of output 0, [Precision::Unspecified] for nodes without outputs.
    pub fn output_precision(&self) -> ConvertResult<Precision> {
        match self.info().outputs().first() {
            None => Ok(Precision::Unspecified),
            Some(output) => {
                Precision::from_element_type(output.element_type)
                    .ok_or(ConvertError::UnsupportedPrecision(output.element_type))
            }
        }
    }

    /// An empty layer named after the node, with the precision of its first output.
    pub fn layer(&self, layer_type: &str) -> ConvertResult<Layer> {
        Ok(Layer::new(self.name(), layer_type, self.output_precision()?))
    }

    pub fn input(&self, index: usize) -> Option<Output> {
        self.info().inputs().get(index).copied()
    }

    pub fn input_shape(&self, index: usize) -> Option<&'a PartialShape> {
        let input = self.input(index)?;
        Some(&self.function.output_type(input).shape)
    }

    /// The static shape of input `index`, failing for weights that are not static.
    pub fn static_weights_shape(&self, index: usize) -> ConvertResult<Vec<usize>> {
        let shape = self.input_shape(index).cloned().unwrap_or_else(PartialShape::dynamic);
        shape.to_shape().ok_or_else(|| ConvertError::DynamicWeights {
            layer: self.name().to_owned(),
            layer_type: self.type_name().to_owned(),
            shape,
        })
    }

    pub fn constant_input(&self, index: usize) -> Option<&'a ConstantData> {
        self.function.constant_value(self.input(index)?)
    }

    /// The integer values of constant input `index`, failing if it is not a constant.
    pub fn constant_ints(&self, index: usize) -> ConvertResult<Vec<i64>> {
        self.constant_input(index)
            .and_then(|data| data.as_ints())
            .ok_or_else(|| ConvertError::NonConstantInput {
                layer: self.name().to_owned(),
                layer_type: self.type_name().to_owned(),
                index,
            })
    }

    /// Input `index` as an embedded blob, if it is produced by a constant.
    pub fn blob_from_input(&self, index: usize) -> ConvertResult<Option<Blob>> {
        let input = match self.input(index) {
            Some(input) => input,
            None => return Ok(None),
        };
        let data = match self.function.constant_value(input) {
            Some(data) => data,
            None => return Ok(None),
        };

        let element_type = self.function.output_type(input).element_type;
        let precision = Precision::from_element_type(element_type).ok_or(ConvertError::UnsupportedPrecision(element_type))?;
        Ok(Some(Blob {
            precision,
            data: data.clone(),
        }))
    }

    /// Attach constant inputs as blobs, keyed by name.
    pub fn attach_blobs(&self, layer: &mut Layer, blobs: &[(&str, usize)]) -> ConvertResult<()> {
        for &(name, index) in blobs {
            if let Some(blob) = self.blob_from_input(index)? {
                layer.blobs.insert(name.to_owned(), blob);
            }
        }
        Ok(())
    }

    /// The error for ops that have to be rewritten by an upstream pass before lowering.
    pub fn unsupported(&self, op_type: &str, target: &str) -> ConvertError {
        ConvertError::UnsupportedOperation {
            op_type: op_type.to_owned(),
            name: self.name().to_owned(),
            target: target.to_owned(),
        }
    }

    pub fn cast_failed(&self, expected: &'static str) -> ConvertError {
        ConvertError::CastFailed {
            name: self.name().to_owned(),
            op_type: self.type_name().to_owned(),
            expected,
        }
    }
}

impl Debug for LoweringRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoweringRegistry")
            .field("creators", &self.creators.keys().collect_vec())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use lw_graph::element::ElementType;
    use lw_graph::function::Function;
    use lw_graph::shape;

    use crate::lowering::{global, LoweringRegistry};

    #[test]
    fn first_registered_wins() {
        let mut registry = LoweringRegistry::new();
        registry.register(&["Relu"], |ctx, _| ctx.layer("First"));
        registry.register(&["Relu", "Tanh"], |ctx, _| ctx.layer("Second"));

        let mut function = Function::new("f");
        let x = function.parameter("x", ElementType::F32, shape![2]);
        let relu = function.relu(x);
        let tanh = function.unary(lw_graph::op::UnaryOp::Tanh, x);

        assert_eq!(registry.create(&function, relu).unwrap().layer_type, "First");
        assert_eq!(registry.create(&function, tanh).unwrap().layer_type, "Second");
    }

    #[test]
    fn custom_rules_take_precedence_over_defaults() {
        let mut registry = LoweringRegistry::new();
        registry.register(&["Relu"], |ctx, _| ctx.layer("MyRelu"));
        registry.add_default_rules();

        let mut function = Function::new("f");
        let x = function.parameter("x", ElementType::F32, shape![2]);
        let relu = function.relu(x);

        assert_eq!(registry.create(&function, relu).unwrap().layer_type, "MyRelu");
        assert_eq!(global().create(&function, relu).unwrap().layer_type, "ReLU");
    }

    #[test]
    fn generic_fallback() {
        let registry = LoweringRegistry::new();
        let mut function = Function::new("f");
        let x = function.parameter("x", ElementType::F32, shape![2]);
        let exp = function.unary(lw_graph::op::UnaryOp::Exp, x);
        function.set_friendly_name(exp, "exp");

        let layer = registry.create(&function, exp).unwrap();
        assert_eq!(layer.name, "exp");
        assert_eq!(layer.layer_type, "Exp");
        assert!(layer.params.is_empty());
    }
}
