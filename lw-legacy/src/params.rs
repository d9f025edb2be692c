use itertools::Itertools;

use lw_graph::attribute::{AttrValue, AttributeVisitor};
use lw_graph::op::Op;

use crate::error::{ConvertError, ConvertResult};
use crate::layer::Params;
use crate::precision::Precision;

/// Flattens the typed attributes of an op into legacy string parameters.
#[derive(Debug, Default)]
pub struct ParamsExtractor {
    params: Params,
}

/// Extract the parameters of `op`.
pub fn extract_params(op: &Op) -> ConvertResult<Params> {
    let mut extractor = ParamsExtractor::default();
    op.visit_attributes(&mut extractor)?;
    Ok(extractor.finish())
}

impl ParamsExtractor {
    pub fn finish(self) -> Params {
        self.params
    }
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Scalars use fixed notation with six decimals.
pub fn format_float(value: f64) -> String {
    format!("{:.6}", value)
}

impl AttributeVisitor for ParamsExtractor {
    type Error = ConvertError;

    fn on_attribute(&mut self, name: &str, value: AttrValue) -> ConvertResult<()> {
        let value = match value {
            AttrValue::Bool(value) => format_bool(value).to_owned(),
            AttrValue::Int(value) => value.to_string(),
            AttrValue::Float(value) => format_float(value),
            AttrValue::String(value) => value.to_lowercase(),
            AttrValue::Ints(values) => values.iter().join(","),
            AttrValue::Floats(values) => values.iter().join(","),
            AttrValue::Strings(values) => values.iter().map(|s| format!("{},", s.to_lowercase())).collect::<String>(),
            AttrValue::ElementType(element_type) => Precision::from_element_type(element_type)
                .ok_or(ConvertError::UnsupportedPrecision(element_type))?
                .name()
                .to_owned(),
            AttrValue::PartialShape(shape) => match shape.to_shape() {
                Some(dims) => dims.iter().join(","),
                None => {
                    return Err(ConvertError::DynamicAttribute {
                        name: name.to_owned(),
                        shape,
                    })
                }
            },
            AttrValue::Shape(values) | AttrValue::Strides(values) | AttrValue::Sizes(values) => values.iter().join(","),
            AttrValue::Opaque(_) => {
                return Err(ConvertError::UnknownAttribute { name: name.to_owned() });
            }
        };

        self.params.insert(name.to_owned(), value);
        Ok(())
    }
}
