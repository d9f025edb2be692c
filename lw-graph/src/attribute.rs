use indexmap::IndexMap;

use crate::element::ElementType;
use crate::shape::PartialShape;

/// A typed attribute value, as handed to an [AttributeVisitor].
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
    ElementType(ElementType),
    PartialShape(PartialShape),
    Shape(Vec<usize>),
    Strides(Vec<usize>),
    Sizes(Vec<usize>),
    /// An attribute of a kind only its own op knows how to interpret, tagged with the kind name.
    Opaque(String),
}

/// Receives the attributes of an op one by one, in declaration order.
pub trait AttributeVisitor {
    type Error;

    fn on_attribute(&mut self, name: &str, value: AttrValue) -> Result<(), Self::Error>;
}

/// A runtime info value, attached to nodes by passes and frontends.
#[derive(Debug, Clone, PartialEq)]
pub enum RtValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
}

/// Ordered runtime info bag of a node.
pub type RtInfo = IndexMap<String, RtValue>;

pub mod rt_keys {
    /// Names of the original ops that were fused into this node, as [RtValue::StringList](super::RtValue::StringList).
    pub const FUSED_NAMES: &str = "fused_names";
    pub const PRIMITIVES_PRIORITY: &str = "PrimitivesPriority";
    pub const AFFINITY: &str = "affinity";
    /// Marks nodes of an execution graph, as produced by a profiling run.
    pub const EXEC_TIME_MCS: &str = "execTimeMcs";
}

impl RtValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RtValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// The sorted, comma-joined fused names of a node, if it has any.
pub fn fused_names(rt_info: &RtInfo) -> Option<String> {
    match rt_info.get(rt_keys::FUSED_NAMES)? {
        RtValue::StringList(names) => {
            let mut names = names.clone();
            names.sort();
            names.dedup();
            Some(names.join(","))
        }
        RtValue::String(name) => Some(name.clone()),
        _ => None,
    }
}

pub fn primitives_priority(rt_info: &RtInfo) -> Option<&str> {
    rt_info.get(rt_keys::PRIMITIVES_PRIORITY)?.as_str()
}

#[cfg(test)]
mod test {
    use crate::attribute::{fused_names, rt_keys, RtInfo, RtValue};

    #[test]
    fn fused_names_sorted() {
        let mut info = RtInfo::new();
        assert_eq!(fused_names(&info), None);

        info.insert(
            rt_keys::FUSED_NAMES.to_owned(),
            RtValue::StringList(vec!["relu".to_owned(), "conv".to_owned(), "relu".to_owned()]),
        );
        assert_eq!(fused_names(&info).as_deref(), Some("conv,relu"));
    }
}
