use thiserror::Error;

use crate::element::ElementType;

pub type GraphResult<T> = Result<T, GraphError>;

/// Identifies the node an error originated from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NodeDesc {
    pub name: String,
    pub op_type: String,
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum GraphError {
    #[error("Validation of node {node:?} failed: {message}")]
    Validation { node: NodeDesc, message: String },

    #[error("Node {node:?} has {actual} inputs, expected {expected}")]
    InputCount {
        node: NodeDesc,
        expected: String,
        actual: usize,
    },

    #[error("Node {node:?} got mismatching element types {left} and {right}")]
    ElementTypeMismatch {
        node: NodeDesc,
        left: ElementType,
        right: ElementType,
    },

    #[error("Node {node:?} has no output {index}")]
    InvalidOutput { node: NodeDesc, index: usize },

    #[error("Function has no parameter {index}, it only has {count}")]
    InvalidParameter { index: usize, count: usize },

    #[error("Rewrite pass {pass} failed: {message}")]
    Pass { pass: &'static str, message: String },
}

impl NodeDesc {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        NodeDesc {
            name: name.into(),
            op_type: op_type.into(),
        }
    }
}
