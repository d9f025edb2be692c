use std::fmt::Debug;

use crate::error::GraphResult;
use crate::op::{GenericOp, TensorType};

/// A provider of custom ops, attached to a [Function](crate::function::Function).
///
/// Extensions are consulted in registration order when inferring the output types of a [GenericOp],
/// the first one that recognizes the op wins.
pub trait Extension: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Infer the output types of `op`, or return `None` if this extension does not provide it.
    fn infer_types(&self, op: &GenericOp, inputs: &[TensorType]) -> Option<GraphResult<Vec<TensorType>>>;
}
