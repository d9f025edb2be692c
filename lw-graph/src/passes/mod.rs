use std::fmt::Debug;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::GraphResult;
use crate::function::Function;

pub use constant_folding::ConstantFolding;
pub use one_hot::ConvertOneHotToOneHotIE;

mod constant_folding;
mod one_hot;

/// A rewrite of a [Function] in place.
pub trait GraphRewrite: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the rewrite, returns whether anything changed.
    fn run_on_function(&self, function: &mut Function) -> GraphResult<bool>;
}

/// An ordered list of rewrites.
#[derive(Debug, Clone, Default)]
pub struct PassManager {
    passes: Vec<Arc<dyn GraphRewrite>>,
}

impl PassManager {
    pub fn new() -> Self {
        PassManager::default()
    }

    pub fn register(&mut self, pass: Arc<dyn GraphRewrite>) {
        self.passes.push(pass);
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Run all passes in order, re-inferring types after each one that changed the function.
    #[instrument(skip_all, level = "debug", fields(function = function.name()))]
    pub fn run_passes(&self, function: &mut Function) -> GraphResult<bool> {
        let mut any_changed = false;
        for pass in &self.passes {
            let changed = pass.run_on_function(function)?;
            debug!("Pass {} changed={}", pass.name(), changed);

            if changed {
                function.validate_nodes_and_infer_types()?;
                any_changed = true;
            }
        }
        Ok(any_changed)
    }
}

/// Clone `function`, optionally folding all constant sub-graphs of the clone.
/// The returned function is fully independent, node ids of `function` stay valid for it.
pub fn clone_function(function: &Function, constant_folding: bool) -> GraphResult<Function> {
    let mut clone = function.clone();
    if constant_folding {
        ConstantFolding.run_on_function(&mut clone)?;
    }
    Ok(clone)
}
