use std::fmt::Debug;

use indexmap::IndexMap;

use lw_graph::shape::PartialShape;

use crate::data::{DataDesc, InputInfo, PreProcessInfo};
use crate::precision::{Layout, Precision};
use crate::serialize::NetworkSerializer;
use crate::status::StatusResult;

/// New shapes for the inputs named by the keys, inputs that are not named keep their shape.
pub type InputShapes = IndexMap<String, PartialShape>;

/// The public surface shared by the graph-backed wrapper and the legacy layer list.
///
/// All fallible entry points report a [StatusError](crate::status::StatusError),
/// internal errors are translated at this boundary.
pub trait Network: Debug {
    fn name(&self) -> &str;

    /// Input infos by input name, in declaration order.
    fn inputs_info(&self) -> IndexMap<String, InputInfo>;

    fn input_info(&self, name: &str) -> Option<InputInfo> {
        self.inputs_info().shift_remove(name)
    }

    /// Output descriptors by output name, in registration order.
    fn outputs_info(&self) -> IndexMap<String, DataDesc>;

    fn find_data(&self, name: &str) -> Option<DataDesc>;

    fn layer_count(&self) -> usize;

    fn batch_size(&self) -> usize;

    fn set_batch_size(&mut self, batch_size: usize) -> StatusResult<()>;

    fn reshape(&mut self, shapes: &InputShapes) -> StatusResult<()>;

    /// Mark output `index` of `layer` as a network output.
    fn add_output(&mut self, layer: &str, index: usize) -> StatusResult<()>;

    fn set_input_precision(&mut self, input: &str, precision: Precision) -> StatusResult<()>;

    fn set_input_layout(&mut self, input: &str, layout: Layout) -> StatusResult<()>;

    fn set_pre_process(&mut self, input: &str, pre_process: PreProcessInfo) -> StatusResult<()>;

    fn set_output_precision(&mut self, output: &str, precision: Precision) -> StatusResult<()>;

    fn serialize(&mut self, serializer: &mut dyn NetworkSerializer) -> StatusResult<()>;
}
