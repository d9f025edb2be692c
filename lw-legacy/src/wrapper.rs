use std::collections::HashSet;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, instrument, warn};

use lw_graph::attribute::rt_keys;
use lw_graph::element::ElementType;
use lw_graph::function::Function;
use lw_graph::op::TensorType;
use lw_graph::passes::{clone_function, ConvertOneHotToOneHotIE, GraphRewrite, PassManager};
use lw_graph::shape::PartialShape;

use crate::convert::{convert_function_to_legacy, output_name, ConversionSettings};
use crate::data::{DataDesc, InputInfo, PreProcessInfo};
use crate::error::{ConvertError, ConvertResult};
use crate::legacy::LegacyNetwork;
use crate::lowering::{global, LoweringRegistry};
use crate::network::{InputShapes, Network};
use crate::precision::{Layout, Precision};
use crate::serialize::NetworkSerializer;
use crate::status::{StatusCode, StatusError, StatusResult};

/// A network backed by a graph [Function], lowered to a [LegacyNetwork] on demand.
///
/// The function stays authoritative until an operation that only the legacy form supports is requested,
/// from then on every call is delegated to the converted network and [GraphNetwork::function] returns `None`.
///
/// ```
/// # use lw_graph::function::Function;
/// # use lw_graph::element::ElementType;
/// # use lw_graph::shape;
/// # use lw_legacy::network::Network;
/// # use lw_legacy::wrapper::GraphNetwork;
/// let mut function = Function::new("net");
/// let x = function.parameter("x", ElementType::F32, shape![1, 16]);
/// let y = function.relu(x);
/// function.set_friendly_name(y, "y");
/// function.result(y);
///
/// let mut network = GraphNetwork::new(function).unwrap();
/// assert_eq!(network.batch_size(), 1);
///
/// network.set_batch_size_reshape(4).unwrap();
/// assert_eq!(network.outputs_info()["y"].dims, vec![4, 16]);
/// assert!(network.function().is_some());
/// ```
#[derive(Debug)]
pub struct GraphNetwork {
    function: Function,
    settings: ConversionSettings,
    registry: Option<Arc<LoweringRegistry>>,
    upstream: PassManager,

    data: IndexMap<String, DataDesc>,
    inputs: IndexMap<String, PreProcessInfo>,
    outputs: IndexSet<String>,

    legacy: LegacyState,
}

#[derive(Debug)]
enum LegacyState {
    None,
    /// A conversion of the current function, dropped on every mutation.
    Cached(LegacyNetwork),
    /// The function has been abandoned, all calls go to this network.
    Authoritative(LegacyNetwork),
}

impl GraphNetwork {
    pub fn new(function: Function) -> ConvertResult<Self> {
        Self::with_settings(function, ConversionSettings::default())
    }

    /// Wrap `function`, creating the input and output descriptors from its parameters and results.
    ///
    /// Input precisions are normalized to what the legacy runtime accepts, `FP16` becomes `FP32`.
    /// Output precisions other than `FP32` and `I32` become `FP32`, except `I64` which becomes `I32`.
    #[instrument(name = "GraphNetwork::new", skip_all, fields(function = function.name()), level = "debug")]
    pub fn with_settings(function: Function, settings: ConversionSettings) -> ConvertResult<Self> {
        let mut network = GraphNetwork {
            function,
            settings,
            registry: None,
            upstream: PassManager::new(),
            data: IndexMap::new(),
            inputs: IndexMap::new(),
            outputs: IndexSet::new(),
            legacy: LegacyState::None,
        };
        network.reshape_function(&InputShapes::new())?;

        for &param in network.function.parameters() {
            let name = network.function[param].friendly_name().to_owned();
            let desc = network
                .data
                .get_mut(&name)
                .ok_or_else(|| ConvertError::DataNotFound(name.clone()))?;
            desc.precision = desc.precision.normalize_input();
            network.inputs.insert(name, PreProcessInfo::default());
        }
        for name in &network.outputs {
            if let Some(desc) = network.data.get_mut(name) {
                desc.precision = desc.precision.normalize_output();
            }
        }

        debug!(
            "Wrapped function with {} inputs and {} outputs",
            network.inputs.len(),
            network.outputs.len()
        );
        Ok(network)
    }

    /// A new wrapper around an independent copy of the function of `other`,
    /// with the same input and output infos.
    pub fn from_network(other: &GraphNetwork) -> ConvertResult<Self> {
        let function = other.function().ok_or_else(|| {
            ConvertError::NotImplemented("Copying a network that was converted to the legacy form".to_owned())
        })?;

        let mut network = GraphNetwork::with_settings(clone_function(function, false)?, other.settings)?;
        network.registry = other.registry.clone();
        network.upstream = other.upstream.clone();

        for (name, info) in other.inputs_info() {
            if let Some(desc) = network.data.get_mut(&name) {
                desc.precision = info.data.precision;
                desc.layout = info.data.layout;
            }
            network.inputs.insert(name, info.pre_process);
        }
        for (name, desc) in other.outputs_info() {
            network.outputs.insert(name.clone());
            network.data.insert(name, desc);
        }
        Ok(network)
    }

    /// Use `registry` instead of the shared default registry for lowering.
    pub fn set_registry(&mut self, registry: Arc<LoweringRegistry>) {
        self.registry = Some(registry);
        self.invalidate();
    }

    /// Add a rewrite that runs on the function right before it is lowered.
    pub fn add_upstream_pass(&mut self, pass: Arc<dyn GraphRewrite>) {
        self.upstream.register(pass);
        self.invalidate();
    }

    pub fn settings(&self) -> ConversionSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: ConversionSettings) {
        self.settings = settings;
        self.invalidate();
    }

    /// The function, or `None` once the legacy network has become authoritative.
    pub fn function(&self) -> Option<&Function> {
        match self.legacy {
            LegacyState::Authoritative(_) => None,
            LegacyState::None | LegacyState::Cached(_) => Some(&self.function),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self.legacy, LegacyState::Authoritative(_))
    }

    /// A copy of the function, optionally with constant sub-graphs folded.
    pub fn clone_function(&self, constant_folding: bool) -> ConvertResult<Function> {
        Ok(clone_function(&self.function, constant_folding)?)
    }

    /// The lowered form of the current function, converted at most once between mutations.
    pub fn to_legacy(&mut self) -> ConvertResult<&LegacyNetwork> {
        if matches!(self.legacy, LegacyState::None) {
            let network = self.convert()?;
            self.legacy = LegacyState::Cached(network);
        }
        match &self.legacy {
            LegacyState::Cached(network) | LegacyState::Authoritative(network) => Ok(network),
            LegacyState::None => unreachable!(),
        }
    }

    fn convert(&self) -> ConvertResult<LegacyNetwork> {
        let mut function = clone_function(&self.function, true)?;

        let mut passes = PassManager::new();
        passes.register(Arc::new(ConvertOneHotToOneHotIE));
        passes.run_passes(&mut function)?;
        self.upstream.run_passes(&mut function)?;
        function.validate_nodes_and_infer_types()?;

        let registry = match self.registry.as_deref() {
            Some(registry) => registry,
            None => global(),
        };
        convert_function_to_legacy(&function, self, self.settings, registry)
    }

    /// Switch to the legacy network for good.
    fn make_legacy_authoritative(&mut self) -> ConvertResult<&mut LegacyNetwork> {
        let network = match std::mem::replace(&mut self.legacy, LegacyState::None) {
            LegacyState::None => self.convert()?,
            LegacyState::Cached(network) | LegacyState::Authoritative(network) => network,
        };
        debug!("Legacy network {} is now authoritative", network.name());
        self.legacy = LegacyState::Authoritative(network);

        match &mut self.legacy {
            LegacyState::Authoritative(network) => Ok(network),
            LegacyState::None | LegacyState::Cached(_) => unreachable!(),
        }
    }

    fn legacy_mut(&mut self) -> Option<&mut LegacyNetwork> {
        match &mut self.legacy {
            LegacyState::Authoritative(network) => Some(network),
            LegacyState::None | LegacyState::Cached(_) => None,
        }
    }

    fn legacy_ref(&self) -> Option<&LegacyNetwork> {
        match &self.legacy {
            LegacyState::Authoritative(network) => Some(network),
            LegacyState::None | LegacyState::Cached(_) => None,
        }
    }

    fn invalidate(&mut self) {
        if let LegacyState::Cached(_) = self.legacy {
            self.legacy = LegacyState::None;
        }
    }

    /// Give the named parameters new shapes, re-infer all types and refresh the data descriptors.
    ///
    /// The descriptors are derived from a folded copy of the function, so outputs of shape
    /// sub-graphs that became constant get static shapes. The descriptors are only updated if
    /// every step succeeds, but the function keeps the new parameter shapes on failure.
    /// A cached legacy form is dropped either way.
    #[instrument(name = "reshape", skip_all, fields(shapes = shapes.len()), level = "debug")]
    fn reshape_function(&mut self, shapes: &InputShapes) -> ConvertResult<()> {
        self.invalidate();

        let params = self.function.parameters().to_vec();
        for (index, &param) in params.iter().enumerate() {
            let info = &self.function[param];
            if let Some(shape) = shapes.get(info.friendly_name()) {
                let element_type = info.outputs()[0].element_type;
                self.function.replace_parameter(index, element_type, shape.clone())?;
            }
        }
        self.function.validate_nodes_and_infer_types()?;

        let mut specialized = clone_function(&self.function, true)?;
        ConvertOneHotToOneHotIE.run_on_function(&mut specialized)?;
        specialized.validate_nodes_and_infer_types()?;

        let mut data = self.data.clone();
        let mut outputs = self.outputs.clone();

        for &result in specialized.results() {
            let info = &specialized[result];
            let input = *info.inputs().first().ok_or_else(|| ConvertError::ResultInputs {
                name: info.friendly_name().to_owned(),
                count: 0,
            })?;
            let name = output_name(&specialized, input);
            create_data_for_result(&mut data, &name, specialized.output_type(input))?;
            outputs.insert(name);
        }

        let mut seen = HashSet::new();
        for &param in specialized.parameters() {
            let info = &specialized[param];
            if !seen.insert(info.friendly_name()) {
                return Err(ConvertError::DuplicateFriendlyName(info.friendly_name().to_owned()));
            }
            create_data_for_result(&mut data, info.friendly_name(), &info.outputs()[0])?;
        }

        self.data = data;
        self.outputs = outputs;
        Ok(())
    }

    /// Set the leading dimension of every input to `batch_size` by reshaping the function.
    ///
    /// If that fails the original shapes are restored and the batch is set on the
    /// legacy network instead, which then becomes authoritative.
    pub fn set_batch_size_reshape(&mut self, batch_size: usize) -> StatusResult<()> {
        if let Some(network) = self.legacy_mut() {
            return Ok(network.set_batch(batch_size)?);
        }

        let originals = self
            .function
            .parameters()
            .iter()
            .map(|&p| self.function[p].outputs()[0].clone())
            .collect::<Vec<_>>();

        let attempt = self.batch_shapes(batch_size).and_then(|shapes| self.reshape_function(&shapes));
        match attempt {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Reshaping to batch {} failed, falling back to the legacy network: {}", batch_size, e);
                self.restore_parameters(&originals)?;
                let network = self.make_legacy_authoritative()?;
                Ok(network.set_batch(batch_size)?)
            }
        }
    }

    fn batch_shapes(&self, batch_size: usize) -> ConvertResult<InputShapes> {
        let mut shapes = InputShapes::new();
        for &param in self.function.parameters() {
            let info = &self.function[param];
            let mut dims = info.outputs()[0]
                .shape
                .to_shape()
                .ok_or_else(|| ConvertError::DynamicBatch(info.friendly_name().to_owned()))?;
            if let Some(first) = dims.first_mut() {
                *first = batch_size;
                shapes.insert(info.friendly_name().to_owned(), PartialShape::fixed(&dims));
            }
        }
        Ok(shapes)
    }

    fn restore_parameters(&mut self, originals: &[TensorType]) -> ConvertResult<()> {
        for (index, original) in originals.iter().enumerate() {
            self.function
                .replace_parameter(index, original.element_type, original.shape.clone())?;
        }
        self.function.validate_nodes_and_infer_types()?;
        Ok(())
    }

    fn require_input(&self, input: &str) -> ConvertResult<()> {
        if self.inputs.contains_key(input) {
            Ok(())
        } else {
            Err(ConvertError::DataNotFound(input.to_owned()))
        }
    }

    fn data_desc_mut(&mut self, name: &str) -> ConvertResult<&mut DataDesc> {
        self.invalidate();
        self.data
            .get_mut(name)
            .ok_or_else(|| ConvertError::DataNotFound(name.to_owned()))
    }
}

/// Create or update the descriptor `name` in `data` for a tensor of type `output`.
///
/// Dynamic shapes get empty dims, existing descriptors keep their precision and
/// their layout if it is compatible with the new rank.
pub fn create_data_for_result(
    data: &mut IndexMap<String, DataDesc>,
    name: &str,
    output: &TensorType,
) -> ConvertResult<()> {
    let dims = output.shape.to_shape().unwrap_or_default();
    if dims.contains(&0) {
        return Err(ConvertError::ZeroDataDimension { name: name.to_owned() });
    }

    match data.get_mut(name) {
        Some(desc) => desc.reshape(dims),
        None => {
            let precision = match output.element_type {
                ElementType::Dynamic => Precision::Unspecified,
                element_type => {
                    Precision::from_element_type(element_type).ok_or(ConvertError::UnsupportedPrecision(element_type))?
                }
            };
            data.insert(name.to_owned(), DataDesc::new(name, precision, dims));
        }
    }
    Ok(())
}

impl Network for GraphNetwork {
    fn name(&self) -> &str {
        match self.legacy_ref() {
            Some(network) => network.name(),
            None => self.function.name(),
        }
    }

    fn inputs_info(&self) -> IndexMap<String, InputInfo> {
        if let Some(network) = self.legacy_ref() {
            return network.inputs_info();
        }
        self.inputs
            .iter()
            .filter_map(|(name, pre_process)| {
                let info = InputInfo {
                    data: self.data.get(name)?.clone(),
                    pre_process: pre_process.clone(),
                };
                Some((name.clone(), info))
            })
            .collect()
    }

    fn outputs_info(&self) -> IndexMap<String, DataDesc> {
        if let Some(network) = self.legacy_ref() {
            return network.outputs_info();
        }
        self.outputs
            .iter()
            .filter_map(|name| Some((name.clone(), self.data.get(name)?.clone())))
            .collect()
    }

    fn find_data(&self, name: &str) -> Option<DataDesc> {
        match self.legacy_ref() {
            Some(network) => network.find_data(name),
            None => self.data.get(name).cloned(),
        }
    }

    fn layer_count(&self) -> usize {
        match self.legacy_ref() {
            Some(network) => network.layer_count(),
            None => self.function.ops().len(),
        }
    }

    /// The leading dimension of the first static input with a rank other than 1 or 3, or 1.
    fn batch_size(&self) -> usize {
        if let Some(network) = self.legacy_ref() {
            return network.batch_size();
        }
        self.function
            .parameters()
            .iter()
            .filter_map(|&p| self.function[p].outputs()[0].shape.to_shape())
            .find(|dims| !dims.is_empty() && dims.len() != 1 && dims.len() != 3)
            .map_or(1, |dims| dims[0])
    }

    fn set_batch_size(&mut self, batch_size: usize) -> StatusResult<()> {
        if self.legacy_ref().is_none() && batch_size == self.batch_size() {
            return Ok(());
        }
        let network = self.make_legacy_authoritative()?;
        Ok(network.set_batch(batch_size)?)
    }

    fn reshape(&mut self, shapes: &InputShapes) -> StatusResult<()> {
        if let Some(network) = self.legacy_mut() {
            return network.reshape(shapes);
        }
        Ok(self.reshape_function(shapes)?)
    }

    fn add_output(&mut self, layer: &str, index: usize) -> StatusResult<()> {
        if let Some(network) = self.legacy_mut() {
            return network.add_output(layer, index);
        }

        let node = self.function.find_node(layer).ok_or_else(|| {
            StatusError::new(
                StatusCode::NotFound,
                format!("Cannot add output! Layer {} wasn't found!", layer),
            )
        })?;
        let output = self.function.output(node, index).map_err(ConvertError::from)?;
        let name = output_name(&self.function, output);
        self.function.result(output);
        self.invalidate();

        if !self.outputs.contains(&name) {
            self.reshape_function(&InputShapes::new())?;
        }
        Ok(())
    }

    fn set_input_precision(&mut self, input: &str, precision: Precision) -> StatusResult<()> {
        if let Some(network) = self.legacy_mut() {
            return network.set_input_precision(input, precision);
        }
        self.require_input(input)?;
        self.data_desc_mut(input)?.precision = precision;
        Ok(())
    }

    fn set_input_layout(&mut self, input: &str, layout: Layout) -> StatusResult<()> {
        if let Some(network) = self.legacy_mut() {
            return network.set_input_layout(input, layout);
        }
        self.require_input(input)?;
        self.data_desc_mut(input)?.layout = layout;
        Ok(())
    }

    fn set_pre_process(&mut self, input: &str, pre_process: PreProcessInfo) -> StatusResult<()> {
        if let Some(network) = self.legacy_mut() {
            return network.set_pre_process(input, pre_process);
        }
        let slot = self
            .inputs
            .get_mut(input)
            .ok_or_else(|| ConvertError::DataNotFound(input.to_owned()))?;
        *slot = pre_process;
        self.invalidate();
        Ok(())
    }

    fn set_output_precision(&mut self, output: &str, precision: Precision) -> StatusResult<()> {
        if let Some(network) = self.legacy_mut() {
            return network.set_output_precision(output, precision);
        }
        if !self.outputs.contains(output) {
            return Err(ConvertError::DataNotFound(output.to_owned()).into());
        }
        self.data_desc_mut(output)?.precision = precision;
        Ok(())
    }

    /// Functions where every op carries an execution time are execution graphs and are
    /// serialized as such, everything else is lowered first.
    fn serialize(&mut self, serializer: &mut dyn NetworkSerializer) -> StatusResult<()> {
        if let Some(network) = self.legacy_mut() {
            return network.serialize(serializer);
        }

        let function = &self.function;
        let is_execution_graph = function
            .ops()
            .iter()
            .all(|&n| function[n].rt_info().contains_key(rt_keys::EXEC_TIME_MCS));
        if is_execution_graph {
            return Ok(serializer.serialize_execution_graph(function)?);
        }

        let network = self.to_legacy()?;
        Ok(serializer.serialize_legacy(network)?)
    }
}

#[cfg(test)]
mod test {
    use lw_graph::element::ElementType;
    use lw_graph::function::Function;
    use lw_graph::op::TensorType;
    use lw_graph::shape;
    use lw_graph::shape::{Dimension, PartialShape};

    use indexmap::IndexMap;

    use crate::error::ConvertError;
    use crate::network::{InputShapes, Network};
    use crate::precision::{Layout, Precision};
    use crate::status::StatusCode;
    use crate::wrapper::{create_data_for_result, GraphNetwork};

    fn relu_function(shape: PartialShape) -> Function {
        let mut function = Function::new("relu");
        let x = function.parameter("x", ElementType::F32, shape);
        let y = function.relu(x);
        function.set_friendly_name(y, "y");
        function.result(y);
        function
    }

    #[test]
    fn precisions_normalized() {
        let mut function = Function::new("f");
        let x = function.parameter("x", ElementType::F16, shape![1, 4]);
        let i = function.parameter("i", ElementType::I64, shape![1, 4]);
        let y = function.convert(x, ElementType::I64);
        function.set_friendly_name(y, "y");
        function.result(y);
        let z = function.relu(i);
        function.set_friendly_name(z, "z");
        function.result(z);

        let network = GraphNetwork::new(function).unwrap();
        let inputs = network.inputs_info();
        assert_eq!(inputs["x"].data.precision, Precision::Fp32);
        assert_eq!(inputs["i"].data.precision, Precision::I64);
        assert_eq!(network.outputs_info()["y"].precision, Precision::I32);
        assert_eq!(network.outputs_info()["z"].precision, Precision::I32);
    }

    #[test]
    fn batch_size_rule() {
        let network = GraphNetwork::new(relu_function(shape![5, 16])).unwrap();
        assert_eq!(network.batch_size(), 5);

        let network = GraphNetwork::new(relu_function(shape![5, 3, 8])).unwrap();
        assert_eq!(network.batch_size(), 1);

        let network = GraphNetwork::new(relu_function(shape![Dimension::DYNAMIC, 16])).unwrap();
        assert_eq!(network.batch_size(), 1);
    }

    #[test]
    fn dynamic_output_has_empty_dims() {
        let network = GraphNetwork::new(relu_function(shape![Dimension::DYNAMIC, 16])).unwrap();
        assert!(network.outputs_info()["y"].dims.is_empty());
    }

    #[test]
    fn reshape_keeps_layout() {
        let mut network = GraphNetwork::new(relu_function(shape![1, 3, 8, 8])).unwrap();
        network.set_input_layout("x", Layout::Nhwc).unwrap();

        let mut shapes = InputShapes::new();
        shapes.insert("x".to_owned(), shape![2, 3, 8, 8]);
        network.reshape(&shapes).unwrap();

        let x = &network.inputs_info()["x"];
        assert_eq!(x.data.dims, vec![2, 3, 8, 8]);
        assert_eq!(x.data.layout, Layout::Nhwc);
        assert_eq!(network.outputs_info()["y"].dims, vec![2, 3, 8, 8]);
    }

    #[test]
    fn add_output_unknown_layer() {
        let mut network = GraphNetwork::new(relu_function(shape![1, 4])).unwrap();
        let e = network.add_output("missing", 0).unwrap_err();
        assert_eq!(e.code, StatusCode::NotFound);
        assert_eq!(e.message, "Cannot add output! Layer missing wasn't found!");
    }

    #[test]
    fn add_output_of_split() {
        let mut function = Function::new("f");
        let x = function.parameter("x", ElementType::F32, shape![1, 4]);
        let split = function.split(x, 1, 2);
        function.set_friendly_name(split, "split");
        let y = function.relu(function.output(split, 0).unwrap());
        function.set_friendly_name(y, "y");
        function.result(y);

        let mut network = GraphNetwork::new(function).unwrap();
        network.add_output("split", 1).unwrap();

        let outputs = network.outputs_info();
        assert_eq!(outputs.keys().collect::<Vec<_>>(), vec!["y", "split.1"]);
        assert_eq!(outputs["split.1"].dims, vec![1, 2]);
    }

    #[test]
    fn set_batch_size_same_is_noop() {
        let mut network = GraphNetwork::new(relu_function(shape![1, 16])).unwrap();
        network.set_batch_size(1).unwrap();
        assert!(!network.is_legacy());
        assert!(network.function().is_some());
    }

    #[test]
    fn zero_dimension_rejected() {
        let mut data = IndexMap::new();
        let output = TensorType {
            element_type: ElementType::F32,
            shape: shape![0, 4],
        };
        assert_eq!(
            create_data_for_result(&mut data, "z", &output),
            Err(ConvertError::ZeroDataDimension { name: "z".to_owned() })
        );
    }
}
