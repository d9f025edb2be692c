use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use tracing::debug;

use lw_graph::extension::Extension;

use crate::data::{DataDesc, InputInfo, PreProcessInfo};
use crate::error::{ConvertError, ConvertResult};
use crate::layer::Layer;
use crate::network::{InputShapes, Network};
use crate::precision::{Layout, Precision};
use crate::serialize::NetworkSerializer;
use crate::status::StatusResult;

/// A flat legacy network: layers connected through named data descriptors.
#[derive(Clone)]
pub struct LegacyNetwork {
    name: String,
    layers: IndexMap<String, Layer>,
    data: IndexMap<String, DataNode>,
    inputs: IndexMap<String, PreProcessInfo>,
    outputs: IndexSet<String>,
    extensions: Vec<Arc<dyn Extension>>,
}

/// A data descriptor together with the layers producing and consuming it.
#[derive(Debug, Clone, PartialEq)]
pub struct DataNode {
    pub desc: DataDesc,
    pub creator: Option<String>,
    /// Consuming `(layer, input port)` pairs.
    pub input_to: Vec<(String, usize)>,
}

impl LegacyNetwork {
    pub fn new(name: impl Into<String>) -> Self {
        LegacyNetwork {
            name: name.into(),
            layers: IndexMap::new(),
            data: IndexMap::new(),
            inputs: IndexMap::new(),
            outputs: IndexSet::new(),
            extensions: vec![],
        }
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    pub fn data(&self, name: &str) -> Option<&DataNode> {
        self.data.get(name)
    }

    pub fn data_nodes(&self) -> impl Iterator<Item = &DataNode> {
        self.data.values()
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(String::as_str)
    }

    pub fn extensions(&self) -> &[Arc<dyn Extension>] {
        &self.extensions
    }

    pub fn add_extension(&mut self, extension: Arc<dyn Extension>) {
        self.extensions.push(extension);
    }

    pub fn add_layer(&mut self, layer: Layer) -> ConvertResult<()> {
        if self.layers.contains_key(&layer.name) {
            return Err(ConvertError::DuplicateLayer(layer.name));
        }
        debug!("Adding layer {}", layer);
        self.layers.insert(layer.name.clone(), layer);
        Ok(())
    }

    /// Register `desc` as produced by `creator`, which must already be part of the network.
    pub fn add_data(&mut self, desc: DataDesc, creator: &str) -> ConvertResult<()> {
        if !self.layers.contains_key(creator) {
            return Err(ConvertError::LayerNotFound(creator.to_owned()));
        }
        if self.data.contains_key(&desc.name) {
            return Err(ConvertError::DuplicateData(desc.name));
        }

        let node = DataNode {
            desc,
            creator: Some(creator.to_owned()),
            input_to: vec![],
        };
        self.data.insert(node.desc.name.clone(), node);
        Ok(())
    }

    /// Bind input `port` of `layer` to the data named `data`.
    pub fn connect(&mut self, data: &str, layer: &str, port: usize) -> ConvertResult<()> {
        let node = self
            .data
            .get_mut(data)
            .ok_or_else(|| ConvertError::DataNotFound(data.to_owned()))?;
        let target = self
            .layers
            .get_mut(layer)
            .ok_or_else(|| ConvertError::LayerNotFound(layer.to_owned()))?;

        let slot = target.ins.get_mut(port).ok_or_else(|| ConvertError::UnconnectedInput {
            layer: layer.to_owned(),
            port,
        })?;
        *slot = Some(data.to_owned());
        node.input_to.push((layer.to_owned(), port));
        Ok(())
    }

    pub fn add_input(&mut self, data: &str) -> ConvertResult<()> {
        if !self.data.contains_key(data) {
            return Err(ConvertError::DataNotFound(data.to_owned()));
        }
        self.inputs.insert(data.to_owned(), PreProcessInfo::default());
        Ok(())
    }

    pub fn add_output_data(&mut self, data: &str) -> ConvertResult<()> {
        if !self.data.contains_key(data) {
            return Err(ConvertError::DataNotFound(data.to_owned()));
        }
        self.outputs.insert(data.to_owned());
        Ok(())
    }

    pub fn set_input_info(&mut self, info: &InputInfo) -> ConvertResult<()> {
        let name = info.name();
        let pre_process = self
            .inputs
            .get_mut(name)
            .ok_or_else(|| ConvertError::DataNotFound(name.to_owned()))?;
        *pre_process = info.pre_process.clone();

        let desc = &mut self.data[name].desc;
        desc.precision = info.data.precision;
        if info.data.layout.is_compatible(desc.rank()) {
            desc.layout = info.data.layout;
        }
        Ok(())
    }

    fn data_desc_mut(&mut self, name: &str) -> ConvertResult<&mut DataDesc> {
        self.data
            .get_mut(name)
            .map(|d| &mut d.desc)
            .ok_or_else(|| ConvertError::DataNotFound(name.to_owned()))
    }

    fn require_input(&self, name: &str) -> ConvertResult<()> {
        match self.inputs.contains_key(name) {
            true => Ok(()),
            false => Err(ConvertError::DataNotFound(name.to_owned())),
        }
    }

    /// Mark output `index` of `layer` as a network output.
    pub fn add_layer_output(&mut self, layer: &str, index: usize) -> ConvertResult<()> {
        let info = self
            .layers
            .get(layer)
            .ok_or_else(|| ConvertError::LayerNotFound(layer.to_owned()))?;
        let data = info.outs.get(index).ok_or(ConvertError::OutputOutOfBounds {
            layer: layer.to_owned(),
            index,
            count: info.outs.len(),
        })?;
        self.outputs.insert(data.clone());
        Ok(())
    }

    /// The leading dimension of the first input, 1 if there are no inputs or it is a scalar.
    pub fn get_batch_size(&self) -> usize {
        self.inputs
            .keys()
            .next()
            .and_then(|name| self.data.get(name))
            .and_then(|d| d.desc.dims.first().copied())
            .unwrap_or(1)
    }

    /// Set the leading dimension of every data that is not produced by a constant.
    pub fn set_batch(&mut self, batch_size: usize) -> ConvertResult<()> {
        if batch_size == 0 {
            return Err(ConvertError::ZeroDataDimension {
                name: "batch size".to_owned(),
            });
        }

        let layers = &self.layers;
        for node in self.data.values_mut() {
            let is_const = node
                .creator
                .as_ref()
                .and_then(|c| layers.get(c))
                .map_or(false, |l| l.layer_type == "Const");
            if is_const || node.desc.dims.is_empty() {
                continue;
            }
            node.desc.dims[0] = batch_size;
        }
        Ok(())
    }

    /// Check that every slot is bound and that producer and consumer links agree.
    pub fn validate(&self) -> ConvertResult<()> {
        for layer in self.layers.values() {
            for (port, input) in layer.ins.iter().enumerate() {
                let name = input.as_ref().ok_or_else(|| ConvertError::UnconnectedInput {
                    layer: layer.name.clone(),
                    port,
                })?;
                let data = self
                    .data
                    .get(name)
                    .ok_or_else(|| ConvertError::DataNotFound(name.clone()))?;
                if !data.input_to.iter().any(|(l, p)| l == &layer.name && *p == port) {
                    return Err(ConvertError::UnconnectedInput {
                        layer: layer.name.clone(),
                        port,
                    });
                }
            }
            for out in &layer.outs {
                let data = self.data.get(out).ok_or_else(|| ConvertError::DataNotFound(out.clone()))?;
                if data.creator.as_deref() != Some(layer.name.as_str()) {
                    return Err(ConvertError::DuplicateData(out.clone()));
                }
            }
        }

        for name in self.inputs.keys().chain(&self.outputs) {
            if !self.data.contains_key(name) {
                return Err(ConvertError::DataNotFound(name.clone()));
            }
        }
        Ok(())
    }
}

impl Network for LegacyNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs_info(&self) -> IndexMap<String, InputInfo> {
        self.inputs
            .iter()
            .filter_map(|(name, pre_process)| {
                let info = InputInfo {
                    data: self.data.get(name)?.desc.clone(),
                    pre_process: pre_process.clone(),
                };
                Some((name.clone(), info))
            })
            .collect()
    }

    fn outputs_info(&self) -> IndexMap<String, DataDesc> {
        self.outputs
            .iter()
            .filter_map(|name| Some((name.clone(), self.data.get(name)?.desc.clone())))
            .collect()
    }

    fn find_data(&self, name: &str) -> Option<DataDesc> {
        self.data.get(name).map(|d| d.desc.clone())
    }

    fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn batch_size(&self) -> usize {
        self.get_batch_size()
    }

    fn set_batch_size(&mut self, batch_size: usize) -> StatusResult<()> {
        Ok(self.set_batch(batch_size)?)
    }

    fn reshape(&mut self, _: &InputShapes) -> StatusResult<()> {
        Err(ConvertError::NotImplemented("Reshape of a legacy network".to_owned()).into())
    }

    fn add_output(&mut self, layer: &str, index: usize) -> StatusResult<()> {
        Ok(self.add_layer_output(layer, index)?)
    }

    fn set_input_precision(&mut self, input: &str, precision: Precision) -> StatusResult<()> {
        self.require_input(input)?;
        self.data_desc_mut(input)?.precision = precision;
        Ok(())
    }

    fn set_input_layout(&mut self, input: &str, layout: Layout) -> StatusResult<()> {
        self.require_input(input)?;
        self.data_desc_mut(input)?.layout = layout;
        Ok(())
    }

    fn set_pre_process(&mut self, input: &str, pre_process: PreProcessInfo) -> StatusResult<()> {
        let slot = self
            .inputs
            .get_mut(input)
            .ok_or_else(|| ConvertError::DataNotFound(input.to_owned()))?;
        *slot = pre_process;
        Ok(())
    }

    fn set_output_precision(&mut self, output: &str, precision: Precision) -> StatusResult<()> {
        if !self.outputs.contains(output) {
            return Err(ConvertError::DataNotFound(output.to_owned()).into());
        }
        self.data_desc_mut(output)?.precision = precision;
        Ok(())
    }

    fn serialize(&mut self, serializer: &mut dyn NetworkSerializer) -> StatusResult<()> {
        Ok(serializer.serialize_legacy(self)?)
    }
}

impl Debug for LegacyNetwork {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyNetwork")
            .field("name", &self.name)
            .field("layers", &self.layers.len())
            .field("data", &self.data.len())
            .field("inputs", &self.inputs.keys().collect_vec())
            .field("outputs", &self.outputs)
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl Display for LegacyNetwork {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "LegacyNetwork {:?} {{", self.name)?;
        writeln!(f, "  inputs: [{}],", self.inputs.keys().join(", "))?;
        writeln!(f, "  outputs: [{}],", self.outputs.iter().join(", "))?;

        writeln!(f, "  layers: [")?;
        for layer in self.layers.values() {
            writeln!(f, "    {},", layer)?;
        }
        writeln!(f, "  ],")?;

        writeln!(f, "  data: [")?;
        for data in self.data.values() {
            writeln!(f, "    {},", data.desc)?;
        }
        writeln!(f, "  ],")?;

        writeln!(f, "}}")?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::data::DataDesc;
    use crate::error::ConvertError;
    use crate::layer::Layer;
    use crate::legacy::LegacyNetwork;
    use crate::network::{InputShapes, Network};
    use crate::precision::Precision;
    use crate::status::StatusCode;

    fn small_network() -> LegacyNetwork {
        let mut network = LegacyNetwork::new("net");

        let mut input = Layer::new("x", "Input", Precision::Fp32);
        input.outs.push("x".to_owned());
        network.add_layer(input).unwrap();
        network
            .add_data(DataDesc::new("x", Precision::Fp32, vec![1, 3, 4, 4]), "x")
            .unwrap();
        network.add_input("x").unwrap();

        let mut weights = Layer::new("w", "Const", Precision::Fp32);
        weights.outs.push("w".to_owned());
        network.add_layer(weights).unwrap();
        network
            .add_data(DataDesc::new("w", Precision::Fp32, vec![3, 1, 1]), "w")
            .unwrap();

        let mut add = Layer::new("add", "Eltwise", Precision::Fp32);
        add.set_param("operation", "sum");
        add.ins = vec![None, None];
        add.outs.push("add".to_owned());
        network.add_layer(add).unwrap();
        network
            .add_data(DataDesc::new("add", Precision::Fp32, vec![1, 3, 4, 4]), "add")
            .unwrap();
        network.connect("x", "add", 0).unwrap();
        network.connect("w", "add", 1).unwrap();
        network.add_output_data("add").unwrap();

        network
    }

    #[test]
    fn structure() {
        let network = small_network();
        network.validate().unwrap();
        assert_eq!(network.layer_count(), 3);
        assert_eq!(network.data("x").unwrap().input_to, vec![("add".to_owned(), 0)]);
        assert_eq!(network.outputs_info().keys().collect::<Vec<_>>(), vec!["add"]);
    }

    #[test]
    fn duplicates_rejected() {
        let mut network = small_network();
        assert_eq!(
            network.add_layer(Layer::new("add", "ReLU", Precision::Fp32)),
            Err(ConvertError::DuplicateLayer("add".to_owned()))
        );
    }

    #[test]
    fn unbound_slot_invalid() {
        let mut network = small_network();
        let mut relu = Layer::new("relu", "ReLU", Precision::Fp32);
        relu.ins = vec![None];
        network.add_layer(relu).unwrap();
        assert!(matches!(
            network.validate(),
            Err(ConvertError::UnconnectedInput { ref layer, port: 0 }) if layer == "relu"
        ));
    }

    #[test]
    fn batch_skips_constants() {
        let mut network = small_network();
        assert_eq!(network.batch_size(), 1);

        network.set_batch_size(4).unwrap();
        assert_eq!(network.batch_size(), 4);
        assert_eq!(network.find_data("add").unwrap().dims, vec![4, 3, 4, 4]);
        assert_eq!(network.find_data("w").unwrap().dims, vec![3, 1, 1]);
    }

    #[test]
    fn status_codes() {
        let mut network = small_network();
        assert_eq!(
            network.reshape(&InputShapes::new()).unwrap_err().code,
            StatusCode::NotImplemented
        );
        assert_eq!(network.add_output("missing", 0).unwrap_err().code, StatusCode::NotFound);
        assert_eq!(network.add_output("add", 3).unwrap_err().code, StatusCode::OutOfBounds);
    }
}
