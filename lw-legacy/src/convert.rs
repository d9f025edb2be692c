use tracing::{debug, instrument, trace};

use lw_graph::attribute::{fused_names, primitives_priority, rt_keys};
use lw_graph::function::{Function, Output};
use lw_graph::op::Op;

use crate::data::DataDesc;
use crate::error::{ConvertError, ConvertResult};
use crate::fusion::FusionPolicy;
use crate::layer::Layer;
use crate::legacy::LegacyNetwork;
use crate::lowering::LoweringRegistry;
use crate::network::Network;
use crate::precision::{Layout, Precision};

/// Settings for [convert_function_to_legacy].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ConversionSettings {
    /// Keep the weights of convolutions and fully connected ops as separate `Const` layers.
    /// Always the case if the function contains a `FakeQuantize`.
    pub keep_constant_inputs: bool,
    /// Check the parameters of every layer against its type schema.
    pub validate_params: bool,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        ConversionSettings {
            keep_constant_inputs: false,
            validate_params: true,
        }
    }
}

/// The name of the data flowing through `output`: the friendly name of the producer,
/// suffixed with the port index for producers with multiple outputs.
pub fn output_name(function: &Function, output: Output) -> String {
    let node = &function[output.node];
    if node.outputs().len() > 1 {
        format!("{}.{}", node.friendly_name(), output.index)
    } else {
        node.friendly_name().to_owned()
    }
}

fn is_memory(layer: &Layer, index: &str) -> bool {
    layer.layer_type == "Memory" && layer.param("index") == Some(index)
}

/// Lower `function` to a flat legacy network.
///
/// Data descriptors that `source` already knows by name are reused, keeping their precision and layout,
/// and the input infos of `source` are copied onto the inputs of the result.
/// The function itself is not modified.
#[instrument(name = "convert_function_to_legacy", skip_all, fields(function = function.name()), level = "debug")]
pub fn convert_function_to_legacy(
    function: &Function,
    source: &dyn Network,
    settings: ConversionSettings,
    registry: &LoweringRegistry,
) -> ConvertResult<LegacyNetwork> {
    let policy = FusionPolicy::new(function, settings.keep_constant_inputs);
    let consumers = policy.consumers();
    let mut network = LegacyNetwork::new(function.name());

    // create layers and their output data
    for node in function.ops() {
        if policy.is_internal_node(node) {
            continue;
        }
        let info = &function[node];
        let mut layer = registry.create(function, node)?;

        let rt_info = info.rt_info();
        if let Some(names) = fused_names(rt_info).filter(|n| !n.is_empty()) {
            layer.set_param("originalLayersNames", names);
        }
        if let Some(priority) = primitives_priority(rt_info).filter(|p| !p.is_empty()) {
            layer.set_param(rt_keys::PRIMITIVES_PRIORITY, priority);
        }
        for (key, value) in rt_info {
            if let Some(value) = value.as_str() {
                if key.eq_ignore_ascii_case(rt_keys::AFFINITY) {
                    layer.affinity = value.to_owned();
                } else {
                    layer.set_param(key, value);
                }
            }
        }

        let input_count = if is_memory(&layer, "1") {
            0
        } else {
            policy.input_slot_count(node)
        };
        layer.ins = vec![None; input_count];

        let mut outputs = vec![];
        for (index, output_type) in info.outputs().iter().enumerate() {
            let output = Output { node, index };

            // constants only feeding state reads have no data of their own
            if info.op().is_constant() {
                let targets = consumers.of(output);
                let all_to_read_value = !targets.is_empty()
                    && targets
                        .iter()
                        .all(|t| matches!(function[t.node].op(), Op::ReadValue { .. }));
                if all_to_read_value {
                    continue;
                }
            }

            if is_memory(&layer, "0") {
                outputs.clear();
                continue;
            }

            let name = output_name(function, output);
            let dims = output_type.shape.to_shape().ok_or_else(|| ConvertError::DynamicOutput {
                op_type: info.type_name().to_owned(),
                name: info.friendly_name().to_owned(),
                layer_type: layer.layer_type.clone(),
                index,
                shape: output_type.shape.clone(),
            })?;
            if dims.iter().any(|&d| d == 0) {
                return Err(ConvertError::ZeroDimension {
                    layer_type: layer.layer_type.clone(),
                    name: layer.name.clone(),
                    index,
                });
            }

            let desc = match source.find_data(&name) {
                Some(mut existing) => {
                    let layout = if existing.rank() == dims.len() {
                        existing.layout
                    } else {
                        Layout::by_rank(dims.len())
                    };
                    existing.dims = dims;
                    existing.layout = layout;
                    existing
                }
                None => {
                    let precision = Precision::from_element_type(output_type.element_type)
                        .ok_or(ConvertError::UnsupportedPrecision(output_type.element_type))?;
                    DataDesc::new(name, precision, dims)
                }
            };
            outputs.push(desc);
        }

        layer.outs = outputs.iter().map(|d| d.name.clone()).collect();
        let layer_name = layer.name.clone();
        trace!("Created layer {} for {:?}", layer, node);
        network.add_layer(layer)?;

        for desc in outputs {
            let data_name = desc.name.clone();
            network.add_data(desc, &layer_name)?;
            if info.op().is_parameter() {
                network.add_input(&data_name)?;
            }
        }
    }

    // wire layer inputs
    for node in function.ordered_ops() {
        let info = &function[node];
        match info.op() {
            Op::ReadValue { .. } => continue,
            Op::Result => {
                if info.inputs().len() != 1 {
                    return Err(ConvertError::ResultInputs {
                        name: info.friendly_name().to_owned(),
                        count: info.inputs().len(),
                    });
                }
                network.add_output_data(&output_name(function, info.inputs()[0]))?;
                continue;
            }
            _ => {}
        }

        let mut skipped = 0;
        for (index, &input) in info.inputs().iter().enumerate() {
            if policy.is_skipped_edge(input, node) {
                skipped += 1;
                continue;
            }

            let prev_name = function[input.node].friendly_name();
            let prev = network
                .layer(prev_name)
                .ok_or_else(|| ConvertError::LayerNotFound(prev_name.to_owned()))?;
            let this = network
                .layer(info.friendly_name())
                .ok_or_else(|| ConvertError::LayerNotFound(info.friendly_name().to_owned()))?;

            let slot = index - skipped;
            if slot >= this.ins.len() || input.index >= prev.outs.len() {
                return Err(ConvertError::IncorrectStructure {
                    layer: this.name.clone(),
                    layer_type: this.layer_type.clone(),
                    input_port: index,
                    input_count: this.ins.len(),
                    prev: prev.name.clone(),
                    prev_type: prev.layer_type.clone(),
                    output_port: input.index,
                    output_count: prev.outs.len(),
                });
            }

            let data = prev.outs[input.index].clone();
            let this_name = this.name.clone();
            network.connect(&data, &this_name, slot)?;
        }
    }

    // every slot must be bound
    for layer in network.layers() {
        if let Some(port) = layer.ins.iter().position(|i| i.is_none()) {
            return Err(ConvertError::UnconnectedInput {
                layer: layer.name.clone(),
                port,
            });
        }
        if settings.validate_params && !layer.params.contains_key(rt_keys::EXEC_TIME_MCS) {
            layer.validate_params()?;
        }
    }

    // carry over the caller-visible input infos
    let source_inputs = source.inputs_info();
    let result_inputs = network.inputs_info();
    if source_inputs.len() != result_inputs.len() {
        return Err(ConvertError::InputCountMismatch {
            expected: source_inputs.len(),
            actual: result_inputs.len(),
        });
    }
    for name in result_inputs.keys() {
        let info = source_inputs
            .get(name)
            .ok_or_else(|| ConvertError::MissingSourceInput(name.clone()))?;
        let mut info = info.clone();
        info.data.name = name.clone();
        network.set_input_info(&info)?;
    }

    for extension in function.extensions() {
        network.add_extension(extension.clone());
    }

    debug!(
        "Converted {} ops into {} layers",
        function.ops().len(),
        network.layer_count()
    );
    Ok(network)
}
