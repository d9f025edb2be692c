use thiserror::Error;

use lw_graph::element::ElementType;
use lw_graph::error::GraphError;
use lw_graph::shape::PartialShape;

pub type ConvertResult<T> = Result<T, ConvertError>;

/// Everything that can go wrong while lowering a function or mutating a network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("{op_type} operation has a form that is not supported. {name} should be converted to {target} operation.")]
    UnsupportedOperation {
        op_type: String,
        name: String,
        target: String,
    },

    #[error("Error converting graph to legacy network. Attribute adapter can not be found for {name} parameter")]
    UnknownAttribute { name: String },

    #[error("Attribute {name} has dynamic shape {shape} where a static one is required")]
    DynamicAttribute { name: String, shape: PartialShape },

    #[error("Element type {0} has no legacy precision")]
    UnsupportedPrecision(ElementType),

    #[error(
        "Graph {op_type} operation with name: {name} cannot be converted to {layer_type} layer with name: {name} \
         because output with index {index} contains dynamic shapes: {shape}. \
         Try to use reshape() in order to specialize shapes before the conversion."
    )]
    DynamicOutput {
        op_type: String,
        name: String,
        layer_type: String,
        index: usize,
        shape: PartialShape,
    },

    #[error("{layer_type} layer {name} has incorrect dimensions in the output data {index}")]
    ZeroDimension {
        layer_type: String,
        name: String,
        index: usize,
    },

    #[error("{name} has zero dimension which is not allowed")]
    ZeroDataDimension { name: String },

    #[error("Cannot find layer with name: {0}")]
    LayerNotFound(String),

    #[error("Cannot find data with name: {0}")]
    DataNotFound(String),

    #[error("Layer with name {0} already exists in the network")]
    DuplicateLayer(String),

    #[error("Layer {layer} has {count} outputs, output {index} does not exist")]
    OutputOutOfBounds { layer: String, index: usize, count: usize },

    #[error("Data with name {0} is produced by more than one layer")]
    DuplicateData(String),

    #[error(
        "Network structure is incorrect! Input port {input_port} (max {input_count}) of {layer_type} layer {layer} \
         cannot be connected with output port {output_port} (max {output_count}) of {prev_type} layer {prev}"
    )]
    IncorrectStructure {
        layer: String,
        layer_type: String,
        input_port: usize,
        input_count: usize,
        prev: String,
        prev_type: String,
        output_port: usize,
        output_count: usize,
    },

    #[error("Layer {layer} input port {port} is not connected to any data")]
    UnconnectedInput { layer: String, port: usize },

    #[error("Result {name} must have exactly one input, got {count}")]
    ResultInputs { name: String, count: usize },

    #[error("Invalid value {value:?} for parameter {key} of {layer_type} layer {layer}: expected {expected}")]
    InvalidParam {
        layer: String,
        layer_type: String,
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Missing parameter {key} of {layer_type} layer {layer}")]
    MissingParam {
        layer: String,
        layer_type: String,
        key: String,
    },

    #[error("{layer_type} layer {layer} needs a constant for input {index}")]
    NonConstantInput {
        layer: String,
        layer_type: String,
        index: usize,
    },

    #[error("Weights of {layer_type} layer {layer} must have a static shape, got {shape}")]
    DynamicWeights {
        layer: String,
        layer_type: String,
        shape: PartialShape,
    },

    #[error("Cannot get {expected} attributes from node {name} of type {op_type}")]
    CastFailed {
        name: String,
        op_type: String,
        expected: &'static str,
    },

    #[error("Not supported eltwise type {kind} of node {name}")]
    UnsupportedEltwise { name: String, kind: String },

    #[error("Converted network has {actual} inputs but the source network has {expected}")]
    InputCountMismatch { expected: usize, actual: usize },

    #[error("Source network has no input {0}")]
    MissingSourceInput(String),

    #[error("All operations in the graph function should have unique friendly names! Duplicate: {0}")]
    DuplicateFriendlyName(String),

    #[error("Cannot set batch size! Network contains inputs with dynamic shapes: {0}")]
    DynamicBatch(String),

    #[error("{0} is not implemented")]
    NotImplemented(String),
}
