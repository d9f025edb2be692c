use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::precision::{Layout, Precision};

/// A named, shaped and typed tensor handle of a legacy network.
///
/// Layers refer to descriptors by name, the owning network maps the name to the descriptor
/// and to the layers producing and consuming it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DataDesc {
    pub name: String,
    pub precision: Precision,
    pub dims: Vec<usize>,
    pub layout: Layout,
}

/// Caller-visible metadata of a network input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputInfo {
    pub data: DataDesc,
    pub pre_process: PreProcessInfo,
}

/// Preprocessing requested by the caller for an input, carried along untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreProcessInfo {
    pub resize_algorithm: ResizeAlgorithm,
    pub color_format: ColorFormat,
    pub mean_variant: MeanVariant,
    /// Per-channel mean values, only used for [MeanVariant::MeanValue].
    pub mean_values: Vec<f32>,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ResizeAlgorithm {
    #[default]
    NoResize,
    Bilinear,
    Area,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ColorFormat {
    #[default]
    Raw,
    Rgb,
    Bgr,
    Rgbx,
    Bgrx,
    Nv12,
    I420,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum MeanVariant {
    MeanImage,
    MeanValue,
    #[default]
    NoMean,
}

impl DataDesc {
    /// A descriptor with the canonical layout for the rank of `dims`.
    pub fn new(name: impl Into<String>, precision: Precision, dims: Vec<usize>) -> Self {
        let layout = Layout::by_rank(dims.len());
        DataDesc {
            name: name.into(),
            precision,
            dims,
            layout,
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Replace the dims, keeping the layout if it still fits the new rank.
    pub fn reshape(&mut self, dims: Vec<usize>) {
        if !self.layout.is_compatible(dims.len()) {
            self.layout = Layout::by_rank(dims.len());
        }
        self.dims = dims;
    }
}

impl InputInfo {
    pub fn new(data: DataDesc) -> Self {
        InputInfo {
            data,
            pre_process: PreProcessInfo::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }
}

impl Display for DataDesc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} [{}] {}",
            self.name,
            self.precision,
            self.dims.iter().join(", "),
            self.layout
        )
    }
}
