use std::fmt::{Display, Formatter};

use lw_graph::element::ElementType;

/// Element precision of legacy data and blobs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Precision {
    Unspecified,
    Mixed,
    Fp32,
    Fp16,
    Bf16,
    Fp64,
    /// Fixed point, 7 integer and 8 fractional bits.
    Q78,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bin,
    Bool,
}

/// Memory layout of legacy data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Layout {
    Any,
    Nchw,
    Nhwc,
    Ncdhw,
    Ndhwc,
    Oihw,
    Scalar,
    C,
    Chw,
    Hw,
    Nc,
    Cn,
    Blocked,
}

impl Precision {
    pub fn name(self) -> &'static str {
        match self {
            Precision::Unspecified => "UNSPECIFIED",
            Precision::Mixed => "MIXED",
            Precision::Fp32 => "FP32",
            Precision::Fp16 => "FP16",
            Precision::Bf16 => "BF16",
            Precision::Fp64 => "FP64",
            Precision::Q78 => "Q78",
            Precision::I8 => "I8",
            Precision::I16 => "I16",
            Precision::I32 => "I32",
            Precision::I64 => "I64",
            Precision::U8 => "U8",
            Precision::U16 => "U16",
            Precision::U32 => "U32",
            Precision::U64 => "U64",
            Precision::Bin => "BIN",
            Precision::Bool => "BOOL",
        }
    }

    /// The legacy precision of a graph element type, `None` for [ElementType::Dynamic].
    pub fn from_element_type(element_type: ElementType) -> Option<Precision> {
        let precision = match element_type {
            ElementType::Dynamic => return None,
            ElementType::Boolean => Precision::Bool,
            ElementType::Bf16 => Precision::Bf16,
            ElementType::F16 => Precision::Fp16,
            ElementType::F32 => Precision::Fp32,
            ElementType::F64 => Precision::Fp64,
            ElementType::I8 => Precision::I8,
            ElementType::I16 => Precision::I16,
            ElementType::I32 => Precision::I32,
            ElementType::I64 => Precision::I64,
            ElementType::U1 => Precision::Bin,
            ElementType::U8 => Precision::U8,
            ElementType::U16 => Precision::U16,
            ElementType::U32 => Precision::U32,
            ElementType::U64 => Precision::U64,
        };
        Some(precision)
    }

    /// The precision a network input is exposed with.
    pub fn normalize_input(self) -> Precision {
        match self {
            Precision::Fp16 => Precision::Fp32,
            Precision::Q78 => Precision::I16,
            other => other,
        }
    }

    /// The precision a network output is exposed with.
    pub fn normalize_output(self) -> Precision {
        match self {
            Precision::Fp32 | Precision::I32 => self,
            Precision::I64 => Precision::I32,
            _ => Precision::Fp32,
        }
    }
}

impl Layout {
    pub fn name(self) -> &'static str {
        match self {
            Layout::Any => "ANY",
            Layout::Nchw => "NCHW",
            Layout::Nhwc => "NHWC",
            Layout::Ncdhw => "NCDHW",
            Layout::Ndhwc => "NDHWC",
            Layout::Oihw => "OIHW",
            Layout::Scalar => "SCALAR",
            Layout::C => "C",
            Layout::Chw => "CHW",
            Layout::Hw => "HW",
            Layout::Nc => "NC",
            Layout::Cn => "CN",
            Layout::Blocked => "BLOCKED",
        }
    }

    /// The canonical layout for data of the given rank.
    pub fn by_rank(rank: usize) -> Layout {
        match rank {
            0 => Layout::Scalar,
            1 => Layout::C,
            2 => Layout::Nc,
            3 => Layout::Chw,
            4 => Layout::Nchw,
            5 => Layout::Ncdhw,
            _ => Layout::Blocked,
        }
    }

    /// Whether this layout can describe data of the given rank.
    pub fn is_compatible(self, rank: usize) -> bool {
        match rank {
            0 => self == Layout::Scalar,
            1 => self == Layout::C,
            2 => matches!(self, Layout::Cn | Layout::Hw | Layout::Nc),
            3 => self == Layout::Chw,
            4 => matches!(self, Layout::Nchw | Layout::Nhwc),
            5 => matches!(self, Layout::Ncdhw | Layout::Ndhwc),
            _ => false,
        }
    }
}

impl Display for Precision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Display for Layout {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
