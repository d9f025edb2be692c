use std::fmt::{Debug, Display, Formatter};

use itertools::Itertools;

/// Build a [PartialShape] from a list of dimensions.
/// Each element can be a `usize` or a [Dimension], use [Dimension::DYNAMIC] for an unknown size.
#[macro_export]
macro_rules! shape {
    [$($value:expr),* $(,)?] => {
        $crate::shape::PartialShape::new(vec![$($crate::shape::Dimension::from($value)),*])
    };
}

/// A single dimension of a [PartialShape], either a fixed length or dynamic.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Dimension(Option<usize>);

/// A shape where the rank and the individual dimensions may be dynamic.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PartialShape {
    dims: Option<Vec<Dimension>>,
}

impl Dimension {
    pub const DYNAMIC: Dimension = Dimension(None);

    pub const fn fixed(length: usize) -> Dimension {
        Dimension(Some(length))
    }

    pub fn is_static(self) -> bool {
        self.0.is_some()
    }

    pub fn is_dynamic(self) -> bool {
        self.0.is_none()
    }

    pub fn get_length(self) -> Option<usize> {
        self.0
    }

    /// Combine two dimensions that must describe the same axis.
    pub fn merge(self, other: Dimension) -> Option<Dimension> {
        match (self.0, other.0) {
            (None, _) => Some(other),
            (_, None) => Some(self),
            (Some(a), Some(b)) if a == b => Some(self),
            _ => None,
        }
    }

    /// Numpy-style broadcast of two dimensions.
    pub fn broadcast(self, other: Dimension) -> Option<Dimension> {
        match (self.0, other.0) {
            (Some(1), _) => Some(other),
            (_, Some(1)) => Some(self),
            (None, _) | (_, None) => Some(Dimension::DYNAMIC),
            (Some(a), Some(b)) if a == b => Some(self),
            _ => None,
        }
    }
}

impl From<usize> for Dimension {
    fn from(length: usize) -> Self {
        Dimension::fixed(length)
    }
}

impl PartialShape {
    pub const SCALAR: PartialShape = PartialShape { dims: Some(vec![]) };

    pub fn new(dims: Vec<Dimension>) -> PartialShape {
        PartialShape { dims: Some(dims) }
    }

    pub fn fixed(dims: &[usize]) -> PartialShape {
        PartialShape::new(dims.iter().map(|&d| Dimension::fixed(d)).collect_vec())
    }

    /// A shape of which not even the rank is known.
    pub fn dynamic() -> PartialShape {
        PartialShape { dims: None }
    }

    /// A shape with known rank but all dimensions dynamic.
    pub fn dynamic_of_rank(rank: usize) -> PartialShape {
        PartialShape::new(vec![Dimension::DYNAMIC; rank])
    }

    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(|d| d.len())
    }

    pub fn dims(&self) -> Option<&[Dimension]> {
        self.dims.as_deref()
    }

    pub fn is_static(&self) -> bool {
        match &self.dims {
            None => false,
            Some(dims) => dims.iter().all(|d| d.is_static()),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    /// The concrete shape, if every dimension is known.
    pub fn to_shape(&self) -> Option<Vec<usize>> {
        self.dims.as_ref()?.iter().map(|d| d.get_length()).collect()
    }

    pub fn dim(&self, axis: usize) -> Dimension {
        match &self.dims {
            None => Dimension::DYNAMIC,
            Some(dims) => dims[axis],
        }
    }

    /// Replace the dimension at `axis`.
    ///
    /// # Panics
    /// If the rank is dynamic or `axis` is out of bounds.
    pub fn set_dim(&mut self, axis: usize, dim: impl Into<Dimension>) {
        match &mut self.dims {
            Some(dims) => dims[axis] = dim.into(),
            None => panic!("Cannot set dimension {} of dynamic-rank shape", axis),
        }
    }

    pub fn merge(&self, other: &PartialShape) -> Option<PartialShape> {
        match (&self.dims, &other.dims) {
            (None, _) => Some(other.clone()),
            (_, None) => Some(self.clone()),
            (Some(a), Some(b)) => {
                if a.len() != b.len() {
                    return None;
                }
                let dims = a.iter().zip(b).map(|(&a, &b)| a.merge(b)).collect::<Option<Vec<_>>>()?;
                Some(PartialShape::new(dims))
            }
        }
    }

    /// Numpy-style broadcast, aligning both shapes on their trailing axes.
    pub fn broadcast(&self, other: &PartialShape) -> Option<PartialShape> {
        let (a, b) = match (&self.dims, &other.dims) {
            (Some(a), Some(b)) => (a, b),
            _ => return Some(PartialShape::dynamic()),
        };

        let rank = a.len().max(b.len());
        let get = |dims: &[Dimension], i: usize| {
            let offset = rank - dims.len();
            if i < offset {
                Dimension::fixed(1)
            } else {
                dims[i - offset]
            }
        };

        let dims = (0..rank)
            .map(|i| get(a, i).broadcast(get(b, i)))
            .collect::<Option<Vec<_>>>()?;
        Some(PartialShape::new(dims))
    }
}

/// Resolve a possibly negative axis against a rank.
pub fn normalize_axis(axis: i64, rank: usize) -> Option<usize> {
    let rank = rank as i64;
    let axis = if axis < 0 { axis + rank } else { axis };
    if (0..rank).contains(&axis) {
        Some(axis as usize)
    } else {
        None
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(length) => write!(f, "{}", length),
            None => write!(f, "?"),
        }
    }
}

impl Debug for Dimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dimension({})", self)
    }
}

impl Display for PartialShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.dims {
            None => write!(f, "(...)"),
            Some(dims) => fmt_shape_impl(f, dims),
        }
    }
}

impl Debug for PartialShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PartialShape{}", self)
    }
}

fn fmt_shape_impl(f: &mut Formatter, dims: &[impl Display]) -> Result<(), std::fmt::Error> {
    write!(f, "(")?;
    for i in 0..dims.len() {
        if i != 0 {
            write!(f, " x ")?;
        }

        write!(f, "{}", dims[i])?;
    }
    write!(f, ")")?;
    Ok(())
}
