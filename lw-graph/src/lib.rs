#![warn(missing_debug_implementations)]
#![allow(clippy::new_without_default)]

//! A versioned-operator graph intermediate representation.
//!
//! The core type of this crate is [Function](function::Function), a dataflow graph of [Op](op::Op)s
//! with partial shapes, see its documentation for how to build one.
//! Output types are inferred when nodes are added, and can be re-inferred after parameters change:
//! ```
//! # use lw_graph::function::Function;
//! # use lw_graph::element::ElementType;
//! # use lw_graph::op::PoolAttrs;
//! # use lw_graph::shape;
//! let mut function = Function::new("net");
//! let x = function.parameter("x", ElementType::F32, shape![1, 3, 8, 8]);
//! let y = function.avg_pool(x, PoolAttrs::simple(&[2, 2], 2, 0), true);
//! let result = function.result(y);
//!
//! function.replace_parameter(0, ElementType::F32, shape![4, 3, 8, 8]).unwrap();
//! function.validate_nodes_and_infer_types().unwrap();
//! assert_eq!(function[result].outputs()[0].shape, shape![4, 3, 4, 4]);
//! ```

/// The [ndarray] crate is used for constant storage and folding, and re-exported for convenience.
pub use ndarray;

/// Typed attribute values and the runtime info bag.
pub mod attribute;
mod build;
/// The [ElementType](element::ElementType) enum.
pub mod element;
pub mod error;
pub mod extension;
/// The core graph datastructure.
pub mod function;
mod infer;
pub mod op;
/// Graph rewrites.
pub mod passes;
/// The [PartialShape](shape::PartialShape) type and utilities.
pub mod shape;
