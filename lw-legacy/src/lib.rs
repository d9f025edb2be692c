#![warn(missing_debug_implementations)]
#![allow(clippy::new_without_default)]

//! Lowering of [lw_graph] functions into flat legacy layer networks.
//!
//! The entry point for most users is [GraphNetwork](wrapper::GraphNetwork), which wraps a function,
//! derives the input and output descriptors from it and converts it to a
//! [LegacyNetwork](legacy::LegacyNetwork) only when needed:
//! ```
//! # use lw_graph::function::Function;
//! # use lw_graph::element::ElementType;
//! # use lw_graph::op::PoolAttrs;
//! # use lw_graph::shape;
//! # use lw_legacy::wrapper::GraphNetwork;
//! let mut function = Function::new("net");
//! let x = function.parameter("x", ElementType::F32, shape![1, 3, 8, 8]);
//! let y = function.max_pool(x, PoolAttrs::simple(&[2, 2], 2, 0));
//! function.set_friendly_name(y, "pool");
//! function.result(y);
//!
//! let mut network = GraphNetwork::new(function).unwrap();
//! let legacy = network.to_legacy().unwrap();
//! let pool = legacy.layer("pool").unwrap();
//! assert_eq!(pool.layer_type, "Pooling");
//! assert_eq!(pool.param("pool-method"), Some("max"));
//! ```
//!
//! The conversion itself is [convert_function_to_legacy](convert::convert_function_to_legacy),
//! with per-type layer creation in [lowering].

pub mod convert;
pub mod data;
pub mod error;
/// Which constants are folded into their consumers as weights.
pub mod fusion;
pub mod layer;
pub mod legacy;
pub mod lowering;
/// The [Network](network::Network) trait shared by both network forms.
pub mod network;
/// Conversion of typed op attributes to string parameters.
pub mod params;
pub mod precision;
pub mod serialize;
pub mod status;
pub mod wrapper;
