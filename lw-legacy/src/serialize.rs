use std::fmt::Write;

use lw_graph::attribute::rt_keys;
use lw_graph::function::Function;

use crate::error::ConvertResult;
use crate::legacy::LegacyNetwork;

/// Receives a network to store it somewhere, the on-disk format is up to the implementation.
pub trait NetworkSerializer {
    fn serialize_legacy(&mut self, network: &LegacyNetwork) -> ConvertResult<()>;

    /// Called instead of [NetworkSerializer::serialize_legacy] for execution graphs,
    /// where every op carries profiling info.
    fn serialize_execution_graph(&mut self, function: &Function) -> ConvertResult<()>;
}

/// Serializer that renders the network as human-readable text.
#[derive(Debug, Default, Clone)]
pub struct TextSerializer {
    pub output: String,
}

impl TextSerializer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NetworkSerializer for TextSerializer {
    fn serialize_legacy(&mut self, network: &LegacyNetwork) -> ConvertResult<()> {
        // writing into a String can't fail
        let _ = write!(self.output, "{}", network);
        Ok(())
    }

    fn serialize_execution_graph(&mut self, function: &Function) -> ConvertResult<()> {
        let _ = writeln!(self.output, "ExecutionGraph {:?} {{", function.name());
        for node in function.ordered_ops() {
            let info = &function[node];
            let time = info
                .rt_info()
                .get(rt_keys::EXEC_TIME_MCS)
                .and_then(|v| v.as_str())
                .unwrap_or("?");
            let _ = writeln!(self.output, "  {} {:?} {}mcs,", info.type_name(), info.friendly_name(), time);
        }
        let _ = writeln!(self.output, "}}");
        Ok(())
    }
}
