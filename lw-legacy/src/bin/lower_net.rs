use clap::Parser;
use tracing_subscriber::EnvFilter;

use lw_graph::element::ElementType;
use lw_graph::function::Function;
use lw_graph::op::{ConvAttrs, PoolAttrs};
use lw_graph::shape;

use lw_legacy::convert::ConversionSettings;
use lw_legacy::network::Network;
use lw_legacy::serialize::TextSerializer;
use lw_legacy::wrapper::GraphNetwork;

/// Build a small sample network, optionally change its batch size and print the lowered legacy form.
#[derive(Debug, clap::Parser)]
struct Args {
    #[clap(short, long)]
    batch_size: Option<usize>,
    /// Change the batch size on the legacy network instead of reshaping the graph.
    #[clap(short, long)]
    legacy_batch: bool,
    #[clap(short, long)]
    keep_constants: bool,
    #[clap(short, long)]
    print_graph: bool,
}

fn sample_function() -> Function {
    let mut function = Function::new("sample");
    let x = function.parameter("input", ElementType::F32, shape![1, 3, 32, 32]);

    let w = function.constant_f32(&[8, 3, 3, 3], vec![0.1; 8 * 3 * 3 * 3]);
    let b = function.constant_f32(&[8], vec![0.0; 8]);
    let conv = function.convolution_ie(x, w, Some(b.into()), ConvAttrs::simple(2, 1, 1), 1);
    function.set_friendly_name(conv, "conv");
    let relu = function.relu(conv);
    function.set_friendly_name(relu, "relu");
    let pool = function.max_pool(relu, PoolAttrs::simple(&[2, 2], 2, 0));
    function.set_friendly_name(pool, "pool");
    let flat = function.reshape(pool, &[0, -1], true);
    function.set_friendly_name(flat, "flatten");
    let probs = function.softmax(flat, 1);
    function.set_friendly_name(probs, "probs");
    function.result(probs);

    function
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Args {
        batch_size,
        legacy_batch,
        keep_constants,
        print_graph,
    } = Args::parse();

    let function = sample_function();
    if print_graph {
        println!("{}", function);
    }

    let settings = ConversionSettings {
        keep_constant_inputs: keep_constants,
        ..ConversionSettings::default()
    };
    let mut network = GraphNetwork::with_settings(function, settings)?;

    if let Some(batch_size) = batch_size {
        if legacy_batch {
            network.set_batch_size(batch_size)?;
        } else {
            network.set_batch_size_reshape(batch_size)?;
        }
    }
    println!("Batch size: {}", network.batch_size());

    let mut serializer = TextSerializer::new();
    network.serialize(&mut serializer)?;
    println!("{}", serializer.output);

    Ok(())
}
