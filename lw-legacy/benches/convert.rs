use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lw_graph::element::ElementType;
use lw_graph::function::Function;
use lw_graph::op::{ConvAttrs, PoolAttrs};
use lw_graph::shape;

use lw_legacy::convert::{convert_function_to_legacy, ConversionSettings};
use lw_legacy::lowering::global;
use lw_legacy::network::Network;
use lw_legacy::wrapper::GraphNetwork;

fn conv_stack(depth: usize) -> Function {
    let mut function = Function::new("conv_stack");
    let mut curr = function.parameter("input", ElementType::F32, shape![1, 16, 32, 32]);
    for i in 0..depth {
        let w = function.constant_f32(&[16, 16, 3, 3], vec![0.01; 16 * 16 * 3 * 3]);
        let b = function.constant_f32(&[16], vec![0.0; 16]);
        let conv = function.convolution_ie(curr, w, Some(b.into()), ConvAttrs::simple(2, 1, 1), 1);
        function.set_friendly_name(conv, format!("conv{}", i));
        curr = function.relu(conv);
        function.set_friendly_name(curr, format!("relu{}", i));
    }
    let pool = function.avg_pool(curr, PoolAttrs::simple(&[2, 2], 2, 0), true);
    function.result(pool);
    function
}

fn convert(c: &mut Criterion) {
    let function = conv_stack(64);
    let network = GraphNetwork::new(function.clone()).unwrap();

    c.bench_function("convert conv stack 64", |b| {
        b.iter(|| convert_function_to_legacy(black_box(&function), &network, ConversionSettings::default(), global()))
    });

    c.bench_function("batch reshape conv stack 64", |b| {
        b.iter(|| {
            let mut network = GraphNetwork::new(function.clone()).unwrap();
            network.set_batch_size_reshape(black_box(8)).unwrap();
            network.batch_size()
        })
    });
}

criterion_group!(benches, convert);
criterion_main!(benches);
