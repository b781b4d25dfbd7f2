#[macro_use]
extern crate bencher;

use bencher::Bencher;

use rfield_lib::nn::{parse_specs, Initializer, Sequential};
use rfield_lib::{Device, ProbeConfig, ProbeContext, ProbeRunner};

const DNN: &str = "[Conv(out: 8, kernel: 3, pad: 1), Relu, MaxPool(kernel: 2), Conv(out: 8, kernel: 3, pad: 1), Relu]";

fn network() -> Sequential {
    Sequential::build(&parse_specs(DNN).unwrap(), 3, Initializer::HeNormal).unwrap()
}

fn probe(bench: &mut Bencher, device: Device, workers: usize) {
    let dnn = network();
    let config = ProbeConfig { batch_size: 32, workers, ..Default::default() };
    let runner = ProbeRunner::new(ProbeContext::new(&dnn, device), 24, 24, config).unwrap();
    bench.iter(|| runner.run().unwrap());
}

fn probe_cpu(bench: &mut Bencher) {
    probe(bench, Device::Cpu, 0);
}

fn probe_threads(bench: &mut Bencher) {
    probe(bench, Device::Threads(4), 2);
}

benchmark_group!(benches, probe_cpu, probe_threads);
benchmark_main!(benches);
