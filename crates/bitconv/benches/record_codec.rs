use bitconv::{ConverterService, DescriptorSet, RecordProvider, RecordSchema, TypeUse};
use criterion::{Criterion, criterion_group, criterion_main};

#[derive(Debug, Default, Clone)]
struct Telemetry {
    node: u8,
    armed: bool,
    mode: u8,
    channels: [i16; 4],
    counter: u32,
}

fn schema() -> RecordSchema<Telemetry> {
    RecordSchema::<Telemetry>::new()
        .default_constructor()
        .fixed_bytes(16)
        .field("node", DescriptorSet::at(0), |r| &r.node, |r| &mut r.node)
        .field("armed", DescriptorSet::at(8), |r| &r.armed, |r| &mut r.armed)
        .field("mode", DescriptorSet::at(9).width(3), |r| &r.mode, |r| &mut r.mode)
        .field("ch0", DescriptorSet::at(12).width(12), |r| &r.channels[0], |r| &mut r.channels[0])
        .field("ch1", DescriptorSet::at(24).width(12), |r| &r.channels[1], |r| &mut r.channels[1])
        .field("ch2", DescriptorSet::at(36).width(12), |r| &r.channels[2], |r| &mut r.channels[2])
        .field("ch3", DescriptorSet::at(48).width(12), |r| &r.channels[3], |r| &mut r.channels[3])
        .field("counter", DescriptorSet::at(64), |r| &r.counter, |r| &mut r.counter)
}

fn bench_record_codec(c: &mut Criterion) {
    let service = ConverterService::with_primitives();
    service.register(RecordProvider::new().record(schema()));
    let converter = service.converter::<Telemetry>().unwrap();

    let value = Telemetry {
        node: 7,
        armed: true,
        mode: 5,
        channels: [-1024, 17, 2047, -3],
        counter: 0xDEAD_BEEF,
    };
    let bytes = converter.encode_bytes(&value).unwrap();

    c.bench_function("encode_record", |b| {
        b.iter(|| converter.encode_bytes(&value).unwrap())
    });

    c.bench_function("decode_record", |b| {
        b.iter(|| converter.decode_bytes(&bytes).unwrap())
    });

    c.bench_function("resolve_cached", |b| {
        let type_use = TypeUse::of::<Telemetry>();
        b.iter(|| service.resolve(&type_use).unwrap())
    });
}

criterion_group!(benches, bench_record_codec);
criterion_main!(benches);
