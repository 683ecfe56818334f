use collab_core::name::decode;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const NAMES: [&str; 4] = [
    "id:000000,orig:seed",
    "id:000001,src:000000,op:flip1,pos:0,+cov",
    "id:000092,src:000040+000088,op:splice,rep:2",
    "id:000024,src:000001,op:int16,pos:0,val:be:+512,+cov",
];

pub fn bench_name_decode(c: &mut Criterion) {
    c.bench_function("name-decode", |b| {
        b.iter(|| {
            for name in NAMES.iter() {
                let info = decode(black_box(name)).unwrap();
                black_box(info.get("src"));
            }
        })
    });
}

criterion_group!(benches, bench_name_decode);
criterion_main!(benches);
