use criterion::{criterion_group, criterion_main, Criterion};
use jobarchive::hash::{hash_bytes, TaskHasher};

pub fn bench_hash(c: &mut Criterion) {
    let content = vec![b'x'; 1 << 20];
    c.bench_function("hash 1MiB", |b| {
        b.iter(|| hash_bytes(&content));
    });

    let inputs: Vec<_> = (0..64u32).map(|i| hash_bytes(&i.to_le_bytes())).collect();
    c.bench_function("task id 64 inputs", |b| {
        b.iter(|| {
            let mut hasher = TaskHasher::default();
            for &input in &inputs {
                hasher.write_input(input);
            }
            hasher.write_command("cc -c foo.c -o foo.o");
            hasher.finish()
        })
    });
}

criterion_group!(benches, bench_hash);
criterion_main!(benches);
