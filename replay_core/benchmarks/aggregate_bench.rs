use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use replay_core::{aggregate, BoardSize, EntityBeliefs, EntitySelection};
use telemetry_proto::{decode_tracker_stream, encode_tracker_stream, BeliefTensor, TrackerRecord};

const ENTITIES: usize = 16;

fn beliefs(size: usize) -> EntityBeliefs {
    (0..ENTITIES)
        .map(|entity| {
            let grid = (0..size)
                .map(|x| {
                    (0..size)
                        .map(|y| ((x * 31 + y * 17 + entity) % 97) as f64 / 97.0)
                        .collect()
                })
                .collect();
            (entity, grid)
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for size in [8usize, 16, 24, 48] {
        let tensors = beliefs(size);
        let board = BoardSize::new(size, size);
        let selection = EntitySelection::all(ENTITIES);
        group.bench_with_input(BenchmarkId::new("board", size), &size, |b, _| {
            b.iter(|| aggregate(black_box(&tensors), &selection, board))
        });
    }

    group.finish();
}

fn bench_tracker_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker_decode");

    for frames in [10u64, 100, 500] {
        let records: Vec<TrackerRecord> = (0..frames)
            .map(|frame_index| TrackerRecord {
                frame_index,
                tensor: BeliefTensor::new(beliefs(24).into_values().collect()),
            })
            .collect();
        let bytes = encode_tracker_stream(&records);
        group.bench_with_input(BenchmarkId::new("frames", frames), &bytes, |b, bytes| {
            b.iter_batched(
                || bytes.clone(),
                |bytes| decode_tracker_stream(&bytes),
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(aggregate_benches, bench_aggregate, bench_tracker_decode);
criterion_main!(aggregate_benches);
