use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fifoflow::AsyncFifoQueue;

const MSG_COUNT: u64 = 100_000;

fn bench_buffered(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffered");
    group.throughput(Throughput::Elements(MSG_COUNT));

    // Producer runs ahead: every value goes through the buffer.
    group.bench_function("enqueue_then_drain", |b| {
        b.iter(|| {
            let queue = AsyncFifoQueue::with_capacity(MSG_COUNT as usize);
            for i in 0..MSG_COUNT {
                queue.enqueue(i).unwrap();
            }
            queue.close();
            while let Some(v) = queue.try_dequeue() {
                black_box(v);
            }
        });
    });

    group.finish();
}

fn bench_async_consumer(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("async_consumer");
    group.throughput(Throughput::Elements(MSG_COUNT));

    for producers in [1u64, 4] {
        group.bench_with_input(
            BenchmarkId::new("producers", producers),
            &producers,
            |b, &producers| {
                b.to_async(&runtime).iter(|| async move {
                    let queue = AsyncFifoQueue::new();
                    let per_producer = MSG_COUNT / producers;

                    let mut handles = Vec::new();
                    for _ in 0..producers {
                        let queue = queue.clone();
                        handles.push(tokio::spawn(async move {
                            for i in 0..per_producer {
                                queue.enqueue(i).unwrap();
                            }
                        }));
                    }

                    let consumer = {
                        let queue = queue.clone();
                        tokio::spawn(async move {
                            let mut count = 0u64;
                            while let Some(v) = queue.dequeue().await {
                                black_box(v);
                                count += 1;
                            }
                            count
                        })
                    };

                    for handle in handles {
                        handle.await.unwrap();
                    }
                    queue.close();
                    assert_eq!(consumer.await.unwrap(), per_producer * producers);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_buffered, bench_async_consumer);
criterion_main!(benches);
