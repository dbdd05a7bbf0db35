//! Demonstration of fifoflow-stream features.
//!
//! Run with: `cargo run -p fifoflow-stream --features demo --bin demo`
//! Set `FIFOFLOW_DEBUG=1` to see the library's debug logs.

use fifoflow_stream::{
    copy_with_config, into_stream, memory_sink, push_source, spawn_copy, AsyncFifoQueue,
    CopyError, FlowConfig, FlowController, FlowState, StreamExt,
};
use std::time::Duration;
use tokio::time::timeout;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let level = if std::env::var_os("FIFOFLOW_DEBUG").is_some() {
        Level::TRACE
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    println!("=== fifoflow-stream Demo ===\n");

    demo_queue_basics().await?;
    demo_multiple_producers().await?;
    demo_backpressure_copy().await?;
    demo_push_source().await?;
    demo_configuration_presets();
    demo_abort().await?;

    println!("\n=== All demos completed successfully! ===");
    Ok(())
}

/// Demo 1: Early consumer, close, and async iteration
async fn demo_queue_basics() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 1: Queue Basics ---");

    let queue = AsyncFifoQueue::new();

    // Ask before anything exists; the next enqueue goes straight to us
    let early = queue.dequeue();
    queue.enqueue(1)?;
    println!("  Early consumer got: {:?}", early.await);

    for i in 2..=4 {
        queue.enqueue(i)?;
    }
    queue.close();

    if let Err(e) = queue.enqueue(5) {
        let reason = e.to_string();
        println!("  Enqueue after close rejected: {} (value {})", reason, e.into_inner());
    }

    let rest: Vec<i32> = into_stream(queue).collect().await;
    println!("  Drained after close: {:?}", rest);
    println!("  ✓ Queue basics complete\n");
    Ok(())
}

/// Demo 2: Many producers, one consumer
async fn demo_multiple_producers() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 2: Multiple Producers ---");

    let queue = AsyncFifoQueue::new();

    let mut producers = Vec::new();
    for p in 1..=3 {
        let queue = queue.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..3 {
                queue.enqueue(format!("P{}-{}", p, i)).ok();
                tokio::task::yield_now().await;
            }
        }));
    }

    for producer in producers {
        producer.await?;
    }
    queue.close();

    let received: Vec<String> = into_stream(queue.clone()).collect().await;
    println!("  Received {} items: {:?}", received.len(), received);
    println!(
        "  Metrics: enqueued={}, dequeued={}, handed_off={}",
        queue.metrics().enqueued(),
        queue.metrics().dequeued(),
        queue.metrics().handed_off()
    );
    println!("  ✓ Multiple producers complete\n");
    Ok(())
}

/// Demo 3: Copy into a small sink with a slow reader
async fn demo_backpressure_copy() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 3: Backpressure Copy ---");

    let config = FlowConfig::default().with_high_water_mark(8);
    let (producer, source) = push_source::<Vec<u8>>();
    let (sink, mut reader) = memory_sink(&config);

    // Producer runs far ahead of the reader
    for chunk in (0u8..64).collect::<Vec<_>>().chunks(4) {
        producer.push(chunk.to_vec())?;
    }
    producer.end();

    let controller = FlowController::new(source, sink).with_config(config);
    let mut states = controller.subscribe();
    let copy = tokio::spawn(controller.run());

    let watcher = tokio::spawn(async move {
        let mut throttled = 0;
        while states.changed().await.is_ok() {
            if *states.borrow() == FlowState::Throttled {
                throttled += 1;
            }
        }
        throttled
    });

    let mut bytes = 0;
    while let Some(chunk) = reader.read().await {
        bytes += chunk.len();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let stats = copy.await??;
    println!(
        "  Copied {} chunks ({} bytes), throttled {} times",
        stats.chunks_copied, bytes, stats.throttle_count
    );
    println!("  Watcher observed {} throttle transitions", watcher.await?);
    println!("  ✓ Backpressure copy complete\n");
    Ok(())
}

/// Demo 4: A cooperative push producer
async fn demo_push_source() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 4: Push Source ---");

    let config = FlowConfig::low_latency().with_high_water_mark(16);
    let (producer, source) = push_source::<String>();
    let (sink, mut reader) = memory_sink(&config);

    let feeder = tokio::spawn(async move {
        let mut waits = 0;
        for i in 0..20 {
            // push() returns false while the copy is throttled
            if !producer.push(format!("event-{:02}", i)).unwrap_or(false) {
                waits += 1;
                producer.wait_resumed().await;
            }
        }
        producer.end();
        waits
    });

    let copy = tokio::spawn(copy_with_config(source, sink, config));

    let events = reader.read_all().await;
    let waits = feeder.await?;
    let stats = copy.await??;
    println!(
        "  Read {} events, producer paused {} times, copy throttled {} times",
        events.len(),
        waits,
        stats.throttle_count
    );
    println!("  ✓ Push source complete\n");
    Ok(())
}

/// Demo 5: Configuration presets
fn demo_configuration_presets() {
    println!("--- Demo 5: Configuration Presets ---");

    let low_latency = FlowConfig::low_latency();
    println!(
        "  Low-latency: high_water_mark={}, drain_timeout={:?}",
        low_latency.high_water_mark, low_latency.drain_timeout
    );

    let high_throughput = FlowConfig::high_throughput();
    println!(
        "  High-throughput: high_water_mark={}, drain_timeout={:?}",
        high_throughput.high_water_mark, high_throughput.drain_timeout
    );

    let custom = FlowConfig::default()
        .with_high_water_mark(4096)
        .with_drain_timeout(Duration::from_secs(5));
    println!(
        "  Custom: high_water_mark={}, drain_timeout={:?}",
        custom.high_water_mark, custom.drain_timeout
    );

    println!("  ✓ Configuration presets complete\n");
}

/// Demo 6: Aborting a copy that is waiting on its source
async fn demo_abort() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 6: Abort ---");

    let (producer, source) = push_source::<Vec<u8>>();
    let (sink, mut reader) = memory_sink(&FlowConfig::default());

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let (handle, signal) = spawn_copy(source, sink, FlowConfig::default(), move |result| {
        let _ = done_tx.send(result);
    });

    producer.push(b"partial".to_vec())?;
    if let Ok(Some(chunk)) = timeout(Duration::from_millis(100), reader.read()).await {
        println!("  Reader got {} bytes before abort", chunk.len());
    }

    println!("  Triggering abort via AbortSignal...");
    signal.abort();

    match done_rx.await? {
        Err(CopyError::Aborted) => println!("  Copy reported: aborted"),
        other => println!("  Unexpected outcome: {:?}", other),
    }
    handle.await?;

    println!("  Producer closed after abort: {}", producer.is_closed());
    println!("  ✓ Abort complete\n");
    Ok(())
}
