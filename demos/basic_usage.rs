//! Basic usage example for stripeq
//!
//! Producers and consumers share one sharded queue. Run with
//! `RUST_LOG=stripeq=trace` to watch shard contention being retried.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use stripeq::{Error, MetricsCollector, MultiQueue, MultiQueueConfig, SelectionPolicy};
use tracing_subscriber::EnvFilter;

const PRODUCERS: usize = 4;
const CONSUMERS: usize = 4;
const ITEMS_PER_PRODUCER: usize = 10_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("stripeq usage example");
    println!("=====================");

    // Four caller groups with two shards each
    let queue: Arc<MultiQueue<usize>> = Arc::new(MultiQueue::new(MultiQueueConfig::default())?);
    println!(
        "\n1. {} shards, {} per caller, {:?} policy",
        queue.shard_count(),
        queue.shards_per_caller(),
        queue.policy()
    );

    let total = PRODUCERS * ITEMS_PER_PRODUCER;
    let consumed = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..ITEMS_PER_PRODUCER {
                    if let Err(err) = queue.enqueue(p * ITEMS_PER_PRODUCER + i) {
                        eprintln!("   producer {}: {}", p, err);
                    }
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|c| {
            let queue = Arc::clone(&queue);
            let consumed = Arc::clone(&consumed);
            thread::spawn(move || {
                let mut mine = 0usize;
                let mut sum = 0usize;
                while consumed.load(Ordering::Acquire) < total {
                    match queue.dequeue() {
                        Some(value) => {
                            mine += 1;
                            sum += value;
                            consumed.fetch_add(1, Ordering::AcqRel);
                        }
                        // Only the settled shard was empty; try again.
                        None => thread::yield_now(),
                    }
                }
                println!("   consumer {} took {} items (sum {})", c, mine, sum);
                sum
            })
        })
        .collect();

    for producer in producers {
        producer.join().map_err(|_| "producer panicked")?;
    }
    let mut sum = 0;
    for consumer in consumers {
        sum += consumer.join().map_err(|_| "consumer panicked")?;
    }
    println!("\n2. Consumed {} items, checksum ok: {}", total, sum == total * (total - 1) / 2);

    let metrics = queue.metrics();
    println!("\n3. Metrics:");
    println!("   enqueues:          {}", metrics.enqueues);
    println!("   dequeues:          {}", metrics.dequeues);
    println!("   empty dequeues:    {}", metrics.empty_dequeues);
    println!("   contended retries: {}", metrics.contended_retries);
    println!("   hit rate:          {:.1}%", metrics.hit_rate());
    println!("   avg op time:       {:?}", metrics.avg_operation_time());

    println!("\n4. Bounded shards:");
    let bounded = MultiQueue::bounded(MultiQueueConfig::new(1).policy(SelectionPolicy::Uniform), 2)?;
    bounded.enqueue("a").map_err(|e| e.kind())?;
    bounded.enqueue("b").map_err(|e| e.kind())?;
    match bounded.enqueue("c") {
        Err(err) if err.kind() == Error::Capacity => {
            println!("   full shard handed back {:?}", err.into_inner())
        }
        other => println!("   unexpected: {:?}", other),
    }
    println!("   timed dequeue: {:?}", bounded.dequeue_timeout(Duration::from_millis(10)));

    Ok(())
}
