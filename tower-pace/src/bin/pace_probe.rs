use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use hdrhistogram::Histogram;
use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tower::BoxError;
use tower::service_fn;
use tower_pace::ApiRequest;
use tower_pace::ApiResponse;
use tower_pace::FetchError;
use tower_pace::FetchQueue;
use tower_pace::QueueConfig;
use tracing_subscriber::EnvFilter;

// Every Nth dispatch is answered with 429 to exercise the retry path.
const RATE_LIMIT_EVERY: usize = 7;

#[derive(Default)]
struct FailureCounter {
    exhausted: usize,
    status: usize,
    other: usize,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = QueueConfig::default().with_env_overrides()?;
    let total_reqs = 25;

    // An in-process upstream: records the dispatch instant at call time and
    // answers after 300ms of simulated latency.
    let dispatched = Arc::new(Mutex::new(Vec::<Instant>::new()));
    let counter = Arc::new(AtomicUsize::new(0));
    let upstream = {
        let dispatched = dispatched.clone();
        service_fn(move |_req: ApiRequest| {
            if let Ok(mut log) = dispatched.lock() {
                log.push(Instant::now());
            }
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                sleep(Duration::from_millis(300)).await;
                if n % RATE_LIMIT_EVERY == 0 {
                    Ok::<_, BoxError>(ApiResponse::new(429, ""))
                } else {
                    Ok(ApiResponse::new(200, "[]"))
                }
            }
        })
    };

    let queue = FetchQueue::with_transport(&config, upstream);

    let mut tasks = JoinSet::new();
    let barrier = Arc::new(Barrier::new(total_reqs));
    let start = Instant::now();

    for i in 0..total_reqs {
        let queue = queue.clone();
        let bar = barrier.clone();
        tasks.spawn(async move {
            bar.wait().await;
            let req_start = Instant::now();
            let res = queue
                .try_enqueue::<serde_json::Value>(ApiRequest::new("/probe").param("i", i as i64))
                .await;
            (res, req_start.elapsed())
        });
    }

    let mut hist_latency = Histogram::<u64>::new_with_bounds(1, 600_000_000, 3)?;
    let mut failures = FailureCounter::default();
    let mut success_count = 0;

    while let Some(task) = tasks.join_next().await {
        let (res, elapsed) = task?;
        match res {
            Ok(_) => {
                success_count += 1;
                hist_latency.record(elapsed.as_micros() as u64)?;
            }
            Err(FetchError::Exhausted { .. }) => failures.exhausted += 1,
            Err(FetchError::Status(_)) => failures.status += 1,
            Err(_) => failures.other += 1,
        }
    }

    let total_duration = start.elapsed();

    let mut hist_gap = Histogram::<u64>::new_with_bounds(1, 600_000_000, 3)?;
    let mut min_gap = Duration::MAX;
    {
        let mut instants = dispatched.lock().map_err(|_| "dispatch log poisoned")?.clone();
        instants.sort();
        for pair in instants.windows(2) {
            let gap = pair[1] - pair[0];
            min_gap = min_gap.min(gap);
            hist_gap.record((gap.as_micros() as u64).max(1))?;
        }
    }

    println!("--- Fetch queue probe ---");
    println!("Spacing:         {:?}", config.min_interval);
    println!("Total Duration:  {:.2?}", total_duration);
    println!("Success/Total:   {}/{}", success_count, total_reqs);
    println!("Dispatches:      {}", hist_gap.len() + 1);
    println!("Min gap:         {:.2?}", min_gap);
    println!("P50 (Gap):       {}µs", hist_gap.value_at_quantile(0.5));
    println!("P99 (Gap):       {}µs", hist_gap.value_at_quantile(0.99));

    if success_count > 0 {
        println!("P50 (Latency):   {}µs", hist_latency.value_at_quantile(0.5));
        println!("P99 (Latency):   {}µs", hist_latency.value_at_quantile(0.99));
    }

    let total_errors = failures.exhausted + failures.status + failures.other;
    println!("Errors:          {}", total_errors);
    if total_errors > 0 {
        println!("  └─ Exhausted:  {}", failures.exhausted);
        println!("  └─ Status:     {}", failures.status);
        println!("  └─ Other:      {}", failures.other);
    }

    // Gaps are measured at the transport, a few µs after the strategy
    // stamped the dispatch, so allow for that jitter.
    if min_gap.saturating_add(Duration::from_millis(1)) < config.min_interval {
        return Err(format!(
            "dispatches {min_gap:?} apart, below the {:?} spacing",
            config.min_interval
        )
        .into());
    }

    Ok(())
}
