use crate::{Error, FailurePolicy, Floodgate, PoolConfig, Processor};
use core::time::Duration;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tokio::sync::{AcquireError, Semaphore};
use tokio::time::Instant;

/// Records every item it sees, in processing order, after an optional delay.
struct Recorder {
    seen: Arc<Mutex<Vec<u32>>>,
    delay: Duration,
}

impl Recorder {
    fn new(delay: Duration) -> (Self, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                seen: Arc::clone(&seen),
                delay,
            },
            seen,
        )
    }
}

impl Processor<u32> for Recorder {
    type Error = core::convert::Infallible;

    fn process(&self, item: &u32) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.seen.lock().push(*item);
            Ok(())
        }
    }
}

/// Holds every item until a permit is released.
struct Blocker {
    permits: Arc<Semaphore>,
}

impl Processor<u32> for Blocker {
    type Error = AcquireError;

    fn process(&self, _item: &u32) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            self.permits.acquire().await?.forget();
            Ok(())
        }
    }
}

/// Fails multiples of three and panics on four.
struct Flaky {
    attempts: Arc<Mutex<Vec<u32>>>,
}

impl Processor<u32> for Flaky {
    type Error = String;

    fn process(&self, item: &u32) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let item = *item;
        async move {
            self.attempts.lock().push(item);
            if item == 4 {
                panic!("item {item} exploded");
            }
            if item % 3 == 0 {
                return Err(format!("item {item} rejected downstream"));
            }
            Ok(())
        }
    }
}

/// Fails until it has been called `succeed_on` times.
struct FailFirst {
    calls: Arc<AtomicU32>,
    succeed_on: u32,
}

impl Processor<u32> for FailFirst {
    type Error = &'static str;

    fn process(&self, _item: &u32) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < self.succeed_on {
                Err("transient failure")
            } else {
                Ok(())
            }
        }
    }
}

/// Checks its input before building the future, so a bad item panics on the
/// call itself rather than while the future is polled.
struct EagerCheck {
    seen: Arc<Mutex<Vec<u32>>>,
}

impl Processor<u32> for EagerCheck {
    type Error = core::convert::Infallible;

    fn process(&self, item: &u32) -> impl Future<Output = Result<(), Self::Error>> + Send {
        assert!(*item != 1, "item {item} refused up front");
        let item = *item;
        async move {
            self.seen.lock().push(item);
            Ok(())
        }
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test]
async fn two_slot_queue_with_one_slow_worker() {
    let (recorder, seen) = Recorder::new(Duration::from_millis(100));
    let floodgate = Floodgate::start(PoolConfig::new(1, 2), recorder).unwrap();
    let start = Instant::now();

    // Nothing yields between these calls, so the worker has not dequeued A
    // yet and the third admission finds the queue full.
    assert_eq!(floodgate.try_admit(1), Ok(()));
    assert_eq!(floodgate.try_admit(2), Ok(()));
    assert_eq!(
        floodgate.try_admit(3),
        Err(Error::QueueFull { capacity: 2 })
    );

    floodgate.shutdown().await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(200));
    assert_eq!(*seen.lock(), vec![1, 2]);

    let stats = floodgate.stats();
    assert_eq!(stats.admitted, 2);
    assert_eq!(stats.rejected_full, 1);
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.queued, 0);
}

#[tokio::test]
async fn single_worker_dequeues_in_admission_order() {
    let (recorder, seen) = Recorder::new(Duration::ZERO);
    let floodgate = Floodgate::start(PoolConfig::new(1, 64), recorder).unwrap();

    for i in 0..64 {
        floodgate.try_admit(i).unwrap();
    }
    floodgate.shutdown().await.unwrap();

    assert_eq!(*seen.lock(), (0..64).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_admissions_never_exceed_capacity() {
    const POOL: usize = 2;
    const CAPACITY: usize = 16;
    const ADMITTERS: u32 = 8;
    const ATTEMPTS: u32 = 100;

    let permits = Arc::new(Semaphore::new(0));
    let floodgate = Floodgate::start(
        PoolConfig::new(POOL, CAPACITY),
        Blocker {
            permits: Arc::clone(&permits),
        },
    )
    .unwrap();

    // Park every worker on an item first so nothing drains while we race.
    for i in 0..POOL as u32 {
        floodgate.try_admit(i).unwrap();
    }
    wait_until(|| floodgate.stats().in_flight == POOL).await;

    let accepted = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<_> = (0..ADMITTERS)
        .map(|t| {
            let gate = floodgate.gate().clone();
            let accepted = Arc::clone(&accepted);
            tokio::spawn(async move {
                for i in 0..ATTEMPTS {
                    match gate.try_admit(t * ATTEMPTS + i) {
                        Ok(()) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => assert!(e.is_overload(), "unexpected rejection: {e}"),
                    }
                    assert!(gate.queued() <= CAPACITY);
                }
            })
        })
        .collect();
    futures::future::join_all(tasks)
        .await
        .into_iter()
        .for_each(|r| r.unwrap());

    assert_eq!(accepted.load(Ordering::SeqCst), CAPACITY);
    let stats = floodgate.stats();
    assert_eq!(stats.queued, CAPACITY);
    assert_eq!(
        stats.rejected_full,
        u64::from(ADMITTERS * ATTEMPTS) - CAPACITY as u64
    );

    permits.add_permits(POOL + CAPACITY);
    floodgate.shutdown().await.unwrap();
    assert_eq!(floodgate.stats().processed, (POOL + CAPACITY) as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn admission_does_not_wait_on_busy_workers() {
    let permits = Arc::new(Semaphore::new(0));
    let floodgate = Floodgate::start(
        PoolConfig::new(1, 1),
        Blocker {
            permits: Arc::clone(&permits),
        },
    )
    .unwrap();

    floodgate.try_admit(0).unwrap();
    wait_until(|| floodgate.stats().in_flight == 1).await;
    floodgate.try_admit(1).unwrap();

    let start = Instant::now();
    for i in 2..1_002 {
        assert_eq!(
            floodgate.try_admit(i),
            Err(Error::QueueFull { capacity: 1 })
        );
    }
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "1000 rejected admissions took {:?}",
        start.elapsed()
    );

    permits.add_permits(2);
    floodgate.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_rejects_new_work_and_drains_the_rest() {
    let (recorder, seen) = Recorder::new(Duration::from_millis(5));
    let floodgate = Floodgate::start(PoolConfig::new(2, 8), recorder).unwrap();

    for i in 0..8 {
        floodgate.try_admit(i).unwrap();
    }

    floodgate.gate().close();
    assert_eq!(floodgate.try_admit(99), Err(Error::Closed));

    floodgate.shutdown().await.unwrap();
    // A second call finds nothing left to wait for.
    floodgate.shutdown().await.unwrap();

    let mut seen = seen.lock().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..8).collect::<Vec<_>>());

    let stats = floodgate.stats();
    assert_eq!(stats.processed, 8);
    assert_eq!(stats.rejected_closed, 1);
    assert_eq!(stats.active_workers, 0);
    assert_eq!(floodgate.pool().active_workers(), 0);
}

#[tokio::test]
async fn failures_and_panics_do_not_stop_the_worker() {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let floodgate = Floodgate::start(
        PoolConfig::new(1, 16),
        Flaky {
            attempts: Arc::clone(&attempts),
        },
    )
    .unwrap();

    for i in 0..10 {
        floodgate.try_admit(i).unwrap();
    }
    floodgate.shutdown().await.unwrap();

    // Each item is attempted exactly once under the default policy.
    assert_eq!(*attempts.lock(), (0..10).collect::<Vec<_>>());

    let stats = floodgate.stats();
    // 0, 3, 6, 9 fail; 4 panics.
    assert_eq!(stats.failed, 5);
    assert_eq!(stats.panicked, 1);
    assert_eq!(stats.processed, 5);
    assert_eq!(stats.retried, 0);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test]
async fn panic_before_the_future_is_built_is_isolated() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let floodgate = Floodgate::start(
        PoolConfig::new(1, 4),
        EagerCheck {
            seen: Arc::clone(&seen),
        },
    )
    .unwrap();

    for i in 1..=3 {
        floodgate.try_admit(i).unwrap();
    }
    floodgate.shutdown().await.unwrap();

    assert_eq!(*seen.lock(), vec![2, 3]);

    let stats = floodgate.stats();
    assert_eq!(stats.panicked, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.active_workers, 0);
}

#[tokio::test]
async fn concurrent_shutdowns_both_wait_for_the_drain() {
    let (recorder, seen) = Recorder::new(Duration::from_millis(200));
    let floodgate = Floodgate::start(PoolConfig::new(1, 4), recorder).unwrap();
    floodgate.try_admit(1).unwrap();
    wait_until(|| floodgate.stats().in_flight == 1).await;

    let first = tokio::spawn({
        let floodgate = floodgate.clone();
        async move { floodgate.shutdown().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    floodgate.shutdown().await.unwrap();
    assert_eq!(floodgate.pool().active_workers(), 0);
    assert_eq!(*seen.lock(), vec![1]);

    first.await.unwrap().unwrap();
}

#[tokio::test]
async fn retry_policy_reruns_failed_items() {
    let calls = Arc::new(AtomicU32::new(0));
    let config = PoolConfig::new(1, 4).with_failure_policy(FailurePolicy::Retry {
        max_attempts: 3,
        backoff: Duration::from_millis(1),
    });
    let floodgate = Floodgate::start(
        config,
        FailFirst {
            calls: Arc::clone(&calls),
            succeed_on: 3,
        },
    )
    .unwrap();

    floodgate.try_admit(7).unwrap();
    floodgate.shutdown().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let stats = floodgate.stats();
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.retried, 2);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn retry_policy_gives_up_after_max_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let config = PoolConfig::new(1, 4).with_failure_policy(FailurePolicy::Retry {
        max_attempts: 2,
        backoff: Duration::ZERO,
    });
    let floodgate = Floodgate::start(
        config,
        FailFirst {
            calls: Arc::clone(&calls),
            succeed_on: u32::MAX,
        },
    )
    .unwrap();

    floodgate.try_admit(1).unwrap();
    floodgate.try_admit(2).unwrap();
    floodgate.shutdown().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    let stats = floodgate.stats();
    assert_eq!(stats.processed, 0);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.retried, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_timeout_reports_stuck_workers() {
    let permits = Arc::new(Semaphore::new(0));
    let config =
        PoolConfig::new(1, 1).with_shutdown_timeout(Some(Duration::from_millis(50)));
    let floodgate = Floodgate::start(
        config,
        Blocker {
            permits: Arc::clone(&permits),
        },
    )
    .unwrap();

    floodgate.try_admit(0).unwrap();
    wait_until(|| floodgate.stats().in_flight == 1).await;

    assert_eq!(
        floodgate.shutdown().await,
        Err(Error::ShutdownTimeout { remaining: 1 })
    );
    assert_eq!(floodgate.pool().active_workers(), 1);

    permits.add_permits(1);
    floodgate.shutdown().await.unwrap();
    assert_eq!(floodgate.pool().active_workers(), 0);
    assert_eq!(floodgate.stats().processed, 1);
}

#[tokio::test]
async fn start_counts_workers_and_rejects_bad_config() {
    let (recorder, _) = Recorder::new(Duration::ZERO);
    let floodgate = Floodgate::start(PoolConfig::new(3, 1), recorder).unwrap();
    assert_eq!(floodgate.pool().size(), 3);
    assert_eq!(floodgate.config().queue_capacity, 1);
    assert_eq!(floodgate.stats().active_workers, 3);
    floodgate.shutdown().await.unwrap();
    assert_eq!(floodgate.stats().active_workers, 0);

    let (recorder, _) = Recorder::new(Duration::ZERO);
    assert!(matches!(
        Floodgate::start(PoolConfig::new(0, 1), recorder),
        Err(Error::InvalidConfig { .. })
    ));
}
