use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dispatch_timer::{
    periodic_timer, periodic_timer_with, single_timer, single_timer_with, Generation, Interval,
    Queue, TimerBuilder, TimerCallback, TimerError, TimerState,
};
use tokio::time::{sleep, Instant};

fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Sync + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (log, move |value| sink.lock().unwrap().push(value))
}

#[tokio::test(start_paused = true)]
async fn single_shot_fires_once_after_delay() {
    let start = Instant::now();
    let (fired, record) = recorder::<Instant>();
    let timer = single_timer(Duration::from_millis(100), &Queue::global(), move || {
        record(Instant::now())
    });

    sleep(Duration::from_millis(99)).await;
    assert!(fired.lock().unwrap().is_empty());

    sleep(Duration::from_secs(5)).await;
    let fired = fired.lock().unwrap();
    assert_eq!(fired.len(), 1);
    assert!(fired[0] >= start + Duration::from_millis(100));
    assert_eq!(timer.statistics().execution_count, 1);
}

#[tokio::test(start_paused = true)]
async fn zero_and_negative_delays_fire_immediately() {
    let hits = Arc::new(AtomicUsize::new(0));
    let queue = Queue::global();
    for delay in [Interval::ZERO, Interval::from_seconds(-1.0)] {
        let sink = Arc::clone(&hits);
        single_timer(delay, &queue, move || {
            sink.fetch_add(1, Ordering::SeqCst);
        });
    }

    sleep(Duration::from_millis(1)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn periodic_fires_on_interval_grid_until_cancelled() {
    let start = Instant::now();
    let (fired, record) = recorder::<Instant>();
    let timer = periodic_timer(Duration::from_millis(100), &Queue::global(), move || {
        record(Instant::now())
    });

    sleep(Duration::from_millis(350)).await;
    timer.cancel();
    assert_eq!(timer.state(), TimerState::Cancelled);

    sleep(Duration::from_secs(1)).await;
    let fired = fired.lock().unwrap();
    assert_eq!(fired.len(), 3);
    for (k, at) in fired.iter().enumerate() {
        let expected = start + Duration::from_millis(100 * (k as u64 + 1));
        assert!(*at >= expected);
        assert!(*at < expected + Duration::from_millis(1));
    }
}

#[tokio::test(start_paused = true)]
async fn reschedule_before_deadline_delivers_only_new_parameter() {
    let (seen, record) = recorder::<u32>();
    let record = Arc::new(record);

    let first = Arc::clone(&record);
    let timer = single_timer_with(Duration::from_millis(100), 1u32, move |p| first(p));
    let second = Arc::clone(&record);
    timer.reschedule_oneshot(Duration::from_millis(100), Interval::ZERO, 2u32, move |p| {
        second(p)
    });

    sleep(Duration::from_millis(300)).await;
    assert_eq!(*seen.lock().unwrap(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn cancel_before_deadline_is_final_and_idempotent() {
    let hits = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&hits);
    let timer = periodic_timer_with(Duration::from_millis(50), (), move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    timer.cancel();
    timer.cancel();
    assert!(timer.is_cancelled());
    assert!(timer.schedule().is_none());

    sleep(Duration::from_secs(1)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn rescheduling_repeating_timer_drops_old_pairing() {
    let (seen, record) = recorder::<&'static str>();
    let record = Arc::new(record);

    let old = Arc::clone(&record);
    let timer = periodic_timer_with(Duration::from_millis(100), "old", move |p| old(p));
    sleep(Duration::from_millis(150)).await;

    let new = Arc::clone(&record);
    timer.reschedule_repeating(Duration::from_millis(100), Interval::ZERO, "new", move |p| new(p));
    sleep(Duration::from_millis(220)).await;
    timer.cancel();

    assert_eq!(*seen.lock().unwrap(), vec!["old", "new", "new"]);
}

#[tokio::test(start_paused = true)]
async fn generation_guard_ignores_superseded_firings() {
    let generation = Arc::new(Generation::new());
    let (applied, record) = recorder::<u64>();
    let record = Arc::new(record);

    let handler = {
        let generation = Arc::clone(&generation);
        let record = Arc::clone(&record);
        move |token| {
            if generation.try_claim(token) {
                record(token.raw());
            }
        }
    };

    // Two independent timers stand in for a late callback racing its replacement.
    let stale = single_timer_with(Duration::from_millis(10), generation.advance(), handler.clone());
    let current = single_timer_with(Duration::from_millis(20), generation.advance(), handler);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(*applied.lock().unwrap(), vec![2]);
    assert_eq!(stale.statistics().execution_count, 1);
    assert_eq!(current.statistics().execution_count, 1);
}

#[derive(Clone, Default)]
struct Overlap {
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl TimerCallback for Overlap {
    async fn execute(&self) -> Result<(), TimerError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        sleep(Duration::from_millis(30)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn peak_overlap(queue: &Queue) -> usize {
    let overlap = Overlap::default();
    for _ in 0..3 {
        TimerBuilder::new(Duration::from_millis(10))
            .queue(queue)
            .single_callback(overlap.clone());
    }
    sleep(Duration::from_millis(200)).await;
    overlap.peak.load(Ordering::SeqCst)
}

#[tokio::test(start_paused = true)]
async fn serial_queue_runs_callbacks_one_at_a_time() {
    assert_eq!(peak_overlap(&Queue::serial("serial")).await, 1);
    assert_eq!(peak_overlap(&Queue::global()).await, 3);
}

#[tokio::test(start_paused = true)]
async fn firings_of_one_timer_never_overlap() {
    let overlap = Overlap::default();
    let timer = TimerBuilder::new(Duration::from_millis(10)).periodic_callback(overlap.clone());

    sleep(Duration::from_millis(200)).await;
    timer.cancel();
    assert_eq!(overlap.peak.load(Ordering::SeqCst), 1);
    assert!(timer.statistics().execution_count >= 2);
}

struct Failing;

#[async_trait]
impl TimerCallback for Failing {
    async fn execute(&self) -> Result<(), TimerError> {
        Err(TimerError::CallbackError("simulated".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn failing_callback_keeps_timer_running() {
    let timer = TimerBuilder::new(Duration::from_millis(10)).periodic_callback(Failing);
    sleep(Duration::from_millis(35)).await;
    assert_eq!(timer.statistics().execution_count, 3);
    assert_eq!(timer.state(), TimerState::Running);
    timer.cancel();
}
