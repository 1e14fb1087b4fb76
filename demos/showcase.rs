use std::sync::{Arc, Mutex};
use std::time::Duration;

use dispatch_timer::{
    periodic_timer, single_timer, single_timer_with, Generation, Interval, Queue, TimerBuilder,
};
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    let queue = Queue::serial("showcase");

    // 1. One-time timer
    let _once = single_timer(Duration::from_millis(200), &queue, || {
        println!("One-time timer executed!");
    });

    // 2. Periodic timer with leeway
    let ticks = TimerBuilder::new(Interval::from_seconds(0.5))
        .leeway(Duration::from_millis(20))
        .queue(&queue)
        .periodic(|| println!("Periodic timer tick"));

    // 3. Debounced save guarded by a generation token
    let generation = Arc::new(Generation::new());
    let saved = Arc::new(Mutex::new(Vec::new()));
    let save = {
        let generation = Arc::clone(&generation);
        let saved = Arc::clone(&saved);
        move |token| {
            let mut saved = saved.lock().unwrap();
            if generation.try_claim(token) {
                saved.push(token);
                println!("Saved with token {:?}", token);
            }
        }
    };
    let debounce = single_timer_with(Duration::from_millis(300), generation.advance(), save.clone());
    for _ in 0..3 {
        sleep(Duration::from_millis(100)).await;
        debounce.reschedule_oneshot(
            Duration::from_millis(300),
            Interval::ZERO,
            generation.advance(),
            save.clone(),
        );
    }

    sleep(Duration::from_millis(1600)).await;
    println!("Periodic statistics: {:?}", ticks.statistics());
    ticks.cancel();
    debounce.cancel();

    // 4. A placeholder repeating timer on the global queue, cancelled before it fires
    let idle = periodic_timer(Duration::from_secs(10), &Queue::global(), || {});
    idle.cancel();

    println!("Saves performed: {}", saved.lock().unwrap().len());
}
