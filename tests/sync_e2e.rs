use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cuehistory::{
    CueError, EventHistory, ExecutionError, LogicalTime, Metadata, Value, ValueMatcher, Wait,
};

fn publish(history: &EventHistory, t: f64, path: &str, value: impl Into<Value>) {
    history
        .publish(LogicalTime::at(t), path, value, Metadata::new())
        .unwrap();
}

fn wait_for_waiters(history: &EventHistory, n: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while history.stats().unwrap().pending_waiters < n {
        assert!(Instant::now() < deadline, "waiters never registered");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn blocked_waiter_wakes_on_matching_publish() {
    let history = Arc::new(EventHistory::new());

    let waiter = {
        let history = Arc::clone(&history);
        thread::spawn(move || history.wait_for_next(LogicalTime::at(0.0), "/x", None))
    };

    wait_for_waiters(&history, 1);
    publish(&history, 1.0, "/y", 0);
    assert_eq!(history.stats().unwrap().pending_waiters, 1);
    publish(&history, 2.0, "/x", 7);

    let cue = waiter.join().unwrap().unwrap();
    assert_eq!(cue.time, LogicalTime::at(2.0));
    assert_eq!(cue.value, Value::Int(7));

    let stats = history.stats().unwrap();
    assert_eq!(stats.deliveries, 1);
    assert_eq!(stats.pending_waiters, 0);
}

#[test]
fn one_publish_delivers_every_matching_waiter_once() {
    let history = Arc::new(EventHistory::new());

    let waiters: Vec<_> = ["/drums/kick", "/drums/*", "/**/kick"]
        .into_iter()
        .map(|pattern| {
            let history = Arc::clone(&history);
            thread::spawn(move || history.wait_for_next(LogicalTime::at(0.0), pattern, None))
        })
        .collect();

    wait_for_waiters(&history, 3);
    publish(&history, 1.0, "/drums/kick", 1);
    publish(&history, 2.0, "/drums/kick", 2);

    for w in waiters {
        let cue = w.join().unwrap().unwrap();
        assert_eq!(cue.time, LogicalTime::at(1.0));
    }
    assert_eq!(history.stats().unwrap().deliveries, 3);
}

#[test]
fn waiter_value_matcher_skips_non_matching_values() {
    let history = Arc::new(EventHistory::new());

    let waiter = {
        let history = Arc::clone(&history);
        let matcher = ValueMatcher::new(|v| v.as_int() == Some(3));
        thread::spawn(move || history.wait_for_next(LogicalTime::at(0.0), "/n", Some(matcher)))
    };

    wait_for_waiters(&history, 1);
    publish(&history, 1.0, "/n", 1);
    publish(&history, 2.0, "/n", 2);
    publish(&history, 3.0, "/n", 3);

    let cue = waiter.join().unwrap().unwrap();
    assert_eq!(cue.value, Value::Int(3));
}

#[test]
fn earlier_event_published_before_resume_wins() {
    let history = Arc::new(EventHistory::new());

    let Wait::Pending(pending) = history
        .begin_wait(LogicalTime::at(1.0), "/sync", None)
        .unwrap()
    else {
        panic!("expected pending wait");
    };

    // Delivery happens on the first publish; the second arrives before the
    // waiter resumes and is earlier in logical time.
    publish(&history, 10.0, "/sync", "late");
    publish(&history, 5.0, "/sync", "early");

    let cue = pending.wait().unwrap();
    assert_eq!(cue.value, Value::from("early"));
}

#[test]
fn waiter_ignores_events_not_after_its_time() {
    let history = Arc::new(EventHistory::new());

    let waiter = {
        let history = Arc::clone(&history);
        thread::spawn(move || history.wait_for_next(LogicalTime::at(5.0), "/t", None))
    };

    wait_for_waiters(&history, 1);
    publish(&history, 3.0, "/t", 0);
    publish(&history, 5.0, "/t", 0);
    assert_eq!(history.stats().unwrap().pending_waiters, 1);
    publish(&history, 6.0, "/t", 0);

    let cue = waiter.join().unwrap().unwrap();
    assert_eq!(cue.time, LogicalTime::at(6.0));
}

#[test]
fn racing_publish_is_never_missed() {
    for i in 0..200 {
        let history = Arc::new(EventHistory::new());

        let waiter = {
            let history = Arc::clone(&history);
            thread::spawn(move || {
                history.wait_for_next_timeout(
                    LogicalTime::at(0.0),
                    "/race/*",
                    None,
                    Duration::from_secs(5),
                )
            })
        };
        let producer = {
            let history = Arc::clone(&history);
            thread::spawn(move || publish(&history, 1.0, "/race/go", i))
        };

        producer.join().unwrap();
        let cue = waiter.join().unwrap().unwrap();
        assert_eq!(cue.value, Value::Int(i64::from(i)));
    }
}

#[test]
fn concurrent_producers_and_consumers() {
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 250;

    let history = Arc::new(EventHistory::new());

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let history = Arc::clone(&history);
            thread::spawn(move || {
                history.wait_for_next_timeout(
                    LogicalTime::at(0.0),
                    "/p/**",
                    None,
                    Duration::from_secs(10),
                )
            })
        })
        .collect();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let history = Arc::clone(&history);
            thread::spawn(move || {
                for n in 0..PER_PRODUCER {
                    // Interleaved, slightly shuffled logical times per producer.
                    let t = (n * PRODUCERS + p) as f64 + if n % 3 == 0 { 0.5 } else { 0.0 };
                    let time = LogicalTime::at(t).with_thread(p);
                    history
                        .publish(time, &format!("/p/{p}"), Value::Int(n as i64), Metadata::new())
                        .unwrap();
                }
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }
    for c in consumers {
        let cue = c.join().unwrap().unwrap();
        assert!(cue.path.to_string().starts_with("/p/"));
    }

    let stats = history.stats().unwrap();
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.events as u64, PRODUCERS * PER_PRODUCER);

    for p in 0..PRODUCERS {
        let events = history.events_at(&format!("/p/{p}")).unwrap();
        assert_eq!(events.len() as u64, PER_PRODUCER);
        assert!(events.windows(2).all(|w| w[0].time > w[1].time));
    }

    let latest = history
        .query_most_recent(LogicalTime::at(f64::MAX), "/p/*", None)
        .unwrap()
        .unwrap();
    let expected_max = ((PER_PRODUCER - 1) * PRODUCERS + PRODUCERS - 1) as f64;
    assert!(latest.time.time >= expected_max);
}

#[test]
fn failing_predicates_do_not_poison_queries() {
    let history = EventHistory::new();
    publish(&history, 1.0, "/v", Value::List(vec![Value::Int(1)]));
    publish(&history, 2.0, "/v", Value::Null);
    publish(&history, 3.0, "/v", Value::from("text"));

    // Panics on non-list values, errors on empty lists.
    let matcher = ValueMatcher::fallible(|v| {
        let items = v.as_list().unwrap();
        items.first().map(|x| x.as_int() == Some(1)).ok_or("empty list")
    });

    let found = history
        .query_most_recent(LogicalTime::at(10.0), "/v", Some(&matcher))
        .unwrap()
        .unwrap();
    assert_eq!(found.time, LogicalTime::at(1.0));

    let next = history
        .query_next(LogicalTime::at(1.0), "/v", Some(&matcher))
        .unwrap();
    assert!(next.is_none());
}

#[test]
fn timed_out_waiter_leaves_no_registration() {
    let history = EventHistory::new();
    let err = history
        .wait_for_next_timeout(LogicalTime::at(0.0), "/never", None, Duration::from_millis(20))
        .unwrap_err();
    assert!(matches!(err, CueError::Execution(ExecutionError::Timeout { .. })));
    assert!(err.is_retryable());

    publish(&history, 1.0, "/never", 0);
    let stats = history.stats().unwrap();
    assert_eq!(stats.pending_waiters, 0);
    assert_eq!(stats.deliveries, 0);
}
