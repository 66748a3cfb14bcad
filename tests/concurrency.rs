//! Shared state under many threads: path store, admission and visit counters.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use captcha::{
    Admission, AdmissionController, Quota, QuotaPolicy, RouteClass, VisitCounter, open_path_store,
};

#[test]
fn concurrent_observes_are_all_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("path_db.json");
    let store = Arc::new(open_path_store(&db).unwrap());

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let selector = if i % 2 == 0 { "#even" } else { "#odd" };
                for _ in 0..20 {
                    store
                        .observe("https://race.test/form", selector)
                        .expect("observe should persist");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let total: u64 = store
        .snapshot("https://race.test/form")
        .iter()
        .map(|(_, count)| count)
        .sum();
    assert_eq!(total, 120);

    let reopened = open_path_store(&db).unwrap();
    assert_eq!(
        reopened.snapshot("https://race.test/form"),
        store.snapshot("https://race.test/form")
    );
    assert_eq!(reopened.recommend("https://race.test/form").count, 60);
}

#[test]
fn concurrent_admission_never_exceeds_the_quota() {
    let policy = QuotaPolicy::new(Quota::per_hour(100))
        .with_override(RouteClass::TextCaptcha, Quota::per_minute(30));
    let controller = Arc::new(AdmissionController::new(policy, 1_000));
    let now = Instant::now();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                (0..10)
                    .filter(|_| {
                        controller
                            .admit_at("203.0.113.5", RouteClass::TextCaptcha, now)
                            .is_allowed()
                    })
                    .count()
            })
        })
        .collect();
    let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(allowed, 30);

    let later = now + Duration::from_secs(60);
    assert!(matches!(
        controller.admit_at("203.0.113.5", RouteClass::TextCaptcha, later),
        Admission::Allowed { remaining: 29, .. }
    ));
}

#[test]
fn concurrent_visits_are_counted() {
    let visits = Arc::new(VisitCounter::new());
    let handles: Vec<_> = ["10.1.0.1", "10.1.0.2"]
        .into_iter()
        .flat_map(|ip| (0..3).map(move |_| ip))
        .map(|ip| {
            let visits = Arc::clone(&visits);
            thread::spawn(move || {
                for _ in 0..100 {
                    visits.record(ip);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(
        visits.snapshot(),
        vec![("10.1.0.1".to_string(), 300), ("10.1.0.2".to_string(), 300)]
    );
}
