use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use bookwell::catalog::SlotCatalog;
use bookwell::engine::Engine;
use bookwell::facade::{BookingFacade, SessionRequest};
use bookwell::model::TherapistId;
use bookwell::notify::NotifyHub;
use bookwell::roster::Roster;

/// 2025-03-10 is a Monday; every date used below is a weekday.
const BASE_DATE: &str = "2025-03-10";
const SLOTS: [&str; 4] = ["09:00", "10:00", "14:00", "15:00"];

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn fresh_facade(name: &str) -> Arc<BookingFacade> {
    let dir = std::env::temp_dir().join("bookwell_bench");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{name}.wal"));
    let _ = std::fs::remove_file(&path);
    let engine = Arc::new(Engine::new(path, Arc::new(NotifyHub::new())).unwrap());
    Arc::new(BookingFacade::new(
        engine,
        SlotCatalog::standard(),
        Roster::default(),
    ))
}

fn request(user: &str, therapist_id: TherapistId, date: &str, time: &str) -> SessionRequest {
    SessionRequest {
        user_id: user.into(),
        user_email: format!("{user}@example.com"),
        therapist_id,
        therapist_name: format!("Therapist {therapist_id}"),
        date: date.into(),
        time: time.into(),
        session_medium: "video".into(),
    }
}

/// Sequential bookings over distinct slot keys — WAL fsync latency floor.
async fn phase1_sequential(n: usize) {
    let facade = fresh_facade("phase1");
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        // One therapist per 4 bookings; each user stays under quota
        let therapist = (i / SLOTS.len()) as TherapistId;
        let slot = SLOTS[i % SLOTS.len()];
        let user = format!("user{}", i / 4);
        let t = Instant::now();
        let result = facade
            .book_session_on(request(&user, therapist, BASE_DATE, slot), today())
            .await;
        assert!(result.success, "{}", result.message);
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    println!(
        "  throughput: {:.0} bookings/s",
        n as f64 / elapsed.as_secs_f64()
    );
    print_latency("sequential insert", &mut latencies);
}

/// Many tasks race for the 4 slots of a single therapist-day. Exactly 4 can
/// win; everyone else must see "slot taken".
async fn phase2_contention(tasks: usize) {
    let facade = fresh_facade("phase2");
    let mut handles = Vec::with_capacity(tasks);
    let start = Instant::now();

    for i in 0..tasks {
        let facade = facade.clone();
        handles.push(tokio::spawn(async move {
            let slot = SLOTS[i % SLOTS.len()];
            let t = Instant::now();
            let result = facade
                .book_session_on(request(&format!("racer{i}"), 1, BASE_DATE, slot), today())
                .await;
            (result, t.elapsed())
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    let mut latencies = Vec::with_capacity(tasks);
    for h in handles {
        let (result, latency) = h.await.unwrap();
        latencies.push(latency);
        if result.success {
            wins += 1;
        } else {
            assert_eq!(result.message, "slot taken");
            conflicts += 1;
        }
    }

    assert_eq!(wins, SLOTS.len(), "exactly one winner per slot");
    println!(
        "  {tasks} racers, {wins} wins, {conflicts} conflicts in {:.1}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    print_latency("contended insert", &mut latencies);
}

/// Read path under a populated store.
async fn phase3_reads(n: usize) {
    let facade = fresh_facade("phase3");
    for (i, slot) in SLOTS.iter().enumerate() {
        let result = facade
            .book_session_on(request(&format!("reader{i}"), 1, BASE_DATE, slot), today())
            .await;
        assert!(result.success);
    }

    let date = today();
    let mut latencies = Vec::with_capacity(n);
    for _ in 0..n {
        let t = Instant::now();
        let booked = facade.booked_slots_for_date(1, date).await;
        assert_eq!(booked.len(), SLOTS.len());
        latencies.push(t.elapsed());
    }
    print_latency("booked_slots_for_date", &mut latencies);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    println!("phase 1: sequential bookings");
    phase1_sequential(2000).await;

    println!("phase 2: slot contention");
    phase2_contention(256).await;

    println!("phase 3: availability reads");
    phase3_reads(10_000).await;
}
