//! Demonstration of the scroll odometer pipeline.
//!
//! This example shows how to:
//! 1. Build a ledger on a throwaway file with a controllable clock
//! 2. Feed synthetic host scroll events through the service
//! 3. Watch samples arrive on a channel sink after they are persisted
//! 4. Cross midnight and read back the archived day
//!
//! Run with: cargo run --example replay_demo

use std::sync::Arc;

use scroll_odometer::{
    core::{DeltaExtractor, ExtractorConfig},
    ledger::LeaderboardPeriod,
    transparency::create_shared_log,
    ChannelSink, DayKey, DisplayMetrics, FileStore, FixedClock, HostEvent, Ledger, ScrollService,
    SharedClock,
};

fn main() {
    println!("Scroll Odometer - Replay Demo");
    println!("=============================");
    println!();

    let dir = std::env::temp_dir().join(format!("scroll-odometer-demo-{}", std::process::id()));
    let ledger_path = dir.join("ledger.json");

    let start_day = DayKey::from_ymd(2025, 3, 10).expect("valid date");
    let clock = Arc::new(FixedClock::at_day(start_day));
    let shared: SharedClock = clock.clone();

    let store = FileStore::open(&ledger_path).expect("Failed to open ledger");
    let ledger = Arc::new(Ledger::new(store, shared.clone()));
    let extractor = DeltaExtractor::new(ExtractorConfig::default(), shared);
    let mut service = ScrollService::new(extractor, ledger, create_shared_log());

    let (sink, samples) = ChannelSink::new(128);
    service.attach_sink(Box::new(sink));
    service.on_connected();

    // A typical phone panel: 420 dpi, density scale 2.625.
    let display = DisplayMetrics::uniform(420.0, 2.625);

    println!("Day {start_day}: reading an article, then flicking through a feed");
    for y in (0..=4200).step_by(600) {
        service.handle_event(&HostEvent::scroll(1, 0, y, display).with_app("com.example.reader"));
    }
    service.handle_event(&HostEvent::window_change());
    service.handle_event(&HostEvent::touch_start());
    for (from, to) in [(0, 4), (4, 11), (11, 19)] {
        service.handle_event(
            &HostEvent::scroll(2, 0, 0, display)
                .with_app("com.example.feed")
                .with_indices(from, to),
        );
    }
    service.handle_event(&HostEvent::touch_end());

    while let Ok(sample) = samples.try_recv() {
        println!(
            "  sample: {:.4} m from {}{}",
            sample.distance_m,
            sample.app_id,
            if sample.is_touch { " (touch)" } else { "" }
        );
    }
    println!();

    let next_day = start_day.succ();
    clock.set_day(next_day);
    println!("Day {next_day}: one more scroll after midnight");
    service.handle_event(&HostEvent::scroll(3, 0, 0, display).with_app("com.example.reader"));
    service.handle_event(&HostEvent::scroll(3, 0, 900, display).with_app("com.example.reader"));
    println!();

    let totals = service.ledger().totals();
    println!("Totals:");
    println!(
        "  today: {:.3} m ({} scrolls)",
        totals.daily_distance, totals.daily_scrolls
    );
    println!(
        "  lifetime: {:.3} m ({} scrolls)",
        totals.lifetime_distance, totals.lifetime_scrolls
    );
    println!();

    println!("History:");
    for day in service.ledger().weekly(start_day).iter().take(2) {
        println!("  {}: {:.3} m ({} scrolls)", day.day, day.distance, day.scrolls);
    }
    println!();

    println!("Leaderboard for the week of {start_day}:");
    for entry in service
        .ledger()
        .leaderboard(LeaderboardPeriod::Week(start_day))
    {
        println!("  {:<24} {:.3} m", entry.app_id, entry.distance);
    }
    println!();

    service.on_destroy();
    println!("{}", service.transparency().summary());

    let _ = std::fs::remove_dir_all(&dir);
}
