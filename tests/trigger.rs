use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use windflow::trigger::*;
use windflow::{Context, KeyedWindow, Window};

const MS: i64 = 1_000_000;

fn window() -> Window {
    Window::new(0, 100 * MS)
}

#[test]
fn at_watermark_fires_only_at_window_end() {
    let mut t = WindowTrigger::new(&TriggerDescription::at_watermark(), window());
    t.receive_event(&TriggerSignal::Watermark(50 * MS));
    assert!(!t.should_trigger());
    t.receive_event(&TriggerSignal::Watermark(100 * MS - 1));
    assert!(!t.should_trigger());
    t.receive_event(&TriggerSignal::Watermark(100 * MS));
    assert!(t.should_trigger());
}

#[test]
fn at_watermark_with_explicit_timestamp() {
    let desc = TriggerDescription::AtWatermark { timestamp: Some(10 * MS) };
    let mut t = WindowTrigger::new(&desc, window());
    t.receive_event(&TriggerSignal::Watermark(10 * MS));
    assert!(t.should_trigger());
}

#[test]
fn at_period_matches_its_duration_only() {
    let mut t = WindowTrigger::new(&TriggerDescription::at_period(Duration::from_millis(100)), window());
    t.receive_event(&TriggerSignal::Period(Duration::from_millis(50)));
    assert!(!t.should_trigger());
    t.receive_event(&TriggerSignal::Period(Duration::from_millis(100)));
    assert!(t.should_trigger());
}

#[test]
fn at_window_item_size_matches_exact_count() {
    let mut t = WindowTrigger::new(&TriggerDescription::at_window_item_size(3), window());
    t.receive_event(&TriggerSignal::WindowItemSize(2));
    assert!(!t.should_trigger());
    t.receive_event(&TriggerSignal::WindowItemSize(3));
    assert!(t.should_trigger());
}

#[test]
fn all_of_needs_every_child() {
    let desc = TriggerDescription::all_of(vec![
        TriggerDescription::at_period(Duration::from_millis(100)),
        TriggerDescription::at_watermark(),
    ]);
    let mut t = WindowTrigger::new(&desc, window());
    t.receive_event(&TriggerSignal::Period(Duration::from_millis(100)));
    assert!(!t.should_trigger());
    t.receive_event(&TriggerSignal::Watermark(100 * MS));
    assert!(t.should_trigger());
}

#[test]
fn empty_all_of_never_fires() {
    let mut t = WindowTrigger::new(&TriggerDescription::all_of(vec![]), window());
    t.receive_event(&TriggerSignal::Watermark(i64::MAX));
    assert!(!t.should_trigger());
}

#[test]
fn any_of_fires_on_first_child() {
    let desc = TriggerDescription::any_of(vec![
        TriggerDescription::at_window_item_size(5),
        TriggerDescription::at_watermark(),
    ]);
    let mut t = WindowTrigger::new(&desc, window());
    t.receive_event(&TriggerSignal::Watermark(200 * MS));
    assert!(t.should_trigger());
}

#[test]
fn trigger_is_monotonic_until_reset() {
    let desc = TriggerDescription::any_of(vec![
        TriggerDescription::at_window_item_size(2),
        TriggerDescription::all_of(vec![
            TriggerDescription::at_period(Duration::from_millis(10)),
            TriggerDescription::at_watermark(),
        ]),
    ]);
    let signals = [
        TriggerSignal::WindowItemSize(3),
        TriggerSignal::Watermark(0),
        TriggerSignal::Period(Duration::from_millis(99)),
        TriggerSignal::WindowItemSize(1),
    ];

    let mut t = WindowTrigger::new(&desc, window());
    t.receive_event(&TriggerSignal::WindowItemSize(2));
    assert!(t.should_trigger());
    for s in signals.iter().cycle().take(20) {
        t.receive_event(s);
        assert!(t.should_trigger(), "became false after {s:?}");
    }

    t.reset();
    assert!(!t.should_trigger());
    assert_eq!(t.state().result(), Verdict::Unknown);
}

#[test]
fn periods_are_collected_recursively() {
    let desc = TriggerDescription::any_of(vec![
        TriggerDescription::at_period(Duration::from_millis(200)),
        TriggerDescription::all_of(vec![
            TriggerDescription::at_period(Duration::from_millis(100)),
            TriggerDescription::at_period(Duration::from_millis(200)),
        ]),
    ]);
    assert_eq!(desc.periods(), vec![Duration::from_millis(100), Duration::from_millis(200)]);
}

#[test]
fn manager_fires_only_the_window_that_grew() {
    let mut m = TriggerManager::new(TriggerDescription::at_window_item_size(2));
    let a = KeyedWindow::new("a", window());
    let b = KeyedWindow::new("b", window());
    m.signal_window_created(&a);
    m.signal_window_created(&b);

    assert!(m.signal_window_size_reached(&a, 1).is_empty());
    assert_eq!(m.signal_window_size_reached(&a, 2), vec![a.clone()]);
    assert!(m.signal_window_size_reached(&b, 1).is_empty());
    // fired triggers are reset
    assert!(m.signal_window_size_reached(&a, 1).is_empty());
}

#[test]
fn manager_watermark_is_monotonic_and_ordered() {
    let mut m = TriggerManager::new(TriggerDescription::at_watermark());
    let late = KeyedWindow::new("a", Window::new(100 * MS, 200 * MS));
    let early = KeyedWindow::new("b", window());
    m.signal_window_created(&late);
    m.signal_window_created(&early);

    assert_eq!(m.signal_watermark(100 * MS), vec![early.clone()]);
    // a stale watermark re-signals the current one
    assert!(m.signal_watermark(10 * MS).iter().all(|kw| *kw == early));
    assert_eq!(m.watermark(), Some(100 * MS));

    assert_eq!(m.signal_watermark(300 * MS), vec![late, early]);
}

#[test]
fn manager_forgets_deleted_windows() {
    let mut m = TriggerManager::new(TriggerDescription::at_period(Duration::from_millis(5)));
    let kw = KeyedWindow::new("a", window());
    m.signal_window_created(&kw);
    assert!(m.is_live(&kw));
    m.signal_window_deleted(&kw);
    assert!(m.is_empty());
    assert!(m.signal_duration(Duration::from_millis(5)).is_empty());
}

#[test]
fn tickers_refcount_periods() {
    let mut tickers = Tickers::new();
    let desc = TriggerDescription::at_period(Duration::from_millis(50));
    tickers.register(&desc);
    tickers.register(&desc);
    tickers.unregister(&desc);
    assert_eq!(tickers.periods(), vec![Duration::from_millis(50)]);
    tickers.unregister(&desc);
    assert!(tickers.periods().is_empty());
}

#[mark_flaky_tests::flaky]
#[test]
fn zero_period_ticks_at_the_minimum_interval() -> anyhow::Result<()> {
    let mut tickers = Tickers::new();
    tickers.register(&TriggerDescription::at_period(Duration::ZERO));

    let ticks = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let ticks = Arc::clone(&ticks);
        let seen = Arc::clone(&seen);
        tickers.start(
            &Context::background(),
            Arc::new(move |period: Duration| -> anyhow::Result<()> {
                ticks.fetch_add(1, Ordering::SeqCst);
                seen.lock().map_err(|e| anyhow::anyhow!("{e}"))?.push(period);
                Ok(())
            }),
        )?;
    }
    thread::sleep(Duration::from_millis(30));
    tickers.stop()?;

    // about one tick per MIN_TICK_INTERVAL, not a spin
    let count = ticks.load(Ordering::SeqCst);
    assert!(count >= 1, "ticker never fired");
    assert!(count <= 60, "{count} ticks in 30ms");
    assert!(seen.lock().map_err(|e| anyhow::anyhow!("{e}"))?.iter().all(|p| p.is_zero()));
    Ok(())
}

#[test]
fn stop_joins_every_ticker_and_reports_panics() -> anyhow::Result<()> {
    let mut tickers = Tickers::new();
    tickers.register(&TriggerDescription::any_of(vec![
        TriggerDescription::at_period(Duration::from_millis(1)),
        TriggerDescription::at_period(Duration::from_millis(2)),
    ]));
    let explode: TickFn = Arc::new(|_: Duration| -> anyhow::Result<()> { panic!("tick exploded") });
    tickers.start(&Context::background(), explode)?;
    thread::sleep(Duration::from_millis(20));

    let err = tickers.stop().expect_err("panicked tickers must be reported");
    assert!(err.to_string().contains("2 ticker thread(s) panicked"), "{err}");
    assert!(!tickers.is_running());
    Ok(())
}

#[test]
fn tick_error_stops_the_ticker_and_is_returned() -> anyhow::Result<()> {
    let mut tickers = Tickers::new();
    tickers.register(&TriggerDescription::at_period(Duration::from_millis(1)));
    let failing: TickFn = Arc::new(|_: Duration| Err(anyhow::anyhow!("publish failed")));
    tickers.start(&Context::background(), failing)?;
    thread::sleep(Duration::from_millis(20));

    let err = tickers.stop().expect_err("tick error must surface");
    assert!(err.to_string().contains("publish failed"), "{err}");
    Ok(())
}
