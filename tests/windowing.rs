use std::time::Duration;
use windflow::windowing::*;
use windflow::{Item, Window};

const MS: i64 = 1_000_000;

#[test]
fn fixed_window_contains_its_timestamp() {
    let width = Duration::from_millis(100);
    let policy = WindowDescription::Fixed { width };
    for t in [-250 * MS, -1, 0, 1, 99 * MS, 100 * MS, 12_345_678_901] {
        let ws = windows_for(t, &policy);
        assert_eq!(ws.len(), 1);
        let w = ws[0];
        assert_eq!(w.start, t - t.rem_euclid(100 * MS), "t={t}");
        assert!(w.start <= t && t < w.end, "t={t} w={w}");
        assert_eq!(w.end - w.start, 100 * MS);
    }
}

#[test]
fn windows_saturate_at_the_ends_of_time() {
    let fixed = WindowDescription::Fixed { width: Duration::from_millis(100) };
    let sliding = WindowDescription::Sliding {
        width: Duration::from_millis(100),
        period: Duration::from_millis(25),
    };
    for t in [i64::MAX, i64::MAX - 1] {
        let w = windows_for(t, &fixed)[0];
        assert!(w.start <= t, "t={t} w={w}");
        assert_eq!(w.end, i64::MAX);

        let ws = windows_for(t, &sliding);
        assert_eq!(ws.len(), 4, "t={t}: {ws:?}");
        assert!(ws.iter().all(|w| w.start <= t && w.end >= w.start), "{ws:?}");
        assert_eq!(ws.last().map(|w| w.end), Some(i64::MAX));
    }

    let w = Window::fixed(i64::MIN, 100 * MS);
    assert_eq!(w.start, i64::MIN);
    assert!(w.contains(i64::MIN));
    assert!(windows_for(i64::MIN, &sliding).iter().all(|w| w.start == i64::MIN));
}

#[test]
fn sliding_windows_cover_timestamp() {
    let policy = WindowDescription::Sliding {
        width: Duration::from_millis(100),
        period: Duration::from_millis(25),
    };
    for t in [0, 7 * MS, 25 * MS, 99 * MS, 1_000 * MS + 3] {
        let ws = windows_for(t, &policy);
        assert_eq!(ws.len(), 4, "t={t}: {ws:?}");
        for w in &ws {
            assert!(w.contains(t), "t={t} w={w}");
            assert_eq!(w.start.rem_euclid(25 * MS), 0);
        }
        assert!(ws.windows(2).all(|p| p[0].start < p[1].start));
    }
}

#[test]
fn sliding_windows_round_up_when_width_not_multiple() {
    let policy = WindowDescription::Sliding {
        width: Duration::from_millis(100),
        period: Duration::from_millis(30),
    };
    // ceil(100 / 30) = 4 for aligned inputs
    let ws = windows_for(0, &policy);
    assert_eq!(ws.len(), 4);
    assert!(ws.iter().all(|w| w.contains(0)));
}

#[test]
fn sliding_period_wider_than_width_leaves_gaps() {
    let policy = WindowDescription::Sliding {
        width: Duration::from_millis(10),
        period: Duration::from_millis(100),
    };
    assert_eq!(windows_for(5 * MS, &policy), vec![Window::new(0, 10 * MS)]);
    assert!(windows_for(50 * MS, &policy).is_empty());

    let items = assign_windows(vec![Item::new("k", 1).at(50 * MS)], &policy);
    assert!(items.is_empty());
}

#[test]
fn assign_windows_fans_out_per_window() {
    let policy = WindowDescription::Sliding {
        width: Duration::from_millis(20),
        period: Duration::from_millis(10),
    };
    let items = assign_windows(vec![Item::new("k", 1).at(15 * MS)], &policy);
    let windows: Vec<Window> = items.iter().filter_map(|i| i.window).collect();
    assert_eq!(windows, vec![Window::new(0, 20 * MS), Window::new(10 * MS, 30 * MS)]);
}

#[test]
fn drop_timestamps_zeroes_event_time() {
    let items = drop_timestamps(vec![Item::new("k", 1).at(42), Item::new("k", 2).at(7)]);
    assert!(items.iter().all(|i| i.event_time == 0));
}

#[test]
fn group_by_key_keeps_first_seen_order() {
    let items = vec![Item::new("b", 1), Item::new("a", 2), Item::new("b", 3)];
    let groups = group_by_key(items);
    let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["b", "a"]);
    assert_eq!(groups[0].data.len(), 2);
}

#[test]
fn session_windows_within_gap_merge() {
    let gap = Duration::from_millis(10);
    let policy = WindowDescription::Session { gap };
    let items = assign_windows(
        vec![Item::new("k", 1).at(0), Item::new("k", 2).at(4 * MS), Item::new("k", 3).at(40 * MS)],
        &policy,
    );
    let merged = merge_windows(group_by_key(items), &policy);
    let windows: Vec<Window> = merged[0].data.iter().filter_map(|i| i.window).collect();
    assert_eq!(
        windows,
        vec![
            Window::new(0, 14 * MS),
            Window::new(0, 14 * MS),
            Window::new(40 * MS, 50 * MS),
        ]
    );
}

#[test]
fn session_merge_is_idempotent() {
    let gap = Duration::from_millis(10);
    let windows: Vec<Window> = [0, 3, 8, 25, 31, 60]
        .iter()
        .map(|t| Window::new(t * MS, t * MS + 10 * MS))
        .collect();

    let once = session_merge(&windows, gap);
    let mut distinct = once.clone();
    distinct.sort();
    distinct.dedup();

    let twice = session_merge(&distinct, gap);
    assert_eq!(twice, distinct);
}

#[test]
fn merge_windows_ignores_non_session_policies() {
    let policy = WindowDescription::Fixed { width: Duration::from_millis(10) };
    let items = assign_windows(vec![Item::new("k", 1).at(3), Item::new("k", 2).at(30 * MS)], &policy);
    let before = group_by_key(items);
    let after = merge_windows(before.clone(), &policy);
    assert_eq!(before, after);
}
