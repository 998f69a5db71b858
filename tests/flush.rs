use windflow::flush::{BagOf, WindowFlushMode, flush_with_mode};
use windflow::handler::{MergeHandler, handler_fn};
use windflow::value::{AGGREGATE, RETRACT};
use windflow::{Item, ItemType, KeyedWindow, Value, Window};

fn window() -> Window {
    Window::new(0, 100)
}

fn fired(values: &[i64]) -> Item {
    Item::new("k", Value::List(values.iter().map(|v| Value::from(*v)).collect()))
        .at(100)
        .in_window(window())
}

fn run(mode: WindowFlushMode, bag: &mut BagOf<Item>, item: Item) -> anyhow::Result<Vec<Item>> {
    let mut out = Vec::new();
    flush_with_mode(mode, bag, &MergeHandler::sum(), item, &mut |i| out.push(i))?;
    Ok(out)
}

#[test]
fn discard_keeps_no_state() -> anyhow::Result<()> {
    let mut bag = BagOf::new();
    let first = run(WindowFlushMode::Discard, &mut bag, fired(&[1, 2]))?;
    let second = run(WindowFlushMode::Discard, &mut bag, fired(&[3]))?;
    assert_eq!(first[0].data, Value::from(3));
    assert_eq!(second[0].data, Value::from(3));
    assert!(bag.is_empty());
    Ok(())
}

#[test]
fn accumulate_combines_with_previous() -> anyhow::Result<()> {
    let mode = WindowFlushMode::Accumulate { allow_late_arrival: true };
    let mut bag = BagOf::new();
    let first = run(mode, &mut bag, fired(&[1, 2]))?;
    let second = run(mode, &mut bag, fired(&[10]))?;

    assert_eq!(first[0].data, Value::from(3));
    assert_eq!(second[0].data, Value::from(13));
    assert_eq!(second[0].kind, ItemType::Aggregation);

    let kw = KeyedWindow::new("k", window());
    assert_eq!(bag.get(&kw).map(|i| i.data.clone()), Some(Value::from(13)));
    Ok(())
}

#[test]
fn accumulate_and_retract_emits_old_and_new() -> anyhow::Result<()> {
    let mode = WindowFlushMode::AccumulatingAndRetracting { allow_late_arrival: true };
    let mut bag = BagOf::new();
    let first = run(mode, &mut bag, fired(&[1, 2]))?;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].kind, ItemType::Aggregation);

    let second = run(mode, &mut bag, fired(&[4]))?;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].kind, ItemType::RetractAndAggregate);
    assert_eq!(second[0].data.get(RETRACT), Some(&Value::from(3)));
    assert_eq!(second[0].data.get(AGGREGATE), Some(&Value::from(7)));
    assert_eq!(second[0].window, Some(window()));
    Ok(())
}

#[test]
fn unwindowed_items_bypass_the_bag() -> anyhow::Result<()> {
    let mode = WindowFlushMode::Accumulate { allow_late_arrival: true };
    let mut bag = BagOf::new();
    let out = run(mode, &mut bag, Item::new("k", 5))?;
    assert_eq!(out[0].data, Value::from(5));
    assert!(bag.is_empty());
    Ok(())
}

#[test]
fn outputs_inherit_input_window() -> anyhow::Result<()> {
    let strip = handler_fn(|item: Item, emit: &mut dyn FnMut(Item)| {
        emit(Item::new(item.key, "done"));
        Ok(())
    });
    let mut bag = BagOf::new();
    let mut out = Vec::new();
    flush_with_mode(WindowFlushMode::Discard, &mut bag, &strip, fired(&[1]), &mut |i| out.push(i))?;
    assert_eq!(out[0].window, Some(window()));
    Ok(())
}

#[test]
fn handler_errors_propagate() {
    let mut bag = BagOf::new();
    let item = Item::new("k", Value::List(vec!["x".into()])).in_window(window());
    let mut sink = |_: Item| {};
    let err = flush_with_mode(WindowFlushMode::Discard, &mut bag, &MergeHandler::sum(), item, &mut sink);
    // a single-element list folds to itself without combining
    assert!(err.is_ok());

    let item = Item::new("k", Value::List(vec!["x".into(), 1.into()])).in_window(window());
    let err = flush_with_mode(WindowFlushMode::Discard, &mut bag, &MergeHandler::sum(), item, &mut sink);
    assert!(err.is_err());
}

#[test]
fn late_arrival_flags() {
    assert!(WindowFlushMode::Discard.allows_late_arrival());
    assert!(!WindowFlushMode::Discard.keeps_state());
    assert!(!WindowFlushMode::Accumulate { allow_late_arrival: false }.allows_late_arrival());
    assert!(WindowFlushMode::AccumulatingAndRetracting { allow_late_arrival: true }.keeps_state());
}

#[test]
fn bag_evicts_matching_entries() {
    let mut bag = BagOf::new();
    bag.set(&KeyedWindow::new("a", Window::new(0, 10)), 1);
    bag.set(&KeyedWindow::new("b", Window::new(0, 20)), 2);
    let mut evicted = bag.evict(|v| *v == 1);
    evicted.sort();
    assert_eq!(evicted, vec![1]);
    assert_eq!(bag.len(), 1);
    assert_eq!(bag.delete(&KeyedWindow::new("b", Window::new(0, 20))), Some(2));
}
