use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use windflow::Context;
use windflow::group::ExecutionGroup;
use windflow::handler::{GenerateHandler, Handler, LogHandler, MergeHandler, handler_fn};
use windflow::testing::CollectHandler;
use windflow::value::{AGGREGATE, CURRENT, PREVIOUS, RETRACT};
use windflow::{Item, ItemType, Value, Window};

fn run(handler: &dyn Handler, item: Item) -> anyhow::Result<Vec<Item>> {
    let mut out = Vec::new();
    handler.process(item, &mut |i| out.push(i))?;
    Ok(out)
}

#[test]
fn merge_folds_previous_and_current() -> anyhow::Result<()> {
    let sum = MergeHandler::sum();
    let current = Value::List(vec![1.into(), 2.into()]);
    let out = run(&sum, Item::new("k", Value::pair(PREVIOUS, 10.into(), CURRENT, current)))?;
    assert_eq!(out[0].data, Value::from(13));
    assert_eq!(out[0].kind, ItemType::Aggregation);
    Ok(())
}

#[test]
fn merge_rejects_empty_window() {
    assert!(run(&MergeHandler::sum(), Item::new("k", Value::List(Vec::new()))).is_err());
}

#[test]
fn merge_retract_emits_delta() -> anyhow::Result<()> {
    let sum = MergeHandler::sum();
    let mut out = Vec::new();
    let item = Item::new("k", Value::pair(RETRACT, 126.into(), AGGREGATE, 145.into()))
        .of_kind(ItemType::RetractAndAggregate);
    sum.retract(item, &mut |i| out.push(i))?;
    assert_eq!(out[0].data, Value::from(19));
    assert_eq!(out[0].kind, ItemType::Aggregation);

    assert!(sum.retract(Item::new("k", 1), &mut |_| {}).is_err());
    Ok(())
}

#[test]
fn custom_merge_combines_strings() -> anyhow::Result<()> {
    let concat = MergeHandler::new(
        |a, b| Ok(Value::from(format!("{}{}", a.as_str().unwrap_or_default(), b.as_str().unwrap_or_default()))),
        |agg, _| Ok(agg.clone()),
    );
    let out = run(&concat, Item::new("k", Value::List(vec!["a".into(), "b".into(), "c".into()])))?;
    assert_eq!(out[0].data, Value::from("abc"));
    Ok(())
}

#[test]
fn generate_emits_its_items_and_cannot_retract() -> anyhow::Result<()> {
    let items = vec![Item::new("a", 1), Item::new("b", 2)];
    let generate = GenerateHandler::new(items.clone());
    assert_eq!(run(&generate, Item::default())?, items);
    assert!(generate.retract(Item::default(), &mut |_| {}).is_err());
    Ok(())
}

#[test]
fn closure_handler_forwards_retractions() -> anyhow::Result<()> {
    let double = handler_fn(|item: Item, emit: &mut dyn FnMut(Item)| {
        let n = item.data.expect_f64()?;
        emit(Item { data: Value::number(n * 2.0), ..item });
        Ok(())
    });
    assert_eq!(run(&double, Item::new("k", 21))?[0].data, Value::from(42));
    assert!(run(&double, Item::new("k", "x")).is_err());

    let mut out = Vec::new();
    let retraction = Item::new("k", 1).of_kind(ItemType::RetractAndAggregate);
    double.retract(retraction.clone(), &mut |i| out.push(i))?;
    assert_eq!(out, vec![retraction]);
    Ok(())
}

#[test]
fn log_handler_tees_or_delegates() -> anyhow::Result<()> {
    let item = Item::new("k", Value::List(vec![1.into(), 2.into()])).in_window(Window::new(0, 10));

    let tee = LogHandler::new("tee");
    assert_eq!(run(&tee, item.clone())?, vec![item.clone()]);

    let wrapped = LogHandler::wrap("sum", Arc::new(MergeHandler::sum()));
    assert_eq!(run(&wrapped, item)?[0].data, Value::from(3));
    Ok(())
}

#[test]
fn collect_handler_clones_share_state() -> anyhow::Result<()> {
    let collect = CollectHandler::new();
    let handle = collect.clone();
    run(&collect, Item::new("k", 1))?;
    collect.retract(Item::new("k", 2), &mut |_| {})?;
    assert_eq!(handle.data(), vec![Value::from(1), Value::from(2)]);

    handle.clear();
    assert!(collect.is_empty());
    Ok(())
}

#[test]
fn group_returns_first_error_and_cancels_siblings() -> anyhow::Result<()> {
    let mut group = ExecutionGroup::new(&Context::background());
    let stopped = Arc::new(AtomicUsize::new(0));

    for i in 0..3 {
        let stopped = Arc::clone(&stopped);
        group.go(format!("waiter-{i}"), move |ctx| {
            while !ctx.is_done() {
                thread::sleep(Duration::from_millis(5));
            }
            stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })?;
    }
    group.go("failing", |_| Err(anyhow::anyhow!("boom")))?;

    let err = group.wait().expect_err("group must fail");
    assert!(format!("{err:#}").contains("boom"), "{err:#}");
    assert!(format!("{err:#}").contains("failing"), "{err:#}");
    assert_eq!(stopped.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn group_turns_panics_into_errors() -> anyhow::Result<()> {
    let mut group = ExecutionGroup::new(&Context::background());
    group.go("panicking", |_| panic!("kaboom"))?;
    let err = group.wait().expect_err("panic must surface as an error");
    assert!(format!("{err:#}").contains("kaboom"), "{err:#}");
    Ok(())
}

#[test]
fn group_of_successful_tasks_is_ok() -> anyhow::Result<()> {
    let mut group = ExecutionGroup::new(&Context::background());
    let count = Arc::new(AtomicUsize::new(0));
    for i in 0..4 {
        let count = Arc::clone(&count);
        group.go(format!("task-{i}"), move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })?;
    }
    assert_eq!(group.len(), 4);
    group.wait()?;
    assert_eq!(count.load(Ordering::SeqCst), 4);
    Ok(())
}

#[test]
fn context_timeout_and_parent_cancel() {
    let root = Context::background();
    let timed = root.with_timeout(Duration::from_millis(20));
    let start = Instant::now();
    while !timed.is_done() {
        thread::sleep(Duration::from_millis(2));
    }
    assert!(start.elapsed() >= Duration::from_millis(20));
    assert!(!root.is_done());

    let child = root.with_cancel();
    child.cancel();
    assert!(child.is_done());
    assert!(!root.is_done());
}
