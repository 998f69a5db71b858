use std::time::Duration;
use windflow::dag::{DagBuilder, kahn_sort};
use windflow::handler::{GenerateHandler, MergeHandler};
use windflow::node::*;
use windflow::trigger::TriggerDescription;
use windflow::windowing::WindowDescription;
use windflow::DagError;

#[test]
fn join_shape_sorts_sources_first() -> anyhow::Result<()> {
    let dag = DagBuilder::new();
    let b = dag.load(GenerateHandler::default(), [with_name("a")]).window([with_name("b")]);
    let d = dag.load(GenerateHandler::default(), [with_name("c")]).window([with_name("d")]);
    dag.join(&b, &d, [with_name("e")]).window([with_name("f")]);

    let built = dag.build()?;
    assert_eq!(built.len(), 6);

    let pos = |n: &str| built.position(n).unwrap_or(usize::MAX);
    for (from, to) in built.edges() {
        assert!(pos(from) < pos(to), "{from} must precede {to}");
    }
    assert!(pos("a") < pos("b") && pos("c") < pos("d"));
    assert!(pos("b") < pos("e") && pos("d") < pos("e"));
    assert!(pos("e") < pos("f"));
    Ok(())
}

#[test]
fn duplicate_names_fail_at_build() {
    let dag = DagBuilder::new();
    dag.load(GenerateHandler::default(), [with_name("src")]);
    dag.load(GenerateHandler::default(), [with_name("src")]);
    assert_eq!(dag.build().unwrap_err(), DagError::DuplicateNode("src".into()));
}

#[test]
fn empty_dag_is_rejected() {
    assert_eq!(DagBuilder::new().build().unwrap_err(), DagError::EmptyDag);
}

#[test]
fn window_without_input_is_rejected() {
    let dag = DagBuilder::new();
    dag.window([with_name("orphan")]);
    assert_eq!(dag.build().unwrap_err(), DagError::MissingInput("orphan".into()));
}

#[test]
fn kahn_sort_detects_cycles() {
    let err = kahn_sort(&[1, 2, 3], &[(1, 2), (2, 3), (3, 2)]).unwrap_err();
    assert!(matches!(err, DagError::CycleDetected(ref n) if n == "2" || n == "3"), "{err}");
}

#[test]
fn kahn_sort_is_deterministic() -> anyhow::Result<()> {
    let order = kahn_sort(&[5, 3, 1, 4], &[(5, 4), (3, 4), (1, 4)])?;
    assert_eq!(order, vec![1, 3, 5, 4]);
    Ok(())
}

#[test]
fn kahn_sort_rejects_unknown_edge_endpoints() {
    assert_eq!(kahn_sort(&[1], &[(1, 9)]).unwrap_err(), DagError::NodeNotFound("9".into()));
}

#[test]
fn auto_names_and_scopes() -> anyhow::Result<()> {
    let dag = DagBuilder::with_scope("orders");
    let load = dag.load(GenerateHandler::default(), []);
    let win = load.window([with_name("minute")]);
    let sum = win.map(MergeHandler::sum(), []);
    let raw = load.window([]);
    assert_eq!(load.name().as_deref(), Some("orders.load0"));
    assert_eq!(win.name().as_deref(), Some("orders.minute"));
    assert_eq!(sum.name().as_deref(), Some("orders.minute.map2"));
    assert_eq!(raw.name().as_deref(), Some("orders.load0.window3"));

    let found = dag.get_by_name("orders.minute")?;
    assert_eq!(found.kind(), "window");
    assert!(matches!(dag.get_by_name("minute"), Err(DagError::NodeNotFound(_))));
    Ok(())
}

#[test]
fn unnamed_children_are_named_after_their_parent() -> anyhow::Result<()> {
    let dag = DagBuilder::new();
    let src = dag.load(GenerateHandler::default(), [with_name("src")]);
    let left = src.window([]);
    let right = src.map(MergeHandler::sum(), []);
    let both = dag.join(&left, &right, []);
    assert_eq!(left.name().as_deref(), Some("src.window1"));
    assert_eq!(right.name().as_deref(), Some("src.map2"));
    assert_eq!(both.name().as_deref(), Some("src.window1.join3"));

    let built = dag.build()?;
    assert_eq!(built.len(), 4);
    assert!(built.position("src") < built.position("src.window1.join3"));
    Ok(())
}

#[test]
fn node_options_reach_the_context() -> anyhow::Result<()> {
    let dag = DagBuilder::new();
    dag.load(GenerateHandler::default(), [with_name("src")])
        .window([
            with_name("w"),
            with_sliding_window(Duration::from_secs(60), Duration::from_secs(10)),
            with_triggers([
                TriggerDescription::at_window_item_size(10),
                TriggerDescription::at_watermark(),
            ]),
        ])
        .map(MergeHandler::sum(), [with_name("m"), with_accumulating_and_retracting()]);

    let w = dag.get_by_name("w")?;
    assert_eq!(
        *w.ctx().window(),
        WindowDescription::Sliding { width: Duration::from_secs(60), period: Duration::from_secs(10) }
    );
    assert!(matches!(w.ctx().trigger(), TriggerDescription::AllOf(children) if children.len() == 2));

    let m = dag.get_by_name("m")?;
    assert!(m.ctx().flush_mode().keeps_state());
    assert_eq!(m.inputs()[0].name(), "w");
    Ok(())
}

#[test]
fn explain_lists_nodes_in_order() -> anyhow::Result<()> {
    let dag = DagBuilder::new();
    dag.load(GenerateHandler::default(), [with_name("src")])
        .window([with_name("win"), with_session_window(Duration::from_secs(5))])
        .map(MergeHandler::sum(), [with_name("sum"), with_discard()]);
    let text = dag.build()?.to_string();

    assert!(text.starts_with("DAG (3 nodes, 2 edges)"), "{text}");
    let src = text.find("load src").unwrap_or(usize::MAX);
    let win = text.find("window win <- src").unwrap_or(usize::MAX);
    let sum = text.find("map sum <- win").unwrap_or(usize::MAX);
    assert!(src < win && win < sum, "{text}");
    Ok(())
}
