//! Interprocedural taint tracking through the session API.
//!
//! Every test follows the same pipeline:
//! 1. Build a small multi-function program with the fluent API
//! 2. Run a session with a source/sanitizer/sink rule
//! 3. Check the reported flows down to the operation, with their origins
//!
//! The rule vocabulary is shared: `Input.Read` produces tainted data,
//! `Scrub.Clean` launders it, and `Danger.Run` must never observe it.

use flowscope::prelude::*;

/// The source/sanitizer/sink rule every test runs.
fn rule() -> TaintRule {
    TaintRule::new("input-to-danger")
        .source(CalleeSpec::symbol("Input.Read"))
        .sanitizer(CalleeSpec::symbol("Scrub.Clean"))
        .sink(CalleeSpec::symbol("Danger.Run"))
}

#[test]
fn test_flow_through_returned_value() {
    let mut mb = ModuleBuilder::new();
    let input = mb.external("Input.Read");
    let danger = mb.external("Danger.Run");

    let mut f = mb.start_function("getter");
    let src = f.call_ext(input, vec![]);
    let src_op = src.id;
    f.ret(Some(src));
    let getter = mb.finish_function(f).unwrap();

    let mut f = mb.start_function("handler");
    let x = f.local("x");
    let value = f.call_fn(getter, vec![]);
    f.assign(x, value);
    let arg = f.read(x);
    let sink = f.call_ext(danger, vec![arg]);
    let sink_op = sink.id;
    f.eval(sink);
    f.ret(None);
    let handler = mb.finish_function(f).unwrap();
    let module = mb.finish().unwrap();

    let report = Session::new(&module).taint_rule(rule()).run();

    assert!(report.skips().is_empty());
    assert_eq!(report.findings().len(), 1);
    let finding = &report.findings()[0];
    assert_eq!(finding.rule(), "input-to-danger");
    assert_eq!(finding.hazard(), OpRef::new(handler, sink_op));
    assert_eq!(
        finding.origin(),
        Some(TaintOrigin::Call(OpRef::new(getter, src_op)))
    );
    assert_eq!(finding.classification(), Classification::Flagged);
}

#[test]
fn test_flow_through_out_param() {
    let mut mb = ModuleBuilder::new();
    let input = mb.external("Input.Read");
    let danger = mb.external("Danger.Run");

    let mut f = mb.start_function("fill");
    let p = f.out_param("p");
    let src = f.call_ext(input, vec![]);
    let src_op = src.id;
    f.assign(p, src);
    f.ret(None);
    let fill = mb.finish_function(f).unwrap();

    let mut f = mb.start_function("handler");
    let x = f.local("x");
    let out = f.out_arg(x);
    let filled = f.call(Callee::Function(fill), vec![out]);
    f.eval(filled);
    let arg = f.read(x);
    let sink = f.call_ext(danger, vec![arg]);
    let sink_op = sink.id;
    f.eval(sink);
    f.ret(None);
    let handler = mb.finish_function(f).unwrap();
    let module = mb.finish().unwrap();

    let report = Session::new(&module).taint_rule(rule()).run();

    assert!(report.skips().is_empty());
    assert_eq!(report.findings().len(), 1);
    let finding = &report.findings()[0];
    assert_eq!(finding.hazard(), OpRef::new(handler, sink_op));
    assert_eq!(
        finding.origin(),
        Some(TaintOrigin::Call(OpRef::new(fill, src_op)))
    );
}

#[test]
fn test_sanitizer_inside_callee_stops_the_flow() {
    let mut mb = ModuleBuilder::new();
    let input = mb.external("Input.Read");
    let scrub = mb.external("Scrub.Clean");
    let danger = mb.external("Danger.Run");

    let mut f = mb.start_function("launder");
    let p = f.param("p");
    let raw = f.read(p);
    let cleaned = f.call_ext(scrub, vec![raw]);
    f.ret(Some(cleaned));
    let launder = mb.finish_function(f).unwrap();

    let mut f = mb.start_function("handler");
    let x = f.local("x");
    let y = f.local("y");
    let src = f.call_ext(input, vec![]);
    f.assign(x, src);
    let xv = f.read(x);
    let safe = f.call_fn(launder, vec![xv]);
    f.assign(y, safe);
    let yv = f.read(y);
    let sink = f.call_ext(danger, vec![yv]);
    f.eval(sink);
    f.ret(None);
    mb.finish_function(f).unwrap();
    let module = mb.finish().unwrap();

    let report = Session::new(&module).taint_rule(rule()).run();

    assert!(report.findings().is_empty());
    assert!(report.skips().is_empty());
}

#[test]
fn test_direct_recursion_terminates() {
    let mut mb = ModuleBuilder::new();
    let input = mb.external("Input.Read");
    let danger = mb.external("Danger.Run");
    let more = mb.external("Env.More");
    let rec = mb.declare_function("rec");

    let mut f = mb.start_function("rec");
    let x = f.local("x");
    let src = f.call_ext(input, vec![]);
    let src_op = src.id;
    f.assign(x, src);
    let xv = f.read(x);
    let sink = f.call_ext(danger, vec![xv]);
    let sink_op = sink.id;
    f.eval(sink);
    let cond = f.call_ext(more, vec![]);
    f.if_then(cond, |body| {
        let again = body.call_fn(rec, vec![]);
        body.eval(again);
    });
    f.ret(None);
    mb.finish_function(f).unwrap();
    let module = mb.finish().unwrap();

    let report = Session::new(&module).taint_rule(rule()).run();

    // The self-call is summarized instead of expanded, so the analysis
    // terminates and the internal flow is reported exactly once.
    assert!(report.skips().is_empty());
    assert_eq!(report.findings().len(), 1);
    let finding = &report.findings()[0];
    assert_eq!(finding.hazard(), OpRef::new(rec, sink_op));
    assert_eq!(
        finding.origin(),
        Some(TaintOrigin::Call(OpRef::new(rec, src_op)))
    );
}

#[test]
fn test_mutual_recursion_terminates() {
    let mut mb = ModuleBuilder::new();
    let input = mb.external("Input.Read");
    let danger = mb.external("Danger.Run");
    let more = mb.external("Env.More");
    let ping = mb.declare_function("ping");
    let pong = mb.declare_function("pong");

    let mut f = mb.start_function("ping");
    let x = f.local("x");
    let src = f.call_ext(input, vec![]);
    let src_op = src.id;
    f.assign(x, src);
    let xv = f.read(x);
    let forward = f.call_fn(pong, vec![xv]);
    f.eval(forward);
    f.ret(None);
    mb.finish_function(f).unwrap();

    let mut f = mb.start_function("pong");
    let p = f.param("p");
    let pv = f.read(p);
    let sink = f.call_ext(danger, vec![pv]);
    let sink_op = sink.id;
    f.eval(sink);
    let cond = f.call_ext(more, vec![]);
    f.if_then(cond, |body| {
        let back = body.call_fn(ping, vec![]);
        body.eval(back);
    });
    f.ret(None);
    mb.finish_function(f).unwrap();
    let module = mb.finish().unwrap();

    let report = Session::new(&module).taint_rule(rule()).run();

    assert!(report.skips().is_empty());
    assert_eq!(report.findings().len(), 1);
    let finding = &report.findings()[0];
    assert_eq!(finding.hazard(), OpRef::new(pong, sink_op));
    assert_eq!(
        finding.origin(),
        Some(TaintOrigin::Call(OpRef::new(ping, src_op)))
    );
}

/// Builds a three-hop chain: the source is two calls away from the sink.
fn chained_module() -> (Module, FunctionId, OpId, FunctionId, OpId) {
    let mut mb = ModuleBuilder::new();
    let input = mb.external("Input.Read");
    let danger = mb.external("Danger.Run");
    let inner = mb.declare_function("inner");
    let middle = mb.declare_function("middle");

    let mut f = mb.start_function("inner");
    let p = f.param("p");
    let pv = f.read(p);
    let sink = f.call_ext(danger, vec![pv]);
    let sink_op = sink.id;
    f.eval(sink);
    f.ret(None);
    mb.finish_function(f).unwrap();

    let mut f = mb.start_function("middle");
    let p = f.param("p");
    let pv = f.read(p);
    let call = f.call_fn(inner, vec![pv]);
    f.eval(call);
    f.ret(None);
    mb.finish_function(f).unwrap();

    let mut f = mb.start_function("entry");
    let x = f.local("x");
    let src = f.call_ext(input, vec![]);
    let src_op = src.id;
    f.assign(x, src);
    let xv = f.read(x);
    let call = f.call_fn(middle, vec![xv]);
    f.eval(call);
    f.ret(None);
    let entry = mb.finish_function(f).unwrap();

    let module = mb.finish().unwrap();
    (module, entry, src_op, inner, sink_op)
}

#[test]
fn test_inline_depth_budget_bounds_the_search() {
    let (module, entry, src_op, inner, sink_op) = chained_module();

    // A budget of one lets the entry reach `middle` but not `inner`, so the
    // chain is cut by a conservative summary and nothing is reported.
    let shallow = Session::new(&module)
        .with_config(AnalysisConfig {
            max_inline_depth: 1,
            ..AnalysisConfig::default()
        })
        .taint_rule(rule())
        .run();
    assert!(shallow.findings().is_empty());
    assert!(shallow.skips().is_empty());

    // The default budget covers the whole chain.
    let deep = Session::new(&module).taint_rule(rule()).run();
    assert!(deep.skips().is_empty());
    assert_eq!(deep.findings().len(), 1);
    let finding = &deep.findings()[0];
    assert_eq!(finding.hazard(), OpRef::new(inner, sink_op));
    assert_eq!(
        finding.origin(),
        Some(TaintOrigin::Call(OpRef::new(entry, src_op)))
    );
}
