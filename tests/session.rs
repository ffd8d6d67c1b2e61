//! End-to-end session run over a small web handler module.
//!
//! One module, two rules, one pass:
//! 1. Build a module with two request handlers sharing helpers
//! 2. Run a taint rule and a property rule in the same session
//! 3. Check the merged report, its ordering, and the session stats
//!
//! The module deliberately mixes a dirty path (search goes straight to the
//! database) with a clean one (login escapes first), plus a cookie that is
//! sent with its insecure default.

use flowscope::prelude::*;

struct WebModule {
    module: Module,
    read_param: FunctionId,
    read_op: OpId,
    run_query: FunctionId,
    exec_op: OpId,
    handle_search: FunctionId,
    handle_login: FunctionId,
    add_cookie_op: OpId,
}

/// Two handlers over two helpers: `handle_search` forwards raw input to the
/// database, `handle_login` escapes it first but ships a default cookie.
fn web_module() -> WebModule {
    let mut mb = ModuleBuilder::new();
    let http_read = mb.external("Http.ReadParam");
    let sql_escape = mb.external("Sql.Escape");
    let sql_execute = mb.external("Sql.Execute");
    let add_cookie = mb.external("Response.AddCookie");
    let cookie = mb.ty("Cookie");

    let mut f = mb.start_function("read_param");
    let raw = f.call_ext(http_read, vec![]);
    let read_op = raw.id;
    f.ret(Some(raw));
    let read_param = mb.finish_function(f).unwrap();

    let mut f = mb.start_function("run_query");
    let q = f.param("q");
    let qv = f.read(q);
    let exec = f.call_ext(sql_execute, vec![qv]);
    let exec_op = exec.id;
    f.eval(exec);
    f.ret(None);
    let run_query = mb.finish_function(f).unwrap();

    let mut f = mb.start_function("handle_search");
    let x = f.local("x");
    let value = f.call_fn(read_param, vec![]);
    f.assign(x, value);
    let xv = f.read(x);
    let call = f.call_fn(run_query, vec![xv]);
    f.eval(call);
    f.ret(None);
    let handle_search = mb.finish_function(f).unwrap();

    let mut f = mb.start_function("handle_login");
    let y = f.local("y");
    let value = f.call_fn(read_param, vec![]);
    f.assign(y, value);
    let yv = f.read(y);
    let escaped = f.call_ext(sql_escape, vec![yv]);
    f.assign(y, escaped);
    let yv = f.read(y);
    let call = f.call_fn(run_query, vec![yv]);
    f.eval(call);
    let c = f.local("c");
    let fresh = f.new_object(cookie, vec![]);
    f.assign(c, fresh);
    let cv = f.read(c);
    let ship = f.call_ext(add_cookie, vec![cv]);
    let add_cookie_op = ship.id;
    f.eval(ship);
    f.ret(None);
    let handle_login = mb.finish_function(f).unwrap();

    WebModule {
        module: mb.finish().unwrap(),
        read_param,
        read_op,
        run_query,
        exec_op,
        handle_search,
        handle_login,
        add_cookie_op,
    }
}

fn sql_rule() -> TaintRule {
    TaintRule::new("sql-injection")
        .source(CalleeSpec::symbol("Http.ReadParam"))
        .sanitizer(CalleeSpec::symbol("Sql.Escape"))
        .sink(CalleeSpec::symbol("Sql.Execute"))
}

fn cookie_rule() -> PropertyRule {
    PropertyRule::new("insecure-cookie")
        .track_type(TypeSpec::named("Cookie"))
        .property_bool(
            "Secure",
            PropertyValue::Unflagged,
            PropertyValue::Flagged,
        )
        .initial(vec![PropertyValue::Flagged])
        .hazard(CalleeSpec::symbol("Response.AddCookie"), worst_case)
}

#[test]
fn test_two_rules_one_pass() {
    let web = web_module();
    let report = Session::new(&web.module)
        .taint_rule(sql_rule())
        .property_rule(cookie_rule())
        .run();

    assert!(report.skips().is_empty());
    assert_eq!(report.findings().len(), 2);

    // Findings sort by rule name first, so the cookie comes before the
    // injection.
    let cookie = &report.findings()[0];
    assert_eq!(cookie.rule(), "insecure-cookie");
    assert_eq!(
        cookie.hazard(),
        OpRef::new(web.handle_login, web.add_cookie_op)
    );
    assert_eq!(cookie.classification(), Classification::Flagged);
    assert_eq!(cookie.origin(), None);

    // The search handler's raw parameter reaches the database through the
    // shared helper; the finding points into the helper, with the origin
    // back in `read_param`.
    let injection = &report.findings()[1];
    assert_eq!(injection.rule(), "sql-injection");
    assert_eq!(injection.hazard(), OpRef::new(web.run_query, web.exec_op));
    assert_eq!(
        injection.origin(),
        Some(TaintOrigin::Call(OpRef::new(web.read_param, web.read_op)))
    );
    assert_eq!(injection.classification(), Classification::Flagged);

    let stats = report.stats();
    assert_eq!(stats.function_count, 4);
    assert_eq!(stats.taint_rule_count, 1);
    assert_eq!(stats.property_rule_count, 1);
    assert_eq!(stats.finding_count, 2);
    assert_eq!(stats.skip_count, 0);
    assert!(!stats.cancelled);
}

#[test]
fn test_findings_render_for_humans() {
    let web = web_module();
    let report = Session::new(&web.module)
        .taint_rule(sql_rule())
        .property_rule(cookie_rule())
        .run();

    let lines: Vec<String> = report
        .findings()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert!(lines[0].starts_with("[insecure-cookie] flagged at "));
    assert!(lines[1].starts_with("[sql-injection] flagged at "));
    assert!(lines[1].contains("(from "));
}

#[test]
fn test_call_graph_reflects_the_module() {
    let web = web_module();
    let graph = CallGraph::build(&web.module);

    let stats = graph.stats();
    assert_eq!(stats.function_count, 4);
    assert_eq!(stats.edge_count, 4);
    assert_eq!(stats.entry_points, 2);
    assert_eq!(stats.leaf_functions, 2);
    assert_eq!(stats.recursive_functions, 0);
    assert!(!graph.has_recursion());

    let callees: Vec<FunctionId> = graph.callees(web.handle_search).collect();
    assert!(callees.contains(&web.read_param));
    assert!(callees.contains(&web.run_query));
    let callers: Vec<FunctionId> = graph.callers(web.read_param).collect();
    assert!(callers.contains(&web.handle_search));
    assert!(callers.contains(&web.handle_login));

    // Helpers come before the handlers that call them.
    let order = graph.bottom_up_order();
    let position = |f: FunctionId| order.iter().position(|&g| g == f).unwrap();
    assert!(position(web.read_param) < position(web.handle_search));
    assert!(position(web.run_query) < position(web.handle_login));

    assert!(graph.entry_points().contains(&web.handle_search));
    assert!(graph.entry_points().contains(&web.handle_login));
}
