#![allow(unused)]
extern crate flowscope;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use flowscope::prelude::*;
use std::hint::black_box;

/// Builds a module with `handlers` request handlers over two shared
/// helpers. Odd handlers escape their input, even ones forward it raw, and
/// every third handler secures its cookie before shipping it.
fn web_module(handlers: usize) -> Module {
    let mut mb = ModuleBuilder::new();
    let http_read = mb.external("Http.ReadParam");
    let sql_escape = mb.external("Sql.Escape");
    let sql_execute = mb.external("Sql.Execute");
    let add_cookie = mb.external("Response.AddCookie");
    let cookie = mb.ty("Cookie");
    let secure = mb.field("Secure");

    let mut f = mb.start_function("read_param");
    let raw = f.call_ext(http_read, vec![]);
    f.ret(Some(raw));
    let read_param = mb.finish_function(f).unwrap();

    let mut f = mb.start_function("run_query");
    let q = f.param("q");
    let qv = f.read(q);
    let exec = f.call_ext(sql_execute, vec![qv]);
    f.eval(exec);
    f.ret(None);
    let run_query = mb.finish_function(f).unwrap();

    for i in 0..handlers {
        let mut f = mb.start_function(&format!("handler_{i}"));
        let x = f.local("x");
        let value = f.call_fn(read_param, vec![]);
        f.assign(x, value);
        if i % 2 == 1 {
            let xv = f.read(x);
            let escaped = f.call_ext(sql_escape, vec![xv]);
            f.assign(x, escaped);
        }
        let xv = f.read(x);
        let call = f.call_fn(run_query, vec![xv]);
        f.eval(call);

        let c = f.local("c");
        let fresh = f.new_object(cookie, vec![]);
        f.assign(c, fresh);
        if i % 3 == 0 {
            let base = f.read(c);
            let flag = f.lit_bool(true);
            f.assign_field(base, secure, flag);
        }
        let cv = f.read(c);
        let ship = f.call_ext(add_cookie, vec![cv]);
        f.eval(ship);
        f.ret(None);
        mb.finish_function(f).unwrap();
    }
    mb.finish().unwrap()
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
        .property_bool("Secure", PropertyValue::Unflagged, PropertyValue::Flagged)
        .initial(vec![PropertyValue::Flagged])
        .hazard(CalleeSpec::symbol("Response.AddCookie"), worst_case)
}

/// Benchmark a whole session over the handler module.
///
/// Sessions are reusable, so construction stays outside the measured loop
/// and each iteration pays for call graph, lowering, solving, and merging.
fn bench_session(c: &mut Criterion) {
    let module = web_module(32);

    let taint_only = Session::new(&module).taint_rule(sql_rule());
    let both = Session::new(&module)
        .taint_rule(sql_rule())
        .property_rule(cookie_rule());

    let mut group = c.benchmark_group("session");
    group.throughput(Throughput::Elements(module.function_count() as u64));
    group.bench_function("taint_only", |b| {
        b.iter(|| black_box(taint_only.run()));
    });
    group.bench_function("both_rules", |b| {
        b.iter(|| black_box(both.run()));
    });
    group.finish();
}

criterion_group!(benches, bench_session);
criterion_main!(benches);
