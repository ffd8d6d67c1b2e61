//! Object property tracking through the session API.
//!
//! The running example is cookie security:
//! 1. Build functions that construct, mutate, and send `Cookie` objects
//! 2. Run a session with a rule tracking the `Secure` property
//! 3. Check which `Response.Send` sites are classified, and how certainly
//!
//! Property findings carry no taint origin; the hazard site is the story.

use flowscope::prelude::*;
use PropertyValue::{Flagged, Unflagged};

/// Tracks `Cookie.Secure`, insecure by default, checked at `Response.Send`.
fn cookie_rule() -> PropertyRule {
    PropertyRule::new("insecure-cookie")
        .track_type(TypeSpec::named("Cookie"))
        .property_bool("Secure", Unflagged, Flagged)
        .initial(vec![Flagged])
        .hazard(CalleeSpec::symbol("Response.Send"), worst_case)
}

#[test]
fn test_constructor_mapper_reads_literal_args() {
    let rule = PropertyRule::new("insecure-cookie")
        .track_type(TypeSpec::named("Cookie"))
        .property_bool("Secure", Unflagged, Flagged)
        .constructor(|args| {
            let https = matches!(
                args.first().copied().flatten(),
                Some(Literal::Str(scheme)) if scheme.as_str() == "https"
            );
            PropertyValues::uniform(1, if https { Unflagged } else { Flagged })
        })
        .hazard(CalleeSpec::symbol("Response.Send"), worst_case);

    let mut mb = ModuleBuilder::new();
    let cookie = mb.ty("Cookie");
    let send = mb.external("Response.Send");

    let mut f = mb.start_function("serve_https");
    let c = f.local("c");
    let scheme = f.lit_str("https");
    let fresh = f.new_object(cookie, vec![scheme]);
    f.assign(c, fresh);
    let cv = f.read(c);
    let call = f.call_ext(send, vec![cv]);
    f.eval(call);
    f.ret(None);
    mb.finish_function(f).unwrap();

    let mut f = mb.start_function("serve_http");
    let c = f.local("c");
    let scheme = f.lit_str("http");
    let fresh = f.new_object(cookie, vec![scheme]);
    f.assign(c, fresh);
    let cv = f.read(c);
    let call = f.call_ext(send, vec![cv]);
    let send_op = call.id;
    f.eval(call);
    f.ret(None);
    let serve_http = mb.finish_function(f).unwrap();
    let module = mb.finish().unwrap();

    let report = Session::new(&module).property_rule(rule).run();

    // Only the cookie built for the plain scheme is reported.
    assert!(report.skips().is_empty());
    assert_eq!(report.findings().len(), 1);
    let finding = &report.findings()[0];
    assert_eq!(finding.hazard(), OpRef::new(serve_http, send_op));
    assert_eq!(finding.classification(), Classification::Flagged);
    assert_eq!(finding.origin(), None);
}

/// Builds a function that secures its cookie on one side of a branch.
fn branch_module(secure_in_then: bool) -> (Module, FunctionId, OpId) {
    let mut mb = ModuleBuilder::new();
    let cookie = mb.ty("Cookie");
    let secure = mb.field("Secure");
    let send = mb.external("Response.Send");
    let flip = mb.external("Env.Flip");

    let mut f = mb.start_function("serve");
    let c = f.local("c");
    let fresh = f.new_object(cookie, vec![]);
    f.assign(c, fresh);
    let cond = f.call_ext(flip, vec![]);
    if secure_in_then {
        f.if_then(cond, |then| {
            let base = then.read(c);
            let value = then.lit_bool(true);
            then.assign_field(base, secure, value);
        });
    } else {
        f.if_else(
            cond,
            |_then| {},
            |other| {
                let base = other.read(c);
                let value = other.lit_bool(true);
                other.assign_field(base, secure, value);
            },
        );
    }
    let cv = f.read(c);
    let call = f.call_ext(send, vec![cv]);
    let send_op = call.id;
    f.eval(call);
    f.ret(None);
    let serve = mb.finish_function(f).unwrap();
    (mb.finish().unwrap(), serve, send_op)
}

#[test]
fn test_branch_merge_weakens_to_maybe() {
    for secure_in_then in [true, false] {
        let (module, serve, send_op) = branch_module(secure_in_then);
        let report = Session::new(&module).property_rule(cookie_rule()).run();

        // One path secures the cookie, the other keeps the insecure
        // default; the merge can only say "maybe".
        assert_eq!(report.findings().len(), 1);
        let finding = &report.findings()[0];
        assert_eq!(finding.hazard(), OpRef::new(serve, send_op));
        assert_eq!(finding.classification(), Classification::MaybeFlagged);
    }
}

#[test]
fn test_callee_writeback_secures_object() {
    let mut mb = ModuleBuilder::new();
    let cookie = mb.ty("Cookie");
    let secure = mb.field("Secure");
    let send = mb.external("Response.Send");

    let mut f = mb.start_function("harden");
    let p = f.param("c");
    let base = f.read(p);
    let value = f.lit_bool(true);
    f.assign_field(base, secure, value);
    f.ret(None);
    let harden = mb.finish_function(f).unwrap();

    let mut f = mb.start_function("serve");
    let c = f.local("c");
    let fresh = f.new_object(cookie, vec![]);
    f.assign(c, fresh);
    let cv = f.read(c);
    let call = f.call_fn(harden, vec![cv]);
    f.eval(call);
    let cv = f.read(c);
    let call = f.call_ext(send, vec![cv]);
    f.eval(call);
    f.ret(None);
    mb.finish_function(f).unwrap();
    let module = mb.finish().unwrap();

    let report = Session::new(&module).property_rule(cookie_rule()).run();

    // The callee's store reaches the caller's object through the summary
    // writeback, so the send observes a secured cookie.
    assert!(report.findings().is_empty());
    assert!(report.skips().is_empty());
}

#[test]
fn test_escape_to_unknown_callee_degrades_tracking() {
    let rule = PropertyRule::new("insecure-cookie")
        .track_type(TypeSpec::named("Cookie"))
        .property_bool("Secure", Unflagged, Flagged)
        .initial(vec![Unflagged])
        .hazard(CalleeSpec::symbol("Response.Send"), worst_case);

    let mut mb = ModuleBuilder::new();
    let cookie = mb.ty("Cookie");
    let send = mb.external("Response.Send");
    let store = mb.external("Keep.Store");
    let log = mb.external("Log.Write");
    let pure = mb.tag(PURE_TAG);
    mb.tag_symbol(log, pure);

    let mut f = mb.start_function("stash_then_send");
    let c = f.local("c");
    let fresh = f.new_object(cookie, vec![]);
    f.assign(c, fresh);
    let cv = f.read(c);
    let call = f.call_ext(store, vec![cv]);
    f.eval(call);
    let cv = f.read(c);
    let call = f.call_ext(send, vec![cv]);
    let escaped_send = call.id;
    f.eval(call);
    f.ret(None);
    let stash_then_send = mb.finish_function(f).unwrap();

    let mut f = mb.start_function("log_then_send");
    let c = f.local("c");
    let fresh = f.new_object(cookie, vec![]);
    f.assign(c, fresh);
    let cv = f.read(c);
    let call = f.call_ext(log, vec![cv]);
    f.eval(call);
    let cv = f.read(c);
    let call = f.call_ext(send, vec![cv]);
    f.eval(call);
    f.ret(None);
    mb.finish_function(f).unwrap();
    let module = mb.finish().unwrap();

    let report = Session::new(&module).property_rule(rule).run();

    // `Keep.Store` may flip the cookie behind the analysis's back, so the
    // safe initial value is gone. The pure logger cannot, so its caller
    // stays clean.
    assert_eq!(report.findings().len(), 1);
    let finding = &report.findings()[0];
    assert_eq!(finding.hazard(), OpRef::new(stash_then_send, escaped_send));
    assert_eq!(finding.classification(), Classification::MaybeFlagged);
}

#[test]
fn test_hazard_arg_position_is_respected() {
    let rule = PropertyRule::new("insecure-cookie")
        .track_type(TypeSpec::named("Cookie"))
        .property_bool("Secure", Unflagged, Flagged)
        .initial(vec![Flagged])
        .hazard_arg(CalleeSpec::symbol("Response.Send"), 1, worst_case);

    let mut mb = ModuleBuilder::new();
    let cookie = mb.ty("Cookie");
    let send = mb.external("Response.Send");

    let mut f = mb.start_function("serve_watched");
    let c = f.local("c");
    let fresh = f.new_object(cookie, vec![]);
    f.assign(c, fresh);
    let label = f.lit_str("session");
    let cv = f.read(c);
    let call = f.call_ext(send, vec![label, cv]);
    let watched_op = call.id;
    f.eval(call);
    f.ret(None);
    let serve_watched = mb.finish_function(f).unwrap();

    let mut f = mb.start_function("serve_unwatched");
    let c = f.local("c");
    let fresh = f.new_object(cookie, vec![]);
    f.assign(c, fresh);
    let cv = f.read(c);
    let label = f.lit_str("session");
    let call = f.call_ext(send, vec![cv, label]);
    f.eval(call);
    f.ret(None);
    mb.finish_function(f).unwrap();
    let module = mb.finish().unwrap();

    let report = Session::new(&module).property_rule(rule).run();

    // The cookie in the watched position is classified; the one in the
    // unwatched position never reaches the evaluator.
    assert_eq!(report.findings().len(), 1);
    let finding = &report.findings()[0];
    assert_eq!(finding.hazard(), OpRef::new(serve_watched, watched_op));
    assert_eq!(finding.classification(), Classification::Flagged);
}
