// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]

//! # flowscope
//!
//! [![Crates.io](https://img.shields.io/crates/v/flowscope.svg)](https://crates.io/crates/flowscope)
//! [![Documentation](https://docs.rs/flowscope/badge.svg)](https://docs.rs/flowscope)
//!
//! An interprocedural dataflow analysis engine for finding hazardous data
//! flows in programs. `flowscope` takes a frontend-neutral intermediate
//! representation built through a fluent API, and runs rule-driven taint
//! and object property analyses over it: which values reach which calls,
//! which allocations escape, which objects arrive at a hazardous operation
//! in a hazardous state.
//!
//! ## Features
//!
//! - **📦 Frontend-neutral IR** - A compact structured representation with
//!   a fluent builder; analyses never see source text
//! - **🔍 Escape-aware points-to analysis** - Allocation-site tracking with
//!   precise invalidation the moment a reference escapes
//! - **📊 Rules written in names** - Taint sources, sanitizers, sinks, and
//!   property hazards are specified as name patterns and resolved against
//!   each module before anything runs
//! - **🧩 Interprocedural engine** - Call graph construction, depth-bounded
//!   inlining, and callee summaries that serve every call site
//! - **⚡ Parallel sessions** - Every function and rule pair fans out
//!   across threads; results aggregate through concurrent ordered sets
//! - **🛡️ Failure isolation** - Malformed bodies, unresolvable rules, and
//!   cancelled solves become skip records instead of lost sessions
//!
//! ## Quick Start
//!
//! Add `flowscope` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! flowscope = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! For convenient access to the most commonly used types, import the
//! prelude:
//!
//! ```rust
//! use flowscope::prelude::*;
//!
//! // Describe the program: a handler reading a request parameter
//! // straight into a query.
//! let mut mb = ModuleBuilder::new();
//! let read = mb.external("Http.ReadParam");
//! let exec = mb.external("Sql.Execute");
//! let mut f = mb.start_function("handler");
//! let q = f.local("q");
//! let input = f.call_ext(read, vec![]);
//! f.assign(q, input);
//! let arg = f.read(q);
//! let call = f.call_ext(exec, vec![arg]);
//! f.eval(call);
//! f.ret(None);
//! mb.finish_function(f)?;
//! let module = mb.finish()?;
//!
//! // Describe what must never happen, and run the session.
//! let report = Session::new(&module)
//!     .taint_rule(
//!         TaintRule::new("sql-injection")
//!             .source(CalleeSpec::symbol("Http.ReadParam"))
//!             .sink(CalleeSpec::symbol("Sql.Execute")),
//!     )
//!     .run();
//!
//! assert_eq!(report.findings().len(), 1);
//! println!("{}", report.findings()[0]);
//! # Ok::<(), flowscope::Error>(())
//! ```
//!
//! ### Property Rules
//!
//! Taint rules track where data goes; property rules track what state an
//! object is in when it gets there:
//!
//! ```rust
//! use flowscope::analysis::{worst_case, CalleeSpec, PropertyRule, PropertyValue, TypeSpec};
//! use flowscope::ir::ModuleBuilder;
//! use flowscope::Session;
//!
//! let mut mb = ModuleBuilder::new();
//! let cookie = mb.ty("Cookie");
//! let _secure = mb.field("Secure");
//! let send = mb.external("Response.AddCookie");
//! let mut f = mb.start_function("main");
//! let c = f.local("c");
//! let fresh = f.new_object(cookie, vec![]);
//! f.assign(c, fresh);
//! let arg = f.read(c);
//! let call = f.call_ext(send, vec![arg]);
//! f.eval(call);
//! f.ret(None);
//! mb.finish_function(f)?;
//! let module = mb.finish()?;
//!
//! // Cookies are insecure until a literal store proves otherwise;
//! // sending one that may still be insecure is the hazard.
//! let rule = PropertyRule::new("insecure-cookie")
//!     .track_type(TypeSpec::named("Cookie"))
//!     .property_bool("Secure", PropertyValue::Unflagged, PropertyValue::Flagged)
//!     .initial(vec![PropertyValue::Flagged])
//!     .hazard(CalleeSpec::symbol("Response.AddCookie"), worst_case);
//!
//! let report = Session::new(&module).property_rule(rule).run();
//! assert_eq!(report.findings().len(), 1);
//! # Ok::<(), flowscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `flowscope` is organized into four layers:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`ir`] - The intermediate representation and its fluent builders
//! - [`analysis`] - Control flow graphs, the lattice framework and worklist
//!   solver, points-to, call graph, taint, and property-state engines
//! - [`session`] - The parallel many-rules-over-one-module driver
//! - [`Error`] and [`Result`] - Error handling shared by all of them
//!
//! ### The pipeline
//!
//! An embedder builds a [`Module`](ir::Module) through
//! [`ModuleBuilder`](ir::ModuleBuilder), then hands it to a
//! [`Session`](session::Session) together with the rules to enforce. The
//! session resolves every rule's name patterns, builds the call graph, and
//! fans one task per function and rule out across threads. Each task
//! lowers the function to a control flow graph (cached and shared), runs a
//! forward worklist solver over a three-valued lattice domain, and follows
//! calls either by inlining up to a depth budget or through cached callee
//! summaries. Findings land in one deduplicated, sorted report.
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T, Error>`](Result). The session
//! layer goes one step further: [`Session::run`](session::Session::run)
//! never fails, converting every local failure into a skip record instead:
//!
//! ```rust,no_run
//! use flowscope::Session;
//! # fn get_module() -> flowscope::ir::Module { unimplemented!() }
//!
//! let module = get_module();
//! let report = Session::new(&module).run();
//! for skip in report.skips() {
//!     eprintln!("did not analyze: {skip}");
//! }
//! ```
//!
//! ## Performance
//!
//! `flowscope` is designed for analysis of large modules:
//!
//! - **Shared lowering** - Each function's control flow graph is built once
//!   per session and shared by every rule through a concurrent store
//! - **Summaries over re-analysis** - A callee is summarized once per rule
//!   and the summary serves every call site
//! - **Lazy derived data** - Dominator trees, traversal orders, and call
//!   graph condensations are computed on first use
//! - **Parallel fan-out** - Tasks are scheduled bottom-up over the call
//!   graph so summaries are usually warm when callers need them
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench    # criterion benchmarks for lowering, solving, sessions
//! ```

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// This module provides a curated selection of the most frequently used
/// types from across the library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust
/// use flowscope::prelude::*;
///
/// let mut mb = ModuleBuilder::new();
/// let mut f = mb.start_function("empty");
/// f.ret(None);
/// mb.finish_function(f)?;
/// let module = mb.finish()?;
/// let report = Session::new(&module).run();
/// assert!(report.findings().is_empty());
/// # Ok::<(), flowscope::Error>(())
/// ```
pub mod prelude;

/// The intermediate representation and its fluent construction API.
///
/// Embedders translate their frontend into this small structured IR; every
/// analysis in the crate works from it. See [`ir::ModuleBuilder`] for the
/// entry point and [`ir::Module`] for the finished, immutable result.
pub mod ir;

/// Control flow graphs, dataflow solving, and the analysis engines.
///
/// The pipeline layers bottom-up: [`analysis::cfg`] lowers function bodies,
/// [`analysis::dataflow`] provides the lattice framework and worklist
/// solver, [`analysis::points_to`] tracks allocations and escapes, and
/// [`analysis::taint`] / [`analysis::property_set`] implement the
/// rule-facing engines on top. [`analysis::callgraph`] and
/// [`analysis::interprocedural`] supply the cross-function machinery.
pub mod analysis;

/// The parallel analysis session: many rules over one module.
///
/// [`session::Session`] is the main entry point of the crate; it owns rule
/// resolution, scheduling, failure isolation, and the aggregation of
/// findings into a [`session::SessionReport`].
pub mod session;

/// Shared infrastructure: graphs, bit sets, DOT escaping, cancellation.
pub mod utils;

/// `flowscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type
/// is always [`Error`]. Used consistently throughout the crate for all
/// fallible operations.
///
/// # Examples
///
/// ```rust
/// use flowscope::ir::{Module, ModuleBuilder};
/// use flowscope::Result;
///
/// fn build_empty() -> Result<Module> {
///     ModuleBuilder::new().finish()
/// }
///
/// let module = build_empty()?;
/// assert_eq!(module.function_count(), 0);
/// # Ok::<(), flowscope::Error>(())
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `flowscope` Error type
///
/// The main error type for all operations in this crate. Variants explain
/// why a function could not be analyzed; the session layer converts each
/// of them into a skip record and carries on with the rest of the module.
///
/// # Examples
///
/// ```rust,no_run
/// use flowscope::{analysis::Cfg, Error};
/// # fn get_module() -> flowscope::ir::Module { unimplemented!() }
///
/// let module = get_module();
/// for function in module.functions() {
///     match Cfg::build(&module, function.id()) {
///         Ok(cfg) => println!("{}: {} blocks", function.name(), cfg.block_count()),
///         Err(Error::Cancelled) => break,
///         Err(e) => eprintln!("skipping {}: {e}", function.name()),
///     }
/// }
/// ```
pub use error::Error;

/// The finished, immutable program representation and its builder.
///
/// [`ModuleBuilder`] is where every use of the crate starts; the
/// [`Module`] it produces is what sessions and analyses consume.
///
/// # Example
///
/// ```rust
/// use flowscope::ModuleBuilder;
///
/// let mut mb = ModuleBuilder::new();
/// let mut f = mb.start_function("noop");
/// f.ret(None);
/// mb.finish_function(f)?;
/// let module = mb.finish()?;
/// assert_eq!(module.function_count(), 1);
/// # Ok::<(), flowscope::Error>(())
/// ```
pub use ir::{Module, ModuleBuilder};

/// The analysis session and its configuration and results.
///
/// [`Session`] runs every configured rule over every function of a module
/// in parallel and aggregates findings, skips, and statistics into a
/// [`SessionReport`]. [`AnalysisConfig`] bounds how much work any single
/// function may consume.
///
/// # Example
///
/// ```rust,no_run
/// use flowscope::{AnalysisConfig, Session};
/// # fn get_module() -> flowscope::ir::Module { unimplemented!() }
///
/// let module = get_module();
/// let config = AnalysisConfig {
///     max_inline_depth: 2,
///     ..AnalysisConfig::default()
/// };
/// let report = Session::new(&module).with_config(config).run();
/// println!("{} findings", report.findings().len());
/// ```
pub use session::{AnalysisConfig, Session, SessionReport};
