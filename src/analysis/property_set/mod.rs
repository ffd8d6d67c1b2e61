//! Three-valued object property tracking.
//!
//! Where taint asks "did untrusted data reach this call", property-set
//! analysis asks "was this object in a dangerous configuration when it got
//! here". A property rule names the object types to track, the fields whose
//! literal assignments drive each property, and the calls at which the
//! accumulated property state must be judged. The classic instance: a
//! cookie type whose `Secure` flag defaults to off, flagged at the call
//! that sends it.
//!
//! # Architecture
//!
//! - **Domain**: [`PropertyValue`] is the four-point value lattice
//!   (`Unflagged`, `Flagged`, `Unknown`, `MaybeFlagged`);
//!   [`PropertyValues`] is a fixed-arity vector of them, one slot per
//!   declared property
//! - **State**: [`PropertyState`] maps tracked abstract locations to their
//!   vectors; it steps in a product with the points-to state so stores and
//!   arguments resolve through alias information
//! - **Rules**: [`PropertyRule`] is the embedder-facing builder;
//!   [`ResolvedPropertyRule`] is its names interned against one module
//! - **Driver**: [`PropertyAnalyzer`] runs one rule over one root function
//!   and produces a [`PropertyReport`] of classified [`PropertyUsage`]s
//!
//! Calls to functions defined in the module are handled through
//! [`PropertySummary`] values keyed by the entry property values, shared
//! through the session's summary cache. Hazard sites inside callees are
//! classified with the values that actually flowed in and attributed to
//! the callee's own location.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowscope::analysis::{worst_case, CalleeSpec, PropertyRule, PropertyValue, TypeSpec};
//!
//! let rule = PropertyRule::new("insecure-cookie")
//!     .track_type(TypeSpec::named("Cookie"))
//!     .property_bool("Secure", PropertyValue::Unflagged, PropertyValue::Flagged)
//!     .initial(vec![PropertyValue::Flagged])
//!     .hazard(CalleeSpec::symbol("Response.AddCookie"), worst_case);
//!
//! let resolved = rule.resolve(&module).expect("rule names resolve");
//! let report = PropertyAnalyzer::new(&module, &resolved, &cfgs, &summaries, &config)
//!     .analyze(&cfg)?;
//! for usage in report.usages() {
//!     println!("{usage}");
//! }
//! ```

mod analysis;
mod rule;
mod state;
mod value;

pub use analysis::{
    EntryValues, PropertyAnalyzer, PropertyFlowState, PropertyReport, PropertySummary,
    PropertyUsage,
};
pub use rule::{
    worst_case, ConstructorMapper, HazardEvaluator, LiteralMapper, PropertyRule,
    ResolvedPropertyRule,
};
pub use state::PropertyState;
pub use value::{PropertyValue, PropertyValues};
