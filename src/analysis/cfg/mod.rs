//! Control flow graph construction over lowered function bodies.
//!
//! This module turns the structured statement tree of an [`crate::ir`]
//! function into a flat graph of basic blocks with explicit control flow
//! edges, the form all dataflow analyses in this crate consume.
//!
//! # Architecture
//!
//! The CFG builds upon the generic [`crate::utils::graph::DirectedGraph`]
//! infrastructure, providing IR-specific node and edge types while
//! leveraging shared algorithms for dominators, traversals, and strongly
//! connected components.
//!
//! # Key Components
//!
//! - [`Cfg`] - The main graph structure wrapping basic blocks
//! - [`BasicBlock`] - A straight-line instruction run with one terminator
//! - [`EdgeKind`] - Classification of edge types (normal, conditional,
//!   exception, finally)
//! - [`NaturalLoop`] - A loop discovered from back edges
//!
//! # Construction Guarantees
//!
//! [`Cfg::build`] lowers nested expressions into temporaries in evaluation
//! order, expands `&&`, `||`, and `??` into branch diamonds that preserve
//! short-circuit semantics, and wires every block of a protected region to
//! its innermost handler with [`EdgeKind::Exception`] edges. A function
//! always has exactly one entry block; blocks ending in a `return` (or an
//! unhandled `throw`) are recorded as exits. Malformed bodies produce an
//! error rather than a panic, so callers can skip one function and keep
//! analyzing the rest of the module.
//!
//! # Lazy Computation
//!
//! Expensive analyses like dominator trees and loop information are
//! computed lazily on first access and cached for subsequent queries. This
//! is implemented using [`std::sync::OnceLock`] for thread-safe
//! initialization.
//!
//! # Examples
//!
//! ## Building and Traversing a CFG
//!
//! ```rust,ignore
//! use flowscope::analysis::Cfg;
//!
//! let cfg = Cfg::build(&module, function_id)?;
//!
//! // Iterate in reverse postorder (useful for forward dataflow).
//! for &block_id in cfg.reverse_postorder() {
//!     let block = cfg.block(block_id).unwrap();
//!     println!("{block_id}: {} instructions", block.instr_count());
//! }
//! ```
//!
//! ## Computing Dominators and Loops
//!
//! ```rust,ignore
//! let cfg = Cfg::build(&module, function_id)?;
//!
//! if cfg.dominates(cfg.entry(), some_block) {
//!     println!("Entry dominates the target block");
//! }
//! for lp in cfg.loops() {
//!     println!("loop at {} with {} blocks", lp.header(), lp.size());
//! }
//! ```
//!
//! # Thread Safety
//!
//! [`Cfg`] is [`Send`] and [`Sync`], enabling safe concurrent read access
//! after construction. The lazy-initialized dominator tree and loop info
//! use [`std::sync::OnceLock`] for thread-safe initialization.

mod block;
mod builder;
mod edge;
mod graph;
mod store;

pub use block::BasicBlock;
pub use edge::EdgeKind;
pub use graph::{Cfg, NaturalLoop};
pub use store::CfgStore;
