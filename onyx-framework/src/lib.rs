//! Frame scheduling for the onyx rendering stack.
//!
//! The only subsystem here today is the render graph: a frame-scoped,
//! declarative scheduler for GPU work. Passes declare the resources they
//! create, read, and write; the graph derives execution order, groups
//! independent passes into dependency levels, culls work nobody consumes,
//! recycles transient resources through a cross-frame pool, and synthesizes
//! the state-transition barriers between levels.

pub mod graph;
