//! Computes a MySQL schema upgrade script: given a source and a target
//! schema, emits the sequence of DDL statements that transforms the source's
//! structure into the target's.
//!
//! Per-object diffing alone produces broken plans — schema objects interact.
//! An auto-increment column must be indexed at every intermediate state, a
//! foreign key needs a backing index for as long as it exists, a primary key
//! and its columns have to evolve atomically. The engine threads those
//! constraints through five coordinated passes per table pair, inserts
//! temporary scaffolding (cover indexes, a conditional index procedure)
//! where MySQL offers no direct path, and orders the resulting change
//! records through a fixed priority lattice.
//!
//! The engine is synchronous and never fails on a well-formed model:
//! unresolvable sub-cases are skipped with a debug log and the plan stays
//! best-effort. Output is a pure function of `(source, target, options)`.

mod change;
mod compare;
mod index_workaround;
mod names;
mod options;
mod plan;
mod refs;
mod schema_differ;
mod table_differ;

pub use change::ChangeRecord;
pub use options::DiffOptions;
pub use refs::reference_closure;
pub use schema_differ::diff;
