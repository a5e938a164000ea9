//! Build orchestration for the labs site.
//!
//! Tasks are declared once as a [`TaskGraph`], validated up front, and run by
//! the [`Scheduler`] in dependency order. Most tasks shell out to the site
//! generator or a package manager; the SVG pass runs in-process.

pub mod command;
pub mod graph;
pub mod queue;
pub mod scheduler;
pub mod svg;
pub mod task;

pub use command::{CommandSpec, SpawnAction};
pub use graph::{GraphError, Plan, TaskGraph, TaskSpec};
pub use queue::RebuildQueue;
pub use scheduler::{
    FailurePolicy, ProcessFailure, RunReport, Scheduler, TaskContext, TaskEvent, TaskEventKind,
};
pub use svg::{MinifyReport, MinifySvgAction, SvgError, SvgMinifier};
pub use task::{Action, Sequence, TaskError};
