//! # task-planner — complexity classification, plan generation, critique,
//! reactive steps, and recovery replanning
//!
//! Every operation here is a cheap code path first, a model call only when
//! the code path can't decide on its own. Every model call goes through
//! `task-router` for tier selection, deducts from the caller's
//! [`task_budget::Envelope`], and (for `plan`/`replan`) is recorded on a
//! [`task_trace::TraceLogger`] span.

#![deny(missing_docs)]

mod classify;
mod critique;
mod heuristic;
mod json_parse;
mod plan;
mod reactive;
mod replan;
mod specify;

pub use classify::{action_floor, classify_complexity};
pub use critique::critique_plan;
pub use plan::{plan, PlanDeps};
pub use reactive::plan_reactive_steps;
pub use replan::{replan, DEFAULT_MAX_REPLAN_DEPTH};
pub use specify::specify_task;
