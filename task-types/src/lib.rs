//! # task-types — shared data model for the task execution core
//!
//! This crate defines the vocabulary every other `task-*` crate builds on:
//! the [`Task`](task::Task) entity, the seven-dimension budget snapshot
//! shapes, the planner's [`TaskSpec`](spec::TaskSpec) and
//! [`ExecutionPlan`](plan::ExecutionPlan), the simulator's
//! [`SimulationResult`](simulate::SimulationResult), the hierarchical
//! [`Trace`](trace::Trace), the terminal [`TaskResult`](result::TaskResult),
//! and the crew/blackboard/constitution vocabulary.
//!
//! Following the protocol-boundary pattern: this crate is data only. Every
//! behavior (budget arithmetic, rule enforcement, planning, execution,
//! crew orchestration) lives in a sibling crate that depends on these
//! shapes but adds no fields to them.

#![deny(missing_docs)]

pub mod agent;
pub mod blackboard;
pub mod budget;
pub mod constitution;
pub mod crew;
pub mod duration;
pub mod error;
pub mod id;
pub mod plan;
pub mod result;
pub mod score;
pub mod simulate;
pub mod spec;
pub mod step_result;
pub mod task;
pub mod trace;

pub use agent::{AgentDefinition, ExecutionMode};
pub use blackboard::{Blackboard, BlackboardEntry, EntryStatus};
pub use budget::{BudgetPreset, BudgetUsage, Dimension, DimensionUsage, EnergyTotals};
pub use constitution::{ArgLimit, ArgPattern, Enforcement, Rule, Severity, Violation};
pub use crew::{
    AgentRunResult, AggregationMode, CrewDefinition, CrewResult, CrewStatus, CrewStrategy,
    GraphEdge,
};
pub use duration::DurationMs;
pub use error::TaskError;
pub use id::{AgentId, SessionId, SpanId, TaskId, TraceId};
pub use plan::{ExecutionPlan, PlanStep, StrategyKind, StrategySpec, VerifySpec, VerifyType};
pub use result::{CriterionResult, EfficiencyReport, TaskResult, TaskStatus};
pub use score::PlanScore;
pub use simulate::{IssueSeverity, IssueType, SimulationIssue, SimulationResult};
pub use spec::{CriterionType, SuccessCriterion, TaskSpec};
pub use step_result::StepResult;
pub use task::{ChatMessage, ChatRole, Task};
pub use trace::{TimedEvent, Trace, TraceEvent, TraceSpan};
