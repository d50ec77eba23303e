//! # task-executor — the eight-phase task execution state machine
//!
//! [`execute`] drives one [`Task`] through `idle -> spec -> plan -> critique
//! -> simulate -> act -> (verify|recover|checkpoint) -> synthesize -> done`,
//! recording a `state_transition` trace event at every phase boundary and
//! deducting from the task's [`Envelope`] at every model or tool call. Every
//! phase degrades rather than panics: a budget dimension hitting zero ends
//! the task with a partial result, a critical constitution violation ends it
//! with an error, and everything else short of those two is absorbed into
//! the step record and carried forward.

#![deny(missing_docs)]

mod checkpoint;
mod confidence;
mod criteria;
mod json_parse;
mod strategy;
mod synthesize;
mod text_match;
mod verify;

use std::collections::{HashSet, VecDeque};
use std::time::Instant;
use task_budget::Envelope;
use task_constitution::Constitution;
use task_planner::{
    classify_complexity, critique_plan, plan, plan_reactive_steps, replan, specify_task, PlanDeps,
    DEFAULT_MAX_REPLAN_DEPTH,
};
use task_providers::Provider;
use task_router::{route, Operation, ProviderTable};
use task_simulator::simulate;
use task_tools::ToolRegistry;
use task_types::{
    BudgetUsage, CriterionResult, DurationMs, EfficiencyReport, ExecutionPlan, IssueType, PlanStep,
    SimulationResult, SpanId, StepResult, Task, TaskError, TaskId, TaskResult, TaskSpec, TaskStatus,
    TraceEvent, VerifyType,
};
use task_trace::TraceLogger;

/// Everything [`execute`] needs to reach outside this crate, bundled so the
/// public entry point takes one argument instead of five.
pub struct ExecutorDeps<'a> {
    /// Which (provider, model) serves each tier.
    pub table: &'a ProviderTable,
    /// The SLM-tier provider.
    pub slm: &'a dyn Provider,
    /// The LLM-tier provider.
    pub llm: &'a dyn Provider,
    /// The tool catalogue available to this task.
    pub registry: &'a ToolRegistry,
    /// The active rule set.
    pub constitution: &'a Constitution,
}

#[derive(Default)]
struct ExecState {
    spec: Option<TaskSpec>,
    plan: Option<ExecutionPlan>,
    simulation_result: Option<SimulationResult>,
    step_results: Vec<StepResult>,
    replans: u32,
}

/// Run the full state machine for `task`, returning its terminal [`TaskResult`].
/// Allocates a fresh top-level [`Envelope`] from `task.budget_preset`. Never
/// panics and never propagates an error to the caller — every [`TaskError`]
/// is recovered into a status and, where possible, a partial result.
pub async fn execute(deps: &ExecutorDeps<'_>, task: &Task, now_ms: u64) -> TaskResult {
    let envelope = Envelope::create(task.budget_preset, now_ms);
    execute_with_envelope(deps, task, &envelope, now_ms).await
}

/// Run the full state machine for `task` against a caller-supplied
/// [`Envelope`] rather than allocating one from `task.budget_preset` — the
/// entry point a crew orchestrator uses to run an agent's "full" execution
/// mode against its pre-allocated sub-envelope.
pub async fn execute_with_envelope(
    deps: &ExecutorDeps<'_>,
    task: &Task,
    envelope: &Envelope,
    now_ms: u64,
) -> TaskResult {
    let trace = TraceLogger::new(&TaskId::new(task.id.clone()));
    let root = trace.root();
    let mut state = ExecState::default();

    let outcome = run_inner(deps, task, envelope, &trace, &root, &mut state).await;
    finish(task, envelope, &trace, state, outcome, now_ms)
}

fn transition(trace: &TraceLogger, span: &SpanId, from: &str, to: &str) {
    trace.record_event(span, TraceEvent::StateTransition { from: from.to_string(), to: to.to_string() });
}

/// The (provider, model) the router hands back for an always-SLM operation.
fn slm_binding(table: &ProviderTable, envelope: &Envelope) -> String {
    route(table, Operation::Classify, 0.0, envelope).model
}

/// The (provider, model) the router hands back for an always-LLM operation.
/// `Synthesize` at complexity 1.0 always resolves to the LLM tier, with no
/// budget-headroom downgrade — unlike `Plan`.
fn llm_binding(table: &ProviderTable, envelope: &Envelope) -> String {
    route(table, Operation::Synthesize, 1.0, envelope).model
}

fn summarize_results(results: &[StepResult]) -> String {
    results
        .iter()
        .map(|r| {
            let outcome = if r.success { r.output.to_string() } else { r.error.clone().unwrap_or_default() };
            format!("{}. {} -> {outcome}\n", r.step_index, r.tool_name)
        })
        .collect()
}

fn to_args_value(args: &std::collections::BTreeMap<String, serde_json::Value>) -> serde_json::Value {
    serde_json::Value::Object(args.clone().into_iter().collect())
}

async fn run_inner(
    deps: &ExecutorDeps<'_>,
    task: &Task,
    envelope: &Envelope,
    trace: &TraceLogger,
    span: &SpanId,
    state: &mut ExecState,
) -> Result<(String, Vec<CriterionResult>), TaskError> {
    deps.constitution.validate_task(&task.description)?;
    transition(trace, span, "idle", "spec");

    let slm_model = slm_binding(deps.table, envelope);
    let llm_model = llm_binding(deps.table, envelope);

    let spec = specify_task(deps.slm, &slm_model, &task.description, envelope).await;
    transition(trace, span, "spec", "plan");

    let complexity = classify_complexity(deps.slm, &slm_model, &task.description, envelope).await;
    let plan_deps = PlanDeps {
        table: deps.table,
        slm: deps.slm,
        llm: deps.llm,
        envelope,
        registry: deps.registry,
        constitution: deps.constitution,
        trace,
        span,
    };
    let mut execution_plan =
        plan(&plan_deps, &task.id, &task.description, complexity, &spec.success_criteria, None).await;
    transition(trace, span, "plan", "critique");

    let critique_provider = if complexity >= 0.6 { deps.llm } else { deps.slm };
    let critique_model = if complexity >= 0.6 { &llm_model } else { &slm_model };
    let score = critique_plan(critique_provider, critique_model, &execution_plan).await;
    trace.record_event(span, TraceEvent::PlanCritique { overall: score.overall, issue_count: score.issues.len() });

    let mut confidence_by_index =
        confidence::confidence_map(&execution_plan.steps, &score.step_confidences, score.overall);
    if score.overall < 0.5 {
        if let Some(mut refined) = score.refined_plan {
            refined.renumber();
            confidence_by_index = confidence::confidence_map(&refined.steps, &score.step_confidences, score.overall);
            execution_plan = refined;
        }
    }
    let default_confidence = score.overall;
    transition(trace, span, "critique", "simulate");

    let simulation = simulate(&execution_plan, deps.registry);
    trace.record_event(
        span,
        TraceEvent::SimulationResult { valid: simulation.valid, issue_count: simulation.issues.len() },
    );
    let unregistered: HashSet<usize> = simulation
        .issues
        .iter()
        .filter(|issue| issue.kind == IssueType::MissingTool)
        .map(|issue| issue.step_index)
        .collect();
    execution_plan.steps.retain(|step| !unregistered.contains(&step.index));
    for step in &mut execution_plan.steps {
        step.strategy = strategy::select(&step.description, &step.tool_name);
        if let Some(chosen) = &step.strategy {
            trace.record_event(
                span,
                TraceEvent::StrategySelected {
                    step_index: step.index,
                    strategy: strategy::name(chosen.primary).to_string(),
                },
            );
        }
    }
    state.plan = Some(execution_plan.clone());
    state.simulation_result = Some(simulation);
    transition(trace, span, "simulate", "act");

    let complexity = execution_plan.complexity;
    let total_steps = execution_plan.steps.len();
    let checkpoint_interval = 3usize.max(total_steps.div_ceil(3));
    let mut tail: VecDeque<PlanStep> = execution_plan.steps.into_iter().collect();
    let mut next_synthetic_index = tail.iter().map(|s| s.index).max().map(|m| m + 1).unwrap_or(0);
    let mut replan_depth: u32 = 0;
    let mut last_page_content: Option<String> = None;
    let mut steps_since_checkpoint = 0usize;

    while let Some(step) = tail.pop_front() {
        envelope.check_budget()?;

        let confidence = confidence::estimate(
            confidence_by_index.get(&step.index).copied().unwrap_or(default_confidence),
            &step.tool_name,
            &state.step_results,
        );

        let started = Instant::now();
        let outcome = deps.registry.invoke(deps.constitution, &step.tool_name, to_args_value(&step.tool_args)).await?;
        envelope.deduct_tool_call();
        let duration = DurationMs::from_millis(started.elapsed().as_millis() as u64);

        let mut result = if outcome.success {
            StepResult::success(
                step.index,
                step.tool_name.clone(),
                step.tool_args.clone(),
                outcome.output.clone().unwrap_or(serde_json::Value::Null),
                duration,
            )
        } else {
            StepResult::failure(
                step.index,
                step.tool_name.clone(),
                step.tool_args.clone(),
                outcome.error.clone().unwrap_or_default(),
                duration,
            )
        };
        result.confidence = Some(confidence);
        state.step_results.push(result.clone());

        if outcome.success {
            if step.tool_name.starts_with("browser_") {
                if let Some(output) = &outcome.output {
                    last_page_content = Some(output.to_string());
                }
            }

            if let Some(verify_spec) = &step.verify {
                if verify_spec.kind != VerifyType::None {
                    let verify_span = trace.open_span(span, "verify");
                    transition(trace, &verify_span, "act", "verify");
                    let mut verified =
                        verify::verify_step(deps.registry, deps.constitution, verify_spec, &result.output).await?;
                    let mut retries = 0;
                    while !verified && verify_spec.retry_on_fail && retries < verify_spec.max_retries {
                        retries += 1;
                        let retry_started = Instant::now();
                        let retry_outcome = deps
                            .registry
                            .invoke(deps.constitution, &step.tool_name, to_args_value(&step.tool_args))
                            .await?;
                        envelope.deduct_tool_call();
                        let retry_duration = DurationMs::from_millis(retry_started.elapsed().as_millis() as u64);
                        let mut retry_result = if retry_outcome.success {
                            StepResult::success(
                                step.index,
                                step.tool_name.clone(),
                                step.tool_args.clone(),
                                retry_outcome.output.clone().unwrap_or(serde_json::Value::Null),
                                retry_duration,
                            )
                        } else {
                            StepResult::failure(
                                step.index,
                                step.tool_name.clone(),
                                step.tool_args.clone(),
                                retry_outcome.error.clone().unwrap_or_default(),
                                retry_duration,
                            )
                        };
                        retry_result.confidence = Some(confidence);
                        verified = retry_outcome.success
                            && verify::verify_step(deps.registry, deps.constitution, verify_spec, &retry_result.output)
                                .await?;
                        state.step_results.push(retry_result);
                    }
                    trace.close_span(&verify_span);
                }
            }

            let reactive = plan_reactive_steps(
                deps.llm,
                &llm_model,
                envelope,
                deps.registry,
                &result,
                last_page_content.as_deref(),
            )
            .await;
            for mut reactive_step in reactive.into_iter().rev() {
                reactive_step.index = next_synthetic_index;
                next_synthetic_index += 1;
                tail.push_front(reactive_step);
            }
        } else if let Some(fallback) = strategy::fallback_steps(&step, next_synthetic_index) {
            next_synthetic_index += fallback.len();
            for fallback_step in fallback.into_iter().rev() {
                tail.push_front(fallback_step);
            }
        } else if replan_depth < DEFAULT_MAX_REPLAN_DEPTH && envelope.can_afford_escalation() {
            let recover_span = trace.open_span(span, "recover");
            transition(trace, &recover_span, "act", "recover");
            let completed_summary = summarize_results(&state.step_results);
            let error_text = result.error.clone().unwrap_or_default();
            let recover_deps = PlanDeps { span: &recover_span, ..plan_deps };
            let recovery =
                replan(&recover_deps, &task.description, &step, &error_text, &completed_summary, replan_depth).await;
            trace.close_span(&recover_span);
            if let Some(recovery_steps) = recovery {
                tail.clear();
                for recovery_step in recovery_steps.into_iter().rev() {
                    tail.push_front(recovery_step);
                }
                replan_depth += 1;
                state.replans += 1;
            }
        }

        steps_since_checkpoint += 1;
        if steps_since_checkpoint >= checkpoint_interval && !tail.is_empty() {
            steps_since_checkpoint = 0;
            let checkpoint_span = trace.open_span(span, "checkpoint");
            transition(trace, &checkpoint_span, "act", "checkpoint");
            let on_track = checkpoint::is_on_track(
                deps.slm,
                &slm_model,
                envelope,
                &spec.goal,
                &spec.success_criteria,
                &state.step_results,
            )
            .await;
            trace.record_event(
                &checkpoint_span,
                TraceEvent::GoalCheckpoint { on_track, steps_completed: state.step_results.len() },
            );
            trace.close_span(&checkpoint_span);
            if !on_track && replan_depth < DEFAULT_MAX_REPLAN_DEPTH && envelope.can_afford_escalation() {
                if let Some(anchor) = state.step_results.last() {
                    let anchor_step = PlanStep::new(
                        anchor.step_index,
                        "checkpoint recovery anchor",
                        anchor.tool_name.clone(),
                        anchor.tool_args.clone(),
                    );
                    let completed_summary = summarize_results(&state.step_results);
                    let recover_span = trace.open_span(span, "recover");
                    transition(trace, &recover_span, "checkpoint", "recover");
                    let recover_deps = PlanDeps { span: &recover_span, ..plan_deps };
                    let recovery = replan(
                        &recover_deps,
                        &task.description,
                        &anchor_step,
                        "checkpoint judged execution off track",
                        &completed_summary,
                        replan_depth,
                    )
                    .await;
                    trace.close_span(&recover_span);
                    if let Some(recovery_steps) = recovery {
                        tail.clear();
                        for recovery_step in recovery_steps.into_iter().rev() {
                            tail.push_front(recovery_step);
                        }
                        replan_depth += 1;
                        state.replans += 1;
                    }
                }
            }
        }
    }
    transition(trace, span, "act", "synthesize");

    let any_step_failed = state.step_results.iter().any(|r| !r.success);
    let (text, _decision) = synthesize::synthesize(
        deps.table,
        deps.slm,
        deps.llm,
        envelope,
        deps.constitution,
        task,
        complexity,
        any_step_failed,
        &state.step_results,
    )
    .await?;
    transition(trace, span, "synthesize", "done");

    let criteria_results = criteria::evaluate(&spec.success_criteria, &state.step_results, &text);
    state.spec = Some(spec);
    Ok((text, criteria_results))
}

fn finish(
    task: &Task,
    envelope: &Envelope,
    trace: &TraceLogger,
    state: ExecState,
    outcome: Result<(String, Vec<CriterionResult>), TaskError>,
    now_ms: u64,
) -> TaskResult {
    let finished_trace = trace.finish();
    let budget_usage = envelope.usage();
    let efficiency_report = Some(build_efficiency_report(&state, &budget_usage));

    let (status, result_text, criteria_results, error) = match outcome {
        Ok((text, criteria)) => (TaskStatus::Completed, Some(text), criteria, None),
        Err(TaskError::BudgetExhausted(dimension)) => {
            let partial: String = state
                .step_results
                .iter()
                .filter(|r| r.success)
                .map(|r| r.output.to_string())
                .collect::<Vec<_>>()
                .join("\n");
            let text = format!("[Partial Result - Budget Exhausted ({dimension})]\n{partial}");
            (TaskStatus::BudgetExhausted, Some(text), Vec::new(), Some(dimension.to_string()))
        }
        Err(TaskError::ConstitutionViolation { rule_id, severity }) => (
            TaskStatus::Failed,
            None,
            Vec::new(),
            Some(format!("constitution violation {rule_id} ({severity:?})")),
        ),
        Err(other) => (TaskStatus::Failed, None, Vec::new(), Some(other.to_string())),
    };

    TaskResult {
        id: task.id.clone(),
        task_id: task.id.clone(),
        trace_id: finished_trace.id.clone(),
        status,
        result: result_text,
        step_results: state.step_results,
        budget_usage,
        trace: finished_trace,
        spec: state.spec,
        criteria_results,
        simulation_result: state.simulation_result,
        efficiency_report,
        error,
        completed_at: now_ms,
    }
}

fn build_efficiency_report(state: &ExecState, usage: &BudgetUsage) -> EfficiencyReport {
    use rust_decimal::prelude::ToPrimitive;

    let planned_steps = state.plan.as_ref().map(|p| p.steps.len()).unwrap_or(0);
    let steps_ratio = if planned_steps == 0 {
        state.step_results.len() as f64
    } else {
        state.step_results.len() as f64 / planned_steps as f64
    };
    let utilization = |d: task_types::DimensionUsage| -> f64 {
        if d.allocated.is_zero() {
            0.0
        } else {
            (d.used / d.allocated).to_f64().unwrap_or(0.0)
        }
    };

    EfficiencyReport {
        steps_ratio,
        token_utilization: utilization(usage.tokens),
        cost_utilization: utilization(usage.cost_usd),
        escalations_used: usage.escalations.used.to_u64().unwrap_or(0),
        replans: state.replans,
    }
}
