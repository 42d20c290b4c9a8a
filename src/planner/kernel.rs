//! The decomposition engine: depth-first, greedy, no backtracking. Method
//! guards are the only extension point for alternative strategies; a
//! primitive that cannot proceed aborts the plan.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{HtnqlError, Result};
use crate::state::{PlanningState, TraceStep};

use super::agent::{MethodCatalog, Step};
use super::primitives::{PrimitiveCtx, PrimitiveRegistry};

/// Cooperative cancellation flag, checked between primitive applications.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

struct Frame {
    step: Step,
    depth: usize,
}

/// Decompose `root_task` until the pending stack empties, returning the
/// final state and the trace of method selections and primitive
/// applications. For a fixed (spec, schema, agent) the result is
/// byte-identical across runs: every container iterates in insertion or
/// sorted order.
pub fn plan(
    root_task: &str,
    initial_state: PlanningState,
    catalog: &MethodCatalog,
    registry: &PrimitiveRegistry,
    ctx: &PrimitiveCtx<'_>,
    cancel: Option<&CancellationToken>,
) -> Result<(PlanningState, Vec<TraceStep>)> {
    let mut state = initial_state;
    let mut trace: Vec<TraceStep> = Vec::new();
    let mut stack = vec![Frame {
        step: Step::Task(root_task.to_string()),
        depth: 0,
    }];

    while let Some(frame) = stack.pop() {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(HtnqlError::Cancelled { trace });
        }
        match frame.step {
            Step::Primitive(name) => {
                let op = registry.get(&name).ok_or_else(|| HtnqlError::Primitive {
                    name: name.clone(),
                    message: "not registered".to_string(),
                })?;
                let next = op(ctx, &state)?;
                let changed = state.changed_keys(&next);
                tracing::debug!(primitive = name.as_str(), ?changed, "primitive applied");
                trace.push(TraceStep {
                    task: name,
                    method: None,
                    depth: frame.depth,
                    changed,
                });
                state = next;
            }
            Step::Task(name) => {
                let methods = catalog
                    .methods_for(&name)
                    .ok_or_else(|| HtnqlError::NoApplicableMethod { task: name.clone() })?;
                let selected = methods
                    .iter()
                    .find(|m| m.guard_passes(&state))
                    .ok_or_else(|| HtnqlError::NoApplicableMethod { task: name.clone() })?;
                tracing::debug!(
                    task = name.as_str(),
                    method = selected.name.as_str(),
                    "method selected"
                );
                trace.push(TraceStep {
                    task: name.clone(),
                    method: Some(selected.name.clone()),
                    depth: frame.depth,
                    changed: Vec::new(),
                });
                for step in selected.steps.iter().rev() {
                    stack.push(Frame {
                        step: step.clone(),
                        depth: frame.depth + 1,
                    });
                }
            }
        }
    }

    Ok((state, trace))
}
