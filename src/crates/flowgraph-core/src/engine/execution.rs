//! The frontier step loop
//!
//! Implements `invoke` / `invoke_with_config` for
//! [`CompiledGraph`](super::CompiledGraph). See the
//! [module docs](super) for the step algorithm and ordering guarantees.

use super::{CompiledGraph, RunError, RunOutput, RunStatus};
use crate::callback::{CallbackDispatcher, CallbackEvent, CallbackPayload};
use crate::config::{NodeContext, RunConfig, RunScope, RESERVED_CONFIGURABLE_KEYS};
use crate::error::{GraphError, Result};
use crate::event::{EventKind, GraphEvent, ListenerRegistry};
use crate::graph::{NodeFn, NodeOutput, END};
use crate::interrupt::GraphInterrupt;
use crate::retry::RetryPolicy;
use flowgraph_checkpoint::Checkpoint;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One node's processed result within a step
struct Contribution {
    node: String,
    update: Option<Value>,
    goto: Option<String>,
}

impl CompiledGraph {
    /// Execute the graph from its entry point with default options
    ///
    /// When `initial` is `None` the schema's `init()` produces the starting
    /// state.
    pub async fn invoke(
        &self,
        initial: Option<Value>,
    ) -> std::result::Result<RunOutput, RunError> {
        self.invoke_with_config(initial, RunConfig::default()).await
    }

    /// Execute the graph with explicit invocation options
    ///
    /// Honors every [`RunConfig`] field: interrupts, resumption, timeout,
    /// cancellation, callbacks, tags and metadata propagation.
    pub async fn invoke_with_config(
        &self,
        initial: Option<Value>,
        config: RunConfig,
    ) -> std::result::Result<RunOutput, RunError> {
        // Pre-invocation validation: nothing fires, nothing mutates.
        for name in &config.resume_from {
            if name != END && !self.nodes.contains_key(name) {
                return Err(RunError {
                    state: initial.unwrap_or(Value::Null),
                    error: GraphError::InvalidConfig(format!(
                        "resume_from references unknown node '{name}'"
                    )),
                });
            }
        }

        let run_id = Uuid::new_v4().to_string();
        let deadline = config.timeout.map(|timeout| Instant::now() + timeout);
        let timeout_ms = config
            .timeout
            .map(|timeout| timeout.as_millis() as u64)
            .unwrap_or_default();

        let dispatcher = CallbackDispatcher::new(config.callbacks.clone());
        let scope = Arc::new(RunScope {
            run_id: run_id.clone(),
            run_name: config.run_name.clone(),
            tags: config.tags.clone(),
            metadata: config.metadata.clone(),
            configurable: config.configurable.clone(),
            resume_value: config.resume_value.clone(),
            callbacks: dispatcher.clone(),
        });
        let payload = CallbackPayload {
            run_id: run_id.clone(),
            tags: config.tags.clone(),
            metadata: config.metadata.clone(),
            ..CallbackPayload::default()
        };

        let mut state = initial.unwrap_or_else(|| self.schema.init());

        let mut frontier: Vec<String> = if config.resume_from.is_empty() {
            vec![self.entry_point.clone()]
        } else {
            config.resume_from.clone()
        };
        frontier.sort_unstable();
        frontier.dedup();

        tracing::debug!(
            run_id = %run_id,
            run_name = config.run_name.as_deref().unwrap_or_default(),
            frontier = ?frontier,
            "starting graph invocation"
        );
        dispatcher
            .emit(
                CallbackEvent::ChainStart,
                &CallbackPayload {
                    inputs: Some(state.clone()),
                    ..payload.clone()
                },
            )
            .await;
        self.listeners
            .notify(
                GraphEvent::new(EventKind::ChainStart, run_id.as_str(), 0)
                    .with_state(state.clone()),
            )
            .await;

        let mut step: usize = 0;
        loop {
            frontier.retain(|name| name != END);
            if frontier.is_empty() {
                break;
            }
            step += 1;

            // Limits are honored at step boundaries; running nodes are never
            // interrupted asynchronously.
            if let Some(token) = &config.cancellation {
                if token.is_cancelled() {
                    return Err(self
                        .fail(&dispatcher, &payload, state, GraphError::Canceled)
                        .await);
                }
            }
            if let Some(at) = deadline {
                if Instant::now() >= at {
                    let error = GraphError::Timeout {
                        duration_ms: timeout_ms,
                    };
                    return Err(self.fail(&dispatcher, &payload, state, error).await);
                }
            }

            if let Some(node) = frontier
                .iter()
                .find(|name| config.interrupt_before.iter().any(|n| n == *name))
            {
                tracing::debug!(run_id = %run_id, node = %node, "interrupting before node");
                return Ok(RunOutput {
                    state,
                    status: RunStatus::Interrupted(GraphInterrupt::new(
                        node.as_str(),
                        Value::Null,
                    )),
                });
            }

            tracing::debug!(run_id = %run_id, step, frontier = ?frontier, "executing step");
            let pre_state = state.clone();

            for node in &frontier {
                self.listeners
                    .notify(
                        GraphEvent::new(EventKind::NodeStart, run_id.as_str(), step)
                            .with_node(node.as_str()),
                    )
                    .await;
            }

            let results = match bounded(
                deadline,
                config.cancellation.clone(),
                timeout_ms,
                self.execute_frontier(&frontier, &pre_state, &scope, step),
            )
            .await
            {
                Ok(results) => results,
                Err(limit_error) => {
                    return Err(self.fail(&dispatcher, &payload, pre_state, limit_error).await)
                }
            };

            // Partition outcomes: contributions to merge, at most one
            // interrupt, or a terminal failure.
            let mut contributions: Vec<Contribution> = Vec::with_capacity(results.len());
            let mut interrupt: Option<GraphInterrupt> = None;
            let mut failure: Option<GraphError> = None;
            for (node, outcome) in results {
                match outcome {
                    Ok(NodeOutput::Update(update)) => contributions.push(Contribution {
                        node,
                        update: Some(update),
                        goto: None,
                    }),
                    Ok(NodeOutput::Command(command)) => contributions.push(Contribution {
                        node,
                        update: command.update,
                        goto: command.goto,
                    }),
                    Err(GraphError::NodeInterrupt { value, .. }) => {
                        if interrupt.is_none() {
                            interrupt = Some(GraphInterrupt::new(node, value));
                        }
                    }
                    Err(error) => {
                        if failure.is_none() {
                            failure = Some(error);
                        }
                    }
                }
            }
            if let Some(error) = failure {
                // node_error already fired for every failed attempt.
                return Err(self.fail(&dispatcher, &payload, pre_state, error).await);
            }

            // Merge in lexicographic node-name order for determinism.
            contributions.sort_by(|a, b| a.node.cmp(&b.node));
            for contribution in &contributions {
                let Some(update) = &contribution.update else {
                    continue;
                };
                match self.schema.update(state, update) {
                    Ok(merged) => state = merged,
                    Err(source) => {
                        let error = GraphError::ReducerError {
                            node: contribution.node.clone(),
                            source,
                        };
                        self.listeners
                            .notify(
                                GraphEvent::new(EventKind::NodeError, run_id.as_str(), step)
                                    .with_node(contribution.node.as_str())
                                    .with_error(&error),
                            )
                            .await;
                        return Err(self.fail(&dispatcher, &payload, pre_state, error).await);
                    }
                }
            }

            for contribution in &contributions {
                self.listeners
                    .notify(
                        GraphEvent::new(EventKind::NodeComplete, run_id.as_str(), step)
                            .with_node(contribution.node.as_str())
                            .with_state(state.clone()),
                    )
                    .await;
            }

            // Next frontier: goto > non-empty conditional > static edges.
            let mut next: Vec<String> = Vec::new();
            for contribution in &contributions {
                let mut targets: Vec<String> = Vec::new();
                if let Some(goto) = &contribution.goto {
                    targets.push(goto.clone());
                } else if let Some(router) = self.conditional.get(&contribution.node) {
                    let ctx =
                        NodeContext::new(Arc::clone(&scope), contribution.node.as_str(), step);
                    let choice = router(&ctx, &state);
                    if choice.is_empty() {
                        if let Some(static_targets) = self.edges.get(&contribution.node) {
                            targets.extend(static_targets.iter().cloned());
                        }
                    } else {
                        targets.push(choice);
                    }
                } else if let Some(static_targets) = self.edges.get(&contribution.node) {
                    targets.extend(static_targets.iter().cloned());
                }

                for target in targets {
                    if target != END && !self.nodes.contains_key(&target) {
                        let error = GraphError::UnknownTarget {
                            from: contribution.node.clone(),
                            to: target,
                        };
                        return Err(self.fail(&dispatcher, &payload, state, error).await);
                    }
                    next.push(target);
                }
            }
            next.sort_unstable();
            next.dedup();

            if let Some(graph_interrupt) = interrupt {
                if let Err(error) = self.snapshot(&graph_interrupt.node, &state, step, &config).await
                {
                    return Err(self.fail(&dispatcher, &payload, state, error).await);
                }
                tracing::debug!(run_id = %run_id, node = %graph_interrupt.node, "node interrupt raised");
                return Ok(RunOutput {
                    state,
                    status: RunStatus::Interrupted(graph_interrupt),
                });
            }

            let work_remains = next.iter().any(|name| name != END);
            if work_remains {
                if let Some(node) = contributions
                    .iter()
                    .map(|contribution| contribution.node.as_str())
                    .find(|name| config.interrupt_after.iter().any(|n| n == name))
                {
                    if let Err(error) = self.snapshot(node, &state, step, &config).await {
                        return Err(self.fail(&dispatcher, &payload, state, error).await);
                    }
                    tracing::debug!(run_id = %run_id, node = %node, "interrupting after node");
                    return Ok(RunOutput {
                        state,
                        status: RunStatus::Interrupted(GraphInterrupt::new(node, Value::Null)),
                    });
                }
            }

            frontier = next;

            if self.auto_save && !contributions.is_empty() {
                // Contributions are sorted; the last is the final merge
                // contributor and names the step's checkpoint.
                let node = contributions
                    .last()
                    .map(|contribution| contribution.node.clone())
                    .unwrap_or_default();
                if let Err(error) = self.snapshot(&node, &state, step, &config).await {
                    return Err(self.fail(&dispatcher, &payload, state, error).await);
                }
            }

            self.listeners
                .notify(
                    GraphEvent::new(EventKind::Step, run_id.as_str(), step)
                        .with_state(state.clone()),
                )
                .await;
        }

        dispatcher
            .emit(
                CallbackEvent::ChainEnd,
                &CallbackPayload {
                    outputs: Some(state.clone()),
                    ..payload.clone()
                },
            )
            .await;
        self.listeners
            .notify(
                GraphEvent::new(EventKind::ChainEnd, run_id.as_str(), step)
                    .with_state(state.clone()),
            )
            .await;
        tracing::debug!(run_id = %run_id, steps = step, "graph invocation completed");

        let final_state = self.schema.cleanup(state);
        Ok(RunOutput {
            state: final_state,
            status: RunStatus::Completed,
        })
    }

    /// Execute the frontier against a shared pre-step snapshot
    ///
    /// Multi-member frontiers fan out to spawned tasks; single-member
    /// frontiers run in-task. Results come back in frontier order.
    async fn execute_frontier(
        &self,
        frontier: &[String],
        pre_state: &Value,
        scope: &Arc<RunScope>,
        step: usize,
    ) -> Vec<(String, Result<NodeOutput>)> {
        if frontier.len() == 1 {
            let name = frontier[0].clone();
            let func = self.nodes[&name].func.clone();
            let ctx = NodeContext::new(Arc::clone(scope), name.as_str(), step);
            let outcome = run_node_with_retry(
                func,
                ctx,
                pre_state.clone(),
                self.retry_policy.clone(),
                Arc::clone(&self.listeners),
            )
            .await;
            return vec![(name, outcome)];
        }

        let mut handles = Vec::with_capacity(frontier.len());
        for name in frontier {
            let func = self.nodes[name].func.clone();
            let ctx = NodeContext::new(Arc::clone(scope), name.as_str(), step);
            handles.push((
                name.clone(),
                tokio::spawn(run_node_with_retry(
                    func,
                    ctx,
                    pre_state.clone(),
                    self.retry_policy.clone(),
                    Arc::clone(&self.listeners),
                )),
            ));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(GraphError::node_error(
                    name.as_str(),
                    format!("node task panicked: {join_error}"),
                )),
            };
            results.push((name, outcome));
        }
        results
    }

    /// Persist a step-boundary snapshot when a store is attached
    ///
    /// Checkpoint metadata is the config's metadata bag plus the reserved
    /// configurable keys and the step index.
    async fn snapshot(
        &self,
        node: &str,
        state: &Value,
        step: usize,
        config: &RunConfig,
    ) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let mut metadata = config.metadata.clone();
        for key in RESERVED_CONFIGURABLE_KEYS {
            if let Some(value) = config.configurable.get(key) {
                metadata.insert(key.to_string(), value.clone());
            }
        }
        metadata.insert("step".to_string(), json!(step));

        let checkpoint = Checkpoint::new(node, state.clone(), metadata);
        let saved = store.save(checkpoint).await?;
        tracing::debug!(node = %node, version = saved.version, "checkpoint saved");
        Ok(())
    }

    /// Report a terminal failure to callbacks and package it with the last
    /// safe state
    async fn fail(
        &self,
        dispatcher: &CallbackDispatcher,
        payload: &CallbackPayload,
        state: Value,
        error: GraphError,
    ) -> RunError {
        dispatcher
            .emit(CallbackEvent::ChainError(error.to_string()), payload)
            .await;
        RunError { state, error }
    }
}

/// One node execution under the graph's retry policy
///
/// Fires a `node_error` event for every failed attempt. Interrupt signals
/// pass through untouched - they are control flow, never retried.
async fn run_node_with_retry(
    func: NodeFn,
    ctx: NodeContext,
    state: Value,
    policy: RetryPolicy,
    listeners: Arc<ListenerRegistry>,
) -> Result<NodeOutput> {
    let node = ctx.node().to_string();
    let run_id = ctx.run_id().to_string();
    let step = ctx.step();

    let mut attempts: usize = 0;
    loop {
        match func(ctx.clone(), state.clone()).await {
            Ok(output) => return Ok(output),
            Err(error) if error.is_interrupt() => return Err(error),
            Err(error) => {
                attempts += 1;
                listeners
                    .notify(
                        GraphEvent::new(EventKind::NodeError, run_id.as_str(), step)
                            .with_node(node.as_str())
                            .with_error(&error),
                    )
                    .await;
                if policy.should_retry(attempts) && policy.is_retryable(&error) {
                    tracing::debug!(
                        node = %node,
                        attempt = attempts,
                        error = %error,
                        "retrying node after failure"
                    );
                    time::sleep(policy.calculate_delay(attempts - 1)).await;
                    continue;
                }
                return Err(error);
            }
        }
    }
}

/// Await a future under the invocation's deadline and cancellation token
///
/// On expiry or cancellation the future is dropped: spawned node tasks are
/// detached, never aborted mid-poll.
async fn bounded<T>(
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
    timeout_ms: u64,
    fut: impl Future<Output = T>,
) -> Result<T> {
    let guarded = async {
        match deadline {
            Some(at) => time::timeout_at(at, fut).await.map_err(|_| GraphError::Timeout {
                duration_ms: timeout_ms,
            }),
            None => Ok(fut.await),
        }
    };
    match cancellation {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(GraphError::Canceled),
                outcome = guarded => outcome,
            }
        }
        None => guarded.await,
    }
}
