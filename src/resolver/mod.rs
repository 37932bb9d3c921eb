//! Recursive decomposition controller.
//!
//! The controller decides split vs. direct-answer per node, fans sub-queries
//! out with bounded parallelism, merges sub-answers in original order, and
//! recurses until the depth or budget bound is met. The budget is a soft
//! ceiling: once exhausted, remaining nodes are answered directly regardless
//! of complexity, never dropped. A failed child becomes a gap placeholder in
//! the merged answer; only root failure (or every child of a node failing)
//! surfaces as an error to the caller.

mod split;
mod tree;

pub use split::{complexity_score, split_query};
pub use tree::{NodeId, NodeStatus, QueryNode, QueryTree};

use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, ResolverConfig};
use crate::error::{AppError, AppResult, ResolveError, RouterError};
use crate::memory::{CacheCounters, ContextSource, MemoryStore, RetrievalCache};
use crate::prompts::{self, MergeSection, DIRECT_ANSWER_PROMPT};
use crate::router::{CallPayload, Effort, ModelRouter, ReasoningProvider, TierLevel};
use crate::telemetry::{MetricsSnapshot, RateTable, TelemetryAggregator};

/// Per-resolution settings.
///
/// `effort` and `temperature` are mutually exclusive; [`SessionConfig::validate`]
/// rejects the combination before anything is dispatched, and the router
/// checks again per call.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hard recursion ceiling; the root is depth 0.
    pub max_depth: u32,
    /// Soft model-call ceiling. Splitting requires at least 2 remaining.
    pub budget: u32,
    /// Tier every direct answer starts at.
    pub default_tier: TierLevel,
    /// Reasoning-depth control.
    pub effort: Option<Effort>,
    /// Randomness control.
    pub temperature: Option<f32>,
    /// Context scope the session retrieves against.
    pub scope: String,
}

impl SessionConfig {
    /// Create a session config with neither effort nor temperature set.
    pub fn new(max_depth: u32, budget: u32, default_tier: TierLevel) -> Self {
        Self {
            max_depth,
            budget,
            default_tier,
            effort: None,
            temperature: None,
            scope: "session".to_string(),
        }
    }

    /// Defaults drawn from the environment-backed application config.
    pub fn from_config(config: &Config) -> Self {
        let mut session = Self::new(
            config.resolver.default_max_depth,
            config.resolver.default_budget,
            config.router.default_tier,
        );
        session.effort = config.router.default_effort;
        session
    }

    /// Set the reasoning effort.
    pub fn with_effort(mut self, effort: Effort) -> Self {
        self.effort = Some(effort);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the context scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Reject invalid combinations before resolution starts.
    pub fn validate(&self) -> AppResult<()> {
        if self.effort.is_some() && self.temperature.is_some() {
            return Err(RouterError::ConfigConflict {
                message: "reasoning effort and temperature are mutually exclusive".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// The outcome of one resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Session identifier, unique per resolution.
    pub session_id: String,
    /// The merged (or direct) answer.
    pub answer: String,
    /// Cumulative metrics at completion time.
    pub metrics: MetricsSnapshot,
}

/// Shared per-resolution state: the node arena, the call budget, the
/// deadline, and the in-flight call cap.
struct SessionCtx {
    session: SessionConfig,
    started: Instant,
    deadline: Instant,
    cancelled: AtomicBool,
    budget: AtomicI64,
    /// Caps simultaneous in-flight model calls, not subtree recursion:
    /// decomposed parents hold no permit while awaiting children.
    semaphore: Semaphore,
    tree: Mutex<QueryTree>,
}

impl SessionCtx {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || Instant::now() >= self.deadline
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn allows_split(&self) -> bool {
        self.budget.load(Ordering::Relaxed) >= 2
    }

    fn spend_call(&self) {
        self.budget.fetch_sub(1, Ordering::Relaxed);
    }

    fn fail_node(&self, node_id: NodeId) {
        self.tree
            .lock()
            .expect("tree lock poisoned")
            .mark_failed(node_id);
    }
}

/// The recursive query engine: decomposition controller wired to the memory
/// store, model router, and telemetry aggregator.
pub struct QueryEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    resolver: ResolverConfig,
    memory: MemoryStore,
    router: ModelRouter,
    telemetry: Arc<TelemetryAggregator>,
}

impl QueryEngine {
    /// Wire an engine from config and the two external collaborators.
    pub fn new(
        config: &Config,
        source: Arc<dyn ContextSource>,
        provider: Arc<dyn ReasoningProvider>,
    ) -> Self {
        let counters = Arc::new(CacheCounters::new());
        let telemetry = Arc::new(TelemetryAggregator::new(
            RateTable::builtin(),
            Arc::clone(&counters),
        ));
        let memory = MemoryStore::new(
            RetrievalCache::new(config.cache.capacity, counters),
            source,
        );
        let router = ModelRouter::new(
            provider,
            config.router.clone(),
            config.request.clone(),
            config.resolver.max_tokens,
            Arc::clone(&telemetry),
        );

        Self {
            inner: Arc::new(EngineInner {
                resolver: config.resolver.clone(),
                memory,
                router,
                telemetry,
            }),
        }
    }

    /// The telemetry aggregator, for snapshots and session reset.
    pub fn telemetry(&self) -> &TelemetryAggregator {
        &self.inner.telemetry
    }

    /// The memory store, for cache inspection.
    pub fn memory(&self) -> &MemoryStore {
        &self.inner.memory
    }

    /// Resolve a query under the given session settings.
    ///
    /// Carries an overall deadline; on timeout, in-flight sub-calls finish
    /// in the background (their telemetry is retained) but their results are
    /// discarded and no further sub-queries are dispatched.
    pub async fn resolve(&self, query: &str, session: SessionConfig) -> AppResult<Resolution> {
        if query.trim().is_empty() {
            return Err(ResolveError::Validation {
                field: "query".to_string(),
                reason: "cannot be empty".to_string(),
            }
            .into());
        }
        session.validate()?;

        let session_id = Uuid::new_v4().to_string();
        let timeout = Duration::from_millis(self.inner.resolver.session_timeout_ms);
        let now = Instant::now();
        let ctx = Arc::new(SessionCtx {
            budget: AtomicI64::new(i64::from(session.budget)),
            session,
            started: now,
            deadline: now + timeout,
            cancelled: AtomicBool::new(false),
            semaphore: Semaphore::new(self.inner.resolver.max_parallel_calls.max(1)),
            tree: Mutex::new(QueryTree::new()),
        });

        let root_id = ctx
            .tree
            .lock()
            .expect("tree lock poisoned")
            .push(query.trim(), 0);

        info!(
            session_id = %session_id,
            max_depth = ctx.session.max_depth,
            budget = ctx.session.budget,
            "Resolving query"
        );

        let outcome = tokio::time::timeout(
            timeout,
            Arc::clone(&self.inner).resolve_node(Arc::clone(&ctx), root_id),
        )
        .await;

        match outcome {
            Err(_) => {
                ctx.cancel();
                warn!(
                    session_id = %session_id,
                    "Resolution deadline hit, discarding in-flight work"
                );
                Err(ResolveError::Cancelled {
                    elapsed_ms: ctx.elapsed_ms(),
                }
                .into())
            }
            Ok(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "Root query failed");
                Err(e)
            }
            Ok(Ok(answer)) => {
                let nodes = ctx.tree.lock().expect("tree lock poisoned").len();
                info!(
                    session_id = %session_id,
                    nodes = nodes,
                    elapsed_ms = ctx.elapsed_ms(),
                    "Query resolved"
                );
                Ok(Resolution {
                    session_id,
                    answer,
                    metrics: self.inner.telemetry.snapshot(),
                })
            }
        }
    }
}

impl EngineInner {
    /// Resolve one node: split when complexity, depth, and budget all
    /// permit, otherwise answer directly.
    fn resolve_node(
        self: Arc<Self>,
        ctx: Arc<SessionCtx>,
        node_id: NodeId,
    ) -> BoxFuture<'static, AppResult<String>> {
        async move {
            if ctx.is_cancelled() {
                ctx.fail_node(node_id);
                return Err(ResolveError::Cancelled {
                    elapsed_ms: ctx.elapsed_ms(),
                }
                .into());
            }

            let (text, depth) = {
                let tree = ctx.tree.lock().expect("tree lock poisoned");
                let node = tree.node(node_id);
                (node.text.clone(), node.depth)
            };

            let score = split::complexity_score(&text);
            let complex = score > self.resolver.complexity_threshold;

            if complex && self.resolver.enabled && depth < ctx.session.max_depth {
                if ctx.allows_split() {
                    let t_decompose = Instant::now();
                    let parts = split::split_query(&text);
                    if parts.len() >= 2 {
                        return self
                            .resolve_decomposed(ctx, node_id, depth, parts, t_decompose)
                            .await;
                    }
                } else {
                    debug!(node = node_id, "Budget exhausted, forcing direct answer");
                }
            }

            self.answer_direct(&ctx, node_id, &text).await
        }
        .boxed()
    }

    /// Fan sub-queries out, await them in original order, merge.
    async fn resolve_decomposed(
        self: Arc<Self>,
        ctx: Arc<SessionCtx>,
        node_id: NodeId,
        depth: u32,
        parts: Vec<String>,
        t_decompose: Instant,
    ) -> AppResult<String> {
        let child_ids: Vec<NodeId> = {
            let mut tree = ctx.tree.lock().expect("tree lock poisoned");
            let ids: Vec<NodeId> = parts
                .iter()
                .map(|part| tree.push(part.clone(), depth + 1))
                .collect();
            tree.mark_decomposed(node_id, &ids)?;
            ids
        };
        self.telemetry.record_stage("decompose", t_decompose.elapsed());

        debug!(
            node = node_id,
            children = child_ids.len(),
            depth = depth,
            "Query decomposed"
        );

        let mut handles = Vec::with_capacity(child_ids.len());
        for &child_id in &child_ids {
            let engine = Arc::clone(&self);
            let child_ctx = Arc::clone(&ctx);
            handles.push(tokio::spawn(async move {
                engine.resolve_node(child_ctx, child_id).await
            }));
        }

        // Await in original query order; completion order is irrelevant to
        // the merge.
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap_or_else(|e| {
                Err(AppError::Internal {
                    message: format!("sub-query task failed: {}", e),
                })
            }));
        }

        let t_merge = Instant::now();
        let mut sections = Vec::with_capacity(results.len());
        let mut succeeded = 0usize;
        for ((part, &child_id), result) in parts.iter().zip(&child_ids).zip(results) {
            match result {
                Ok(answer) => {
                    succeeded += 1;
                    sections.push(MergeSection {
                        question: part.clone(),
                        answer: Some(answer),
                    });
                }
                Err(e) => {
                    warn!(
                        part = %part,
                        error = %e,
                        "Sub-query failed, merging remaining answers"
                    );
                    // A task that died before marking itself must still end
                    // terminal, or the parent's answer transition is blocked.
                    let mut tree = ctx.tree.lock().expect("tree lock poisoned");
                    if !tree.node(child_id).is_terminal() {
                        tree.mark_failed(child_id);
                    }
                    sections.push(MergeSection {
                        question: part.clone(),
                        answer: None,
                    });
                }
            }
        }

        if succeeded == 0 {
            ctx.fail_node(node_id);
            self.telemetry.record_stage("merge", t_merge.elapsed());
            return Err(ResolveError::AllChildrenFailed {
                count: sections.len(),
            }
            .into());
        }

        let merged = prompts::merge_answer(&sections);
        ctx.tree
            .lock()
            .expect("tree lock poisoned")
            .mark_answered(node_id, merged.clone())?;
        self.telemetry.record_stage("merge", t_merge.elapsed());

        Ok(merged)
    }

    /// Retrieve context and answer via the router.
    async fn answer_direct(
        &self,
        ctx: &Arc<SessionCtx>,
        node_id: NodeId,
        text: &str,
    ) -> AppResult<String> {
        let t_retrieve = Instant::now();
        let context = match self.memory.retrieve(text, &ctx.session.scope).await {
            Ok(context) => context,
            Err(e) => {
                warn!(error = %e, "Context retrieval failed, answering without context");
                None
            }
        };
        self.telemetry.record_stage("retrieve", t_retrieve.elapsed());

        let mut payload = CallPayload::new(prompts::direct_prompt(text, context.as_deref()))
            .with_system(DIRECT_ANSWER_PROMPT);
        if let Some(effort) = ctx.session.effort {
            payload = payload.with_effort(effort);
        }
        if let Some(temperature) = ctx.session.temperature {
            payload = payload.with_temperature(temperature);
        }

        let permit = ctx
            .semaphore
            .acquire()
            .await
            .map_err(|_| AppError::Internal {
                message: "call semaphore closed".to_string(),
            })?;

        // Re-check after possibly queueing behind the in-flight cap.
        if ctx.is_cancelled() {
            drop(permit);
            ctx.fail_node(node_id);
            return Err(ResolveError::Cancelled {
                elapsed_ms: ctx.elapsed_ms(),
            }
            .into());
        }

        ctx.spend_call();
        let t_call = Instant::now();
        let result = self.router.call(payload, ctx.session.default_tier).await;
        drop(permit);
        self.telemetry.record_stage("model_call", t_call.elapsed());

        match result {
            Ok(routed) => {
                debug!(
                    node = node_id,
                    tier = %routed.record.tier,
                    family = %routed.record.resolved_family,
                    "Node answered"
                );
                ctx.tree
                    .lock()
                    .expect("tree lock poisoned")
                    .mark_answered(node_id, routed.text.clone())?;
                Ok(routed.text)
            }
            Err(e) => {
                ctx.fail_node(node_id);
                Err(e.into())
            }
        }
    }
}
