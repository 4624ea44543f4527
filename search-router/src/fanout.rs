//! Scatter-gather over the upstream search client.
//!
//! One inbound request carries N queries. Each query is searched on its own
//! task and the outcomes are assembled into a single response that is
//! index-aligned with the input: `outcomes[i]` always belongs to `queries[i]`,
//! whatever order the tasks finish in.
//!
//! Slots for all N outcomes are allocated before any task is spawned. Tasks
//! never touch the slots; each one returns `(index, outcome)` through the
//! `JoinSet` and the dispatcher, the only writer, fills slot `index`. The
//! dispatcher returns only after every task has been joined, so no slot is
//! read before it is written.
//!
//! Queries rejected while parsing the request keep their error in their slot
//! and are never searched.
//!
//! A failing query never cancels its siblings. The only cancellation is the
//! optional fan-out deadline, after which still-running searches are aborted
//! and reported as timeouts in their own slots.

use crate::client::SearchBackend;
use crate::errors::SearchError;
use crate::metrics_defs::FANOUT_QUERIES;
use crate::protocol::{AggregatedResponse, FanOutOutcome, ParsedQuery, SearchQuery};
use shared::histogram;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::{Instant, sleep_until};

/// Result returned by a single search task.
struct SearchTaskResult {
    /// Position of the query in the inbound request
    index: usize,

    outcome: FanOutOutcome,
}

/// A valid query waiting to be searched, with the slot it owns.
struct PendingSearch {
    index: usize,
    query: SearchQuery,
}

/// Spawned search tasks with the pending search each one serves.
///
/// Needed to place panicked or aborted tasks, which only report their task id.
struct SpawnedTasks {
    join_set: JoinSet<SearchTaskResult>,
    task_slots: HashMap<Id, PendingSearch>,
}

pub struct FanOutAggregator {
    backend: Arc<dyn SearchBackend>,
    task_timeout: Option<Duration>,
}

impl FanOutAggregator {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            task_timeout: None,
        }
    }

    /// Bounds the time a whole fan-out may take. `None` waits for every search.
    pub fn with_task_timeout(mut self, task_timeout: Option<Duration>) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    /// Searches every valid query concurrently and returns the outcomes in input order.
    ///
    /// An `Err` input is copied to its slot as is, without calling the backend.
    pub async fn dispatch(&self, queries: Vec<ParsedQuery>) -> AggregatedResponse {
        if queries.is_empty() {
            return AggregatedResponse::default();
        }

        histogram!(FANOUT_QUERIES).record(queries.len() as f64);

        let mut slots: Vec<Option<FanOutOutcome>> = Vec::with_capacity(queries.len());
        let mut pending = Vec::with_capacity(queries.len());
        for (index, query) in queries.into_iter().enumerate() {
            match query {
                Ok(query) => {
                    slots.push(None);
                    pending.push(PendingSearch { index, query });
                }
                Err(e) => slots.push(Some(Err(e))),
            }
        }

        let spawned_tasks = self.spawn_search_tasks(pending);
        self.collect_results(spawned_tasks, &mut slots).await;

        let outcomes: Vec<FanOutOutcome> = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(SearchError::TaskFailed(
                        "search task did not report an outcome".into(),
                    ))
                })
            })
            .collect();

        let response = AggregatedResponse::new(outcomes);
        tracing::debug!(
            queries = response.len(),
            failures = response.failure_count(),
            "Fan-out completed"
        );
        response
    }

    fn spawn_search_tasks(&self, pending: Vec<PendingSearch>) -> SpawnedTasks {
        let mut join_set = JoinSet::new();
        let mut task_slots = HashMap::with_capacity(pending.len());

        for search in pending {
            let backend = self.backend.clone();
            let index = search.index;
            let query = search.query.clone();

            let abort_handle = join_set.spawn(async move {
                let outcome = backend.search(&query).await;
                SearchTaskResult { index, outcome }
            });

            task_slots.insert(abort_handle.id(), search);
        }

        SpawnedTasks {
            join_set,
            task_slots,
        }
    }

    /// Joins every task, writing each outcome into the slot of its query.
    async fn collect_results(
        &self,
        spawned_tasks: SpawnedTasks,
        slots: &mut [Option<FanOutOutcome>],
    ) {
        let SpawnedTasks {
            mut join_set,
            mut task_slots,
        } = spawned_tasks;

        let deadline = wait_for_deadline(self.task_timeout.map(|t| Instant::now() + t));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                join_result = join_set.join_next_with_id() => {
                    match join_result {
                        Some(result) => record_completion(result, &mut task_slots, slots),
                        None => {
                            tracing::debug!("All search tasks completed");
                            break;
                        }
                    }
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        remaining = join_set.len(),
                        "Fan-out deadline reached, aborting outstanding searches"
                    );
                    join_set.abort_all();
                    break;
                }
            }
        }

        // Aborted tasks still have to be joined; some may have finished in the meantime.
        while let Some(result) = join_set.join_next_with_id().await {
            record_completion(result, &mut task_slots, slots);
        }
    }
}

fn record_completion(
    join_result: Result<(Id, SearchTaskResult), JoinError>,
    task_slots: &mut HashMap<Id, PendingSearch>,
    slots: &mut [Option<FanOutOutcome>],
) {
    match join_result {
        Ok((task_id, SearchTaskResult { index, outcome })) => {
            task_slots.remove(&task_id);
            slots[index] = Some(outcome);
        }
        Err(e) => {
            let Some(PendingSearch { index, query }) = task_slots.remove(&e.id()) else {
                tracing::error!("Join error for unknown search task: {e}");
                return;
            };

            let error = if e.is_cancelled() {
                SearchError::UpstreamTimeout(query.to_string())
            } else {
                tracing::error!(index, "Search task panicked: {e}");
                SearchError::TaskFailed(e.to_string())
            };
            slots[index] = Some(Err(error));
        }
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
