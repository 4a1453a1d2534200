//! The driver loop: schedule, wait, repeat until the target is materialized.

use crate::node_id::NodeId;
use crate::pipeline::Pipeline;
use crate::pool::ThreadPool;
use crate::scheduler::Scheduler;
use anyhow::{Result, anyhow};
use std::time::Duration;
use tracing::{debug, trace};

/// How often to re-check partitions that another engine's workers are running.
/// Those workers signal their own pool, never this one.
const FOREIGN_POLL: Duration = Duration::from_millis(2);

/// Drive `target` to full materialization on `pool`.
///
/// Each round runs one scheduling pass with the queue lock held, then sleeps
/// on the pool's progress signal while tasks are outstanding. The lock is held
/// from the pass to the wait, so a completion cannot slip in unobserved.
///
/// Partitions scheduled by another engine sharing the graph are waited for by
/// polling, since their completions signal that engine's pool.
///
/// Returns only once the pool has no outstanding tasks, including on error.
///
/// # Errors
///
/// Returns the first task failure recorded on the target or one of its
/// ancestors, or an error if nothing is outstanding and no pass can make
/// progress.
pub(crate) fn run_to_completion(pool: &ThreadPool, pipeline: &Pipeline, target: NodeId) -> Result<()> {
    let node = pipeline.node(target)?;
    let mut queue = pool.queue().lock();
    let mut rounds = 0usize;
    let result = loop {
        if node.is_fully_materialized() {
            debug!(node = %target, rounds, "target materialized");
            break Ok(());
        }
        rounds += 1;
        let outcome = match Scheduler::new(pipeline, &mut queue).run(&node) {
            Ok(outcome) => outcome,
            Err(e) => break Err(e),
        };
        trace!(node = %target, submitted = outcome.submitted, "scheduling pass");
        if queue.outstanding() > 0 {
            queue = queue.wait_progress();
        } else if outcome.in_flight > 0 {
            trace!(node = %target, in_flight = outcome.in_flight, "waiting on another engine");
            queue = queue.wait_progress_timeout(FOREIGN_POLL);
        } else if !node.is_fully_materialized() && !outcome.made_progress() {
            break Err(anyhow!("pipeline stalled: node {target} cannot make progress"));
        }
    };
    // a worker flips the last flag before it reports the task finished
    while queue.outstanding() > 0 {
        queue = queue.wait_progress();
    }
    result
}
