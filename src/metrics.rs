//! Metrics collection for task execution.
//!
//! Workers hand every finished [`TaskMetric`] to a [`MetricsPipeline`], whose
//! single consumer thread drains them to the metrics log, one line per task.
//! The queue has its own mutex/condition pair, so logging never blocks the
//! work queue.
//!
//! Alongside the log, the pipeline keeps a running [`MetricsSummary`] that can
//! be printed or serialized to JSON.
//!
//! # Shutdown
//!
//! With [`MetricsConfig::drain_on_shutdown`] set (the default) the consumer logs
//! everything still queued before it exits. Without it, the consumer exits as
//! soon as it sees the stop flag and whatever is left in the queue is dropped
//! and counted in [`MetricsSummary::tasks_discarded`].

use crate::config::{MetricsConfig, MetricsFormat};
use crate::node::TransformKind;
use crate::task::TaskMetric;
use crate::utils::{lock, wait};
use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Aggregate view of every metric the pipeline has processed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSummary {
    /// Metrics written to the log.
    pub tasks_logged: u64,
    /// Metrics dropped without being logged: still queued at a fire-and-forget
    /// shutdown, or recorded after the log stopped accepting writes.
    pub tasks_discarded: u64,
    /// Logged tasks per transform kind.
    pub tasks_by_kind: BTreeMap<String, u64>,
    /// Sum of logged execution durations.
    pub total_execution_us: u64,
}

impl MetricsSummary {
    fn record(&mut self, metric: &TaskMetric) {
        self.tasks_logged += 1;
        *self
            .tasks_by_kind
            .entry(metric.kind.name().to_string())
            .or_insert(0) += 1;
        let us = u64::try_from(metric.duration_micros()).unwrap_or(u64::MAX);
        self.total_execution_us = self.total_execution_us.saturating_add(us);
    }

    /// Logged task count for one transform kind.
    #[must_use]
    pub fn tasks_of(&self, kind: TransformKind) -> u64 {
        self.tasks_by_kind.get(kind.name()).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Print the summary to stdout in a human-readable format.
    pub fn print(&self) {
        println!("\n========== Task Metrics ==========");
        println!("tasks logged: {}", self.tasks_logged);
        println!("tasks discarded: {}", self.tasks_discarded);
        println!("total execution: {} us", self.total_execution_us);
        println!("----------------------------------");
        for (kind, n) in &self.tasks_by_kind {
            println!("{kind}: {n}");
        }
        println!("==================================\n");
    }
}

struct MetricsState {
    queue: VecDeque<TaskMetric>,
    running: bool,
    summary: MetricsSummary,
}

struct Shared {
    state: Mutex<MetricsState>,
    cond: Condvar,
}

/// Background consumer draining completed-task metrics to the metrics log.
pub(crate) struct MetricsPipeline {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<io::Result<()>>>>,
}

impl MetricsPipeline {
    /// Open (or create) the log and start the consumer thread.
    pub(crate) fn start(config: &MetricsConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(config.append)
            .truncate(!config.append)
            .open(&config.log_path)
            .with_context(|| {
                format!("failed to open metrics log {}", config.log_path.display())
            })?;

        let shared = Arc::new(Shared {
            state: Mutex::new(MetricsState {
                queue: VecDeque::new(),
                running: true,
                summary: MetricsSummary::default(),
            }),
            cond: Condvar::new(),
        });

        let consumer = Consumer {
            shared: Arc::clone(&shared),
            out: BufWriter::new(file),
            format: config.format,
            drain: config.drain_on_shutdown,
            failed: None,
        };
        let handle = thread::Builder::new()
            .name("minispark-metrics".into())
            .spawn(move || consumer.run())
            .context("failed to spawn metrics consumer")?;

        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Queue a finished metric for logging.
    pub(crate) fn record(&self, metric: TaskMetric) {
        let mut st = lock(&self.shared.state);
        st.queue.push_back(metric);
        self.shared.cond.notify_one();
    }

    pub(crate) fn summary(&self) -> MetricsSummary {
        lock(&self.shared.state).summary.clone()
    }

    /// Stop the consumer, join it, and account for anything left queued.
    ///
    /// Idempotent: later calls return the summary without touching the log.
    pub(crate) fn shutdown(&self) -> Result<MetricsSummary> {
        let Some(handle) = lock(&self.handle).take() else {
            return Ok(self.summary());
        };
        {
            let mut st = lock(&self.shared.state);
            st.running = false;
            self.shared.cond.notify_all();
        }

        let joined = handle
            .join()
            .map_err(|_| anyhow!("metrics consumer panicked"));

        let summary = {
            let mut st = lock(&self.shared.state);
            let left = st.queue.len() as u64;
            st.queue.clear();
            if left > 0 {
                warn!(discarded = left, "metrics discarded at shutdown");
            }
            st.summary.tasks_discarded += left;
            st.summary.clone()
        };

        joined?.context("writing metrics log")?;
        debug!(logged = summary.tasks_logged, "metrics pipeline stopped");
        Ok(summary)
    }
}

impl Drop for MetricsPipeline {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("metrics pipeline shutdown failed: {e:#}");
        }
    }
}

/// State owned by the consumer thread.
struct Consumer {
    shared: Arc<Shared>,
    out: BufWriter<File>,
    format: MetricsFormat,
    drain: bool,
    /// First write error. Once set, nothing more is written but the queue is
    /// still drained.
    failed: Option<io::Error>,
}

enum Step {
    Log(TaskMetric),
    Flush,
    Exit,
}

impl Consumer {
    fn run(mut self) -> io::Result<()> {
        let mut dirty = false;
        loop {
            let step = {
                let mut st = lock(&self.shared.state);
                loop {
                    if !st.running && (!self.drain || st.queue.is_empty()) {
                        break Step::Exit;
                    }
                    if let Some(m) = st.queue.pop_front() {
                        break Step::Log(m);
                    }
                    if dirty {
                        // queue drained: flush outside the lock before sleeping
                        break Step::Flush;
                    }
                    st = wait(&self.shared.cond, st);
                }
            };
            match step {
                Step::Log(metric) => {
                    let written = self.failed.is_none() && self.try_write(&metric);
                    let mut st = lock(&self.shared.state);
                    if written {
                        dirty = true;
                        st.summary.record(&metric);
                    } else {
                        st.summary.tasks_discarded += 1;
                    }
                }
                Step::Flush => {
                    if self.failed.is_none() {
                        self.try_flush();
                    }
                    dirty = false;
                }
                Step::Exit => break,
            }
        }
        if self.failed.is_none() {
            self.try_flush();
        }
        self.failed.map_or(Ok(()), Err)
    }

    fn try_write(&mut self, metric: &TaskMetric) -> bool {
        let res = self.write(metric);
        res.map_err(|e| self.fail(e)).is_ok()
    }

    fn try_flush(&mut self) {
        if let Err(e) = self.out.flush() {
            self.fail(e);
        }
    }

    fn fail(&mut self, e: io::Error) {
        if self.failed.is_none() {
            error!("metrics log write failed, discarding further metrics: {e}");
            self.failed = Some(e);
        }
    }

    fn write(&mut self, metric: &TaskMetric) -> io::Result<()> {
        match self.format {
            MetricsFormat::Text => writeln!(self.out, "{}", metric.to_log_line()),
            MetricsFormat::JsonLines => {
                serde_json::to_writer(&mut self.out, &metric.to_record())?;
                writeln!(self.out)
            }
        }
    }
}
