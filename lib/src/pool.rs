//! Bounded-concurrency pool for labelled asynchronous operations.
//!
//! Operations are spawned onto the tokio runtime as soon as they are pushed.
//! Once `pool_size` operations are outstanding, `push` waits for the fastest of
//! them to settle before returning, so no more than `pool_size` operations run
//! at the same time. Only the oldest `pool_size` queue entries take part in a
//! race; this gives approximate rather than strict fastest-first ordering.
//!
//! [`ParallelFileWriter::close`](crate::writer::ParallelFileWriter::close)
//! ends its open files through this pool.

use anyhow::{anyhow, Result};
use chrono::prelude::*;
use futures::future::{select_all, BoxFuture};
use log::debug;
use tokio::task::JoinHandle;

/// An operation that has been started but not yet observed to settle.
struct Operation<T> {
    label: String,
    start: DateTime<Utc>,
    handle: JoinHandle<(Result<T>, DateTime<Utc>)>,
}

/// A settled operation.
#[derive(Debug, Clone)]
pub struct OperationResult<T> {
    pub label: String,
    pub result: T,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl<T> OperationResult<T> {
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

pub struct ConcurrentPromiseManager<T> {
    pool_size: usize,
    queue: Vec<Operation<T>>,
    results: Vec<OperationResult<T>>,
}

impl<T: Send + 'static> ConcurrentPromiseManager<T> {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size: pool_size.max(1),
            queue: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Starts `operation` and, if the pool is full, waits until one queued
    /// operation settles.
    pub async fn push(
        &mut self,
        label: impl Into<String>,
        operation: BoxFuture<'static, Result<T>>,
    ) -> Result<()> {
        let label = label.into();
        debug!("Starting operation {}", label);
        let handle = tokio::spawn(async move {
            let result = operation.await;
            (result, Utc::now())
        });
        self.queue.push(Operation {
            label,
            start: Utc::now(),
            handle,
        });
        if self.queue.len() >= self.pool_size {
            self.drain_one().await?;
        }
        Ok(())
    }

    /// Waits for every queued operation, stopping at the first failure.
    pub async fn wait_until_queue_empty(&mut self) -> Result<()> {
        while !self.queue.is_empty() {
            self.drain_one().await?;
        }
        Ok(())
    }

    /// Number of operations that have been started but not yet collected.
    pub fn size(&self) -> usize {
        self.queue.len()
    }

    /// Settled operations, in settlement order.
    pub fn results(&self) -> &[OperationResult<T>] {
        &self.results
    }

    pub fn into_results(self) -> Vec<OperationResult<T>> {
        self.results
    }

    /// Races the first `pool_size` queued operations and collects the winner.
    async fn drain_one(&mut self) -> Result<()> {
        let window = self.pool_size.min(self.queue.len());
        let handles = self.queue[..window].iter_mut().map(|op| &mut op.handle);
        let (joined, index, rest) = select_all(handles).await;
        drop(rest);
        let op = self.queue.remove(index);
        let (result, end) = joined.map_err(|e| anyhow!("Operation {} panicked: {}", op.label, e))?;
        let result = result.map_err(|e| e.context(format!("Operation {} failed", op.label)))?;
        debug!(
            "Operation {} finished in {}ms",
            op.label,
            (end - op.start).num_milliseconds()
        );
        self.results.push(OperationResult {
            label: op.label,
            result,
            start: op.start,
            end,
        });
        Ok(())
    }
}
