//! Frontier of pending fetches
//!
//! This module handles:
//! - FIFO queue of (URL, schema group) fetch tasks
//! - Dropping requests for URLs already scheduled in this run
//! - Global concurrency limiting via a semaphore

use crate::extract::{FetchRequest, FollowKind};
use crate::schema::Group;
use crate::url::canonicalize_url;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// A document to fetch with the schema group to apply to it
#[derive(Debug, Clone)]
pub struct FetchTask {
    /// The URL to fetch
    pub url: Url,

    /// Schema group applied to the fetched document
    pub schema: Arc<Group>,

    /// How the URL was found; None for the seed
    pub kind: Option<FollowKind>,
}

impl FetchTask {
    /// The first task of a run
    pub fn seed(url: Url, schema: Arc<Group>) -> Self {
        Self {
            url,
            schema,
            kind: None,
        }
    }
}

impl From<FetchRequest> for FetchTask {
    fn from(request: FetchRequest) -> Self {
        Self {
            url: request.url,
            schema: request.schema,
            kind: Some(request.kind),
        }
    }
}

/// A task cleared to run, holding its concurrency permit
pub struct ScheduledFetch {
    /// The task to run
    pub task: FetchTask,

    /// Released when the fetch and its extraction finish
    pub permit: OwnedSemaphorePermit,
}

/// Frontier manages the pending queue and the concurrency limit
pub struct Frontier {
    /// Global semaphore for limiting concurrent fetches
    semaphore: Arc<Semaphore>,

    /// Tasks waiting for a permit, in discovery order
    queue: VecDeque<FetchTask>,

    /// Canonical URLs already scheduled
    seen: HashSet<String>,
}

impl Frontier {
    /// Creates a frontier allowing `concurrency` fetches in flight
    pub fn new(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            queue: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Queues a task unless its URL was already scheduled
    ///
    /// Returns true if the task was queued.
    pub fn push(&mut self, task: FetchTask) -> bool {
        let key = canonicalize_url(task.url.clone())
            .map(String::from)
            .unwrap_or_else(|_| task.url.to_string());

        if !self.seen.insert(key) {
            tracing::trace!("Skipping already scheduled URL: {}", task.url);
            return false;
        }

        self.queue.push_back(task);
        true
    }

    /// Takes the next task if a concurrency permit is free
    ///
    /// Returns None if the queue is empty or every permit is in use.
    pub fn try_next(&mut self) -> Option<ScheduledFetch> {
        if self.queue.is_empty() {
            return None;
        }

        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        let task = self.queue.pop_front()?;
        Some(ScheduledFetch { task, permit })
    }

    /// Number of tasks waiting for a permit
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of distinct URLs scheduled so far
    pub fn scheduled_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(url: &str) -> FetchTask {
        FetchTask::seed(Url::parse(url).unwrap(), Arc::new(Group::default()))
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = Frontier::new(10);
        frontier.push(task("https://e.com/1"));
        frontier.push(task("https://e.com/2"));

        assert_eq!(frontier.try_next().unwrap().task.url.as_str(), "https://e.com/1");
        assert_eq!(frontier.try_next().unwrap().task.url.as_str(), "https://e.com/2");
        assert!(frontier.try_next().is_none());
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let mut frontier = Frontier::new(10);
        assert!(frontier.push(task("https://e.com/1")));
        assert!(!frontier.push(task("https://e.com/1#reviews")));
        assert!(frontier.push(task("https://e.com/1?page=2")));

        assert_eq!(frontier.len(), 2);
        assert_eq!(frontier.scheduled_count(), 2);
    }

    #[test]
    fn test_concurrency_limit() {
        let mut frontier = Frontier::new(2);
        for i in 0..3 {
            frontier.push(task(&format!("https://e.com/{}", i)));
        }

        let first = frontier.try_next().unwrap();
        let _second = frontier.try_next().unwrap();
        assert!(frontier.try_next().is_none());
        assert_eq!(frontier.len(), 1);

        drop(first);
        assert!(frontier.try_next().is_some());
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_from_fetch_request() {
        let schema = Arc::new(Group::default());
        let task = FetchTask::from(FetchRequest {
            url: Url::parse("https://e.com/next").unwrap(),
            schema: Arc::clone(&schema),
            kind: FollowKind::Pagination,
        });

        assert_eq!(task.kind, Some(FollowKind::Pagination));
        assert!(Arc::ptr_eq(&task.schema, &schema));
    }
}
