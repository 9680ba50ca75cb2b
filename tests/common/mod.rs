//! Shared fixtures for the integration tests.

#![allow(dead_code)]

pub mod strategies;

use std::sync::Arc;

use chrono::Utc;
use taskqueue_core::clock::ManualClock;
use taskqueue_core::models::{DefinitionPolicy, EnqueueTaskRequest, Priority, Task};
use taskqueue_core::queue::{ServiceIdentity, TaskQueue};

pub const DEFINITION: &str = "classifier-search";

/// In-memory queue whose clock only moves when the test says so
pub struct TestQueue {
    pub queue: TaskQueue,
    pub clock: Arc<ManualClock>,
    pub producer: ServiceIdentity,
}

impl TestQueue {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        Self {
            queue: TaskQueue::in_memory_with_clock(clock.clone()),
            clock,
            producer: ServiceIdentity::new("producer"),
        }
    }

    /// Register `DEFINITION` accepting every priority
    pub async fn with_definition(policy: DefinitionPolicy) -> Self {
        let fixture = Self::new();
        fixture
            .queue
            .create_definition(
                Some(&fixture.producer),
                DEFINITION,
                policy.with_priorities(Priority::ALL.to_vec()),
            )
            .await
            .expect("definition should be created");
        fixture
    }

    pub async fn enqueue(&self, request: EnqueueTaskRequest) -> Task {
        self.queue
            .enqueue_task(Some(&self.producer), request)
            .await
            .expect("enqueue should succeed")
    }

    pub async fn enqueue_priority(&self, priority: Priority) -> Task {
        self.enqueue(EnqueueTaskRequest::new(DEFINITION).with_priority(priority))
            .await
    }

    pub async fn claim_as(&self, worker: &str, limit: i64) -> Vec<Task> {
        self.queue
            .claim(
                Some(&ServiceIdentity::new(worker)),
                &names(),
                None,
                limit,
            )
            .await
            .expect("claim should succeed")
    }
}

pub fn names() -> Vec<String> {
    vec![DEFINITION.to_string()]
}

pub fn worker(name: &str) -> ServiceIdentity {
    ServiceIdentity::new(name)
}
