use proptest::prelude::*;
use taskqueue_core::models::Priority;

/// Strategy for generating task priorities
pub fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Critical),
        Just(Priority::High),
        Just(Priority::Normal),
        Just(Priority::Low),
    ]
}

/// A task to seed: its priority and how many seconds in the past it was scheduled
pub fn seeded_task_strategy() -> impl Strategy<Value = (Priority, i64)> {
    (priority_strategy(), 0i64..3600)
}

pub fn seeded_pool_strategy() -> impl Strategy<Value = Vec<(Priority, i64)>> {
    prop::collection::vec(seeded_task_strategy(), 1..40)
}

/// Claim batch sizes requested by a set of concurrent workers
pub fn claim_limits_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..=10, 1..8)
}

/// Strategy for generating valid task definition names
pub fn definition_name_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,64}"
}
