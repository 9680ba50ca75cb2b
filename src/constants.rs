//! # System Constants
//!
//! Operational boundaries of the queue engine: claim batch bounds, lease
//! limits, definition defaults and field length limits.

/// Lease and claim boundaries
pub mod limits {
    /// Smallest batch a single claim call may request
    pub const CLAIM_LIMIT_MIN: i64 = 1;
    /// Largest batch a single claim call may request
    pub const CLAIM_LIMIT_MAX: i64 = 10;
    /// Upper bound for a lease extension (one day)
    pub const MAX_TOUCH_SECONDS: i64 = 86_400;
    /// Default page size for task listings
    pub const DEFAULT_LIST_LIMIT: i64 = 100;
    /// Largest page size for task listings
    pub const MAX_LIST_LIMIT: i64 = 1_000;
}

/// Defaults applied to task definitions that omit policy fields
pub mod defaults {
    /// Lease duration granted on claim, in seconds
    pub const TIMEOUT_SECONDS: i32 = 600;
    /// Retry budget (one attempt, no retry)
    pub const MAX_ATTEMPTS: i32 = 1;
    /// Priority levels allowed when none are configured
    pub const PRIORITY_LEVELS: &[&str] = &["normal"];
}

/// Field length limits mirrored by the database schema
pub mod fields {
    pub const NAME_MAX_LENGTH: usize = 255;
    pub const TITLE_MAX_LENGTH: usize = 255;
    pub const DESCRIPTION_MAX_LENGTH: usize = 2048;
    pub const UNIQUE_TOKEN_MAX_LENGTH: usize = 255;
    pub const WORKER_ID_MAX_LENGTH: usize = 255;
}

/// Operation names used in structured log lines
pub mod operations {
    pub const CREATE_DEFINITION: &str = "create_definition";
    pub const UPDATE_DEFINITION: &str = "update_definition";
    pub const ENQUEUE: &str = "enqueue";
    pub const CLAIM: &str = "claim";
    pub const COMPLETE: &str = "complete";
    pub const FAIL: &str = "fail";
    pub const TOUCH: &str = "touch";
    pub const RELEASE: &str = "release";
    pub const DEQUEUE: &str = "dequeue";
    pub const UPDATE_TASK: &str = "update_task";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_bounds_are_consistent() {
        assert!(limits::CLAIM_LIMIT_MIN >= 1);
        assert!(limits::CLAIM_LIMIT_MIN <= limits::CLAIM_LIMIT_MAX);
        assert!(limits::DEFAULT_LIST_LIMIT <= limits::MAX_LIST_LIMIT);
    }

    #[test]
    fn test_definition_defaults() {
        assert_eq!(defaults::TIMEOUT_SECONDS, 600);
        assert_eq!(defaults::MAX_ATTEMPTS, 1);
        assert_eq!(defaults::PRIORITY_LEVELS, &["normal"]);
    }
}
