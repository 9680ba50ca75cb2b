use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority band of a task.
///
/// Claims drain bands strictly in rank order: `critical` (1) before `high`
/// (2) before `normal` (3) before `low` (4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Critical, Self::High, Self::Normal, Self::Low];

    /// Sort rank used by the claim engine, lower claims first
    pub fn rank(&self) -> i32 {
        match self {
            Self::Critical => 1,
            Self::High => 2,
            Self::Normal => 3,
            Self::Low => 4,
        }
    }

    pub fn from_rank(rank: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.rank() == rank)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }

    /// Deduplicate and order a priority list by rank.
    pub fn normalize(priorities: &[Priority]) -> Vec<Priority> {
        let mut normalized = priorities.to_vec();
        normalized.sort();
        normalized.dedup();
        normalized
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            _ => Err(format!("Invalid priority: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_order() {
        assert!(Priority::Critical.rank() < Priority::High.rank());
        assert!(Priority::High.rank() < Priority::Normal.rank());
        assert!(Priority::Normal.rank() < Priority::Low.rank());
        assert_eq!(Priority::from_rank(2), Some(Priority::High));
        assert_eq!(Priority::from_rank(9), None);
    }

    #[test]
    fn test_ord_follows_rank() {
        let mut priorities = vec![Priority::Low, Priority::Critical, Priority::Normal];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::Critical, Priority::Normal, Priority::Low]
        );
    }

    #[test]
    fn test_normalize_dedups() {
        let normalized = Priority::normalize(&[
            Priority::Low,
            Priority::Normal,
            Priority::Low,
            Priority::High,
        ]);
        assert_eq!(
            normalized,
            vec![Priority::High, Priority::Normal, Priority::Low]
        );
    }

    #[test]
    fn test_default_and_parse() {
        assert_eq!(Priority::default(), Priority::Normal);
        assert_eq!("critical".parse::<Priority>().unwrap(), Priority::Critical);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
    }
}
