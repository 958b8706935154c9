//! Offset/limit window arithmetic
//!
//! Kept apart from any store access so the clipping rules can be tested on
//! their own. Both orders select the same window of ordinals,
//! `[offset, min(offset + limit, len))`; the order only decides which end of
//! the window is visited first.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Iteration order over a failure list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Oldest first
    #[default]
    Asc,
    /// Newest first
    Desc,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Asc => write!(f, "asc"),
            Order::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Order::Asc),
            "desc" | "descending" => Ok(Order::Desc),
            other => Err(format!("unknown order: {}", other)),
        }
    }
}

/// A non-empty, inclusive range of ordinals inside a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub low: usize,
    pub high: usize,
}

impl Window {
    /// Ordinals of the window in visiting order
    pub fn ordinals(&self, order: Order) -> Box<dyn Iterator<Item = usize>> {
        let range = self.low..=self.high;
        match order {
            Order::Asc => Box::new(range),
            Order::Desc => Box::new(range.rev()),
        }
    }
}

/// Intersect `[offset, offset + limit)` with `[0, len)`.
///
/// Returns `None` when nothing is left: `offset >= len` or `limit == 0`.
pub fn select(len: usize, offset: usize, limit: usize) -> Option<Window> {
    if offset >= len || limit == 0 {
        return None;
    }

    let high = offset.saturating_add(limit).min(len) - 1;
    Some(Window { low: offset, high })
}
