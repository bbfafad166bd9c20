//! Status deriver
//!
//! Two classifications of the same facts:
//! - `Stage`: the single earliest unmet lifecycle gate (mutually exclusive,
//!   fixed priority) - "where is this style stuck"
//! - `Milestones`: every lifecycle event that has happened, judged
//!   independently - "what has this style reached"
//!
//! They intentionally disagree on some edge cases, e.g. positive sales
//! without an explicit on-sale flag. Both are pure functions of current facts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Facts both classifications are computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageFacts {
    pub inbound_qty: u64,
    pub outbound_qty: u64,
    pub sales_qty: u64,
    pub photographed: bool,
    pub registered: bool,
    pub on_sale: bool,
}

// =============================================================================
// Exclusive stage
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    NotReceived,
    NotShipped,
    NotPhotographed,
    NotRegistered,
    OnSale,
}

impl Stage {
    /// In gate priority order.
    pub const ALL: [Stage; 5] = [
        Stage::NotReceived,
        Stage::NotShipped,
        Stage::NotPhotographed,
        Stage::NotRegistered,
        Stage::OnSale,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::NotReceived => "NOT_RECEIVED",
            Stage::NotShipped => "NOT_SHIPPED",
            Stage::NotPhotographed => "NOT_PHOTOGRAPHED",
            Stage::NotRegistered => "NOT_REGISTERED",
            Stage::OnSale => "ON_SALE",
        }
    }

    /// Dashboard label.
    pub fn label(self) -> &'static str {
        match self {
            Stage::NotReceived => "미입고",
            Stage::NotShipped => "미출고",
            Stage::NotPhotographed => "미촬영",
            Stage::NotRegistered => "미등록",
            Stage::OnSale => "판매중",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Stage::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value) || s.label() == value)
            .ok_or_else(|| format!("unknown stage '{}'", value))
    }
}

/// First unmet gate wins.
pub fn derive_stage(facts: &StageFacts) -> Stage {
    if facts.inbound_qty == 0 {
        Stage::NotReceived
    } else if facts.outbound_qty == 0 {
        Stage::NotShipped
    } else if !facts.photographed {
        Stage::NotPhotographed
    } else if !facts.registered {
        Stage::NotRegistered
    } else {
        Stage::OnSale
    }
}

// =============================================================================
// Inclusive milestones
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Milestones {
    pub received: bool,
    pub shipped: bool,
    pub photographed: bool,
    pub registered: bool,
    pub on_sale: bool,
}

/// Each milestone judged on its own "has this ever happened" predicate.
pub fn derive_milestones(facts: &StageFacts) -> Milestones {
    Milestones {
        received: facts.inbound_qty > 0,
        shipped: facts.outbound_qty > 0,
        photographed: facts.photographed,
        registered: facts.registered,
        on_sale: facts.sales_qty > 0 || facts.on_sale || facts.registered,
    }
}

// =============================================================================
// Counters
// =============================================================================

/// Items per exclusive stage; every stage present, zero when unused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCounts(BTreeMap<Stage, usize>);

impl StageCounts {
    pub fn from_stages(stages: impl IntoIterator<Item = Stage>) -> Self {
        let mut counts: BTreeMap<Stage, usize> = Stage::ALL.into_iter().map(|s| (s, 0)).collect();
        for stage in stages {
            *counts.entry(stage).or_insert(0) += 1;
        }
        Self(counts)
    }

    pub fn get(&self, stage: Stage) -> usize {
        self.0.get(&stage).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

/// Items that reached each milestone; one item counts toward several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MilestoneCounts {
    pub received: usize,
    pub shipped: usize,
    pub photographed: usize,
    pub registered: usize,
    pub on_sale: usize,
}

impl MilestoneCounts {
    pub fn from_milestones<'a>(milestones: impl IntoIterator<Item = &'a Milestones>) -> Self {
        milestones
            .into_iter()
            .fold(MilestoneCounts::default(), |mut acc, m| {
                acc.received += m.received as usize;
                acc.shipped += m.shipped as usize;
                acc.photographed += m.photographed as usize;
                acc.registered += m.registered as usize;
                acc.on_sale += m.on_sale as usize;
                acc
            })
    }
}
