//! What one remediation pass removes.
//!
//! Planning is pure and works from tracked state only; executing the plan is
//! the caller's job.

use std::collections::BTreeSet;

use crate::catalog::BlockTags;
use crate::compliance::{ComplianceState, Violation};
use crate::config::LimitsConfig;
use crate::host::BlockId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemediationPlan {
    /// Blocks to remove, in removal order.
    pub blocks: Vec<BlockId>,
    /// Remove the whole grid instead of trimming it.
    pub destroy: bool,
    /// Probation counter to carry into the next countdown.
    pub probation: u32,
}

/// Plan one pass over `violations`.
///
/// Overage violations trim a share of their overage, newest blocks first.
/// Structural violations (quota, stationary) only act once `probation`
/// reaches the configured threshold, then take a single action and reset.
pub fn plan_pass(
    state: &ComplianceState,
    violations: &[Violation],
    quota: Option<u32>,
    probation: u32,
    config: &LimitsConfig,
) -> RemediationPlan {
    let total = state.total_blocks();
    let unsupported = violations.contains(&Violation::Unsupported);

    if unsupported && !state.ever_classified() && total > config.large_grid_threshold {
        return RemediationPlan {
            destroy: true,
            probation,
            ..Default::default()
        };
    }

    let mut picked = BTreeSet::new();
    let mut blocks = Vec::new();
    let mut take = |id: BlockId, blocks: &mut Vec<BlockId>| {
        if picked.insert(id) {
            blocks.push(id);
        }
    };

    for violation in violations {
        match *violation {
            Violation::TotalBlocks { count, max } => {
                let n = config.pass_quota(count.saturating_sub(max)) as usize;
                for id in newest(state, |_| true).take(n) {
                    take(id, &mut blocks);
                }
            }
            Violation::BlockType { index, count, max } => {
                let n = config.pass_quota(count.saturating_sub(max)) as usize;
                for id in newest(state, |tags| tags.counts_as(index)).take(n) {
                    take(id, &mut blocks);
                }
            }
            Violation::TooManyClassifiers { count } => {
                let n = config.pass_quota(count.saturating_sub(1)) as usize;
                let extras: Vec<BlockId> = state
                    .classifiers()
                    .extras_worst_first()
                    .map(|c| c.block)
                    .take(n)
                    .collect();
                for id in extras {
                    take(id, &mut blocks);
                }
            }
            Violation::Unsupported | Violation::NotStationary => {}
        }
    }

    let mut probation_next = probation;
    let mut destroy = false;
    if violations.iter().any(Violation::is_structural) {
        probation_next = probation.saturating_add(1);
        if probation_next >= config.probation_threshold {
            probation_next = 0;
            let classifier = state.classifiers().active().map(|c| c.block);
            if unsupported && quota == Some(0) {
                destroy = true;
            } else if let Some(id) = classifier {
                take(id, &mut blocks);
            } else {
                let n = config.pass_quota(total) as usize;
                for id in newest(state, |_| true).take(n) {
                    take(id, &mut blocks);
                }
            }
        }
    }

    let remaining = total.saturating_sub(blocks.len() as u32);
    if !blocks.is_empty() && remaining <= 1 {
        destroy = true;
    }
    if destroy {
        blocks.clear();
    }
    RemediationPlan {
        blocks,
        destroy,
        probation: probation_next,
    }
}

/// Non-classifier blocks matching `filter`, newest (highest id) first.
fn newest<'a>(
    state: &'a ComplianceState,
    filter: impl Fn(&BlockTags) -> bool + 'a,
) -> impl Iterator<Item = BlockId> + 'a {
    state
        .blocks()
        .rev()
        .filter(move |(_, tags)| !tags.is_classifier() && filter(*tags))
        .map(|(id, _)| *id)
}
