use super::types::{ComplianceState, Violation};
use crate::catalog::RuleCatalog;
use crate::fleet::{FleetLedger, Standing};

impl ComplianceState {
    /// Active violations under the grid's effective class.
    ///
    /// Reads tracked state and the ledger only; calling it twice without an
    /// intervening mutation yields the same list.
    pub fn evaluate_violations(&self, catalog: &RuleCatalog, ledger: &FleetLedger) -> Vec<Violation> {
        let rules = catalog.rules(self.effective_class());
        let mut out = Vec::new();

        if let Some((owner, class)) = self.enrolled {
            if ledger.standing(owner, class, self.grid) == Some(Standing::Unsupported) {
                out.push(Violation::Unsupported);
            }
        }

        if let Some(max) = rules.max_blocks {
            if self.total_blocks > max {
                out.push(Violation::TotalBlocks {
                    count: self.total_blocks,
                    max,
                });
            }
        }

        for (index, limit) in rules.block_type_limits.iter().enumerate() {
            let Some(max) = *limit else { continue };
            let count = self.type_count(index);
            if count > max {
                out.push(Violation::BlockType { index, count, max });
            }
        }

        let classifiers = self.classifiers.count() as u32;
        if classifiers > 1 {
            out.push(Violation::TooManyClassifiers { count: classifiers });
        }

        if rules.must_be_stationary && !self.stationary {
            out.push(Violation::NotStationary);
        }

        out
    }
}
