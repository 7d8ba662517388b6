use crate::currency::Currency;
use crate::error::{WalletError, WalletResult};
use crate::selection::{CoinSelector, Selection, SizeEstimator};
use crate::types::{SiacoinOutput, UnlockHash, ValuedInput};

/// Funding for `count` outputs of `per_output` each.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitPlan {
    pub count: usize,
    pub per_output: Currency,
    pub selection: Selection,
}

impl SplitPlan {
    /// The equal-value outputs followed by the change output, if any.
    pub fn outputs(&self, destination: UnlockHash, change_address: UnlockHash) -> Vec<SiacoinOutput> {
        let mut outputs: Vec<SiacoinOutput> = (0..self.count)
            .map(|_| SiacoinOutput {
                value: self.per_output.clone(),
                unlock_hash: destination,
            })
            .collect();
        if !self.selection.change.is_zero() {
            outputs.push(SiacoinOutput {
                value: self.selection.change.clone(),
                unlock_hash: change_address,
            });
        }
        outputs
    }
}

/// Funds a transaction that splits wallet value into equal outputs.
pub struct OutputSplitter<'a, E: SizeEstimator + ?Sized> {
    selector: CoinSelector<'a, E>,
}

impl<'a, E: SizeEstimator + ?Sized> OutputSplitter<'a, E> {
    pub fn new(fee_per_byte: Currency, estimator: &'a E) -> Self {
        Self {
            selector: CoinSelector::new(fee_per_byte, estimator),
        }
    }

    pub fn split(
        &self,
        count: usize,
        per_output: &Currency,
        available: &[ValuedInput],
    ) -> WalletResult<SplitPlan> {
        if count == 0 {
            return Err(WalletError::invalid("split needs at least one output"));
        }
        if per_output.is_zero() {
            return Err(WalletError::invalid("split outputs must have non-zero value"));
        }
        let target = per_output.mul_u64(count as u64);
        let selection = self.selector.select(&target, count, available)?;
        tracing::debug!(
            "split into {} x {:?} uses {} inputs, fee {:?}, change {:?}",
            count,
            per_output,
            selection.used.len(),
            selection.fee,
            selection.change
        );
        Ok(SplitPlan {
            count,
            per_output: per_output.clone(),
            selection,
        })
    }
}
