use itertools::Itertools;
use num_bigint::BigUint;

use crate::currency::Currency;
use crate::encoding::{Encode, MAX_CURRENCY_WIDTH};
use crate::error::{WalletError, WalletResult};
use crate::types::{
    Hash256, PublicKey, SiacoinInput, SiacoinOutput, Transaction, TransactionSignature,
    UnlockConditions, UnlockHash, ValuedInput,
};

/// Estimates the serialized size of a transaction from its shape.
pub trait SizeEstimator {
    fn size(&self, num_inputs: usize, num_outputs: usize) -> u64;
}

impl<F> SizeEstimator for F
where
    F: Fn(usize, usize) -> u64,
{
    fn size(&self, num_inputs: usize, num_outputs: usize) -> u64 {
        self(num_inputs, num_outputs)
    }
}

/// `base + per_input * inputs + per_output * outputs`, with every constant
/// measured on the canonical encoding of a standard single-key spend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StandardSizeEstimator {
    pub base: u64,
    pub per_input: u64,
    pub per_output: u64,
}

impl Default for StandardSizeEstimator {
    fn default() -> Self {
        let widest = Currency::from(BigUint::from_bytes_be(&[0xff; MAX_CURRENCY_WIDTH]));
        let conditions = UnlockConditions::standard(PublicKey([0; 32]));

        let envelope = Transaction {
            miner_fees: vec![widest.clone()],
            ..Default::default()
        };
        let input = SiacoinInput {
            parent_id: Hash256::default(),
            unlock_conditions: conditions,
        };
        let mut signature = TransactionSignature::standard(Hash256::default());
        signature.signature = vec![0; 64];
        let output = SiacoinOutput {
            value: widest,
            unlock_hash: UnlockHash::default(),
        };

        Self {
            base: envelope.encoded_len() as u64,
            per_input: (input.encoded_len() + signature.encoded_len()) as u64,
            per_output: output.encoded_len() as u64,
        }
    }
}

impl SizeEstimator for StandardSizeEstimator {
    fn size(&self, num_inputs: usize, num_outputs: usize) -> u64 {
        self.base + self.per_input * num_inputs as u64 + self.per_output * num_outputs as u64
    }
}

/// Outcome of a successful funding attempt.
///
/// `sum(used) == target + fee + change` always holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub used: Vec<ValuedInput>,
    pub fee: Currency,
    pub change: Currency,
}

impl Selection {
    pub fn input_sum(&self) -> Currency {
        self.used.iter().map(|input| &input.value).sum()
    }

    pub fn inputs(&self) -> Vec<SiacoinInput> {
        self.used.iter().map(|input| input.input.clone()).collect()
    }
}

/// Picks inputs for a payment, pricing the fee per serialized byte.
pub struct CoinSelector<'a, E: SizeEstimator + ?Sized> {
    fee_per_byte: Currency,
    estimator: &'a E,
}

impl<'a, E: SizeEstimator + ?Sized> CoinSelector<'a, E> {
    pub fn new(fee_per_byte: Currency, estimator: &'a E) -> Self {
        Self {
            fee_per_byte,
            estimator,
        }
    }

    pub fn fee_per_byte(&self) -> &Currency {
        &self.fee_per_byte
    }

    /// Covers `target` plus the fee of a transaction with `fixed_outputs`
    /// outputs (and a change output when one turns out to be needed).
    ///
    /// Inputs are taken largest first, ties broken by ascending parent id.
    /// After the greedy pass the fee is re-priced exactly once for the
    /// change output; change too small to pay for its own output is folded
    /// into the fee instead.
    pub fn select(
        &self,
        target: &Currency,
        fixed_outputs: usize,
        available: &[ValuedInput],
    ) -> WalletResult<Selection> {
        let fee_for = |inputs: usize, outputs: usize| {
            self.fee_per_byte.mul_u64(self.estimator.size(inputs, outputs))
        };

        let mut used = Vec::new();
        let mut total = Currency::zero();
        let mut fee = Currency::zero();
        let mut covered = false;
        for input in sort_for_selection(available) {
            total += &input.value;
            used.push(input.clone());
            fee = fee_for(used.len(), fixed_outputs);
            if total >= target + &fee {
                covered = true;
                break;
            }
        }
        if !covered {
            tracing::debug!(
                "cannot cover {:?} plus fee with {} inputs totalling {:?}",
                target,
                available.len(),
                total
            );
            return Err(WalletError::InsufficientFunds);
        }

        let change = total.sub(&(target + &fee))?;
        if change.is_zero() {
            return Ok(Selection { used, fee, change });
        }

        let fee_with_change = fee_for(used.len(), fixed_outputs + 1);
        let (fee, change) = match total.checked_sub(&(target + &fee_with_change)) {
            Some(change) => (fee_with_change, change),
            None => (total.sub(target)?, Currency::zero()),
        };
        Ok(Selection { used, fee, change })
    }
}

/// Value descending, parent id ascending on ties.
pub fn sort_for_selection(available: &[ValuedInput]) -> Vec<&ValuedInput> {
    available
        .iter()
        .sorted_by(|a, b| {
            b.value
                .cmp(&a.value)
                .then_with(|| a.input.parent_id.cmp(&b.input.parent_id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::currency::Currency;
    use crate::error::WalletError;
    use crate::selection::{CoinSelector, Selection, SizeEstimator, StandardSizeEstimator};
    use crate::test_utils::{valued_input, valued_inputs};
    use crate::types::{
        Hash256, PublicKey, SiacoinInput, SiacoinOutput, Transaction, TransactionSignature,
        UnlockConditions,
    };
    use num_bigint::BigUint;

    fn linear(num_inputs: usize, num_outputs: usize) -> u64 {
        40 * num_inputs as u64 + 10 * num_outputs as u64 + 10
    }

    fn assert_balanced(selection: &Selection, target: u64) {
        assert_eq!(
            selection.input_sum(),
            Currency::from(target) + selection.fee.clone() + selection.change.clone()
        );
    }

    #[test]
    fn falls_through_to_second_input_and_reprices_for_change() {
        let available = valued_inputs(&[150, 80]);
        let estimator = linear;
        let selector = CoinSelector::new(Currency::from(1), &estimator);
        let selection = selector.select(&Currency::from(100), 1, &available).unwrap();

        // one input: 100 + 60 > 150; two inputs: 100 + 100 <= 230, change
        // output re-priced at size(2, 2) = 110
        assert_eq!(selection.used.len(), 2);
        assert_eq!(selection.fee, Currency::from(110));
        assert_eq!(selection.change, Currency::from(20));
        assert_balanced(&selection, 100);
    }

    #[test]
    fn change_that_cannot_pay_for_its_output_goes_to_fee() {
        let available = valued_inputs(&[165]);
        let estimator = linear;
        let selector = CoinSelector::new(Currency::from(1), &estimator);
        let selection = selector.select(&Currency::from(100), 1, &available).unwrap();

        assert_eq!(selection.used.len(), 1);
        assert_eq!(selection.fee, Currency::from(65));
        assert!(selection.change.is_zero());
        assert_balanced(&selection, 100);
    }

    #[test]
    fn exact_cover_has_no_change() {
        let available = valued_inputs(&[160, 5]);
        let estimator = linear;
        let selector = CoinSelector::new(Currency::from(1), &estimator);
        let selection = selector.select(&Currency::from(100), 1, &available).unwrap();

        assert_eq!(selection.used.len(), 1);
        assert_eq!(selection.fee, Currency::from(60));
        assert!(selection.change.is_zero());
    }

    #[test]
    fn insufficient_funds() {
        let available = valued_inputs(&[10, 20]);
        let estimator = linear;
        let selector = CoinSelector::new(Currency::from(1), &estimator);
        let err = selector
            .select(&Currency::from(100), 1, &available)
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds));

        let err = selector.select(&Currency::from(1), 1, &[]).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds));
    }

    #[test]
    fn zero_target_still_funds_the_fee() {
        let available = valued_inputs(&[5, 70]);
        let estimator = linear;
        let selector = CoinSelector::new(Currency::from(1), &estimator);
        let selection = selector.select(&Currency::zero(), 1, &available).unwrap();
        assert_eq!(selection.used.len(), 1);
        assert_eq!(selection.used[0].value, Currency::from(70));
        assert_balanced(&selection, 0);

        let free = CoinSelector::new(Currency::zero(), &estimator);
        let selection = free.select(&Currency::zero(), 1, &available).unwrap();
        assert_eq!(selection.used.len(), 1);
    }

    #[test]
    fn ties_are_broken_by_parent_id() {
        let available = vec![
            valued_input(2, 50),
            valued_input(1, 50),
            valued_input(3, 50),
        ];
        let mut reversed = available.clone();
        reversed.reverse();

        let estimator = linear;
        let selector = CoinSelector::new(Currency::zero(), &estimator);
        let first = selector.select(&Currency::from(40), 1, &available).unwrap();
        let second = selector.select(&Currency::from(40), 1, &reversed).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.used[0].input.parent_id, Hash256([1; 32]));
    }

    #[test]
    fn balance_holds_across_varied_sets() {
        let estimator = StandardSizeEstimator::default();
        let selector = CoinSelector::new(Currency::from(10), &estimator);
        let mut seed: u64 = 42;
        for _ in 0..25 {
            let values: Vec<u64> = (0..8)
                .map(|_| {
                    seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
                    (seed >> 33) % 100_000
                })
                .collect();
            let available = valued_inputs(&values);
            let target = values.iter().sum::<u64>() / 3;
            match selector.select(&Currency::from(target), 2, &available) {
                Ok(selection) => assert_balanced(&selection, target),
                Err(err) => assert!(matches!(err, WalletError::InsufficientFunds)),
            }
        }
    }

    #[test]
    fn standard_estimate_matches_encoding_of_widest_transaction() {
        let widest = Currency::from(BigUint::from_bytes_be(&[0xff; 16]));
        let conditions = UnlockConditions::standard(PublicKey([5; 32]));
        let txn = Transaction {
            siacoin_inputs: (0..2u8)
                .map(|i| SiacoinInput {
                    parent_id: Hash256([i; 32]),
                    unlock_conditions: conditions.clone(),
                })
                .collect(),
            siacoin_outputs: (0..3)
                .map(|_| SiacoinOutput {
                    value: widest.clone(),
                    unlock_hash: conditions.unlock_hash(),
                })
                .collect(),
            miner_fees: vec![widest.clone()],
            transaction_signatures: (0..2u8)
                .map(|i| {
                    let mut sig = TransactionSignature::standard(Hash256([i; 32]));
                    sig.signature = vec![1; 64];
                    sig
                })
                .collect(),
        };
        let estimator = StandardSizeEstimator::default();
        assert_eq!(estimator.size(2, 3), txn.encoded_size() as u64);
        assert_eq!(estimator.base, 104);
        assert_eq!(estimator.per_input, 313);
        assert_eq!(estimator.per_output, 56);
    }
}
