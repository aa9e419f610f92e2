//! Weighted slot allocation
//!
//! Expands a snapshot's (validator, stake) pairs into a fixed-length roster
//! where each validator occupies a share of slots proportional to its stake.

use lib_types::{Address, Amount};
use std::cmp::Reverse;

/// Length of every non-empty roster
pub const VALIDATOR_SLOTS: usize = 100;

/// Slot count per validator, parallel to the inputs.
///
/// Each validator gets `floor(VALIDATOR_SLOTS * stake / total)` slots. Slots
/// left over from flooring go one each to the largest remainders, ties broken
/// by ascending address. Returns all zeros when the total stake is zero.
pub fn slot_counts(validators: &[Address], stakes: &[Amount]) -> Vec<usize> {
    let len = validators.len().min(stakes.len());
    let (stakes, total) = scaled_stakes(&stakes[..len]);
    let mut counts = vec![0usize; len];
    if total == 0 {
        return counts;
    }

    let slots = VALIDATOR_SLOTS as u128;
    let mut remainders = Vec::with_capacity(len);
    let mut assigned = 0usize;
    for (i, stake) in stakes.iter().enumerate() {
        let exact = slots * stake;
        counts[i] = (exact / total) as usize;
        assigned += counts[i];
        remainders.push((exact % total, i));
    }

    remainders.sort_by_key(|(rem, i)| (Reverse(*rem), validators[*i]));
    for (_, i) in remainders.into_iter().take(VALIDATOR_SLOTS - assigned) {
        counts[i] += 1;
    }
    counts
}

/// Weighted roster: validators in input order, each repeated by its slot count
pub fn allocate_slots(validators: &[Address], stakes: &[Amount]) -> Vec<Address> {
    let counts = slot_counts(validators, stakes);
    let mut roster = Vec::with_capacity(VALIDATOR_SLOTS);
    for (validator, count) in validators.iter().zip(counts) {
        roster.extend(std::iter::repeat(*validator).take(count));
    }
    roster
}

/// Shift stakes right until their sum times VALIDATOR_SLOTS fits in u128
fn scaled_stakes(stakes: &[Amount]) -> (Vec<Amount>, Amount) {
    let mut shift = 0u32;
    loop {
        let scaled: Vec<Amount> = stakes.iter().map(|s| s >> shift).collect();
        let total = scaled
            .iter()
            .try_fold(0u128, |acc, s| acc.checked_add(*s))
            .filter(|t| t.checked_mul(VALIDATOR_SLOTS as u128).is_some());
        match total {
            Some(total) => return (scaled, total),
            None => shift += 1,
        }
    }
}
