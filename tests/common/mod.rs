#![allow(dead_code)]

use range_lmsr::fixed::{wmul, WAD};
use range_lmsr::LazyMulTree;

pub fn uniform_tree(size: u32) -> LazyMulTree {
    LazyMulTree::with_size(size).expect("tree initialises")
}

/// Naive per-bin model: every bin scaled independently.
pub fn apply_to_model(model: &mut [u128], lo: u32, hi: u32, factor: u128) {
    for weight in &mut model[lo as usize..=hi as usize] {
        *weight = wmul(*weight, factor).expect("model weight fits");
    }
}

pub fn model_sum(model: &[u128], lo: u32, hi: u32) -> u128 {
    model[lo as usize..=hi as usize].iter().sum()
}

/// Tolerance of `relative` parts per 1e18 of `expected`, floored at `absolute` units.
pub fn tolerance(expected: u128, relative: u128, absolute: u128) -> u128 {
    (expected / WAD * relative).max(absolute)
}

pub fn assert_close(actual: u128, expected: u128, tolerance: u128, what: &str) {
    let diff = actual.abs_diff(expected);
    assert!(
        diff <= tolerance,
        "{}: {} vs {} (diff {} > {})",
        what,
        actual,
        expected,
        diff,
        tolerance
    );
}
