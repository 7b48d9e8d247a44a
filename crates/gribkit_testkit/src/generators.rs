//! Property-based test generators using proptest.

use proptest::prelude::*;

/// Strategy for forecast step lists, as they appear in `stepRange`.
///
/// Steps are multiples of six hours up to ten days and may repeat.
pub fn step_list_strategy(max_len: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec((0u32..=40).prop_map(|n| (n * 6).to_string()), 0..=max_len)
}

/// Strategy for grid value arrays.
pub fn values_strategy(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e6f64..1.0e6, 1..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn steps_are_six_hourly(steps in step_list_strategy(8)) {
            prop_assert!(steps.len() <= 8);
            for step in &steps {
                let hours: u32 = step.parse().unwrap();
                prop_assert_eq!(hours % 6, 0);
            }
        }
    }
}
