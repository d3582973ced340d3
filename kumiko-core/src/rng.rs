//! Seed derivation for independent per-seed-point random streams.

/// SplitMix64 increment, the 64-bit golden ratio.
const SEED_SPACING: u64 = 0x9E37_79B9_7F4A_7C15;
const SPLITMIX_MULT_A: u64 = 0xBF58_476D_1CE4_E5B9;
const SPLITMIX_MULT_B: u64 = 0x94D0_49BB_1331_11EB;

/// Derives the stream seed for the seed point at `index` from `base_seed`.
#[inline]
pub(crate) fn seed_point_seed(base_seed: u64, index: usize) -> u64 {
    splitmix64(base_seed ^ ((index as u64).wrapping_add(1)).wrapping_mul(SEED_SPACING))
}

#[inline]
fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(SEED_SPACING);
    state = (state ^ (state >> 30)).wrapping_mul(SPLITMIX_MULT_A);
    state = (state ^ (state >> 27)).wrapping_mul(SPLITMIX_MULT_B);
    state ^ (state >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    #[test]
    fn neighbouring_indices_get_distinct_seeds() {
        let seeds: HashSet<u64> = (0..256).map(|index| seed_point_seed(7, index)).collect();
        assert_eq!(seeds.len(), 256);
    }

    #[test]
    fn derivation_is_stable() {
        assert_eq!(seed_point_seed(42, 3), seed_point_seed(42, 3));
        assert_ne!(seed_point_seed(42, 3), seed_point_seed(43, 3));
    }
}
