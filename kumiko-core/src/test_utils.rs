//! Shared test utilities for `kumiko-core`.

use kumiko_test_support::proptest_profile::ProptestRunProfile;
use proptest::test_runner::Config as ProptestConfig;

/// Builds the proptest configuration shared by every property suite, so
/// `KUMIKO_PBT_CASES` and `KUMIKO_PBT_FORK` are interpreted in one place.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}
