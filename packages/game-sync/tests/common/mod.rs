#![allow(dead_code)]

// Logging is auto-installed for every test binary
#[ctor::ctor]
fn init_logging() {
    sync_test_support::logging::init();
}

// PROPTEST_CASES overrides the number of cases per property (default 64).
pub fn proptest_config() -> proptest::prelude::ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(64)
        .max(1);

    proptest::prelude::ProptestConfig {
        failure_persistence: None,
        cases,
        ..proptest::prelude::ProptestConfig::default()
    }
}
