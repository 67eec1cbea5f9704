//! libFuzzer target for the tree API interpreter
//!
//! Any leak, dangling handle or allocation-failure mismatch found by the
//! interpreter is turned into a crash.
//!
//! Run with: cargo +nightly fuzz run api

#![no_main]

use arbor_vm::{VmConfig, run};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = VmConfig::default();
    if let Err(e) = run(data, &config) {
        panic!("{e}");
    }
});
