//
// lib.rs
//
// Library root: copybook expansion, the analysis tree and the variable model.
// The `heron` binary in main.rs is a thin CLI over these modules.
//

pub mod analysis;
pub mod cli;
pub mod config;
pub mod copybook;
pub mod diagnostic;
pub mod locality;
pub mod perf;
// test_utils is available in test builds and when the `test-support` feature is enabled.
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod tree;
pub mod utf16;
pub mod variables;
