//! End-to-end loader scenarios.
//!
//! Each test builds a full [`DataLoader`](crate::loader::DataLoader) over
//! mocked ports (or a temp directory) and drives it through the public API.
//!
//! ```bash
//! cargo test -p grimoire-engine --lib e2e_tests
//! ```

mod e2e_helpers;
mod loading_tests;

pub use e2e_helpers::*;
