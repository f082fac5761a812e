//! Integration tests for the quorum invoker.
//!
//! - `harness.rs`   - Recording/failing invokers and a scripted message source
//! - `fanout.rs`    - Quorum fan-out shape and submission counts
//! - `admission.rs` - Unbounded and threshold admission modes
//! - `shutdown.rs`  - Sentinel, threshold and malformed-input termination
//! - `end_to_end.rs` - Full pipeline over a real Unix socket

pub(crate) mod harness;
