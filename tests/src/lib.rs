//! # webext-rpc Test Suite
//!
//! Unified test crate for cross-realm choreography over the in-memory hub.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs     # ExtensionWorld fixture (hub + realms)
//!     ├── round_trip.rs  # call/response basics across realms
//!     ├── concurrency.rs # in-flight independence, reordering, noise
//!     ├── proxy.rs       # popup→tab relays through the background
//!     └── lifecycle.rs   # pause, deadlines, teardown, startup races
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p rpc-tests
//! ```

pub mod integration;
