//! Cross-realm integration tests.

#[cfg(test)]
pub mod support;

mod concurrency;
mod proxy;
