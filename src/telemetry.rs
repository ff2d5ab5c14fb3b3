//! Tracing span/event conventions shared across the crate.
//!
//! This crate never installs a global subscriber itself — that's a decision for the binary or test
//! harness embedding it — but it standardizes the span names operations are instrumented under, so
//! a consumer's `tracing-subscriber` filter (`RUST_LOG=k9shard::kv=debug`) lines up with the module
//! layout.

/// Span name for a single KV store statement (`put`/`delete`/a read).
pub const SPAN_KV_STATEMENT: &str = "kv.statement";

/// Span name for one compliance transaction's lifetime (open through commit or rollback).
pub const SPAN_COMPLIANCE_TXN: &str = "compliance.transaction";

/// Span name for a dataflow [`crate::dataflow::future::Promise`] wait.
pub const SPAN_DATAFLOW_WAIT: &str = "dataflow.wait";

/// Installs a `tracing-subscriber` `fmt` layer filtered by `RUST_LOG` (default `info`), for use by
/// integration tests and examples that want readable output. Not compiled into the published
/// library surface.
#[cfg(test)]
pub fn init_for_tests() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_for_tests_does_not_panic_when_called_twice() {
        init_for_tests();
        init_for_tests();
    }
}
