// gore_server/server/src/core/invariant.rs

/// Reports a broken world invariant.
///
/// Always logs at `error` level and bumps `world_invariant_violations_total`.
/// Panics when built with the `strict-invariants` feature.
#[macro_export]
macro_rules! invariant_violation {
    ($($arg:tt)+) => {{
        ::tracing::error!(target: "gore_server_core::invariant", $($arg)+);
        ::metrics::counter!("world_invariant_violations_total").increment(1);
        if cfg!(feature = "strict-invariants") {
            panic!($($arg)+);
        }
    }};
}
