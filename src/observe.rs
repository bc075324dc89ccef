use std::time::Duration;

use crate::error::Error;

pub(crate) fn record_ok(command: &'static str, elapsed: Duration, result_pairs: usize) {
    let _ = (command, elapsed, result_pairs);

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("nxoob_exchanges_total", "command" => command, "outcome" => "ok")
            .increment(1);
        metrics::histogram!("nxoob_exchange_seconds", "command" => command)
            .record(elapsed.as_secs_f64());
    }

    #[cfg(feature = "tracing")]
    {
        tracing::debug!(
            command,
            result_pairs,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "oob command completed"
        );
    }
}

pub(crate) fn record_err(command: &'static str, elapsed: Duration, err: &Error) {
    let _ = (command, elapsed, err);

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("nxoob_exchanges_total", "command" => command, "outcome" => "err")
            .increment(1);
        metrics::counter!(
            "nxoob_exchange_errors_total",
            "command" => command,
            "kind" => err.kind()
        )
        .increment(1);
        metrics::histogram!("nxoob_exchange_seconds", "command" => command)
            .record(elapsed.as_secs_f64());
    }

    // Callers report the error themselves; this is diagnostic detail only.
    #[cfg(feature = "tracing")]
    {
        tracing::debug!(
            command,
            kind = err.kind(),
            error = %err,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "oob command failed"
        );
    }
}

pub(crate) fn insecure_server_trust(uri: &str) {
    let _ = uri;

    #[cfg(feature = "tracing")]
    tracing::warn!(
        uri,
        "server certificate is not verified; the module's identity is not authenticated"
    );
}

pub(crate) fn correlation_mismatch(expected: &str, echoed: &str) {
    let _ = (expected, echoed);

    #[cfg(feature = "metrics")]
    metrics::counter!("nxoob_correlation_mismatch_total").increment(1);

    #[cfg(feature = "tracing")]
    tracing::warn!(expected, echoed, "reply carries a different commandId");
}
