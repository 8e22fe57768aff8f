/*!
 * Tracing
 * Subscriber setup and load spans using the tracing crate
 */

use std::time::Instant;
use tracing::{info, span, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global tracing subscriber
///
/// Environment variables:
/// - RUST_LOG: log filter (default: info)
/// - ASSET_TRACE_JSON: JSON output when "1" or "true"
///
/// Returns false if a subscriber was already installed; calling it twice is
/// harmless.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("ASSET_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "tracing initialized");
    }
    installed
}

/// Span covering one loader run; records its duration and outcome on drop
pub struct LoadSpan {
    span: Span,
    start: Instant,
    failed: bool,
}

impl LoadSpan {
    pub fn new(path: &str, type_name: &str) -> Self {
        let span = span!(
            Level::DEBUG,
            "asset_load",
            path = path,
            type_name = type_name,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            failed: false,
        }
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn fail(&mut self) {
        self.failed = true;
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Drop for LoadSpan {
    fn drop(&mut self) {
        self.span.record("duration_us", self.elapsed_us());
        self.span
            .record("result", if self.failed { "failed" } else { "loaded" });
    }
}

/// Span for a loader run
#[inline]
pub fn span_load(path: &str, type_name: &str) -> LoadSpan {
    LoadSpan::new(path, type_name)
}
