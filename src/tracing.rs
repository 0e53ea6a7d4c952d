//! Tracing subscriber setup.
//!
//! Structured logging for the whole service, access entries included. The
//! fmt layer carries file names and line numbers; the default level is INFO
//! so access-log events and sweep summaries show up without drowning the
//! output in per-request debug noise.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    Layer, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Initializes the global tracing subscriber with formatted output.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_file(true)
                .with_line_number(true)
                .with_level(true)
                .with_filter(LevelFilter::INFO),
        )
        .init();
}
