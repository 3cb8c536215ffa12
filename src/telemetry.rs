//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives). When it
//!   is unset the default is
//!   "info,exam=debug,llm=info,ielts_backend=debug,tower_http=info,axum=info".
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Targets in use: `ielts_backend` (server plumbing), `exam` (session flow),
//! `llm` (model calls). Tower HTTP TraceLayer adds per-request spans on top.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,exam=debug,llm=info,ielts_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // Choose JSON vs pretty; don't try to store different layer types.
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse_and_are_documented() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVES).is_ok());
        assert!(DEFAULT_DIRECTIVES.contains("llm=info"));
        assert!(include_str!("telemetry.rs").contains(&format!("//!   \"{}\".", DEFAULT_DIRECTIVES)));
    }
}
