//! Prometheus metrics for agent-service.
//!
//! Provides chat and model-provider metrics for observability.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::{Once, OnceLock};

static INIT: Once = Once::new();

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Chat metrics
pub static CHAT_TURNS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static SESSIONS_ACTIVE: OnceLock<IntGauge> = OnceLock::new();

// Provider metrics
pub static PROVIDER_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static PROVIDER_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static TOKENS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Later calls are no-ops.
pub fn init_metrics() {
    INIT.call_once(register_metrics);
}

fn register_metrics() {
    let registry = Registry::new();

    // Chat turn counter by outcome: reply, fallback, empty
    let chat_turns = IntCounterVec::new(
        Opts::new("agent_chat_turns_total", "Total completed chat turns"),
        &["outcome"],
    )
    .expect("Failed to create agent_chat_turns_total metric");

    let sessions_active = IntGauge::new(
        "agent_sessions_active",
        "Number of conversation sessions held in memory",
    )
    .expect("Failed to create agent_sessions_active metric");

    // Provider latency histogram
    let provider_latency = HistogramVec::new(
        HistogramOpts::new(
            "agent_provider_latency_seconds",
            "Chat model API latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["provider", "model"],
    )
    .expect("Failed to create agent_provider_latency_seconds metric");

    // Provider error counter
    let provider_errors = IntCounterVec::new(
        Opts::new("agent_provider_errors_total", "Total chat model errors"),
        &["provider", "error_type"],
    )
    .expect("Failed to create agent_provider_errors_total metric");

    // Token counter (input/output by model)
    let tokens = IntCounterVec::new(
        Opts::new("agent_tokens_total", "Total tokens processed"),
        &["model", "type"], // type: input, output
    )
    .expect("Failed to create agent_tokens_total metric");

    // Register all metrics
    registry
        .register(Box::new(chat_turns.clone()))
        .expect("Failed to register agent_chat_turns_total");
    registry
        .register(Box::new(sessions_active.clone()))
        .expect("Failed to register agent_sessions_active");
    registry
        .register(Box::new(provider_latency.clone()))
        .expect("Failed to register agent_provider_latency_seconds");
    registry
        .register(Box::new(provider_errors.clone()))
        .expect("Failed to register agent_provider_errors_total");
    registry
        .register(Box::new(tokens.clone()))
        .expect("Failed to register agent_tokens_total");

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = CHAT_TURNS_TOTAL.set(chat_turns);
    let _ = SESSIONS_ACTIVE.set(sessions_active);
    let _ = PROVIDER_LATENCY_SECONDS.set(provider_latency);
    let _ = PROVIDER_ERRORS_TOTAL.set(provider_errors);
    let _ = TOKENS_TOTAL.set(tokens);

    tracing::info!("Prometheus metrics initialized");
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

// Helper functions for recording metrics

/// Record a finished chat turn.
pub fn record_chat_turn(outcome: &str) {
    if let Some(counter) = CHAT_TURNS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Publish the current number of sessions.
pub fn set_sessions_active(count: usize) {
    if let Some(gauge) = SESSIONS_ACTIVE.get() {
        gauge.set(count as i64);
    }
}

/// Record provider latency.
pub fn record_provider_latency(provider: &str, model: &str, duration_secs: f64) {
    if let Some(histogram) = PROVIDER_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[provider, model])
            .observe(duration_secs);
    }
}

/// Record a provider error.
pub fn record_provider_error(provider: &str, error_type: &str) {
    if let Some(counter) = PROVIDER_ERRORS_TOTAL.get() {
        counter.with_label_values(&[provider, error_type]).inc();
    }
}

/// Record token usage.
pub fn record_tokens(model: &str, input_tokens: i32, output_tokens: i32) {
    if let Some(counter) = TOKENS_TOTAL.get() {
        counter
            .with_label_values(&[model, "input"])
            .inc_by(input_tokens.max(0) as u64);
        counter
            .with_label_values(&[model, "output"])
            .inc_by(output_tokens.max(0) as u64);
    }
}
