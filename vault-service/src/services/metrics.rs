use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static LOGIN_ATTEMPTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static TOKEN_VALIDATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static FEDERATED_EXCHANGES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub fn init_metrics() {
    let registry = Registry::new();

    let login_attempts = match IntCounterVec::new(
        Opts::new("vault_login_attempts_total", "Login attempts by method"),
        &["method", "outcome"],
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create vault_login_attempts_total metric: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    let token_validations = match IntCounterVec::new(
        Opts::new(
            "vault_token_validations_total",
            "Bearer token validations at the request guard",
        ),
        &["outcome"],
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create vault_token_validations_total metric: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    let federated_exchanges = match IntCounterVec::new(
        Opts::new(
            "vault_federated_exchanges_total",
            "Federated code exchanges by provider",
        ),
        &["provider", "outcome"],
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!(
                "Failed to create vault_federated_exchanges_total metric: {}",
                e
            );
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    for collector in [&login_attempts, &token_validations, &federated_exchanges] {
        if let Err(e) = registry.register(Box::new(collector.clone())) {
            tracing::error!("Failed to register metrics collector: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    }

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = LOGIN_ATTEMPTS_TOTAL.set(login_attempts);
    let _ = TOKEN_VALIDATIONS_TOTAL.set(token_validations);
    let _ = FEDERATED_EXCHANGES_TOTAL.set(federated_exchanges);
}

pub fn record_login(method: &str, success: bool) {
    if let Some(counter) = LOGIN_ATTEMPTS_TOTAL.get() {
        counter
            .with_label_values(&[method, outcome(success)])
            .inc();
    }
}

pub fn record_token_validation(success: bool) {
    if let Some(counter) = TOKEN_VALIDATIONS_TOTAL.get() {
        counter.with_label_values(&[outcome(success)]).inc();
    }
}

pub fn record_federated_exchange(provider: &str, success: bool) {
    if let Some(counter) = FEDERATED_EXCHANGES_TOTAL.get() {
        counter
            .with_label_values(&[provider, outcome(success)])
            .inc();
    }
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

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
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
