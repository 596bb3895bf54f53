// src/db/monitoring.rs

use std::future::Future;
use std::time::Instant;

use log::{debug, error};
use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Метрики операций хранилища
pub struct StoreMetrics {
    registry: Registry,
    operations: IntCounterVec,
    duration: HistogramVec,
}

impl StoreMetrics {
    fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let operations = IntCounterVec::new(
            Opts::new(
                "contact_store_operations_total",
                "Total number of contact store operations",
            ),
            &["operation", "outcome"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "contact_store_operation_duration_seconds",
                "Duration of contact store operations in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["operation"],
        )?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            operations,
            duration,
        })
    }
}

// Если метрики не поднялись, хранилище работает без них.
static METRICS: Lazy<Option<StoreMetrics>> = Lazy::new(|| match StoreMetrics::new() {
    Ok(metrics) => Some(metrics),
    Err(e) => {
        error!("Failed to create store metrics: {e}");
        None
    }
});

/// Функция-обёртка для выполнения операции с базой и сбора метрик.
pub async fn measure_db_operation<F, T, E>(operation: &str, f: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = f.await;
    let secs = start.elapsed().as_secs_f64();

    if let Some(metrics) = METRICS.as_ref() {
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics
            .operations
            .with_label_values(&[operation, outcome])
            .inc();
        metrics
            .duration
            .with_label_values(&[operation])
            .observe(secs);
    }

    debug!("DB operation {} took {:.4} seconds", operation, secs);
    result
}

/// Экспорт метрик в текстовом формате Prometheus
pub fn gather_metrics() -> String {
    let Some(metrics) = METRICS.as_ref() else {
        return String::new();
    };
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metrics.registry.gather(), &mut buffer) {
        error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_measure_records_outcome() {
        let ok: Result<i32, String> = measure_db_operation("test_ok", async { Ok(1) }).await;
        let err: Result<i32, String> =
            measure_db_operation("test_err", async { Err("boom".to_string()) }).await;

        assert_eq!(ok, Ok(1));
        assert_eq!(err, Err("boom".to_string()));

        let text = gather_metrics();
        assert!(text.contains("contact_store_operations_total"));
        assert!(text.contains(r#"operation="test_ok""#));
        assert!(text.contains(r#"outcome="error""#));
        assert!(text.contains("contact_store_operation_duration_seconds"));
    }
}
