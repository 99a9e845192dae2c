use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{Mutex, OnceLock};

static INIT_LOCK: Mutex<()> = Mutex::new(());

pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static OTP_CODES_ISSUED_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static OTP_VERIFICATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static OTP_CODES_PURGED_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Outcome label for `otp_verifications_total`.
#[derive(Debug, Clone, Copy)]
pub enum VerificationOutcome {
    Success,
    Rejected,
    Error,
}

impl VerificationOutcome {
    fn as_str(self) -> &'static str {
        match self {
            VerificationOutcome::Success => "success",
            VerificationOutcome::Rejected => "rejected",
            VerificationOutcome::Error => "error",
        }
    }
}

/// Build and register every collector. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;
    let request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;
    let issued = IntCounter::new("otp_codes_issued_total", "Login codes emailed to brands")?;
    let verifications = IntCounterVec::new(
        Opts::new("otp_verifications_total", "Login code verification attempts"),
        &["outcome"],
    )?;
    let purged = IntCounter::new("otp_codes_purged_total", "Expired login codes deleted")?;

    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(request_duration.clone()))?;
    registry.register(Box::new(issued.clone()))?;
    registry.register(Box::new(verifications.clone()))?;
    registry.register(Box::new(purged.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = OTP_CODES_ISSUED_TOTAL.set(issued);
    let _ = OTP_VERIFICATIONS_TOTAL.set(verifications);
    let _ = OTP_CODES_PURGED_TOTAL.set(purged);

    Ok(())
}

pub fn record_http_request(method: &str, path: &str, status: &str, seconds: f64) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, path, status]).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[method, path, status])
            .observe(seconds);
    }
}

pub fn record_code_issued() {
    if let Some(counter) = OTP_CODES_ISSUED_TOTAL.get() {
        counter.inc();
    }
}

pub fn record_verification(outcome: VerificationOutcome) {
    if let Some(counter) = OTP_VERIFICATIONS_TOTAL.get() {
        counter.with_label_values(&[outcome.as_str()]).inc();
    }
}

pub fn record_purged(count: u64) {
    if let Some(counter) = OTP_CODES_PURGED_TOTAL.get() {
        counter.inc_by(count);
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

    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to UTF-8: {}", e);
        format!("# Failed to convert metrics to UTF-8: {}\n", e)
    })
}
