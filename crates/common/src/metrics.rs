use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, Encoder,
    HistogramVec, IntCounter, TextEncoder,
};

lazy_static! {
    // Order command metrics
    pub static ref ORDER_COMMAND_COUNTER: CounterVec = register_counter_vec!(
        "grocery_order_commands_total",
        "Total number of order commands processed",
        &["command", "status"]
    )
    .expect("metric cannot be created");

    pub static ref ORDER_COMMAND_DURATION: HistogramVec = register_histogram_vec!(
        "grocery_order_command_duration_seconds",
        "Order command processing duration in seconds",
        &["command"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("metric cannot be created");

    // Finalization metrics
    pub static ref FINALIZE_DURATION: HistogramVec = register_histogram_vec!(
        "grocery_order_finalize_duration_seconds",
        "Time spent reserving stock, redeeming the coupon and saving the order",
        &["status"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("metric cannot be created");

    pub static ref COMPENSATION_COUNTER: CounterVec = register_counter_vec!(
        "grocery_compensations_total",
        "Total number of finalization steps rolled back",
        &["step", "status"]
    )
    .expect("metric cannot be created");

    // Stock metrics
    pub static ref STOCK_REJECTIONS: IntCounter = register_int_counter!(
        "grocery_stock_rejections_total",
        "Total number of finalizations refused for insufficient stock"
    )
    .expect("metric cannot be created");

    pub static ref LOW_STOCK_WARNINGS: IntCounter = register_int_counter!(
        "grocery_low_stock_warnings_total",
        "Total number of times a product fell to its restock threshold"
    )
    .expect("metric cannot be created");
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one order command, labelled with the error kind on failure
pub fn record_command(command: &str, status: &str, duration_secs: f64) {
    ORDER_COMMAND_COUNTER
        .with_label_values(&[command, status])
        .inc();
    ORDER_COMMAND_DURATION
        .with_label_values(&[command])
        .observe(duration_secs);
}

pub fn record_finalization(success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    FINALIZE_DURATION
        .with_label_values(&[status])
        .observe(duration_secs);
}

pub fn record_compensation(step: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    COMPENSATION_COUNTER.with_label_values(&[step, status]).inc();
}

pub fn record_stock_rejection() {
    STOCK_REJECTIONS.inc();
}

pub fn record_low_stock() {
    LOW_STOCK_WARNINGS.inc();
}
