use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub calls_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
    pub overtime_returns_total: IntCounter,
    pub couriers_available: IntGaugeVec,
    pub poll_cycles_total: IntCounter,
    pub poll_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let calls_total = IntCounterVec::new(
            Opts::new("calls_total", "Total call-next invocations by outcome"),
            &["outcome"],
        )
        .expect("valid calls_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Total notification sends by outcome"),
            &["outcome"],
        )
        .expect("valid notifications_total metric");

        let overtime_returns_total = IntCounter::new(
            "overtime_returns_total",
            "Couriers force-returned by the overtime failsafe",
        )
        .expect("valid overtime_returns_total metric");

        let couriers_available = IntGaugeVec::new(
            Opts::new("couriers_available", "Couriers in the available queue"),
            &["unit"],
        )
        .expect("valid couriers_available metric");

        let poll_cycles_total = IntCounter::new("poll_cycles_total", "Completed poll cycles")
            .expect("valid poll_cycles_total metric");

        let poll_duration_seconds = Histogram::with_opts(prometheus::HistogramOpts::new(
            "poll_duration_seconds",
            "Duration of a full poll cycle in seconds",
        ))
        .expect("valid poll_duration_seconds metric");

        registry
            .register(Box::new(calls_total.clone()))
            .expect("register calls_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(overtime_returns_total.clone()))
            .expect("register overtime_returns_total");
        registry
            .register(Box::new(couriers_available.clone()))
            .expect("register couriers_available");
        registry
            .register(Box::new(poll_cycles_total.clone()))
            .expect("register poll_cycles_total");
        registry
            .register(Box::new(poll_duration_seconds.clone()))
            .expect("register poll_duration_seconds");

        Self {
            registry,
            calls_total,
            notifications_total,
            overtime_returns_total,
            couriers_available,
            poll_cycles_total,
            poll_duration_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
