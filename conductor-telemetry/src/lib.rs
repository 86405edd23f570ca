// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Conductor telemetry (metrics + tracing + logging).
//!
//! The hook pipeline, plugin router and step executor all report through the
//! [`Metrics`] registry defined here. Binaries call [`init_telemetry`] once at
//! startup; libraries and tests can use [`Metrics::global`], which records
//! against whatever meter provider is installed (a no-op by default).

pub mod config;

use opentelemetry::{
    metrics::{Counter, Histogram, Meter, MeterProvider},
    KeyValue,
};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::{LogFormat, TelemetryConfig};

/// Instrumentation scope used for every Conductor instrument.
pub const METER_NAME: &str = "conductor";

/// Metrics registry.
pub struct Metrics {
    pub pipeline_invocations: Counter<u64>,
    pub pipeline_cancellations: Counter<u64>,
    pub pipeline_duration_ms: Histogram<f64>,
    pub plugin_loads: Counter<u64>,
    pub plugin_load_failures: Counter<u64>,
    pub steps_executed: Counter<u64>,
    pub step_duration_ms: Histogram<f64>,
}

impl Metrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            pipeline_invocations: meter
                .u64_counter("conductor.pipeline.invocations")
                .with_description("Guarded operations that ran through the hook pipeline")
                .init(),
            pipeline_cancellations: meter
                .u64_counter("conductor.pipeline.cancellations")
                .with_description("Guarded operations cancelled by a before hook")
                .init(),
            pipeline_duration_ms: meter
                .f64_histogram("conductor.pipeline.duration_ms")
                .with_description("Hook pipeline duration in milliseconds")
                .init(),
            plugin_loads: meter
                .u64_counter("conductor.plugins.loads")
                .with_description("Plugins materialised by a loader")
                .init(),
            plugin_load_failures: meter
                .u64_counter("conductor.plugins.load_failures")
                .with_description("Plugin loads that failed")
                .init(),
            steps_executed: meter
                .u64_counter("conductor.steps.executed")
                .with_description("Workflow steps executed")
                .init(),
            step_duration_ms: meter
                .f64_histogram("conductor.steps.duration_ms")
                .with_description("Workflow step duration in milliseconds")
                .init(),
        }
    }

    /// Metrics bound to the global meter provider.
    pub fn global() -> Self {
        Self::new(&opentelemetry::global::meter(METER_NAME))
    }

    pub fn record_pipeline(&self, domain: &str, duration_ms: f64) {
        let attrs = [KeyValue::new("domain", domain.to_string())];
        self.pipeline_invocations.add(1, &attrs);
        self.pipeline_duration_ms.record(duration_ms, &attrs);
    }

    pub fn record_pipeline_cancelled(&self, domain: &str) {
        self.pipeline_cancellations
            .add(1, &[KeyValue::new("domain", domain.to_string())]);
    }

    pub fn record_plugin_load(&self, kind: &str, success: bool) {
        let attrs = [KeyValue::new("kind", kind.to_string())];
        if success {
            self.plugin_loads.add(1, &attrs);
        } else {
            self.plugin_load_failures.add(1, &attrs);
        }
    }

    pub fn record_step(&self, kind: &str, success: bool, duration_ms: f64) {
        let attrs = [
            KeyValue::new("kind", kind.to_string()),
            KeyValue::new("success", success),
        ];
        self.steps_executed.add(1, &attrs);
        self.step_duration_ms.record(duration_ms, &attrs);
    }
}

/// Initialize telemetry (tracing + metrics).
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<Metrics> {
    let service_name = config.service_name.clone();

    let tracer_provider = if let Some(endpoint) = config.otlp_endpoint.as_deref() {
        opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
            .with_trace_config(
                opentelemetry_sdk::trace::Config::default().with_resource(
                    opentelemetry_sdk::Resource::new(vec![KeyValue::new(
                        "service.name",
                        service_name.clone(),
                    )]),
                ),
            )
            .install_batch(opentelemetry_sdk::runtime::Tokio)?
    } else {
        opentelemetry_sdk::trace::TracerProvider::builder().build()
    };

    let tracer = tracer_provider.tracer(service_name.clone());
    opentelemetry::global::set_tracer_provider(tracer_provider);

    let meter_provider = if let Some(endpoint) = config.otlp_endpoint.as_deref() {
        opentelemetry_otlp::new_pipeline()
            .metrics(opentelemetry_sdk::runtime::Tokio)
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
            .build()?
    } else {
        SdkMeterProvider::default()
    };

    let meter = meter_provider.meter(service_name);
    let metrics = Metrics::new(&meter);
    opentelemetry::global::set_meter_provider(meter_provider);

    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with(otel_layer);

    match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?,
    }

    Ok(metrics)
}
