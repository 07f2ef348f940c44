//! Install the process tracer provider spans are reported to.
use anyhow::Context;
use anyhow::Result;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::Sampler;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;

use crate::conf::SamplerConf;
use crate::conf::TracingBackend;
use crate::conf::TracingConf;
use crate::errors::TraceInstallError;

/// Default OTLP collector endpoint.
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Keeps the installed tracer provider alive until spans are flushed.
#[must_use = "dropping the guard without calling shutdown may lose buffered spans"]
pub struct TracingGuard {
    provider: Option<SdkTracerProvider>,
}

impl TracingGuard {
    /// Check if this process owns the tracer provider.
    pub fn owns_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Flush buffered spans and shut the owned provider down.
    pub fn shutdown(mut self) -> Result<()> {
        if let Some(provider) = self.provider.take() {
            provider.shutdown()?;
        }
        Ok(())
    }
}

/// Install the global tracer provider described by the configuration.
///
/// With the `bridge` backend the application is expected to install its own provider
/// and this function does nothing.
pub fn install(conf: &TracingConf) -> Result<TracingGuard> {
    if conf.backend == TracingBackend::Bridge {
        return Ok(TracingGuard { provider: None });
    }

    let endpoint = conf
        .endpoint
        .clone()
        .unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_string());
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .build()
        .with_context(|| TraceInstallError::Exporter(endpoint.clone()))?;
    let resource = Resource::builder()
        .with_service_name(conf.service_name.clone())
        .build();
    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(sampler(&conf.sampler))
        .with_resource(resource)
        .build();
    opentelemetry::global::set_tracer_provider(provider.clone());
    Ok(TracingGuard {
        provider: Some(provider),
    })
}

/// Sampler for the configured strategy.
///
/// Root spans follow the configured strategy while child spans honour the parent decision.
/// Probabilities are clamped to the `[0, 1]` range.
pub fn sampler(conf: &SamplerConf) -> Sampler {
    let root = match conf {
        SamplerConf::Always => Sampler::AlwaysOn,
        SamplerConf::Never => Sampler::AlwaysOff,
        SamplerConf::Probabilistic { probability } => {
            let probability = if probability.is_nan() {
                0.0
            } else {
                probability.clamp(0.0, 1.0)
            };
            Sampler::TraceIdRatioBased(probability)
        }
    };
    Sampler::ParentBased(Box::new(root))
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::SamplingDecision;
    use opentelemetry::trace::SpanKind;
    use opentelemetry::trace::TraceId;
    use opentelemetry_sdk::trace::Sampler;
    use opentelemetry_sdk::trace::ShouldSample;

    use super::install;
    use super::sampler;
    use crate::conf::SamplerConf;
    use crate::conf::TracingBackend;
    use crate::conf::TracingConf;

    fn decision(sampler: &Sampler, trace_id: &str) -> SamplingDecision {
        let trace_id = TraceId::from_hex(trace_id).unwrap();
        sampler
            .should_sample(None, trace_id, "Find::app::users", &SpanKind::Client, &[], &[])
            .decision
    }

    const TRACE_LOW: &str = "00000000000000000000000000000001";
    const TRACE_HIGH: &str = "7fffffffffffffffffffffffffffffff";

    #[test]
    fn sampler_strategies() {
        let always = sampler(&SamplerConf::Always);
        assert_eq!(decision(&always, TRACE_LOW), SamplingDecision::RecordAndSample);
        assert_eq!(decision(&always, TRACE_HIGH), SamplingDecision::RecordAndSample);
        let never = sampler(&SamplerConf::Never);
        assert_eq!(decision(&never, TRACE_LOW), SamplingDecision::Drop);
        assert_eq!(decision(&never, TRACE_HIGH), SamplingDecision::Drop);
    }

    #[test]
    fn sampler_probability_is_clamped() {
        let above = sampler(&SamplerConf::Probabilistic { probability: 4.2 });
        assert_eq!(decision(&above, TRACE_LOW), SamplingDecision::RecordAndSample);
        assert_eq!(decision(&above, TRACE_HIGH), SamplingDecision::RecordAndSample);
        let below = sampler(&SamplerConf::Probabilistic { probability: -1.0 });
        assert_eq!(decision(&below, TRACE_LOW), SamplingDecision::Drop);
        assert_eq!(decision(&below, TRACE_HIGH), SamplingDecision::Drop);
    }

    #[test]
    fn sampler_probability_nan_never_samples() {
        let nan = sampler(&SamplerConf::Probabilistic {
            probability: f64::NAN,
        });
        assert_eq!(decision(&nan, TRACE_LOW), SamplingDecision::Drop);
        assert_eq!(decision(&nan, TRACE_HIGH), SamplingDecision::Drop);
    }

    #[test]
    fn bridge_backend_installs_nothing() {
        let conf = TracingConf {
            backend: TracingBackend::Bridge,
            ..TracingConf::default()
        };
        let guard = install(&conf).unwrap();
        assert!(!guard.owns_provider());
        guard.shutdown().unwrap();
    }

    #[tokio::test]
    async fn exporter_errors_keep_their_cause() {
        let conf = TracingConf {
            backend: TracingBackend::Agent,
            endpoint: Some("not a valid uri".to_string()),
            ..TracingConf::default()
        };
        let error = match install(&conf) {
            Ok(_) => panic!("install should fail for an invalid endpoint"),
            Err(error) => error,
        };
        assert!(error.to_string().contains("not a valid uri"));
        assert!(error.chain().count() > 1);
    }
}
