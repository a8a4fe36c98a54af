//! Prometheus exporter and RPC metrics.

use futures_util::future::BoxFuture;
use jsonrpsee::{MethodResponse, server::middleware::rpc::RpcServiceT, types::Request};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{
    net::SocketAddr,
    sync::Mutex,
    time::{Duration, Instant},
};

/// A [`jsonrpsee`] RPC middleware that records metrics for RPC methods.
#[derive(Debug, Clone)]
pub struct RpcMetricsService<S> {
    service: S,
}

impl<S> RpcMetricsService<S> {
    /// Create a new RPC middleware that records metrics for RPC methods.
    pub const fn new(inner: S) -> Self {
        Self { service: inner }
    }
}

impl<'a, S> RpcServiceT<'a> for RpcMetricsService<S>
where
    S: RpcServiceT<'a> + Send + Sync + Clone + 'static,
{
    type Future = BoxFuture<'a, MethodResponse>;

    fn call(&self, req: Request<'a>) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let method = req.method_name().to_string();
            let simulated = method.starts_with("sim_");
            let timer = Instant::now();
            let rp = service.call(req).await;
            let elapsed = timer.elapsed();

            if rp
                .as_error_code()
                .is_none_or(|code| code != jsonrpsee::types::error::METHOD_NOT_FOUND_CODE)
            {
                counter!(
                    "rpc.call.count",
                    "method" => method.clone(),
                    "mutation" => simulated.to_string(),
                    "code" => rp.as_error_code().unwrap_or_default().to_string()
                )
                .increment(1);

                histogram!("rpc.call.latency", "method" => method)
                    .record(elapsed.as_millis() as f64);
            }

            rp
        })
    }
}

/// Installs the Prometheus recorder and serves it on `metrics_addr`, returning a handle.
///
/// The recorder performs upkeep every 5 seconds. Calling this again returns the handle of the
/// already installed recorder.
pub fn setup_exporter(metrics_addr: impl Into<SocketAddr>) -> eyre::Result<PrometheusHandle> {
    static HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

    let mut lock = HANDLE.lock().map_err(|_| eyre::eyre!("metrics handle lock poisoned"))?;
    if let Some(handle) = &*lock {
        return Ok(handle.clone());
    }

    let addr: SocketAddr = metrics_addr.into();
    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .upkeep_timeout(Duration::from_secs(5))
        .build()?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|err| eyre::eyre!("could not set metrics recorder: {err}"))?;
    tokio::spawn(exporter);

    tracing::info!(target: "simstate::spawn", %addr, "Started metrics server");

    *lock = Some(handle.clone());

    Ok(handle)
}
