//! Delivery of the single callback report for a task.
//!
//! Inside a container, `localhost` means the container itself, so loopback
//! callback hosts are swapped for the host gateway alias before sending.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{error, info, instrument, warn};
use url::{Host, Url};

use crate::config::Config;
use crate::error::DeliveryError;
use crate::models::CallbackPayload;
use crate::utils::truncate_for_log;

/// True for hosts that refer to the local machine.
pub fn is_loopback_alias(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(name) => {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            name == "localhost" || name.ends_with(".localhost")
        }
        Host::Ipv4(ip) => ip.is_loopback() || ip.is_unspecified(),
        Host::Ipv6(ip) => ip.is_loopback() || ip.is_unspecified(),
    }
}

/// The address the callback should actually be sent to.
///
/// Only loopback hosts are replaced, and only when `containerized`. Port, path
/// and query are preserved. Applying it twice gives the same result.
pub fn resolve_address(address: &Url, containerized: bool, gateway_alias: &str) -> Url {
    if !containerized {
        return address.clone();
    }
    let Some(host) = address.host() else {
        return address.clone();
    };
    if !is_loopback_alias(&host) {
        return address.clone();
    }

    let mut resolved = address.clone();
    let replaced = match gateway_alias.parse::<IpAddr>() {
        Ok(ip) => resolved.set_ip_host(ip).map_err(|_| ()),
        Err(_) => resolved.set_host(Some(gateway_alias)).map_err(|_| ()),
    };
    match replaced {
        Ok(()) => resolved,
        Err(()) => {
            warn!(%gateway_alias, "Gateway alias is not a valid host; keeping callback address");
            address.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallbackReporter {
    client: Client,
    timeout: Duration,
    containerized: bool,
    gateway_alias: String,
}

impl CallbackReporter {
    pub fn new(client: Client, timeout: Duration, containerized: bool, gateway_alias: String) -> Self {
        Self {
            client,
            timeout,
            containerized,
            gateway_alias,
        }
    }

    pub fn from_config(config: &Config, client: Client) -> Self {
        let containerized = config.network.is_containerized();
        let gateway_alias = config.network.gateway_alias();
        info!(containerized, %gateway_alias, "Callback reporter ready");
        Self::new(client, config.callback_timeout(), containerized, gateway_alias)
    }

    pub fn resolve(&self, address: &Url) -> Url {
        resolve_address(address, self.containerized, &self.gateway_alias)
    }

    /// Send the report once. Failures are logged, never returned.
    #[instrument(level = "info", skip_all, fields(task_id = %payload.task_id(), status = ?payload.status()))]
    pub async fn deliver(&self, address: &Url, payload: &CallbackPayload) {
        let t0 = Instant::now();
        match self.try_deliver(address, payload).await {
            Ok(resolved) => info!(
                url = %resolved,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Callback delivered"
            ),
            Err(e) => error!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                error = %e,
                "Callback delivery failed"
            ),
        }
    }

    /// One POST with the payload as JSON. Returns the address actually used.
    pub async fn try_deliver(
        &self,
        address: &Url,
        payload: &CallbackPayload,
    ) -> Result<Url, DeliveryError> {
        let resolved = self.resolve(address);
        if resolved != *address {
            info!(original = %address, resolved = %resolved, "Rewrote loopback callback host");
        }

        let response = self
            .client
            .post(resolved.clone())
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|source| DeliveryError::Request {
                url: resolved.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                url: resolved.to_string(),
                status: status.as_u16(),
                body: truncate_for_log(&body, 500),
            });
        }
        Ok(resolved)
    }
}
