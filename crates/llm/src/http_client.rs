use std::time::Duration;

use config::TimeoutsConfig;
use http::{HeaderMap, HeaderValue, header::CONNECTION};
use reqwest::Client;

fn default_http_client_builder() -> reqwest::ClientBuilder {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    Client::builder()
        // Hyper connection pool only exposes two parameters max idle connections per host
        // and idle connection timeout. There is not TTL on the connections themselves to
        // force a refresh, necessary if the DNS changes its records. Somehow, even within
        // a benchmark ramping *up* traffic, we do pick up DNS changes by setting a pool
        // idle timeout of 5 seconds even though in theory no connection should be idle?
        // A bit confusing, and I suspect I don't fully understand how Hyper is managing
        // connections underneath. But seems like best choice we have right now, Grafbase
        // Gateway/Apollo Router use this same default value.
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .default_headers(headers)
}

/// Builds a client scoped to one provider's `TimeoutsConfig`. `connect` bounds connection
/// establishment; `read` bounds the gap between consecutive downstream bytes — both mapped
/// to the `timeout` error kind when exceeded (spec.md §5, §7).
pub(crate) fn build_client(timeouts: TimeoutsConfig) -> reqwest::Client {
    default_http_client_builder()
        .connect_timeout(Duration::from_millis(timeouts.connect_ms))
        .read_timeout(Duration::from_millis(timeouts.read_ms))
        .build()
        .expect("failed to build downstream HTTP client")
}
