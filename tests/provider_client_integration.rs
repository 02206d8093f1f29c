//! Exercises `ProviderClient` against an HTTP-level mock, the way a real
//! upstream dependency would be tested: no internal mocking, just stub
//! responses on the wire.

use events_marketplace_backend::config::{BreakerConfig, ProviderConfig, RetryConfig};
use events_marketplace_backend::provider::{EventProvider, ProviderClient};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_cfg(base_url: String) -> ProviderConfig {
    ProviderConfig {
        base_url,
        timeout_ms: 2000,
        retry: RetryConfig {
            max_attempts: 2,
            wait_ms: 10,
            multiplier: 2.0,
        },
        breaker: BreakerConfig {
            window: 10,
            threshold_pct: 50,
            min_calls: 5,
            open_ms: 1000,
        },
    }
}

const SAMPLE_XML: &str = r#"
<planList>
  <output>
    <base_plan title="Concert Madrid" sell_mode="online">
      <plan plan_start_date="2024-12-15T20:00:00" plan_end_date="2024-12-15T23:00:00">
        <zone price="25.0" capacity="10"/>
        <zone price="50.0" capacity="5"/>
      </plan>
    </base_plan>
    <base_plan title="Offline show" sell_mode="offline">
      <plan plan_start_date="2024-12-20T20:00:00" plan_end_date="2024-12-20T23:00:00"/>
    </base_plan>
  </output>
</planList>
"#;

#[tokio::test]
async fn fetches_and_maps_online_events_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_XML))
        .mount(&server)
        .await;

    let client = ProviderClient::new(provider_cfg(server.uri()));
    let events = client.fetch_online_events().await.unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Concert Madrid");
    assert_eq!(events[0].min_price, 2500);
    assert_eq!(events[0].max_price, 5000);
}

#[tokio::test]
async fn transport_failure_after_retries_surfaces_as_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = ProviderClient::new(provider_cfg(server.uri()));
    let result = client.fetch_online_events().await;

    assert!(result.is_err());
}
