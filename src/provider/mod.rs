pub mod breaker;
pub mod client;
pub mod mapper;
pub mod xml;

pub use client::ProviderClient;

use async_trait::async_trait;

use crate::domain::Event;
use crate::error::ProviderError;

/// A source of the upstream event catalog. `ProviderClient` is the real
/// HTTP-backed implementation; tests use an in-memory fake.
#[async_trait]
pub trait EventProvider: Send + Sync {
    async fn fetch_online_events(&self) -> Result<Vec<Event>, ProviderError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeProvider {
        pub events: Mutex<Vec<Event>>,
    }

    impl FakeProvider {
        pub fn new(events: Vec<Event>) -> Self {
            Self {
                events: Mutex::new(events),
            }
        }
    }

    #[async_trait]
    impl EventProvider for FakeProvider {
        async fn fetch_online_events(&self) -> Result<Vec<Event>, ProviderError> {
            Ok(self.events.lock().clone())
        }
    }
}
