pub mod error;
pub mod plug;
pub mod telemetry;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::models::Reading;

pub use error::NetworkError;
pub use plug::KasaPlug;
pub use telemetry::HttpTelemetry;

/// An on/off device reachable over the network.
#[async_trait]
pub trait Actuator: Send {
    fn address(&self) -> &str;

    async fn get_state(&mut self) -> Result<bool, NetworkError>;

    async fn set_state(&mut self, on: bool) -> Result<(), NetworkError>;
}

/// Fire-and-forget destination for every reading.
#[async_trait]
pub trait TelemetrySink: Send {
    async fn post(&mut self, reading: &Reading) -> Result<(), NetworkError>;
}

/// Bound a network operation so a slow peer cannot stall the loop.
pub async fn with_timeout<T, F>(limit: Duration, operation: F) -> Result<T, NetworkError>
where
    F: Future<Output = Result<T, NetworkError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(NetworkError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_operation_times_out() {
        let result: Result<(), _> = with_timeout(Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(NetworkError::Timeout(_))));
    }

    #[tokio::test]
    async fn fast_operation_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
