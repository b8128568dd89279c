//! Disposable backend containers for integration tests.
//!
//! Every fixture owns its container; dropping the fixture stops it.

pub mod error;
pub mod mysql;
pub mod redis;

pub use error::{Result, TestInfraError};

use std::future::Future;
use std::time::Duration;
use testcontainers::{ContainerAsync, GenericImage};

const READY_ATTEMPTS: u32 = 40;
const READY_INTERVAL: Duration = Duration::from_millis(250);

/// Host and mapped port of `container`'s `internal_port`.
///
/// `localhost` is pinned to IPv4 since the mapping is only published there.
async fn endpoint(container: &ContainerAsync<GenericImage>, internal_port: u16) -> Result<(String, u16)> {
    let host = match container.get_host().await?.to_string().as_str() {
        "localhost" => "127.0.0.1".to_string(),
        other => other.to_string(),
    };
    let port = container.get_host_port_ipv4(internal_port).await?;
    Ok((host, port))
}

/// Runs `attempt` until it succeeds, pausing between tries.
///
/// A container's log line can show up before it accepts clients, so the
/// first few connections may be refused.
async fn until_ready<T, E, F, Fut>(mut attempt: F) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if tries >= READY_ATTEMPTS => return Err(err),
            Err(_) => {
                tries += 1;
                tokio::time::sleep(READY_INTERVAL).await;
            }
        }
    }
}
