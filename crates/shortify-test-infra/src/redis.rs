use crate::{endpoint, until_ready, Result};
use redis::aio::MultiplexedConnection;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

const REDIS_PORT: u16 = 6379;

/// A throwaway single-node Redis server.
pub struct RedisServer {
    container: ContainerAsync<GenericImage>,
}

impl RedisServer {
    pub async fn new() -> Result<Self> {
        let container = GenericImage::new("redis", "8.6.0")
            .with_exposed_port(REDIS_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
            .start()
            .await?;
        Ok(Self { container })
    }

    pub async fn url(&self) -> Result<String> {
        let (host, port) = endpoint(&self.container, REDIS_PORT).await?;
        Ok(format!("redis://{host}:{port}"))
    }

    pub async fn connection(&self) -> Result<MultiplexedConnection> {
        let client = redis::Client::open(self.url().await?.as_str())?;
        let conn = until_ready(|| client.get_multiplexed_async_connection()).await?;
        Ok(conn)
    }
}
