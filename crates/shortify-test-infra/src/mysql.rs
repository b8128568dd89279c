use crate::{endpoint, until_ready, Result};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use typed_builder::TypedBuilder;

const MYSQL_PORT: u16 = 3306;

/// Credentials and image for a [`MySqlServer`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct MySqlConfig {
    #[builder(default = "8.4".to_string(), setter(into))]
    tag: String,
    #[builder(default = "shortify".to_string(), setter(into))]
    database: String,
    #[builder(default = "shortify".to_string(), setter(into))]
    username: String,
    #[builder(default = "shortify".to_string(), setter(into))]
    password: String,
}

/// A throwaway MySQL server with an empty database.
pub struct MySqlServer {
    container: ContainerAsync<GenericImage>,
    config: MySqlConfig,
}

impl MySqlServer {
    pub async fn new(config: MySqlConfig) -> Result<Self> {
        let container = GenericImage::new("mysql", config.tag.as_str())
            .with_exposed_port(MYSQL_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr("ready for connections"))
            .with_env_var("MYSQL_ROOT_PASSWORD", "root")
            .with_env_var("MYSQL_DATABASE", config.database.as_str())
            .with_env_var("MYSQL_USER", config.username.as_str())
            .with_env_var("MYSQL_PASSWORD", config.password.as_str())
            .start()
            .await?;

        Ok(Self { container, config })
    }

    /// `mysql://` URL for the test database.
    pub async fn database_url(&self) -> Result<String> {
        let (host, port) = endpoint(&self.container, MYSQL_PORT).await?;
        let MySqlConfig {
            database,
            username,
            password,
            ..
        } = &self.config;
        Ok(format!("mysql://{username}:{password}@{host}:{port}/{database}"))
    }

    /// A small pool on the test database.
    ///
    /// The image restarts the server once after initializing the data
    /// directory, so early connections are retried.
    pub async fn pool(&self) -> Result<MySqlPool> {
        let url = self.database_url().await?;
        let pool = until_ready(|| MySqlPoolOptions::new().max_connections(8).connect(&url)).await?;
        Ok(pool)
    }
}
