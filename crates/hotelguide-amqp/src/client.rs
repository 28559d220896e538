use anyhow::{Context, Result};
use lapin::{Channel, Connection, ConnectionProperties};
use std::time::Duration;
use tracing::{info, warn};

/// Connection wrapper for RabbitMQ. One connection per process; every
/// logical producer/consumer role opens its own channel so an HTTP-triggered
/// publish never blocks behind the background consumer.
pub struct AmqpClient {
    connection: Connection,
}

impl AmqpClient {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        info!(url = %url, timeout_ms = timeout.as_millis(), "Connecting to RabbitMQ");

        let connection = tokio::time::timeout(
            timeout,
            Connection::connect(url, ConnectionProperties::default()),
        )
        .await
        .context("Timed out connecting to RabbitMQ")?
        .context("Failed to connect to RabbitMQ")?;

        info!("Successfully connected to RabbitMQ");
        Ok(Self { connection })
    }

    pub async fn create_channel(&self) -> Result<Channel> {
        self.connection
            .create_channel()
            .await
            .context("Failed to create channel")
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    pub async fn close(&self) {
        info!("Closing RabbitMQ connection");
        if let Err(e) = self.connection.close(200, "shutdown").await {
            warn!(error = %e, "Error closing RabbitMQ connection");
        }
    }
}
