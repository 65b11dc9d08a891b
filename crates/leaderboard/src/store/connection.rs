//! Connection acquisition for the two Redis topologies.

use async_trait::async_trait;
use redis::RedisResult;
use redis::aio::{ConnectionLike, MultiplexedConnection};
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use tokio::sync::OnceCell;

/// Hands out a connection for each store call.
#[async_trait]
pub trait ConnectionProvider: Send + Sync + 'static {
    type Connection: ConnectionLike + Send;

    async fn connection(&self) -> RedisResult<Self::Connection>;
}

/// Single node: a multiplexed connection per call.
#[async_trait]
impl ConnectionProvider for redis::Client {
    type Connection = MultiplexedConnection;

    async fn connection(&self) -> RedisResult<Self::Connection> {
        self.get_multiplexed_async_connection().await
    }
}

/// Cluster: one connection opened on first use and cloned afterwards.
pub struct ClusterProvider {
    client: ClusterClient,
    connection: OnceCell<ClusterConnection>,
}

impl ClusterProvider {
    pub fn new(client: ClusterClient) -> Self {
        Self {
            client,
            connection: OnceCell::new(),
        }
    }
}

#[async_trait]
impl ConnectionProvider for ClusterProvider {
    type Connection = ClusterConnection;

    async fn connection(&self) -> RedisResult<Self::Connection> {
        let connection = self
            .connection
            .get_or_try_init(|| self.client.get_async_connection())
            .await?;
        Ok(connection.clone())
    }
}
