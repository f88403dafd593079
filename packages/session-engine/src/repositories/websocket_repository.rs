use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::{primitives::Blob, Client as ApiGatewayClient};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Lookup of player WebSocket connections and delivery of raw messages.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WebSocketRepository: Send + Sync {
    async fn get_connection_id(&self, player_id: &str) -> Result<Option<String>, BoxError>;

    async fn send_message(&self, connection_id: &str, message: &str) -> Result<(), BoxError>;
}

pub struct DynamoDbWebSocketRepository {
    dynamodb_client: DynamoDbClient,
    api_gateway_client: ApiGatewayClient,
    table_name: String,
}

impl DynamoDbWebSocketRepository {
    pub fn new(
        dynamodb_client: DynamoDbClient,
        api_gateway_client: ApiGatewayClient,
        table_name: &str,
    ) -> Self {
        Self {
            dynamodb_client,
            api_gateway_client,
            table_name: table_name.to_string(),
        }
    }

    /// Builds a management API client pointed at the WebSocket stage, e.g.
    /// `https://{api-id}.execute-api.{region}.amazonaws.com/{stage}`.
    pub fn api_gateway_client(config: &aws_config::SdkConfig, endpoint: &str) -> ApiGatewayClient {
        let api_gateway_config = aws_sdk_apigatewaymanagement::config::Builder::from(config)
            .endpoint_url(endpoint)
            .build();
        ApiGatewayClient::from_conf(api_gateway_config)
    }
}

#[async_trait]
impl WebSocketRepository for DynamoDbWebSocketRepository {
    async fn get_connection_id(&self, player_id: &str) -> Result<Option<String>, BoxError> {
        let result = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .key("player_id", AttributeValue::S(player_id.to_string()))
            .send()
            .await?;

        if let Some(item) = result.item {
            if let Some(AttributeValue::S(connection_id)) = item.get("connection_id") {
                return Ok(Some(connection_id.clone()));
            }
        }

        Ok(None)
    }

    async fn send_message(&self, connection_id: &str, message: &str) -> Result<(), BoxError> {
        self.api_gateway_client
            .post_to_connection()
            .connection_id(connection_id)
            .data(Blob::new(message.as_bytes()))
            .send()
            .await?;

        debug!("Sent message to connection: {}", connection_id);
        Ok(())
    }
}
