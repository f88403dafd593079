use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, TransactWriteItem, Update};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value, to_item};
use tracing::{info, warn};

use crate::models::game_session::Winner;
use crate::models::match_record::{MatchRecord, MoveRecord};
use crate::models::player::PlayerRatingUpdate;
use crate::repositories::errors::match_repository_errors::MatchRepositoryError;

/// Everything written when a match ends, applied as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCompletion {
    pub match_id: String,
    pub winner: Winner,
    pub ended_at: DateTime<Utc>,
    /// Empty for draws.
    pub rating_updates: Vec<PlayerRatingUpdate>,
}

/// Permanent store of match records and move history.
#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn create_match(&self, record: &MatchRecord) -> Result<(), MatchRepositoryError>;

    async fn get_match(&self, match_id: &str) -> Result<Option<MatchRecord>, MatchRepositoryError>;

    /// Writes the result and the rating updates atomically. Fails
    /// `AlreadyFinished` if the match already has a result and `Contended` if
    /// a rating moved since it was read; in both cases nothing is written.
    async fn complete_match(&self, completion: &MatchCompletion)
        -> Result<(), MatchRepositoryError>;

    async fn append_move(&self, record: &MoveRecord) -> Result<(), MatchRepositoryError>;

    /// Moves of a match ordered by move number.
    async fn list_moves(&self, match_id: &str) -> Result<Vec<MoveRecord>, MatchRepositoryError>;

    /// Finished matches of a player, most recently ended first.
    async fn list_finished_matches(
        &self,
        player_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MatchRecord>, MatchRepositoryError>;
}

/// Sorts by end time, newest first, and cuts out one page.
pub fn page_finished(
    mut records: Vec<MatchRecord>,
    limit: usize,
    offset: usize,
) -> Vec<MatchRecord> {
    records.retain(|record| record.is_finished());
    records.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
    records.into_iter().skip(offset).take(limit).collect()
}

pub struct DynamoDbMatchRepository {
    pub client: Client,
    pub matches_table: String,
    pub moves_table: String,
    pub players_table: String,
}

impl DynamoDbMatchRepository {
    pub fn new(
        client: Client,
        matches_table: &str,
        moves_table: &str,
        players_table: &str,
    ) -> Self {
        Self {
            client,
            matches_table: matches_table.to_string(),
            moves_table: moves_table.to_string(),
            players_table: players_table.to_string(),
        }
    }

    fn build_result_item(
        &self,
        completion: &MatchCompletion,
    ) -> Result<TransactWriteItem, MatchRepositoryError> {
        let key = HashMap::from([(
            "id".to_string(),
            AttributeValue::S(completion.match_id.clone()),
        )]);

        let update = Update::builder()
            .table_name(&self.matches_table)
            .set_key(Some(key))
            .update_expression("SET ended_at = :ended_at, winner = :winner")
            .condition_expression("attribute_exists(id) AND attribute_not_exists(ended_at)")
            .expression_attribute_values(
                ":ended_at",
                to_attribute_value(completion.ended_at)
                    .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(
                ":winner",
                to_attribute_value(completion.winner)
                    .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?,
            )
            .build()
            .map_err(|e| {
                MatchRepositoryError::DynamoDb(format!("Failed to build update: {:?}", e))
            })?;

        Ok(TransactWriteItem::builder().update(update).build())
    }

    fn build_rating_item(
        &self,
        rating_update: &PlayerRatingUpdate,
    ) -> Result<TransactWriteItem, MatchRepositoryError> {
        let key = HashMap::from([(
            "id".to_string(),
            AttributeValue::S(rating_update.player_id.clone()),
        )]);

        let update = Update::builder()
            .table_name(&self.players_table)
            .set_key(Some(key))
            .update_expression(
                "SET rating = :new_rating, \
                 games_played = if_not_exists(games_played, :zero) + :one",
            )
            .condition_expression("rating = :expected_rating")
            .expression_attribute_values(
                ":new_rating",
                AttributeValue::N(rating_update.new_rating.to_string()),
            )
            .expression_attribute_values(
                ":expected_rating",
                AttributeValue::N(rating_update.expected_rating.to_string()),
            )
            .expression_attribute_values(":zero", AttributeValue::N("0".to_string()))
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .build()
            .map_err(|e| {
                MatchRepositoryError::DynamoDb(format!("Failed to build update: {:?}", e))
            })?;

        Ok(TransactWriteItem::builder().update(update).build())
    }

    async fn query_player_index(
        &self,
        index_name: &str,
        attribute: &str,
        player_id: &str,
    ) -> Result<Vec<MatchRecord>, MatchRepositoryError> {
        let mut records = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.matches_table)
                .index_name(index_name)
                .key_condition_expression(format!("{} = :player_id", attribute))
                .expression_attribute_values(":player_id", AttributeValue::S(player_id.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let parsed: Result<MatchRecord, _> = from_item(item);
                match parsed {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("Skipping unreadable match for player {}: {}", player_id, e),
                }
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl MatchRepository for DynamoDbMatchRepository {
    async fn create_match(&self, record: &MatchRecord) -> Result<(), MatchRepositoryError> {
        let item =
            to_item(record).map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.matches_table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn get_match(&self, match_id: &str) -> Result<Option<MatchRecord>, MatchRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.matches_table)
            .key("id", AttributeValue::S(match_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        match output.item {
            Some(item) => {
                let record: MatchRecord = from_item(item)
                    .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn complete_match(
        &self,
        completion: &MatchCompletion,
    ) -> Result<(), MatchRepositoryError> {
        let mut transact_items = vec![self.build_result_item(completion)?];
        for rating_update in &completion.rating_updates {
            transact_items.push(self.build_rating_item(rating_update)?);
        }

        match self
            .client
            .transact_write_items()
            .set_transact_items(Some(transact_items))
            .send()
            .await
        {
            Ok(_) => {
                info!(
                    "Recorded result {:?} for match {}",
                    completion.winner, completion.match_id
                );
                Ok(())
            }
            Err(e) => match e.as_service_error() {
                Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) => {
                    warn!(
                        "Result transaction for match {} was cancelled",
                        completion.match_id
                    );
                    // The result item is always first in the transaction.
                    let result_rejected = cancelled
                        .cancellation_reasons()
                        .first()
                        .and_then(|reason| reason.code())
                        == Some("ConditionalCheckFailed");
                    if result_rejected {
                        Err(MatchRepositoryError::AlreadyFinished(
                            completion.match_id.clone(),
                        ))
                    } else {
                        Err(MatchRepositoryError::Contended(
                            completion.match_id.clone(),
                        ))
                    }
                }
                _ => Err(MatchRepositoryError::DynamoDb(e.to_string())),
            },
        }
    }

    async fn append_move(&self, record: &MoveRecord) -> Result<(), MatchRepositoryError> {
        let item =
            to_item(record).map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.moves_table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(match_id)")
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn list_moves(&self, match_id: &str) -> Result<Vec<MoveRecord>, MatchRepositoryError> {
        let mut moves = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.moves_table)
                .key_condition_expression("match_id = :match_id")
                .expression_attribute_values(":match_id", AttributeValue::S(match_id.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let record: MoveRecord = from_item(item)
                    .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;
                moves.push(record);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        moves.sort_by_key(|record| record.move_number);
        Ok(moves)
    }

    async fn list_finished_matches(
        &self,
        player_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MatchRecord>, MatchRepositoryError> {
        let mut records = self
            .query_player_index("WhitePlayerIndex", "white_player_id", player_id)
            .await?;
        records.extend(
            self.query_player_index("BlackPlayerIndex", "black_player_id", player_id)
                .await?,
        );

        Ok(page_finished(records, limit, offset))
    }
}
