use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;
use uuid::Uuid;

use super::traits::LedgerStore;
use crate::errors::CoreError;
use crate::models::settings::RestStoreConfig;
use crate::models::transaction::{NewTransaction, OwnerId, Transaction, TransactionPatch};

/// Ledger store backed by a PostgREST endpoint (e.g. a Supabase project).
///
/// - **Rows**: one table, one row per transaction, owner in `user_id`.
/// - **Endpoints**: `{base}/rest/v1/{table}` with `eq.` filters.
/// - **Auth**: project key sent as `apikey` and bearer token.
///
/// Updates and deletes ask for the affected rows back
/// (`Prefer: return=representation`); an empty result means the id is not
/// in the owner's ledger and is reported as `NotFound`.
pub struct RestLedgerStore {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct InsertRow<'a> {
    user_id: &'a OwnerId,
    #[serde(flatten)]
    input: &'a NewTransaction,
}

impl RestLedgerStore {
    pub fn new(config: &RestStoreConfig) -> Result<Self, CoreError> {
        if config.base_url.trim().is_empty() {
            return Err(CoreError::Config("rest.base_url must not be empty".into()));
        }
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        Ok(Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            endpoint: table_endpoint(&config.base_url, &config.table),
            api_key: config.api_key.clone(),
        })
    }

    /// Full URL of the transactions table.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn owner_filter(owner: &OwnerId) -> (&'static str, String) {
        ("user_id", format!("eq.{owner}"))
    }

    fn id_filter(id: Uuid) -> (&'static str, String) {
        ("id", format!("eq.{id}"))
    }

    /// Decode a `return=representation` body and require exactly one row.
    async fn single_row(response: Response, id: &str) -> Result<Transaction, CoreError> {
        let response = check_status(response, id).await?;
        let mut rows: Vec<Transaction> = response.json().await.map_err(|e| {
            CoreError::Deserialization(format!("Failed to parse ledger rows: {e}"))
        })?;
        match rows.len() {
            0 => Err(CoreError::NotFound(id.to_string())),
            _ => Ok(rows.swap_remove(0)),
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl LedgerStore for RestLedgerStore {
    fn name(&self) -> &str {
        "PostgREST"
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<Transaction>, CoreError> {
        let response = self
            .authorized(self.client.get(&self.endpoint))
            .query(&[("select", "*".to_string()), Self::owner_filter(owner)])
            .send()
            .await?;
        let response = check_status(response, owner.as_str()).await?;
        response
            .json()
            .await
            .map_err(|e| CoreError::Deserialization(format!("Failed to parse ledger rows: {e}")))
    }

    async fn insert(
        &self,
        owner: &OwnerId,
        input: NewTransaction,
    ) -> Result<Transaction, CoreError> {
        let row = InsertRow {
            user_id: owner,
            input: &input,
        };
        let response = self
            .authorized(self.client.post(&self.endpoint))
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;
        Self::single_row(response, "new transaction").await
    }

    async fn update(
        &self,
        owner: &OwnerId,
        id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Transaction, CoreError> {
        let response = self
            .authorized(self.client.patch(&self.endpoint))
            .query(&[Self::id_filter(id), Self::owner_filter(owner)])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        Self::single_row(response, &id.to_string()).await
    }

    async fn delete(&self, owner: &OwnerId, id: Uuid) -> Result<(), CoreError> {
        let response = self
            .authorized(self.client.delete(&self.endpoint))
            .query(&[Self::id_filter(id), Self::owner_filter(owner)])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Self::single_row(response, &id.to_string()).await.map(|_| ())
    }
}

/// `{base}/rest/v1/{table}`, tolerating a trailing slash on the base.
pub fn table_endpoint(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url.trim().trim_end_matches('/'), table)
}

/// Map a non-success HTTP status to the crate's error taxonomy.
pub fn status_error(status: StatusCode, subject: &str, body: &str) -> CoreError {
    match status {
        StatusCode::NOT_FOUND => CoreError::NotFound(subject.to_string()),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
            CoreError::Validation(format!("ledger store rejected {subject}: {body}"))
        }
        _ => CoreError::StoreUnavailable(format!("HTTP {status}: {body}")),
    }
}

async fn check_status(response: Response, subject: &str) -> Result<Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, subject, &body))
}
