//! BigQuery REST implementation of [`AnalyticsStore`].
//!
//! Endpoints used (v2 API):
//! - `GET  /projects/{p}/datasets/{d}`                 existence check
//! - `POST /projects/{p}/datasets`                     create dataset
//! - `GET  /projects/{p}/datasets/{d}/tables/{t}`      existence check
//! - `POST /projects/{p}/datasets/{d}/tables`          create table
//! - `POST /projects/{p}/datasets/{d}/tables/{t}/insertAll` streaming insert
//!
//! Transport failures and 5xx answers are retried up to `max_attempts` with a fixed
//! delay. Streaming inserts carry a per-row `insertId`, so a retried insert does not
//! duplicate rows that already landed.

use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::{debug, instrument, warn};

use hooksink_core::{ProjectId, TableSchema};

use super::r#trait::{
    AnalyticsStore, DatasetRef, InsertResponse, InsertRow, RowInsertError, StoreError, TableRef,
};
use super::token::TokenSource;
use crate::credentials::{CredentialError, ServiceAccountCredentials, StoreFactory};

pub const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

#[derive(Debug, Clone)]
pub struct BigQueryOptions {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for BigQueryOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_millis(2000),
            request_timeout: Duration::from_millis(2000),
            max_attempts: 3,
            retry_delay: Duration::from_millis(250),
        }
    }
}

/// Opens one [`BigQueryStore`] per resolved tenant identity.
///
/// The HTTP connection pool is shared between handles; tokens and identities are not.
#[derive(Debug, Clone)]
pub struct BigQueryStoreFactory {
    options: BigQueryOptions,
    http: Client,
}

impl BigQueryStoreFactory {
    pub fn new(options: BigQueryOptions) -> Result<Self, StoreError> {
        let http = Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self::with_client(options, http))
    }

    /// Use an already configured HTTP client; `options` timeouts are not reapplied.
    pub fn with_client(options: BigQueryOptions, http: Client) -> Self {
        Self { options, http }
    }

    pub fn options(&self) -> &BigQueryOptions {
        &self.options
    }
}

impl StoreFactory for BigQueryStoreFactory {
    type Store = BigQueryStore;

    fn open(&self, credentials: ServiceAccountCredentials) -> Result<Self::Store, CredentialError> {
        let tokens = TokenSource::new(&credentials, BIGQUERY_SCOPE, self.http.clone())?;
        Ok(BigQueryStore {
            project_id: credentials.project_id().clone(),
            base_url: self.options.base_url.trim_end_matches('/').to_string(),
            max_attempts: self.options.max_attempts.max(1),
            retry_delay: self.options.retry_delay,
            http: self.http.clone(),
            tokens,
        })
    }
}

#[derive(Debug)]
pub struct BigQueryStore {
    project_id: ProjectId,
    base_url: String,
    max_attempts: u32,
    retry_delay: Duration,
    http: Client,
    tokens: TokenSource,
}

impl BigQueryStore {
    fn datasets_url(&self, project: &ProjectId) -> String {
        format!("{}/projects/{}/datasets", self.base_url, project)
    }

    fn dataset_url(&self, dataset: &DatasetRef) -> String {
        format!("{}/{}", self.datasets_url(&dataset.project_id), dataset.dataset_id)
    }

    fn tables_url(&self, dataset: &DatasetRef) -> String {
        format!("{}/tables", self.dataset_url(dataset))
    }

    fn table_url(&self, table: &TableRef) -> String {
        format!("{}/{}", self.tables_url(&table.dataset()), table.table_id)
    }

    /// Send a request built by `build`, retrying transport errors and 5xx answers.
    fn send(&self, build: impl Fn(&Client) -> RequestBuilder) -> Result<Response, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let token = self.tokens.token()?;

            let outcome = build(&self.http).bearer_auth(token).send();
            let retryable = match &outcome {
                Ok(response) => response.status().is_server_error(),
                Err(err) => !err.is_builder(),
            };

            if !retryable || attempt >= self.max_attempts {
                return outcome.map_err(|e| StoreError::Transport(e.to_string()));
            }

            match &outcome {
                Ok(response) => warn!(attempt, status = %response.status(), "retrying store call"),
                Err(err) => warn!(attempt, error = %err, "retrying store call"),
            }
            thread::sleep(self.retry_delay);
        }
    }

    fn exists(&self, url: String) -> Result<bool, StoreError> {
        let response = self.send(|http| http.get(&url))?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(error_from_response(status, response, &url)),
        }
    }

    fn create(&self, url: String, body: JsonValue, subject: String) -> Result<(), StoreError> {
        let response = self.send(|http| http.post(&url).json(&body))?;
        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(error_from_response(status, response, &subject)),
        }
    }
}

impl AnalyticsStore for BigQueryStore {
    fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    #[instrument(skip(self), fields(dataset = %dataset), err)]
    fn dataset_exists(&self, dataset: &DatasetRef) -> Result<bool, StoreError> {
        self.exists(self.dataset_url(dataset))
    }

    #[instrument(skip(self), fields(dataset = %dataset), err)]
    fn create_dataset(&self, dataset: &DatasetRef) -> Result<(), StoreError> {
        self.create(
            self.datasets_url(&dataset.project_id),
            dataset_body(dataset),
            dataset.to_string(),
        )
    }

    #[instrument(skip(self), fields(table = %table), err)]
    fn table_exists(&self, table: &TableRef) -> Result<bool, StoreError> {
        self.exists(self.table_url(table))
    }

    #[instrument(skip(self, schema), fields(table = %table), err)]
    fn create_table(&self, table: &TableRef, schema: &TableSchema) -> Result<(), StoreError> {
        self.create(
            self.tables_url(&table.dataset()),
            table_body(table, schema),
            table.to_string(),
        )
    }

    #[instrument(skip(self, template_suffix, rows), fields(table = %table, suffix = template_suffix, rows = rows.len()), err)]
    fn insert_rows(
        &self,
        table: &TableRef,
        template_suffix: &str,
        rows: &[InsertRow],
    ) -> Result<InsertResponse, StoreError> {
        let url = format!("{}/insertAll", self.table_url(table));
        let body = insert_all_body(template_suffix, rows);

        let response = self.send(|http| http.post(&url).json(&body))?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response, &table.to_string()));
        }

        let parsed: InsertAllResponse = response
            .json()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let result = parsed.into_insert_response();
        debug!(rejected = result.errors.len(), "insertAll answered");
        Ok(result)
    }
}

pub(crate) fn dataset_body(dataset: &DatasetRef) -> JsonValue {
    json!({
        "datasetReference": {
            "projectId": dataset.project_id.as_str(),
            "datasetId": dataset.dataset_id,
        }
    })
}

pub(crate) fn table_body(table: &TableRef, schema: &TableSchema) -> JsonValue {
    json!({
        "tableReference": {
            "projectId": table.project_id.as_str(),
            "datasetId": table.dataset_id,
            "tableId": table.table_id,
        },
        "schema": schema,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InsertAllRequest<'a> {
    kind: &'static str,
    template_suffix: &'a str,
    rows: &'a [InsertRow],
}

pub(crate) fn insert_all_body<'a>(template_suffix: &'a str, rows: &'a [InsertRow]) -> InsertAllRequest<'a> {
    InsertAllRequest {
        kind: "bigquery#tableDataInsertAllRequest",
        template_suffix,
        rows,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct InsertErrorEntry {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

impl InsertAllResponse {
    /// One [`RowInsertError`] per rejected row; the first reported reason wins.
    pub(crate) fn into_insert_response(self) -> InsertResponse {
        let errors = self
            .insert_errors
            .into_iter()
            .map(|entry| {
                let first = entry.errors.into_iter().next().unwrap_or_default();
                RowInsertError {
                    index: entry.index,
                    reason: first.reason,
                    message: first.message,
                }
            })
            .collect();
        InsertResponse { errors }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn error_from_response(status: StatusCode, response: Response, subject: &str) -> StoreError {
    let body = response.text().unwrap_or_default();
    classify_status(status.as_u16(), &body, subject)
}

pub(crate) fn classify_status(status: u16, body: &str, subject: &str) -> StoreError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        409 => StoreError::AlreadyExists(subject.to_string()),
        404 => StoreError::NotFound(subject.to_string()),
        401 => StoreError::Unauthorized(message),
        403 => StoreError::PermissionDenied(message),
        _ => StoreError::Api { status, message },
    }
}
