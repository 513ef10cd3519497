//! Google Sheets v4 `spreadsheets.values` read and append.
//!
//! Auth uses the identity's OAuth2 access token (bearer), passed per call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use screener_core::{Error, Result, Rows, TableLocator, TableSink, TableSource};
use serde::{Deserialize, Serialize};

use crate::http::{build_client, ensure_success};

pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct AppendBody<'a> {
    values: &'a Rows,
}

#[derive(Clone)]
pub struct GoogleSheetsClient {
    client: Client,
    base_url: String,
}

impl GoogleSheetsClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(30))?,
            base_url: SHEETS_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}{suffix}` with each segment escaped.
    fn values_url(&self, table: &TableLocator, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::backend(format!("parse sheets base url {}", self.base_url), e))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidInput(format!("sheets base url {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", table.spreadsheet_id.as_str(), "values"])
            .push(&format!("{}{suffix}", table.range));
        Ok(url)
    }
}

/// Formatted values arrive as strings; anything else is rendered as its JSON text.
fn cells_to_rows(values: Vec<Vec<serde_json::Value>>) -> Rows {
    values
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

#[async_trait]
impl TableSource for GoogleSheetsClient {
    #[tracing::instrument(level = "debug", skip(self, access_token), fields(table = %table))]
    async fn read(&self, access_token: &str, table: &TableLocator) -> Result<Rows> {
        let url = self.values_url(table, "")?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(Error::backend_reqwest)?;
        let resp = ensure_success(resp, "sheets values.get").await?;
        let range: ValueRange = resp.json().await.map_err(Error::backend_reqwest)?;
        Ok(cells_to_rows(range.values))
    }
}

#[async_trait]
impl TableSink for GoogleSheetsClient {
    #[tracing::instrument(level = "debug", skip(self, access_token, rows), fields(table = %table, rows = rows.len()))]
    async fn append(&self, access_token: &str, table: &TableLocator, rows: Rows) -> Result<()> {
        let mut url = self.values_url(table, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let resp = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&AppendBody { values: &rows })
            .send()
            .await
            .map_err(Error::backend_reqwest)?;
        ensure_success(resp, "sheets values.append").await?;
        Ok(())
    }
}
