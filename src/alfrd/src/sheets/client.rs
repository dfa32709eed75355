use alfrd_common::workdir::ALFRD_WORK_DIR;
use alfrd_common::{skip_message, success_message, Colorize};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use typed_builder::TypedBuilder;

use super::a1::quote_title;
use super::auth::{fetch_token, AccessToken, Auth, ServiceAccountKey};
use super::error::{SheetError, SheetResult};
use super::format::ConditionalFormatRule;
use super::frame::{CellRef, CellRow, DataFrame};
use super::store::SheetStore;
use crate::config::Config;

static SPREADSHEET_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w-]{44}").expect("spreadsheet id regex is valid"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Which spreadsheet and worksheet to open. An empty `sid` is taken from `url`;
/// `wname` wins over the index `wid` when set.
#[derive(Debug, Clone, TypedBuilder)]
pub struct SheetSpec {
    #[builder(default, setter(into))]
    pub sid: String,
    #[builder(default, setter(into))]
    pub url: String,
    #[builder(default = ALFRD_WORK_DIR.credentials_file.clone(), setter(into))]
    pub key: PathBuf,
    #[builder(default)]
    pub wid: usize,
    #[builder(default, setter(into))]
    pub wname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetEntry {
    properties: SheetProperties,
    #[serde(default)]
    conditional_formats: Vec<ConditionalFormatRule>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

/// Client for one worksheet of a Google spreadsheet.
pub struct GoogleSheet {
    http: reqwest::Client,
    api_base: String,
    auth: Auth,
    token: Option<AccessToken>,
    spec: SheetSpec,
    worksheet: Option<SheetProperties>,
    df: DataFrame,
}

impl GoogleSheet {
    /// Loads the service-account key named by `spec.key`.
    pub fn new(spec: SheetSpec, config: &Config) -> SheetResult<Self> {
        let key = ServiceAccountKey::from_file(&spec.key)?;
        Self::with_auth(spec, Auth::ServiceAccount(key), config.sheets_api_base.clone())
    }

    pub fn with_auth(spec: SheetSpec, auth: Auth, api_base: impl Into<String>) -> SheetResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            auth,
            token: None,
            spec,
            worksheet: None,
            df: DataFrame::default(),
        })
    }

    pub fn sid(&self) -> &str {
        &self.spec.sid
    }

    pub fn worksheet(&self) -> Option<&SheetProperties> {
        self.worksheet.as_ref()
    }

    pub fn is_authorized(&self) -> bool {
        match self.auth {
            Auth::Bearer(_) => true,
            Auth::ServiceAccount(_) => self.token.is_some(),
        }
    }

    /// Obtains a fresh access token.
    pub async fn auth(&mut self) -> SheetResult<()> {
        self.token = None;
        self.bearer().await.map(|_| ())
    }

    async fn bearer(&mut self) -> SheetResult<String> {
        match &self.auth {
            Auth::Bearer(token) => Ok(token.clone()),
            Auth::ServiceAccount(key) => {
                if let Some(token) = self.token.as_ref().filter(|t| !t.is_expired()) {
                    return Ok(token.token.clone());
                }
                let token = fetch_token(&self.http, key).await?;
                let bearer = token.token.clone();
                self.token = Some(token);
                Ok(bearer)
            }
        }
    }

    fn spreadsheet_url(&self, suffix: &str) -> String {
        format!("{}/spreadsheets/{}{}", self.api_base, self.spec.sid, suffix)
    }

    fn title(&self) -> SheetResult<&str> {
        self.worksheet
            .as_ref()
            .map(|ws| ws.title.as_str())
            .ok_or(SheetError::NotOpened)
    }

    fn range(&self, cells: &str) -> SheetResult<String> {
        Ok(format!("{}!{}", quote_title(self.title()?), cells))
    }

    async fn send<T: DeserializeOwned>(&mut self, request: reqwest::RequestBuilder) -> SheetResult<T> {
        let token = self.bearer().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("sheets request failed with {}: {}", status, body);
            return Err(SheetError::api_error(status.as_u16(), body));
        }
        Ok(response.json().await?)
    }

    async fn metadata(&mut self, fields: &str) -> SheetResult<SpreadsheetMeta> {
        let request = self
            .http
            .get(self.spreadsheet_url(""))
            .query(&[("fields", fields)]);
        self.send(request).await
    }

    /// Resolves the spreadsheet id, selects the worksheet and fetches its contents.
    pub async fn open(&mut self) -> SheetResult<&DataFrame> {
        if !self.is_authorized() {
            self.auth().await?;
        }
        if self.spec.sid.is_empty() {
            let sid = SPREADSHEET_ID
                .find(&self.spec.url)
                .ok_or_else(|| SheetError::InvalidUrl(self.spec.url.clone()))?;
            self.spec.sid = sid.as_str().to_string();
        }

        let meta = self.metadata("sheets.properties").await?;
        let worksheet = if self.spec.wname.is_empty() {
            meta.sheets
                .into_iter()
                .map(|s| s.properties)
                .find(|p| p.index == self.spec.wid)
                .ok_or_else(|| SheetError::WorksheetNotFound(format!("#{}", self.spec.wid)))?
        } else {
            meta.sheets
                .into_iter()
                .map(|s| s.properties)
                .find(|p| p.title == self.spec.wname)
                .ok_or_else(|| SheetError::WorksheetNotFound(self.spec.wname.clone()))?
        };
        tracing::debug!("opened worksheet {:?} of {}", worksheet.title, self.spec.sid);
        self.worksheet = Some(worksheet);

        let range = utf8_percent_encode(&quote_title(self.title()?), NON_ALPHANUMERIC).to_string();
        let request = self.http.get(self.spreadsheet_url(&format!("/values/{range}")));
        let values: ValueRange = self.send(request).await?;

        let mut rows = values.values.into_iter().map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    JsonValue::String(s) => s,
                    JsonValue::Null => String::new(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
        });
        self.df = match rows.next() {
            Some(header) => DataFrame::from_records(header, rows.collect()),
            None => DataFrame::default(),
        };

        success_message!("Success!");
        Ok(&self.df)
    }

    async fn formats(&mut self) -> SheetResult<Vec<ConditionalFormatRule>> {
        let sheet_id = self.worksheet.as_ref().ok_or(SheetError::NotOpened)?.sheet_id;
        let meta = self
            .metadata("sheets(properties(sheetId,title,index),conditionalFormats)")
            .await?;
        Ok(meta
            .sheets
            .into_iter()
            .find(|s| s.properties.sheet_id == sheet_id)
            .map(|s| s.conditional_formats)
            .unwrap_or_default())
    }

    async fn batch_update(&mut self, requests: Vec<JsonValue>) -> SheetResult<()> {
        if requests.is_empty() {
            return Ok(());
        }
        let request = self
            .http
            .post(self.spreadsheet_url(":batchUpdate"))
            .json(&json!({ "requests": requests }));
        let _: JsonValue = self.send(request).await?;
        Ok(())
    }
}

impl SheetStore for GoogleSheet {
    fn frame(&self) -> &DataFrame {
        &self.df
    }

    fn sheet_id(&self) -> i64 {
        self.worksheet.as_ref().map(|ws| ws.sheet_id).unwrap_or_default()
    }

    async fn update(&mut self, frame: &DataFrame) -> SheetResult<usize> {
        let range = self.range("A1")?;
        let encoded = utf8_percent_encode(&range, NON_ALPHANUMERIC).to_string();
        let values = frame.to_values();
        let request = self
            .http
            .put(self.spreadsheet_url(&format!("/values/{encoded}")))
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": values }));
        let _: JsonValue = self.send(request).await?;

        success_message!("Updated!");
        Ok(values.len())
    }

    async fn update_cells(&mut self, frame: &DataFrame, cells: &[CellRef]) -> SheetResult<usize> {
        if cells.is_empty() {
            skip_message!("Identical data - row or column indices for update are empty.");
            return Ok(0);
        }

        let mut data = Vec::with_capacity(cells.len());
        for cell in cells {
            let value = match cell.row {
                CellRow::Header => frame.columns().get(cell.col).map(String::as_str),
                CellRow::Data(row) => frame.cell(row, cell.col),
            }
            .ok_or_else(|| SheetError::InvalidRange(cell.a1()))?;
            let range = self.range(&cell.a1())?;
            data.push(json!({ "range": range, "values": [[value]] }));
        }

        let request = self
            .http
            .post(self.spreadsheet_url("/values:batchUpdate"))
            .json(&json!({ "valueInputOption": "RAW", "data": data }));
        let _: JsonValue = self.send(request).await?;

        success_message!("Updated! {} cells successfully.", cells.len());
        Ok(cells.len())
    }

    async fn conditional_format_rules(&mut self) -> SheetResult<Vec<ConditionalFormatRule>> {
        self.formats().await
    }

    async fn add_conditional_format_rules(&mut self, rules: Vec<ConditionalFormatRule>) -> SheetResult<()> {
        let existing = self.formats().await?.len();
        let requests = rules
            .into_iter()
            .enumerate()
            .map(|(i, rule)| json!({ "addConditionalFormatRule": { "rule": rule, "index": existing + i } }))
            .collect();
        self.batch_update(requests).await
    }

    async fn clear_conditional_format_rules(&mut self) -> SheetResult<()> {
        let sheet_id = self.sheet_id();
        let existing = self.formats().await?.len();
        // Deleting from the back keeps the remaining indices stable.
        let requests = (0..existing)
            .rev()
            .map(|index| json!({ "deleteConditionalFormatRule": { "sheetId": sheet_id, "index": index } }))
            .collect();
        self.batch_update(requests).await
    }
}
