//! Google Sheets output.
//!
//! Records are written into one worksheet of an existing spreadsheet,
//! identified by the spreadsheet id and the worksheet's numeric `gid`
//! (both visible in the sheet URL).
//!
//! # Authentication
//!
//! Only service accounts are supported. The JSON key file comes from
//! `--google-credentials` or `GOOGLE_APPLICATION_CREDENTIALS`; it is used to
//! sign an RS256 assertion that is exchanged for a one hour bearer token.
//!
//! # Write Modes
//!
//! - [`SheetMode::Replace`]: clear the worksheet, then write header and rows at `A1`
//! - [`SheetMode::Append`]: add rows below existing content; the header is
//!   only written when the worksheet is empty

use crate::models::{Deal, OUTPUT_FIELDS};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// OAuth scope granting read/write access to spreadsheets.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
/// Base URL of the Sheets REST API.
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
/// Environment variable consulted when no credentials flag is given.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failures of the Sheets sink.
#[derive(Debug, Error)]
pub enum SheetsError {
    #[error(
        "Google Sheets upload requires a service account JSON file. \
         Provide --google-credentials or set GOOGLE_APPLICATION_CREDENTIALS."
    )]
    MissingCredentials,
    #[error("could not read service account file {path}: {source}")]
    CredentialsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid service account file {path}: {source}")]
    CredentialsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not sign token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("request to Google failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Google API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Worksheet with gid={worksheet_id} not found in spreadsheet {spreadsheet_id}.")]
    WorksheetNotFound {
        spreadsheet_id: String,
        worksheet_id: i64,
    },
}

/// How rows are written into the worksheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SheetMode {
    /// Clear the worksheet and write from `A1`.
    #[default]
    Replace,
    /// Keep existing rows and add new ones below.
    Append,
}

/// Destination worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTarget {
    pub spreadsheet_id: String,
    pub worksheet_id: i64,
}

/// A spreadsheet reference as typed by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetReference {
    pub spreadsheet_id: String,
    /// `gid` found in a pasted URL, if any.
    pub gid: Option<i64>,
}

static SPREADSHEET_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/spreadsheets/d/([A-Za-z0-9_-]+)").expect("valid regex"));
static GID_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#?&]gid=(\d+)").expect("valid regex"));

/// Accept either a bare spreadsheet id or a full sheet URL.
///
/// ```ignore
/// let r = parse_sheet_reference("https://docs.google.com/spreadsheets/d/abc123/edit#gid=42");
/// assert_eq!(r.spreadsheet_id, "abc123");
/// assert_eq!(r.gid, Some(42));
/// ```
pub fn parse_sheet_reference(input: &str) -> SheetReference {
    let input = input.trim();
    match SPREADSHEET_URL.captures(input) {
        Some(caps) => SheetReference {
            spreadsheet_id: caps[1].to_string(),
            gid: GID_PARAM
                .captures(input)
                .and_then(|g| g[1].parse().ok()),
        },
        None => SheetReference {
            spreadsheet_id: input.to_string(),
            gid: None,
        },
    }
}

/// Locate the service account file: the explicit flag first, then
/// `GOOGLE_APPLICATION_CREDENTIALS`. The file must exist.
pub fn resolve_credentials_path(flag: Option<&Path>) -> Result<PathBuf, SheetsError> {
    resolve_credentials_from(flag, std::env::var_os(CREDENTIALS_ENV))
}

fn resolve_credentials_from(
    flag: Option<&Path>,
    env_value: Option<OsString>,
) -> Result<PathBuf, SheetsError> {
    let candidate = match flag {
        Some(path) => Some(path.to_path_buf()),
        None => env_value.filter(|v| !v.is_empty()).map(PathBuf::from),
    };

    match candidate {
        Some(path) if path.exists() => Ok(path),
        _ => Err(SheetsError::MissingCredentials),
    }
}

/// The parts of a service account JSON key this sink needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Read a service account key file.
    pub async fn from_file(path: &Path) -> Result<Self, SheetsError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SheetsError::CredentialsRead {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&text).map_err(|source| SheetsError::CredentialsParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Signed JWT assertion for the token exchange.
    fn assertion(&self, issued_at: i64) -> Result<String, SheetsError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + TOKEN_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    // The API omits zero-valued ids, which is the default first worksheet.
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Authorised client for the Sheets values API.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl SheetsClient {
    /// Client using an already issued bearer token.
    pub fn with_token(http: reqwest::Client, api_base: &str, token: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Exchange a signed service account assertion for a bearer token.
    #[instrument(level = "info", skip_all, fields(client_email = %key.client_email))]
    pub async fn authorize(
        http: reqwest::Client,
        key: &ServiceAccountKey,
        api_base: &str,
    ) -> Result<Self, SheetsError> {
        let assertion = key.assertion(Utc::now().timestamp())?;
        let response = http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;
        debug!("Obtained Sheets access token");
        Ok(Self::with_token(http, api_base, &token.access_token))
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str) -> String {
        format!("{}/spreadsheets/{}", self.api_base, urlencoding::encode(spreadsheet_id))
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_url(spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    /// Title of the worksheet with the given `gid`.
    pub async fn worksheet_title(&self, target: &SheetTarget) -> Result<String, SheetsError> {
        let response = self
            .http
            .get(self.spreadsheet_url(&target.spreadsheet_id))
            .query(&[("fields", "sheets.properties")])
            .bearer_auth(&self.token)
            .send()
            .await?;
        let meta: SpreadsheetMeta = check(response).await?.json().await?;

        meta.sheets
            .into_iter()
            .map(|s| s.properties)
            .find(|p| p.sheet_id == target.worksheet_id)
            .map(|p| p.title)
            .ok_or_else(|| SheetsError::WorksheetNotFound {
                spreadsheet_id: target.spreadsheet_id.clone(),
                worksheet_id: target.worksheet_id,
            })
    }

    /// Remove every value from the worksheet.
    pub async fn clear(&self, spreadsheet_id: &str, title: &str) -> Result<(), SheetsError> {
        let url = format!("{}:clear", self.values_url(spreadsheet_id, &quote_title(title)));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({}))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Overwrite cells starting at `range`.
    pub async fn update(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<Value>],
    ) -> Result<(), SheetsError> {
        let response = self
            .http
            .put(self.values_url(spreadsheet_id, range))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&self.token)
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": rows }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Insert rows after the last non-empty row of `range`.
    pub async fn append(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<Value>],
    ) -> Result<(), SheetsError> {
        let url = format!("{}:append", self.values_url(spreadsheet_id, range));
        let response = self
            .http
            .post(url)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(&self.token)
            .json(&json!({ "majorDimension": "ROWS", "values": rows }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Whether no cell of the worksheet holds a value.
    pub async fn worksheet_is_empty(&self, spreadsheet_id: &str, title: &str) -> Result<bool, SheetsError> {
        let response = self
            .http
            .get(self.values_url(spreadsheet_id, &quote_title(title)))
            .query(&[("majorDimension", "ROWS")])
            .bearer_auth(&self.token)
            .send()
            .await?;
        let values: ValueRange = check(response).await?.json().await?;
        Ok(values.values.iter().flatten().all(is_blank_cell))
    }

    /// Write `deals` into the target worksheet.
    #[instrument(level = "info", skip_all, fields(spreadsheet_id = %target.spreadsheet_id, gid = target.worksheet_id, mode = ?mode))]
    pub async fn upload(
        &self,
        deals: &[Deal],
        target: &SheetTarget,
        mode: SheetMode,
    ) -> Result<(), SheetsError> {
        let title = self.worksheet_title(target).await?;
        let anchor = format!("{}!A1", quote_title(&title));
        let mut rows = format_rows_for_sheet(deals);

        match mode {
            SheetMode::Replace => {
                self.clear(&target.spreadsheet_id, &title).await?;
                self.update(&target.spreadsheet_id, &anchor, &rows).await?;
            }
            SheetMode::Append => {
                if !self.worksheet_is_empty(&target.spreadsheet_id, &title).await? {
                    rows.remove(0);
                }
                self.append(&target.spreadsheet_id, &anchor, &rows).await?;
            }
        }

        info!(
            count = deals.len(),
            worksheet = %title,
            gid = target.worksheet_id,
            "Uploaded deals to Google Sheets worksheet"
        );
        Ok(())
    }
}

/// Fail on non-success responses, keeping the body for the error message.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SheetsError::Api {
        status: status.as_u16(),
        body,
    })
}

fn is_blank_cell(cell: &Value) -> bool {
    match cell {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// A1-notation sheet name: single quoted, embedded quotes doubled.
fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Header row followed by one row per deal, columns in [`OUTPUT_FIELDS`] order.
pub fn format_rows_for_sheet(deals: &[Deal]) -> Vec<Vec<Value>> {
    let header: Vec<Value> = OUTPUT_FIELDS.iter().map(|f| Value::from(*f)).collect();
    std::iter::once(header)
        .chain(
            deals
                .iter()
                .map(|deal| OUTPUT_FIELDS.iter().map(|field| deal.cell(field)).collect()),
        )
        .collect()
}

/// Upload deals to a Google Sheets worksheet using service account credentials.
///
/// Nothing is sent when `deals` is empty.
#[instrument(level = "info", skip_all, fields(spreadsheet_id = %target.spreadsheet_id, gid = target.worksheet_id))]
pub async fn persist_to_google_sheet(
    deals: &[Deal],
    target: &SheetTarget,
    credentials_path: Option<&Path>,
    mode: SheetMode,
) -> Result<(), SheetsError> {
    if deals.is_empty() {
        info!("No deals collected; skipping Google Sheets upload");
        return Ok(());
    }

    let path = resolve_credentials_path(credentials_path)?;
    let key = ServiceAccountKey::from_file(&path).await?;
    let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let client = SheetsClient::authorize(http, &key, SHEETS_API_BASE).await?;
    client.upload(deals, target, mode).await
}
