// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP client for the Zendure cloud directory.

use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::DEFAULT_API_URL;
use crate::error::DirectoryError;

use super::{DelegatedSecret, DeviceDetail, DeviceSummary, DirectoryService};

const AUTH_PATH: &str = "/auth/app/token";
const DEVICE_LIST_PATH: &str = "/productModule/device/queryDeviceListByConsumerId";
const DEVICE_DETAIL_PATH: &str = "/device/solarFlow/detail";
const DEVELOPER_APPLY_PATH: &str = "/developer/api/apply";

/// Application id the vendor app logs in with.
const APP_ID: &str = "121c83f761305d6cf7e";
const APP_VERSION: &str = "4.3.1";
const USER_AGENT: &str = "Zendure/4.3.1 (iPhone; iOS 14.4.2; Scale/3.00)";
const AUTH_HEADER: &str = "Blade-Auth";

/// Vendor response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    msg: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, DirectoryError> {
        if !self.success {
            return Err(DirectoryError::Api {
                code: self.code,
                message: self.msg.unwrap_or_default(),
            });
        }
        self.data
            .ok_or_else(|| DirectoryError::MissingField("data".to_string()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenData {
    access_token: String,
}

/// Zendure cloud directory reached over HTTPS.
///
/// Logs in lazily on the first request with the account credentials and
/// reuses the bearer token afterwards.
///
/// # Examples
///
/// ```no_run
/// use zendure_lib::directory::{DirectoryService, ZendureCloud};
///
/// # async fn example() -> Result<(), zendure_lib::error::DirectoryError> {
/// let cloud = ZendureCloud::new("user@example.com", "password")?;
/// for device in cloud.list_devices().await? {
///     println!("{} ({})", device.id, device.product_name);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ZendureCloud {
    client: Client,
    base_url: String,
    account: String,
    password: String,
    token: Mutex<Option<String>>,
}

impl ZendureCloud {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a client for the default API URL.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(
        account: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, DirectoryError> {
        Self::with_base_url(DEFAULT_API_URL, account, password)
    }

    /// Creates a client for a custom API URL.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn with_base_url(
        base_url: impl Into<String>,
        account: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, DirectoryError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-EN"),
        );
        headers.insert(
            HeaderName::from_static("appversion"),
            HeaderValue::from_static(APP_VERSION),
        );

        let client = Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account: account.into(),
            password: password.into(),
            token: Mutex::new(None),
        })
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns whether a bearer token is cached.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.lock().is_some()
    }

    async fn token(&self) -> Result<String, DirectoryError> {
        let cached = self.token.lock().clone();
        if let Some(token) = cached {
            return Ok(token);
        }
        let token = self.authenticate().await?;
        *self.token.lock() = Some(token.clone());
        Ok(token)
    }

    async fn authenticate(&self) -> Result<String, DirectoryError> {
        tracing::info!(url = %self.base_url, "Authenticating with Zendure cloud");

        let body = json!({
            "password": self.password,
            "account": self.account,
            "appId": APP_ID,
            "appType": "iOS",
            "grantType": "password",
            "tenantId": "",
        });
        let response = self
            .client
            .post(format!("{}{AUTH_PATH}", self.base_url))
            .header(AUTH_HEADER, "bearer (null)")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Zendure cloud login refused");
            return Err(DirectoryError::AuthenticationFailed);
        }

        let envelope: Envelope<TokenData> = response.json().await?;
        let data = envelope.into_data().map_err(|e| {
            tracing::warn!(error = %e, "Zendure cloud login refused");
            DirectoryError::AuthenticationFailed
        })?;
        Ok(data.access_token)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, DirectoryError> {
        let token = self.token().await?;
        let url = format!("{}{path}", self.base_url);

        tracing::debug!(url = %url, "Sending directory request");

        let response = self
            .client
            .post(&url)
            .header(AUTH_HEADER, format!("bearer {token}"))
            .json(body)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            *self.token.lock() = None;
            return Err(DirectoryError::AuthenticationFailed);
        }

        if !response.status().is_success() {
            return Err(DirectoryError::Api {
                code: i64::from(response.status().as_u16()),
                message: response
                    .status()
                    .canonical_reason()
                    .unwrap_or("Unknown")
                    .to_string(),
            });
        }

        let envelope: Envelope<T> = response.json().await?;
        envelope.into_data()
    }
}

impl std::fmt::Debug for ZendureCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZendureCloud")
            .field("base_url", &self.base_url)
            .field("account", &self.account)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl DirectoryService for ZendureCloud {
    async fn list_devices(&self) -> Result<Vec<DeviceSummary>, DirectoryError> {
        let devices: Vec<DeviceSummary> = self.post(DEVICE_LIST_PATH, &json!({})).await?;
        tracing::info!(count = devices.len(), "Fetched device list");
        Ok(devices)
    }

    async fn device_detail(&self, id: &str) -> Result<DeviceDetail, DirectoryError> {
        self.post(DEVICE_DETAIL_PATH, &json!({ "deviceId": id })).await
    }

    async fn delegated_secret(
        &self,
        account: &str,
        serial_number: &str,
    ) -> Result<DelegatedSecret, DirectoryError> {
        self.post(
            DEVELOPER_APPLY_PATH,
            &json!({ "account": account, "snNumber": serial_number }),
        )
        .await
    }
}
