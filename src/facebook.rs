use crate::constants::{
    FB_CAMPAIGN_FIELDS,
    FB_CAMPAIGN_PAGE_LIMIT,
    FB_TOKEN_CHECK_FIELDS,
    STATUS_PAUSED,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FacebookApiError {
    #[error("API request failed: {0}")]
    RequestFailed(String),
    #[error("Graph API error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// One page of `/{act_id}/campaigns`. Records stay raw JSON; `runner` normalises them.
#[derive(Debug, Deserialize, Default)]
pub struct CampaignPage {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Paging {
    pub next: Option<String>,
}

pub struct GraphClient {
    client: Client,
    base_url: String,
}

impl GraphClient {
    /// `timeout` bounds every request, so a hung connection fails instead of stalling the worker.
    pub fn new(base_url: &str, version: &str, timeout: Duration) -> Result<Self, FacebookApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FacebookApiError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: format!("{}/{}", base_url.trim_end_matches('/'), version),
        })
    }

    pub fn campaigns_url(&self, ad_account_id: &str) -> String {
        format!("{}/{}/campaigns", self.base_url, ad_account_id)
    }

    /// First page of an account's campaigns with trailing-30-day insights.
    pub async fn get_campaigns_first_page(
        &self,
        ad_account_id: &str,
        access_token: &str,
    ) -> Result<CampaignPage, FacebookApiError> {
        let url = self.campaigns_url(ad_account_id);
        let limit = FB_CAMPAIGN_PAGE_LIMIT.to_string();

        let response = self.client
            .get(&url)
            .query(&[
                ("fields", FB_CAMPAIGN_FIELDS),
                ("limit", limit.as_str()),
                ("access_token", access_token),
            ])
            .send()
            .await
            .map_err(|e| FacebookApiError::RequestFailed(e.to_string()))?;

        Self::read_page(response).await
    }

    /// Follows a `paging.next` URL as-is; it already carries the token and cursor.
    pub async fn get_campaigns_next_page(&self, next_url: &str) -> Result<CampaignPage, FacebookApiError> {
        let response = self.client
            .get(next_url)
            .send()
            .await
            .map_err(|e| FacebookApiError::RequestFailed(e.to_string()))?;

        Self::read_page(response).await
    }

    async fn read_page(response: reqwest::Response) -> Result<CampaignPage, FacebookApiError> {
        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(FacebookApiError::Upstream {
                    status: status.as_u16(),
                    message: status.to_string(),
                });
            }
            Err(e) => return Err(FacebookApiError::InvalidResponse(e.to_string())),
        };

        if let Some(error) = body.get("error") {
            return Err(FacebookApiError::Upstream {
                status: status.as_u16(),
                message: error_message(error),
            });
        }
        if !status.is_success() {
            return Err(FacebookApiError::Upstream {
                status: status.as_u16(),
                message: status.to_string(),
            });
        }

        serde_json::from_value(body).map_err(|e| FacebookApiError::InvalidResponse(e.to_string()))
    }

    /// True when `access_token` can read `ad_account_id`.
    pub async fn can_read_ad_account(&self, ad_account_id: &str, access_token: &str) -> bool {
        let url = format!("{}/{}", self.base_url, ad_account_id);

        let response = match self.client
            .get(&url)
            .query(&[("fields", FB_TOKEN_CHECK_FIELDS), ("access_token", access_token)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Token check for {} failed: {}", ad_account_id, e);
                return false;
            }
        };

        if !response.status().is_success() {
            return false;
        }

        match response.json::<Value>().await {
            Ok(body) => body.get("error").is_none(),
            Err(_) => false,
        }
    }

    /// Sets a campaign to PAUSED. Any failure, whatever the cause, is `false`.
    pub async fn pause_campaign(&self, campaign_id: &str, access_token: &str) -> bool {
        let url = format!("{}/{}", self.base_url, campaign_id);

        let result = self.client
            .post(&url)
            .form(&[("status", STATUS_PAUSED), ("access_token", access_token)])
            .send()
            .await;

        match result {
            Ok(response) => {
                let ok = response.status().is_success();
                if !ok {
                    log::debug!("Pause of campaign {} rejected with {}", campaign_id, response.status());
                }
                ok
            }
            Err(e) => {
                log::debug!("Pause of campaign {} failed: {}", campaign_id, e);
                false
            }
        }
    }
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}
