use crate::constants::FB_MESSAGING_ACTION_TYPE;
use crate::facebook::{FacebookApiError, GraphClient};
use crate::models::{CampaignMetrics, CampaignRow, Condition, ConditionOp, MetricSource, TokenInfo};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

#[async_trait]
pub trait TokenResolver: Send + Sync {
    async fn resolve(&self, ad_account_id: &str, tokens: &[TokenInfo]) -> Option<String>;
}

#[async_trait]
impl TokenResolver for GraphClient {
    async fn resolve(&self, ad_account_id: &str, tokens: &[TokenInfo]) -> Option<String> {
        for candidate in tokens {
            if self.can_read_ad_account(ad_account_id, &candidate.token).await {
                log::debug!("Using token '{}' for {}", candidate.name, ad_account_id);
                return Some(candidate.token.clone());
            }
        }
        None
    }
}

#[derive(Debug)]
pub struct AccountFailure {
    pub ad_account_id: String,
    pub error: FacebookApiError,
}

#[derive(Debug, Default)]
pub struct FetchReport {
    pub rows: Vec<CampaignRow>,
    pub skipped: Vec<String>,
    pub failures: Vec<AccountFailure>,
    pub tokens: HashMap<String, String>, // ad account -> token that read it
}

pub fn normalize_ad_account_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("act_") {
        raw.to_string()
    } else {
        format!("act_{}", raw)
    }
}

/// All campaigns across `ad_account_ids`, in the order given.
///
/// Accounts with no usable token are skipped silently. Any upstream fault
/// aborts the whole call and discards rows already fetched.
pub async fn fetch_campaigns_for_runner<R: TokenResolver + ?Sized>(
    api: &GraphClient,
    resolver: &R,
    ad_account_ids: &[String],
    tokens: &[TokenInfo],
) -> Result<Vec<CampaignRow>, FacebookApiError> {
    let mut rows = Vec::new();

    for raw_id in ad_account_ids {
        let ad_account_id = normalize_ad_account_id(raw_id);
        let Some(token) = resolver.resolve(&ad_account_id, tokens).await else {
            log::debug!("No valid token for {}, skipping", ad_account_id);
            continue;
        };

        rows.extend(fetch_account_campaigns(api, &ad_account_id, &token).await?);
    }

    Ok(rows)
}

pub async fn fetch_campaigns_partial<R: TokenResolver + ?Sized>(
    api: &GraphClient,
    resolver: &R,
    ad_account_ids: &[String],
    tokens: &[TokenInfo],
) -> FetchReport {
    let mut report = FetchReport::default();

    for raw_id in ad_account_ids {
        let ad_account_id = normalize_ad_account_id(raw_id);
        let Some(token) = resolver.resolve(&ad_account_id, tokens).await else {
            report.skipped.push(ad_account_id);
            continue;
        };

        // A failing account only loses its own rows
        match fetch_account_campaigns(api, &ad_account_id, &token).await {
            Ok(rows) => {
                report.rows.extend(rows);
                report.tokens.insert(ad_account_id, token);
            }
            Err(error) => report.failures.push(AccountFailure { ad_account_id, error }),
        }
    }

    report
}

pub async fn fetch_account_campaigns(
    api: &GraphClient,
    ad_account_id: &str,
    token: &str,
) -> Result<Vec<CampaignRow>, FacebookApiError> {
    let mut rows = Vec::new();
    let mut page = api.get_campaigns_first_page(ad_account_id, token).await?;

    loop {
        rows.extend(page.data.iter().map(|raw| campaign_row(ad_account_id, raw)));

        let next = page.paging.and_then(|p| p.next).filter(|next| !next.is_empty());
        match next {
            Some(url) => page = api.get_campaigns_next_page(&url).await?,
            None => break,
        }
    }

    log::debug!("Fetched {} campaigns for {}", rows.len(), ad_account_id);
    Ok(rows)
}

pub fn campaign_row(ad_account_id: &str, raw: &Value) -> CampaignRow {
    CampaignRow {
        id: text(raw, "id"),
        name: text(raw, "name"),
        ad_account_id: ad_account_id.to_string(),
        status: text(raw, "status"),
        effective_status: text(raw, "effective_status"),
        metrics: campaign_metrics(raw),
    }
}

pub fn campaign_metrics(raw: &Value) -> CampaignMetrics {
    // One date range requested, so one bucket
    let insights = raw
        .get("insights")
        .and_then(|i| i.get("data"))
        .and_then(|d| d.get(0))
        .unwrap_or(&Value::Null);

    let messages = insights
        .get("actions")
        .and_then(|actions| {
            actions.as_array()?.iter().find(|action| {
                action.get("action_type").and_then(|t| t.as_str()) == Some(FB_MESSAGING_ACTION_TYPE)
            })
        })
        .map(|action| number(action.get("value")))
        .unwrap_or(0.0);

    let spend = number(insights.get("spend"));

    CampaignMetrics {
        spend,
        messages,
        impressions: number(insights.get("impressions")),
        reach: number(insights.get("reach")),
        clicks: number(insights.get("clicks")),
        cost_per_message: if messages > 0.0 { spend / messages } else { 0.0 },
    }
}

// Graph sends most numbers as strings
fn number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    finite_or_zero(parsed)
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn text(raw: &Value, key: &str) -> String {
    raw.get(key).and_then(|v| v.as_str()).unwrap_or("").to_string()
}

pub fn evaluate_condition<M: MetricSource + ?Sized>(condition: &Condition, metrics: &M) -> bool {
    let actual = finite_or_zero(metrics.metric(&condition.metric));
    let threshold = condition.value;

    match condition.op {
        ConditionOp::Gt => actual > threshold,
        ConditionOp::Gte => actual >= threshold,
        ConditionOp::Lt => actual < threshold,
        ConditionOp::Lte => actual <= threshold,
        ConditionOp::Eq => actual == threshold,
        ConditionOp::Unknown => false,
    }
}
