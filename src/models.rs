use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A candidate credential, tried in list order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TokenInfo {
    pub token: String,
    pub name: String,
}

impl TokenInfo {
    pub fn new(token: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            name: name.into(),
        }
    }
}

/// Who the automation pass acts on behalf of.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Session {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMetrics {
    pub spend: f64,
    pub messages: f64,
    pub impressions: f64,
    pub reach: f64,
    pub clicks: f64,
    pub cost_per_message: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CampaignRow {
    pub id: String,
    pub name: String,
    pub ad_account_id: String,
    pub status: String,
    pub effective_status: String,
    pub metrics: CampaignMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Condition {
    pub metric: String,
    pub op: ConditionOp,
    pub value: f64,
}

/// Anything a condition can read a named metric from.
pub trait MetricSource {
    fn metric(&self, name: &str) -> Option<f64>;
}

impl MetricSource for CampaignMetrics {
    fn metric(&self, name: &str) -> Option<f64> {
        match name {
            "spend" => Some(self.spend),
            "messages" => Some(self.messages),
            "impressions" => Some(self.impressions),
            "reach" => Some(self.reach),
            "clicks" => Some(self.clicks),
            "costPerMessage" | "cost_per_message" => Some(self.cost_per_message),
            _ => None,
        }
    }
}

impl MetricSource for HashMap<String, f64> {
    fn metric(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoredUser {
    pub id: String,
    pub email: Option<String>,
    pub encrypted_ad_token: Option<String>, // AES-GCM, see crypto.rs
    pub linked_tokens: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TeamMembership {
    pub owner_id: String,
    pub member_email: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DelegatedCredential {
    pub member_type: String,
    pub facebook_user_id: Option<String>,
    pub facebook_name: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AutomationRule {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub ad_account_ids: Vec<String>,
    pub conditions: Vec<Condition>,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ActionLog {
    pub rule_id: String,
    pub ad_account_id: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub action: String,
    pub success: bool,
    pub dry_run: bool,
    pub executed_at: DateTime<Utc>,
}
