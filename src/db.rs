use crate::constants::PROVIDER_FACEBOOK;
use crate::models::{ActionLog, AutomationRule, Condition, DelegatedCredential, StoredUser, TeamMembership};
use async_trait::async_trait;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use postgres_openssl::MakeTlsConnector;
use std::str::FromStr;
use thiserror::Error;
use tokio_postgres::{Client, Config};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] tokio_postgres::Error),
    #[error("SSL error: {0}")]
    SslError(#[from] openssl::error::ErrorStack),
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),
    #[error("Invalid stored rule {id}: {reason}")]
    InvalidRule { id: String, reason: String },
}

/// Read side of the credential tables used to assemble candidate tokens.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<StoredUser>, DatabaseError>;

    async fn find_team_membership(
        &self,
        member_email: &str,
    ) -> Result<Option<TeamMembership>, DatabaseError>;

    async fn find_delegated_credentials(
        &self,
        owner_id: &str,
    ) -> Result<Vec<DelegatedCredential>, DatabaseError>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn active_rules(&self) -> Result<Vec<AutomationRule>, DatabaseError>;

    async fn record_action(&self, log: &ActionLog) -> Result<(), DatabaseError>;
}

pub struct Database {
    client: Client,
}

impl Database {
    pub async fn new(database_url: &str, verify_tls: bool) -> Result<Self, DatabaseError> {
        let mut builder = SslConnector::builder(SslMethod::tls())?;
        if !verify_tls {
            builder.set_verify(SslVerifyMode::NONE);
        }
        let connector = MakeTlsConnector::new(builder.build());

        let mut config = Config::from_str(database_url)
            .map_err(|e| DatabaseError::InvalidConnectionString(e.to_string()))?;

        let (client, connection) = config
            .connect_timeout(std::time::Duration::from_secs(5))
            .connect(connector)
            .await
            .map_err(DatabaseError::ConnectionError)?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::error!("Database connection error: {}", e);
            }
        });

        Ok(Self { client })
    }
}

#[async_trait]
impl CredentialStore for Database {
    async fn find_user(&self, user_id: &str) -> Result<Option<StoredUser>, DatabaseError> {
        let row = self.client.query_opt(
            "SELECT id, email, facebook_ad_token FROM users WHERE id = $1",
            &[&user_id],
        ).await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let linked = self.client.query(
            "SELECT access_token
             FROM accounts
             WHERE user_id = $1 AND provider = $2 AND access_token IS NOT NULL
             ORDER BY created_at",
            &[&user_id, &PROVIDER_FACEBOOK],
        ).await?;

        Ok(Some(StoredUser {
            id: row.get(0),
            email: row.get(1),
            encrypted_ad_token: row.get(2),
            linked_tokens: linked.iter().map(|r| r.get(0)).collect(),
        }))
    }

    async fn find_team_membership(
        &self,
        member_email: &str,
    ) -> Result<Option<TeamMembership>, DatabaseError> {
        let row = self.client.query_opt(
            "SELECT user_id, member_email
             FROM team_members
             WHERE LOWER(member_email) = LOWER($1)
             LIMIT 1",
            &[&member_email],
        ).await?;

        Ok(row.map(|row| TeamMembership {
            owner_id: row.get(0),
            member_email: row.get(1),
        }))
    }

    async fn find_delegated_credentials(
        &self,
        owner_id: &str,
    ) -> Result<Vec<DelegatedCredential>, DatabaseError> {
        let rows = self.client.query(
            "SELECT member_type, facebook_user_id, facebook_name, access_token
             FROM team_members
             WHERE user_id = $1
             ORDER BY created_at",
            &[&owner_id],
        ).await?;

        Ok(rows
            .iter()
            .map(|row| DelegatedCredential {
                member_type: row.get(0),
                facebook_user_id: row.get(1),
                facebook_name: row.get(2),
                access_token: row.get(3),
            })
            .collect())
    }
}

#[async_trait]
impl RuleStore for Database {
    async fn active_rules(&self) -> Result<Vec<AutomationRule>, DatabaseError> {
        let rows = self.client.query(
            "SELECT id, user_id, name, ad_account_ids, conditions, is_active
             FROM automation_rules
             WHERE is_active = true
             ORDER BY created_at",
            &[],
        ).await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get(0);
            match parse_conditions(&id, row.get(4)) {
                Ok(conditions) => rules.push(AutomationRule {
                    id,
                    user_id: row.get(1),
                    name: row.get(2),
                    ad_account_ids: row.get(3),
                    conditions,
                    is_active: row.get(5),
                }),
                // a malformed rule must not block the others
                Err(e) => log::warn!("Skipping rule: {}", e),
            }
        }

        Ok(rules)
    }

    async fn record_action(&self, log: &ActionLog) -> Result<(), DatabaseError> {
        self.client.execute(
            "INSERT INTO automation_logs
                (rule_id, ad_account_id, campaign_id, campaign_name, action, success, dry_run, executed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &log.rule_id,
                &log.ad_account_id,
                &log.campaign_id,
                &log.campaign_name,
                &log.action,
                &log.success,
                &log.dry_run,
                &log.executed_at,
            ],
        ).await?;

        Ok(())
    }
}

fn parse_conditions(rule_id: &str, raw: serde_json::Value) -> Result<Vec<Condition>, DatabaseError> {
    serde_json::from_value(raw).map_err(|e| DatabaseError::InvalidRule {
        id: rule_id.to_string(),
        reason: e.to_string(),
    })
}
