use crate::constants::{STATUS_ACTIVE, STATUS_PAUSED};
use crate::crypto::Decryptor;
use crate::db::{CredentialStore, DatabaseError, RuleStore};
use crate::facebook::GraphClient;
use crate::models::{ActionLog, AutomationRule, CampaignMetrics, CampaignRow, Session};
use crate::runner::{evaluate_condition, fetch_campaigns_partial};
use crate::tokens::build_tokens_for_user;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{self, Duration};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub rules: usize,
    pub campaigns_checked: usize,
    pub matched: usize,
    pub paused: usize,
    pub failed_pauses: usize,
    pub failed_logs: usize,
    pub skipped_accounts: usize,
    pub failed_accounts: usize,
}

pub struct AutomationWorker<S> {
    store: Arc<Mutex<S>>,
    api: GraphClient,
    decryptor: Box<dyn Decryptor>,
    dry_run: bool,
    interval: Duration,
}

impl<S> AutomationWorker<S>
where
    S: CredentialStore + RuleStore,
{
    pub fn new(
        store: Arc<Mutex<S>>,
        api: GraphClient,
        decryptor: Box<dyn Decryptor>,
        dry_run: bool,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            api,
            decryptor,
            dry_run,
            interval,
        }
    }

    pub async fn run_once(&self) -> Result<RunSummary, WorkerError> {
        let rules = self.store.lock().await.active_rules().await?;
        let mut summary = RunSummary {
            rules: rules.len(),
            ..Default::default()
        };

        for rule in &rules {
            self.process_rule(rule, &mut summary).await;
        }

        log::info!(
            "Automation pass done: {} rules, {} campaigns checked, {} matched, {} paused, {} pause failures, {} unlogged",
            summary.rules,
            summary.campaigns_checked,
            summary.matched,
            summary.paused,
            summary.failed_pauses,
            summary.failed_logs
        );
        Ok(summary)
    }

    async fn process_rule(&self, rule: &AutomationRule, summary: &mut RunSummary) {
        if rule.conditions.is_empty() {
            log::warn!("Rule {} has no conditions, skipping", rule.id);
            return;
        }

        let session = Session {
            user_id: Some(rule.user_id.clone()),
            ..Default::default()
        };
        let tokens = {
            let store = self.store.lock().await;
            build_tokens_for_user(&*store, self.decryptor.as_ref(), &session).await
        };
        if tokens.is_empty() {
            log::warn!("No credentials available for rule {} (user {})", rule.id, rule.user_id);
            return;
        }

        let report = fetch_campaigns_partial(&self.api, &self.api, &rule.ad_account_ids, &tokens).await;
        summary.skipped_accounts += report.skipped.len();
        summary.failed_accounts += report.failures.len();
        for skipped in &report.skipped {
            log::warn!("Rule {}: no valid token for {}", rule.id, skipped);
        }
        for failure in &report.failures {
            log::error!("Rule {}: fetching {} failed: {}", rule.id, failure.ad_account_id, failure.error);
        }

        for row in &report.rows {
            summary.campaigns_checked += 1;
            if !should_pause(row) || !rule_matches(rule, &row.metrics) {
                continue;
            }
            summary.matched += 1;

            let success = if self.dry_run {
                log::info!("[dry run] Rule {} would pause campaign {} ({})", rule.name, row.name, row.id);
                false
            } else {
                let paused = match report.tokens.get(&row.ad_account_id) {
                    Some(token) => self.api.pause_campaign(&row.id, token).await,
                    None => false,
                };
                if paused {
                    summary.paused += 1;
                    log::info!("Rule {} paused campaign {} ({})", rule.name, row.name, row.id);
                } else {
                    summary.failed_pauses += 1;
                    log::warn!("Rule {} could not pause campaign {} ({})", rule.name, row.name, row.id);
                }
                paused
            };

            let entry = ActionLog {
                rule_id: rule.id.clone(),
                ad_account_id: row.ad_account_id.clone(),
                campaign_id: row.id.clone(),
                campaign_name: row.name.clone(),
                action: STATUS_PAUSED.to_string(),
                success,
                dry_run: self.dry_run,
                executed_at: Utc::now(),
            };
            if let Err(e) = self.store.lock().await.record_action(&entry).await {
                summary.failed_logs += 1;
                log::error!("Rule {}: could not record action on campaign {}: {}", rule.id, row.id, e);
            }
        }
    }

    pub async fn run(&self) -> Result<(), WorkerError> {
        loop {
            if let Err(e) = self.run_once().await {
                log::error!("Automation pass failed: {}", e);
            }

            time::sleep(self.interval).await;
        }
    }
}

pub fn should_pause(row: &CampaignRow) -> bool {
    row.status == STATUS_ACTIVE && row.effective_status == STATUS_ACTIVE
}

// A rule without conditions never matches
pub fn rule_matches(rule: &AutomationRule, metrics: &CampaignMetrics) -> bool {
    !rule.conditions.is_empty() && rule.conditions.iter().all(|c| evaluate_condition(c, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Condition, ConditionOp, StoredUser};
    use crate::test_support::{MemoryStore, PrefixDecryptor};
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    fn rule(conditions: Vec<Condition>) -> AutomationRule {
        AutomationRule {
            id: "rule-1".to_string(),
            user_id: "u1".to_string(),
            name: "Stop expensive chats".to_string(),
            ad_account_ids: vec!["act_1".to_string()],
            conditions,
            is_active: true,
        }
    }

    fn expensive_chats() -> Vec<Condition> {
        vec![
            Condition { metric: "spend".to_string(), op: ConditionOp::Gt, value: 100.0 },
            Condition { metric: "costPerMessage".to_string(), op: ConditionOp::Gte, value: 20.0 },
        ]
    }

    fn campaign(id: &str, status: &str, spend: &str, messages: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": format!("Campaign {}", id),
            "status": status,
            "effective_status": status,
            "insights": {"data": [{
                "spend": spend,
                "actions": [{"action_type": "onsite_conversion.messaging_conversation_started_7d", "value": messages}]
            }]}
        })
    }

    fn store_with(rule: AutomationRule) -> MemoryStore {
        let mut store = MemoryStore::default();
        store.add_user(StoredUser {
            id: "u1".to_string(),
            email: Some("me@example.com".to_string()),
            encrypted_ad_token: Some("enc:TOKEN".to_string()),
            linked_tokens: vec![],
        });
        store.rules.push(rule);
        store
    }

    async fn mock_token_check(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock_async(|when, then| {
            when.method(GET).path("/v20.0/act_1").query_param("access_token", "TOKEN");
            then.status(200).json_body(json!({"id": "act_1"}));
        }).await
    }

    async fn mock_campaigns(server: &MockServer, campaigns: Vec<serde_json::Value>) {
        server.mock_async(|when, then| {
            when.method(GET).path("/v20.0/act_1/campaigns");
            then.status(200).json_body(json!({"data": campaigns}));
        }).await;
    }

    async fn mock_account(server: &MockServer) -> httpmock::Mock<'_> {
        let token_check = mock_token_check(server).await;
        mock_campaigns(server, vec![
            campaign("c1", "ACTIVE", "250.00", "10"),
            campaign("c2", "ACTIVE", "250.00", "50"),
            campaign("c3", "PAUSED", "900.00", "1"),
            campaign("c4", "ACTIVE", "40.00", "1"),
        ]).await;
        token_check
    }

    fn build_worker(store: MemoryStore, server: &MockServer, dry_run: bool) -> (AutomationWorker<MemoryStore>, Arc<Mutex<MemoryStore>>) {
        build_worker_with_timeout(store, server, dry_run, Duration::from_secs(5))
    }

    fn build_worker_with_timeout(
        store: MemoryStore,
        server: &MockServer,
        dry_run: bool,
        timeout: Duration,
    ) -> (AutomationWorker<MemoryStore>, Arc<Mutex<MemoryStore>>) {
        let store = Arc::new(Mutex::new(store));
        let worker = AutomationWorker::new(
            store.clone(),
            GraphClient::new(&server.base_url(), "v20.0", timeout).unwrap(),
            Box::new(PrefixDecryptor),
            dry_run,
            Duration::from_secs(60),
        );
        (worker, store)
    }

    #[test]
    fn rule_needs_every_condition() {
        let expensive = rule(expensive_chats());
        let matching = CampaignMetrics { spend: 250.0, messages: 10.0, cost_per_message: 25.0, ..Default::default() };
        let cheap = CampaignMetrics { spend: 250.0, messages: 50.0, cost_per_message: 5.0, ..Default::default() };
        assert!(rule_matches(&expensive, &matching));
        assert!(!rule_matches(&expensive, &cheap));
        assert!(!rule_matches(&rule(vec![]), &matching));
    }

    #[tokio::test]
    async fn pauses_only_matching_active_campaigns() {
        let server = MockServer::start_async().await;
        let token_check = mock_account(&server).await;
        let pause = server.mock_async(|when, then| {
            when.method(POST).path("/v20.0/c1").body_contains("status=PAUSED");
            then.status(200).json_body(json!({"success": true}));
        }).await;

        let (worker, store) = build_worker(store_with(rule(expensive_chats())), &server, false);
        let summary = worker.run_once().await.unwrap();

        assert_eq!(summary.rules, 1);
        assert_eq!(summary.campaigns_checked, 4);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.paused, 1);
        assert_eq!(summary.failed_pauses, 0);
        pause.assert_hits_async(1).await;
        // The token that read the account is reused for the pause
        token_check.assert_hits_async(1).await;

        let actions = store.lock().await.recorded_actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].campaign_id, "c1");
        assert!(actions[0].success);
        assert!(!actions[0].dry_run);
    }

    #[tokio::test]
    async fn rejected_pause_is_recorded_and_run_continues() {
        let server = MockServer::start_async().await;
        mock_account(&server).await;
        server.mock_async(|when, then| {
            when.method(POST).path("/v20.0/c1");
            then.status(400).json_body(json!({"error": {"message": "permission"}}));
        }).await;

        let (worker, store) = build_worker(store_with(rule(expensive_chats())), &server, false);
        let summary = worker.run_once().await.unwrap();

        assert_eq!(summary.paused, 0);
        assert_eq!(summary.failed_pauses, 1);
        let actions = store.lock().await.recorded_actions();
        assert_eq!(actions.len(), 1);
        assert!(!actions[0].success);
    }

    #[tokio::test]
    async fn dry_run_never_posts() {
        let server = MockServer::start_async().await;
        let token_check = mock_account(&server).await;
        let pause = server.mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        }).await;

        let (worker, store) = build_worker(store_with(rule(expensive_chats())), &server, true);
        let summary = worker.run_once().await.unwrap();

        assert_eq!(summary.matched, 1);
        assert_eq!(summary.paused, 0);
        pause.assert_hits_async(0).await;
        token_check.assert_hits_async(1).await;
        let actions = store.lock().await.recorded_actions();
        assert!(actions[0].dry_run);
        assert!(!actions[0].success);
    }

    #[tokio::test]
    async fn log_write_failure_does_not_stop_pauses() {
        let server = MockServer::start_async().await;
        mock_token_check(&server).await;
        mock_campaigns(&server, vec![
            campaign("c1", "ACTIVE", "250.00", "10"),
            campaign("c2", "ACTIVE", "300.00", "12"),
        ]).await;
        let pause_c1 = server.mock_async(|when, then| {
            when.method(POST).path("/v20.0/c1").body_contains("status=PAUSED");
            then.status(200).json_body(json!({"success": true}));
        }).await;
        let pause_c2 = server.mock_async(|when, then| {
            when.method(POST).path("/v20.0/c2").body_contains("status=PAUSED");
            then.status(200).json_body(json!({"success": true}));
        }).await;

        let mut store = store_with(rule(expensive_chats()));
        store.fail_records = true;
        let (worker, store) = build_worker(store, &server, false);
        let summary = worker.run_once().await.unwrap();

        assert_eq!(summary.matched, 2);
        assert_eq!(summary.paused, 2);
        assert_eq!(summary.failed_logs, 2);
        pause_c1.assert_hits_async(1).await;
        pause_c2.assert_hits_async(1).await;
        assert!(store.lock().await.recorded_actions().is_empty());
    }

    #[tokio::test]
    async fn slow_account_times_out_and_pass_finishes() {
        let server = MockServer::start_async().await;
        mock_token_check(&server).await;
        server.mock_async(|when, then| {
            when.method(GET).path("/v20.0/act_1/campaigns");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!({"data": [campaign("c1", "ACTIVE", "250.00", "10")]}));
        }).await;
        let pause = server.mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        }).await;

        let (worker, store) = build_worker_with_timeout(
            store_with(rule(expensive_chats())),
            &server,
            false,
            Duration::from_millis(500),
        );
        let summary = worker.run_once().await.unwrap();

        assert_eq!(summary.failed_accounts, 1);
        assert_eq!(summary.campaigns_checked, 0);
        pause.assert_hits_async(0).await;
        assert!(store.lock().await.recorded_actions().is_empty());
    }

    #[tokio::test]
    async fn user_without_credentials_is_skipped() {
        let server = MockServer::start_async().await;
        let mut store = MemoryStore::default();
        store.rules.push(rule(expensive_chats()));

        let (worker, store) = build_worker(store, &server, false);
        let summary = worker.run_once().await.unwrap();

        assert_eq!(summary.rules, 1);
        assert_eq!(summary.campaigns_checked, 0);
        assert!(store.lock().await.recorded_actions().is_empty());
    }
}
