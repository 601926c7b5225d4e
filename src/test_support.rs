use crate::crypto::{CryptoError, Decryptor};
use crate::db::{CredentialStore, DatabaseError, RuleStore};
use crate::models::{ActionLog, AutomationRule, DelegatedCredential, StoredUser, TeamMembership};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// "Decrypts" `enc:<token>`; anything else is malformed.
pub struct PrefixDecryptor;

impl Decryptor for PrefixDecryptor {
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        ciphertext
            .strip_prefix("enc:")
            .map(str::to_string)
            .ok_or_else(|| CryptoError::Malformed(ciphertext.to_string()))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub users: HashMap<String, StoredUser>,
    pub memberships: Vec<TeamMembership>,
    pub delegated: HashMap<String, Vec<DelegatedCredential>>,
    pub rules: Vec<AutomationRule>,
    pub actions: Mutex<Vec<ActionLog>>,
    pub fail_user_ids: Vec<String>,
    pub fail_team_lookups: bool,
    pub fail_records: bool,
}

impl MemoryStore {
    pub fn add_user(&mut self, user: StoredUser) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn recorded_actions(&self) -> Vec<ActionLog> {
        self.actions.lock().unwrap().clone()
    }
}

fn unavailable() -> DatabaseError {
    DatabaseError::InvalidConnectionString("store unavailable".to_string())
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<StoredUser>, DatabaseError> {
        if self.fail_user_ids.iter().any(|id| id == user_id) {
            return Err(unavailable());
        }
        Ok(self.users.get(user_id).cloned())
    }

    async fn find_team_membership(
        &self,
        member_email: &str,
    ) -> Result<Option<TeamMembership>, DatabaseError> {
        if self.fail_team_lookups {
            return Err(unavailable());
        }
        Ok(self
            .memberships
            .iter()
            .find(|m| m.member_email.eq_ignore_ascii_case(member_email))
            .cloned())
    }

    async fn find_delegated_credentials(
        &self,
        owner_id: &str,
    ) -> Result<Vec<DelegatedCredential>, DatabaseError> {
        Ok(self.delegated.get(owner_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn active_rules(&self) -> Result<Vec<AutomationRule>, DatabaseError> {
        Ok(self.rules.iter().filter(|r| r.is_active).cloned().collect())
    }

    async fn record_action(&self, log: &ActionLog) -> Result<(), DatabaseError> {
        if self.fail_records {
            return Err(unavailable());
        }
        self.actions.lock().unwrap().push(log.clone());
        Ok(())
    }
}
