use crate::constants::PROVIDER_FACEBOOK;
use crate::crypto::Decryptor;
use crate::db::CredentialStore;
use crate::models::{Session, StoredUser, TokenInfo};

/// Ordered, duplicate-free candidate tokens. Entries are only ever appended.
#[derive(Debug, Default)]
struct TokenList {
    tokens: Vec<TokenInfo>,
}

impl TokenList {
    fn push(&mut self, token: &str, name: impl Into<String>) {
        if token.is_empty() || self.tokens.iter().any(|t| t.token == token) {
            return;
        }
        self.tokens.push(TokenInfo::new(token, name));
    }

    /// Primary (decrypted) credential followed by provider-linked ones.
    fn push_user(&mut self, user: &StoredUser, decryptor: &dyn Decryptor, primary: &str, linked: &str) {
        if let Some(encrypted) = user.encrypted_ad_token.as_deref() {
            match decryptor.decrypt(encrypted) {
                Ok(token) => self.push(&token, primary),
                Err(e) => log::warn!("Could not decrypt ad token for user {}: {}", user.id, e),
            }
        }
        for token in &user.linked_tokens {
            self.push(token, linked);
        }
    }
}

/// Every token usable on behalf of `session`, most preferred first:
/// own account, directly linked, team owner, team members, session.
///
/// Each source is tried on its own; a failing lookup or decrypt only drops
/// that source's contribution.
pub async fn build_tokens_for_user<S>(
    store: &S,
    decryptor: &dyn Decryptor,
    session: &Session,
) -> Vec<TokenInfo>
where
    S: CredentialStore + ?Sized,
{
    let Some(user_id) = session.user_id.as_deref().filter(|id| !id.is_empty()) else {
        return Vec::new();
    };

    let mut list = TokenList::default();

    let user = match store.find_user(user_id).await {
        Ok(user) => user,
        Err(e) => {
            log::warn!("Could not load user {}: {}", user_id, e);
            None
        }
    };
    if let Some(user) = &user {
        list.push_user(user, decryptor, "Your account", "Linked account");
    }

    let email = session
        .email
        .clone()
        .or_else(|| user.as_ref().and_then(|u| u.email.clone()));

    let owner_id = match email.as_deref() {
        Some(email) => team_owner_of(store, email, user_id).await,
        None => None,
    };

    if let Some(owner_id) = owner_id.as_deref() {
        match store.find_user(owner_id).await {
            Ok(Some(owner)) => list.push_user(&owner, decryptor, "Team owner", "Team owner (linked)"),
            Ok(None) => log::debug!("Team owner {} not found", owner_id),
            Err(e) => log::warn!("Could not load team owner {}: {}", owner_id, e),
        }
    }

    // Members delegated to the team owner, or to the user when they own the team
    let team_id = owner_id.as_deref().unwrap_or(user_id);
    match store.find_delegated_credentials(team_id).await {
        Ok(members) => {
            for member in members {
                if member.member_type != PROVIDER_FACEBOOK {
                    continue;
                }
                let (Some(fb_user_id), Some(token)) = (
                    member.facebook_user_id.as_deref().filter(|id| !id.is_empty()),
                    member.access_token.as_deref(),
                ) else {
                    continue;
                };
                let label = member.facebook_name.as_deref().unwrap_or(fb_user_id);
                list.push(token, format!("Team member: {}", label));
            }
        }
        Err(e) => log::warn!("Could not load team members of {}: {}", team_id, e),
    }

    if let Some(token) = session.access_token.as_deref() {
        list.push(token, "Session");
    }

    list.tokens
}

/// Owner account the user is a delegated member of, if it is someone else.
async fn team_owner_of<S>(store: &S, email: &str, user_id: &str) -> Option<String>
where
    S: CredentialStore + ?Sized,
{
    match store.find_team_membership(email).await {
        Ok(Some(membership)) if membership.owner_id != user_id => Some(membership.owner_id),
        Ok(_) => None,
        Err(e) => {
            log::warn!("Could not look up team membership for {}: {}", email, e);
            None
        }
    }
}
