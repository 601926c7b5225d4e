// API Versions
pub const FACEBOOK_API_VERSION: &str = "v20.0";

// API Base URLs
pub const FACEBOOK_BASE_URL: &str = "https://graph.facebook.com";
pub const FB_REQUEST_TIMEOUT_SECS: u64 = 30;

// Worker Settings
pub const WORKER_INTERVAL_SECS: u64 = 1800; // 30 minutes
pub const DEFAULT_LOG_FILTER: &str = "info";

// Facebook API Fields
pub const FB_CAMPAIGN_FIELDS: &str = "id,name,status,effective_status,insights.date_preset(last_30d){spend,actions,reach,impressions,clicks}";
pub const FB_TOKEN_CHECK_FIELDS: &str = "id";
pub const FB_CAMPAIGN_PAGE_LIMIT: u32 = 200;

// Conversation started events count as messages
pub const FB_MESSAGING_ACTION_TYPE: &str = "onsite_conversion.messaging_conversation_started_7d";

// Campaign statuses
pub const STATUS_ACTIVE: &str = "ACTIVE";
pub const STATUS_PAUSED: &str = "PAUSED";

// Credential providers
pub const PROVIDER_FACEBOOK: &str = "facebook";
