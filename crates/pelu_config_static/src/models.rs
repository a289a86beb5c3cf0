// --- File: crates/pelu_config_static/src/models.rs ---

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Storage backend selector for the ephemeral KV store (C1).
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Redis,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// e.g. "sqlite://pelu.db", "postgres://..." — loaded via DATABASE_URL.
    pub url: String,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct KvConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Only read when backend == redis.
    pub redis_url: Option<String>,
}

/// Messaging transport (the out-of-scope adapter's credentials the core
/// needs to verify signatures and build outbound idempotency headers).
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MessagingConfig {
    pub verify_token: String,
    pub app_secret: String,
    #[serde(default = "default_outbound_rate")]
    pub outbound_rate_per_minute: u32,
    #[serde(default = "default_webhook_rate")]
    pub webhook_rate_per_minute: u32,
    #[serde(default = "default_loopback_timeout")]
    pub loopback_timeout_seconds: u64,
}

fn default_outbound_rate() -> u32 {
    100
}
fn default_webhook_rate() -> u32 {
    1500
}
fn default_loopback_timeout() -> u64 {
    40
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GcalConfig {
    pub key_path: Option<String>,
    pub calendar_id: Option<String>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NlpConfig {
    pub endpoint_url: String,
    pub api_key: String,
    #[serde(default = "default_nlp_timeout")]
    pub timeout_seconds: u64,
}

fn default_nlp_timeout() -> u64 {
    8
}

const WEEKDAY_KEYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];
const DEFAULT_RANGE: &str = "09:00-20:00";

/// Either shape provisioning has sent for a single weekday's ranges: the
/// current list-of-ranges form, or the legacy single string with ranges
/// joined by commas (`"09:00-14:00,16:00-20:00"`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDayRanges {
    List(Vec<String>),
    Joined(String),
}

impl From<RawDayRanges> for Vec<String> {
    fn from(raw: RawDayRanges) -> Self {
        match raw {
            RawDayRanges::List(ranges) => ranges,
            RawDayRanges::Joined(s) => s
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }
}

/// Per-weekday working hours, e.g. `{"mon": ["09:00-14:00", "16:00-20:00"]}`.
/// Matches the original's dict-of-ranges shape; a day absent from the map
/// is closed. Also accepts the legacy single comma-joined string per
/// weekday (`"mon": "09:00-14:00,16:00-20:00"`), normalised to the list
/// form on load. When the whole field is absent from a shop's config it
/// defaults to every day open `09:00-20:00`, rather than a closed shop.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct WorkingHours(BTreeMap<String, Vec<String>>);

impl WorkingHours {
    pub fn get(&self, weekday_key: &str) -> Option<&Vec<String>> {
        self.0.get(weekday_key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, Vec<String>>> for WorkingHours {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        WorkingHours(map)
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        WorkingHours(
            WEEKDAY_KEYS
                .iter()
                .map(|k| (k.to_string(), vec![DEFAULT_RANGE.to_string()]))
                .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for WorkingHours {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw: BTreeMap<String, RawDayRanges> = BTreeMap::deserialize(deserializer)?;
        Ok(WorkingHours(
            raw.into_iter().map(|(k, v)| (k, v.into())).collect(),
        ))
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ShopConfig {
    pub id: i64,
    pub name: String,
    pub business_type: String,
    pub country_code: String,
    pub tz: String,
    pub currency_code: String,
    pub num_staff: u32,
    #[serde(default = "default_slot_step")]
    pub slot_step_minutes: u32,
    #[serde(default = "default_min_lead")]
    pub min_lead_minutes: i64,
    #[serde(default = "default_max_lead_days")]
    pub max_lead_days: i64,
    #[serde(default)]
    pub working_hours: WorkingHours,
    #[serde(default)]
    pub closed_weekdays: BTreeSet<u8>,
    #[serde(default)]
    pub closed_dates: BTreeSet<String>,
    #[serde(default)]
    pub closed_recurring: BTreeSet<String>,
    pub wa_phone_number_id: String,
    pub wa_token: String,
    pub calendar_id: String,
    pub api_key: String,
    #[serde(default)]
    pub enable_staff_selection: bool,
    #[serde(default)]
    pub staff_selection_required: bool,
}

fn default_slot_step() -> u32 {
    30
}
fn default_min_lead() -> i64 {
    60
}
fn default_max_lead_days() -> i64 {
    150
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub kv: KvConfig,
    #[serde(default)]
    pub use_messaging: bool,
    pub messaging: Option<MessagingConfig>,
    #[serde(default)]
    pub use_gcal: bool,
    pub gcal: Option<GcalConfig>,
    #[serde(default)]
    pub use_nlp: bool,
    pub nlp: Option<NlpConfig>,
    /// Tenant table. Out-of-band provisioning feeds this; the core only reads it.
    #[serde(default)]
    pub shops: Vec<ShopConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl AppConfig {
    pub fn shop_by_id(&self, id: i64) -> Option<&ShopConfig> {
        self.shops.iter().find(|s| s.id == id)
    }

    pub fn shop_by_api_key(&self, api_key: &str) -> Option<&ShopConfig> {
        self.shops.iter().find(|s| s.api_key == api_key)
    }

    pub fn shop_by_phone_number_id(&self, phone_number_id: &str) -> Option<&ShopConfig> {
        self.shops
            .iter()
            .find(|s| s.wa_phone_number_id == phone_number_id)
    }
}
