use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::Record;

/// Value of a system setting.
///
/// The settings table stores every value as text. Toggles stay `bool` in
/// Rust and are coerced to `"true"`/`"false"` only when serialized for the
/// backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Flag(bool),
    Text(String),
}

impl Default for SettingValue {
    fn default() -> Self {
        SettingValue::Text(String::new())
    }
}

impl SettingValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            SettingValue::Flag(b) => Some(*b),
            SettingValue::Text(_) => None,
        }
    }
}

impl Serialize for SettingValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SettingValue::Flag(true) => serializer.serialize_str("true"),
            SettingValue::Flag(false) => serializer.serialize_str("false"),
            SettingValue::Text(text) => serializer.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for SettingValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Bool(bool),
            Text(String),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Bool(b) => SettingValue::Flag(b),
            Wire::Text(text) => match text.as_str() {
                "true" => SettingValue::Flag(true),
                "false" => SettingValue::Flag(false),
                _ => SettingValue::Text(text),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Record)]
#[record(table = "settings")]
pub struct SystemSetting {
    #[serde(default)]
    pub id: String,
    pub key: String,
    pub value: SettingValue,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Admin panel account. Credentials live in the backend's auth service, not here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Record)]
#[record(table = "users")]
pub struct AdminUser {
    #[serde(default)]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Record)]
#[record(table = "activity_logs")]
pub struct ActivityLog {
    #[serde(default)]
    pub id: String,
    pub action: String,
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A visitor opening the WhatsApp widget.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Record)]
#[record(table = "whatsapp_contacts")]
pub struct WhatsAppContact {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub source_page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
