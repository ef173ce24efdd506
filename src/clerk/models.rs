use serde::Deserialize;
use serde_json::Value;

use crate::webhooks::VerificationError;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct UserJson {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub external_accounts: Vec<ExternalAccount>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExternalAccount {
    pub provider: String,
    /// Clerk sends a string, older payloads a number.
    #[serde(default)]
    pub provider_user_id: Option<Value>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DeletedObject {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ClerkEvent {
    UserCreated(UserJson),
    UserUpdated(UserJson),
    UserDeleted(DeletedObject),
    Other { event_type: String },
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Value,
}

impl ClerkEvent {
    pub fn from_slice(raw_body: &[u8]) -> Result<Self, VerificationError> {
        let raw: RawEvent = serde_json::from_slice(raw_body)?;
        Ok(match raw.event_type.as_str() {
            "user.created" => ClerkEvent::UserCreated(serde_json::from_value(raw.data)?),
            "user.updated" => ClerkEvent::UserUpdated(serde_json::from_value(raw.data)?),
            "user.deleted" => ClerkEvent::UserDeleted(serde_json::from_value(raw.data)?),
            _ => ClerkEvent::Other {
                event_type: raw.event_type,
            },
        })
    }
}

impl UserJson {
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }

    /// The primary address if it is listed, otherwise the first one.
    pub fn primary_email(&self) -> Option<String> {
        let primary = self.primary_email_address_id.as_deref().and_then(|primary_id| {
            self.email_addresses.iter().find(|e| e.id == primary_id)
        });
        primary
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.clone())
    }

    pub fn github_account(&self) -> Option<&ExternalAccount> {
        self.external_accounts
            .iter()
            .find(|a| a.provider == "github" || a.provider == "oauth_github")
    }
}

impl ExternalAccount {
    pub fn provider_user_id_string(&self) -> Option<String> {
        match self.provider_user_id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
