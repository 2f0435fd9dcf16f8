//! User models: the per-session cached user and directory user resources.

use serde::{Deserialize, Deserializer, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User details cached in the session at sign-in and read on every
/// authenticated page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CachedUser {
    pub display_name: String,
    /// Primary mail, or the principal name for accounts without one
    pub email: String,
    /// Inline `data:` URI of the 48x48 photo, if the user has a photo
    pub avatar: Option<String>,
    pub time_zone: Option<String>,
    pub date_format: Option<String>,
    pub time_format: Option<String>,
}

/// The handful of `/me` fields needed to build a [`CachedUser`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUserSummary {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
}

impl DirectoryUserSummary {
    /// Personal accounts don't have `mail` set; fall back on the principal name.
    pub fn email(&self) -> String {
        match self.mail.as_deref() {
            Some(mail) if !mail.is_empty() => mail.to_string(),
            _ => self.user_principal_name.clone().unwrap_or_default(),
        }
    }
}

/// Mailbox settings (time zone and formats).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxSettings {
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default)]
    pub time_format: Option<String>,
}

/// Editable and displayed profile fields of the current user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub about_me: Option<String>,
    #[serde(default)]
    pub birthday: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub business_phones: Vec<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub interests: Vec<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub mobile_phone: Option<String>,
    #[serde(default)]
    pub my_site: Option<String>,
    #[serde(default)]
    pub office_location: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub preferred_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub responsibilities: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub schools: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub skills: Vec<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub street_address: Option<String>,
}

/// The directory sends unset collections as either a missing key or `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl UserProfile {
    /// Fields requested with `$select`; most are not returned by default.
    pub const SELECT: &'static [&'static str] = &[
        "aboutMe",
        "birthday",
        "businessPhones",
        "city",
        "country",
        "department",
        "displayName",
        "employeeId",
        "interests",
        "jobTitle",
        "mobilePhone",
        "mySite",
        "officeLocation",
        "postalCode",
        "preferredName",
        "responsibilities",
        "schools",
        "skills",
        "state",
        "streetAddress",
    ];
}
