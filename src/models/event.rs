//! Calendar event model.

use serde::{Deserialize, Serialize};

/// Calendar event with only the fields selected by the calendar view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub organizer: Option<Recipient>,
    #[serde(default)]
    pub start: Option<DateTimeTimeZone>,
    #[serde(default)]
    pub end: Option<DateTimeTimeZone>,
}

impl CalendarEvent {
    /// Fields requested with `$select`.
    pub const SELECT: &'static [&'static str] = &["subject", "organizer", "start", "end"];
    /// Newest events first.
    pub const ORDER_BY: &'static str = "createdDateTime DESC";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Local date-time plus the IANA/Windows zone it is expressed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    pub date_time: String,
    pub time_zone: String,
}

/// Collection page wrapper returned by list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionPage<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}
