// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile edit form and the minimal update payloads derived from it.
//!
//! The form carries every editable field twice: the value the user submitted
//! and the value originally loaded into the form. Only fields that differ are
//! sent upstream. The directory rejects a mobile phone change combined with
//! any other field, so the phone always travels in its own payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator used when list fields are rendered into the form's hidden
/// "original" inputs.
pub const LIST_SEPARATOR: char = ';';

/// Submitted profile form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdate {
    pub mobile_phone: Option<String>,
    pub original_mobile_phone: Option<String>,
    pub business_phone: Option<String>,
    pub original_business_phone: Option<String>,
    pub preferred_name: Option<String>,
    pub original_preferred_name: Option<String>,
    pub birthday: Option<DateTime<Utc>>,
    pub original_birthday: Option<DateTime<Utc>>,
    pub my_site: Option<String>,
    pub original_my_site: Option<String>,
    pub about_me: Option<String>,
    pub original_about_me: Option<String>,
    pub street_address: Option<String>,
    pub original_street_address: Option<String>,
    pub city: Option<String>,
    pub original_city: Option<String>,
    pub state: Option<String>,
    pub original_state: Option<String>,
    pub postal_code: Option<String>,
    pub original_postal_code: Option<String>,
    pub schools: Vec<String>,
    pub original_schools: String,
    pub skills: Vec<String>,
    pub original_skills: String,
    pub interests: Vec<String>,
    pub original_interests: String,
}

/// Partial update of every changed field except the mobile phone.
///
/// `None` means "leave unchanged"; `Some(None)` clears the field upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about_me: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_phones: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_site: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schools: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
}

impl PrimaryUpdate {
    pub fn is_empty(&self) -> bool {
        *self == PrimaryUpdate::default()
    }
}

/// Mobile phone update; `None` clears the number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneUpdate {
    pub mobile_phone: Option<String>,
}

impl ProfileUpdate {
    /// Compute the payloads to send. Either half is `None` when there is
    /// nothing to send for it.
    pub fn compute_update(&self) -> (Option<PrimaryUpdate>, Option<PhoneUpdate>) {
        let primary = PrimaryUpdate {
            about_me: scalar_change(&self.about_me, &self.original_about_me),
            birthday: (self.birthday != self.original_birthday).then_some(self.birthday),
            business_phones: scalar_change(&self.business_phone, &self.original_business_phone)
                .map(|phone| phone.into_iter().collect()),
            my_site: scalar_change(&self.my_site, &self.original_my_site),
            preferred_name: scalar_change(&self.preferred_name, &self.original_preferred_name),
            street_address: scalar_change(&self.street_address, &self.original_street_address),
            city: scalar_change(&self.city, &self.original_city),
            state: scalar_change(&self.state, &self.original_state),
            postal_code: scalar_change(&self.postal_code, &self.original_postal_code),
            interests: list_change(&self.original_interests, &self.interests),
            schools: list_change(&self.original_schools, &self.schools),
            skills: list_change(&self.original_skills, &self.skills),
        };

        let phone = scalar_change(&self.mobile_phone, &self.original_mobile_phone)
            .map(|mobile_phone| PhoneUpdate { mobile_phone });

        let primary = (!primary.is_empty()).then_some(primary);
        (primary, phone)
    }
}

/// Empty strings mean "no value".
fn normalize(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn scalar_change(current: &Option<String>, original: &Option<String>) -> Option<Option<String>> {
    let current = normalize(current);
    if current == normalize(original) {
        None
    } else {
        Some(current.map(str::to_string))
    }
}

fn list_change(original: &str, updated: &[String]) -> Option<Vec<String>> {
    is_list_modified(original, updated).then(|| updated.to_vec())
}

/// A list counts as modified if its length changed or it contains anything
/// the original did not. A pure reorder of the same items is not a change.
pub fn is_list_modified(original: &str, updated: &[String]) -> bool {
    let original: Vec<&str> = if original.is_empty() {
        Vec::new()
    } else {
        original.split(LIST_SEPARATOR).collect()
    };

    if original.len() != updated.len() {
        return true;
    }

    updated.iter().any(|item| !original.contains(&item.as_str()))
}
