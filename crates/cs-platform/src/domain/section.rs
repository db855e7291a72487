//! Conference Section

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::normalize_email;
use crate::error::{PlatformError, Result};

/// A section can route notices to at most this many responsible addresses.
pub const MAX_SECTION_RESPONSIBLES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Uuid,
    pub title_ru: String,
    pub title_en: String,
    pub sort_order: i32,
}

impl Section {
    pub fn new(title_ru: impl Into<String>, title_en: impl Into<String>, sort_order: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            title_ru: title_ru.into(),
            title_en: title_en.into(),
            sort_order,
        }
    }

    /// Title in the requested language, falling back to the Russian title.
    pub fn title(&self, english: bool) -> &str {
        if english && !self.title_en.trim().is_empty() {
            &self.title_en
        } else {
            &self.title_ru
        }
    }
}

/// Trim, lowercase and deduplicate addresses, dropping empties; order of
/// first appearance is kept.
pub fn normalize_recipients<I, S>(emails: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for email in emails {
        let email = normalize_email(email.as_ref());
        if !email.is_empty() && !out.contains(&email) {
            out.push(email);
        }
    }
    out
}

/// Normalise a replacement responsible set and enforce the size limit.
pub fn validate_responsibles(emails: &[String]) -> Result<Vec<String>> {
    let emails = normalize_recipients(emails);
    if emails.len() > MAX_SECTION_RESPONSIBLES {
        return Err(PlatformError::validation(format!(
            "at most {} responsible emails per section",
            MAX_SECTION_RESPONSIBLES
        )));
    }
    Ok(emails)
}
