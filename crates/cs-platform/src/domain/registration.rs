//! Registration Form
//!
//! The application a WAITING user submits before moderation. It overwrites
//! the profile and requires both data consents.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::Profile;
use crate::error::{PlatformError, Result};

/// Untrusted registration fields
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub patronymic: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub academic_degree: Option<String>,
    #[serde(default)]
    pub affiliation: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub postal_address: String,
    #[serde(default)]
    pub consent_data_processing: bool,
    #[serde(default)]
    pub consent_data_transfer: bool,
}

impl RegistrationForm {
    /// Check the form and turn it into the profile stored for `user_id`.
    pub fn into_profile(self, user_id: Uuid) -> Result<Profile> {
        let required = [
            ("surname", &self.surname),
            ("name", &self.name),
            ("patronymic", &self.patronymic),
            ("city", &self.city),
            ("affiliation", &self.affiliation),
            ("position", &self.position),
            ("phone", &self.phone),
            ("postalAddress", &self.postal_address),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(PlatformError::validation(format!("{} is required", field)));
        }

        let birth_date = NaiveDate::parse_from_str(self.birth_date.trim(), "%Y-%m-%d")
            .map_err(|_| PlatformError::validation("bad birthDate"))?;

        if !self.consent_data_processing || !self.consent_data_transfer {
            return Err(PlatformError::validation("all consents required"));
        }

        Ok(Profile {
            user_id,
            surname: self.surname.trim().to_string(),
            name: self.name.trim().to_string(),
            patronymic: self.patronymic.trim().to_string(),
            city: self.city.trim().to_string(),
            affiliation: self.affiliation.trim().to_string(),
            position: self.position.trim().to_string(),
            phone: self.phone.trim().to_string(),
            academic_degree: self
                .academic_degree
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            birth_date: Some(birth_date),
            postal_address: self.postal_address.trim().to_string(),
            consent_data_processing: true,
            consent_data_transfer: true,
        })
    }
}
