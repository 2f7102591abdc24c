use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::errors::ServiceError;

/// Buyer-entered delivery and contact details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutForm {
    #[validate(custom = "validate_first_name")]
    #[serde(default)]
    pub first_name: String,
    #[validate(custom = "validate_last_name")]
    #[serde(default)]
    pub last_name: String,
    #[validate(
        email(message = "Invalid email address"),
        length(max = 255, message = "Email must be less than 255 characters")
    )]
    #[serde(default)]
    pub email: String,
    #[validate(custom = "validate_phone")]
    #[serde(default)]
    pub phone: String,
    #[validate(custom = "validate_address")]
    #[serde(default)]
    pub address: String,
    #[validate(custom = "validate_city")]
    #[serde(default)]
    pub city: String,
    #[validate(custom = "validate_state")]
    #[serde(default)]
    pub state: String,
    #[validate(length(max = 1000, message = "Notes must be less than 1000 characters"))]
    #[serde(default)]
    pub notes: Option<String>,
}

/// Length bounds in characters, each with its own message
fn bounded(
    value: &str,
    min: usize,
    max: usize,
    too_short: &'static str,
    too_long: &'static str,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    let message = if len < min {
        too_short
    } else if len > max {
        too_long
    } else {
        return Ok(());
    };
    let mut err = ValidationError::new("length");
    err.message = Some(Cow::Borrowed(message));
    Err(err)
}

fn validate_first_name(value: &str) -> Result<(), ValidationError> {
    bounded(value, 1, 50, "First name is required", "First name must be less than 50 characters")
}

fn validate_last_name(value: &str) -> Result<(), ValidationError> {
    bounded(value, 1, 50, "Last name is required", "Last name must be less than 50 characters")
}

fn validate_phone(value: &str) -> Result<(), ValidationError> {
    bounded(
        value,
        10,
        15,
        "Phone number must be at least 10 digits",
        "Phone number must be less than 15 digits",
    )
}

fn validate_address(value: &str) -> Result<(), ValidationError> {
    bounded(
        value,
        10,
        500,
        "Address must be at least 10 characters",
        "Address must be less than 500 characters",
    )
}

fn validate_city(value: &str) -> Result<(), ValidationError> {
    bounded(value, 1, 100, "City is required", "City must be less than 100 characters")
}

fn validate_state(value: &str) -> Result<(), ValidationError> {
    bounded(value, 1, 100, "State is required", "State must be less than 100 characters")
}

impl CheckoutForm {
    /// Trims every field and drops blank notes. Notes keep their inner text as typed.
    pub fn normalized(self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            notes: self.notes.filter(|n| !n.trim().is_empty()),
        }
    }

    /// Normalizes then validates.
    ///
    /// On failure returns `ServiceError::FieldValidation` with one message per
    /// offending field.
    pub fn validated(self) -> Result<Self, ServiceError> {
        let form = self.normalized();
        form.validate()?;
        Ok(form)
    }

    /// Single-line delivery address stored on the order
    pub fn delivery_address(&self) -> String {
        format!("{}, {}, {}", self.address, self.city, self.state)
    }
}
