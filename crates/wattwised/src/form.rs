//! Calculator form input

use serde::Deserialize;
use wattwise_common::{Appliance, City, DurationUnit, QueryError, UsageForm};

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("{field} must be a number, got {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Raw form fields as posted by the browser
///
/// Every field is text so a bad value becomes a form error, not an
/// extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct CalcInput {
    #[serde(default)]
    pub appliance: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub rate: String,
    #[serde(default)]
    pub city: String,
}

fn number(field: &'static str, value: &str) -> Result<f64, FormError> {
    value.trim().parse().map_err(|_| FormError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

impl CalcInput {
    pub fn to_usage_form(&self) -> Result<UsageForm, FormError> {
        let appliance: Appliance = self.appliance.parse()?;
        let duration = number("duration", &self.duration)?;
        let unit = if self.unit.trim().is_empty() {
            DurationUnit::HoursPerDay
        } else {
            self.unit.parse()?
        };

        let mut form = UsageForm::new(appliance, duration, unit);
        if !self.rate.trim().is_empty() {
            form = form.with_custom_rate(number("rate", &self.rate)?);
        }
        if !self.city.trim().is_empty() {
            form = form.with_city(self.city.parse::<City>()?);
        }
        Ok(form)
    }
}
