//! Query builder for the form front end
//!
//! Turns structured selections into the natural-language request the agent
//! receives. Deterministic and side-effect free.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Query builder errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("duration must be a positive number, got {0}")]
    InvalidDuration(f64),

    #[error("unknown appliance: {0}")]
    UnknownAppliance(String),

    #[error("unknown time unit: {0} (expected hours/day or minutes/day)")]
    UnknownUnit(String),

    #[error("unknown city: {0}")]
    UnknownCity(String),
}

/// Lower-case, collapse separators; "Air-Conditioner" and "air_conditioner" match
fn slug(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Appliance {
    Fridge,
    Heater,
    Tv,
    AirConditioner,
    Laptop,
    Microwave,
}

impl Appliance {
    pub const ALL: [Appliance; 6] = [
        Appliance::Fridge,
        Appliance::Heater,
        Appliance::Tv,
        Appliance::AirConditioner,
        Appliance::Laptop,
        Appliance::Microwave,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Appliance::Fridge => "Fridge",
            Appliance::Heater => "Heater",
            Appliance::Tv => "TV",
            Appliance::AirConditioner => "Air Conditioner",
            Appliance::Laptop => "Laptop",
            Appliance::Microwave => "Microwave",
        }
    }
}

impl fmt::Display for Appliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Appliance {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = slug(s);
        Appliance::ALL
            .into_iter()
            .find(|a| slug(a.display_name()) == wanted)
            .or(match wanted.as_str() {
                "refrigerator" => Some(Appliance::Fridge),
                "ac" | "aircon" => Some(Appliance::AirConditioner),
                "television" => Some(Appliance::Tv),
                _ => None,
            })
            .ok_or_else(|| QueryError::UnknownAppliance(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationUnit {
    HoursPerDay,
    MinutesPerDay,
}

impl DurationUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::HoursPerDay => "hours/day",
            DurationUnit::MinutesPerDay => "minutes/day",
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurationUnit {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hours/day" | "hours" | "hour" | "h" => Ok(DurationUnit::HoursPerDay),
            "minutes/day" | "minutes" | "minute" | "min" | "m" => Ok(DurationUnit::MinutesPerDay),
            _ => Err(QueryError::UnknownUnit(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum City {
    NewYorkCity,
    Boston,
    Chicago,
    LosAngeles,
    SanFrancisco,
    Houston,
    WashingtonDc,
}

impl City {
    pub const ALL: [City; 7] = [
        City::NewYorkCity,
        City::Boston,
        City::Chicago,
        City::LosAngeles,
        City::SanFrancisco,
        City::Houston,
        City::WashingtonDc,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            City::NewYorkCity => "New York City",
            City::Boston => "Boston",
            City::Chicago => "Chicago",
            City::LosAngeles => "Los Angeles",
            City::SanFrancisco => "San Francisco",
            City::Houston => "Houston",
            City::WashingtonDc => "Washington DC",
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for City {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = slug(s);
        City::ALL
            .into_iter()
            .find(|c| slug(c.display_name()) == wanted)
            .or(match wanted.as_str() {
                "nyc" | "new york" => Some(City::NewYorkCity),
                "la" => Some(City::LosAngeles),
                "sf" => Some(City::SanFrancisco),
                "dc" | "washington" => Some(City::WashingtonDc),
                _ => None,
            })
            .ok_or_else(|| QueryError::UnknownCity(s.to_string()))
    }
}

/// Rate context of a request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateMode {
    /// Let the agent use its regional default
    Default,
    /// $/kWh given by the user
    Custom(f64),
    City(City),
}

/// Everything the calculator form collects
#[derive(Debug, Clone, PartialEq)]
pub struct UsageForm {
    pub appliance: Appliance,
    pub duration: f64,
    pub unit: DurationUnit,
    pub custom_rate: Option<f64>,
    pub city: Option<City>,
}

impl UsageForm {
    pub fn new(appliance: Appliance, duration: f64, unit: DurationUnit) -> Self {
        Self {
            appliance,
            duration,
            unit,
            custom_rate: None,
            city: None,
        }
    }

    pub fn with_custom_rate(mut self, rate: f64) -> Self {
        self.custom_rate = Some(rate);
        self
    }

    pub fn with_city(mut self, city: City) -> Self {
        self.city = Some(city);
        self
    }

    /// A positive custom rate wins over any city selection
    pub fn rate_mode(&self) -> RateMode {
        match (self.custom_rate, self.city) {
            (Some(rate), _) if rate.is_finite() && rate > 0.0 => RateMode::Custom(rate),
            (_, Some(city)) => RateMode::City(city),
            _ => RateMode::Default,
        }
    }
}

/// Render a number without a trailing ".0" for whole values
fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Build the request string for the agent
pub fn build_query(form: &UsageForm) -> Result<String, QueryError> {
    if !form.duration.is_finite() || form.duration <= 0.0 {
        return Err(QueryError::InvalidDuration(form.duration));
    }

    let usage = format!(
        "I use my {} for {} {}",
        form.appliance.display_name().to_lowercase(),
        format_amount(form.duration),
        form.unit
    );

    let context = match form.rate_mode() {
        RateMode::Custom(rate) => format!(" with electricity rate ${}/kWh", format_amount(rate)),
        RateMode::City(city) => format!(" in {}", city),
        RateMode::Default => String::new(),
    };

    Ok(format!(
        "{}{}. What is the energy consumption and cost? Please provide all 5 physical analogies.",
        usage, context
    ))
}
