//! Patient metadata entered by the operator

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, XrayError};

/// Smallest accepted age
pub const MIN_AGE: u8 = 1;

/// Largest accepted age
pub const MAX_AGE: u8 = 120;

/// Patient age in years, within [1, 120]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Age(u8);

impl Age {
    pub fn new(years: u32) -> Result<Self> {
        if years < MIN_AGE as u32 || years > MAX_AGE as u32 {
            return Err(XrayError::Validation(format!(
                "age must be between {} and {}, got {}",
                MIN_AGE, MAX_AGE, years
            )));
        }
        Ok(Self(years as u8))
    }

    pub fn years(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u32> for Age {
    type Error = XrayError;

    fn try_from(years: u32) -> Result<Self> {
        Age::new(years)
    }
}

impl From<Age> for u32 {
    fn from(age: Age) -> Self {
        age.0 as u32
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Patient gender as offered in the intake form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Gender {
    type Err = XrayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "other" | "o" => Ok(Gender::Other),
            _ => Err(XrayError::Validation(format!(
                "unknown gender '{}', expected Male, Female or Other",
                s
            ))),
        }
    }
}

/// Patient information printed on a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: String,
    pub age: Age,
    pub gender: Gender,
}

impl PatientInfo {
    pub fn new(name: impl Into<String>, age: Age, gender: Gender) -> Self {
        Self {
            name: name.into(),
            age,
            gender,
        }
    }

    /// Reports require a non-blank name
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(XrayError::Validation(
                "patient name is required".to_string(),
            ));
        }
        Ok(())
    }
}
