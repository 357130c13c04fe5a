use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::{ApiError, FieldErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub fitness_goal: Option<String>,
    pub liked_foods: Vec<String>,
    pub disliked_foods: Vec<String>,
    pub food_allergies: Vec<String>,
    pub health_conditions: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Form payload for creating or updating a patient. The food and
/// condition lists arrive as comma-separated strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<serde_json::Value>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub fitness_goal: Option<String>,
    #[serde(default)]
    pub liked_foods: Option<String>,
    #[serde(default)]
    pub disliked_foods: Option<String>,
    #[serde(default)]
    pub food_allergies: Option<String>,
    #[serde(default)]
    pub health_conditions: Option<String>,
}

/// Validated patient attributes, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientFields {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub fitness_goal: Option<String>,
    pub liked_foods: Vec<String>,
    pub disliked_foods: Vec<String>,
    pub food_allergies: Vec<String>,
    pub health_conditions: Vec<String>,
}

impl PatientInput {
    pub fn validate(&self) -> Result<PatientFields, ApiError> {
        let mut errors = FieldErrors::new();

        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            errors.add("name", "Name is required");
        }

        let age = match &self.age {
            Some(value) => match value.as_u64().and_then(|v| u32::try_from(v).ok()) {
                Some(age) => Some(age),
                None => {
                    errors.add("age", "Age must be a non-negative integer");
                    None
                }
            },
            None => {
                errors.add("age", "Age is required");
                None
            }
        };

        let gender = match self.gender.as_deref().map(str::trim) {
            Some(value) => {
                let parsed = Gender::parse(value);
                if parsed.is_none() {
                    errors.add("gender", "Gender must be one of: male, female");
                }
                parsed
            }
            None => {
                errors.add("gender", "Gender is required");
                None
            }
        };

        errors.into_result()?;

        let (Some(age), Some(gender)) = (age, gender) else {
            return Err(ApiError::internal("validated patient is missing fields"));
        };

        Ok(PatientFields {
            name: name.to_string(),
            age,
            gender,
            fitness_goal: self
                .fitness_goal
                .as_deref()
                .map(str::trim)
                .filter(|goal| !goal.is_empty())
                .map(String::from),
            liked_foods: split_list(self.liked_foods.as_deref()),
            disliked_foods: split_list(self.disliked_foods.as_deref()),
            food_allergies: split_list(self.food_allergies.as_deref()),
            health_conditions: split_list(self.health_conditions.as_deref()),
        })
    }
}

/// Splits a comma-separated form field, dropping blank entries.
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}
