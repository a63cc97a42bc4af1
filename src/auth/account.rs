use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record as stored in the `users` table.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: Uuid,                   // unique user ID, assigned at insert
    pub username: String,           // unique handle
    pub email: String,              // unique identifier, lowercased
    #[serde(skip_serializing)]
    pub password_hash: String,      // Argon2 digest, not exposed in JSON
    pub profile: Profile,
    pub created_at: OffsetDateTime, // creation timestamp
}

/// Fields supplied by registration; the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub profile: Profile,
}

/// Optional profile attributes, persisted as a single JSONB document.
/// Enum-valued fields reject unknown values at deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub dietary_preferences: Vec<DietaryTag>,
    pub allergies: Vec<String>,
    pub health_goals: Option<HealthGoal>,
    pub physical_details: Option<PhysicalDetails>,
    pub activity_level: Option<ActivityLevel>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DietaryTag {
    Vegetarian,
    Vegan,
    Keto,
    GlutenFree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthGoal {
    WeightLoss,
    MuscleGain,
    Maintenance,
    ImproveHealth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalDetails {
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub weight: Option<f64>, // kg
    pub height: Option<f64>, // cm
}
