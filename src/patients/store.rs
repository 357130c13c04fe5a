use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::model::{Gender, Patient, PatientFields};
use crate::core::errors::ApiError;

#[derive(Clone)]
pub struct PatientStore {
    pool: SqlitePool,
}

impl PatientStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, ApiError> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS patients (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                age INTEGER NOT NULL CHECK (age >= 0),
                gender TEXT NOT NULL CHECK (gender IN ('male', 'female')),
                fitness_goal TEXT,
                liked_foods TEXT NOT NULL DEFAULT '[]',
                disliked_foods TEXT NOT NULL DEFAULT '[]',
                food_allergies TEXT NOT NULL DEFAULT '[]',
                health_conditions TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init patients table: {}", e)))?;

        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Patient>, ApiError> {
        let rows = sqlx::query("SELECT * FROM patients ORDER BY name COLLATE NOCASE, id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_patient).collect()
    }

    pub async fn get(&self, patient_id: &str) -> Result<Option<Patient>, ApiError> {
        let row = sqlx::query("SELECT * FROM patients WHERE id = ?")
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_patient).transpose()
    }

    pub async fn create(&self, fields: PatientFields) -> Result<Patient, ApiError> {
        let patient_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO patients (id, name, age, gender, fitness_goal, liked_foods, disliked_foods,
                food_allergies, health_conditions, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&patient_id)
        .bind(&fields.name)
        .bind(i64::from(fields.age))
        .bind(fields.gender.as_str())
        .bind(&fields.fitness_goal)
        .bind(encode_list(&fields.liked_foods))
        .bind(encode_list(&fields.disliked_foods))
        .bind(encode_list(&fields.food_allergies))
        .bind(encode_list(&fields.health_conditions))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::info!(patient_id = %patient_id, "Created patient");
        self.get(&patient_id)
            .await?
            .ok_or_else(|| ApiError::internal("created patient could not be read back"))
    }

    /// Replaces every editable field. Returns `None` for an unknown id.
    pub async fn update(
        &self,
        patient_id: &str,
        fields: PatientFields,
    ) -> Result<Option<Patient>, ApiError> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE patients SET name = ?, age = ?, gender = ?, fitness_goal = ?, liked_foods = ?,
                disliked_foods = ?, food_allergies = ?, health_conditions = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&fields.name)
        .bind(i64::from(fields.age))
        .bind(fields.gender.as_str())
        .bind(&fields.fitness_goal)
        .bind(encode_list(&fields.liked_foods))
        .bind(encode_list(&fields.disliked_foods))
        .bind(encode_list(&fields.food_allergies))
        .bind(encode_list(&fields.health_conditions))
        .bind(&now)
        .bind(patient_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(patient_id).await
    }

    pub async fn delete(&self, patient_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM patients WHERE id = ?")
            .bind(patient_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn encode_list(items: &[String]) -> String {
    Value::from(items.to_vec()).to_string()
}

fn decode_list(raw: &str) -> Vec<String> {
    serde_json::from_str::<Vec<String>>(raw).unwrap_or_default()
}

fn row_to_patient(row: &SqliteRow) -> Result<Patient, ApiError> {
    let gender_raw: String = row.try_get("gender")?;
    let gender = Gender::parse(&gender_raw)
        .ok_or_else(|| ApiError::internal(format!("unknown gender in database: {}", gender_raw)))?;
    let age: i64 = row.try_get("age")?;

    Ok(Patient {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        age: u32::try_from(age).map_err(ApiError::internal)?,
        gender,
        fitness_goal: row.try_get("fitness_goal")?,
        liked_foods: decode_list(&row.try_get::<String, _>("liked_foods")?),
        disliked_foods: decode_list(&row.try_get::<String, _>("disliked_foods")?),
        food_allergies: decode_list(&row.try_get::<String, _>("food_allergies")?),
        health_conditions: decode_list(&row.try_get::<String, _>("health_conditions")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
