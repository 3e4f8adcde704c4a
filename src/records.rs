//! Cleaned row types for the two health tables.
//!
//! Serde names match the store columns so the same structs serialize to the
//! CSV files the loader reads back.

use serde::{Deserialize, Serialize};

/// One row of `health_dataset_1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "Patient_Number")]
    pub patient_number: String,
    #[serde(rename = "Blood_Pressure_Abnormality")]
    pub blood_pressure_abnormality: i64,
    #[serde(rename = "Level_of_Hemoglobin")]
    pub hemoglobin: Option<f64>,
    #[serde(rename = "Genetic_Pedigree_Coefficient")]
    pub genetic_pedigree_coefficient: f64,
    #[serde(rename = "Age")]
    pub age: i64,
    #[serde(rename = "BMI")]
    pub bmi: Option<f64>,
    /// 0 = male, 1 = female
    #[serde(rename = "Sex")]
    pub sex: i64,
    /// Always 0 when `sex` is 0.
    #[serde(rename = "Pregnancy")]
    pub pregnancy: i64,
    #[serde(rename = "Smoking")]
    pub smoking: i64,
    #[serde(rename = "salt_content_in_the_diet")]
    pub salt_content: Option<f64>,
    #[serde(rename = "alcohol_consumption_per_day")]
    pub alcohol_consumption: f64,
    #[serde(rename = "Level_of_Stress")]
    pub stress_level: i64,
    #[serde(rename = "Chronic_kidney_disease")]
    pub chronic_kidney_disease: i64,
    #[serde(rename = "Adrenal_and_thyroid_disorders")]
    pub adrenal_thyroid_disorders: i64,
}

/// One (patient, day) row of `health_dataset_2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    #[serde(rename = "Patient_Number")]
    pub patient_number: String,
    #[serde(rename = "Day_Number")]
    pub day_number: i64,
    #[serde(rename = "Physical_activity")]
    pub physical_activity: i64,
}
