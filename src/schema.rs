//! Schema Descriptor
//!
//! Static description of the two health tables. The column specs drive the
//! local store DDL; the text description is embedded in SQL-generation
//! prompts.

pub const PATIENTS_TABLE: &str = "health_dataset_1";
pub const ACTIVITY_TABLE: &str = "health_dataset_2";
pub const JOIN_KEY: &str = "Patient_Number";

pub const PATIENT_NUMBER: &str = "Patient_Number";
pub const BLOOD_PRESSURE_ABNORMALITY: &str = "Blood_Pressure_Abnormality";
pub const LEVEL_OF_HEMOGLOBIN: &str = "Level_of_Hemoglobin";
pub const GENETIC_PEDIGREE_COEFFICIENT: &str = "Genetic_Pedigree_Coefficient";
pub const AGE: &str = "Age";
pub const BMI: &str = "BMI";
pub const SEX: &str = "Sex";
pub const PREGNANCY: &str = "Pregnancy";
pub const SMOKING: &str = "Smoking";
pub const SALT_CONTENT: &str = "salt_content_in_the_diet";
pub const ALCOHOL_CONSUMPTION: &str = "alcohol_consumption_per_day";
pub const LEVEL_OF_STRESS: &str = "Level_of_Stress";
pub const CHRONIC_KIDNEY_DISEASE: &str = "Chronic_kidney_disease";
pub const ADRENAL_AND_THYROID_DISORDERS: &str = "Adrenal_and_thyroid_disorders";

pub const DAY_NUMBER: &str = "Day_Number";
pub const PHYSICAL_ACTIVITY: &str = "Physical_activity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub description: &'static str,
}

const fn column(name: &'static str, sql_type: SqlType, description: &'static str) -> ColumnSpec {
    ColumnSpec { name, sql_type, description }
}

/// Columns of `health_dataset_1`, in table order.
pub const PATIENT_COLUMNS: [ColumnSpec; 14] = [
    column(PATIENT_NUMBER, SqlType::Text, "Unique patient identifier"),
    column(BLOOD_PRESSURE_ABNORMALITY, SqlType::Integer, "0=Normal, 1=Abnormal"),
    column(LEVEL_OF_HEMOGLOBIN, SqlType::Real, "Hemoglobin level in g/dl"),
    column(GENETIC_PEDIGREE_COEFFICIENT, SqlType::Real, "0-1, higher = closer family history"),
    column(AGE, SqlType::Integer, "Patient age"),
    column(BMI, SqlType::Real, "Body Mass Index"),
    column(SEX, SqlType::Integer, "0=Male, 1=Female"),
    column(PREGNANCY, SqlType::Integer, "0=No, 1=Yes"),
    column(SMOKING, SqlType::Integer, "0=No, 1=Yes"),
    column(SALT_CONTENT, SqlType::Real, "Salt intake in mg/day"),
    column(ALCOHOL_CONSUMPTION, SqlType::Real, "Alcohol intake in ml/day"),
    column(LEVEL_OF_STRESS, SqlType::Integer, "1=Low, 2=Normal, 3=High"),
    column(CHRONIC_KIDNEY_DISEASE, SqlType::Integer, "0=No, 1=Yes"),
    column(ADRENAL_AND_THYROID_DISORDERS, SqlType::Integer, "0=No, 1=Yes"),
];

/// Columns of `health_dataset_2`, in table order.
pub const ACTIVITY_COLUMNS: [ColumnSpec; 3] = [
    column(PATIENT_NUMBER, SqlType::Text, "Unique patient identifier (joins with health_dataset_1)"),
    column(DAY_NUMBER, SqlType::Integer, "Day number (1-10)"),
    column(PHYSICAL_ACTIVITY, SqlType::Integer, "Number of steps per day"),
];

pub fn column_names(columns: &[ColumnSpec]) -> Vec<&'static str> {
    columns.iter().map(|c| c.name).collect()
}

/// `CREATE TABLE` statement for one of the two tables.
pub fn create_table_sql(table: &str, columns: &[ColumnSpec]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("\"{}\" {}", c.name, c.sql_type.as_sql()))
        .collect();
    format!("CREATE TABLE {} ({})", table, defs.join(", "))
}

/// Schema text shown to the SQL-generation model.
pub fn schema_description() -> String {
    let mut desc = String::from("\nDATABASE SCHEMA:\n\n");
    desc.push_str(&format!("Table 1: {}\n", PATIENTS_TABLE));
    for c in PATIENT_COLUMNS.iter() {
        desc.push_str(&format!("- {} ({}): {}\n", c.name, c.sql_type.as_sql(), c.description));
    }
    desc.push_str(&format!("\nTable 2: {}\n", ACTIVITY_TABLE));
    for c in ACTIVITY_COLUMNS.iter() {
        desc.push_str(&format!("- {} ({}): {}\n", c.name, c.sql_type.as_sql(), c.description));
    }
    desc.push_str(&format!("\nJOIN KEY: {}\n", JOIN_KEY));
    desc
}
