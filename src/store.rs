//! Local Store - the SQLite database queries run against
//!
//! Holds `health_dataset_1` and `health_dataset_2`, both indexed on
//! `Patient_Number`. The connection is opened once and reused for every query
//! of the process.

use crate::error::Result;
use crate::execution::{self, Table};
use crate::records::{ActivityRecord, PatientRecord};
use crate::schema::{
    column_names, create_table_sql, ACTIVITY_COLUMNS, ACTIVITY_TABLE, PATIENTS_TABLE, PATIENT_COLUMNS,
};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    /// Open or create the store file, creating its directory when needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Replace both tables with the given records.
    pub fn materialize(&mut self, patients: &[PatientRecord], activity: &[ActivityRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {p}; DROP TABLE IF EXISTS {a}; {create_p}; {create_a};",
            p = PATIENTS_TABLE,
            a = ACTIVITY_TABLE,
            create_p = create_table_sql(PATIENTS_TABLE, &PATIENT_COLUMNS),
            create_a = create_table_sql(ACTIVITY_TABLE, &ACTIVITY_COLUMNS),
        ))?;

        {
            let placeholders = vec!["?"; PATIENT_COLUMNS.len()].join(", ");
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} VALUES ({})",
                PATIENTS_TABLE, placeholders
            ))?;
            for r in patients {
                stmt.execute(params![
                    r.patient_number,
                    r.blood_pressure_abnormality,
                    r.hemoglobin,
                    r.genetic_pedigree_coefficient,
                    r.age,
                    r.bmi,
                    r.sex,
                    r.pregnancy,
                    r.smoking,
                    r.salt_content,
                    r.alcohol_consumption,
                    r.stress_level,
                    r.chronic_kidney_disease,
                    r.adrenal_thyroid_disorders,
                ])?;
            }

            let mut stmt = tx.prepare(&format!("INSERT INTO {} VALUES (?, ?, ?)", ACTIVITY_TABLE))?;
            for r in activity {
                stmt.execute(params![r.patient_number, r.day_number, r.physical_activity])?;
            }
        }

        tx.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS idx_patient_1 ON {}(Patient_Number);
             CREATE INDEX IF NOT EXISTS idx_patient_2 ON {}(Patient_Number);",
            PATIENTS_TABLE, ACTIVITY_TABLE
        ))?;
        tx.commit()?;

        info!(
            "Local store ready: {} = {} records, {} = {} records",
            PATIENTS_TABLE,
            patients.len(),
            ACTIVITY_TABLE,
            activity.len()
        );
        Ok(())
    }

    /// Run a statement and return every row.
    pub fn execute(&self, sql: &str) -> Result<Table> {
        execution::execute(&self.conn, sql)
    }

    /// Column names per table, read from the database catalog.
    pub fn schema_info(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut info = BTreeMap::new();
        for table in [PATIENTS_TABLE, ACTIVITY_TABLE] {
            let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({})", table))?;
            let columns = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            info.insert(table.to_string(), columns);
        }
        Ok(info)
    }

    /// True when both tables exist with the expected columns.
    pub fn has_expected_schema(&self) -> Result<bool> {
        let info = self.schema_info()?;
        let matches = |table: &str, expected: Vec<&str>| {
            info.get(table)
                .map(|cols| cols.iter().map(String::as_str).eq(expected.into_iter()))
                .unwrap_or(false)
        };
        Ok(matches(PATIENTS_TABLE, column_names(&PATIENT_COLUMNS))
            && matches(ACTIVITY_TABLE, column_names(&ACTIVITY_COLUMNS)))
    }

    /// Row count of `health_dataset_1`.
    pub fn patient_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", PATIENTS_TABLE), [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;
    use serde_json::json;

    fn patient(id: &str, sex: i64, age: i64) -> PatientRecord {
        PatientRecord {
            patient_number: id.to_string(),
            blood_pressure_abnormality: 1,
            hemoglobin: Some(13.2),
            genetic_pedigree_coefficient: 0.4,
            age,
            bmi: None,
            sex,
            pregnancy: 0,
            smoking: 0,
            salt_content: Some(3200.0),
            alcohol_consumption: 10.0,
            stress_level: 2,
            chronic_kidney_disease: 0,
            adrenal_thyroid_disorders: 0,
        }
    }

    #[test]
    fn test_materialize_and_query() {
        let mut store = LocalStore::in_memory().unwrap();
        let patients = vec![patient("P1", 0, 45), patient("P2", 1, 67)];
        let activity = vec![
            ActivityRecord { patient_number: "P1".to_string(), day_number: 1, physical_activity: 5000 },
            ActivityRecord { patient_number: "P1".to_string(), day_number: 2, physical_activity: 7000 },
        ];
        store.materialize(&patients, &activity).unwrap();

        assert_eq!(store.patient_count().unwrap(), 2);
        assert!(store.has_expected_schema().unwrap());

        let result = store
            .execute(
                "SELECT AVG(h2.Physical_activity) AS avg_steps FROM health_dataset_1 h1 \
                 JOIN health_dataset_2 h2 ON h1.Patient_Number = h2.Patient_Number WHERE h1.Age < 50;",
            )
            .unwrap();
        assert_eq!(result.single_value(), Some(("avg_steps", &json!(6000.0))));

        let nulls = store.execute("SELECT BMI FROM health_dataset_1 WHERE Patient_Number = 'P1'").unwrap();
        assert_eq!(nulls.rows[0][0], serde_json::Value::Null);
    }

    #[test]
    fn test_materialize_replaces_tables_and_indexes() {
        let mut store = LocalStore::in_memory().unwrap();
        store.materialize(&[patient("P1", 0, 30)], &[]).unwrap();
        store.materialize(&[patient("P9", 1, 30), patient("P8", 1, 31)], &[]).unwrap();
        assert_eq!(store.patient_count().unwrap(), 2);

        let indexes = store
            .execute("SELECT name FROM sqlite_master WHERE type = 'index' ORDER BY name")
            .unwrap();
        let names: Vec<String> = indexes.rows.iter().map(|r| r[0].as_str().unwrap().to_string()).collect();
        assert_eq!(names, vec!["idx_patient_1", "idx_patient_2"]);
    }

    #[test]
    fn test_unknown_column_is_execution_error() {
        let mut store = LocalStore::in_memory().unwrap();
        store.materialize(&[patient("P1", 0, 30)], &[]).unwrap();
        let err = store.execute("SELECT Height FROM health_dataset_1").unwrap_err();
        assert!(matches!(err, AnalyticsError::Execution(_)));
        assert!(err.to_string().contains("no such column: Height"));
    }
}
