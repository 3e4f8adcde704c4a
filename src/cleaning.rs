//! Cleaning pass from raw loaded tables to typed records.
//!
//! Coerces cell types, clips measures to their documented bounds, fills
//! missing values with defaults and enforces the pregnancy/sex rule.

use crate::error::{AnalyticsError, Result};
use crate::execution::Table;
use crate::records::{ActivityRecord, PatientRecord};
use crate::schema::*;
use serde_json::Value;
use tracing::{info, warn};

/// Numeric view of a cell; unparseable and non-finite values are missing.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    n.filter(|v| v.is_finite())
}

/// Identifier text. Integral numbers print without a fractional part.
pub fn coerce_identifier(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn binary_flag(value: Option<f64>) -> i64 {
    value.unwrap_or(0.0).clamp(0.0, 1.0) as i64
}

fn clipped(value: Option<f64>, min: f64, max: f64) -> Option<f64> {
    value.map(|v| v.clamp(min, max))
}

/// Clean dataset 1. Columns absent from `raw` are treated as all-missing.
pub fn clean_patients(raw: &Table) -> Result<Vec<PatientRecord>> {
    let id_col = raw.column_index(PATIENT_NUMBER).ok_or_else(|| {
        AnalyticsError::Data(format!("Dataset 1 is missing the {} column", PATIENT_NUMBER))
    })?;

    for spec in PATIENT_COLUMNS.iter() {
        if raw.column_index(spec.name).is_none() {
            warn!("Dataset 1 has no '{}' column; filling defaults", spec.name);
        }
    }

    let num = |row: usize, name: &str| coerce_number(raw.cell(row, raw.column_index(name)));

    let pedigree_present: Vec<f64> = (0..raw.len())
        .filter_map(|row| num(row, GENETIC_PEDIGREE_COEFFICIENT))
        .collect();
    let pedigree_fill = median(&pedigree_present).unwrap_or(0.0);

    let mut records = Vec::with_capacity(raw.len());
    for row in 0..raw.len() {
        let sex = binary_flag(num(row, SEX));
        let mut pregnancy = binary_flag(num(row, PREGNANCY));
        if sex == 0 {
            pregnancy = 0;
        }

        records.push(PatientRecord {
            patient_number: coerce_identifier(raw.cell(row, Some(id_col))),
            blood_pressure_abnormality: binary_flag(num(row, BLOOD_PRESSURE_ABNORMALITY)),
            hemoglobin: clipped(num(row, LEVEL_OF_HEMOGLOBIN), 8.0, 20.0),
            genetic_pedigree_coefficient: num(row, GENETIC_PEDIGREE_COEFFICIENT)
                .unwrap_or(pedigree_fill)
                .clamp(0.0, 1.0),
            age: num(row, AGE).unwrap_or(50.0).clamp(18.0, 100.0) as i64,
            bmi: clipped(num(row, BMI), 15.0, 50.0),
            sex,
            pregnancy,
            smoking: binary_flag(num(row, SMOKING)),
            salt_content: clipped(num(row, SALT_CONTENT), 0.0, 10_000.0),
            alcohol_consumption: num(row, ALCOHOL_CONSUMPTION).unwrap_or(0.0).clamp(0.0, 500.0),
            stress_level: num(row, LEVEL_OF_STRESS).unwrap_or(2.0).clamp(1.0, 3.0) as i64,
            chronic_kidney_disease: binary_flag(num(row, CHRONIC_KIDNEY_DISEASE)),
            adrenal_thyroid_disorders: binary_flag(num(row, ADRENAL_AND_THYROID_DISORDERS)),
        });
    }

    info!("Cleaned dataset 1: {} records", records.len());
    Ok(records)
}

/// Clean dataset 2. Rows whose day or step count cannot be read are dropped.
pub fn clean_activity(raw: &Table) -> Result<Vec<ActivityRecord>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let id_col = raw.column_index(PATIENT_NUMBER).ok_or_else(|| {
        AnalyticsError::Data(format!("Dataset 2 is missing the {} column", PATIENT_NUMBER))
    })?;
    let day_col = raw.column_index(DAY_NUMBER);
    let steps_col = raw.column_index(PHYSICAL_ACTIVITY);

    let mut records = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;
    for row in 0..raw.len() {
        let day = coerce_number(raw.cell(row, day_col));
        let steps = coerce_number(raw.cell(row, steps_col));
        match (day, steps) {
            (Some(day), Some(steps)) => records.push(ActivityRecord {
                patient_number: coerce_identifier(raw.cell(row, Some(id_col))),
                day_number: day.clamp(1.0, 10.0) as i64,
                physical_activity: steps.clamp(0.0, 50_000.0) as i64,
            }),
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        warn!("Dropped {} dataset 2 rows with unreadable day or step values", dropped);
    }
    info!("Cleaned dataset 2: {} records", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patients_table(rows: Vec<Vec<Value>>) -> Table {
        Table::new(
            vec![
                PATIENT_NUMBER.to_string(),
                SEX.to_string(),
                PREGNANCY.to_string(),
                GENETIC_PEDIGREE_COEFFICIENT.to_string(),
                AGE.to_string(),
                LEVEL_OF_HEMOGLOBIN.to_string(),
            ],
            rows,
        )
    }

    #[test]
    fn test_pregnancy_invariant_for_all_combinations() {
        let cells = [
            json!(0),
            json!(1),
            json!("1"),
            json!(0.7),
            json!(5),
            json!(-3),
            json!("abc"),
            Value::Null,
        ];
        let mut rows = Vec::new();
        for sex in cells.iter() {
            for pregnancy in cells.iter() {
                rows.push(vec![json!("P1"), sex.clone(), pregnancy.clone(), json!(0.5), json!(40), json!(12)]);
            }
        }
        let records = clean_patients(&patients_table(rows)).unwrap();
        assert_eq!(records.len(), cells.len() * cells.len());
        for r in &records {
            assert!(r.sex == 0 || r.sex == 1);
            assert!(r.pregnancy == 0 || r.pregnancy == 1);
            if r.sex == 0 {
                assert_eq!(r.pregnancy, 0);
            }
        }
    }

    #[test]
    fn test_clipping_and_defaults() {
        let table = patients_table(vec![
            vec![json!(101), json!(1), Value::Null, json!(0.2), json!(130), json!(3.0)],
            vec![json!("P2"), json!(1), json!(1), Value::Null, Value::Null, json!(25)],
            vec![json!("P3"), json!(0), json!(1), json!(0.6), json!("n/a"), Value::Null],
        ]);
        let records = clean_patients(&table).unwrap();

        assert_eq!(records[0].patient_number, "101");
        assert_eq!(records[0].pregnancy, 0);
        assert_eq!(records[0].age, 100);
        assert_eq!(records[0].hemoglobin, Some(8.0));

        // median of 0.2 and 0.6
        assert!((records[1].genetic_pedigree_coefficient - 0.4).abs() < 1e-9);
        assert_eq!(records[1].age, 50);
        assert_eq!(records[1].hemoglobin, Some(20.0));
        assert_eq!(records[1].pregnancy, 1);

        assert_eq!(records[2].pregnancy, 0);
        assert_eq!(records[2].hemoglobin, None);

        // absent columns fall back to defaults
        for r in &records {
            assert_eq!(r.stress_level, 2);
            assert_eq!(r.alcohol_consumption, 0.0);
            assert_eq!(r.smoking, 0);
            assert_eq!(r.bmi, None);
        }
    }

    #[test]
    fn test_missing_identifier_column_is_error() {
        let table = Table::new(vec![SEX.to_string()], vec![vec![json!(1)]]);
        assert!(matches!(clean_patients(&table), Err(AnalyticsError::Data(_))));
    }

    #[test]
    fn test_clean_activity_clips_and_drops() {
        let table = Table::new(
            vec![PATIENT_NUMBER.to_string(), DAY_NUMBER.to_string(), PHYSICAL_ACTIVITY.to_string()],
            vec![
                vec![json!("P1"), json!(0), json!(-20)],
                vec![json!("P1"), json!(14), json!(90000)],
                vec![json!("P2"), json!("3"), json!("7000")],
                vec![json!("P2"), Value::Null, json!(100)],
            ],
        );
        let records = clean_activity(&table).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!((records[0].day_number, records[0].physical_activity), (1, 0));
        assert_eq!((records[1].day_number, records[1].physical_activity), (10, 50_000));
        assert_eq!((records[2].day_number, records[2].physical_activity), (3, 7000));
    }

    #[test]
    fn test_coercions() {
        assert_eq!(coerce_number(&json!("  4.5 ")), Some(4.5));
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!(true)), Some(1.0));
        assert_eq!(coerce_identifier(&json!(7.0)), "7");
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[]), None);
    }
}
