//! Synthetic dataset generator
//!
//! Produces realistic-looking patient and activity rows for local runs when
//! the real workbook is not available. Output is deterministic for a seed.

use crate::error::{AnalyticsError, Result};
use crate::records::{ActivityRecord, PatientRecord};
use rand::distributions::{Bernoulli, Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Exp, Normal};
use serde::Serialize;
use std::path::Path;
use tracing::info;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_PATIENTS: usize = 2000;
pub const DEFAULT_ACTIVITY_ROWS: usize = 20_000;
pub const DAYS_PER_PATIENT: i64 = 10;

fn distribution_error(e: impl std::fmt::Display) -> AnalyticsError {
    AnalyticsError::Data(format!("Invalid distribution parameters: {}", e))
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn patient_id(index: usize) -> String {
    format!("P{:05}", index + 1)
}

fn flag<R: Rng>(rng: &mut R, dist: &Bernoulli) -> i64 {
    dist.sample(rng) as i64
}

/// `n` patients with ids `P00001..`; older patients are more likely to have
/// abnormal blood pressure and smokers skew towards high stress.
pub fn generate_patients<R: Rng>(n: usize, rng: &mut R) -> Result<Vec<PatientRecord>> {
    let bp_abnormal = Bernoulli::new(0.3).map_err(distribution_error)?;
    let bp_abnormal_older = Bernoulli::new(0.5).map_err(distribution_error)?;
    let female = Bernoulli::new(0.5).map_err(distribution_error)?;
    let pregnant = Bernoulli::new(0.15).map_err(distribution_error)?;
    let smoker = Bernoulli::new(0.25).map_err(distribution_error)?;
    let kidney = Bernoulli::new(0.1).map_err(distribution_error)?;
    let adrenal = Bernoulli::new(0.15).map_err(distribution_error)?;

    let hemoglobin = Normal::<f64>::new(14.5, 2.5).map_err(distribution_error)?;
    let bmi = Normal::<f64>::new(25.0, 5.0).map_err(distribution_error)?;
    let salt = Normal::<f64>::new(3500.0, 1000.0).map_err(distribution_error)?;
    let pedigree = Beta::<f64>::new(2.0, 5.0).map_err(distribution_error)?;
    let alcohol = Exp::<f64>::new(1.0 / 20.0).map_err(distribution_error)?;

    let stress = WeightedIndex::new([0.3, 0.5, 0.2]).map_err(distribution_error)?;
    let smoker_stress = WeightedIndex::new([0.1, 0.3, 0.6]).map_err(distribution_error)?;

    let mut patients = Vec::with_capacity(n);
    for i in 0..n {
        let age: i64 = rng.gen_range(18..85);
        let sex = flag(rng, &female);
        let smoking = flag(rng, &smoker);

        let blood_pressure_abnormality = if age > 60 {
            flag(rng, &bp_abnormal_older)
        } else {
            flag(rng, &bp_abnormal)
        };
        let stress_level = if smoking == 1 {
            smoker_stress.sample(rng) as i64 + 1
        } else {
            stress.sample(rng) as i64 + 1
        };
        let pregnancy = if sex == 0 { 0 } else { flag(rng, &pregnant) };

        patients.push(PatientRecord {
            patient_number: patient_id(i),
            blood_pressure_abnormality,
            hemoglobin: Some(hemoglobin.sample(rng).clamp(8.0, 20.0)),
            genetic_pedigree_coefficient: pedigree.sample(rng),
            age,
            bmi: Some(bmi.sample(rng).clamp(15.0, 45.0)),
            sex,
            pregnancy,
            smoking,
            salt_content: Some(salt.sample(rng).clamp(1000.0, 8000.0)),
            alcohol_consumption: alcohol.sample(rng).clamp(0.0, 200.0),
            stress_level,
            chronic_kidney_disease: flag(rng, &kidney),
            adrenal_thyroid_disorders: flag(rng, &adrenal),
        });
    }

    Ok(patients)
}

/// Ten days of steps per patient around a per-patient baseline, then random
/// extra (patient, day) rows up to `rows`. Output is truncated to `rows`.
pub fn generate_activity<R: Rng>(patient_ids: &[String], rows: usize, rng: &mut R) -> Result<Vec<ActivityRecord>> {
    let baseline = Normal::<f64>::new(8000.0, 2000.0).map_err(distribution_error)?;
    let daily_steps = |rng: &mut R, base: f64| -> Result<i64> {
        let daily = Normal::new(base, 1500.0).map_err(distribution_error)?;
        Ok(daily.sample(rng).max(0.0) as i64)
    };

    let mut activity = Vec::with_capacity(rows.max(patient_ids.len() * DAYS_PER_PATIENT as usize));
    for id in patient_ids {
        let base = baseline.sample(rng);
        for day in 1..=DAYS_PER_PATIENT {
            activity.push(ActivityRecord {
                patient_number: id.clone(),
                day_number: day,
                physical_activity: daily_steps(rng, base)?,
            });
        }
    }

    while activity.len() < rows {
        let Some(id) = patient_ids.choose(rng) else {
            break;
        };
        let day = rng.gen_range(1..=DAYS_PER_PATIENT);
        let base = baseline.sample(rng);
        activity.push(ActivityRecord {
            patient_number: id.clone(),
            day_number: day,
            physical_activity: daily_steps(rng, base)?,
        });
    }

    activity.truncate(rows);
    Ok(activity)
}

/// Write records as a headed CSV file, creating the directory if needed.
pub fn write_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
