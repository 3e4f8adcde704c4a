//! Data Audit - plain-text data quality report over the cleaned datasets

use crate::cleaning::median;
use crate::error::Result;
use crate::records::{ActivityRecord, PatientRecord};
use crate::schema::{
    ADRENAL_AND_THYROID_DISORDERS, AGE, ALCOHOL_CONSUMPTION, BLOOD_PRESSURE_ABNORMALITY, BMI,
    CHRONIC_KIDNEY_DISEASE, GENETIC_PEDIGREE_COEFFICIENT, LEVEL_OF_HEMOGLOBIN, LEVEL_OF_STRESS, PREGNANCY,
    SALT_CONTENT, SEX, SMOKING,
};
use itertools::Itertools;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl NumericSummary {
    /// `None` for an empty sample. `std` is the sample standard deviation.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        Some(Self {
            count,
            mean,
            std,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            median: median(values).unwrap_or(mean),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub patient_count: usize,
    pub activity_count: usize,
    /// Nullable measures with at least one missing value
    pub missing: BTreeMap<String, usize>,
    /// Value counts for binary and ordinal columns
    pub distributions: BTreeMap<String, BTreeMap<i64, usize>>,
    pub continuous: BTreeMap<String, NumericSummary>,
    pub activity: Option<NumericSummary>,
    pub activity_patients: usize,
    pub days_covered: BTreeSet<i64>,
    pub common_patients: usize,
    pub patients_without_activity: usize,
    /// Activity rows whose patient is not in dataset 1
    pub orphan_activity_rows: usize,
    /// Strongest pairwise correlations between continuous measures
    pub top_correlations: Vec<(String, String, f64)>,
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let cov: f64 = pairs.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let var_x: f64 = pairs.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let var_y: f64 = pairs.iter().map(|(_, y)| (y - mean_y).powi(2)).sum();
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

impl AuditReport {
    pub fn build(patients: &[PatientRecord], activity: &[ActivityRecord]) -> Self {
        let nullable: [(&str, fn(&PatientRecord) -> Option<f64>); 3] = [
            (LEVEL_OF_HEMOGLOBIN, |p| p.hemoglobin),
            (BMI, |p| p.bmi),
            (SALT_CONTENT, |p| p.salt_content),
        ];
        let missing = nullable
            .iter()
            .map(|(name, get)| (name.to_string(), patients.iter().filter(|p| get(p).is_none()).count()))
            .filter(|(_, n)| *n > 0)
            .collect();

        let categorical: [(&str, fn(&PatientRecord) -> i64); 7] = [
            (BLOOD_PRESSURE_ABNORMALITY, |p| p.blood_pressure_abnormality),
            (SEX, |p| p.sex),
            (PREGNANCY, |p| p.pregnancy),
            (SMOKING, |p| p.smoking),
            (CHRONIC_KIDNEY_DISEASE, |p| p.chronic_kidney_disease),
            (ADRENAL_AND_THYROID_DISORDERS, |p| p.adrenal_thyroid_disorders),
            (LEVEL_OF_STRESS, |p| p.stress_level),
        ];
        let distributions = categorical
            .iter()
            .map(|(name, get)| {
                let counts: BTreeMap<i64, usize> = patients.iter().map(get).counts().into_iter().collect();
                (name.to_string(), counts)
            })
            .collect();

        let measures: [(&str, fn(&PatientRecord) -> Option<f64>); 6] = [
            (LEVEL_OF_HEMOGLOBIN, |p| p.hemoglobin),
            (GENETIC_PEDIGREE_COEFFICIENT, |p| Some(p.genetic_pedigree_coefficient)),
            (AGE, |p| Some(p.age as f64)),
            (BMI, |p| p.bmi),
            (SALT_CONTENT, |p| p.salt_content),
            (ALCOHOL_CONSUMPTION, |p| Some(p.alcohol_consumption)),
        ];
        let continuous = measures
            .iter()
            .filter_map(|(name, get)| {
                let values: Vec<f64> = patients.iter().filter_map(get).collect();
                NumericSummary::of(&values).map(|s| (name.to_string(), s))
            })
            .collect();

        let top_correlations = measures
            .iter()
            .tuple_combinations()
            .filter_map(|((a, get_a), (b, get_b))| {
                let pairs: Vec<(f64, f64)> = patients
                    .iter()
                    .filter_map(|p| Some((get_a(p)?, get_b(p)?)))
                    .collect();
                pearson(&pairs).map(|r| (a.to_string(), b.to_string(), r))
            })
            .sorted_by(|x, y| y.2.abs().total_cmp(&x.2.abs()))
            .take(10)
            .collect();

        let steps: Vec<f64> = activity.iter().map(|a| a.physical_activity as f64).collect();
        let patient_ids: BTreeSet<&str> = patients.iter().map(|p| p.patient_number.as_str()).collect();
        let activity_ids: BTreeSet<&str> = activity.iter().map(|a| a.patient_number.as_str()).collect();

        Self {
            patient_count: patients.len(),
            activity_count: activity.len(),
            missing,
            distributions,
            continuous,
            activity: NumericSummary::of(&steps),
            activity_patients: activity_ids.len(),
            days_covered: activity.iter().map(|a| a.day_number).collect(),
            common_patients: patient_ids.intersection(&activity_ids).count(),
            patients_without_activity: patient_ids.difference(&activity_ids).count(),
            orphan_activity_rows: activity
                .iter()
                .filter(|a| !patient_ids.contains(a.patient_number.as_str()))
                .count(),
            top_correlations,
        }
    }

    pub fn render(&self) -> String {
        let rule = "=".repeat(80);
        let thin = "-".repeat(80);
        let mut lines = vec![
            rule.clone(),
            "HEALTHCARE DATASETS - DATA AUDIT REPORT".to_string(),
            rule.clone(),
            String::new(),
            "DATASET 1: Health Dataset 1".to_string(),
            thin.clone(),
            format!("Total Records: {}", self.patient_count),
            String::new(),
            "Missing Values:".to_string(),
        ];

        if self.missing.is_empty() {
            lines.push("No missing values detected.".to_string());
        } else {
            lines.extend(self.missing.iter().map(|(col, n)| format!("  {}: {}", col, n)));
        }

        lines.push(String::new());
        lines.push("Categorical Variables Distribution:".to_string());
        for (col, counts) in &self.distributions {
            let parts = counts.iter().map(|(v, n)| format!("{}={}", v, n)).join(", ");
            lines.push(format!("  {}: {}", col, parts));
        }

        lines.push(String::new());
        lines.push("Continuous Variables Statistics:".to_string());
        for (col, s) in &self.continuous {
            lines.push(format!("\n{}:", col));
            lines.push(format!("  Mean: {:.2}", s.mean));
            lines.push(format!("  Std: {:.2}", s.std));
            lines.push(format!("  Min: {:.2}", s.min));
            lines.push(format!("  Max: {:.2}", s.max));
            lines.push(format!("  Median: {:.2}", s.median));
        }

        lines.push(String::new());
        lines.push(rule.clone());
        lines.push("DATASET 2: Health Dataset 2".to_string());
        lines.push(thin.clone());
        lines.push(format!("Total Records: {}", self.activity_count));
        lines.push(format!("Unique Patients: {}", self.activity_patients));
        if self.activity_patients > 0 {
            lines.push(format!(
                "Average records per patient: {:.2}",
                self.activity_count as f64 / self.activity_patients as f64
            ));
        }
        lines.push(format!(
            "Days covered: {}",
            self.days_covered.iter().map(|d| d.to_string()).join(", ")
        ));
        if let Some(s) = &self.activity {
            lines.push("Physical Activity Statistics:".to_string());
            lines.push(format!("  Mean steps/day: {:.2}", s.mean));
            lines.push(format!("  Std: {:.2}", s.std));
            lines.push(format!("  Min: {}", s.min));
            lines.push(format!("  Max: {}", s.max));
        }

        lines.push(String::new());
        lines.push(rule);
        lines.push("DATA RELATIONSHIP ANALYSIS".to_string());
        lines.push(thin);
        lines.push(format!("Common Patients (joinable): {}", self.common_patients));
        lines.push(format!("Patients only in Dataset 1: {}", self.patients_without_activity));
        lines.push(format!("Activity rows without a Dataset 1 patient: {}", self.orphan_activity_rows));

        if !self.top_correlations.is_empty() {
            lines.push(String::new());
            lines.push("Top Correlations:".to_string());
            for (a, b, r) in &self.top_correlations {
                lines.push(format!("  {} <-> {}: {:.3}", a, b, r));
            }
        }

        lines.join("\n")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.render())?;
        info!("Audit report saved to {}", path.display());
        Ok(())
    }
}
