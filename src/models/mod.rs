pub mod alfentanil;
pub mod atracurium;
pub mod biometrics;
pub mod propofol;
pub mod remifentanil;

use crate::error::{require_positive, PKError, PKResult};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Maps the 0 (male) / 1 (female) convention used by published models.
    pub fn from_code(code: u8) -> PKResult<Self> {
        match code {
            0 => Ok(Sex::Male),
            1 => Ok(Sex::Female),
            _ => Err(PKError::InvalidParameter(
                format!("sex must be 0 (male) or 1 (female), got {}", code)
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub sex: Sex,
    pub age: f64,    // years
    pub weight: f64, // kg
    pub height: f64, // cm
}

impl Patient {
    pub fn new(sex: Sex, age: f64, weight: f64, height: f64) -> PKResult<Self> {
        Ok(Self {
            sex,
            age: require_positive("age", age)?,
            weight: require_positive("weight", weight)?,
            height: require_positive("height", height)?,
        })
    }

    pub fn bmi(&self) -> f64 {
        biometrics::body_mass_index(self.weight, self.height)
    }
}

/// Inclusive range a model was validated over. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
}

impl Bound {
    pub const UNBOUNDED: Bound = Bound { lower: None, upper: None };

    pub const fn between(lower: f64, upper: f64) -> Self {
        Bound { lower: Some(lower), upper: Some(upper) }
    }

    pub const fn at_least(lower: f64) -> Self {
        Bound { lower: Some(lower), upper: None }
    }

    pub const fn at_most(upper: f64) -> Self {
        Bound { lower: None, upper: Some(upper) }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidityBounds {
    #[serde(default)]
    pub age: Bound,
    #[serde(default)]
    pub weight: Bound,
    #[serde(default)]
    pub bmi: Bound,
}

/// Published source of a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub pmid: String,
    pub doi: String,
}

/// Raw compartmental parameters. Rate constants are per minute, volumes in
/// litres. Entries for compartments the model does not have stay at 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub compartments: u8,
    pub v1: f64,
    #[serde(default)]
    pub v2: f64,
    #[serde(default)]
    pub v3: f64,
    pub k10: f64,
    #[serde(default)]
    pub k12: f64,
    #[serde(default)]
    pub k13: f64,
    #[serde(default)]
    pub k21: f64,
    #[serde(default)]
    pub k31: f64,
    pub ke0: f64,
}

impl ModelParameters {
    fn validate(&self) -> PKResult<()> {
        if ![1, 2, 3].contains(&self.compartments) {
            return Err(PKError::InvalidModel(
                "Number of compartments must be 1, 2, or 3".to_string()
            ));
        }

        let mut required = vec![("v1", self.v1), ("k10", self.k10), ("ke0", self.ke0)];
        if self.compartments >= 2 {
            required.extend([("k12", self.k12), ("k21", self.k21)]);
        }
        if self.compartments == 3 {
            required.extend([("k13", self.k13), ("k31", self.k31)]);
        }

        for (name, value) in required {
            if !value.is_finite() || value <= 0.0 {
                return Err(PKError::InvalidModel(
                    format!("Parameter {} must be positive for a {}-compartment model", name, self.compartments)
                ));
            }
        }

        Ok(())
    }
}

/// An immutable PK/PD model for one patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrugModel {
    pub name: String,
    pub patient: Patient,
    pub parameters: ModelParameters,
    pub bounds: ValidityBounds,
    pub concentration_unit: String,
    pub target_unit: String,
    pub reference: Option<Reference>,
    warnings: Vec<String>,
}

impl DrugModel {
    /// Builds a model and checks the patient against the published ranges.
    /// Out-of-range anthropometrics are recorded as warnings, not errors.
    pub fn new(
        name: impl Into<String>,
        patient: Patient,
        parameters: ModelParameters,
        bounds: ValidityBounds,
    ) -> PKResult<Self> {
        parameters.validate()?;

        let mut model = Self {
            name: name.into(),
            patient,
            parameters,
            bounds,
            concentration_unit: "mg/ml".to_string(),
            target_unit: "ug/ml".to_string(),
            reference: None,
            warnings: Vec::new(),
        };
        model.validate_anthropometric_values();
        Ok(model)
    }

    pub fn with_units(mut self, concentration_unit: &str, target_unit: &str) -> Self {
        self.concentration_unit = concentration_unit.to_string();
        self.target_unit = target_unit.to_string();
        self
    }

    pub fn with_reference(mut self, pmid: &str, doi: &str) -> Self {
        self.reference = Some(Reference { pmid: pmid.to_string(), doi: doi.to_string() });
        self
    }

    /// Same model with a different effect-site rate constant (per minute).
    pub fn with_ke0(&self, ke0: f64) -> PKResult<Self> {
        let mut model = self.clone();
        model.parameters.ke0 = require_positive("ke0", ke0)?;
        Ok(model)
    }

    pub fn compartments(&self) -> u8 {
        self.parameters.compartments
    }

    pub fn weight(&self) -> f64 {
        self.patient.weight
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn validate_anthropometric_values(&mut self) {
        let checks = [
            ("Age", "yrs", self.patient.age, self.bounds.age),
            ("Weight", "kg", self.patient.weight, self.bounds.weight),
            ("BMI", "kg/m^2", self.patient.bmi(), self.bounds.bmi),
        ];

        for (label, unit, value, bound) in checks {
            if let Some(lower) = bound.lower.filter(|lower| value < *lower) {
                self.record_warning(format!(
                    "{} {} {} is below the model's validated {} of {} {}",
                    label, value, unit, label.to_lowercase(), lower, unit
                ));
            }
            if let Some(upper) = bound.upper.filter(|upper| value > *upper) {
                self.record_warning(format!(
                    "{} {} {} is above the model's validated {} of {} {}",
                    label, value, unit, label.to_lowercase(), upper, unit
                ));
            }
        }
    }

    fn record_warning(&mut self, description: String) {
        debug!("{}: {}", self.name, description);
        self.warnings.push(description);
    }
}

/// Published models selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishedModel {
    MarshDiprifusor,
    MarshModified,
    Schnider,
    Paedfusor,
    Kataria,
    Minto,
    Goresky,
    Scott,
    Marathe,
}

impl PublishedModel {
    pub fn build(&self, patient: Patient) -> PKResult<DrugModel> {
        match self {
            PublishedModel::MarshDiprifusor => propofol::marsh_diprifusor(patient),
            PublishedModel::MarshModified => propofol::marsh_modified(patient),
            PublishedModel::Schnider => propofol::schnider(patient),
            PublishedModel::Paedfusor => propofol::paedfusor(patient),
            PublishedModel::Kataria => propofol::kataria(patient),
            PublishedModel::Minto => remifentanil::minto(patient),
            PublishedModel::Goresky => alfentanil::goresky(patient),
            PublishedModel::Scott => alfentanil::scott(patient),
            PublishedModel::Marathe => atracurium::marathe(patient, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adult() -> Patient {
        Patient::new(Sex::Male, 35.0, 70.0, 170.0).unwrap()
    }

    fn one_compartment() -> ModelParameters {
        ModelParameters { compartments: 1, v1: 10.0, k10: 0.1, ke0: 0.5, ..Default::default() }
    }

    #[test]
    fn test_patient_rejects_non_positive_values() {
        assert!(matches!(Patient::new(Sex::Male, 0.0, 70.0, 170.0), Err(PKError::InvalidParameter(_))));
        assert!(matches!(Patient::new(Sex::Male, 35.0, -1.0, 170.0), Err(PKError::InvalidParameter(_))));
        assert!(matches!(Patient::new(Sex::Female, 35.0, 70.0, f64::NAN), Err(PKError::InvalidParameter(_))));
        assert!(matches!(Sex::from_code(2), Err(PKError::InvalidParameter(_))));
        assert_eq!(Sex::from_code(1).unwrap(), Sex::Female);
    }

    #[test]
    fn test_missing_rate_constant_rejected() {
        let params = ModelParameters { compartments: 2, k12: 0.1, ..one_compartment() };
        let result = DrugModel::new("two", adult(), params, ValidityBounds::default());
        assert!(matches!(result, Err(PKError::InvalidModel(_))));

        let params = ModelParameters { compartments: 4, ..one_compartment() };
        assert!(DrugModel::new("four", adult(), params, ValidityBounds::default()).is_err());
    }

    #[test]
    fn test_out_of_range_values_warn_but_construct() {
        let bounds = ValidityBounds {
            age: Bound::between(40.0, 80.0),
            weight: Bound::at_most(60.0),
            bmi: Bound::UNBOUNDED,
        };
        let model = DrugModel::new("bounded", adult(), one_compartment(), bounds).unwrap();

        assert_eq!(model.warnings().len(), 2);
        assert!(model.warnings()[0].contains("below"));
        assert!(model.warnings()[1].contains("above"));
    }

    #[test]
    fn test_in_range_values_do_not_warn() {
        let bounds = ValidityBounds { age: Bound::at_least(16.0), ..Default::default() };
        let model = DrugModel::new("bounded", adult(), one_compartment(), bounds).unwrap();
        assert!(model.warnings().is_empty());
    }

    #[test]
    fn test_published_model_dispatch() {
        let model = PublishedModel::Minto.build(adult()).unwrap();
        assert_eq!(model.compartments(), 3);
        assert_eq!(model.target_unit, "ng/ml");

        let model = PublishedModel::Marathe.build(adult()).unwrap();
        assert_eq!(model.compartments(), 1);
    }
}
