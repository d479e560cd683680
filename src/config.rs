use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::dosing::InfusionSegment;
use crate::engine::{ke0_from_tpeak, Site};
use crate::error::{PKError, PKResult};
use crate::models::{atracurium, DrugModel, ModelParameters, Patient, PublishedModel, Sex, ValidityBounds};
use crate::pump::{DoseInterval, Pump, PumpSettings, TargetOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub patient: PatientConfig,
    pub model: ModelConfig,
    pub pump: PumpConfig,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
    #[serde(default)]
    pub infusions: Vec<InfusionSegment>,
    #[serde(default)]
    pub dose_interval: DoseInterval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientConfig {
    pub sex: u8,     // 0 male, 1 female
    pub age: f64,    // years
    pub weight: f64, // kg
    pub height: f64, // cm
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelConfig {
    Published {
        name: PublishedModel,
        /// Burns-patient parameters (Marathe only).
        #[serde(default)]
        burns: bool,
        /// Replaces the model's ke0 with one solved from a time to peak effect (s).
        #[serde(default)]
        tpeak: Option<f64>,
    },
    Custom {
        #[serde(default = "custom_name")]
        name: String,
        parameters: ModelParameters,
        #[serde(default)]
        bounds: ValidityBounds,
        #[serde(default)]
        units: Option<UnitsConfig>,
        #[serde(default)]
        tpeak: Option<f64>,
    },
}

fn custom_name() -> String {
    "Custom".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitsConfig {
    pub concentration: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpConfig {
    pub drug_concentration: f64,
    pub end_time: f64,
    #[serde(default = "default_cp_limit")]
    pub cp_limit: f64,
    #[serde(default = "default_cp_limit_duration")]
    pub cp_limit_duration: f64,
    #[serde(default = "default_maintenance_duration")]
    pub maintenance_duration: f64,
    #[serde(default = "default_maintenance_multiplier")]
    pub maintenance_multiplier: f64,
    /// ml/h; -1 disables the limit.
    #[serde(default = "default_max_infusion_rate")]
    pub max_infusion_rate: f64,
    #[serde(default = "default_bolus_time")]
    pub bolus_time: f64,
}

fn default_cp_limit() -> f64 { 1.2 }
fn default_cp_limit_duration() -> f64 { 10.0 }
fn default_maintenance_duration() -> f64 { 300.0 }
fn default_maintenance_multiplier() -> f64 { 2.0 }
fn default_max_infusion_rate() -> f64 { 1200.0 }
fn default_bolus_time() -> f64 { 20.0 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub start: f64,
    pub level: f64,
    pub duration: f64,
    #[serde(default)]
    pub site: Site,
    #[serde(flatten)]
    pub options: TargetOptions,
}

impl ScenarioConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> PKResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScenarioConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field by building the pump the scenario describes.
    pub fn validate(&self) -> PKResult<()> {
        self.build_pump().map(|_| ())
    }

    pub fn build_pump(&self) -> PKResult<Pump> {
        let model = self.model.build(self.patient.to_patient()?)?;
        let mut pump = Pump::new(model, self.pump.to_settings()?)?;

        for target in &self.targets {
            pump.add_target(target.start, target.level, target.duration, target.site, target.options)?;
        }
        for infusion in &self.infusions {
            pump.add_infusion(infusion.start, infusion.dose_per_second, infusion.duration)?;
        }

        Ok(pump)
    }
}

impl PatientConfig {
    pub fn to_patient(&self) -> PKResult<Patient> {
        Patient::new(Sex::from_code(self.sex)?, self.age, self.weight, self.height)
    }
}

impl ModelConfig {
    pub fn build(&self, patient: Patient) -> PKResult<DrugModel> {
        let (model, tpeak) = match self {
            ModelConfig::Published { name, burns, tpeak } => {
                let model = match (name, burns) {
                    (PublishedModel::Marathe, true) => atracurium::marathe(patient, true)?,
                    (_, true) => {
                        return Err(PKError::InvalidModel(
                            format!("{:?} has no burns-patient variant", name)
                        ));
                    }
                    (_, false) => name.build(patient)?,
                };
                (model, *tpeak)
            }
            ModelConfig::Custom { name, parameters, bounds, units, tpeak } => {
                let mut model = DrugModel::new(name.as_str(), patient, *parameters, *bounds)?;
                if let Some(units) = units {
                    model = model.with_units(&units.concentration, &units.target);
                }
                (model, *tpeak)
            }
        };

        match tpeak {
            Some(tpeak) => model.with_ke0(ke0_from_tpeak(&model, tpeak)?),
            None => Ok(model),
        }
    }
}

impl PumpConfig {
    pub fn to_settings(&self) -> PKResult<PumpSettings> {
        let max_infusion_rate = if self.max_infusion_rate == -1.0 {
            None
        } else {
            Some(self.max_infusion_rate)
        };

        let settings = PumpSettings {
            drug_concentration: self.drug_concentration,
            end_time: self.end_time,
            cp_limit: self.cp_limit,
            cp_limit_duration: self.cp_limit_duration,
            maintenance_duration: self.maintenance_duration,
            maintenance_multiplier: self.maintenance_multiplier,
            max_infusion_rate,
            bolus_time: self.bolus_time,
        };
        settings.validate()?;
        Ok(settings)
    }
}
