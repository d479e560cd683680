//! Alfentanil models. Drug in mcg/ml, targets in ng/ml. Both use the
//! ke0 of 0.77/min from Scott et al. (PMID 1824743).

use super::{Bound, DrugModel, ModelParameters, Patient, ValidityBounds};
use crate::error::PKResult;

const KE0: f64 = 0.77;

/// Paediatric two-compartment model.
pub fn goresky(patient: Patient) -> PKResult<DrugModel> {
    let parameters = ModelParameters {
        compartments: 2,
        v1: 0.206 * patient.weight,
        k10: 0.038,
        k12: 0.018,
        k21: 0.018,
        ke0: KE0,
        ..Default::default()
    };
    let bounds = ValidityBounds { age: Bound::between(1.0, 14.0), ..Default::default() };

    Ok(DrugModel::new("Goresky", patient, parameters, bounds)?
        .with_units("mcg/ml", "ng/ml")
        .with_reference("3118743", "10.1097/00000542-198711000-00007"))
}

pub fn scott(patient: Patient) -> PKResult<DrugModel> {
    let v1 = 2.185 / 70.0 * patient.weight;
    let parameters = ModelParameters {
        compartments: 3,
        v1,
        k10: 0.195 / v1,
        k12: 0.656,
        k13: 0.113,
        k21: 0.214,
        k31: 0.017,
        ke0: KE0,
        ..Default::default()
    };

    Ok(DrugModel::new("Scott", patient, parameters, ValidityBounds::default())?
        .with_units("mcg/ml", "ng/ml")
        .with_reference("3100765", ""))
}
