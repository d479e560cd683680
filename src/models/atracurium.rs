//! Atracurium. Drug in mg/ml, targets in ug/ml.

use super::{Bound, DrugModel, ModelParameters, Patient, ValidityBounds};
use crate::error::PKResult;

/// One-compartment model; `burns` selects the parameters fitted to burns patients.
pub fn marathe(patient: Patient, burns: bool) -> PKResult<DrugModel> {
    let weight = patient.weight;
    let (v1, cl1, ke0) = if burns {
        (60.9 / 1000.0 * weight, 5.34 / 1000.0 * weight, 0.1)
    } else {
        (66.3 / 1000.0 * weight, 5.81 / 1000.0 * weight, 0.074)
    };

    let parameters = ModelParameters {
        compartments: 1,
        v1,
        k10: cl1 / v1,
        ke0,
        ..Default::default()
    };
    let bounds = ValidityBounds { age: Bound::between(16.0, 52.0), ..Default::default() };

    Ok(DrugModel::new("Marathe", patient, parameters, bounds)?
        .with_units("mg/ml", "ug/ml")
        .with_reference("2719307", "10.1097/00000542-198905000-00007"))
}
