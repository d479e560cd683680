//! Propofol models. Drug in mg/ml, targets in ug/ml.

use super::biometrics::lean_body_mass;
use super::{Bound, DrugModel, ModelParameters, Patient, Sex, ValidityBounds};
use crate::error::PKResult;

fn propofol(name: &str, patient: Patient, parameters: ModelParameters, bounds: ValidityBounds) -> PKResult<DrugModel> {
    Ok(DrugModel::new(name, patient, parameters, bounds)?.with_units("mg/ml", "ug/ml"))
}

fn marsh(name: &str, patient: Patient, ke0: f64) -> PKResult<DrugModel> {
    let weight = patient.weight;
    let parameters = ModelParameters {
        compartments: 3,
        v1: 0.228 * weight,
        v2: 0.463 * weight,
        v3: 2.893 * weight,
        k10: 0.119,
        k12: 0.112,
        k13: 0.0419,
        k21: 0.055,
        k31: 0.0033,
        ke0,
    };
    let bounds = ValidityBounds {
        age: Bound::at_least(16.0),
        weight: Bound::at_most(150.0),
        bmi: Bound::UNBOUNDED,
    };
    Ok(propofol(name, patient, parameters, bounds)?.with_reference("1859758", "10.1093/bja/67.1.41"))
}

/// Marsh as implemented in the Diprifusor, ke0 0.26/min.
pub fn marsh_diprifusor(patient: Patient) -> PKResult<DrugModel> {
    marsh("Marsh (Diprifusor)", patient, 0.26)
}

/// Marsh with ke0 1.2/min.
pub fn marsh_modified(patient: Patient) -> PKResult<DrugModel> {
    marsh("Marsh (modified)", patient, 1.2)
}

pub fn schnider(patient: Patient) -> PKResult<DrugModel> {
    let Patient { sex, age, weight, height } = patient;
    let lbm = lean_body_mass(sex, weight, height);

    let v1 = 4.27;
    let v2 = 18.9 - 0.391 * (age - 53.0);
    let v3 = 238.0;
    let cl1 = 1.89 + 0.0456 * (weight - 77.0) - 0.0681 * (lbm - 59.0) + 0.0264 * (height - 177.0);
    let cl2 = 1.29 - 0.024 * (age - 53.0);
    let cl3 = 0.836;

    let parameters = ModelParameters {
        compartments: 3,
        v1,
        v2,
        v3,
        k10: cl1 / v1,
        k12: cl2 / v1,
        k13: cl3 / v1,
        k21: cl2 / v2,
        k31: cl3 / v3,
        // time to peak effect of 1.6 minutes
        ke0: 0.456,
    };
    let bmi_upper = match sex {
        Sex::Male => 42.0,
        Sex::Female => 35.0,
    };
    let bounds = ValidityBounds { bmi: Bound::at_most(bmi_upper), ..Default::default() };

    Ok(propofol("Schnider", patient, parameters, bounds)?
        .with_reference("9605675", "10.1097/00000542-199805000-00006"))
}

pub fn paedfusor(patient: Patient) -> PKResult<DrugModel> {
    let Patient { age, weight, .. } = patient;
    let (v1_per_kg, k10) = if age < 13.0 {
        (0.4584, 0.1527 * weight.powf(-0.3))
    } else if age < 14.0 {
        (0.4, 0.0678)
    } else if age < 15.0 {
        (0.342, 0.0792)
    } else if age < 16.0 {
        (0.284, 0.0954)
    } else {
        (0.22857, 0.119)
    };

    let v1 = v1_per_kg * weight;
    let (k12, k13, k21, k31) = (0.114, 0.0419, 0.055, 0.0033);
    let parameters = ModelParameters {
        compartments: 3,
        v1,
        v2: v1 * k12 / k21,
        v3: v1 * k13 / k31,
        k10,
        k12,
        k13,
        k21,
        k31,
        ke0: 0.26,
    };
    let bounds = ValidityBounds {
        age: Bound::between(1.0, 16.0),
        weight: Bound::between(5.0, 61.0),
        bmi: Bound::UNBOUNDED,
    };

    Ok(propofol("Paedfusor", patient, parameters, bounds)?.with_reference("15941735", "10.1093/bja/aei567"))
}

pub fn kataria(patient: Patient) -> PKResult<DrugModel> {
    let Patient { age, weight, .. } = patient;
    let v1 = 0.41 * weight;
    let v2 = 0.78 * weight + 3.1 * age - 16.0;
    let v3 = 6.9 * weight;
    let (cl1, cl2, cl3) = (0.035 * weight, 0.077 * weight, 0.026 * weight);

    let parameters = ModelParameters {
        compartments: 3,
        v1,
        v2,
        v3,
        k10: cl1 / v1,
        k12: cl2 / v1,
        k13: cl3 / v1,
        k21: cl2 / v2,
        k31: cl3 / v3,
        ke0: 0.41,
    };
    let bounds = ValidityBounds {
        age: Bound::between(3.0, 11.0),
        weight: Bound::between(15.0, 61.0),
        bmi: Bound::UNBOUNDED,
    };

    Ok(propofol("Kataria", patient, parameters, bounds)?
        .with_reference("8291699", "10.1097/00000542-199401000-00018"))
}
