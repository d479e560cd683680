//! Remifentanil models. Drug in mcg/ml, targets in ng/ml.

use super::biometrics::lean_body_mass;
use super::{Bound, DrugModel, ModelParameters, Patient, ValidityBounds};
use crate::error::PKResult;

pub fn minto(patient: Patient) -> PKResult<DrugModel> {
    let Patient { sex, age, weight, height } = patient;
    let lbm = lean_body_mass(sex, weight, height);

    let v1 = 5.1 - 0.0201 * (age - 40.0) + 0.072 * (lbm - 55.0);
    let v2 = 9.82 - 0.0811 * (age - 40.0) + 0.108 * (lbm - 55.0);
    let v3 = 5.42;
    let k12 = (2.05 - 0.0301 * (age - 40.0)) / v1;
    let k13 = (0.076 - 0.00113 * (age - 40.0)) / v1;

    let parameters = ModelParameters {
        compartments: 3,
        v1,
        v2,
        v3,
        k10: (2.6 - 0.0162 * (age - 40.0) + 0.0191 * (lbm - 55.0)) / v1,
        k12,
        k13,
        k21: k12 * v1 / v2,
        k31: k13 * v1 / v3,
        ke0: 0.595 - 0.007 * (age - 40.0),
    };
    let bounds = ValidityBounds {
        age: Bound::at_least(12.0),
        weight: Bound::at_least(30.0),
        bmi: Bound::UNBOUNDED,
    };

    Ok(DrugModel::new("Minto", patient, parameters, bounds)?
        .with_units("mcg/ml", "ng/ml")
        .with_reference("9009935", "10.1097/00000542-199701000-00004"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sex;
    use approx::assert_relative_eq;

    #[test]
    fn test_minto_reference_patient() {
        let patient = Patient::new(Sex::Male, 40.0, 70.0, 170.0).unwrap();
        let model = minto(patient).unwrap();
        let lbm = lean_body_mass(Sex::Male, 70.0, 170.0);

        assert_relative_eq!(model.parameters.v1, 5.1 + 0.072 * (lbm - 55.0), epsilon = 1e-12);
        assert_relative_eq!(model.parameters.ke0, 0.595, epsilon = 1e-12);
        // Intercompartmental clearances are symmetric.
        let p = model.parameters;
        assert_relative_eq!(p.k12 * p.v1, p.k21 * p.v2, epsilon = 1e-12);
    }
}
