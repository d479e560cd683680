//! Anthropometric formulas used by the published models.
//!
//! Weight in kg, height in cm, age in years, serum creatinine in umol/L.

use super::Sex;

const CREATININE_UMOL_PER_MG_DL: f64 = 88.42;

/// Body-mass index in kg/m^2, rounded to one decimal place.
pub fn body_mass_index(weight: f64, height: f64) -> f64 {
    let bmi = weight / (height / 100.0).powi(2);
    (bmi * 10.0).round() / 10.0
}

/// Lean body mass (James formula).
pub fn lean_body_mass(sex: Sex, weight: f64, height: f64) -> f64 {
    match sex {
        Sex::Male => 1.1 * weight - 128.0 * (weight / height).powi(2),
        Sex::Female => 1.07 * weight - 148.0 * (weight / height).powi(2),
    }
}

/// Fat-free mass (Janmahasatian).
pub fn ffm_janmahasatian(sex: Sex, weight: f64, height: f64) -> f64 {
    let bmi = body_mass_index(weight, height);
    match sex {
        Sex::Male => (9270.0 * weight) / (6680.0 + 216.0 * bmi),
        Sex::Female => (9270.0 * weight) / (8780.0 + 244.0 * bmi),
    }
}

/// Fat-free mass (Al-Sallami), an age-adjusted Janmahasatian.
pub fn ffm_al_sallami(sex: Sex, age: f64, weight: f64, height: f64) -> f64 {
    let factor = match sex {
        Sex::Male => 0.88 + (1.0 - 0.88) / (1.0 + (age / 13.4).powf(-12.7)),
        Sex::Female => 1.11 + (1.0 - 1.11) / (1.0 + (age / 7.1).powf(-1.1)),
    };
    factor * ffm_janmahasatian(sex, weight, height)
}

/// Creatinine clearance (Cockcroft-Gault) in ml/min.
///
/// Uses actual weight when underweight, ideal weight when normal and an
/// adjusted weight when overweight.
pub fn crcl_cockcroft_gault(sex: Sex, age: f64, weight: f64, height: f64, creatinine: f64) -> f64 {
    let (ibw_base, sex_factor) = match sex {
        Sex::Male => (50.0, 1.0),
        Sex::Female => (45.5, 0.85),
    };
    let ibw = ibw_base + 2.3 * (height - 152.4).max(0.0) / 2.54;

    let bmi = body_mass_index(weight, height);
    let dosing_weight = if bmi < 18.5 {
        weight
    } else if bmi < 25.0 {
        ibw
    } else {
        ibw + 0.4 * (weight - ibw)
    };

    ((140.0 - age) * dosing_weight * sex_factor) / (creatinine * (72.0 / CREATININE_UMOL_PER_MG_DL))
}

/// Creatinine clearance (bedside Schwartz) in ml/min/1.73m^2.
pub fn crcl_schwartz(height: f64, creatinine: f64) -> f64 {
    0.413 * height / (creatinine / CREATININE_UMOL_PER_MG_DL)
}

/// Body-surface area (DuBois) in m^2.
pub fn bsa_dubois(weight: f64, height: f64) -> f64 {
    0.007184 * height.powf(0.725) * weight.powf(0.425)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_body_mass_index_rounding() {
        assert_relative_eq!(body_mass_index(70.0, 170.0), 24.2, epsilon = 1e-12);
        assert_relative_eq!(body_mass_index(100.0, 200.0), 25.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lean_body_mass() {
        let expected = 1.1 * 70.0 - 128.0 * (70.0_f64 / 170.0).powi(2);
        assert_relative_eq!(lean_body_mass(Sex::Male, 70.0, 170.0), expected, epsilon = 1e-12);
        assert!(lean_body_mass(Sex::Female, 70.0, 170.0) < lean_body_mass(Sex::Male, 70.0, 170.0));
    }

    #[test]
    fn test_fat_free_mass() {
        let janmahasatian = ffm_janmahasatian(Sex::Male, 70.0, 170.0);
        assert_relative_eq!(janmahasatian, 9270.0 * 70.0 / (6680.0 + 216.0 * 24.2), epsilon = 1e-9);

        // Adult males converge on the Janmahasatian value.
        let al_sallami = ffm_al_sallami(Sex::Male, 40.0, 70.0, 170.0);
        assert_relative_eq!(al_sallami, janmahasatian, max_relative = 1e-3);
    }

    #[test]
    fn test_creatinine_clearance() {
        // Normal BMI uses ideal body weight: 50 + 2.3 * (177.8 - 152.4) / 2.54 = 73 kg.
        let crcl = crcl_cockcroft_gault(Sex::Male, 40.0, 70.0, 177.8, 88.42);
        assert_relative_eq!(crcl, 100.0 * 73.0 / 72.0, max_relative = 1e-9);

        assert_relative_eq!(crcl_schwartz(120.0, 44.21), 0.413 * 120.0 * 2.0, max_relative = 1e-12);
    }

    #[test]
    fn test_body_surface_area() {
        assert_relative_eq!(bsa_dubois(70.0, 170.0), 1.8097, max_relative = 1e-3);
    }
}
