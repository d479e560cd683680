use crate::simulation::{InfusionSource, SimulationResult};
use crate::error::PKResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::fs::File;
use log::info;

/// Headline numbers written to `summary.json`.
#[derive(Debug, Serialize)]
pub struct SimulationSummary {
    pub model: String,
    pub target_unit: String,
    pub warnings: Vec<String>,
    pub max_plasma: f64,
    pub time_to_max_plasma: Option<f64>,
    pub max_effect: f64,
    pub time_to_max_effect: Option<f64>,
    pub plasma_auc: f64,
    pub total_dose: f64,
    pub generated_at: DateTime<Utc>,
}

impl SimulationSummary {
    pub fn from_result(result: &SimulationResult) -> Self {
        Self {
            model: result.model.clone(),
            target_unit: result.target_unit.clone(),
            warnings: result.warnings.clone(),
            max_plasma: result.max_plasma(),
            time_to_max_plasma: result.time_to_max_plasma(),
            max_effect: result.max_effect(),
            time_to_max_effect: result.time_to_max_effect(),
            plasma_auc: result.plasma_auc(),
            total_dose: result.total_dose(),
            generated_at: Utc::now(),
        }
    }
}

pub fn save_results<P: AsRef<Path>>(result: &SimulationResult, output_dir: P) -> PKResult<()> {
    let output_path = output_dir.as_ref();

    save_concentration_data(result, &output_path.join("concentrations.csv"))?;
    save_infusion_data(result, &output_path.join("infusions.csv"))?;
    save_rate_data(result, &output_path.join("rates.csv"))?;
    save_dose_weight_data(result, &output_path.join("dose_weight.csv"))?;

    let summary = SimulationSummary::from_result(result);
    save_summary(&summary, &output_path.join("summary.json"))?;

    info!("All results saved to {:?}", output_path);
    Ok(())
}

fn save_concentration_data<P: AsRef<Path>>(result: &SimulationResult, path: P) -> PKResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["TIME", "PLASMA", "EFFECT"])?;
    for sample in &result.samples {
        writer.write_record(&[
            sample.time.to_string(),
            sample.plasma.to_string(),
            sample.effect.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_infusion_data<P: AsRef<Path>>(result: &SimulationResult, path: P) -> PKResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["START", "DOSE_PER_SECOND", "DURATION", "END", "SOURCE"])?;
    for record in &result.infusions {
        let source = match record.source {
            InfusionSource::Target => "target",
            InfusionSource::User => "user",
        };
        writer.write_record(&[
            record.segment.start.to_string(),
            record.segment.dose_per_second.to_string(),
            record.segment.duration.to_string(),
            record.segment.end().to_string(),
            source.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_rate_data<P: AsRef<Path>>(result: &SimulationResult, path: P) -> PKResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["TIME", "ML_PER_HOUR"])?;
    for rate in &result.rates {
        writer.write_record(&[rate.time.to_string(), rate.ml_per_hour.to_string()])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_dose_weight_data<P: AsRef<Path>>(result: &SimulationResult, path: P) -> PKResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["TIME", "DOSE_PER_WEIGHT", "BOLUS"])?;
    for row in &result.dose_weight {
        writer.write_record(&[
            row.time.to_string(),
            row.dose_per_weight.to_string(),
            row.bolus.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_summary<P: AsRef<Path>>(summary: &SimulationSummary, path: P) -> PKResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}

/// Writes `simulation_report.md` alongside the data files.
pub fn generate_report<P: AsRef<Path>>(result: &SimulationResult, output_dir: P) -> PKResult<()> {
    let report_path = output_dir.as_ref().join("simulation_report.md");
    let summary = SimulationSummary::from_result(result);
    let unit = &result.target_unit;

    let targets: String = result.outcomes.iter()
        .map(|outcome| format!(
            "| {} | {:?} | {} | {} |\n",
            outcome.start, outcome.site, outcome.level, outcome.reached
        ))
        .collect();

    let warnings = if result.warnings.is_empty() {
        "None".to_string()
    } else {
        result.warnings.iter().map(|w| format!("- {}", w)).collect::<Vec<_>>().join("\n")
    };

    let report_content = format!(
        r#"# Target-Controlled Infusion Simulation Report

Generated {}

## Model
- **Model**: {}
- **Drug concentration unit**: {}
- **Target unit**: {}

### Warnings
{}

## Targets
| Start (s) | Site | Level ({}) | Reached (s) |
|---|---|---|---|
{}
## Concentrations
- **Peak plasma**: {:.4} {} at {} s
- **Peak effect site**: {:.4} {} at {} s
- **Plasma AUC**: {:.3} {}*s

## Dosing
- **Segments**: {} ({} from targets)
- **Total dose**: {:.4}

## Files Generated
- `concentrations.csv`: Plasma and effect-site concentration every second
- `infusions.csv`: Infusion segments with their source
- `rates.csv`: Pump rate changes in ml/h
- `dose_weight.csv`: Doses per kg
- `summary.json`: Summary statistics
"#,
        summary.generated_at.to_rfc3339(),
        result.model,
        result.concentration_unit,
        unit,
        warnings,
        unit,
        targets,
        summary.max_plasma,
        unit,
        summary.time_to_max_plasma.unwrap_or(0.0),
        summary.max_effect,
        unit,
        summary.time_to_max_effect.unwrap_or(0.0),
        summary.plasma_auc,
        unit,
        result.infusions.len(),
        result.infusions.iter().filter(|record| record.source == InfusionSource::Target).count(),
        summary.total_dose,
    );

    std::fs::write(report_path, report_content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioConfig;
    use crate::simulation::Simulator;

    fn simulated() -> SimulationResult {
        let config: ScenarioConfig = serde_json::from_str(r#"{
            "patient": {"sex": 0, "age": 50, "weight": 80, "height": 180},
            "model": {"published": {"name": "minto"}},
            "pump": {"drug_concentration": 50, "end_time": 600},
            "targets": [{"start": 0, "level": 4.0, "duration": 60, "site": "effect"}],
            "infusions": [{"start": 300, "dose_per_second": 0.2, "duration": 5}]
        }"#).unwrap();
        Simulator::new(config).unwrap().simulate().unwrap()
    }

    #[test]
    fn test_save_results_writes_all_files() {
        let dir = std::env::temp_dir().join(format!("tci_output_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let result = simulated();

        save_results(&result, &dir).unwrap();
        generate_report(&result, &dir).unwrap();

        let mut reader = csv::Reader::from_path(dir.join("concentrations.csv")).unwrap();
        assert_eq!(reader.headers().unwrap(), vec!["TIME", "PLASMA", "EFFECT"]);
        assert_eq!(reader.records().count(), 601);

        let infusions = std::fs::read_to_string(dir.join("infusions.csv")).unwrap();
        assert!(infusions.lines().last().unwrap().ends_with(",user"));

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("summary.json")).unwrap()).unwrap();
        assert_eq!(summary["model"], "Minto");
        assert!(summary["max_effect"].as_f64().unwrap() > 3.9);
        assert!(summary["generated_at"].is_string());

        let report = std::fs::read_to_string(dir.join("simulation_report.md")).unwrap();
        assert!(report.contains("| 0 | Effect | 4 |"));
        for file in ["rates.csv", "dose_weight.csv"] {
            assert!(dir.join(file).exists());
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
