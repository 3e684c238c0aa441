use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub drift_m: f64,
    pub height_m: f64,
    #[serde(default = "default_nominal_altitude")]
    pub nominal_altitude_m: f64,
    #[serde(default = "default_low_altitude")]
    pub low_altitude_m: f64,
}

fn default_nominal_altitude() -> f64 {
    80.0
}

fn default_low_altitude() -> f64 {
    78.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub sortie_gap_s: f64,
    pub miss_click_min_gap_s: f64,
    pub frame_rate: f64,
    pub frame_drop_tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub plot_sample_interval_s: u32,
    #[serde(default = "default_enabled")]
    pub write_plot: bool,
    #[serde(default = "default_enabled")]
    pub write_manifest: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub thresholds: ThresholdConfig,
    pub timing: TimingConfig,
    pub report: ReportConfig,
}

impl AppConfig {
    pub fn load_default() -> anyhow::Result<Self> {
        let default = include_str!("../config/default.toml");
        let cfg: AppConfig = toml::from_str(default)?;
        Ok(cfg)
    }

    pub fn load_from(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let p = path.into();
        let s = fs::read_to_string(&p)?;
        let cfg: AppConfig = toml::from_str(&s)?;
        Ok(cfg)
    }

    /// Apply the `--drift` / `--height` command line overrides
    pub fn with_overrides(mut self, drift_m: Option<f64>, height_m: Option<f64>) -> Self {
        if let Some(drift) = drift_m {
            self.thresholds.drift_m = drift;
        }
        if let Some(height) = height_m {
            self.thresholds.height_m = height;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_values() {
        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(cfg.thresholds.drift_m, 5.0);
        assert_eq!(cfg.thresholds.height_m, 7.0);
        assert_eq!(cfg.thresholds.nominal_altitude_m, 80.0);
        assert_eq!(cfg.timing.sortie_gap_s, 600.0);
        assert_eq!(cfg.timing.frame_rate, 30.0);
        assert_eq!(cfg.report.plot_sample_interval_s, 2);
    }

    #[test]
    fn test_overrides_replace_thresholds() {
        let cfg = AppConfig::load_default()
            .unwrap()
            .with_overrides(Some(2.5), None);
        assert_eq!(cfg.thresholds.drift_m, 2.5);
        assert_eq!(cfg.thresholds.height_m, 7.0);
    }

    #[test]
    fn test_load_from_file_uses_serde_defaults() -> anyhow::Result<()> {
        let tmpdir = TempDir::new()?;
        let path = tmpdir.path().join("custom.toml");
        fs::write(
            &path,
            r#"
[thresholds]
drift_m = 3.0
height_m = 4.0

[timing]
sortie_gap_s = 300.0
miss_click_min_gap_s = 2.0
frame_rate = 25.0
frame_drop_tolerance = 10.0

[report]
plot_sample_interval_s = 5
"#,
        )?;

        let cfg = AppConfig::load_from(&path)?;
        assert_eq!(cfg.thresholds.drift_m, 3.0);
        assert_eq!(cfg.thresholds.low_altitude_m, 78.0);
        assert_eq!(cfg.timing.frame_rate, 25.0);
        assert!(cfg.report.write_plot);
        Ok(())
    }
}
