use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::sim::{DistributionSpec, Distributions, RunConfig, StopCondition};

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct SimConfig {
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub max_events: Option<u64>,
    #[serde(default)]
    pub max_time: Option<f64>,
    #[serde(default)]
    pub record_trajectory: bool,
    /// 各迁移的发生时间分布
    #[serde(default)]
    pub distributions: IndexMap<String, DistributionSpec>,
}

impl SimConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("no config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            seed: self.seed,
            stop: StopCondition {
                max_events: self.max_events,
                max_time: self.max_time,
            },
            record_trajectory: self.record_trajectory,
        }
    }

    pub fn build_distributions(&self) -> Result<Distributions> {
        self.distributions
            .iter()
            .map(|(name, spec)| {
                spec.build()
                    .map(|distribution| (name.clone(), distribution))
                    .map_err(|reason| anyhow!("distribution `{}`: {}", name, reason))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SIR: &str = r#"
seed = 42
max_events = 1000
record_trajectory = true

[distributions.infect]
kind = "exponential"
rate = 0.3

[distributions.recover]
kind = "fixed"
delay = 2.0
"#;

    #[test]
    fn parses_run_bounds_and_distributions() {
        let config = SimConfig::from_toml_str(SIR).unwrap();
        let run = config.run_config();
        assert_eq!(run.seed, 42);
        assert_eq!(run.stop.max_events, Some(1000));
        assert_eq!(run.stop.max_time, None);
        assert!(run.record_trajectory);

        let distributions = config.build_distributions().unwrap();
        assert_eq!(
            distributions.keys().collect::<Vec<_>>(),
            vec!["infect", "recover"]
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn loads_from_disk_and_reports_bad_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SIR.as_bytes()).unwrap();
        let config = SimConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.seed, 42);

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        broken.write_all(b"seed = \"not a number\"").unwrap();
        let err = SimConfig::load_from_file(broken.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn invalid_parameters_name_the_transition() {
        let config = SimConfig::from_toml_str(
            "[distributions.decay]\nkind = \"weibull\"\nshape = -1.0\nscale = 1.0\n",
        )
        .unwrap();
        let err = config.build_distributions().unwrap_err();
        assert!(err.to_string().contains("decay"));
    }
}
