//! Design settings files.
//!
//! A design file holds a `design` section (with at least `name`) and one
//! section per flow under `flows`. JSON and YAML are both accepted; the
//! extension decides, anything but `.yaml`/`.yml` is read as JSON.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::domain::models::SettingsTree;
use crate::services::SearchRequest;

#[derive(Debug, Clone)]
pub struct DesignFile {
    path: PathBuf,
    tree: SettingsTree,
}

impl DesignFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read design file {}", path.display()))?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        let value: Value = if is_yaml {
            serde_yaml::from_str(text)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?
        } else {
            serde_json::from_str(text)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?
        };
        if !value.is_object() {
            bail!("Design file {} must contain a mapping", path.display());
        }

        let path = std::path::absolute(path)
            .with_context(|| format!("Failed to resolve {}", path.display()))?;
        Ok(Self {
            path,
            tree: SettingsTree::new(value),
        })
    }

    /// Directory that relative `file` references are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub const fn tree(&self) -> &SettingsTree {
        &self.tree
    }

    /// Apply a `key.path=value` override. The value is parsed as JSON when
    /// it can be (`250`, `true`, `["a"]`) and taken as a string otherwise.
    pub fn apply_override(&mut self, assignment: &str) -> Result<()> {
        let Some((path, raw)) = assignment.split_once('=') else {
            bail!("Invalid override '{assignment}': expected key.path=value");
        };
        let path = path.trim();
        if path.is_empty() || path.split('.').any(str::is_empty) {
            bail!("Invalid override '{assignment}': empty key");
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        self.tree.set_path(path, value);
        Ok(())
    }

    /// Set a key in one flow's section.
    pub fn set_flow_setting(&mut self, flow_name: &str, key: &str, value: Value) {
        let mut flows = self
            .tree
            .get_path("flows")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let section = flows
            .entry(flow_name.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if !section.is_object() {
            *section = Value::Object(serde_json::Map::new());
        }
        if let Some(map) = section.as_object_mut() {
            map.insert(key.to_string(), value);
        }
        self.tree.set_path("flows", Value::Object(flows));
    }

    /// Search request for `flow_name`. A missing flow section is passed on as
    /// `null` so the engine reports it.
    pub fn request(&self, flow_name: &str) -> SearchRequest {
        let design = self.tree.get_path("design").cloned().unwrap_or(Value::Null);
        let flow = self
            .tree
            .get_path("flows")
            .and_then(Value::as_object)
            .and_then(|flows| flows.get(flow_name))
            .cloned()
            .unwrap_or(Value::Null);
        SearchRequest::new(SettingsTree::new(design), flow_name, SettingsTree::new(flow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const YAML: &str = r"
design:
  name: aes
  rtl:
    top: aes_top
flows:
  vivado_synth:
    strategy: Default
";

    #[test]
    fn test_parse_yaml_and_build_request() {
        let file = DesignFile::parse(Path::new("/work/aes/design.yaml"), YAML).unwrap();
        assert_eq!(file.base_dir(), Path::new("/work/aes"));

        let request = file.request("vivado_synth");
        assert_eq!(request.design_name().unwrap(), "aes");
        assert_eq!(request.flow.get_str("strategy"), Some("Default"));

        let missing = file.request("quartus");
        assert!(missing.flow.as_value().is_null());
    }

    #[test]
    fn test_parse_json() {
        let text = r#"{"design": {"name": "sha"}, "flows": {"synthetic": {"true_fmax_mhz": 250}}}"#;
        let file = DesignFile::parse(Path::new("/work/sha.json"), text).unwrap();
        let request = file.request("synthetic");
        assert_eq!(request.flow.get_f64("true_fmax_mhz"), Some(250.0));
    }

    #[test]
    fn test_rejects_non_mapping() {
        assert!(DesignFile::parse(Path::new("/work/x.json"), "[1, 2]").is_err());
    }

    #[test]
    fn test_overrides() {
        let mut file = DesignFile::parse(Path::new("/work/aes/design.yaml"), YAML).unwrap();
        file.apply_override("flows.vivado_synth.strategy=Performance_Explore").unwrap();
        file.apply_override("design.rtl.clock_port=clk").unwrap();
        file.apply_override("flows.vivado_synth.nthreads=8").unwrap();

        let tree = file.tree();
        assert_eq!(
            tree.get_str("flows.vivado_synth.strategy"),
            Some("Performance_Explore")
        );
        assert_eq!(tree.get_str("design.rtl.clock_port"), Some("clk"));
        assert_eq!(tree.get_path("flows.vivado_synth.nthreads"), Some(&json!(8)));

        assert!(file.apply_override("no_equals_sign").is_err());
        assert!(file.apply_override("flows..x=1").is_err());
    }

    #[test]
    fn test_set_flow_setting_creates_section() {
        let mut file = DesignFile::parse(Path::new("/work/aes/design.yaml"), YAML).unwrap();
        file.set_flow_setting("synthetic", "fmax_low_freq", json!(50.0));
        file.set_flow_setting("vivado_synth", "timeout", json!(600));

        assert_eq!(
            file.tree().get_f64("flows.synthetic.fmax_low_freq"),
            Some(50.0)
        );
        assert_eq!(file.tree().get_u64("flows.vivado_synth.timeout"), Some(600));
        assert_eq!(
            file.tree().get_str("flows.vivado_synth.strategy"),
            Some("Default")
        );
    }
}
