use export::ExportMethod;
use import::ColumnBinding;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = "pgcsv.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ExportConfig {
    pub table: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub method: Option<ExportMethod>,
    pub delimiter: Option<char>,
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ImportConfig {
    pub table: Option<String>,
    pub stamp: Option<bool>,
    pub create_table: Option<bool>,
    pub bind: Option<ColumnBinding>,
    pub delimiter: Option<char>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub export: Option<ExportConfig>,
    pub import: Option<ImportConfig>,
}

/// An explicit path must load; the implicit `./pgcsv.yaml` is optional.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(Config::default()); }
        }
    };
    let s = fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {}", path.display(), e))?;
    Ok(serde_yaml::from_str(&s)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_sections() {
        let cfg: Config = serde_yaml::from_str(
            r#"
export:
  table: superstore
  out_dir: Data/processed
  method: frame
  delimiter: ";"
  chunk_size: 500
import:
  table: superstore_data
  stamp: true
  create_table: true
  bind: header
"#,
        )
        .unwrap();
        let e = cfg.export.unwrap();
        assert_eq!(e.table.as_deref(), Some("superstore"));
        assert_eq!(e.method, Some(ExportMethod::Frame));
        assert_eq!(e.delimiter, Some(';'));
        assert_eq!(e.chunk_size, Some(500));
        let i = cfg.import.unwrap();
        assert_eq!(i.stamp, Some(true));
        assert_eq!(i.bind, Some(ColumnBinding::Header));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.yaml"))).is_err());
    }

    #[test]
    fn empty_sections_are_allowed() {
        let cfg: Config = serde_yaml::from_str("export: {}\n").unwrap();
        assert!(cfg.export.unwrap().table.is_none());
        assert!(cfg.import.is_none());
    }
}
