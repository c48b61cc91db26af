//! Layered settings: built-in defaults, then an optional TOML file, then
//! command-line overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::mock::DEFAULT_MOCK_RECORD_COUNT;
use crate::normalize::SchemaMapping;
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::prelude::*;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// The listing asks for one large page; pagination happens locally.
pub const DEFAULT_REQUEST_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
    pub organizations: String,
    pub monitoring_details: String,
    pub export: String,
    pub import: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        EndpointPaths {
            organizations: "/org/getOrgList".to_string(),
            monitoring_details: "/vehicle/getVehMonitoringDetailsList".to_string(),
            export: "/vehicle/exportVehMonitoringDetailsList".to_string(),
            import: "/vehicle/importVehAlertRecords".to_string(),
        }
    }
}

/// Contents of `fleetwatch.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub session_token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub page_size: Option<usize>,
    pub request_page_size: Option<usize>,
    pub mock_record_count: Option<usize>,
    pub endpoints: EndpointPaths,
    pub schema: Option<SchemaMapping>,
}

impl FileConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub session_token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub session_token: Option<String>,
    pub timeout_secs: u64,
    pub page_size: usize,
    pub request_page_size: usize,
    pub mock_record_count: usize,
    pub endpoints: EndpointPaths,
    pub schema: SchemaMapping,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::resolve(FileConfig::default(), Overrides::default())
    }
}

impl Settings {
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Self {
        let schema = file.schema.unwrap_or_default();
        let unknown = schema.unknown_fields();
        if !unknown.is_empty() {
            warn!("Schema mapping names unknown fields, they are ignored: {unknown:?}");
        }
        Settings {
            base_url: overrides
                .base_url
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            session_token: overrides.session_token.or(file.session_token),
            timeout_secs: overrides
                .timeout_secs
                .or(file.timeout_secs)
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            page_size: overrides
                .page_size
                .or(file.page_size)
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            request_page_size: file
                .request_page_size
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_REQUEST_PAGE_SIZE),
            mock_record_count: file
                .mock_record_count
                .unwrap_or(DEFAULT_MOCK_RECORD_COUNT),
            endpoints: file.endpoints,
            schema,
        }
    }
}

/// Finds the config file: the explicit path if given, otherwise the first
/// well-known location that exists.
pub fn locate_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let cwd = std::env::current_dir().ok()?;
    let candidates = [
        cwd.join("config/fleetwatch.toml"),
        cwd.join("fleetwatch-cli/config/fleetwatch.toml"),
    ];
    candidates.into_iter().find(|path| path.exists())
}

/// An explicitly requested file must exist and parse; a discovered one that
/// fails is logged and skipped.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let Some(path) = locate_config_path(explicit) else {
        return Ok(FileConfig::default());
    };
    match FileConfig::read(&path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Err(err) if explicit.is_none() => {
            warn!(
                "Failed to load configuration at {}, using defaults: {err}",
                path.display()
            );
            Ok(FileConfig::default())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_file() {
        let settings = Settings::default();
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.request_page_size, DEFAULT_REQUEST_PAGE_SIZE);
        assert_eq!(settings.mock_record_count, DEFAULT_MOCK_RECORD_COUNT);
        assert_eq!(settings.endpoints, EndpointPaths::default());
        assert_eq!(settings.schema, SchemaMapping::default());
    }

    #[test]
    fn file_values_are_overridden_by_flags() {
        let file = FileConfig::from_toml_str(
            r#"
            base_url = "http://fleet.example"
            session_token = "abc"
            page_size = 50
            mock_record_count = 10

            [endpoints]
            organizations = "/organization/getOrganizationList"
            "#,
        )
        .unwrap();
        let settings = Settings::resolve(
            file,
            Overrides {
                base_url: Some("http://override.example".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(settings.base_url, "http://override.example");
        assert_eq!(settings.session_token.as_deref(), Some("abc"));
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.mock_record_count, 10);
        assert_eq!(
            settings.endpoints.organizations,
            "/organization/getOrganizationList"
        );
        assert_eq!(
            settings.endpoints.monitoring_details,
            EndpointPaths::default().monitoring_details
        );
    }

    #[test]
    fn schema_table_can_be_replaced_from_toml() {
        let file = FileConfig::from_toml_str(
            r#"
            [schema]
            version = 3
            list_fields = ["rows"]
            organization_list_fields = ["fleets"]
            organization_id_fields = ["fleetId"]
            organization_name_fields = ["fleetName"]

            [schema.fields]
            vehicleNumber = ["plate"]
            recordContent = ["alarm"]
            "#,
        )
        .unwrap();
        let settings = Settings::resolve(file, Overrides::default());
        assert_eq!(settings.schema.version, 3);
        assert_eq!(settings.schema.list_fields, vec!["rows".to_string()]);
        assert!(settings.schema.total_count_fields.is_empty());
    }

    #[test]
    fn zero_page_size_falls_back_to_default() {
        let file = FileConfig::from_toml_str("page_size = 0").unwrap();
        assert_eq!(
            Settings::resolve(file, Overrides::default()).page_size,
            DEFAULT_PAGE_SIZE
        );
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let file = FileConfig::from_toml_str("timeout_secs = 0").unwrap();
        assert_eq!(
            Settings::resolve(file, Overrides::default()).timeout_secs,
            DEFAULT_TIMEOUT_SECS
        );
        let overrides = Overrides {
            timeout_secs: Some(0),
            ..Overrides::default()
        };
        assert_eq!(
            Settings::resolve(FileConfig::default(), overrides).timeout_secs,
            DEFAULT_TIMEOUT_SECS
        );
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_file_config(Some(&missing)).is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleetwatch.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "timeout_secs = 5").unwrap();
        let config = load_file_config(Some(&path)).unwrap();
        assert_eq!(config.timeout_secs, Some(5));
    }
}
