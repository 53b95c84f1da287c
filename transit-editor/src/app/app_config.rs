use std::path::Path;

use clap::Args;
use config::{Config, ConfigError, File};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use transit_editor_core::store::StoreConfig;
use transit_editor_gtfs::{ExportConfig, ImportConfig};

use super::EditorAppError;

/// store location arguments shared by every subcommand.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
pub struct StoreArgs {
    /// TOML file with optional [store], [import] and [export] sections
    #[arg(short, long)]
    pub config_file: Option<String>,

    /// directory holding the persisted feeds. overrides store.data_directory
    /// from the configuration file.
    #[arg(short, long)]
    pub data_directory: Option<String>,
}

impl StoreArgs {
    pub fn load(&self) -> Result<AppConfig, EditorAppError> {
        AppConfig::load(self.config_file.as_deref(), self.data_directory.as_deref())
    }
}

/// configuration of the command line tool. every section may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub import: ImportConfig,
    pub export: ExportConfig,
}

impl AppConfig {
    /// reads the configuration file, if any, and applies command line overrides.
    pub fn load(
        config_file: Option<&str>,
        data_directory: Option<&str>,
    ) -> Result<AppConfig, EditorAppError> {
        let mut app_config = match config_file {
            Some(file) => AppConfig::from_file(file)?,
            None => AppConfig::default(),
        };
        if let Some(directory) = data_directory {
            app_config.store.data_directory = Some(directory.to_string());
        }
        if app_config.store.data_directory.is_none() {
            log::warn!("no data directory configured, changes will not outlive this process");
        }
        Ok(app_config)
    }

    fn from_file(configuration_file: &str) -> Result<AppConfig, EditorAppError> {
        let filepath = Path::new(configuration_file);
        let config = Config::builder()
            .add_source(File::from(filepath))
            .build()
            .map_err(|e| {
                let msg = format!("file '{configuration_file}' produced error: {e}");
                EditorAppError::InvalidUserInput(msg)
            })?;
        Ok(AppConfig {
            store: get_section(&config, "store", configuration_file)?,
            import: get_section(&config, "import", configuration_file)?,
            export: get_section(&config, "export", configuration_file)?,
        })
    }
}

/// reads a section of the configuration, falling back to defaults when it is absent.
fn get_section<T: DeserializeOwned + Default>(
    config: &Config,
    key: &str,
    configuration_file: &str,
) -> Result<T, EditorAppError> {
    match config.get::<T>(key) {
        Ok(section) => Ok(section),
        Err(ConfigError::NotFound(_)) => Ok(T::default()),
        Err(e) => {
            let msg = format!("error reading '{key}' key in '{configuration_file}': {e}");
            Err(EditorAppError::InvalidUserInput(msg))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use transit_editor_core::model::StatusType;

    fn write_config(name: &str, contents: &str) -> String {
        let directory = std::env::temp_dir().join(format!(
            "transit-editor-config-{}-{name}",
            std::process::id()
        ));
        std::fs::create_dir_all(&directory).unwrap();
        let path = directory.join("editor.toml");
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_load_sections() {
        let path = write_config(
            "sections",
            r#"
[store]
data_directory = "/var/lib/editor"
pretty_print = true

[import]
route_status = "APPROVED"
snapshot_name = "initial"

[export]
ignore_route_status = true
"#,
        );
        let config = AppConfig::load(Some(&path), None).unwrap();
        assert_eq!(config.store.data_directory.as_deref(), Some("/var/lib/editor"));
        assert!(config.store.pretty_print());
        assert_eq!(config.import.route_status, Some(StatusType::Approved));
        assert_eq!(config.import.snapshot_name.as_deref(), Some("initial"));
        assert_eq!(config.export.ignore_route_status, Some(true));
    }

    #[test]
    fn test_missing_sections_and_override() {
        let path = write_config(
            "partial",
            r#"
[store]
data_directory = "/var/lib/editor"
"#,
        );
        let config = AppConfig::load(Some(&path), Some("/tmp/elsewhere")).unwrap();
        assert_eq!(config.store.data_directory.as_deref(), Some("/tmp/elsewhere"));
        assert!(config.import.route_status.is_none());
        assert!(config.export.ignore_route_status.is_none());
    }

    #[test]
    fn test_missing_file_is_invalid_input() {
        let result = AppConfig::load(Some("/nonexistent/editor.toml"), None);
        assert!(matches!(result, Err(EditorAppError::InvalidUserInput(_))));
    }
}
