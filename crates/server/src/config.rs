//! Server settings read from `DEEPCHECK_*` environment variables.

use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_BIND: &str = "0.0.0.0:5000";
const DEFAULT_DATABASE_URL: &str = "sqlite://users.db?mode=rwc";
const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_UPLOAD_DIR: &str = "uploads";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be set")]
    Missing { name: &'static str },
    #[error("{name} has invalid value {value:?}: expected true or false")]
    InvalidBool { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_url: String,
    /// Holds reducer.json, classifier.json and the ONNX face models.
    pub models_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub pipeline_config: Option<PathBuf>,
    pub detection_model_url: Option<String>,
    pub mesh_model_url: Option<String>,
    pub jwt_secret: Vec<u8>,
    pub require_auth: bool,
    /// Adds `Secure` to the session cookie.
    pub secure_cookies: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("DEEPCHECK_SECRET")
            .ok_or(ConfigError::Missing {
                name: "DEEPCHECK_SECRET",
            })?
            .into_bytes();

        Ok(Self {
            bind_addr: get("DEEPCHECK_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            database_url: get("DEEPCHECK_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            models_dir: get("DEEPCHECK_MODELS")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR)),
            upload_dir: get("DEEPCHECK_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            pipeline_config: get("DEEPCHECK_PIPELINE_CONFIG").map(PathBuf::from),
            detection_model_url: get("DEEPCHECK_DETECTION_MODEL_URL"),
            mesh_model_url: get("DEEPCHECK_MESH_MODEL_URL"),
            jwt_secret,
            require_auth: parse_bool("DEEPCHECK_REQUIRE_AUTH", get("DEEPCHECK_REQUIRE_AUTH"), true)?,
            secure_cookies: parse_bool(
                "DEEPCHECK_SECURE_COOKIES",
                get("DEEPCHECK_SECURE_COOKIES"),
                false,
            )?,
        })
    }
}

fn parse_bool(
    name: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DEEPCHECK_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.models_dir, PathBuf::from("models"));
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.jwt_secret, b"s3cret");
        assert!(config.require_auth);
        assert!(!config.secure_cookies);
        assert!(config.pipeline_config.is_none());
    }

    #[test]
    fn test_missing_secret() {
        let err = config_from(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: "DEEPCHECK_SECRET" }));
    }

    #[test]
    fn test_blank_secret_counts_as_missing() {
        assert!(config_from(&[("DEEPCHECK_SECRET", "  ")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DEEPCHECK_SECRET", "x"),
            ("DEEPCHECK_BIND", "127.0.0.1:8080"),
            ("DEEPCHECK_MODELS", "/srv/models"),
            ("DEEPCHECK_PIPELINE_CONFIG", "/etc/deepcheck.json"),
            ("DEEPCHECK_MESH_MODEL_URL", "https://example.org/mesh.onnx"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.models_dir, PathBuf::from("/srv/models"));
        assert_eq!(
            config.pipeline_config,
            Some(PathBuf::from("/etc/deepcheck.json"))
        );
        assert_eq!(
            config.mesh_model_url.as_deref(),
            Some("https://example.org/mesh.onnx")
        );
        assert!(config.detection_model_url.is_none());
    }

    #[rstest]
    #[case("false", false)]
    #[case("0", false)]
    #[case("OFF", false)]
    #[case("true", true)]
    #[case("yes", true)]
    fn test_require_auth_values(#[case] value: &str, #[case] expected: bool) {
        let config = config_from(&[
            ("DEEPCHECK_SECRET", "x"),
            ("DEEPCHECK_REQUIRE_AUTH", value),
        ])
        .unwrap();
        assert_eq!(config.require_auth, expected);
    }

    #[test]
    fn test_invalid_bool() {
        let err = config_from(&[
            ("DEEPCHECK_SECRET", "x"),
            ("DEEPCHECK_REQUIRE_AUTH", "maybe"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("DEEPCHECK_REQUIRE_AUTH"));
    }
}
