use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::ImportError;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "../config.json";

fn default_port() -> u16 {
    22
}

/// Settings for one import run. Loaded once and never mutated.
#[derive(Clone, Deserialize)]
pub struct Config {
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Local file to upload.
    pub sources_file: String,
    /// Where the uploaded file lands on the remote node.
    pub temp_write_path: String,
    #[serde(default)]
    pub kerberos_flag: bool,
    #[serde(default)]
    pub keytab_headless: bool,
    #[serde(default)]
    pub keytab_location: Option<String>,
    pub atlas_home_location: String,
    pub atlas_username: String,
    pub atlas_password: String,
}

/// How the Kerberos ticket gets renewed before the import runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KerberosRenewal<'a> {
    /// Keytab already configured on the remote node, plain `kinit`.
    Headless,
    Keytab(&'a str),
}

impl Config {
    /// Parse and check a config document. A config that would skip the
    /// ticket renewal while Kerberos is on never gets past this point.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(text)?;
        config
            .kerberos_renewal()
            .map_err(<serde_json::Error as serde::de::Error>::custom)?;
        Ok(config)
    }

    /// `Ok(None)` only when Kerberos is off. Keytab mode without a keytab
    /// path is an error, never "no renewal".
    pub fn kerberos_renewal(&self) -> Result<Option<KerberosRenewal<'_>>, String> {
        if !self.kerberos_flag {
            return Ok(None);
        }
        if self.keytab_headless {
            return Ok(Some(KerberosRenewal::Headless));
        }
        match self.keytab_location.as_deref() {
            Some(path) => Ok(Some(KerberosRenewal::Keytab(path))),
            None => Err(
                "kerberos_flag is set without keytab_headless, so keytab_location is required"
                    .into(),
            ),
        }
    }
}

// Passwords stay out of debug output.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sources_file", &self.sources_file)
            .field("temp_write_path", &self.temp_write_path)
            .field("kerberos_flag", &self.kerberos_flag)
            .field("keytab_headless", &self.keytab_headless)
            .field("keytab_location", &self.keytab_location)
            .field("atlas_home_location", &self.atlas_home_location)
            .field("atlas_username", &self.atlas_username)
            .field("atlas_password", &"<redacted>")
            .finish()
    }
}

/// Read and parse the config file at `path`.
pub fn load_config(path: &Path) -> Result<Config, ImportError> {
    let config_error = |reason: String| ImportError::Config {
        path: path.display().to_string(),
        reason,
    };
    let text = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
    Config::from_json(&text).map_err(|e| config_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"{
        "hostname": "atlas-node.example.com",
        "port": 2222,
        "username": "svc_import",
        "password": "ssh-secret",
        "sources_file": "./sources.csv",
        "temp_write_path": "/tmp/sources.csv",
        "kerberos_flag": true,
        "keytab_headless": false,
        "keytab_location": "/etc/security/keytabs/svc.keytab",
        "atlas_home_location": "/usr/hdp/current/atlas-server/",
        "atlas_username": "admin",
        "atlas_password": "atlas-secret"
    }"#;

    #[test]
    fn parses_every_field() {
        let config = Config::from_json(FULL).unwrap();
        assert_eq!(config.hostname, "atlas-node.example.com");
        assert_eq!(config.port, 2222);
        assert_eq!(config.temp_write_path, "/tmp/sources.csv");
        assert_eq!(
            config.kerberos_renewal(),
            Ok(Some(KerberosRenewal::Keytab("/etc/security/keytabs/svc.keytab")))
        );
    }

    #[test]
    fn optional_fields_fall_back() {
        let config = Config::from_json(
            r#"{
                "hostname": "h", "username": "u", "password": "p",
                "sources_file": "s", "temp_write_path": "t",
                "atlas_home_location": "/opt/atlas",
                "atlas_username": "a", "atlas_password": "b"
            }"#,
        )
        .unwrap();
        assert_eq!(config.port, 22);
        assert!(!config.kerberos_flag);
        assert!(config.keytab_location.is_none());
        assert_eq!(config.kerberos_renewal(), Ok(None));
    }

    #[test]
    fn headless_wins_over_keytab_location() {
        let mut config = Config::from_json(FULL).unwrap();
        config.keytab_headless = true;
        assert_eq!(config.kerberos_renewal(), Ok(Some(KerberosRenewal::Headless)));
    }

    #[test]
    fn parsing_rejects_keytab_mode_without_location() {
        let text = FULL.replace(
            r#""keytab_location": "/etc/security/keytabs/svc.keytab","#,
            "",
        );
        let err = Config::from_json(&text).unwrap_err();
        assert!(err.to_string().contains("keytab_location"));
    }

    #[test]
    fn missing_keytab_is_never_read_as_kerberos_off() {
        let mut config = Config::from_json(FULL).unwrap();
        config.keytab_location = None;
        assert!(config.kerberos_renewal().is_err());
    }

    #[test]
    fn debug_hides_passwords() {
        let config = Config::from_json(FULL).unwrap();
        let shown = format!("{config:?}");
        assert!(!shown.contains("ssh-secret"));
        assert!(!shown.contains("atlas-secret"));
        assert!(shown.contains("svc_import"));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ImportError::Config { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn load_malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ \"hostname\": ").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ImportError::Config { .. }));
    }

    #[test]
    fn load_rejects_missing_required_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "hostname": "h", "username": "u" }"#).unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn load_rejects_keytab_mode_without_location() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let text = FULL.replace(
            r#""keytab_location": "/etc/security/keytabs/svc.keytab","#,
            "",
        );
        file.write_all(text.as_bytes()).unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("keytab_location"));
    }

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.atlas_username, "admin");
    }
}
