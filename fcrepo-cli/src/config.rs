//! The `.fccli` dot-file.
use std::path::{Path, PathBuf};

use fcrepo::{path::RemotePath, turtle::PrefixMap};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{errors::CliError, CliResult};

pub const DOT_FILE: &str = ".fccli";

/// Everything persisted between runs. Unknown keys are kept as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_prefix: Option<PrefixMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<RemotePath>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Config {
    /// The configured prefixes, or the defaults if none were ever saved.
    pub fn prefixes(&self) -> PrefixMap {
        self.global_prefix
            .clone()
            .unwrap_or_else(PrefixMap::default_global)
    }

    /// Set a plain string attribute by its file name.
    pub fn set(&mut self, attribute: &str, value: &str) -> CliResult<()> {
        let slot = match attribute {
            "host" => &mut self.host,
            "basePath" | "base_path" => &mut self.base_path,
            "username" => &mut self.username,
            "password" => &mut self.password,
            "jwt" => &mut self.jwt,
            _ => return Err(CliError::UnknownAttribute(attribute.to_owned())),
        };

        *slot = (!value.is_empty()).then(|| match attribute {
            "host" | "basePath" | "base_path" => value.trim_end_matches('/').to_owned(),
            _ => value.to_owned(),
        });

        Ok(())
    }

    pub fn logout(&mut self) {
        self.jwt = None;
        self.username = None;
        self.password = None;
    }
}

/// A [`Config`] bound to the file it was read from.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    pub data: Config,
}

impl ConfigFile {
    /// Find and read the config file. An explicit path wins, then `./.fccli`,
    /// then `~/.fccli`, which is created if missing.
    pub fn locate(explicit: Option<&Path>) -> CliResult<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let local = std::env::current_dir()?.join(DOT_FILE);

                if local.is_file() {
                    local
                } else {
                    let home = dirs::home_dir().ok_or(CliError::NoHomeDir)?.join(DOT_FILE);

                    if !home.exists() {
                        std::fs::write(&home, "{}")?;
                    }

                    home
                }
            }
        };

        Self::read(path)
    }

    pub fn read(path: PathBuf) -> CliResult<Self> {
        let raw = std::fs::read(&path).map_err(|source| CliError::ConfigRead {
            path: path.clone(),
            source,
        })?;
        let data = serde_json::from_slice(&raw).map_err(|source| CliError::ConfigCorrupt {
            path: path.clone(),
            source,
        })?;

        debug!(?path, "loaded config");

        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> CliResult<()> {
        let json = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.path, json)?;
        debug!(path = ?self.path, "saved config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_unknown_keys_and_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DOT_FILE);
        std::fs::write(
            &path,
            r#"{"host":"http://h","basePath":"/rest","autoSlug":false,"globalPrefix":{"ex":"http://e/"}}"#,
        )
        .unwrap();

        let mut file = ConfigFile::read(path.clone()).unwrap();
        assert_eq!(file.data.base_path.as_deref(), Some("/rest"));
        assert_eq!(file.data.prefixes().get("ex"), Some("http://e/"));

        file.data.set("basePath", "/fcrepo/rest/").unwrap();
        file.data.cwd = Some(RemotePath::normalize("/a"));
        file.save().unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved["basePath"], "/fcrepo/rest");
        assert_eq!(saved["autoSlug"], false);
        assert_eq!(saved["cwd"], "/a");
    }

    #[test]
    fn corrupt_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DOT_FILE);
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            ConfigFile::read(path),
            Err(CliError::ConfigCorrupt { .. })
        ));
    }

    #[test]
    fn unknown_attributes_are_refused() {
        let mut config = Config::default();

        assert!(config.set("colour", "red").is_err());

        config.set("username", "alice").unwrap();
        config.set("jwt", "t").unwrap();
        config.logout();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn defaults_to_global_prefixes() {
        assert_eq!(Config::default().prefixes(), PrefixMap::default_global());
    }
}
