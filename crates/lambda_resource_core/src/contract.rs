use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const VERSION_KEY: &str = "version";
pub const ALIAS_KEY: &str = "alias";
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Arbitrary version info that identifies a resource version. The pipeline
/// stores these and hands them back on the next `check`.
pub type ResourceVersion = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseVersion {
    Single(ResourceVersion),
    /// Ordered oldest first; the last entry is the current version.
    Sequence(Vec<ResourceVersion>),
}

/// What a command handler hands back to the context for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub version: ResponseVersion,
    pub metadata: Vec<MetadataField>,
}

impl CommandResponse {
    pub fn single(version: ResourceVersion) -> Self {
        Self {
            version: ResponseVersion::Single(version),
            metadata: Vec::new(),
        }
    }

    pub fn versions(versions: Vec<ResourceVersion>) -> Self {
        Self {
            version: ResponseVersion::Sequence(versions),
            metadata: Vec::new(),
        }
    }

    pub fn add_meta(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.metadata.push(MetadataField {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn version(&self) -> Option<&ResourceVersion> {
        match &self.version {
            ResponseVersion::Single(version) => Some(version),
            ResponseVersion::Sequence(_) => None,
        }
    }

    pub fn version_mut(&mut self) -> Option<&mut ResourceVersion> {
        match &mut self.version {
            ResponseVersion::Single(version) => Some(version),
            ResponseVersion::Sequence(_) => None,
        }
    }

    pub fn version_list(&self) -> &[ResourceVersion] {
        match &self.version {
            ResponseVersion::Single(version) => std::slice::from_ref(version),
            ResponseVersion::Sequence(versions) => versions,
        }
    }

    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

pub fn version_record(version: u64, alias: Option<&str>) -> ResourceVersion {
    let mut record = ResourceVersion::new();
    record.insert(VERSION_KEY.to_string(), version.to_string());
    if let Some(alias) = alias {
        record.insert(ALIAS_KEY.to_string(), alias.to_string());
    }
    record
}

pub fn timestamp_version(unix_seconds: i64) -> ResourceVersion {
    ResourceVersion::from([(TIMESTAMP_KEY.to_string(), unix_seconds.to_string())])
}

/// Function-management source definition shared by every command.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    pub region_name: String,
    pub function_name: String,
    /// Tracks a specific alias on check, and is the default qualifier on get.
    #[serde(default)]
    pub alias: Option<String>,
    /// Overrides the API endpoint, e.g. for a local emulator.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl Source {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("access_key_id", &self.access_key_id),
            ("secret_access_key", &self.secret_access_key),
            ("region_name", &self.region_name),
            ("function_name", &self.function_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::new(format!(
                    "source.{field} is required"
                )));
            }
        }

        if matches!(self.alias.as_deref(), Some(alias) if alias.trim().is_empty()) {
            return Err(ValidationError::new("source.alias cannot be empty"));
        }

        Ok(())
    }

    pub fn qualified_name(&self, qualifier: Option<&str>) -> String {
        match qualifier {
            Some(qualifier) => format!("{}:{qualifier}", self.function_name),
            None => self.function_name.clone(),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("region_name", &self.region_name)
            .field("function_name", &self.function_name)
            .field("alias", &self.alias)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayloadSource {
    /// Inline JSON from params, sent verbatim.
    Inline(Value),
    File(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "RawInParams")]
pub struct InParams {
    pub payload: Option<PayloadSource>,
    pub alias: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawInParams {
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    payload_file: Option<PathBuf>,
    #[serde(default)]
    alias: Option<String>,
}

impl TryFrom<RawInParams> for InParams {
    type Error = ValidationError;

    fn try_from(raw: RawInParams) -> Result<Self, Self::Error> {
        let payload = match (raw.payload, raw.payload_file) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::new(
                    "params.payload and params.payload_file are mutually exclusive",
                ));
            }
            (Some(value), None) => Some(PayloadSource::Inline(value)),
            (None, Some(path)) => Some(PayloadSource::File(path)),
            (None, None) => None,
        };

        Ok(Self {
            payload,
            alias: non_empty(raw.alias),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeSource {
    /// A ready-made deployment archive, uploaded as-is.
    ZipFile(PathBuf),
    /// A directory packed recursively.
    Directory(PathBuf),
    /// A single file packed under its base name.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    Literal(String),
    /// A file holding the version; trailing newlines are trimmed.
    File(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPutParams")]
pub struct PutParams {
    pub code: Option<CodeSource>,
    pub version: Option<VersionSource>,
    pub alias: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPutParams {
    #[serde(default)]
    zip_file: Option<PathBuf>,
    #[serde(default)]
    code_dir: Option<PathBuf>,
    #[serde(default)]
    code_file: Option<PathBuf>,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    version_file: Option<PathBuf>,
}

impl TryFrom<RawPutParams> for PutParams {
    type Error = ValidationError;

    fn try_from(raw: RawPutParams) -> Result<Self, Self::Error> {
        let mut code_sources = [
            raw.zip_file.map(CodeSource::ZipFile),
            raw.code_dir.map(CodeSource::Directory),
            raw.code_file.map(CodeSource::File),
        ]
        .into_iter()
        .flatten();
        let code = code_sources.next();
        if code_sources.next().is_some() {
            return Err(ValidationError::new(
                "only one of params.zip_file, params.code_dir and params.code_file may be set",
            ));
        }

        let version = match (raw.version, raw.version_file) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::new(
                    "params.version and params.version_file are mutually exclusive",
                ));
            }
            (Some(literal), None) => Some(VersionSource::Literal(literal)),
            (None, Some(path)) => Some(VersionSource::File(path)),
            (None, None) => None,
        };

        Ok(Self {
            code,
            version,
            alias: non_empty(raw.alias),
        })
    }
}

/// Treats an explicit `null` the same as a missing field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}
