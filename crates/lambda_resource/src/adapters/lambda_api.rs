use lambda_resource_core::contract::Source;
use lambda_resource_core::error::ResourceError;
use lambda_resource_core::versions::PublishedVersion;
use serde::{Deserialize, Serialize};

/// The slice of the function-management API the resource needs.
pub trait LambdaApi {
    fn list_versions(
        &self,
        function_name: &str,
        marker: Option<&str>,
    ) -> Result<VersionPage, String>;

    fn get_configuration(
        &self,
        function_name: &str,
        qualifier: &str,
    ) -> Result<FunctionConfiguration, String>;

    /// Uploads new code and publishes it as a new numbered version.
    fn update_code(
        &self,
        function_name: &str,
        zip_file: Vec<u8>,
    ) -> Result<FunctionConfiguration, String>;

    fn update_alias(
        &self,
        function_name: &str,
        alias: &str,
        function_version: &str,
    ) -> Result<AliasConfiguration, String>;

    /// Synchronously invokes `qualified_name` (`name` or `name:qualifier`).
    fn invoke(&self, qualified_name: &str, payload: Vec<u8>) -> Result<InvocationResult, String>;
}

/// Builds an API client for a decoded source.
pub trait Connect {
    fn connect(&self, source: &Source) -> Result<Box<dyn LambdaApi>, ResourceError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionConfiguration {
    pub function_name: Option<String>,
    pub function_arn: Option<String>,
    pub runtime: Option<String>,
    pub role: Option<String>,
    pub handler: Option<String>,
    pub description: Option<String>,
    pub timeout: Option<i32>,
    pub memory_size: Option<i32>,
    pub last_modified: Option<String>,
    pub code_sha256: Option<String>,
    pub version: Option<String>,
    pub revision_id: Option<String>,
}

impl FunctionConfiguration {
    pub fn published_version(&self) -> PublishedVersion {
        PublishedVersion {
            version: self.version.clone().unwrap_or_default(),
            code_sha256: self.code_sha256.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AliasConfiguration {
    pub alias_arn: Option<String>,
    pub name: Option<String>,
    pub function_version: Option<String>,
    pub description: Option<String>,
    pub revision_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionPage {
    pub versions: Vec<FunctionConfiguration>,
    /// Present while more pages remain.
    pub next_marker: Option<String>,
}

/// Outcome of a synchronous invoke.
///
/// Serializes to `result.json` without the payload; the payload bytes are
/// written verbatim to `result.payload.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct InvocationResult {
    pub status_code: i32,
    /// `Handled` or `Unhandled` when the function itself failed.
    pub function_error: Option<String>,
    pub executed_version: Option<String>,
    pub log_result: Option<String>,
    /// Written separately as `result.payload.json`.
    #[serde(skip)]
    pub payload: Vec<u8>,
}
