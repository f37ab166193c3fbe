//! `out`: publish new code and/or move an alias.

use chrono::Utc;
use lambda_resource_core::context::WorkDir;
use lambda_resource_core::contract::{
    null_as_default, timestamp_version, version_record, CodeSource, CommandResponse, PutParams,
    ResourceVersion, Source, ValidationError, VersionSource, ALIAS_KEY, VERSION_KEY,
};
use lambda_resource_core::error::ResourceError;
use lambda_resource_core::versions::parse_version_number;
use serde::Deserialize;

use crate::adapters::lambda_api::{FunctionConfiguration, LambdaApi};
use crate::resource::LambdaCommand;

/// Configuration of the newly published version.
pub const FUNCTION_FILE: &str = "function.json";
/// The published version number as plain text.
pub const VERSION_FILE: &str = "version";
pub const ALIAS_FILE: &str = "alias.json";

#[derive(Debug, Default, Deserialize)]
pub struct OutCommand {
    pub source: Source,
    #[serde(default, deserialize_with = "null_as_default")]
    pub params: PutParams,
}

impl LambdaCommand for OutCommand {
    fn source(&self) -> &Source {
        &self.source
    }

    fn run(&self, work_dir: &WorkDir, api: &dyn LambdaApi) -> Result<CommandResponse, ResourceError> {
        let function_name = self.source.function_name.as_str();
        let explicit_version = resolve_version(self.params.version.as_ref(), work_dir)?;

        let (mut response, target_version) = match &self.params.code {
            Some(code) => {
                let (response, published) = publish_code(api, function_name, code, work_dir)?;
                (response, Some(published))
            }
            None => match explicit_version {
                Some(version) => (
                    CommandResponse::single(version_record(version, None)),
                    Some(version),
                ),
                None => (
                    CommandResponse::single(timestamp_version(Utc::now().timestamp())),
                    None,
                ),
            },
        };

        let Some(alias) = self.params.alias.as_deref() else {
            return Ok(response);
        };
        let Some(version) = target_version else {
            tracing::warn!(
                function = %function_name,
                alias,
                "no version to point the alias at; leaving it unchanged"
            );
            return Ok(response);
        };

        let version = version.to_string();
        let alias_configuration = match api.update_alias(function_name, alias, &version) {
            Ok(configuration) => configuration,
            Err(message) => {
                let error = ResourceError::api(
                    "set alias",
                    format!("{alias:?} for version {version}: {message}"),
                );
                return Err(ResourceError::partially_applied(response, error));
            }
        };
        tracing::info!(
            function = %function_name,
            alias,
            version = %version,
            alias_arn = ?alias_configuration.alias_arn,
            "tagged version with alias"
        );

        if let Some(record) = response.version_mut() {
            record.insert(ALIAS_KEY.to_string(), alias.to_string());
        }
        if let Some(alias_arn) = &alias_configuration.alias_arn {
            response.add_meta("alias_arn", alias_arn.as_str());
        }
        if let Err(error) = work_dir.json(ALIAS_FILE, &alias_configuration) {
            return Err(ResourceError::partially_applied(response, error));
        }

        Ok(response)
    }
}

/// Reads and validates the explicit version, if any, before anything
/// remote is touched.
fn resolve_version(
    source: Option<&VersionSource>,
    work_dir: &WorkDir,
) -> Result<Option<u64>, ResourceError> {
    let raw = match source {
        None => return Ok(None),
        Some(VersionSource::Literal(version)) => version.clone(),
        Some(VersionSource::File(path)) => {
            let data = work_dir.read(path)?;
            String::from_utf8_lossy(&data)
                .trim_end_matches(['\n', '\r'])
                .to_string()
        }
    };
    Ok(Some(parse_version_number(&raw)?))
}

fn publish_code(
    api: &dyn LambdaApi,
    function_name: &str,
    code: &CodeSource,
    work_dir: &WorkDir,
) -> Result<(CommandResponse, u64), ResourceError> {
    let archive = code.load(work_dir)?;
    let configuration = api
        .update_code(function_name, archive)
        .map_err(|message| ResourceError::api("update function code", message))?;

    // The code is live from here on, so later failures are partial.
    let mut response = CommandResponse::single(ResourceVersion::new());
    add_configuration_metadata(&mut response, &configuration);

    let raw = configuration.version.as_deref().unwrap_or_default();
    let number = match parse_version_number(raw) {
        Ok(number) => number,
        Err(error) => {
            let error = ValidationError::new(format!(
                "could not parse published function version: {error}"
            ));
            return Err(ResourceError::partially_applied(response, error.into()));
        }
    };
    tracing::info!(
        function = %function_name,
        version = number,
        code_sha256 = ?configuration.code_sha256,
        "published function code"
    );
    if let Some(record) = response.version_mut() {
        record.insert(VERSION_KEY.to_string(), number.to_string());
    }

    let persisted = work_dir
        .json(FUNCTION_FILE, &configuration)
        .and_then(|_| work_dir.file(VERSION_FILE, number.to_string().as_bytes()));
    if let Err(error) = persisted {
        return Err(ResourceError::partially_applied(response, error));
    }

    Ok((response, number))
}

fn add_configuration_metadata(response: &mut CommandResponse, configuration: &FunctionConfiguration) {
    if let Some(arn) = &configuration.function_arn {
        response.add_meta("arn", arn.as_str());
    }
    if let Some(runtime) = &configuration.runtime {
        response.add_meta("runtime", runtime.as_str());
    }
    if let Some(timeout) = configuration.timeout {
        response.add_meta("timeout", timeout.to_string());
    }
    if let Some(memory) = configuration.memory_size {
        response.add_meta("memory", memory.to_string());
    }
    if let Some(code_sha256) = &configuration.code_sha256 {
        response.add_meta("code_sha256", code_sha256.as_str());
    }
}
