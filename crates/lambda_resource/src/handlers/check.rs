use lambda_resource_core::context::WorkDir;
use lambda_resource_core::contract::{
    version_record, CommandResponse, ResourceVersion, Source, ValidationError,
};
use lambda_resource_core::error::ResourceError;
use lambda_resource_core::versions::{
    alias_transition, baseline_number, parse_version_number, select_new_versions,
    NumberedVersion, PublishedVersion,
};
use serde::Deserialize;

use crate::adapters::lambda_api::{FunctionConfiguration, LambdaApi};
use crate::resource::LambdaCommand;

pub const CODE_SHA256_META: &str = "code_sha256";

#[derive(Debug, Default, Deserialize)]
pub struct CheckCommand {
    pub source: Source,
    /// The last version the pipeline saw, if any.
    #[serde(default)]
    pub version: Option<ResourceVersion>,
}

impl LambdaCommand for CheckCommand {
    fn source(&self) -> &Source {
        &self.source
    }

    fn run(
        &self,
        _work_dir: &WorkDir,
        api: &dyn LambdaApi,
    ) -> Result<CommandResponse, ResourceError> {
        let baseline = baseline_number(self.version.as_ref())?;
        let function_name = &self.source.function_name;
        let alias = self.source.alias.as_deref();

        let versions = match alias {
            None => select_new_versions(list_published_versions(api, function_name)?, baseline)?,
            Some(alias) => current_alias_version(api, function_name, alias, baseline)?,
        };

        tracing::info!(
            function = %function_name,
            alias,
            baseline,
            new_versions = versions.len(),
            "checked function versions"
        );

        let mut response = CommandResponse::versions(
            versions
                .iter()
                .map(|version| version_record(version.number, alias))
                .collect(),
        );
        for version in &versions {
            if let Some(code_sha256) = &version.code_sha256 {
                response.add_meta(CODE_SHA256_META, format!("{}:{code_sha256}", version.number));
            }
        }
        Ok(response)
    }
}

fn list_published_versions(
    api: &dyn LambdaApi,
    function_name: &str,
) -> Result<Vec<PublishedVersion>, ResourceError> {
    let mut published = Vec::new();
    let mut marker: Option<String> = None;
    loop {
        let page = api
            .list_versions(function_name, marker.as_deref())
            .map_err(|message| ResourceError::api("list versions", message))?;
        published.extend(
            page.versions
                .iter()
                .map(FunctionConfiguration::published_version),
        );

        match page.next_marker {
            Some(next) if !next.is_empty() => marker = Some(next),
            _ => break,
        }
    }
    Ok(published)
}

fn current_alias_version(
    api: &dyn LambdaApi,
    function_name: &str,
    alias: &str,
    baseline: Option<u64>,
) -> Result<Vec<NumberedVersion>, ResourceError> {
    let configuration = api
        .get_configuration(function_name, alias)
        .map_err(|message| ResourceError::api("check configuration", message))?;

    let number = parse_version_number(configuration.version.as_deref().unwrap_or_default())
        .map_err(|error| {
            ValidationError::new(format!(
                "could not parse function version for alias {alias:?}: {error}"
            ))
        })?;

    let current = NumberedVersion {
        number,
        code_sha256: configuration.code_sha256,
    };
    Ok(alias_transition(current, baseline).into_iter().collect())
}
