//! `in`: invoke the function once and save its result.

use chrono::Utc;
use lambda_resource_core::context::WorkDir;
use lambda_resource_core::contract::{
    null_as_default, timestamp_version, CommandResponse, InParams, PayloadSource,
    ResourceVersion, Source, ValidationError,
};
use lambda_resource_core::error::{FunctionError, FunctionErrorKind, ResourceError};
use serde::Deserialize;

use crate::adapters::lambda_api::LambdaApi;
use crate::resource::LambdaCommand;

/// Invocation details, without the response payload.
pub const RESULT_FILE: &str = "result.json";
/// The raw response payload.
pub const RESULT_PAYLOAD_FILE: &str = "result.payload.json";

#[derive(Debug, Default, Deserialize)]
pub struct InCommand {
    pub source: Source,
    #[serde(default)]
    pub version: Option<ResourceVersion>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub params: InParams,
}

impl LambdaCommand for InCommand {
    fn source(&self) -> &Source {
        &self.source
    }

    fn run(&self, work_dir: &WorkDir, api: &dyn LambdaApi) -> Result<CommandResponse, ResourceError> {
        let payload = self.params.payload.as_ref().ok_or_else(|| {
            ValidationError::new("params.payload or params.payload_file is required")
        })?;
        let payload = payload_bytes(payload, work_dir)?;
        if payload.is_empty() {
            return Err(ValidationError::new("invoke payload is empty").into());
        }

        let alias = self
            .params
            .alias
            .as_deref()
            .or(self.source.alias.as_deref());
        let function = self.source.qualified_name(alias);
        tracing::debug!(
            function = %function,
            requested_version = ?self.version,
            payload_bytes = payload.len(),
            "invoking function"
        );

        let result = api
            .invoke(&function, payload)
            .map_err(|message| ResourceError::api("invoke function", message))?;

        if let Some(header) = result.function_error.as_deref() {
            let kind = FunctionErrorKind::from_header(header);
            let error = FunctionError::decode(kind, &result.payload)
                .map_err(|source| ResourceError::FunctionErrorDecode { kind, source })?;
            tracing::error!(
                function = %function,
                kind = %error.kind,
                error_type = ?error.error_type,
                stack_trace = ?error.stack_trace,
                "{}",
                error.message
            );
            return Err(error.into());
        }

        tracing::info!(
            function = %function,
            status_code = result.status_code,
            executed_version = ?result.executed_version,
            "successfully invoked function"
        );
        work_dir.json(RESULT_FILE, &result)?;
        work_dir.file(RESULT_PAYLOAD_FILE, &result.payload)?;

        let mut response = CommandResponse::single(timestamp_version(Utc::now().timestamp()));
        response.add_meta("status_code", result.status_code.to_string());
        if let Some(executed_version) = &result.executed_version {
            response.add_meta("executed_version", executed_version.as_str());
        }
        response.add_meta("function", function);
        Ok(response)
    }
}

fn payload_bytes(payload: &PayloadSource, work_dir: &WorkDir) -> Result<Vec<u8>, ResourceError> {
    match payload {
        PayloadSource::Inline(value) => serde_json::to_vec(value).map_err(|error| {
            ValidationError::new(format!("params.payload is not encodable: {error}")).into()
        }),
        PayloadSource::File(path) => work_dir.read(path),
    }
}
