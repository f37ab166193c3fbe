use aws_sdk_lambda::config::{Credentials, Region};
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use lambda_resource_core::contract::Source;
use lambda_resource_core::error::ResourceError;
use tokio::runtime::Runtime;

use crate::adapters::lambda_api::{
    AliasConfiguration, Connect, FunctionConfiguration, InvocationResult, LambdaApi, VersionPage,
};

const CREDENTIALS_PROVIDER: &str = "pipeline-source";

// The SDK output types share getters but no trait.
macro_rules! function_configuration {
    ($output:expr) => {{
        let output = $output;
        FunctionConfiguration {
            function_name: output.function_name().map(str::to_string),
            function_arn: output.function_arn().map(str::to_string),
            runtime: output.runtime().map(|runtime| runtime.as_str().to_string()),
            role: output.role().map(str::to_string),
            handler: output.handler().map(str::to_string),
            description: output.description().map(str::to_string),
            timeout: output.timeout(),
            memory_size: output.memory_size(),
            last_modified: output.last_modified().map(str::to_string),
            code_sha256: output.code_sha256().map(str::to_string),
            version: output.version().map(str::to_string),
            revision_id: output.revision_id().map(str::to_string),
        }
    }};
}

/// `LambdaApi` backed by the AWS SDK, blocking on a private runtime.
pub struct AwsLambdaApi {
    runtime: Runtime,
    client: aws_sdk_lambda::Client,
}

impl AwsLambdaApi {
    pub fn connect(source: &Source) -> Result<Self, String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| format!("failed to start async runtime: {error}"))?;

        let credentials = Credentials::new(
            source.access_key_id.clone(),
            source.secret_access_key.clone(),
            source.session_token.clone(),
            None,
            CREDENTIALS_PROVIDER,
        );
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(source.region_name.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint_url) = &source.endpoint_url {
            loader = loader.endpoint_url(endpoint_url.clone());
        }

        let sdk_config = runtime.block_on(loader.load());
        Ok(Self {
            client: aws_sdk_lambda::Client::new(&sdk_config),
            runtime,
        })
    }
}

impl LambdaApi for AwsLambdaApi {
    fn list_versions(
        &self,
        function_name: &str,
        marker: Option<&str>,
    ) -> Result<VersionPage, String> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .list_versions_by_function()
                    .function_name(function_name)
                    .set_marker(marker.map(str::to_string))
                    .send(),
            )
            .map_err(|error| format!("{}", DisplayErrorContext(&error)))?;

        Ok(VersionPage {
            versions: output
                .versions()
                .iter()
                .map(|version| function_configuration!(version))
                .collect(),
            next_marker: output.next_marker().map(str::to_string),
        })
    }

    fn get_configuration(
        &self,
        function_name: &str,
        qualifier: &str,
    ) -> Result<FunctionConfiguration, String> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .get_function_configuration()
                    .function_name(function_name)
                    .qualifier(qualifier)
                    .send(),
            )
            .map_err(|error| format!("{}", DisplayErrorContext(&error)))?;

        Ok(function_configuration!(&output))
    }

    fn update_code(
        &self,
        function_name: &str,
        zip_file: Vec<u8>,
    ) -> Result<FunctionConfiguration, String> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .update_function_code()
                    .function_name(function_name)
                    .zip_file(Blob::new(zip_file))
                    .publish(true)
                    .send(),
            )
            .map_err(|error| format!("{}", DisplayErrorContext(&error)))?;

        Ok(function_configuration!(&output))
    }

    fn update_alias(
        &self,
        function_name: &str,
        alias: &str,
        function_version: &str,
    ) -> Result<AliasConfiguration, String> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .update_alias()
                    .function_name(function_name)
                    .name(alias)
                    .function_version(function_version)
                    .send(),
            )
            .map_err(|error| format!("{}", DisplayErrorContext(&error)))?;

        Ok(AliasConfiguration {
            alias_arn: output.alias_arn().map(str::to_string),
            name: output.name().map(str::to_string),
            function_version: output.function_version().map(str::to_string),
            description: output.description().map(str::to_string),
            revision_id: output.revision_id().map(str::to_string),
        })
    }

    fn invoke(&self, qualified_name: &str, payload: Vec<u8>) -> Result<InvocationResult, String> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .invoke()
                    .function_name(qualified_name)
                    .payload(Blob::new(payload))
                    .send(),
            )
            .map_err(|error| format!("{}", DisplayErrorContext(&error)))?;

        Ok(InvocationResult {
            status_code: output.status_code(),
            function_error: output.function_error().map(str::to_string),
            executed_version: output.executed_version().map(str::to_string),
            log_result: output.log_result().map(str::to_string),
            payload: output
                .payload()
                .map(|payload| payload.as_ref().to_vec())
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AwsConnector;

impl Connect for AwsConnector {
    fn connect(&self, source: &Source) -> Result<Box<dyn LambdaApi>, ResourceError> {
        let api = AwsLambdaApi::connect(source)
            .map_err(|message| ResourceError::api("create lambda client", message))?;
        Ok(Box::new(api))
    }
}
