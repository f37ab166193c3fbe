//! Scripted `LambdaApi` double shared by the handler tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use lambda_resource_core::contract::Source;
use lambda_resource_core::error::ResourceError;

use crate::adapters::lambda_api::{
    AliasConfiguration, Connect, FunctionConfiguration, InvocationResult, LambdaApi, VersionPage,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListVersions {
        function_name: String,
        marker: Option<String>,
    },
    GetConfiguration {
        function_name: String,
        qualifier: String,
    },
    UpdateCode {
        function_name: String,
        zip_file: Vec<u8>,
    },
    UpdateAlias {
        function_name: String,
        alias: String,
        function_version: String,
    },
    Invoke {
        qualified_name: String,
        payload: Vec<u8>,
    },
}

#[derive(Default)]
struct Script {
    version_pages: VecDeque<Result<VersionPage, String>>,
    configurations: VecDeque<Result<FunctionConfiguration, String>>,
    code_updates: VecDeque<Result<FunctionConfiguration, String>>,
    alias_updates: VecDeque<Result<AliasConfiguration, String>>,
    invocations: VecDeque<Result<InvocationResult, String>>,
    calls: Vec<Call>,
}

/// Answers each operation from a queue and records every call.
#[derive(Clone, Default)]
pub struct ScriptedLambda {
    script: Arc<Mutex<Script>>,
}

impl ScriptedLambda {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version_page(self, page: Result<VersionPage, String>) -> Self {
        self.lock().version_pages.push_back(page);
        self
    }

    pub fn with_configuration(self, configuration: Result<FunctionConfiguration, String>) -> Self {
        self.lock().configurations.push_back(configuration);
        self
    }

    pub fn with_code_update(self, configuration: Result<FunctionConfiguration, String>) -> Self {
        self.lock().code_updates.push_back(configuration);
        self
    }

    pub fn with_alias_update(self, alias: Result<AliasConfiguration, String>) -> Self {
        self.lock().alias_updates.push_back(alias);
        self
    }

    pub fn with_invocation(self, invocation: Result<InvocationResult, String>) -> Self {
        self.lock().invocations.push_back(invocation);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("poisoned mutex")
    }
}

fn next<T>(queue: &mut VecDeque<Result<T, String>>, operation: &str) -> Result<T, String> {
    queue
        .pop_front()
        .unwrap_or_else(|| Err(format!("no scripted response for {operation}")))
}

impl LambdaApi for ScriptedLambda {
    fn list_versions(
        &self,
        function_name: &str,
        marker: Option<&str>,
    ) -> Result<VersionPage, String> {
        let mut script = self.lock();
        script.calls.push(Call::ListVersions {
            function_name: function_name.to_string(),
            marker: marker.map(str::to_string),
        });
        next(&mut script.version_pages, "list_versions")
    }

    fn get_configuration(
        &self,
        function_name: &str,
        qualifier: &str,
    ) -> Result<FunctionConfiguration, String> {
        let mut script = self.lock();
        script.calls.push(Call::GetConfiguration {
            function_name: function_name.to_string(),
            qualifier: qualifier.to_string(),
        });
        next(&mut script.configurations, "get_configuration")
    }

    fn update_code(
        &self,
        function_name: &str,
        zip_file: Vec<u8>,
    ) -> Result<FunctionConfiguration, String> {
        let mut script = self.lock();
        script.calls.push(Call::UpdateCode {
            function_name: function_name.to_string(),
            zip_file,
        });
        next(&mut script.code_updates, "update_code")
    }

    fn update_alias(
        &self,
        function_name: &str,
        alias: &str,
        function_version: &str,
    ) -> Result<AliasConfiguration, String> {
        let mut script = self.lock();
        script.calls.push(Call::UpdateAlias {
            function_name: function_name.to_string(),
            alias: alias.to_string(),
            function_version: function_version.to_string(),
        });
        next(&mut script.alias_updates, "update_alias")
    }

    fn invoke(&self, qualified_name: &str, payload: Vec<u8>) -> Result<InvocationResult, String> {
        let mut script = self.lock();
        script.calls.push(Call::Invoke {
            qualified_name: qualified_name.to_string(),
            payload,
        });
        next(&mut script.invocations, "invoke")
    }
}

impl Connect for ScriptedLambda {
    fn connect(&self, _source: &Source) -> Result<Box<dyn LambdaApi>, ResourceError> {
        Ok(Box::new(self.clone()))
    }
}

pub fn source() -> Source {
    Source {
        access_key_id: "AKIAEXAMPLE".to_string(),
        secret_access_key: "secret".to_string(),
        region_name: "eu-west-1".to_string(),
        function_name: "thumbnailer".to_string(),
        ..Source::default()
    }
}

pub fn configuration(version: &str, code_sha256: &str) -> FunctionConfiguration {
    FunctionConfiguration {
        function_name: Some("thumbnailer".to_string()),
        function_arn: Some(format!(
            "arn:aws:lambda:eu-west-1:123456789012:function:thumbnailer:{version}"
        )),
        runtime: Some("provided.al2023".to_string()),
        timeout: Some(30),
        memory_size: Some(256),
        code_sha256: Some(code_sha256.to_string()),
        version: Some(version.to_string()),
        ..FunctionConfiguration::default()
    }
}

pub fn page(versions: &[&str], next_marker: Option<&str>) -> VersionPage {
    VersionPage {
        versions: versions
            .iter()
            .map(|version| configuration(version, &format!("sha-{version}")))
            .collect(),
        next_marker: next_marker.map(str::to_string),
    }
}
