use std::io::Read;

use lambda_resource_core::context::WorkDir;
use lambda_resource_core::contract::{CommandResponse, Source};
use lambda_resource_core::error::ResourceError;
use lambda_resource_core::protocol::{decode_request, HandleCommand, Resource};
use serde::de::DeserializeOwned;

use crate::adapters::lambda_api::{Connect, LambdaApi};
use crate::handlers::check::CheckCommand;
use crate::handlers::get::InCommand;
use crate::handlers::put::OutCommand;

/// A decoded request that runs against the function-management API.
pub trait LambdaCommand: DeserializeOwned + Default {
    fn source(&self) -> &Source;

    fn run(&self, work_dir: &WorkDir, api: &dyn LambdaApi) -> Result<CommandResponse, ResourceError>;
}

/// Adapts a `LambdaCommand` to the pipeline protocol.
///
/// The source is validated before a client is built, so a bad source never
/// reaches the API. When decoding failed the handler still runs on the
/// default request, but a failure then reports the decode error.
pub struct LambdaHandler<T, C> {
    command: T,
    connector: C,
    decode_error: Option<String>,
}

impl<T: LambdaCommand, C: Connect> LambdaHandler<T, C> {
    pub fn new(connector: C) -> Self {
        Self {
            command: T::default(),
            connector,
            decode_error: None,
        }
    }

    pub fn command(&self) -> &T {
        &self.command
    }
}

impl<T: LambdaCommand, C: Connect> HandleCommand for LambdaHandler<T, C> {
    fn decode(&mut self, input: &mut dyn Read) -> Result<(), serde_json::Error> {
        match decode_request(input) {
            Ok(command) => {
                self.command = command;
                self.decode_error = None;
                Ok(())
            }
            Err(error) => {
                self.decode_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn handle_command(&self, work_dir: &WorkDir) -> Result<CommandResponse, ResourceError> {
        let source = self.command.source();
        if let Err(error) = source.validate() {
            return Err(match &self.decode_error {
                Some(message) => ResourceError::Request(message.clone()),
                None => error.into(),
            });
        }
        let api = self.connector.connect(source)?;
        self.command.run(work_dir, api.as_ref())
    }
}

/// All three commands wired to clients built by `connector`.
pub fn lambda_resource<C>(connector: C) -> Resource
where
    C: Connect + Clone + 'static,
{
    Resource {
        check: Some(Box::new(LambdaHandler::<CheckCommand, C>::new(
            connector.clone(),
        ))),
        get: Some(Box::new(LambdaHandler::<InCommand, C>::new(connector.clone()))),
        put: Some(Box::new(LambdaHandler::<OutCommand, C>::new(connector))),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use lambda_resource_core::context::CommandContext;

    use super::*;
    use crate::test_helpers::{page, ScriptedLambda};

    #[derive(Clone, Default)]
    struct CountingConnector {
        connects: Arc<AtomicUsize>,
        api: ScriptedLambda,
    }

    impl Connect for CountingConnector {
        fn connect(&self, source: &Source) -> Result<Box<dyn LambdaApi>, ResourceError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.api.connect(source)
        }
    }

    fn run(
        args: &[&str],
        input: &str,
        connector: CountingConnector,
    ) -> (Result<(), ResourceError>, String) {
        let mut resource = lambda_resource(connector);
        let mut context =
            CommandContext::new(args.iter().copied(), Cursor::new(input.to_string()), Vec::new())
                .expect("known command");
        let result = context.handle(Some(&mut resource));
        let output = String::from_utf8(context.into_output()).expect("utf-8 output");
        (result, output)
    }

    const SOURCE: &str = r#"{
        "access_key_id": "AKIAEXAMPLE",
        "secret_access_key": "secret",
        "region_name": "eu-west-1",
        "function_name": "thumbnailer"
    }"#;

    #[test]
    fn check_round_trip_writes_version_array() {
        let connector = CountingConnector {
            api: ScriptedLambda::new().with_version_page(Ok(page(&["$LATEST", "3", "4"], None))),
            ..CountingConnector::default()
        };
        let input = format!(r#"{{"source": {SOURCE}, "version": {{"version": "3"}}}}"#);

        let (result, output) = run(&["/opt/resource/check"], &input, connector.clone());

        result.expect("check should succeed");
        let wire: serde_json::Value = serde_json::from_str(&output).expect("json output");
        assert_eq!(wire, serde_json::json!([{"version": "4"}]));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalid_source_never_connects() {
        let connector = CountingConnector::default();
        let input = r#"{"source": {
            "access_key_id": "",
            "secret_access_key": "secret",
            "region_name": "eu-west-1",
            "function_name": "f"
        }}"#;

        let (result, output) = run(&["check"], input, connector.clone());

        let error = result.expect_err("should fail");
        assert!(matches!(error, ResourceError::Validation(_)));
        assert!(output.is_empty());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn undecodable_input_reports_decode_error() {
        let connector = CountingConnector::default();

        let (result, output) = run(&["in"], "not json", connector.clone());

        let error = result.expect_err("should fail");
        assert!(matches!(error, ResourceError::Request(_)), "{error}");
        assert!(error.to_string().starts_with("failed to decode request: "));
        assert!(output.is_empty());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn conflicting_params_are_reported_instead_of_source() {
        let connector = CountingConnector::default();
        let input = format!(
            r#"{{"source": {SOURCE}, "params": {{"zip_file": "a.zip", "code_dir": "src"}}}}"#
        );

        let (result, output) = run(&["out", "/tmp"], &input, connector.clone());

        let error = result.expect_err("should fail");
        let message = error.to_string();
        assert!(matches!(error, ResourceError::Request(_)), "{message}");
        assert!(message.contains("only one of params.zip_file"), "{message}");
        assert!(!message.contains("access_key_id"), "{message}");
        assert!(output.is_empty());
        assert!(connector.api.calls().is_empty());
    }

    #[test]
    fn null_params_on_put_is_a_timestamp_no_op() {
        let connector = CountingConnector::default();
        let input = format!(r#"{{"source": {SOURCE}, "params": null}}"#);

        let (result, output) = run(&["out", "/tmp"], &input, connector.clone());

        result.expect("put should succeed");
        let wire: serde_json::Value = serde_json::from_str(&output).expect("json output");
        assert!(wire["version"]["timestamp"].is_string(), "{wire}");
        assert!(connector.api.calls().is_empty());
    }

    #[test]
    fn null_params_on_get_still_requires_payload() {
        let connector = CountingConnector::default();
        let input = format!(r#"{{"source": {SOURCE}, "params": null}}"#);

        let (result, _) = run(&["in", "/tmp"], &input, connector.clone());

        let error = result.expect_err("should fail");
        assert!(matches!(error, ResourceError::Validation(_)), "{error}");
        assert!(error.to_string().contains("params.payload"));
    }

    #[test]
    fn put_with_version_echoes_without_api_calls() {
        let connector = CountingConnector::default();
        let input = format!(r#"{{"source": {SOURCE}, "params": {{"version": "7"}}}}"#);

        let (result, output) = run(&["out", "/tmp"], &input, connector.clone());

        result.expect("put should succeed");
        let wire: serde_json::Value = serde_json::from_str(&output).expect("json output");
        assert_eq!(wire["version"], serde_json::json!({"version": "7"}));
        assert!(connector.api.calls().is_empty());
    }

    #[test]
    fn decoded_request_is_kept_by_handler() {
        let mut handler = LambdaHandler::<CheckCommand, ScriptedLambda>::new(ScriptedLambda::new());
        let input = format!(r#"{{"source": {SOURCE}}} trailing"#);

        handler
            .decode(&mut Cursor::new(input))
            .expect("request should decode");

        assert_eq!(handler.command().source.function_name, "thumbnailer");
        assert!(handler.command().version.is_none());
    }
}
