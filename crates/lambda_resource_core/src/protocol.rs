use std::io::Read;

use serde::de::{DeserializeOwned, Error as _};
use serde::Serialize;

use crate::context::{CommandKind, WorkDir};
use crate::contract::{CommandResponse, MetadataField, ResourceVersion, ResponseVersion};
use crate::error::ResourceError;

/// One of the three resource commands.
pub trait HandleCommand {
    /// Loads the request from the pipeline. On error the handler keeps its
    /// previous (default) request.
    fn decode(&mut self, input: &mut dyn Read) -> Result<(), serde_json::Error>;

    fn handle_command(&self, work_dir: &WorkDir) -> Result<CommandResponse, ResourceError>;
}

/// The set of commands a resource implements.
pub trait ResourceHandler {
    fn check_handler(&mut self) -> Option<&mut dyn HandleCommand>;
    fn in_handler(&mut self) -> Option<&mut dyn HandleCommand>;
    fn out_handler(&mut self) -> Option<&mut dyn HandleCommand>;
}

#[derive(Default)]
pub struct Resource {
    pub check: Option<Box<dyn HandleCommand>>,
    pub get: Option<Box<dyn HandleCommand>>,
    pub put: Option<Box<dyn HandleCommand>>,
}

impl ResourceHandler for Resource {
    fn check_handler(&mut self) -> Option<&mut dyn HandleCommand> {
        borrow_handler(&mut self.check)
    }

    fn in_handler(&mut self) -> Option<&mut dyn HandleCommand> {
        borrow_handler(&mut self.get)
    }

    fn out_handler(&mut self) -> Option<&mut dyn HandleCommand> {
        borrow_handler(&mut self.put)
    }
}

fn borrow_handler(
    handler: &mut Option<Box<dyn HandleCommand>>,
) -> Option<&mut dyn HandleCommand> {
    match handler {
        Some(handler) => Some(handler.as_mut()),
        None => None,
    }
}

/// Reads the first JSON value from `input`, ignoring anything after it.
pub fn decode_request<T: DeserializeOwned>(
    input: &mut dyn Read,
) -> Result<T, serde_json::Error> {
    serde_json::Deserializer::from_reader(input)
        .into_iter::<T>()
        .next()
        .unwrap_or_else(|| Err(serde_json::Error::custom("empty request body")))
}

#[derive(Serialize)]
struct SingleVersionBody<'a> {
    version: &'a ResourceVersion,
    metadata: &'a [MetadataField],
}

/// Renders the response the way the pipeline expects it for `command`.
///
/// `check` gets a bare array of versions; `in` and `out` get a
/// `{"version", "metadata"}` object.
pub fn encode_response(
    command: CommandKind,
    response: &CommandResponse,
) -> Result<Vec<u8>, ResourceError> {
    let mut body = match (command, &response.version) {
        (CommandKind::Check, _) => serde_json::to_vec(response.version_list()),
        (_, ResponseVersion::Single(version)) => serde_json::to_vec(&SingleVersionBody {
            version,
            metadata: &response.metadata,
        }),
        (_, ResponseVersion::Sequence(_)) => Err(serde_json::Error::custom(format!(
            "{command} must respond with a single version"
        ))),
    }
    .map_err(ResourceError::EncodeResponse)?;

    body.push(b'\n');
    Ok(body)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::{json, Value};

    use super::*;
    use crate::contract::version_record;

    #[test]
    fn check_encoding_discards_metadata() {
        let mut response =
            CommandResponse::versions(vec![version_record(5, None), version_record(6, None)]);
        response.add_meta("code_sha256", "6:abc");

        let body = encode_response(CommandKind::Check, &response).expect("encode");
        let wire: Value = serde_json::from_slice(&body).expect("json");

        assert_eq!(wire, json!([{"version": "5"}, {"version": "6"}]));
    }

    #[test]
    fn empty_check_encodes_empty_array() {
        let body =
            encode_response(CommandKind::Check, &CommandResponse::versions(Vec::new()))
                .expect("encode");
        assert_eq!(body, b"[]\n");
    }

    #[test]
    fn put_encoding_keeps_version_and_metadata() {
        let mut response = CommandResponse::single(version_record(9, Some("PROD")));
        response.add_meta("arn", "arn:aws:lambda:eu-west-1:1:function:f");

        let body = encode_response(CommandKind::Out, &response).expect("encode");
        let wire: Value = serde_json::from_slice(&body).expect("json");

        assert_eq!(
            wire,
            json!({
                "version": {"version": "9", "alias": "PROD"},
                "metadata": [{"name": "arn", "value": "arn:aws:lambda:eu-west-1:1:function:f"}]
            })
        );
    }

    #[test]
    fn get_refuses_version_sequences() {
        let response = CommandResponse::versions(vec![version_record(1, None)]);
        let error = encode_response(CommandKind::In, &response).expect_err("shape mismatch");
        assert!(error.to_string().contains("single version"));
    }

    #[test]
    fn decodes_only_the_first_json_value() {
        let mut input = Cursor::new(br#"{"a": 1} {"a": 2}"#.to_vec());
        let value: Value = decode_request(&mut input).expect("first value");
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn empty_input_is_a_decode_error() {
        let mut input = Cursor::new(Vec::new());
        assert!(decode_request::<Value>(&mut input).is_err());
    }

    #[test]
    fn default_resource_has_no_handlers() {
        let mut resource = Resource::default();
        assert!(resource.check_handler().is_none());
        assert!(resource.in_handler().is_none());
        assert!(resource.out_handler().is_none());
    }
}
