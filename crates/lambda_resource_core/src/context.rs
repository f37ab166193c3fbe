//! Turns a process invocation into one request/response cycle.
//!
//! The executable is installed under the names `check`, `in` and `out`; the
//! name it was started under picks the command and the optional second
//! argument is the directory that inputs and outputs are relative to.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::error::ResourceError;
use crate::protocol::{encode_response, HandleCommand, ResourceHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Check,
    In,
    Out,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::In => "in",
            Self::Out => "out",
        }
    }

    /// What an unconfigured command prints so the caller still parses it.
    pub fn empty_response(self) -> &'static [u8] {
        match self {
            Self::Check => b"[]",
            Self::In | Self::Out => b"{}",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Parser)]
#[command(multicall = true)]
struct Invocation {
    #[command(subcommand)]
    command: InvocationCommand,
}

#[derive(Debug, Subcommand)]
enum InvocationCommand {
    /// Report function versions newer than the given one
    Check { directory: Option<PathBuf> },
    /// Invoke the function and store the result
    In { directory: Option<PathBuf> },
    /// Publish function code and/or move an alias
    Out { directory: Option<PathBuf> },
}

impl InvocationCommand {
    fn into_parts(self) -> (CommandKind, Option<PathBuf>) {
        match self {
            Self::Check { directory } => (CommandKind::Check, directory),
            Self::In { directory } => (CommandKind::In, directory),
            Self::Out { directory } => (CommandKind::Out, directory),
        }
    }
}

/// Base directory for every file a command reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The process working directory.
    pub fn current() -> Self {
        Self::new(PathBuf::new())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute paths are kept, relative ones are joined onto the root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, ResourceError> {
        let path = self.resolve(path);
        fs::read(&path).map_err(|source| ResourceError::Read { path, source })
    }

    /// Encodes `value` as JSON and writes it to `name` below the root.
    pub fn json<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<PathBuf, ResourceError> {
        let data = serde_json::to_vec_pretty(value).map_err(|source| {
            ResourceError::EncodeFile {
                path: self.resolve(name),
                source,
            }
        })?;
        self.file(name, &data)
    }

    pub fn file(&self, name: &str, data: &[u8]) -> Result<PathBuf, ResourceError> {
        let path = self.resolve(name);
        fs::write(&path, data).map_err(|source| ResourceError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

pub struct CommandContext<R, W> {
    command: CommandKind,
    directory: Option<PathBuf>,
    input: R,
    output: W,
}

impl<R: Read, W: Write> CommandContext<R, W> {
    pub fn new<I, T>(args: I, input: R, output: W) -> Result<Self, ResourceError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let invocation = Invocation::try_parse_from(&args).map_err(|error| {
            ResourceError::UnknownCommand {
                name: invoked_name(&args),
                detail: error
                    .to_string()
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .trim_start_matches("error: ")
                    .to_string(),
            }
        })?;

        let (command, directory) = invocation.command.into_parts();
        Ok(Self {
            command,
            directory,
            input,
            output,
        })
    }

    pub fn command(&self) -> CommandKind {
        self.command
    }

    pub fn work_dir(&self) -> WorkDir {
        match &self.directory {
            Some(directory) => WorkDir::new(directory),
            None => WorkDir::current(),
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs the selected command against `resource`.
    ///
    /// An `Err` means nothing was written to the output and the process
    /// should exit non-zero.
    pub fn handle(
        &mut self,
        resource: Option<&mut dyn ResourceHandler>,
    ) -> Result<(), ResourceError> {
        let command = self.command;
        let handler: Option<&mut dyn HandleCommand> =
            resource.and_then(|resource| match command {
                CommandKind::Check => resource.check_handler(),
                CommandKind::In => resource.in_handler(),
                CommandKind::Out => resource.out_handler(),
            });

        let Some(handler) = handler else {
            tracing::warn!(%command, "the command is not implemented");
            return self
                .output
                .write_all(command.empty_response())
                .map_err(ResourceError::Output);
        };

        let decode_error = handler.decode(&mut self.input).err();
        if let Some(error) = &decode_error {
            tracing::warn!(%command, %error, "failed to decode input json");
        }

        let work_dir = self.work_dir();
        if let Some(directory) = &self.directory {
            if !directory.is_dir() {
                tracing::warn!(
                    %command,
                    directory = %directory.display(),
                    "working directory does not exist"
                );
            }
        }

        let response = match handler.handle_command(&work_dir) {
            Ok(response) => response,
            Err(error) => {
                let partial_version = error
                    .partial_response()
                    .map(|response| format!("{:?}", response.version_list()));
                tracing::error!(
                    %command,
                    %error,
                    decode_error = ?decode_error,
                    partial_version = ?partial_version,
                    "failed to run command"
                );
                return Err(error);
            }
        };

        let body = encode_response(command, &response).inspect_err(|error| {
            tracing::error!(%command, %error, "failed to encode response");
        })?;
        self.output
            .write_all(&body)
            .and_then(|()| self.output.flush())
            .map_err(ResourceError::Output)
    }
}

fn invoked_name(args: &[OsString]) -> String {
    args.first()
        .map(Path::new)
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
