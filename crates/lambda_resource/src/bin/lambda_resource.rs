//! Pipeline resource entry point. Install it as `check`, `in` and `out`;
//! the executable name selects the command.

use std::io;
use std::process::ExitCode;

use lambda_resource::adapters::aws::AwsConnector;
use lambda_resource::logging;
use lambda_resource::resource::lambda_resource;
use lambda_resource_core::context::CommandContext;

fn main() -> ExitCode {
    logging::init();

    let mut context =
        match CommandContext::new(std::env::args_os(), io::stdin().lock(), io::stdout().lock()) {
            Ok(context) => context,
            Err(error) => {
                tracing::error!(%error, "failed to start");
                return ExitCode::FAILURE;
            }
        };

    let mut resource = lambda_resource(AwsConnector);
    match context.handle(Some(&mut resource)) {
        Ok(()) => ExitCode::SUCCESS,
        // Already logged with its command context.
        Err(_) => ExitCode::FAILURE,
    }
}
