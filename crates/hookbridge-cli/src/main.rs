use hookbridge_cli::{run_cli, CliError};

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        eprintln!("error: {}", e);

        let exit_code = match e {
            CliError::Configuration(_) => 1,
            CliError::UnknownIntegration { .. } | CliError::NoWebhook { .. } => 2,
            CliError::Lifecycle { .. } | CliError::Provider(_) | CliError::Credential(_) => 3,
            CliError::Io(_) | CliError::Output(_) => 4,
        };

        std::process::exit(exit_code);
    }
}
