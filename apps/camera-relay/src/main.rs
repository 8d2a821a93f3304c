use anyhow::Result;
use camera_relay::{
    ControlClient, LogFormat, RelayConfig,
    cli::{Cli, CliCommand},
    server, telemetry,
};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(CliCommand::Serve) {
        CliCommand::Serve => {
            let config = RelayConfig::from_env()?;
            telemetry::init_tracing(config.log_format)?;
            tracing::debug!(?config, "configuration loaded");
            server::serve(config).await
        }
        CliCommand::Register(args) => {
            telemetry::init_tracing(LogFormat::Text)?;
            let client = ControlClient::new(reqwest::Client::new(), args.relay.clone());
            client.set_webhook(args.webhook()).await
        }
        CliCommand::Unregister { relay } => {
            telemetry::init_tracing(LogFormat::Text)?;
            ControlClient::new(reqwest::Client::new(), relay)
                .unset_webhook()
                .await
        }
    }
}
