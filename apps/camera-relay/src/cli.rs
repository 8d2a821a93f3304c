use clap::{Args, Parser, Subcommand};

use crate::types::{PortValue, SetWebhookRequest};

#[derive(Parser, Debug)]
#[command(
    name = "camera-relay",
    version,
    about = "LINE webhook relay that answers with camera snapshots"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum CliCommand {
    /// Run the relay (default)
    Serve,
    /// Register a camera server with a running relay
    Register(RegisterArgs),
    /// Remove the camera server registration from a running relay
    Unregister {
        /// Relay control endpoint
        #[arg(long, env = "CAMERA_RELAY_URL")]
        relay: String,
    },
}

#[derive(Args, Debug, PartialEq, Eq)]
pub struct RegisterArgs {
    /// Relay control endpoint
    #[arg(long, env = "CAMERA_RELAY_URL")]
    pub relay: String,

    /// Absolute camera server URL; when omitted the relay derives it from
    /// the caller's address plus --port and --path
    #[arg(long, conflicts_with_all = ["port", "path"])]
    pub url: Option<String>,

    /// Camera server port
    #[arg(long, requires = "path")]
    pub port: Option<u16>,

    /// Camera server path
    #[arg(long, requires = "port")]
    pub path: Option<String>,
}

impl RegisterArgs {
    pub fn webhook(&self) -> SetWebhookRequest {
        SetWebhookRequest {
            url: self.url.clone(),
            port: self.port.map(PortValue::Number),
            path: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["camera-relay"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn register_with_port_and_path() {
        let cli = Cli::try_parse_from([
            "camera-relay",
            "register",
            "--relay",
            "http://relay.test/",
            "--port",
            "8089",
            "--path",
            "/",
        ])
        .unwrap();
        let Some(CliCommand::Register(args)) = cli.command else {
            panic!("expected register");
        };
        assert_eq!(
            args.webhook(),
            SetWebhookRequest {
                url: None,
                port: Some(PortValue::Number(8089)),
                path: Some("/".into()),
            }
        );
    }

    #[test]
    fn url_conflicts_with_port() {
        let parsed = Cli::try_parse_from([
            "camera-relay",
            "register",
            "--relay",
            "http://relay.test/",
            "--url",
            "http://cam/",
            "--port",
            "8089",
            "--path",
            "/",
        ]);
        assert!(parsed.is_err());
    }
}
