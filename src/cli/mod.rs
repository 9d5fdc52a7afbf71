//! Command line entrypoint of the plugin binary

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};

use kudo_tfplugin::{serve, ServeOptions};

use crate::provider::{KudoProvider, PROVIDER_ADDRESS};

/// Main CLI application
pub struct CliApp;

impl CliApp {
    /// Create the CLI application
    pub fn app() -> Command {
        Command::new("terraform-provider-kudo")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Terraform provider for KUDO operators and instances")
            .arg(
                Arg::new("debug")
                    .long("debug")
                    .action(ArgAction::SetTrue)
                    .help("Start in debug mode and print the reattach configuration"),
            )
    }

    /// Serve the provider until Terraform stops the plugin
    pub async fn run(matches: &ArgMatches) -> Result<()> {
        let opts = ServeOptions {
            debug: matches.get_flag("debug"),
            provider_address: PROVIDER_ADDRESS.to_string(),
        };
        serve(KudoProvider, opts).await?;
        Ok(())
    }
}
