mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, SettingsCommand};
use pagechat::config::Config;
use pagechat::error::Result;

use commands::page::{cmd_chunks, cmd_extract, cmd_route, cmd_search};
use commands::settings::{cmd_settings_set, cmd_settings_show};

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load()?;

    match cli.command {
        Commands::Extract {
            file,
            url,
            compact,
            json,
        } => cmd_extract(&config, &file, url.as_deref(), compact, json),
        Commands::Chunks { file, url } => cmd_chunks(&config, &file, url.as_deref()),
        Commands::Search {
            file,
            query,
            top_k,
            offline,
            url,
        } => cmd_search(&config, &file, &query, top_k, offline, url.as_deref()),
        Commands::Route {
            file,
            message,
            no_rag,
            offline,
            url,
        } => cmd_route(&config, &file, &message, no_rag, offline, url.as_deref()),
        Commands::Settings { command } => match command {
            SettingsCommand::Show => cmd_settings_show(&config),
            SettingsCommand::Set {
                grounding,
                mode,
                language,
                auto_summarize,
                api_key,
            } => cmd_settings_set(
                &config,
                grounding,
                mode.as_deref(),
                language.as_deref(),
                auto_summarize,
                api_key.as_deref(),
            ),
        },
    }
}
