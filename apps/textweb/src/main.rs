mod cli;
mod console;

use clap::Parser;
use cli::Cli;
use console::Console;
use log::error;
use std::io;
use std::process::ExitCode;
use tw_session::BrowserConfig;
use tw_session::DisplayCaps;
use tw_session::TextPageRenderer;

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    let config = match BrowserConfig::load(&cli.overrides()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("textweb: {error}");
            return ExitCode::FAILURE;
        }
    };

    let mut session = match tw_session::open_session(&config) {
        Ok(session) => session,
        Err(error) => {
            eprintln!("textweb startup error: {error}");
            return ExitCode::FAILURE;
        }
    };

    // An explicit flag beats the engine remembered from earlier runs.
    if let Some(engine) = cli.engine {
        session.set_search_engine(engine);
    }

    let caps = DisplayCaps {
        links: config.link_display_cap,
        text_chars: config.text_display_cap,
    };
    let mut console = Console::new(TextPageRenderer::new(session, caps));

    let stdin = io::stdin();
    let stdout = io::stdout();
    match console.run(stdin.lock(), stdout.lock(), cli.url.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("console i/o failed: {error}");
            ExitCode::FAILURE
        }
    }
}
