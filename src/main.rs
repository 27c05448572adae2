// Entrypoint for the CLI application.
// - Parses arguments, prompts for any missing credentials, then runs the
//   dump flow top to bottom.
// - Exit code 1 covers auth failures and any fatal error before the
//   per-challenge loop; a declined overwrite exits 0 with nothing written.

use clap::Parser;
use dialoguer::{Input, Password};
use gzdump::api::ApiClient;
use gzdump::dump::{DumpOutcome, Dumper};
use gzdump::ui::{self, ConsoleReporter, Reporter, StdinPrompter};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Dump a GZCTF game's challenges and attachments to local disk"
)]
struct Cli {
    /// Base URL of the GZCTF instance
    url: String,
    #[arg(short, long, help = "Username to login with (prompted when omitted)")]
    username: Option<String>,
    #[arg(short, long, help = "Password for the user (prompted when omitted)")]
    password: Option<String>,
    #[arg(
        short,
        long,
        default_value = "Dump",
        help = "Directory where to dump the files"
    )]
    output: String,
    #[arg(short, long, help = "Perform all reads but skip every disk write")]
    dry_run: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let reporter = ConsoleReporter;
    match run(cli, &reporter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            reporter.error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, reporter: &dyn Reporter) -> anyhow::Result<()> {
    // `Password` hides input in the terminal; both prompts only appear
    // when the matching flag was omitted.
    let username = match cli.username {
        Some(u) => u,
        None => Input::new().with_prompt("Username").interact_text()?,
    };
    let password = match cli.password {
        Some(p) => p,
        None => Password::new().with_prompt("Password").interact()?,
    };

    let api = ApiClient::new(&cli.url)?;
    api.login(&username, &password)?;

    let games = api.list_games()?;
    let mut prompter = StdinPrompter;
    let game = ui::select_game(&games, reporter, &mut prompter)?;

    let catalog = api.game_details(game.id)?;
    ui::print_challenges(&catalog, reporter);

    let dumper = Dumper::new(&api, reporter, &cli.output, cli.dry_run);
    match dumper.run(game.id, &catalog, &mut prompter)? {
        DumpOutcome::Declined => reporter.info("Dump aborted, nothing written"),
        DumpOutcome::Completed { dumped, failed } => {
            if failed > 0 {
                reporter.error(&format!("{} challenges failed", failed));
            }
            reporter.success(&format!("Dumped {} challenges to {}", dumped, cli.output));
        }
    }
    Ok(())
}
