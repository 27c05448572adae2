// UI layer: console reporting, interactive prompts and game selection.
// The orchestration code only ever sees the `Reporter` and `Prompter`
// traits, so tests can run the same flows with scripted answers and
// without touching a real terminal.

use crate::api::{Catalog, Game};
use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::Input;

/// Categorized console output. Implementations decide how each category
/// is rendered (or whether it is rendered at all).
pub trait Reporter {
    fn info(&self, msg: &str);
    fn success(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// Reporter that prints colored lines to stdout.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn info(&self, msg: &str) {
        println!("{}", msg.blue());
    }

    fn success(&self, msg: &str) {
        println!("{}", msg.green());
    }

    fn error(&self, msg: &str) {
        println!("{}", msg.red());
    }
}

/// A source of answers to interactive prompts: a function from prompt
/// text to one line of input.
pub trait Prompter {
    fn ask(&mut self, prompt: &str) -> Result<String>;
}

/// Prompter that reads a line from the terminal via `dialoguer`.
/// `interact_text` blocks until the user submits a line; there is no
/// timeout.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        let line: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(line)
    }
}

/// Resolve the game list to exactly one game.
///
/// A single-entry list is returned as-is without prompting. Otherwise a
/// 1-indexed menu is printed and the prompter is asked until the answer
/// parses as a number within range; invalid answers report an error and
/// re-prompt with no retry limit. An empty list is an error, there is
/// nothing to select.
pub fn select_game<'a>(
    games: &'a [Game],
    reporter: &dyn Reporter,
    prompter: &mut dyn Prompter,
) -> Result<&'a Game> {
    match games {
        [] => anyhow::bail!("No games available on this instance"),
        [only] => Ok(only),
        _ => {
            for (i, game) in games.iter().enumerate() {
                let tag = format!("[{}] ", i + 1);
                reporter.info(&format!("{}Title: {}", tag, game.title));
                reporter.info(&format!("{}Summary: {}", " ".repeat(tag.len()), game.summary));
            }
            reporter.info("There are multiple games available");
            reporter.info("Enter the number of the game you want to dump");

            loop {
                let answer = prompter.ask(">>")?;
                match answer.trim().parse::<usize>() {
                    Ok(n) if n >= 1 && n <= games.len() => return Ok(&games[n - 1]),
                    _ => reporter.error("Please enter a valid game number"),
                }
            }
        }
    }
}

/// Print the challenge index with solved markers, one category at a time.
pub fn print_challenges(catalog: &Catalog, reporter: &dyn Reporter) {
    for (category, challenges) in catalog {
        reporter.info(category);
        for challenge in challenges {
            let line = format!("{} ({})", challenge.title, challenge.score);
            if challenge.solved {
                reporter.success(&format!("[SOLVED]    {}", line));
            } else {
                reporter.error(&format!("[UNSOLVED]  {}", line));
            }
        }
    }
}
