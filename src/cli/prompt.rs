//! Terminal prompts for comparisons and import confirmation.

use std::io::{self, BufRead, Write};

use crate::core::{Judge, ShelfResult};
use crate::domain::{Category, Entry, NewEntry, Tags};
use crate::ingest::{Confirmation, ImportRecord, Prompter};

/// Reads answers line by line from stdin. End of input abandons.
#[derive(Debug, Default)]
pub struct StdinPrompter;

/// Print `prompt` and read one trimmed line; `None` on end of input
fn ask(prompt: &str) -> ShelfResult<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

impl Judge for StdinPrompter {
    fn judge(&mut self, candidate: &NewEntry, subject: &Entry) -> ShelfResult<Option<bool>> {
        println!();
        println!("Which did you like more?");
        println!("  [1] {} by {}", candidate.title, candidate.author);
        println!("  [2] {} by {}", subject.title, subject.author);

        loop {
            let Some(answer) = ask("Choice (1/2, q to stop): ")? else {
                return Ok(None);
            };
            match answer.as_str() {
                "1" => return Ok(Some(true)),
                "2" => return Ok(Some(false)),
                "q" | "quit" => return Ok(None),
                _ => println!("Please answer 1, 2 or q."),
            }
        }
    }
}

impl Prompter for StdinPrompter {
    fn confirm(&mut self, record: &ImportRecord) -> ShelfResult<Option<Confirmation>> {
        println!();
        println!("📖 {} by {}", record.title, record.author);
        if record.rating > 0 {
            println!("   Rated {}/5, shelf '{}'", record.rating, record.shelf);
        } else {
            println!("   Shelf '{}'", record.shelf);
        }

        let category = loop {
            let prompt = format!("Category [{}] (s to skip): ", record.category);
            let Some(answer) = ask(&prompt)? else {
                return Ok(None);
            };
            match answer.as_str() {
                "" => break record.category,
                "s" | "skip" => return Ok(None),
                other => match other.parse::<Category>() {
                    Ok(category) => break category,
                    Err(e) => println!("{}", e),
                },
            }
        };

        let tags = ask("Tags (comma-separated, blank for none): ")?
            .map(|raw| Tags::parse(&raw))
            .unwrap_or_default();

        Ok(Some(Confirmation { category, tags }))
    }
}
