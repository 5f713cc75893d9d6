//! Terminal output helpers

use owo_colors::OwoColorize;
use std::fmt::Display;
use std::io::{self, Write};
use wattwise_common::Fact;

/// Words that end the chat loop, matched case-insensitively
pub const EXIT_WORDS: [&str; 4] = ["exit", "quit", "bye", "goodbye"];

pub fn is_exit_command(input: &str) -> bool {
    let word = input.trim().to_lowercase();
    EXIT_WORDS.contains(&word.as_str())
}

pub fn print_banner(model: &str) {
    println!("{}", "=".repeat(60));
    println!("{}", "⚡ Energy Calculator Assistant".bold());
    println!("{}", "=".repeat(60));
    println!("Ask how much energy an appliance uses, what it costs,");
    println!("and what that energy is equivalent to.");
    println!("Model: {}", model.dimmed());
    println!("Type 'exit' to quit.");
    println!();
}

pub fn print_prompt() -> io::Result<()> {
    print!("{} ", "You:".green().bold());
    io::stdout().flush()
}

pub fn print_assistant_label() -> io::Result<()> {
    print!("{} ", "Assistant:".cyan().bold());
    io::stdout().flush()
}

/// Write a fragment as soon as it arrives
pub fn print_fragment(fragment: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(fragment.as_bytes())?;
    stdout.flush()
}

pub fn print_error(error: &impl Display) {
    println!("{} {}", "[Error]".red().bold(), error);
}

/// Multi-line description of a fact for `search`
pub fn format_fact(fact: &Fact) -> String {
    let mut out = format!("UUID: {}\nFact: {}", fact.id, fact.statement);
    if let Some(from) = &fact.valid_from {
        out.push_str(&format!("\nValid from: {}", from));
    }
    if let Some(until) = &fact.valid_until {
        out.push_str(&format!("\nValid until: {}", until));
    }
    out
}
