use crate::error::{GovmError, Result};
use colored::*;
use dialoguer::Input;
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use walkdir::WalkDir;

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Total size of the regular files below `dir`; unreadable entries are skipped.
pub fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Yes,
    No,
    Invalid,
}

/// Only a bare `y` or `n` counts, in either case.
pub fn parse_reply(input: &str) -> Reply {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" => Reply::Yes,
        "n" => Reply::No,
        _ => Reply::Invalid,
    }
}

/// Ask a y/n question once. Anything but `y` cancels, printing `cancelled` on `n`.
///
/// A terminal gets a dialoguer prompt; piped stdin is read one line at a time.
pub fn confirm(prompt: &str, cancelled: &str) -> Result<bool> {
    let answer = if std::io::stdin().is_terminal() {
        Input::<String>::new()
            .with_prompt(format!("{} (y/n)", prompt))
            .allow_empty(true)
            .interact_text()
            .map_err(|e| GovmError::Prompt(e.to_string()))?
    } else {
        print!("{} (y/n): ", prompt);
        std::io::stdout()
            .flush()
            .map_err(|e| GovmError::Prompt(e.to_string()))?;
        read_answer(&mut std::io::stdin().lock())?
    };

    Ok(accept(parse_reply(&answer), cancelled))
}

fn read_answer<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|e| GovmError::Prompt(e.to_string()))?;
    Ok(line)
}

fn accept(reply: Reply, cancelled: &str) -> bool {
    match reply {
        Reply::Yes => true,
        Reply::No => {
            print_info(cancelled);
            false
        }
        Reply::Invalid => {
            print_warning("Invalid input. Please enter 'y' to confirm or 'n' to cancel.");
            false
        }
    }
}
