//! Interactive overwrite/new/cancel prompt

use std::io::{self, BufRead, Write};
use std::path::Path;

/// Operator decision for an existing output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    Overwrite,
    New,
    Cancel,
}

impl std::str::FromStr for ConflictChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(ConflictChoice::Overwrite),
            "new" => Ok(ConflictChoice::New),
            "cancel" => Ok(ConflictChoice::Cancel),
            other => Err(format!("Invalid response: {}", other)),
        }
    }
}

/// Source of conflict decisions
pub trait ConflictPrompt {
    /// Ask what to do about `existing`
    fn ask(&mut self, existing: &Path) -> io::Result<ConflictChoice>;
}

/// Line-oriented prompt over any reader/writer pair.
///
/// Re-asks until a valid answer arrives. End of input counts as cancel.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl ConsolePrompt<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the process's stdin/stdout
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConflictPrompt for ConsolePrompt<R, W> {
    fn ask(&mut self, existing: &Path) -> io::Result<ConflictChoice> {
        writeln!(self.output, "Output file already exists: {}.", existing.display())?;

        let mut line = String::new();
        loop {
            write!(
                self.output,
                "Do you want to overwrite it, create a new file, or cancel? (overwrite/new/cancel): "
            )?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(ConflictChoice::Cancel);
            }

            match line.parse::<ConflictChoice>() {
                Ok(choice) => return Ok(choice),
                Err(_) => writeln!(
                    self.output,
                    "Invalid response. Please enter 'overwrite', 'new', or 'cancel'."
                )?,
            }
        }
    }
}

/// Prompt used when no operator is present; always cancels
pub struct NoPrompt;

impl ConflictPrompt for NoPrompt {
    fn ask(&mut self, _existing: &Path) -> io::Result<ConflictChoice> {
        Ok(ConflictChoice::Cancel)
    }
}
