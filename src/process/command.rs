//! Splitting configured command strings into argument vectors.

use std::iter::Peekable;
use std::process::Stdio;
use std::str::Chars;

use tokio::process::Command;

use crate::config::TokenizerConfig;
use crate::error::CommandError;

/// Turns a command string into an argument vector.
///
/// Backtick and environment substitution happen before word splitting and
/// are skipped inside single quotes, as a POSIX shell would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTokenizer {
    parse_env: bool,
    parse_backtick: bool,
}

/// What to put in place of an environment reference.
#[derive(Clone, Copy)]
enum Substitute {
    Run,
    Placeholder,
}

/// A scanned stretch of a command string.
enum Piece {
    Text(String),
    Backtick(String),
}

impl CommandTokenizer {
    /// Create a tokenizer with explicit substitution switches.
    #[must_use]
    pub const fn new(parse_env: bool, parse_backtick: bool) -> Self {
        Self {
            parse_env,
            parse_backtick,
        }
    }

    /// Create a tokenizer from configuration.
    #[must_use]
    pub const fn from_config(config: &TokenizerConfig) -> Self {
        Self::new(config.parse_env, config.parse_backtick)
    }

    /// Split `command` into words, applying substitutions.
    ///
    /// A blank command yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns an error on unbalanced quoting or a failed backtick command.
    pub async fn tokenize(&self, command: &str) -> Result<Vec<String>, CommandError> {
        if command.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut expanded = String::with_capacity(command.len());
        for piece in self.scan(command, Substitute::Run)? {
            match piece {
                Piece::Text(text) => expanded.push_str(&text),
                Piece::Backtick(inner) => expanded.push_str(&run_backtick(&inner).await?),
            }
        }
        split(&expanded)
    }

    /// Check that `command` is well formed without running any substitution.
    ///
    /// # Errors
    ///
    /// Returns an error on unbalanced quoting or backticks.
    pub fn validate(&self, command: &str) -> Result<(), CommandError> {
        let expanded: String = self
            .scan(command, Substitute::Placeholder)?
            .into_iter()
            .map(|piece| match piece {
                Piece::Text(text) => text,
                Piece::Backtick(_) => "x".to_string(),
            })
            .collect();
        split(&expanded).map(|_| ())
    }

    /// Expand environment references and cut out backtick commands.
    fn scan(&self, input: &str, mode: Substitute) -> Result<Vec<Piece>, CommandError> {
        let mut pieces = Vec::new();
        let mut out = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_single = false;
        let mut in_double = false;

        while let Some(c) = chars.next() {
            match c {
                '\\' if !in_single => {
                    out.push(c);
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '\'' if !in_double => {
                    in_single = !in_single;
                    out.push(c);
                }
                '"' if !in_single => {
                    in_double = !in_double;
                    out.push(c);
                }
                '`' if self.parse_backtick && !in_single => {
                    let inner = take_until(&mut chars, '`')
                        .ok_or_else(|| CommandError::Parse("unterminated backtick".to_string()))?;
                    pieces.push(Piece::Text(std::mem::take(&mut out)));
                    pieces.push(Piece::Backtick(inner));
                }
                '$' if self.parse_env && !in_single => {
                    let name = match chars.peek() {
                        Some('{') => {
                            chars.next();
                            Some(take_until(&mut chars, '}').ok_or_else(|| {
                                CommandError::Parse("unterminated ${".to_string())
                            })?)
                        }
                        Some(n) if is_name_char(*n) => Some(take_name(&mut chars)),
                        _ => None,
                    };
                    match (name, mode) {
                        (Some(name), Substitute::Run) => {
                            out.push_str(&std::env::var(name).unwrap_or_default());
                        }
                        (Some(_), Substitute::Placeholder) => {}
                        (None, _) => out.push('$'),
                    }
                }
                _ => out.push(c),
            }
        }

        pieces.push(Piece::Text(out));
        Ok(pieces)
    }
}

impl Default for CommandTokenizer {
    fn default() -> Self {
        Self::from_config(&TokenizerConfig::default())
    }
}

fn split(expanded: &str) -> Result<Vec<String>, CommandError> {
    shell_words::split(expanded).map_err(|e| CommandError::Parse(e.to_string()))
}

const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn take_name(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(c) = chars.next_if(|c| is_name_char(*c)) {
        name.push(c);
    }
    name
}

/// Consume up to and including `end`; `None` if it never appears.
fn take_until(chars: &mut Peekable<Chars<'_>>, end: char) -> Option<String> {
    let mut taken = String::new();
    for c in chars.by_ref() {
        if c == end {
            return Some(taken);
        }
        taken.push(c);
    }
    None
}

async fn run_backtick(command: &str) -> Result<String, CommandError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CommandError::Substitution {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(CommandError::Substitution {
            command: command.to_string(),
            reason: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .trim_end_matches(['\n', '\r'])
        .to_string())
}
