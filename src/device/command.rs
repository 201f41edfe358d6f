//! Typed builder for on-device shell commands
//!
//! Device commands travel as a single string to the device's `sh`. Arguments
//! are kept as data until [`ShellScript::render`], which is the only place
//! quoting happens.

use std::fmt::Write as _;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Word {
    /// Quoted as a single literal word
    Literal(String),
    /// Left unquoted so the device shell expands it
    Glob(String),
}

/// One command with its arguments and an optional append redirection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellCommand {
    program: String,
    args: Vec<Word>,
    append_to: Option<String>,
}

impl ShellCommand {
    /// Start a command
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            append_to: None,
        }
    }

    /// Add a literal argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Word::Literal(arg.into()));
        self
    }

    /// Add several literal arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(args.into_iter().map(|a| Word::Literal(a.into())));
        self
    }

    /// Add a path pattern the device shell expands (`*`, `?`)
    ///
    /// Characters other than path characters and wildcards are quoted away.
    pub fn glob(mut self, pattern: impl Into<String>) -> Self {
        self.args.push(Word::Glob(pattern.into()));
        self
    }

    /// Append stdout to `file` (`>> file`)
    pub fn append_to(mut self, file: impl Into<String>) -> Self {
        self.append_to = Some(file.into());
        self
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&quote(&self.program));
        for arg in &self.args {
            out.push(' ');
            match arg {
                Word::Literal(value) => out.push_str(&quote(value)),
                Word::Glob(pattern) => out.push_str(&quote_glob(pattern)),
            }
        }
        if let Some(file) = &self.append_to {
            let _ = write!(out, " >> {}", quote(file));
        }
    }
}

/// Commands run in sequence, stopping at the first failure (`a && b`)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShellScript {
    commands: Vec<ShellCommand>,
}

impl ShellScript {
    /// Empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command
    pub fn then(mut self, command: ShellCommand) -> Self {
        self.commands.push(command);
        self
    }

    /// Commands in order
    pub fn commands(&self) -> &[ShellCommand] {
        &self.commands
    }

    /// Render to a single `sh` command string
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                out.push_str(" && ");
            }
            command.render_into(&mut out);
        }
        out
    }
}

impl From<ShellCommand> for ShellScript {
    fn from(command: ShellCommand) -> Self {
        ShellScript::new().then(command)
    }
}

fn is_plain(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ',' | ':' | '=' | '+' | '@')
}

/// POSIX single-quote a word unless it is made of plain characters only
fn quote(word: &str) -> String {
    if !word.is_empty() && word.chars().all(is_plain) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Quote everything but the wildcards of a glob pattern
fn quote_glob(pattern: &str) -> String {
    let mut out = String::new();
    let mut run = String::new();
    for c in pattern.chars() {
        if matches!(c, '*' | '?') {
            if !run.is_empty() {
                out.push_str(&quote(&run));
                run.clear();
            }
            out.push(c);
        } else {
            run.push(c);
        }
    }
    if !run.is_empty() {
        out.push_str(&quote(&run));
    }
    out
}
