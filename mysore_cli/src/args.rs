//! Hand-rolled command-line argument parser.
//!
//! Matches the classic `getopt("hmitf:")` surface: short flags, with
//! bundling, and `-f` taking a value either bundled (`-fprog.ms`) or as
//! the next argument.

use std::path::PathBuf;

/// Parsed driver options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverArgs {
    /// `-h`: print usage and exit.
    pub help: bool,
    /// `-i`: run the REPL (after any `-f` file).
    pub repl: bool,
    /// `-m`: print heap statistics on exit.
    pub memstats: bool,
    /// `-t`: print per-phase timing lines.
    pub timing: bool,
    /// `-f FILE`: parse and execute a file.
    pub file: Option<PathBuf>,
}

/// Error during argument parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    /// `-f` without a file name.
    MissingValue(&'static str),
    /// An unrecognized flag.
    UnknownFlag(String),
}

impl std::fmt::Display for ArgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgError::MissingValue(flag) => {
                write!(f, "option {} requires an argument", flag)
            }
            ArgError::UnknownFlag(flag) => write!(f, "unknown option: {}", flag),
        }
    }
}

impl std::error::Error for ArgError {}

/// Parse arguments (without the program name).
pub fn parse_args(args: &[String]) -> Result<DriverArgs, ArgError> {
    let mut result = DriverArgs::default();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        if !arg.starts_with('-') || arg.len() < 2 {
            return Err(ArgError::UnknownFlag(arg.clone()));
        }

        let flags: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < flags.len() {
            match flags[j] {
                'h' => result.help = true,
                'i' => result.repl = true,
                'm' => result.memstats = true,
                't' => result.timing = true,
                'f' => {
                    // Bundled value (`-fprog.ms`) or the next argument.
                    let value = if j + 1 < flags.len() {
                        flags[j + 1..].iter().collect::<String>()
                    } else {
                        i += 1;
                        if i >= args.len() {
                            return Err(ArgError::MissingValue("-f"));
                        }
                        args[i].clone()
                    };
                    result.file = Some(PathBuf::from(value));
                    j = flags.len();
                    continue;
                }
                other => {
                    return Err(ArgError::UnknownFlag(format!("-{}", other)));
                }
            }
            j += 1;
        }

        i += 1;
    }

    Ok(result)
}

/// The usage text.
pub fn usage(program: &str) -> String {
    format!(
        "usage: {} [-himt] [-f {{file name}}]\n\
         \x20-h          Display this help\n\
         \x20-i          Interpreter, enable REPL mode\n\
         \x20-m          Display memory usage stats on exit\n\
         \x20-t          Display timing information\n\
         \x20-f {{file}}   Load and execute file",
        program
    )
}
