//! Line-oriented interactive shell.
//!
//! Reads chunks from `input`, evaluates them in a [`LuaRuntime`] and prints
//! the results. Incomplete chunks (an open `function` or string) keep
//! reading with a continuation prompt until they parse.

use std::io::{BufRead, Write};

use anyhow::Result;
use mlua::Error as LuaError;

use super::runtime::LuaRuntime;

const PROMPT: &str = "> ";
const CONTINUE_PROMPT: &str = ">> ";

/// Run the shell until end of input.
///
/// Script errors are printed and the shell continues. I/O errors end it.
pub fn run(runtime: &LuaRuntime, input: impl BufRead, mut output: impl Write) -> Result<()> {
    let mut pending = String::new();
    write!(output, "{PROMPT}")?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        if !pending.is_empty() {
            pending.push('\n');
        }
        pending.push_str(&line);

        match runtime.eval("=stdin", &pending) {
            Ok(values) => {
                if !values.is_empty() {
                    writeln!(output, "{}", values.join("\t"))?;
                }
                pending.clear();
            }
            Err(LuaError::SyntaxError {
                incomplete_input: true,
                ..
            }) => {
                write!(output, "{CONTINUE_PROMPT}")?;
                output.flush()?;
                continue;
            }
            Err(e) => {
                writeln!(output, "{e}")?;
                pending.clear();
            }
        }

        write!(output, "{PROMPT}")?;
        output.flush()?;
    }

    if !pending.is_empty() {
        log::warn!("Discarding incomplete input at end of stream");
    }
    writeln!(output)?;
    Ok(())
}
