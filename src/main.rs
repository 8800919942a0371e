use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser as ClapParser;
use log::info;

use lox::error::LoxError;
use lox::interpreter::Interpreter;

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking interpreter for the Lox language", long_about = None)]
pub struct Cli {
    /// Script to execute; starts an interactive session when omitted.
    script: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = Cli::parse();

    match args.script {
        Some(path) => run_file(path),
        None => run_prompt(),
    }
}

fn run_file(path: PathBuf) -> anyhow::Result<()> {
    let mut source = String::new();

    match File::open(&path) {
        Ok(file) => {
            let mut reader = BufReader::new(file);
            if let Err(e) = reader.read_to_string(&mut source) {
                eprintln!("{}", LoxError::Io(e));
                std::process::exit(74);
            }
        }

        Err(e) => {
            eprintln!("{}", LoxError::Io(e));
            std::process::exit(74);
        }
    }

    info!("Executing {} ({} bytes)", path.display(), source.len());

    let mut interpreter = Interpreter::new();

    if let Err(errors) = lox::run(&source, &mut interpreter, &mut 0) {
        for error in &errors {
            eprintln!("{}", error);
        }

        std::process::exit(errors[0].exit_code());
    }

    Ok(())
}

fn run_prompt() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    let mut interpreter = Interpreter::new();
    let mut next_expr_id: u32 = 0;

    writeln!(stdout, "Welcome to the lox command prompt!").context("failed to write greeting")?;

    loop {
        write!(stdout, "lox > ").context("failed to write prompt")?;
        stdout.flush().context("failed to flush prompt")?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("failed to read from stdin")?;

        // EOF ends the session.
        if read == 0 {
            break;
        }

        if line.trim().is_empty() {
            continue;
        }

        // Diagnostics do not end the session.
        if let Err(errors) = lox::run(&line, &mut interpreter, &mut next_expr_id) {
            for error in &errors {
                eprintln!("{}", error);
            }
        }
    }

    writeln!(stdout, "Goodbye!").context("failed to write farewell")?;

    Ok(())
}
