use clap::Parser;
use dirs::home_dir;
use log::{debug, info};
use nu_ansi_term::{Color, Style};
use reedline::{DefaultHinter, FileBackedHistory, Reedline, Signal};
use std::{
    fs, io,
    path::{Path, PathBuf},
    process::ExitCode,
};
use treelox::{
    check,
    cli::{Args, Commands},
    error::{Error, Result},
    repl::{REPLPrompt, REPLValidator, SyntaxHighlighter},
    Session,
};

const EXIT_DATA_ERROR: u8 = 65;
const EXIT_SOFTWARE_ERROR: u8 = 70;
const EXIT_IO_ERROR: u8 = 74;

fn report(diagnostics: &[Error]) -> ExitCode {
    for err in diagnostics {
        eprintln!("{}", err);
    }

    match diagnostics.first() {
        None => ExitCode::SUCCESS,
        Some(Error::IO(_)) => ExitCode::from(EXIT_IO_ERROR),
        Some(err) if err.is_runtime() => ExitCode::from(EXIT_SOFTWARE_ERROR),
        Some(_) => ExitCode::from(EXIT_DATA_ERROR),
    }
}

fn read_source(file: &Path) -> Result<String> {
    Ok(fs::read_to_string(file)?)
}

fn run_file(file: PathBuf) -> ExitCode {
    let source = match read_source(&file) {
        Ok(source) => source,
        Err(err) => return report(&[err]),
    };

    let mut session = Session::new(io::stdout());
    report(&session.run(&source))
}

fn check_file(file: PathBuf) -> ExitCode {
    let source = match read_source(&file) {
        Ok(source) => source,
        Err(err) => return report(&[err]),
    };

    report(&check(&source))
}

fn run_repl(isolated: bool) -> Result<()> {
    let mut line_editor = Reedline::create()
        .with_hinter(Box::new(
            DefaultHinter::default().with_style(Style::new().italic().fg(Color::LightGray)),
        ))
        .with_highlighter(Box::new(SyntaxHighlighter))
        .with_validator(Box::new(REPLValidator));

    // Add file-backed history if possible
    if let Some(history) = home_dir()
        .map(|home| home.join(".treelox_history"))
        .and_then(|path| FileBackedHistory::with_file(100, path).ok())
        .map(Box::new)
    {
        line_editor = line_editor.with_history(history);
    } else {
        eprintln!("NOTE: Failed to load history. Persistence is now disabled.")
    }

    let prompt = REPLPrompt;
    let mut session = Session::new(io::stdout());

    loop {
        match line_editor.read_line(&prompt)? {
            Signal::Success(buffer) => {
                if buffer.trim().is_empty() {
                    break Ok(());
                }

                if isolated {
                    debug!("fresh global scope");
                    session = Session::new(io::stdout());
                }

                for err in session.run(&buffer) {
                    eprintln!("{}", err);
                }
            }
            _ => {
                break Ok(());
            }
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Run { file } => {
            info!("FILE MODE");
            debug!("file: {:?}", file);

            run_file(file)
        }
        Commands::Check { file } => {
            info!("CHECK MODE");
            debug!("file: {:?}", file);

            check_file(file)
        }
        Commands::Repl { isolated } => {
            info!("REPL MODE");
            debug!("isolated: {}", isolated);

            match run_repl(isolated) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => report(&[err]),
            }
        }
    }
}
