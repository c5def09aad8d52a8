use std::fs;
use std::path::{Path, PathBuf};

use arith_interpreter::{Error, Interpreter, Lexer, Parser as ExprParser};
use clap::Parser;
use clap::Subcommand;
use miette::IntoDiagnostic;
use miette::WrapErr;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Evaluates programs of integer assignments")]
struct Args {
    /// Raise the default log level (-v debug, -vv trace). `RUST_LOG` wins if set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the tokens of an expression file.
    Tokenize { filename: PathBuf },
    /// Print the tree of a single expression file.
    Parse { filename: PathBuf },
    /// Run a program file and print every binding.
    Run { filename: PathBuf },
    /// Run a program given on the command line.
    Eval { program: String },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read(filename: &Path) -> miette::Result<String> {
    fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading `{}` failed", filename.display()))
}

fn run(filename: Option<&str>, program: &str) -> ! {
    match Interpreter::new(filename, program).run() {
        Ok(environment) => {
            print!("{environment}");
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            eprintln!("processing failed");
            std::process::exit(65);
        }
    }
}

fn main() -> miette::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Tokenize { filename } => {
            let file_contents = read(&filename)?;

            for token in Lexer::new(filename.to_str(), &file_contents) {
                let token = match token {
                    Ok(token) => token,
                    Err(e) => {
                        if let Error::UnexpectedCharacter(inner) = &e {
                            eprintln!(
                                "[line {}] Error: Unexpected character: {}",
                                inner.line(),
                                inner.token
                            );
                        }
                        eprintln!("{:?}", miette::Report::new(e));
                        std::process::exit(65);
                    }
                };
                println!("{token}");
            }
            println!("EOF  null");
        }
        Commands::Parse { filename } => {
            let file_contents = read(&filename)?;

            match ExprParser::new(filename.to_str(), &file_contents).parse() {
                Ok(tree) => println!("{tree}"),
                Err(e) => {
                    eprintln!("{:?}", miette::Report::new(e));
                    std::process::exit(65);
                }
            }
        }
        Commands::Run { filename } => {
            let file_contents = read(&filename)?;
            run(filename.to_str(), &file_contents);
        }
        Commands::Eval { program } => run(None, &program),
    }
    Ok(())
}
