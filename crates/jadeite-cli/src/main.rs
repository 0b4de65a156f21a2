mod render;

use clap::{Parser, Subcommand};
use jadeite_codegen::{CompileError, Compiler, Options};
use jadeite_lexer::{Lexer, Token, TokenKind};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use render::{FileCache, RenderError};

#[derive(Parser)]
#[command(name = "jadeite")]
#[command(about = "jadeite: indentation-based template compiler")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON file overriding the doctype, self-closing, construct and host tables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a template to markup
    Build {
        /// Input template file
        path: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Reuse compiled output stored here while it is newer than the source
        /// and the config. Entries are keyed by template and config file stem.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Check a template for errors without generating output
    Check {
        /// Input template file
        path: PathBuf,
    },

    /// Print the token stream of a template
    Tokens {
        /// Input template file
        path: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("{}: {source}", path.display())]
    Compile { path: PathBuf, source: CompileError },

    #[error("{}: {source}", path.display())]
    Lex {
        path: PathBuf,
        source: jadeite_lexer::LexError,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let options = match &cli.config {
        Some(path) => render::load_options(path)?,
        None => Options::default(),
    };
    let compiler = Compiler::with_builtins(options);

    match cli.command {
        Command::Build {
            path,
            out,
            cache_dir,
        } => cmd_build(
            &compiler,
            &path,
            out.as_deref(),
            cache_dir.as_deref(),
            cli.config.as_deref(),
        ),
        Command::Check { path } => cmd_check(&compiler, &path),
        Command::Tokens { path } => cmd_tokens(&path),
    }
}

fn compile(compiler: &Compiler, path: &Path) -> Result<String, CliError> {
    let source = render::load(path)?;
    compiler.compile(&source).map_err(|source| CliError::Compile {
        path: path.to_path_buf(),
        source,
    })
}

fn cmd_build(
    compiler: &Compiler,
    path: &Path,
    out: Option<&Path>,
    cache_dir: Option<&Path>,
    config: Option<&Path>,
) -> Result<(), CliError> {
    let cached = match (cache_dir, render::cache_key(path, config)) {
        (Some(dir), Some(key)) => Some((FileCache::new(dir), key)),
        _ => None,
    };

    let html = match &cached {
        Some((cache, key)) => {
            let mtime = render::newest_input(path, config)?;
            match cache.get_if_fresh(key, mtime)? {
                Some(html) => {
                    tracing::info!(key = %key, "using cached output");
                    html
                }
                None => {
                    let html = compile(compiler, path)?;
                    cache.put(key, &html)?;
                    html
                }
            }
        }
        None => compile(compiler, path)?,
    };

    match out {
        Some(out) => {
            render::write(out, &html)?;
            eprintln!("Built: {}", out.display());
        }
        None => println!("{html}"),
    }

    Ok(())
}

fn cmd_check(compiler: &Compiler, path: &Path) -> Result<(), CliError> {
    compile(compiler, path)?;
    eprintln!("OK: {}", path.display());
    Ok(())
}

fn cmd_tokens(path: &Path) -> Result<(), CliError> {
    let source = render::load(path)?;
    let tokens = Lexer::tokenize(&source).map_err(|source| CliError::Lex {
        path: path.to_path_buf(),
        source,
    })?;

    for token in &tokens {
        println!("{}", describe(token));
    }
    Ok(())
}

/// One line per token: line number, kind and payload.
fn describe(token: &Token) -> String {
    let payload = match &token.kind {
        TokenKind::Tag(value)
        | TokenKind::Id(value)
        | TokenKind::Class(value)
        | TokenKind::Filter(value)
        | TokenKind::Text(value) => format!("{value:?}"),
        TokenKind::Attributes { raw, .. } => format!("({raw})"),
        TokenKind::Doctype(version) => version.clone().unwrap_or_default(),
        TokenKind::Code { code, buffered } => {
            format!("{}{code:?}", if *buffered { "= " } else { "- " })
        }
        TokenKind::Comment { text, buffered } => {
            format!("{}{text:?}", if *buffered { "// " } else { "//- " })
        }
        TokenKind::Indent | TokenKind::Newline | TokenKind::Outdent | TokenKind::Eos => {
            String::new()
        }
    };

    format!("{:>4}  {:<10} {payload}", token.line, token.kind.name())
        .trim_end()
        .to_string()
}
