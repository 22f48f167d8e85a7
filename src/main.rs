//! Kiln CLI
//!
//! Command-line interface for the Kiln template engine.

use clap::{Parser, Subcommand};
use colored::*;
use kiln::interpreter::Interpreter;
use kiln::lexer::tokenize;
use kiln::{Config, Context, Environment, Value};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(version)]
#[command(about = "Kiln - a Jinja-compatible template engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Template file to render
    #[arg(value_name = "TEMPLATE")]
    file: Option<PathBuf>,

    /// Delimiter and newline settings (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level, overriding KILN_LOG
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive REPL
    Repl,
    /// Render a template file to stdout
    ///
    /// Examples:
    ///   kiln render page.html --data site.json
    ///   kiln render page.html --var title='"Home"' --var count=3
    Render {
        /// The template to render
        #[arg(value_name = "TEMPLATE")]
        file: PathBuf,

        /// JSON object used as the root context
        #[arg(long, value_name = "FILE")]
        data: Option<PathBuf>,

        /// Extra binding; the value is parsed as JSON, else taken as a string
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },
    /// Parse and display the AST
    Parse {
        /// The template to parse
        #[arg(value_name = "TEMPLATE")]
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Tokenize and display tokens
    Lex {
        /// The template to tokenize
        #[arg(value_name = "TEMPLATE")]
        file: PathBuf,
    },
    /// Check a template for syntax errors without rendering
    Check {
        /// The template to check
        #[arg(value_name = "TEMPLATE")]
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Some(Commands::Repl) => run_repl(config),
        Some(Commands::Render { file, data, vars }) => {
            render_file(config, &file, data.as_deref(), &vars)
        }
        Some(Commands::Parse { file, json }) => parse_file(config, &file, json),
        Some(Commands::Lex { file }) => lex_file(config, &file),
        Some(Commands::Check { file }) => check_file(config, &file),
        None => match cli.file {
            Some(file) => render_file(config, &file, None, &[]),
            None => run_repl(config),
        },
    });

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("KILN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => Ok(Config::default()),
    }
}

fn run_repl(config: Config) -> anyhow::Result<()> {
    println!("{}", format!("Kiln template REPL v{}", env!("CARGO_PKG_VERSION")).green().bold());
    println!("Type {} for help, {} to exit\n", ":help".cyan(), ":quit".cyan());

    let mut rl = DefaultEditor::new()?;
    let env = Environment::with_config(config);
    let mut context = Context::new();

    loop {
        let readline = rl.readline(&format!("{} ", "kiln>".blue().bold()));
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if line.starts_with(':') {
                    match line {
                        ":quit" | ":q" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        ":help" | ":h" => {
                            print_repl_help();
                            continue;
                        }
                        ":clear" => {
                            context.clear();
                            println!("Context cleared.");
                            continue;
                        }
                        ":env" => {
                            print_context(&context);
                            continue;
                        }
                        _ => {
                            println!("{}: Unknown command: {}", "Error".red(), line);
                            continue;
                        }
                    }
                }

                match evaluate(&env, &mut context, line) {
                    Ok(output) => {
                        if !output.is_empty() {
                            println!("{}", output.green());
                        }
                    }
                    Err(e) => {
                        println!("{}: {}", "Error".red(), e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    Ok(())
}

fn print_repl_help() {
    println!("{}", "\nREPL Commands:".yellow().bold());
    println!("  {}    - Show this help message", ":help, :h".cyan());
    println!("  {} - Exit the REPL", ":quit, :q, :exit".cyan());
    println!("  {}   - Forget every binding", ":clear".cyan());
    println!("  {}     - Show current bindings", ":env".cyan());
    println!();
    println!("{}", "Each line is rendered as a template:".yellow().bold());
    println!("  {}      - Bind a name for later lines", "{% set l = ['one', 'two'] %}".cyan());
    println!("  {}   - Mutate in place", "{{ l.append('three') }}{{ l }}".cyan());
    println!("  {}    - Index and slice", "{{ l[-1] }} {{ l[1:] }}".cyan());
    println!("  {}   - Filters", "{{ l | join(', ') | upper }}".cyan());
    println!();
}

fn print_context(context: &Context) {
    println!("Current bindings:");
    for (name, value) in context.visible() {
        match value {
            Value::Callable(function) => println!("  {} = <function {}>", name, function.name),
            other => println!("  {} = {}", name, other.render_element()),
        }
    }
}

/// Render one REPL line straight into the root scope so `set` persists
fn evaluate(env: &Environment, context: &mut Context, source: &str) -> anyhow::Result<String> {
    let template = env.parse("<repl>", source)?;
    let output = Interpreter::new(env).execute(&template.nodes, context)?;
    Ok(output)
}

fn render_file(
    config: Config,
    path: &Path,
    data: Option<&Path>,
    vars: &[String],
) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)?;
    let env = Environment::with_config(config);

    let mut context = match data {
        Some(data) => Context::from_json(serde_json::from_str(&fs::read_to_string(data)?)?)?,
        None => Context::new(),
    };
    for var in vars {
        let (name, raw) = var
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("--var expects KEY=VALUE, got '{}'", var))?;
        let value = serde_json::from_str::<serde_json::Value>(raw)
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(raw));
        context.set(name, value);
    }

    let template = env.parse(&path.display().to_string(), &source)?;
    print!("{}", env.render(&template, &mut context)?);
    Ok(())
}

fn parse_file(config: Config, path: &Path, json: bool) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)?;
    let template = Environment::with_config(config).parse(&path.display().to_string(), &source)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&template)?);
    } else {
        println!("{:#?}", template);
    }

    Ok(())
}

fn lex_file(config: Config, path: &Path) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)?;

    for token in tokenize(&source, &config)? {
        println!("{:?}", token);
    }

    Ok(())
}

fn check_file(config: Config, path: &Path) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)?;
    Environment::with_config(config).parse(&path.display().to_string(), &source)?;

    println!("{} No errors found in {}", "✓".green(), path.display());
    Ok(())
}
