mod test_runner;

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use retemplate::{Definition, DefinitionError};

const SUBCOMMANDS: &[&str] = &["build", "test", "help"];

#[derive(Parser)]
#[command(name = "retemplate", version, about = "Compose regular expressions from templates")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log engine activity to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a template definition file
    Build(BuildArgs),

    /// Run .retest files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct BuildArgs {
    /// TOML template definition file
    file: String,

    /// Template to compile (default: the file's entry, else the last template)
    #[arg(short, long)]
    entry: Option<String>,

    /// Print in /pattern/flags form
    #[arg(long)]
    delimited: bool,

    /// Also check that the result is accepted by the regex engine
    #[arg(long)]
    verify: bool,

    /// List unbound placeholder names instead of compiling
    #[arg(long)]
    unassigned: bool,

    /// List all template names in the file
    #[arg(long)]
    list: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .retest file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `retemplate file.toml` is shorthand for `retemplate build file.toml`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().skip(1).position(|a| !a.starts_with('-')) {
        let pos = pos + 1;
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "build".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_tracing(cli.verbose, cli.no_color);

    match cli.command {
        Command::Build(build_args) => do_build(build_args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_tracing(verbose: bool, no_color: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .init();
}

fn do_build(args: BuildArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let definition = match Definition::parse(&source, file_id) {
        Ok(d) => d,
        Err(errors) => {
            emit_definition_errors(color_choice, &files, &errors);
            process::exit(1);
        }
    };

    if args.list {
        for name in definition.names() {
            let unbound = definition.get(name).map(|t| t.unassigned_vars()).unwrap_or_default();
            if unbound.is_empty() {
                println!("{}", name);
            } else {
                println!("{} (unbound: {})", name, unbound.join(", "));
            }
        }
        return;
    }

    let Some(name) = args.entry.as_deref().or_else(|| definition.entry_name()) else {
        eprintln!("error: '{}' defines no templates", args.file);
        process::exit(1);
    };
    let Some(template) = definition.get(name) else {
        let known: Vec<&str> = definition.names().collect();
        eprintln!(
            "error: template '{}' is not defined (available: {})",
            name,
            known.join(", ")
        );
        process::exit(1);
    };

    if args.unassigned {
        for var in template.unassigned_vars() {
            println!("{}", var);
        }
        return;
    }

    let pattern = match template.compile() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: cannot compile '{}': {}", name, e);
            process::exit(1);
        }
    };

    if args.verify {
        if let Err(e) = pattern.to_regex() {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }

    if args.delimited {
        println!("{}", pattern);
    } else {
        println!("{}", pattern.as_str());
    }
}

fn emit_definition_errors(
    color_choice: ColorChoice,
    files: &SimpleFiles<String, String>,
    errors: &[DefinitionError],
) {
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    for error in errors {
        let diagnostic = error.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
    }
}
