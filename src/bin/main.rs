use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::{Path, PathBuf};

use stackjvm::codegen::reachability::CallGraph;
use stackjvm::{compile, compile_with_listing, load_program, write_class, Config, SyscallFallback};

#[derive(Parser)]
#[command(name = "stackjvm")]
#[command(about = "Stack IR to JVM bytecode compiler")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON IR program to a .class file
    Compile {
        /// Input IR file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory for the .class file
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Name of the generated class (defaults to the input file stem)
        #[arg(long, value_name = "NAME")]
        class_name: Option<String>,

        /// What to do with syscalls that are not emulated
        #[arg(long, value_name = "POLICY", default_value_t = SyscallFallback::Warn)]
        syscall_fallback: SyscallFallback,

        /// Print a bytecode listing of every method
        #[arg(long)]
        dump: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the procedures reachable from the entry point
    Reachable {
        /// Input IR file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Also show who calls each procedure
        #[arg(short, long)]
        callers: bool,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    env_logger::Builder::from_default_env().filter_level(level).format_timestamp(None).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { input, output, class_name, syscall_fallback, dump, verbose } => {
            init_logging(verbose);
            compile_file(&input, output.as_deref(), class_name, syscall_fallback, dump)?;
        }
        Commands::Reachable { input, callers } => {
            init_logging(false);
            list_reachable(&input, callers)?;
        }
    }

    Ok(())
}

fn compile_file(
    input: &Path,
    output: Option<&Path>,
    class_name: Option<String>,
    syscall_fallback: SyscallFallback,
    dump: bool,
) -> Result<()> {
    let program = load_program(input).with_context(|| format!("failed to load {}", input.display()))?;

    let class_name = class_name
        .or_else(|| input.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or_else(|| Config::default().class_name);
    let mut config = Config::new().with_class_name(class_name).with_syscall_fallback(syscall_fallback);
    if program.source_file().is_none() {
        if let Some(file) = input.file_name() {
            config = config.with_source_file(file.to_string_lossy());
        }
    }

    let compiled = if dump {
        compile_with_listing(&program, &config)
    } else {
        compile(&program, &config).map(|compilation| (compilation, String::new()))
    };
    let (compilation, text) = compiled.with_context(|| format!("failed to compile {}", input.display()))?;
    print!("{}", text);

    let output_dir = output.unwrap_or_else(|| Path::new("."));
    let path = write_class(&compilation, output_dir)
        .with_context(|| format!("failed to write {}.class", compilation.class_name))?;

    for diagnostic in &compilation.diagnostics {
        eprintln!("warning: {}", diagnostic);
    }
    log::info!("{} methods, {} bytes -> {}", compilation.methods.len(), compilation.bytes.len(), path.display());
    Ok(())
}

fn list_reachable(input: &Path, callers: bool) -> Result<()> {
    let program = load_program(input).with_context(|| format!("failed to load {}", input.display()))?;
    let graph = CallGraph::build(&program);
    for name in graph.reachable() {
        if callers {
            println!("{} <- {}", name, graph.callers_of(&name).join(", "));
        } else {
            println!("{}", name);
        }
    }
    Ok(())
}
