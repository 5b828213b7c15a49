use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;

use brainc::clap_cli::{Cli, Target};
use brainc::compiler::compile;
use brainc::direct;
use brainc::emitter::binary::elf::{ElfArch, ElfBackend};
use brainc::emitter::binary::pe::{PeArch, PeBackend};
use brainc::emitter::c::CBackend;
use brainc::emitter::jit::JitBackend;
use brainc::emitter::{emit, xbyakc};
use brainc::error::ReportableError;
use brainc::interpreter::Interpreter;
use brainc::ir;
use brainc::source::SourceFile;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err.description());
            ExitCode::from(err.exit_code())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn run(cli: Cli) -> Result<(), TopLevelError> {
    let opt_level = resolve_opt_level(&cli)?;
    if cli.heap_size == 0 {
        return Err(TopLevelError::Cli(CliError::BadOption(
            "--heap-size must be non-zero".into(),
        )));
    }

    let source = load_source(&cli)?;

    if cli.print_trimmed {
        println!("{}", source.trimmed());
        return Ok(());
    }

    let trimmed = SourceFile::from_raw_parts(source.path().to_path_buf(), source.trimmed());
    let ir = compile(&trimmed).map_err(TopLevelError::Compile)?;

    if cli.dump_ir {
        print!("{}", ir::dump(&ir));
        return Ok(());
    }

    if let Some(target) = &cli.target {
        let target = Target::parse(target)
            .ok_or_else(|| TopLevelError::Cli(CliError::InvalidTarget(target.clone())))?;
        return emit_to_target(target, &ir, &cli);
    }

    run_program(opt_level, &trimmed, ir, cli.heap_size)
}

/// `-t` implies `-O 2`; an explicit `-O` other than 2 alongside `-t` is a
/// conflict (spec §7).
fn resolve_opt_level(cli: &Cli) -> Result<u8, TopLevelError> {
    let level = match (cli.opt_level, cli.target.as_ref()) {
        (Some(level), Some(_)) if level != 2 => {
            return Err(TopLevelError::Cli(CliError::BadOption(format!(
                "-O {level} conflicts with -t (which implies -O 2)"
            ))))
        }
        (Some(level), _) => level,
        (None, Some(_)) => 2,
        (None, None) => 1,
    };
    if level > 2 {
        return Err(TopLevelError::Cli(CliError::BadOption(format!(
            "-O {level} is not one of 0, 1, 2"
        ))));
    }
    Ok(level)
}

fn load_source(cli: &Cli) -> Result<SourceFile, TopLevelError> {
    if let Some(src) = &cli.inline_source {
        return Ok(SourceFile::from_raw_parts(
            PathBuf::from("<inline>"),
            src.clone(),
        ));
    }

    match cli.file_path.as_deref() {
        Some("-") | None => {
            let mut contents = String::new();
            io::stdin()
                .read_to_string(&mut contents)
                .map_err(|e| TopLevelError::Cli(CliError::Io(e)))?;
            Ok(SourceFile::from_raw_parts(PathBuf::from("<stdin>"), contents))
        }
        Some(path) => SourceFile::from_file(path).map_err(|e| {
            TopLevelError::Cli(CliError::Io(io::Error::new(io::ErrorKind::Other, e)))
        }),
    }
}

fn run_program(
    opt_level: u8,
    trimmed: &SourceFile,
    ir: Vec<ir::Ir>,
    heap_size: usize,
) -> Result<(), TopLevelError> {
    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    match opt_level {
        0 => direct::run(
            trimmed.contents().as_bytes(),
            heap_size,
            &mut io::stdin(),
            &mut stdout,
        )
        .map_err(|e| TopLevelError::Cli(CliError::Io(io::Error::new(io::ErrorKind::Other, e)))),
        2 => {
            let mut backend = JitBackend::new();
            emit(&ir, &mut backend).map_err(TopLevelError::Emit)?;
            let mut program = backend
                .finish(heap_size)
                .map_err(|e| TopLevelError::Cli(CliError::Io(e)))?;
            let mut stdin = io::stdin();
            program.run(&mut stdin, &mut stdout);
            stdout
                .write_all(b"\n")
                .and_then(|()| stdout.flush())
                .map_err(|e| TopLevelError::Cli(CliError::Io(e)))
        }
        _ => {
            let mut interp = Interpreter::builder(ir)
                .with_heap_size(heap_size)
                .build()
                .expect("compiler output is always balanced");
            interp.run().map_err(TopLevelError::Runtime)
        }
    }
}

fn emit_to_target(target: Target, ir: &[ir::Ir], cli: &Cli) -> Result<(), TopLevelError> {
    let out_path = cli
        .out_path
        .clone()
        .unwrap_or_else(|| format!("a.{}", target.default_extension()));

    match target {
        Target::C => {
            let mut file = File::create(&out_path).map_err(|e| TopLevelError::Cli(CliError::Io(e)))?;
            let mut backend = CBackend::new(&mut file, cli.heap_size);
            emit(ir, &mut backend).map_err(TopLevelError::Emit)
        }
        Target::XbyakC => {
            let mut backend = JitBackend::new();
            emit(ir, &mut backend).map_err(TopLevelError::Emit)?;
            let code = backend.assembled_bytes();
            let mut file = File::create(&out_path).map_err(|e| TopLevelError::Cli(CliError::Io(e)))?;
            xbyakc::write(&mut file, &code, cli.heap_size)
                .map_err(|e| TopLevelError::Cli(CliError::Io(e)))
        }
        Target::WinX86 | Target::WinX64 => {
            let arch = if target == Target::WinX86 { PeArch::X86 } else { PeArch::X64 };
            let mut backend = PeBackend::new(arch, cli.heap_size);
            emit(ir, &mut backend).map_err(TopLevelError::Emit)?;
            write_file(&out_path, &backend.finish())
        }
        Target::ElfX86 | Target::ElfX64 | Target::ElfArmEabi => {
            let arch = match target {
                Target::ElfX86 => ElfArch::X86,
                Target::ElfX64 => ElfArch::X64,
                _ => ElfArch::ArmEabi,
            };
            let mut backend = ElfBackend::new(arch, cli.heap_size);
            emit(ir, &mut backend).map_err(TopLevelError::Emit)?;
            write_file(&out_path, &backend.finish())
        }
    }
}

fn write_file(path: &str, bytes: &[u8]) -> Result<(), TopLevelError> {
    let mut file = File::create(path).map_err(|e| TopLevelError::Cli(CliError::Io(e)))?;
    file.write_all(bytes)
        .map_err(|e| TopLevelError::Cli(CliError::Io(e)))
}

/// CLI-level failure (spec §7): bad options, an unrecognized target, or an
/// I/O failure unrelated to compiling/running the program itself.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
    #[error("unrecognized emit target \"{0}\"")]
    InvalidTarget(String),
    #[error("bad option combination: {0}")]
    BadOption(String),
}

impl ReportableError for CliError {}

/// Every failure `main` can report, wrapping each stage's own error type.
#[derive(Debug, Error)]
enum TopLevelError {
    #[error(transparent)]
    Cli(#[from] CliError),
    #[error(transparent)]
    Compile(brainc::compiler::CompileError),
    #[error(transparent)]
    Runtime(brainc::interpreter::RuntimeError),
    #[error(transparent)]
    Emit(brainc::emitter::EmitError),
}

impl TopLevelError {
    fn exit_code(&self) -> u8 {
        match self {
            TopLevelError::Cli(CliError::InvalidTarget(_)) | TopLevelError::Cli(CliError::BadOption(_)) => 3,
            TopLevelError::Cli(CliError::Io(_)) => 2,
            TopLevelError::Compile(_) => 1,
            TopLevelError::Runtime(_) => 2,
            TopLevelError::Emit(_) => 2,
        }
    }
}

impl ReportableError for TopLevelError {
    fn lint(&self) -> Option<&brainc::error::Lint> {
        match self {
            TopLevelError::Compile(e) => e.lint(),
            TopLevelError::Runtime(_) => None,
            TopLevelError::Emit(_) => None,
            TopLevelError::Cli(e) => e.lint(),
        }
    }
}
