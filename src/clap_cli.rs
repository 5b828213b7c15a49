//! The clap cli interface commands.

use clap::Parser;

/// Command-line surface (spec §6): compiles (and optionally runs or emits)
/// a Brainfuck program.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the source file. `-` reads from stdin. Ignored if `-e` is given.
    pub file_path: Option<String>,

    /// Treats SRC as inline Brainfuck source instead of reading a file.
    #[arg(short = 'e', long = "eval")]
    pub inline_source: Option<String>,

    /// Prints the trimmed source and exits.
    #[arg(short = 'm', long = "trim", default_value_t = false)]
    pub print_trimmed: bool,

    /// Optimization/execution level: 0 direct interpreter, 1 IR interpreter,
    /// 2 JIT. Defaults to 1, or to 2 when `-t` is given. Explicitly passing
    /// a level other than 2 together with `-t` is a `BadOption`.
    #[arg(short = 'O', long = "opt-level")]
    pub opt_level: Option<u8>,

    /// Emit to TARGET and exit instead of running the program.
    #[arg(short = 't', long = "target")]
    pub target: Option<String>,

    /// Output path for `-t`. Defaults to an extension chosen by target.
    #[arg(short = 'o', long = "out")]
    pub out_path: Option<String>,

    /// Prints IR opcodes, one per line, and exits.
    #[arg(long = "dump-ir", default_value_t = false)]
    pub dump_ir: bool,

    /// Tape size in bytes.
    #[arg(long = "heap-size", default_value_t = crate::interpreter::DEFAULT_HEAP_SIZE)]
    pub heap_size: usize,

    /// Raises the log level: -v info, -vv debug, -vvv trace.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// The targets recognized by `-t` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    C,
    XbyakC,
    WinX86,
    WinX64,
    ElfX86,
    ElfX64,
    ElfArmEabi,
}

impl Target {
    /// Parses a `-t` value, or `None` if `name` isn't recognized.
    pub fn parse(name: &str) -> Option<Target> {
        match name {
            "c" => Some(Target::C),
            "xbyakc" => Some(Target::XbyakC),
            "winx86" => Some(Target::WinX86),
            "winx64" => Some(Target::WinX64),
            "elfx86" => Some(Target::ElfX86),
            "elfx64" => Some(Target::ElfX64),
            "elfarmeabi" => Some(Target::ElfArmEabi),
            _ => None,
        }
    }

    /// The default output file extension for this target.
    pub fn default_extension(&self) -> &'static str {
        match self {
            Target::C | Target::XbyakC => "c",
            Target::WinX86 | Target::WinX64 => "exe",
            Target::ElfX86 | Target::ElfX64 | Target::ElfArmEabi => "out",
        }
    }
}
