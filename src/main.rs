//! bitcpu emulator - CLI Entry Point
//!
//! Commands:
//! - `bitcpu-emu run <program>` - Run an assembly (.asm) or image file
//! - `bitcpu-emu debug <program>` - Interactive debugger
//! - `bitcpu-emu asm <source>` - Assemble to a program image
//! - `bitcpu-emu disasm <image>` - Disassemble a program image

use bitcpu::asm::{self, Program};
use bitcpu::bits::{alu, bits_to_int, int_to_bits, Byte};
use bitcpu::cpu::{Architecture, Cpu, CpuError};
use clap::{Args, Parser, Subcommand};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bitcpu-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of a configurable-width educational binary computer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the .asm source or program image to execute
        program: PathBuf,
        /// Load and start address
        #[arg(short, long, default_value_t = 0)]
        start: u64,
        /// Maximum number of steps before the run is stopped
        #[arg(short, long)]
        max_steps: Option<u64>,
        /// Log every executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final CPU state as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        arch: ArchArgs,
    },
    /// Interactive debugger
    Debug {
        /// Path to the .asm source or program image to debug
        program: PathBuf,
        /// Load and start address
        #[arg(short, long, default_value_t = 0)]
        start: u64,
        #[command(flatten)]
        arch: ArchArgs,
    },
    /// Assemble source to a program image
    Asm {
        /// Path to the source file
        source: PathBuf,
        /// Output image file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Byte width in bits
        #[arg(long, default_value_t = 8)]
        bits: usize,
    },
    /// Disassemble a program image to readable text
    Disasm {
        /// Path to the image file
        image: PathBuf,
    },
    /// Run the built-in self-test
    Test,
}

/// Machine shape, from flags or a JSON file.
#[derive(Args, Clone, Debug)]
struct ArchArgs {
    /// Byte width in bits
    #[arg(long, default_value_t = 8)]
    bits: usize,
    /// Number of general-purpose registers
    #[arg(long, default_value_t = 4)]
    registers: u64,
    /// RAM size in bytes
    #[arg(long, default_value_t = 256)]
    ram: u64,
    /// JSON architecture file, e.g. {"bits":8,"register_count":4,"ram_bytes":256}
    #[arg(long)]
    arch: Option<PathBuf>,
}

impl ArchArgs {
    fn resolve(&self) -> Architecture {
        match &self.arch {
            Some(path) => {
                let text = read_file(path);
                serde_json::from_str(&text).unwrap_or_else(|e| {
                    fail(&format!("Invalid architecture file {}: {}", path.display(), e))
                })
            }
            None => Architecture::new(self.bits, self.registers, self.ram),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { program, start, max_steps, trace, json, arch }) => {
            init_logging(trace);
            run_program(&program, &arch.resolve(), start, max_steps, json);
        }
        Some(Commands::Debug { program, start, arch }) => {
            debug_program(&program, &arch.resolve(), start);
        }
        Some(Commands::Asm { source, output, bits }) => {
            init_logging(false);
            assemble_file(&source, output, bits);
        }
        Some(Commands::Disasm { image }) => {
            init_logging(false);
            disassemble_file(&image);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("bitcpu emulator v0.1.0");
            println!("A configurable-width binary computer emulator");
            println!();
            println!("Use --help for available commands");
            println!();
            demo();
        }
    }
}

/// `RUST_LOG` wins; otherwise warnings, or every step with `--trace`.
fn init_logging(trace: bool) {
    let default = if trace { "bitcpu=trace" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(message: &str) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

fn read_file(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail(&format!("Failed to read {}: {}", path.display(), e)))
}

/// Assemble a `.asm` file or load a program image.
fn load_program(path: &Path, bits: usize) -> Program {
    let program = if path.extension().is_some_and(|ext| ext == "asm") {
        let assembly = asm::assemble(&read_file(path), bits);
        if !assembly.is_ok() {
            for err in &assembly.errors {
                eprintln!("❌ {}", err);
            }
            fail(&format!("{} assembly error(s)", assembly.errors.len()));
        }
        println!("📝 Assembled {} instructions", assembly.program.len());
        assembly.program
    } else {
        let program = asm::load_image(path)
            .unwrap_or_else(|e| fail(&format!("Failed to load image: {}", e)));
        println!("📂 Loaded {} instructions", program.len());
        program
    };

    if program.width() != bits {
        fail(&format!(
            "Program is encoded for {}-bit bytes but the machine has {}-bit bytes",
            program.width(),
            bits
        ));
    }
    if program.is_empty() {
        fail("No instructions to execute");
    }
    program
}

fn run_program(path: &Path, arch: &Architecture, start: u64, max_steps: Option<u64>, json: bool) {
    let mut cpu = Cpu::new(*arch).unwrap_or_else(|e| fail(&e.to_string()));
    if let Some(limit) = max_steps {
        cpu.set_step_limit(limit);
    }

    println!("🔧 Running: {}", path.display());
    let program = load_program(path, arch.bits);

    let outputs = Rc::new(RefCell::new(0usize));
    let count = Rc::clone(&outputs);
    cpu.on_out(move |b: &Byte| {
        *count.borrow_mut() += 1;
        println!("OUT {} = {} ({})", b, b.to_u64(), b.to_i64());
    });
    cpu.on_error(|e: &CpuError| eprintln!("⚠️  {}", e));

    cpu.load_program(program.bits(), start);

    println!();
    println!("━━━ Execution ━━━");
    let result = cpu.run(start);

    println!();
    println!("━━━ Result ━━━");
    match &result {
        Ok(steps) => println!("Steps: {}", steps),
        Err(e) => println!("Stopped: {}", e),
    }
    println!("Outputs: {}", outputs.borrow());
    println!("State: {:?}", cpu.state());
    println!("PC: {} ({})", cpu.pc(), cpu.pc().to_u64());
    println!("Flags: {}", cpu.flags());
    for index in 0..cpu.registers.capacity() {
        if let Ok(value) = cpu.register(index) {
            println!("%{}: {} = {} ({})", index, value, value.to_u64(), value.to_i64());
        }
    }

    if json {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(&format!("Failed to serialize state: {}", e)),
        }
    }

    match result {
        Ok(_) => {}
        Err(CpuError::StepLimitExceeded(limit)) => {
            println!();
            println!("⚠️  Reached the step limit ({}). Use --max-steps to change it.", limit);
            std::process::exit(2);
        }
        Err(_) => std::process::exit(1),
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &Path, arch: &Architecture, start: u64) {
    use bitcpu::tui::run_debugger;

    println!("🔍 Loading: {}", path.display());
    let program = load_program(path, arch.bits);

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(program, *arch, start) {
        fail(&format!("Debugger error: {}", e));
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &Path, _arch: &Architecture, _start: u64) {
    fail("The debugger requires the `tui` feature");
}

fn assemble_file(source_path: &Path, output: Option<PathBuf>, bits: usize) {
    let out_path = output.unwrap_or_else(|| source_path.with_extension("img"));

    println!("📝 Assembling: {} → {}", source_path.display(), out_path.display());

    let assembly = asm::assemble(&read_file(source_path), bits);
    if !assembly.is_ok() {
        for err in &assembly.errors {
            eprintln!("❌ {}", err);
        }
        fail(&format!("{} assembly error(s)", assembly.errors.len()));
    }

    println!("✓ Assembled {} instructions", assembly.program.len());

    if let Err(e) = asm::save_image(&out_path, &assembly.program) {
        fail(&format!("Failed to save image: {}", e));
    }

    println!("✓ Saved to {}", out_path.display());
}

fn disassemble_file(image_path: &Path) {
    println!("📖 Disassembling: {}", image_path.display());
    println!();

    let program = asm::load_image(image_path)
        .unwrap_or_else(|e| fail(&format!("Failed to load image: {}", e)));

    println!("{}", asm::disassemble(&program));
}

fn demo() {
    println!("━━━ Two's Complement Demo (8-bit) ━━━");
    println!();

    for value in [42i64, -17, -128, 127] {
        println!("  {:>4} = {}", value, int_to_bits(value, 8));
    }
    println!();

    let a = int_to_bits(100, 8);
    let b = int_to_bits(-30, 8);
    let sum = alu::add(&a, &b);
    println!("Ripple-carry add:");
    println!("  {} + {} = {} (carry out: {})", a, b, sum.low_bits(8), sum.width() > 8);
    println!("  {} + {} = {}", bits_to_int(&a), bits_to_int(&b), bits_to_int(&sum.low_bits(8)));
    println!();

    println!("Program:");
    let source = "MOV %0, #6\nMOV %1, #7\nMUL %0, %1\nOUT %0\nHLT";
    for line in source.lines() {
        println!("  {}", line);
    }

    let Ok(mut cpu) = Cpu::new(Architecture::default()) else {
        return;
    };
    cpu.on_out(|b: &Byte| println!("  OUT {} = {}", b, b.to_i64()));
    cpu.load_source(source, 0);
    match cpu.run(0) {
        Ok(steps) => println!("  halted after {} steps", steps),
        Err(e) => println!("  {}", e),
    }
    println!();

    println!("✓ Emulator core working!");
}

fn run_self_test() {
    println!("━━━ bitcpu Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;
    let mut check = |name: &str, ok: bool| {
        print!("{}... ", name);
        if ok { println!("✓"); passed += 1; }
        else { println!("✗"); failed += 1; }
    };

    check(
        "Two's complement roundtrip",
        (-128..=127).all(|v| bits_to_int(&int_to_bits(v, 8)) == v),
    );

    check(
        "Double negation (mod 2^8)",
        (0..256u64).all(|v| {
            let x = Byte::from_u64(v, 8);
            alu::negate(&alu::negate(&x, 8).low_bits(8), 8).low_bits(8) == x
        }),
    );

    check(
        "Addition without carry",
        alu::add(&Byte::from_u64(100, 8), &Byte::from_u64(27, 8)) == Byte::from_u64(127, 8),
    );

    check(
        "Multiplication",
        alu::multiply(&Byte::from_u64(123, 8), &Byte::from_u64(45, 8)).to_u64() == 5535,
    );

    check("ADD program prints 8", scenario("MOV%#0,5\nMOV%#1,3\nADD%%0,1\nOUT%0\nHLT") == Some(vec![8]));
    check("MUL program prints 42", scenario("MOV%#0,6\nMOV%#1,7\nMUL%%0,1\nOUT%0\nHLT") == Some(vec![42]));

    let looped = Cpu::new(Architecture::default()).map(|mut cpu| {
        cpu.set_step_limit(1000);
        cpu.load_source("loop:\nNOP\nJMP loop", 0);
        cpu.run(0)
    });
    check(
        "Infinite loop detection",
        matches!(looped, Ok(Err(CpuError::StepLimitExceeded(1000)))),
    );

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}

/// Run `source` on the default machine and collect its `OUT` values.
fn scenario(source: &str) -> Option<Vec<u64>> {
    let mut cpu = Cpu::new(Architecture::default()).ok()?;
    let out = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&out);
    cpu.on_out(move |b: &Byte| sink.borrow_mut().push(b.to_u64()));
    cpu.load_source(source, 0);
    cpu.run(0).ok()?;
    let values = out.borrow().clone();
    Some(values)
}
