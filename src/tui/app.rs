//! Debugger application state and logic.

use crate::asm::{disassemble_instruction, Program};
use crate::bits::Byte;
use crate::cpu::{Architecture, ConfigError, Cpu, CpuError};
use crate::cpu::decode::INSTRUCTION_BYTES;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reference.
    pub program: Program,
    /// Load and start address.
    pub start: u64,
    /// Breakpoints (by byte address).
    pub breakpoints: HashSet<u64>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset.
    pub mem_scroll: u64,
    /// Bytes written by `OUT`, oldest first.
    pub output: Rc<RefCell<Vec<Byte>>>,
    /// Most recent reported error.
    pub last_error: Rc<RefCell<Option<String>>>,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Program, arch: Architecture, start: u64) -> Result<Self, ConfigError> {
        let mut cpu = Cpu::new(arch)?;

        let output = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&output);
        cpu.on_out(move |b| sink.borrow_mut().push(b.clone()));

        let last_error = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&last_error);
        cpu.on_error(move |e: &CpuError| *sink.borrow_mut() = Some(e.to_string()));

        let mut app = Self {
            cpu,
            program,
            start,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: String::new(),
            mem_scroll: 0,
            output,
            last_error,
        };
        app.reset();
        app.status = "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into();
        Ok(app)
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if self.cpu.is_halted() {
            self.status = format!("CPU halted after {} steps", self.cpu.steps());
            self.running = false;
            return;
        }

        let pc = self.cpu.pc().to_u64();
        self.last_error.borrow_mut().take();
        self.cpu.step();

        if let Some(err) = self.last_error.borrow().as_ref() {
            self.status = format!("Error at PC={:03}: {}", pc, err);
            self.running = false;
            return;
        }

        self.status = match self.cpu.last_instruction() {
            Some(instr) => format!("PC={:03}: {}", pc, instr),
            None => format!("PC={:03}: ???", pc),
        };
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        // Leave a breakpoint we are already sitting on.
        if self.breakpoints.contains(&self.cpu.pc().to_u64()) {
            self.step();
        }
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if self.cpu.is_halted() {
            self.running = false;
            self.status = format!("Halted after {} steps", self.cpu.steps());
            return;
        }

        if self.cpu.steps() >= self.cpu.step_limit() {
            self.running = false;
            self.status = format!("Paused: {} steps without HLT", self.cpu.steps());
            return;
        }

        // Check for breakpoint
        let pc = self.cpu.pc().to_u64();
        if self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={}", pc);
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.pc().to_u64();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={}", pc);
        }
    }

    /// Reset CPU and reload the program.
    pub fn reset(&mut self) {
        self.cpu.reset(true);
        self.cpu.load_program(self.program.bits(), self.start);
        self.cpu.regs.pc = Byte::from_u64(self.start, self.cpu.width());
        self.output.borrow_mut().clear();
        self.last_error.borrow_mut().take();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Get disassembly around current PC, one instruction per line.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u64, String, bool)> {
        let stride = INSTRUCTION_BYTES;
        let pc = self.cpu.pc().to_u64();
        let before = (lines as u64 / 2).min(pc / stride);
        let start = pc - before * stride;

        (0..lines as u64)
            .map(|i| start + i * stride)
            .take_while(|&addr| addr + stride <= self.cpu.ram.capacity())
            .map(|addr| {
                let bits: Vec<bool> = (addr..addr + stride)
                    .flat_map(|a| self.cell(a).into_bits())
                    .collect();
                let disasm = disassemble_instruction(&bits, self.cpu.width());
                (addr, disasm, addr == pc)
            })
            .collect()
    }

    /// RAM cell, zero when unreadable.
    pub fn cell(&self, addr: u64) -> Byte {
        self.cpu
            .ram
            .read_at(addr)
            .unwrap_or_else(|_| Byte::zero(self.cpu.width()))
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Program, arch: Architecture, start: u64) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    let mut app = DebuggerApp::new(program, arch, start)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Main loop
    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => {
                            app.mem_scroll = app.mem_scroll.saturating_sub(1);
                        }
                        KeyCode::Down => {
                            if app.mem_scroll + 1 < app.cpu.ram.capacity() {
                                app.mem_scroll += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
