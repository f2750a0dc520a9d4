//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.
//! Run-time errors (bad addresses, unknown opcodes) are reported on the
//! error channel and execution carries on: bad reads yield zero and bad
//! writes are dropped. Only `HLT` and the step limit stop [`Cpu::run`].

use crate::asm::{self, Program};
use crate::bits::{alu, necessary_bit_count, Byte};
use crate::cpu::config::{Architecture, ConfigError};
use crate::cpu::decode::{self, Instruction, Mode, Opcode, Operation, INSTRUCTION_BYTES};
use crate::cpu::events::Listeners;
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{Flags, Registers};
use crate::asm::AssemblerError;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Default bound on the number of steps one [`Cpu::run`] may take.
pub const STEP_LIMIT: u64 = 100_000;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Constructed or reset, not started.
    Idle,
    /// Inside [`Cpu::run`].
    Running,
    /// Executed `HLT` or hit the step limit.
    Halted,
}

/// The emulated processor.
pub struct Cpu {
    arch: Architecture,
    /// Special-purpose registers: PC, IR and flags.
    pub regs: Registers,
    /// Main memory.
    pub ram: Memory,
    /// General-purpose register file.
    pub registers: Memory,
    state: CpuState,
    /// Instructions executed since construction or the last reset.
    steps: u64,
    step_limit: u64,
    last_instr: Option<Instruction>,
    listeners: Listeners,
}

impl Cpu {
    /// Create a CPU with zeroed state.
    pub fn new(arch: Architecture) -> Result<Self, ConfigError> {
        arch.validate()?;
        Ok(Self::build(arch))
    }

    fn build(arch: Architecture) -> Self {
        Self {
            arch,
            regs: Registers::new(arch.bits),
            ram: Memory::new("RAM", arch.bits, arch.ram_bytes),
            registers: Memory::new("register", arch.bits, arch.register_count),
            state: CpuState::Idle,
            steps: 0,
            step_limit: STEP_LIMIT,
            last_instr: None,
            listeners: Listeners::default(),
        }
    }

    /// Reset registers, flags, PC, IR and state. RAM is cleared only when
    /// `clear_ram` is set.
    pub fn reset(&mut self, clear_ram: bool) {
        self.registers.clear();
        if clear_ram {
            self.ram.clear();
        }
        self.regs.reset();
        self.state = CpuState::Idle;
        self.steps = 0;
        self.last_instr = None;

        debug!(clear_ram, "reset");
        self.listeners.emit_reset();
    }

    // ========================================================================
    // Programs
    // ========================================================================

    /// Assemble `source` for this CPU's byte width.
    ///
    /// Every assembler error is reported on the error channel.
    pub fn compile(&mut self, source: &str) -> Program {
        let assembly = asm::assemble(source, self.width());
        for err in assembly.errors {
            self.report(CpuError::Assembler(err));
        }
        assembly.program
    }

    /// Write `bits` into RAM in `W`-bit chunks starting at `address`.
    ///
    /// The address advances through the ALU, so a program that runs past
    /// the top of the address space reports address errors.
    pub fn load_program(&mut self, bits: &[bool], address: u64) {
        let width = self.width();
        let Some(mut addr) = self.address(address) else {
            return;
        };

        debug!(address, bytes = bits.len().div_ceil(width), "loading program");

        for chunk in bits.chunks(width) {
            self.write_ram(&addr, &Byte::from_slice(chunk));
            addr = alu::increment(&addr);
        }
    }

    /// Compile `source` and load it at `address`.
    pub fn load_source(&mut self, source: &str, address: u64) -> Program {
        let program = self.compile(source);
        self.load_program(program.bits(), address);
        program
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Run from `start` until `HLT` or the step limit.
    ///
    /// Returns the number of steps taken.
    pub fn run(&mut self, start: u64) -> Result<u64, CpuError> {
        let Some(pc) = self.address(start) else {
            return Err(CpuError::Memory(self.address_error(start)));
        };

        self.regs.pc = pc;
        self.state = CpuState::Running;
        debug!(start, limit = self.step_limit, "run");
        self.listeners.emit_run();

        let mut steps = 0;
        while self.state == CpuState::Running {
            self.step();
            steps += 1;

            if self.state == CpuState::Running && steps > self.step_limit {
                let err = CpuError::StepLimitExceeded(self.step_limit);
                self.report(err.clone());
                self.state = CpuState::Halted;
                return Err(err);
            }
        }

        debug!(steps, "halted");
        Ok(steps)
    }

    /// Execute the instruction at PC.
    ///
    /// Returns the opcode executed, or `None` if IR held an unknown opcode.
    pub fn step(&mut self) -> Option<Opcode> {
        // Fetch
        let pc = self.regs.pc.clone();
        self.regs.ir = self.read_ram(&pc);
        self.steps += 1;

        // Decode
        let opcode = match decode::decode_opcode(&self.regs.ir) {
            Ok(opcode) => opcode,
            Err(_) => {
                self.report(CpuError::UnknownOpcode {
                    opcode: self.regs.ir.to_u64(),
                    pc: pc.to_u64(),
                });
                self.advance(&pc);
                self.listeners.emit_step(&self.regs.pc);
                return None;
            }
        };
        let instr = self.fetch_operands(opcode, &pc);
        trace!(pc = pc.to_u64(), flags = %self.regs.flags, "{}", instr);

        // Execute
        if self.execute(&instr) {
            self.advance(&pc);
        }

        self.last_instr = Some(instr);
        self.listeners.emit_step(&self.regs.pc);
        Some(opcode)
    }

    /// Read the operand bytes that follow the opcode.
    fn fetch_operands(&mut self, opcode: Opcode, pc: &Byte) -> Instruction {
        let mut instr = Instruction::bare(opcode, self.width());
        let mut addr = pc.clone();

        for operand in instr.operands.iter_mut().take(opcode.modes().len()) {
            addr = alu::increment(&addr);
            *operand = self.read_ram(&addr);
        }

        instr
    }

    /// Execute a decoded instruction. Returns `true` if PC should move on
    /// to the next instruction.
    fn execute(&mut self, instr: &Instruction) -> bool {
        let [a, b] = &instr.operands;
        let modes = instr.opcode.modes();

        match instr.opcode.operation() {
            Operation::Halt => {
                self.state = CpuState::Halted;
                return false;
            }

            Operation::Nop => {}

            Operation::Move => {
                let value = self.operand(modes[1], b);
                self.store(modes[0], a, &value);
            }

            Operation::Out => {
                let value = self.operand(modes[0], a);
                debug!(value = %value, "out");
                self.listeners.emit_out(&value);
            }

            // ==================== Arithmetic ====================

            Operation::Add => {
                let lhs = self.read_register(a);
                let rhs = self.operand(modes[1], b);
                let result = self.regs.flags.update(&alu::add(&lhs, &rhs), self.width());
                self.write_register(a, &result);
            }

            Operation::Sub => {
                let lhs = self.read_register(a);
                let rhs = self.operand(modes[1], b);
                let result = self.subtract(&lhs, &rhs);
                self.write_register(a, &result);
            }

            Operation::Mul => {
                let lhs = self.read_register(a);
                let rhs = self.operand(modes[1], b);
                let result = self.multiply(&lhs, &rhs);
                self.write_register(a, &result);
            }

            Operation::Inc => {
                let value = self.read_register(a);
                let result = self.regs.flags.update(&alu::increment(&value), self.width());
                self.write_register(a, &result);
            }

            Operation::Dec => {
                let value = self.read_register(a);
                let result = self.subtract(&value, &Byte::one());
                self.write_register(a, &result);
            }

            Operation::Cmp => {
                let lhs = self.read_register(a);
                let rhs = self.operand(modes[1], b);
                self.subtract(&lhs, &rhs);
            }

            // ==================== Control Flow ====================

            Operation::Jump(condition) => {
                if !condition.holds(&self.regs.flags) {
                    return true;
                }
                match modes[0] {
                    Mode::Relative => self.jump_relative(a),
                    _ => self.regs.jump(a),
                }
                return false;
            }
        }

        true
    }

    /// Resolve an operand to the value it names.
    fn operand(&mut self, mode: Mode, operand: &Byte) -> Byte {
        match mode {
            Mode::Register => self.read_register(operand),
            Mode::Direct => self.read_ram(operand),
            Mode::Immediate | Mode::Relative => operand.clone(),
        }
    }

    /// Write to a `%` or `@` destination.
    fn store(&mut self, mode: Mode, target: &Byte, value: &Byte) {
        match mode {
            Mode::Direct => self.write_ram(target, value),
            _ => self.write_register(target, value),
        }
    }

    // ========================================================================
    // ALU with flags
    // ========================================================================

    fn subtract(&mut self, a: &Byte, b: &Byte) -> Byte {
        let width = self.width();
        self.regs.flags.update(&alu::subtract(a, b, width), width)
    }

    /// Signed multiply keeping the low `W` bits.
    ///
    /// ZERO means either operand was zero. CARRY means the magnitude product
    /// does not fit in `W` bits.
    fn multiply(&mut self, a: &Byte, b: &Byte) -> Byte {
        let width = self.width();
        let negative = a.msb() != b.msb();

        // Make the negative operand positive when the signs differ.
        let (a, b) = match (negative, a.msb()) {
            (true, true) => (alu::negate(a, width).low_bits(width), b.clone()),
            (true, false) => (a.clone(), alu::negate(b, width).low_bits(width)),
            _ => (a.clone(), b.clone()),
        };

        let product = alu::multiply(&a, &b);
        let flags = &mut self.regs.flags;
        flags.zero = a.is_zero() || b.is_zero();
        flags.carry = product.exceeds(width);

        let product = if negative { alu::negate(&product, width) } else { product };
        let result = product.low_bits(width);
        flags.sign = result.msb();
        result
    }

    // ========================================================================
    // PC arithmetic
    // ========================================================================

    /// Move PC past the instruction at `pc`, wrapping at `2^W`.
    fn advance(&mut self, pc: &Byte) {
        let stride = Byte::from_u64(INSTRUCTION_BYTES, 2);
        self.regs.jump(&alu::add(pc, &stride));
    }

    /// PC += 3 * displacement, wrapping at `2^W`.
    fn jump_relative(&mut self, displacement: &Byte) {
        let stride = Byte::from_u64(INSTRUCTION_BYTES, 2);
        let offset = alu::multiply(displacement, &stride).low_bits(self.width());
        let target = alu::add(&self.regs.pc, &offset);
        self.regs.jump(&target);
    }

    // ========================================================================
    // Reporting memory access
    // ========================================================================

    fn read_ram(&mut self, addr: &Byte) -> Byte {
        match self.ram.read(addr) {
            Ok(value) => value,
            Err(err) => {
                self.report(err.into());
                Byte::zero(self.width())
            }
        }
    }

    fn write_ram(&mut self, addr: &Byte, value: &Byte) {
        if let Err(err) = self.ram.write(addr, value) {
            self.report(err.into());
        }
    }

    fn read_register(&mut self, index: &Byte) -> Byte {
        match self.registers.read(index) {
            Ok(value) => value,
            Err(err) => {
                self.report(err.into());
                Byte::zero(self.width())
            }
        }
    }

    fn write_register(&mut self, index: &Byte, value: &Byte) {
        if let Err(err) = self.registers.write(index, value) {
            self.report(err.into());
        }
    }

    /// `address` as a `W`-bit byte, reporting it if it does not fit.
    fn address(&mut self, address: u64) -> Option<Byte> {
        if necessary_bit_count(address) > self.width() {
            let err = self.address_error(address);
            self.report(err.into());
            return None;
        }
        Some(Byte::from_u64(address, self.width()))
    }

    fn address_error(&self, address: u64) -> MemoryError {
        MemoryError::AddressTooWide {
            memory: self.ram.name().to_string(),
            address: address.to_string(),
        }
    }

    fn report(&mut self, err: CpuError) {
        warn!("{}", err);
        self.listeners.emit_error(&err);
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Called when [`Cpu::run`] starts.
    pub fn on_run(&mut self, f: impl FnMut() + 'static) {
        self.listeners.set_run(f);
    }

    /// Called after every step with the new PC.
    pub fn on_step(&mut self, f: impl FnMut(&Byte) + 'static) {
        self.listeners.set_step(f);
    }

    pub fn on_reset(&mut self, f: impl FnMut() + 'static) {
        self.listeners.set_reset(f);
    }

    /// Called for every reported error.
    pub fn on_error(&mut self, f: impl FnMut(&CpuError) + 'static) {
        self.listeners.set_error(f);
    }

    /// Called with the byte of every `OUT`.
    pub fn on_out(&mut self, f: impl FnMut(&Byte) + 'static) {
        self.listeners.set_out(f);
    }

    /// Remove every listener.
    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn arch(&self) -> Architecture {
        self.arch
    }

    /// Byte width `W`.
    pub fn width(&self) -> usize {
        self.arch.bits
    }

    pub fn pc(&self) -> &Byte {
        &self.regs.pc
    }

    pub fn ir(&self) -> &Byte {
        &self.regs.ir
    }

    pub fn flags(&self) -> Flags {
        self.regs.flags
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Steps executed since construction or the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn step_limit(&self) -> u64 {
        self.step_limit
    }

    /// Change the bound on steps per [`Cpu::run`].
    pub fn set_step_limit(&mut self, limit: u64) {
        self.step_limit = limit;
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.last_instr.as_ref()
    }

    /// Read a general-purpose register.
    pub fn register(&self, index: u64) -> Result<Byte, MemoryError> {
        self.registers.read_at(index)
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Serializable view of the current state.
    pub fn snapshot(&self) -> CpuSnapshot {
        let cell = |(index, value): (u64, Byte)| CellSnapshot {
            index,
            bits: value.to_string(),
            unsigned: value.to_u64(),
            signed: value.to_i64(),
        };

        CpuSnapshot {
            arch: self.arch,
            pc: self.regs.pc.to_u64(),
            ir: self.regs.ir.to_u64(),
            flags: self.regs.flags,
            state: self.state,
            steps: self.steps,
            registers: self
                .registers
                .dump()
                .into_iter()
                .filter(|(_, v)| !v.is_zero())
                .map(cell)
                .collect(),
        }
    }
}

impl Default for Cpu {
    /// A CPU with the default 8-bit architecture.
    fn default() -> Self {
        Self::build(Architecture::default())
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("arch", &self.arch)
            .field("state", &self.state)
            .field("steps", &self.steps)
            .field("regs", &self.regs)
            .field("listeners", &self.listeners)
            .finish()
    }
}

/// Serializable CPU state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub arch: Architecture,
    pub pc: u64,
    pub ir: u64,
    pub flags: Flags,
    pub state: CpuState,
    pub steps: u64,
    /// Registers holding a non-zero value.
    pub registers: Vec<CellSnapshot>,
}

/// One memory cell in a [`CpuSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub index: u64,
    pub bits: String,
    pub unsigned: u64,
    pub signed: i64,
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("unknown opcode {opcode} at address {pc}")]
    UnknownOpcode { opcode: u64, pc: u64 },

    #[error("infinite loop detected: step limit of {0} exceeded")]
    StepLimitExceeded(u64),

    #[error("assembler error: {0}")]
    Assembler(#[from] AssemblerError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::int_to_bits;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tracing_test::traced_test;

    fn cpu() -> Cpu {
        Cpu::new(Architecture::default()).unwrap()
    }

    /// Attach an `OUT` collector.
    fn outputs(cpu: &mut Cpu) -> Rc<RefCell<Vec<Byte>>> {
        let out = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&out);
        cpu.on_out(move |b| sink.borrow_mut().push(b.clone()));
        out
    }

    fn errors(cpu: &mut Cpu) -> Rc<RefCell<Vec<CpuError>>> {
        let errs = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errs);
        cpu.on_error(move |e| sink.borrow_mut().push(e.clone()));
        errs
    }

    fn reg(cpu: &Cpu, index: u64) -> Byte {
        cpu.register(index).unwrap()
    }

    #[test]
    fn test_invalid_architecture() {
        assert_eq!(
            Cpu::new(Architecture::new(0, 4, 256)).unwrap_err(),
            ConfigError::InvalidByteWidth(0)
        );
        assert_eq!(
            Cpu::new(Architecture::new(8, 0, 256)).unwrap_err(),
            ConfigError::NoRegisters
        );
    }

    #[test]
    #[traced_test]
    fn test_add_scenario() {
        let mut cpu = cpu();
        let out = outputs(&mut cpu);
        cpu.load_source("MOV%#0,5\nMOV%#1,3\nADD%%0,1\nOUT%0\nHLT", 0);

        let steps = cpu.run(0).unwrap();

        assert_eq!(*out.borrow(), vec![Byte::from_u64(8, 8)]);
        assert_eq!(steps, 5);
        assert!(cpu.is_halted());
        assert!(!cpu.flags().carry);
        assert!(logs_contain("run"));
    }

    #[test]
    #[traced_test]
    fn test_mul_scenario() {
        let mut cpu = cpu();
        let out = outputs(&mut cpu);
        cpu.load_source("MOV%#0,6\nMOV%#1,7\nMUL%%0,1\nOUT%0\nHLT", 0);

        cpu.run(0).unwrap();

        assert_eq!(*out.borrow(), vec![Byte::from_u64(42, 8)]);
        assert!(!cpu.flags().zero);
        assert!(!cpu.flags().carry);
    }

    #[test]
    #[traced_test]
    fn test_cmp_jeq_scenario() {
        let mut cpu = cpu();
        cpu.load_source("MOV%#0,5\nMOV%#1,5\nCMP%%0,1\nJEQ!2\nMOV%#2,9\nHLT", 0);

        let steps = cpu.run(0).unwrap();

        assert!(reg(&cpu, 2).is_zero());
        assert!(cpu.flags().zero);
        assert_eq!(steps, 5);
        // CMP leaves its operands untouched.
        assert_eq!(reg(&cpu, 0).to_u64(), 5);
    }

    #[test]
    #[traced_test]
    fn test_backward_jump_hits_step_limit() {
        let mut cpu = cpu();
        let errs = errors(&mut cpu);
        cpu.set_step_limit(500);
        cpu.load_source("loop:\nNOP\nJMP loop", 0);

        let result = cpu.run(0);

        assert_eq!(result, Err(CpuError::StepLimitExceeded(500)));
        assert!(cpu.is_halted());
        assert_eq!(*errs.borrow(), vec![CpuError::StepLimitExceeded(500)]);
        assert!(logs_contain("infinite loop detected"));
    }

    #[test]
    fn test_default_step_limit() {
        let mut cpu = cpu();
        cpu.load_source("JMP !0", 0);
        assert_eq!(cpu.run(0), Err(CpuError::StepLimitExceeded(STEP_LIMIT)));
        assert_eq!(cpu.steps(), STEP_LIMIT + 1);
    }

    #[test]
    fn test_mov_variants() {
        let mut cpu = cpu();
        let source = r#"
            MOV %0, #7      ; reg0 = 7
            MOV @100, #9    ; RAM[100] = 9
            MOV %1, @100    ; reg1 = 9
            MOV @101, %0    ; RAM[101] = 7
            MOV %2, %1      ; reg2 = 9
            HLT
        "#;
        cpu.load_source(source, 0);
        cpu.run(0).unwrap();

        assert_eq!(reg(&cpu, 0).to_u64(), 7);
        assert_eq!(reg(&cpu, 1).to_u64(), 9);
        assert_eq!(reg(&cpu, 2).to_u64(), 9);
        assert_eq!(cpu.ram.read_at(100).unwrap().to_u64(), 9);
        assert_eq!(cpu.ram.read_at(101).unwrap().to_u64(), 7);
    }

    #[test]
    fn test_add_carry_flags() {
        let mut cpu = cpu();
        cpu.load_source("MOV %0, #200\nADD %0, #56\nHLT", 0);
        cpu.run(0).unwrap();

        assert!(reg(&cpu, 0).is_zero());
        assert_eq!(cpu.flags(), Flags { carry: true, zero: true, sign: false });
    }

    #[test]
    fn test_sub_negative_result() {
        let mut cpu = cpu();
        cpu.ram.write_at(50, &Byte::from_u64(5, 8)).unwrap();
        cpu.load_source("MOV %0, #3\nSUB %0, @50\nHLT", 0);
        cpu.run(0).unwrap();

        assert_eq!(reg(&cpu, 0).to_i64(), -2);
        assert!(cpu.flags().sign);
        assert!(!cpu.flags().carry);
    }

    #[test]
    fn test_inc_dec() {
        let mut cpu = cpu();
        cpu.load_source("MOV %0, #255\nINC %0\nMOV %1, #0\nDEC %1\nHLT", 0);

        cpu.run(0).unwrap();

        assert!(reg(&cpu, 0).is_zero());
        assert_eq!(reg(&cpu, 1).to_i64(), -1);
        assert!(cpu.flags().sign);
    }

    #[test]
    fn test_signed_multiply() {
        let cases = [(-6i64, 7i64, -42i64), (6, -7, -42), (-6, -7, 42), (0, -7, 0)];
        for (a, b, expected) in cases {
            let mut cpu = cpu();
            cpu.load_source(&format!("MOV %0, #{}\nMUL %0, #{}\nHLT", a, b), 0);
            cpu.run(0).unwrap();

            assert_eq!(reg(&cpu, 0).to_i64(), expected, "{} * {}", a, b);
            assert_eq!(cpu.flags().zero, a == 0 || b == 0);
            assert_eq!(cpu.flags().sign, expected < 0);
        }
    }

    #[test]
    fn test_multiply_overflow_sets_carry() {
        let mut cpu = cpu();
        cpu.load_source("MOV %0, #20\nMUL %0, #20\nHLT", 0);
        cpu.run(0).unwrap();

        assert_eq!(reg(&cpu, 0).to_u64(), 400 % 256);
        assert!(cpu.flags().carry);
    }

    #[test]
    fn test_countdown_loop() {
        let mut cpu = cpu();
        let out = outputs(&mut cpu);
        let source = r#"
            MOV %0, #3
        top:
            OUT %0
            DEC %0
            JNZ top
            HLT
        "#;
        cpu.load_source(source, 0);
        cpu.run(0).unwrap();

        let values: Vec<u64> = out.borrow().iter().map(Byte::to_u64).collect();
        assert_eq!(values, vec![3, 2, 1]);
    }

    #[test]
    fn test_absolute_jump() {
        let mut cpu = cpu();
        cpu.load_source("JMP %9\nMOV %0, #1\nMOV %0, #2\nMOV %1, #3\nHLT", 0);
        cpu.run(0).unwrap();

        assert!(reg(&cpu, 0).is_zero());
        assert_eq!(reg(&cpu, 1).to_u64(), 3);
    }

    #[test]
    fn test_conditional_jumps() {
        // (setup, jump, taken)
        let cases = [
            ("MOV %0, #255\nADD %0, #1", "JC", true),
            ("MOV %0, #1\nADD %0, #1", "JC", false),
            ("MOV %0, #1\nADD %0, #1", "JNC", true),
            ("CMP %0, #0", "JZ", true),
            ("CMP %0, #0", "JNZ", false),
            ("MOV %0, #1\nCMP %0, #0", "JNE", true),
            ("MOV %0, #1\nCMP %0, #2", "JLSS", true),
            ("MOV %0, #1\nCMP %0, #2", "JGTR", false),
            ("MOV %0, #3\nCMP %0, #2", "JGTR", true),
            ("MOV %0, #3\nCMP %0, #2", "JNGTR", false),
        ];

        for (setup, jump, taken) in cases {
            let mut cpu = cpu();
            let source = format!("{}\n{} skip\nMOV %3, #1\nskip:\nHLT", setup, jump);
            cpu.load_source(&source, 0);
            cpu.run(0).unwrap();

            assert_eq!(reg(&cpu, 3).is_zero(), taken, "{} after {:?}", jump, setup);
        }
    }

    #[test]
    fn test_absolute_conditional_jumps() {
        // (setup, jump, taken)
        let cases = [
            ("MOV %0, #255\nADD %0, #1", "JC", true),
            ("MOV %0, #1\nADD %0, #1", "JC", false),
            ("CMP %0, #0", "JZ", true),
            ("MOV %0, #1\nCMP %0, #0", "JZ", false),
            ("CMP %0, #0", "JNZ", false),
            ("MOV %0, #1\nCMP %0, #0", "JNZ", true),
            ("MOV %0, #3\nCMP %0, #2", "JGTR", true),
            ("MOV %0, #1\nCMP %0, #2", "JGTR", false),
            ("MOV %0, #1\nCMP %0, #2", "JLSS", true),
            ("MOV %0, #3\nCMP %0, #2", "JLSS", false),
        ];

        for (setup, jump, taken) in cases {
            let mut cpu = cpu();
            // The HLT sits two instructions past the jump.
            let halt = (setup.lines().count() as u64 + 2) * INSTRUCTION_BYTES;
            let source = format!("{}\n{} %{}\nMOV %3, #1\nHLT", setup, jump, halt);
            cpu.load_source(&source, 0);
            cpu.run(0).unwrap();

            assert_eq!(reg(&cpu, 3).is_zero(), taken, "{} after {:?}", jump, setup);
            assert_eq!(cpu.pc().to_u64(), halt);
        }
    }

    #[traced_test]
    #[test]
    fn test_memory_operands() {
        let mut cpu = cpu();
        let out = outputs(&mut cpu);
        let source = r#"
            MOV @100, #6
            MOV %0, #7
            MUL %0, @100    ; 42
            ADD %0, @100    ; 48
            OUT @100
            OUT %0
            CMP %0, @100
            HLT
        "#;
        cpu.load_source(source, 0);
        cpu.run(0).unwrap();

        let values: Vec<u64> = out.borrow().iter().map(Byte::to_u64).collect();
        assert_eq!(values, vec![6, 48]);
        assert_eq!(reg(&cpu, 0).to_u64(), 48);
        assert_eq!(cpu.ram.read_at(100).unwrap().to_u64(), 6);

        let flags = cpu.flags();
        assert!(flags.carry);
        assert!(!flags.zero);
        assert!(!flags.sign);
    }

    #[test]
    fn test_halt_on_last_allowed_step() {
        let mut cpu = cpu();
        cpu.set_step_limit(1);
        cpu.load_source("NOP\nHLT", 0);

        assert_eq!(cpu.run(0), Ok(2));
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_relative_jump_wraps() {
        let mut cpu = cpu();
        // At address 0, a backward jump of one instruction wraps to 253.
        cpu.load_source("JMP !-1", 0);
        cpu.step();
        assert_eq!(cpu.pc().to_u64(), 253);
    }

    #[test]
    fn test_unknown_opcode_reports_and_continues() {
        let mut cpu = cpu();
        let errs = errors(&mut cpu);
        cpu.ram.write_at(0, &Byte::from_u64(28, 8)).unwrap();
        cpu.load_source("MOV %0, #4\nHLT", 3);

        let steps = cpu.run(0).unwrap();

        assert_eq!(steps, 3);
        assert_eq!(reg(&cpu, 0).to_u64(), 4);
        assert_eq!(*errs.borrow(), vec![CpuError::UnknownOpcode { opcode: 28, pc: 0 }]);
    }

    #[test]
    fn test_bad_register_reports_and_continues() {
        let mut cpu = cpu();
        let errs = errors(&mut cpu);
        cpu.load_source("MOV %9, #1\nMOV %0, %9\nMOV %1, #2\nHLT", 0);

        cpu.run(0).unwrap();

        assert_eq!(errs.borrow().len(), 2);
        assert!(matches!(
            errs.borrow()[0],
            CpuError::Memory(MemoryError::AddressOutOfRange { address: 9, .. })
        ));
        assert!(reg(&cpu, 0).is_zero());
        assert_eq!(reg(&cpu, 1).to_u64(), 2);
    }

    #[test]
    fn test_load_past_address_space() {
        let mut cpu = cpu();
        let errs = errors(&mut cpu);
        cpu.load_program(&[true; 24], 254);

        assert_eq!(cpu.ram.read_at(254).unwrap().to_u64(), 255);
        assert_eq!(cpu.ram.read_at(255).unwrap().to_u64(), 255);
        assert!(matches!(
            errs.borrow()[0],
            CpuError::Memory(MemoryError::AddressTooWide { .. })
        ));
    }

    #[test]
    fn test_run_start_too_wide() {
        let mut cpu = cpu();
        assert!(matches!(
            cpu.run(256),
            Err(CpuError::Memory(MemoryError::AddressTooWide { .. }))
        ));
        assert_eq!(cpu.state(), CpuState::Idle);
    }

    #[test]
    fn test_compile_reports_errors() {
        let mut cpu = cpu();
        let errs = errors(&mut cpu);
        let program = cpu.compile("NOP\nBOGUS\nHLT");

        assert_eq!(program.len(), 3);
        assert_eq!(
            *errs.borrow(),
            vec![CpuError::Assembler(AssemblerError::UnknownInstruction {
                line: 2,
                instruction: "BOGUS".into(),
            })]
        );
    }

    #[test]
    fn test_step_listener_sees_new_pc() {
        let mut cpu = cpu();
        let pcs = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&pcs);
        cpu.on_step(move |pc| sink.borrow_mut().push(pc.to_u64()));
        cpu.load_source("NOP\nNOP\nHLT", 0);

        cpu.run(0).unwrap();

        assert_eq!(*pcs.borrow(), vec![3, 6, 6]);
    }

    #[test]
    fn test_listener_replacement() {
        let mut cpu = cpu();
        let first = outputs(&mut cpu);
        let second = outputs(&mut cpu);
        cpu.load_source("MOV %0, #1\nOUT %0\nHLT", 0);

        cpu.run(0).unwrap();

        assert!(first.borrow().is_empty());
        assert_eq!(second.borrow().len(), 1);
    }

    #[test]
    fn test_clear_listeners() {
        let mut cpu = cpu();
        let out = outputs(&mut cpu);
        let errs = errors(&mut cpu);
        cpu.clear_listeners();

        cpu.load_source("MOV %0, #1\nOUT %0\nMOV %9, #1\nHLT", 0);
        cpu.run(0).unwrap();

        assert!(out.borrow().is_empty());
        assert!(errs.borrow().is_empty());
        assert_eq!(reg(&cpu, 0).to_u64(), 1);
    }

    #[test]
    fn test_run_and_reset_events() {
        let mut cpu = cpu();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (on_run, on_reset) = (Rc::clone(&log), Rc::clone(&log));
        cpu.on_run(move || on_run.borrow_mut().push("run"));
        cpu.on_reset(move || on_reset.borrow_mut().push("reset"));

        cpu.load_source("HLT", 0);
        cpu.run(0).unwrap();
        cpu.reset(false);

        assert_eq!(*log.borrow(), vec!["run", "reset"]);
    }

    #[test]
    fn test_reset() {
        let mut cpu = cpu();
        cpu.load_source("MOV %0, #200\nADD %0, #100\nHLT", 0);
        cpu.run(0).unwrap();
        assert!(cpu.flags().carry);

        cpu.reset(false);
        assert_eq!(cpu.state(), CpuState::Idle);
        assert_eq!(cpu.flags(), Flags::default());
        assert!(cpu.pc().is_zero());
        assert!(reg(&cpu, 0).is_zero());
        assert_eq!(cpu.steps(), 0);
        // RAM kept: the program runs again.
        cpu.run(0).unwrap();
        assert_eq!(reg(&cpu, 0).to_u64(), 44);

        cpu.reset(true);
        assert_eq!(cpu.ram.populated(), 0);
    }

    #[test]
    fn test_custom_width() {
        let mut cpu = Cpu::new(Architecture::new(16, 2, 1024)).unwrap();
        let out = outputs(&mut cpu);
        cpu.load_source("MOV %0, #1000\nMUL %0, #-3\nOUT %0\nHLT", 600);

        cpu.run(600).unwrap();

        assert_eq!(out.borrow()[0], int_to_bits(-3000, 16));
    }

    #[test]
    fn test_snapshot() {
        let mut cpu = cpu();
        cpu.load_source("MOV %1, #-1\nHLT", 0);
        cpu.run(0).unwrap();

        let snap = cpu.snapshot();
        assert_eq!(snap.pc, 3);
        assert_eq!(snap.state, CpuState::Halted);
        assert_eq!(snap.registers.len(), 1);
        assert_eq!(snap.registers[0].index, 1);
        assert_eq!(snap.registers[0].signed, -1);
        assert_eq!(snap.registers[0].unsigned, 255);

        let json = serde_json::to_string(&snap).unwrap();
        let back: CpuSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn test_last_instruction() {
        let mut cpu = cpu();
        cpu.load_source("MOV %0, #5\nHLT", 0);
        cpu.step();
        assert_eq!(cpu.last_instruction().map(|i| i.to_string()), Some("MOV %0, #5".into()));
    }
}
