//! WebAssembly bindings for the emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.

use wasm_bindgen::prelude::*;
use crate::asm::{assemble, disassemble, Program};
use crate::bits::Byte;
use crate::cpu::{Architecture, Cpu};
use std::cell::RefCell;
use std::rc::Rc;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly CPU wrapper.
#[wasm_bindgen]
pub struct WasmCpu {
    cpu: Cpu,
    program: Program,
    output: Rc<RefCell<Vec<Byte>>>,
    errors: Rc<RefCell<Vec<String>>>,
}

#[wasm_bindgen]
impl WasmCpu {
    /// Create a new CPU instance.
    #[wasm_bindgen(constructor)]
    pub fn new(bits: usize, registers: u32, ram: u32) -> Result<WasmCpu, JsError> {
        let arch = Architecture::new(bits, registers as u64, ram as u64);
        let cpu = Cpu::new(arch).map_err(|e| JsError::new(&e.to_string()))?;

        let mut wasm = Self {
            cpu,
            program: Program::new(bits),
            output: Rc::new(RefCell::new(Vec::new())),
            errors: Rc::new(RefCell::new(Vec::new())),
        };
        wasm.collect_events();
        Ok(wasm)
    }

    /// Compile and load assembly source at `address`.
    ///
    /// Returns the number of instructions. Assembly errors are collected in
    /// [`WasmCpu::errors`].
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str, address: u32) -> usize {
        self.cpu.reset(true);
        self.program = self.cpu.load_source(source, address as u64);
        self.program.len()
    }

    /// Step one instruction. Returns the disassembled instruction.
    #[wasm_bindgen]
    pub fn step(&mut self) -> String {
        self.cpu.step();
        self.cpu
            .last_instruction()
            .map(|i| i.to_string())
            .unwrap_or_else(|| "???".into())
    }

    /// Run from `start` until halt or the step limit.
    #[wasm_bindgen]
    pub fn run(&mut self, start: u32) -> Result<u64, JsError> {
        self.cpu
            .run(start as u64)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen]
    pub fn set_step_limit(&mut self, limit: u32) {
        self.cpu.set_step_limit(limit as u64);
    }

    /// Reset registers and flags; RAM is cleared when `clear_ram` is set.
    #[wasm_bindgen]
    pub fn reset(&mut self, clear_ram: bool) {
        self.cpu.reset(clear_ram);
        self.output.borrow_mut().clear();
        self.errors.borrow_mut().clear();
    }

    /// Check if CPU is halted.
    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    #[wasm_bindgen]
    pub fn steps(&self) -> u64 {
        self.cpu.steps()
    }

    /// Get program counter.
    #[wasm_bindgen]
    pub fn pc(&self) -> u64 {
        self.cpu.pc().to_u64()
    }

    /// Signed value of a general-purpose register.
    #[wasm_bindgen]
    pub fn register(&self, index: u32) -> i64 {
        self.cpu.register(index as u64).map(|b| b.to_i64()).unwrap_or(0)
    }

    /// Unsigned value of a RAM cell.
    #[wasm_bindgen]
    pub fn memory_at(&self, address: u32) -> u64 {
        self.cpu.ram.read_at(address as u64).map(|b| b.to_u64()).unwrap_or(0)
    }

    /// RAM cell as a binary string.
    #[wasm_bindgen]
    pub fn memory_bits_at(&self, address: u32) -> String {
        self.cpu
            .ram
            .read_at(address as u64)
            .map(|b| b.to_string())
            .unwrap_or_default()
    }

    /// `OUT` values since the last reset, as binary strings.
    #[wasm_bindgen]
    pub fn output(&self) -> js_sys::Array {
        self.output
            .borrow()
            .iter()
            .map(|b| JsValue::from_str(&b.to_string()))
            .collect()
    }

    /// Error messages since the last reset.
    #[wasm_bindgen]
    pub fn errors(&self) -> js_sys::Array {
        self.errors
            .borrow()
            .iter()
            .map(|e| JsValue::from_str(e))
            .collect()
    }

    /// Call `callback` with each `OUT` byte as a binary string, in
    /// addition to recording it.
    #[wasm_bindgen]
    pub fn on_out(&mut self, callback: js_sys::Function) {
        let sink = Rc::clone(&self.output);
        self.cpu.on_out(move |b| {
            sink.borrow_mut().push(b.clone());
            let _ = callback.call1(&JsValue::NULL, &JsValue::from_str(&b.to_string()));
        });
    }

    /// Full CPU state as JSON.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.cpu.snapshot()).map_err(|e| JsError::new(&e.to_string()))
    }

    /// Disassembly of the loaded program.
    #[wasm_bindgen]
    pub fn disassembly(&self) -> String {
        disassemble(&self.program)
    }
}

impl WasmCpu {
    fn collect_events(&mut self) {
        let out = Rc::clone(&self.output);
        self.cpu.on_out(move |b| out.borrow_mut().push(b.clone()));
        let errors = Rc::clone(&self.errors);
        self.cpu.on_error(move |e| errors.borrow_mut().push(e.to_string()));
    }
}

/// Assemble source code and return the program image text.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str, bits: usize) -> Result<String, JsError> {
    let program = assemble(source, bits)
        .into_result()
        .map_err(|e| JsError::new(&e.to_string()))?;
    Ok(crate::asm::format_image(&program))
}
