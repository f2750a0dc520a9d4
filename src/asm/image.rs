//! Program image file format.
//!
//! A simple text format for assembled programs:
//! - One instruction per line: three space-separated binary bytes
//! - Anything after `;` on a line is a comment
//! - Blank lines are ignored
//!
//! ```text
//! ; 8-bit program image
//! 00000001 00000000 00000101 ; 000
//! 00000000 00000000 00000000 ; 003
//! ```
//!
//! The byte width is taken from the first byte in the file; every byte must
//! have the same width.

use crate::asm::Program;
use crate::cpu::decode::INSTRUCTION_BYTES;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

/// Parse image text.
pub fn parse_image(text: &str) -> Result<Program, ImageError> {
    let mut width = None;
    let mut bits = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        let line_num = line_num + 1;
        let content = line.split(';').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        let bytes: Vec<&str> = content.split_whitespace().collect();
        if bytes.len() != INSTRUCTION_BYTES as usize {
            return Err(ImageError::ParseError {
                line: line_num,
                message: format!("expected {} bytes, found {}", INSTRUCTION_BYTES, bytes.len()),
            });
        }

        for byte in bytes {
            let expected = *width.get_or_insert(byte.len());
            if byte.len() != expected {
                return Err(ImageError::ParseError {
                    line: line_num,
                    message: format!("expected {} bits, found {}", expected, byte.len()),
                });
            }
            for c in byte.chars() {
                match c {
                    '0' => bits.push(false),
                    '1' => bits.push(true),
                    other => {
                        return Err(ImageError::ParseError {
                            line: line_num,
                            message: format!("invalid bit {:?}", other),
                        })
                    }
                }
            }
        }
    }

    let width = width.ok_or(ImageError::Empty)?;
    Ok(Program::from_bits(width, bits))
}

/// Render a program as image text.
pub fn format_image(program: &Program) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "; {}-bit program image", program.width());
    let _ = writeln!(text, "; {} instructions", program.len());
    text.push('\n');

    let bytes: Vec<String> = program.bytes().map(|b| b.to_string()).collect();
    for (i, chunk) in bytes.chunks(INSTRUCTION_BYTES as usize).enumerate() {
        let _ = writeln!(text, "{} ; {:03}", chunk.join(" "), i as u64 * INSTRUCTION_BYTES);
    }

    text
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Program, ImageError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    parse_image(&text)
}

/// Save a program as an image file.
pub fn save_image<P: AsRef<Path>>(path: P, program: &Program) -> Result<(), ImageError> {
    std::fs::write(path.as_ref(), format_image(program))
        .map_err(|e| ImageError::IoError(e.to_string()))
}

/// Errors that can occur reading or writing program images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("image contains no instructions")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    #[test]
    fn test_format_and_parse() {
        let program = assemble("MOV %0, #5\nOUT %0\nHLT", 8).into_result().unwrap();
        let text = format_image(&program);

        assert!(text.contains("00000001 00000000 00000101 ; 000"));
        assert!(text.contains("00000000 00000000 00000000 ; 006"));
        assert_eq!(parse_image(&text).unwrap(), program);
    }

    #[test]
    fn test_parse_other_width() {
        let program = parse_image("0001 0010 0011\n\n; trailing comment\n").unwrap();
        assert_eq!(program.width(), 4);
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_image("00000001 00000000"),
            Err(ImageError::ParseError { line: 1, .. })
        ));
        assert!(matches!(
            parse_image("00000001 00000000 00000000\n0001 0000 0000"),
            Err(ImageError::ParseError { line: 2, .. })
        ));
        assert!(matches!(
            parse_image("0000000x 00000000 00000000"),
            Err(ImageError::ParseError { line: 1, .. })
        ));
        assert_eq!(parse_image("; nothing\n"), Err(ImageError::Empty));
    }

    #[test]
    fn test_file_roundtrip() {
        let program = assemble("loop:\nNOP\nJMP loop", 8).into_result().unwrap();
        let path = std::env::temp_dir().join(format!("bitcpu-image-{}.img", std::process::id()));

        save_image(&path, &program).unwrap();
        let loaded = load_image(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, program);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_image("/nonexistent/program.img"),
            Err(ImageError::IoError(_))
        ));
    }
}
