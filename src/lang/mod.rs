// src/lang/mod.rs
//! Line-oriented command language.
//!
//! One command per line, tokens separated by single spaces:
//!
//! ```text
//! white
//! green
//! bgrect x1 y1 x2 y2
//! figure x y
//! move dx dy
//! reset
//! update
//! ```
//!
//! Numeric arguments are fractions of the canvas: each is parsed as an `f64`,
//! multiplied by the canvas size (400) and truncated toward zero. The first
//! malformed line fails the whole parse, so a script is either applied in
//! full or not at all.

use crate::painter::{Background, DrawOp, Point, CANVAS_SIZE};
use log::{debug, warn};
use std::io::{BufRead, Cursor};


/// What was wrong with a line.
#[derive(Debug)]
pub enum ParseErrorKind {
    UnknownCommand(String),
    /// Argument counts exclude the command name.
    WrongArity {
        command: String,
        expected: usize,
        got: usize,
    },
    InvalidNumber {
        command: String,
        token: String,
    },
    Io(std::io::Error),
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorKind::UnknownCommand(name) => write!(f, "unknown command: '{}'", name),
            ParseErrorKind::WrongArity {
                command,
                expected,
                got,
            } => write!(
                f,
                "wrong number of arguments for '{}' command: expected {}, got {}",
                command, expected, got
            ),
            ParseErrorKind::InvalidNumber { command, token } => write!(
                f,
                "invalid parameter for '{}' command: '{}' is not a number",
                command, token
            ),
            ParseErrorKind::Io(e) => write!(f, "read error: {}", e),
        }
    }
}

/// A parse failure and the 1-based line it happened on.
#[derive(Debug)]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ParseErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Turns scripts into `DrawOp`s.
#[derive(Debug, Clone, Copy)]
pub struct Parser {
    scale: f64,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            scale: CANVAS_SIZE as f64,
        }
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a whole script. Returns no operations if any line is bad.
    pub fn parse<R: BufRead>(&self, input: R) -> Result<Vec<DrawOp>, ParseError> {
        let mut ops = Vec::new();
        for (index, line) in input.lines().enumerate() {
            let line_no = index + 1;
            let line = line.map_err(|e| ParseError {
                line: line_no,
                kind: ParseErrorKind::Io(e),
            })?;
            match self.parse_line(&line) {
                Ok(op) => ops.push(op),
                Err(kind) => {
                    warn!("Parser: Rejected line {}: {}", line_no, kind);
                    return Err(ParseError {
                        line: line_no,
                        kind,
                    });
                }
            }
        }
        debug!("Parser: Parsed {} operations", ops.len());
        Ok(ops)
    }

    pub fn parse_str(&self, script: &str) -> Result<Vec<DrawOp>, ParseError> {
        self.parse(Cursor::new(script))
    }

    /// Parses one line (without its terminator).
    pub fn parse_line(&self, line: &str) -> Result<DrawOp, ParseErrorKind> {
        let tokens: Vec<&str> = line.split(' ').collect();
        let command = tokens[0];
        let args = &tokens[1..];

        let op = match command {
            "white" => {
                expect_arity(command, args, 0)?;
                DrawOp::Fill(Background::White)
            }
            "green" => {
                expect_arity(command, args, 0)?;
                DrawOp::Fill(Background::Green)
            }
            "bgrect" => {
                let p = self.numbers::<4>(command, args)?;
                DrawOp::BgRect {
                    min: Point::new(p[0], p[1]),
                    max: Point::new(p[2], p[3]),
                }
            }
            "figure" => {
                let p = self.numbers::<2>(command, args)?;
                DrawOp::Figure(Point::new(p[0], p[1]))
            }
            "move" => {
                let p = self.numbers::<2>(command, args)?;
                DrawOp::Move { dx: p[0], dy: p[1] }
            }
            "reset" => {
                expect_arity(command, args, 0)?;
                DrawOp::Reset
            }
            "update" => {
                expect_arity(command, args, 0)?;
                DrawOp::Update
            }
            other => return Err(ParseErrorKind::UnknownCommand(other.to_string())),
        };
        Ok(op)
    }

    /// Parses exactly `N` arguments and scales them to pixels.
    fn numbers<const N: usize>(
        &self,
        command: &str,
        args: &[&str],
    ) -> Result<[i32; N], ParseErrorKind> {
        expect_arity(command, args, N)?;
        let mut out = [0i32; N];
        for (slot, token) in out.iter_mut().zip(args) {
            let value: f64 = token.parse().map_err(|_| ParseErrorKind::InvalidNumber {
                command: command.to_string(),
                token: token.to_string(),
            })?;
            // `as` truncates toward zero and saturates out-of-range values.
            *slot = (value * self.scale) as i32;
        }
        Ok(out)
    }
}

fn expect_arity(command: &str, args: &[&str], expected: usize) -> Result<(), ParseErrorKind> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ParseErrorKind::WrongArity {
            command: command.to_string(),
            expected,
            got: args.len(),
        })
    }
}
