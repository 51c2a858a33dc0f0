//! §4.6 JIT driver / REPL: reads standard input once, then dispatches
//! token-at-a-time until EOF.

use std::io::{self, Read};

use crate::jit::Jit;
use crate::lexer::Token;
use crate::parser::Parser;

const PROMPT: &str = "ready> ";

/// Run until standard input is exhausted. Reading it all up front (rather
/// than one `getchar()` at a time, as the reference driver does) sidesteps
/// threading a blocking byte-at-a-time reader through the parser; the
/// dispatch loop below is otherwise identical to the reference `MainLoop`.
pub fn run(jit: &mut Jit) {
    let mut source = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut source) {
        eprintln!("Error: could not read standard input: {e}");
        return;
    }

    let mut parser = Parser::new(&source);

    loop {
        eprint!("{PROMPT}");

        match parser.current() {
            Token::Eof => break,

            // Statement separator: consume and continue.
            Token::Char(b';') => parser.advance(),

            Token::Def => match parser.parse_definition(jit.precedence_table()) {
                Ok(func) => jit.handle_definition(func),
                Err(e) => {
                    eprintln!("Error: {e}");
                    parser.advance();
                }
            },

            Token::Extern => match parser.parse_extern() {
                Ok(proto) => jit.handle_extern(proto),
                Err(e) => {
                    eprintln!("Error: {e}");
                    parser.advance();
                }
            },

            _ => match parser.parse_top_level_expr(jit.precedence_table()) {
                Ok(func) => jit.handle_top_level_expr(func),
                Err(e) => {
                    eprintln!("Error: {e}");
                    parser.advance();
                }
            },
        }
    }
}
