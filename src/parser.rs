//! Recursive-descent parser with precedence-climbing expressions.
//!
//! The parser holds a single look-ahead [Token] (`cur`); [Parser::advance]
//! refills it from the underlying [Scanner]. It does not own the operator
//! precedence table — that lives in [crate::jit::Jit] and is installed by
//! [crate::codegen], not here (see the "installed at codegen time" design
//! note) — so every entry point that needs to make a precedence decision
//! takes a `&PrecedenceTable` parameter.

use std::collections::HashMap;

use crate::ast::{Expr, Function, Prototype, ANONYMOUS_FUNCTION_NAME};
use crate::error::InterpretationError;
use crate::lexer::{Scanner, Token};

/// `char -> precedence`. Positive values bind tighter; a missing or
/// non-positive entry means "not a binary operator" (see
/// [Parser::current_precedence]).
pub type PrecedenceTable = HashMap<char, i32>;

/// The table's contents before any `binary` definition extends it, taken
/// verbatim from the reference driver (note `-` outranks `+`, which is
/// asymmetric from usual arithmetic precedence but preserved on purpose).
pub fn default_precedence_table() -> PrecedenceTable {
    HashMap::from([('=', 2), ('<', 10), ('+', 20), ('-', 30), ('*', 40)])
}

pub type Result<T> = std::result::Result<T, InterpretationError>;

/// Parses one token stream into a sequence of top-level [Function]s,
/// [Prototype]s (externs), and wrapped top-level expressions.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    cur: Token<'a>,
}

impl<'a> Parser<'a> {
    /// Start parsing the given source text. Primes `cur` with the first
    /// token.
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Scanner::new(source);
        let cur = scanner.next_token();
        Parser { scanner, cur }
    }

    /// Return the token currently under the look-ahead cursor, without
    /// consuming it. Used by the REPL driver to decide which production to
    /// invoke next.
    pub fn current(&self) -> Token<'a> {
        self.cur
    }

    /// Refill `cur` from the scanner.
    pub fn advance(&mut self) {
        self.cur = self.scanner.next_token();
    }

    ///////////////////////////////////////// Top-level productions /////////////////////////////////////////

    /// `definition ::= 'def' prototype expression`
    ///
    /// `table` is whatever the caller has accumulated so far from earlier
    /// `binary` definitions in the same session; a binary operator defined
    /// by *this* definition is not visible to its own body (precedence is
    /// installed at codegen time, after this returns).
    pub fn parse_definition(&mut self, table: &PrecedenceTable) -> Result<Function> {
        self.expect_exact(Token::Def, "'def'")?;
        let prototype = self.parse_prototype()?;
        let body = self.parse_expression(table)?;
        Ok(Function { prototype, body })
    }

    /// `extern ::= 'extern' prototype`
    pub fn parse_extern(&mut self) -> Result<Prototype> {
        self.expect_exact(Token::Extern, "'extern'")?;
        self.parse_prototype()
    }

    /// `top_level ::= expr`, wrapped as `def "__anon_expr"() expr`.
    pub fn parse_top_level_expr(&mut self, table: &PrecedenceTable) -> Result<Function> {
        let body = self.parse_expression(table)?;
        Ok(Function {
            prototype: Prototype {
                name: ANONYMOUS_FUNCTION_NAME.to_string(),
                params: Vec::new(),
                is_operator: false,
                precedence: 0,
            },
            body,
        })
    }

    ///////////////////////////////////////////// Prototypes /////////////////////////////////////////////

    /// ```text
    /// prototype ::= id '(' id* ')'
    ///             | 'unary'  c '(' id ')'
    ///             | 'binary' c number? '(' id id ')'
    /// ```
    fn parse_prototype(&mut self) -> Result<Prototype> {
        let (name, is_operator, mut precedence, required_arity) = match self.cur {
            Token::Identifier(name) => {
                let name = name.to_string();
                self.advance();
                (name, false, 0u32, None)
            }
            Token::Unary => {
                self.advance();
                let op = self.expect_operator_char("a unary operator")?;
                (Prototype::unary_name(op), true, 0, Some(1))
            }
            Token::Binary => {
                self.advance();
                let op = self.expect_operator_char("a binary operator")?;
                let mut precedence = 30u32;
                if let Token::Number(n) = self.cur {
                    if !(1.0..=100.0).contains(&n) {
                        return Err(InterpretationError::ParseBadPrec);
                    }
                    precedence = n as u32;
                    self.advance();
                }
                (Prototype::binary_name(op), true, precedence, Some(2))
            }
            other => {
                return Err(self.expected("a function name in prototype", other));
            }
        };

        self.expect_char(b'(', "'(' in prototype")?;
        let mut params = Vec::new();
        loop {
            match self.cur {
                Token::Identifier(p) => {
                    params.push(p.to_string());
                    self.advance();
                }
                Token::Char(b')') => break,
                other => return Err(self.expected("an identifier or ')'", other)),
            }
        }
        self.expect_char(b')', "')' in prototype")?;

        if let Some(arity) = required_arity {
            if params.len() != arity {
                return Err(InterpretationError::ParseArity);
            }
        }

        if !is_operator {
            precedence = 0;
        }

        Ok(Prototype {
            name,
            params,
            is_operator,
            precedence,
        })
    }

    ///////////////////////////////////////////// Expressions /////////////////////////////////////////////

    /// `expr ::= unary (binop unary)*`, precedence climbing.
    fn parse_expression(&mut self, table: &PrecedenceTable) -> Result<Expr> {
        let lhs = self.parse_unary(table)?;
        self.parse_bin_op_rhs(0, lhs, table)
    }

    /// `unary ::= primary | op unary` (`op` = any ASCII byte that isn't `(`
    /// or `,`, since those introduce a primary instead).
    fn parse_unary(&mut self, table: &PrecedenceTable) -> Result<Expr> {
        match self.cur {
            Token::Char(b'(') | Token::Char(b',') => self.parse_primary(table),
            Token::Char(c) => {
                self.advance();
                let operand = self.parse_unary(table)?;
                Ok(Expr::Unary {
                    opcode: c as char,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_primary(table),
        }
    }

    /// `binoprhs ::= (binop unary)*`, run with a minimum-precedence floor.
    fn parse_bin_op_rhs(&mut self, min_prec: i32, mut lhs: Expr, table: &PrecedenceTable) -> Result<Expr> {
        loop {
            let tok_prec = self.current_precedence(table);
            if tok_prec < min_prec {
                return Ok(lhs);
            }

            let op = match self.cur {
                Token::Char(c) => c as char,
                _ => unreachable!("current_precedence only returns >= 0 for Token::Char"),
            };
            self.advance();

            let mut rhs = self.parse_unary(table)?;

            let next_prec = self.current_precedence(table);
            if tok_prec < next_prec {
                rhs = self.parse_bin_op_rhs(tok_prec + 1, rhs, table)?;
            }

            lhs = Expr::Binary {
                opcode: op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    /// Returns -1 for anything that isn't a [Token::Char], or whose char
    /// has no positive entry in `table`.
    fn current_precedence(&self, table: &PrecedenceTable) -> i32 {
        match self.cur {
            Token::Char(c) => table
                .get(&(c as char))
                .copied()
                .filter(|&p| p > 0)
                .unwrap_or(-1),
            _ => -1,
        }
    }

    /// ```text
    /// primary ::= number | identifier ('(' args ')')? | '(' expr ')'
    ///           | if_expr | for_expr | var_expr
    /// ```
    fn parse_primary(&mut self, table: &PrecedenceTable) -> Result<Expr> {
        match self.cur {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Token::Identifier(_) => self.parse_identifier_expr(table),
            Token::Char(b'(') => self.parse_paren_expr(table),
            Token::If => self.parse_if_expr(table),
            Token::For => self.parse_for_expr(table),
            Token::Var => self.parse_var_expr(table),
            other => Err(self.expected("an expression", other)),
        }
    }

    /// `'(' expr ')'`
    fn parse_paren_expr(&mut self, table: &PrecedenceTable) -> Result<Expr> {
        self.expect_char(b'(', "'('")?;
        let inner = self.parse_expression(table)?;
        self.expect_char(b')', "')'")?;
        Ok(inner)
    }

    /// `identifier` or `identifier '(' (expr (',' expr)*)? ')'`
    fn parse_identifier_expr(&mut self, table: &PrecedenceTable) -> Result<Expr> {
        let name = match self.cur {
            Token::Identifier(name) => name.to_string(),
            other => return Err(self.expected("an identifier", other)),
        };
        self.advance();

        if !matches!(self.cur, Token::Char(b'(')) {
            return Ok(Expr::Variable(name));
        }
        self.advance();

        let mut args = Vec::new();
        if !matches!(self.cur, Token::Char(b')')) {
            loop {
                args.push(self.parse_expression(table)?);
                match self.cur {
                    Token::Char(b')') => break,
                    Token::Char(b',') => self.advance(),
                    other => return Err(self.expected("')' or ',' in argument list", other)),
                }
            }
        }
        self.expect_char(b')', "')'")?;
        Ok(Expr::Call { callee: name, args })
    }

    /// `'if' expr 'then' expr 'else' expr`
    fn parse_if_expr(&mut self, table: &PrecedenceTable) -> Result<Expr> {
        self.expect_exact(Token::If, "'if'")?;
        let cond = self.parse_expression(table)?;
        self.expect_exact(Token::Then, "'then'")?;
        let then_branch = self.parse_expression(table)?;
        self.expect_exact(Token::Else, "'else'")?;
        let else_branch = self.parse_expression(table)?;
        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    /// `'for' id '=' expr ',' expr (',' expr)? 'in' expr`
    fn parse_for_expr(&mut self, table: &PrecedenceTable) -> Result<Expr> {
        self.expect_exact(Token::For, "'for'")?;
        let var_name = match self.cur {
            Token::Identifier(name) => name.to_string(),
            other => return Err(self.expected("an identifier after 'for'", other)),
        };
        self.advance();

        self.expect_char(b'=', "'=' after 'for' variable")?;
        let start = self.parse_expression(table)?;
        self.expect_char(b',', "',' after 'for' start value")?;
        let end = self.parse_expression(table)?;

        let step = if matches!(self.cur, Token::Char(b',')) {
            self.advance();
            Some(Box::new(self.parse_expression(table)?))
        } else {
            None
        };

        self.expect_exact(Token::In, "'in' after 'for'")?;
        let body = self.parse_expression(table)?;

        Ok(Expr::For {
            var_name,
            start: Box::new(start),
            end: Box::new(end),
            step,
            body: Box::new(body),
        })
    }

    /// `'var' id ('=' expr)? (',' id ('=' expr)?)* 'in' expr`
    fn parse_var_expr(&mut self, table: &PrecedenceTable) -> Result<Expr> {
        self.expect_exact(Token::Var, "'var'")?;

        let mut bindings = Vec::new();
        loop {
            let name = match self.cur {
                Token::Identifier(name) => name.to_string(),
                other => return Err(self.expected("an identifier after 'var'", other)),
            };
            self.advance();

            let init = if matches!(self.cur, Token::Char(b'=')) {
                self.advance();
                Some(self.parse_expression(table)?)
            } else {
                None
            };
            bindings.push((name, init));

            if matches!(self.cur, Token::Char(b',')) {
                self.advance();
                continue;
            }
            break;
        }

        self.expect_exact(Token::In, "'in' after 'var'")?;
        let body = self.parse_expression(table)?;

        Ok(Expr::Var {
            bindings,
            body: Box::new(body),
        })
    }

    ///////////////////////////////////////////// Helpers /////////////////////////////////////////////

    fn expect_exact(&mut self, token: Token<'static>, what: &str) -> Result<()> {
        if tokens_match(self.cur, token) {
            self.advance();
            Ok(())
        } else {
            Err(self.expected(what, self.cur))
        }
    }

    fn expect_char(&mut self, c: u8, what: &str) -> Result<()> {
        if matches!(self.cur, Token::Char(actual) if actual == c) {
            self.advance();
            Ok(())
        } else {
            Err(self.expected(what, self.cur))
        }
    }

    fn expect_operator_char(&mut self, what: &str) -> Result<char> {
        match self.cur {
            Token::Char(c) if c.is_ascii() => {
                self.advance();
                Ok(c as char)
            }
            other => Err(self.expected(what, other)),
        }
    }

    fn expected(&self, expected: &str, found: Token) -> InterpretationError {
        InterpretationError::ParseExpected {
            expected: expected.to_string(),
            found: describe(found),
        }
    }
}

fn tokens_match<'a, 'b>(a: Token<'a>, b: Token<'b>) -> bool {
    std::mem::discriminant(&a) == std::mem::discriminant(&b)
}

/// A short human-readable label for a token, used to fill in "found ..." in
/// diagnostics.
fn describe(token: Token) -> String {
    match token {
        Token::Eof => "end of input".to_string(),
        Token::Def => "'def'".to_string(),
        Token::Extern => "'extern'".to_string(),
        Token::If => "'if'".to_string(),
        Token::Then => "'then'".to_string(),
        Token::Else => "'else'".to_string(),
        Token::For => "'for'".to_string(),
        Token::In => "'in'".to_string(),
        Token::Binary => "'binary'".to_string(),
        Token::Unary => "'unary'".to_string(),
        Token::Var => "'var'".to_string(),
        Token::Identifier(name) => format!("identifier '{name}'"),
        Token::Number(n) => format!("number {n}"),
        Token::Char(c) => format!("'{}'", c as char),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse_expr_str(source: &str) -> Expr {
        let mut parser = Parser::new(source);
        parser.parse_expression(&default_precedence_table()).unwrap()
    }

    #[test]
    fn parses_arithmetic_with_correct_precedence() {
        // 1 + 2 * 3 should associate as 1 + (2 * 3)
        let expr = parse_expr_str("1 + 2 * 3");
        assert_eq!(
            Expr::Binary {
                opcode: '+',
                lhs: Box::new(Expr::Number(1.0)),
                rhs: Box::new(Expr::Binary {
                    opcode: '*',
                    lhs: Box::new(Expr::Number(2.0)),
                    rhs: Box::new(Expr::Number(3.0)),
                }),
            },
            expr
        );
    }

    #[test]
    fn minus_outranks_plus_per_the_reference_table() {
        // With the default table, '-' (30) binds tighter than '+' (20), so
        // "1 + 2 - 3" parses as 1 + (2 - 3), not (1 + 2) - 3.
        let expr = parse_expr_str("1 + 2 - 3");
        assert_eq!(
            Expr::Binary {
                opcode: '+',
                lhs: Box::new(Expr::Number(1.0)),
                rhs: Box::new(Expr::Binary {
                    opcode: '-',
                    lhs: Box::new(Expr::Number(2.0)),
                    rhs: Box::new(Expr::Number(3.0)),
                }),
            },
            expr
        );
    }

    #[test]
    fn assignment_is_right_associative_via_low_precedence() {
        let expr = parse_expr_str("a = b = 3");
        assert_eq!(
            Expr::Binary {
                opcode: '=',
                lhs: Box::new(Expr::Variable("a".into())),
                rhs: Box::new(Expr::Binary {
                    opcode: '=',
                    lhs: Box::new(Expr::Variable("b".into())),
                    rhs: Box::new(Expr::Number(3.0)),
                }),
            },
            expr
        );
    }

    #[test]
    fn parses_call_with_arguments() {
        let expr = parse_expr_str("foo(1, bar(2))");
        assert_eq!(
            Expr::Call {
                callee: "foo".into(),
                args: vec![
                    Expr::Number(1.0),
                    Expr::Call {
                        callee: "bar".into(),
                        args: vec![Expr::Number(2.0)],
                    }
                ],
            },
            expr
        );
    }

    #[test]
    fn parses_if_then_else() {
        let expr = parse_expr_str("if x then 1 else 2");
        assert_eq!(
            Expr::If {
                cond: Box::new(Expr::Variable("x".into())),
                then_branch: Box::new(Expr::Number(1.0)),
                else_branch: Box::new(Expr::Number(2.0)),
            },
            expr
        );
    }

    #[test]
    fn parses_for_with_default_step() {
        let expr = parse_expr_str("for i = 1, i < 10 in i");
        match expr {
            Expr::For { var_name, step, .. } => {
                assert_eq!("i", var_name);
                assert!(step.is_none());
            }
            other => panic!("expected For, got {other:?}"),
        }
    }

    #[test]
    fn parses_for_with_explicit_step() {
        let expr = parse_expr_str("for i = 1, i < 10, 2 in i");
        match expr {
            Expr::For { step: Some(step), .. } => assert_eq!(Expr::Number(2.0), *step),
            other => panic!("expected a step, got {other:?}"),
        }
    }

    #[test]
    fn parses_var_with_mixed_initializers() {
        let expr = parse_expr_str("var a = 1, b in a + b");
        match expr {
            Expr::Var { bindings, .. } => {
                assert_eq!(2, bindings.len());
                assert_eq!(("a".to_string(), Some(Expr::Number(1.0))), bindings[0]);
                assert_eq!(("b".to_string(), None), bindings[1]);
            }
            other => panic!("expected Var, got {other:?}"),
        }
    }

    #[test]
    fn unary_binds_tighter_than_any_binary_operator() {
        let expr = parse_expr_str("!x + 1");
        assert_eq!(
            Expr::Binary {
                opcode: '+',
                lhs: Box::new(Expr::Unary {
                    opcode: '!',
                    operand: Box::new(Expr::Variable("x".into())),
                }),
                rhs: Box::new(Expr::Number(1.0)),
            },
            expr
        );
    }

    #[test]
    fn parses_unary_prototype() {
        let mut parser = Parser::new("unary!(x)");
        let proto = parser.parse_prototype().unwrap();
        assert_eq!("unary!", proto.name);
        assert_eq!(vec!["x".to_string()], proto.params);
        assert!(proto.is_operator);
    }

    #[test]
    fn parses_binary_prototype_with_explicit_precedence() {
        let mut parser = Parser::new("binary: 1 (x y)");
        let proto = parser.parse_prototype().unwrap();
        assert_eq!("binary:", proto.name);
        assert_eq!(1, proto.precedence);
        assert_eq!(Some(':'), proto.operator_char());
    }

    #[test]
    fn binary_prototype_defaults_to_precedence_30() {
        let mut parser = Parser::new("binary^(x y)");
        let proto = parser.parse_prototype().unwrap();
        assert_eq!(30, proto.precedence);
    }

    #[test]
    fn rejects_out_of_range_precedence() {
        let mut parser = Parser::new("binary^ 200 (x y)");
        assert_eq!(
            Err(InterpretationError::ParseBadPrec),
            parser.parse_prototype()
        );
    }

    #[test]
    fn rejects_wrong_arity_for_binary_operator() {
        let mut parser = Parser::new("binary^(x)");
        assert_eq!(
            Err(InterpretationError::ParseArity),
            parser.parse_prototype()
        );
    }

    #[test]
    fn top_level_expression_wraps_in_anonymous_function() {
        let mut parser = Parser::new("4 + 5");
        let func = parser
            .parse_top_level_expr(&default_precedence_table())
            .unwrap();
        assert_eq!(ANONYMOUS_FUNCTION_NAME, func.prototype.name);
        assert!(func.prototype.params.is_empty());
    }

    #[test]
    fn unknown_operator_not_in_table_parses_as_unary_then_primary() {
        // ':' has no default entry, so "a : b" parses as the unary
        // operator ':' applied to `b`, with `a` left as the first operand
        // of a binary node once the caller re-enters bin-op-rhs. Here we
        // just check the whole expression comes back structured around the
        // unary application rather than failing to parse.
        let table: PrecedenceTable = HashMap::new();
        let mut parser = Parser::new("a : b");
        let expr = parser.parse_expression(&table).unwrap();
        match expr {
            Expr::Variable(name) => assert_eq!("a", name),
            other => panic!("expected just 'a' since ':' has no precedence entry, got {other:?}"),
        }
    }

    #[test]
    fn resynchronizing_after_an_error_just_needs_one_advance() {
        // The argument list wants ')' or ',' after "1" but finds "2" instead,
        // leaving "2)" unconsumed; one advance skips past the bad token.
        let mut parser = Parser::new("foo(1 2)");
        let err = parser.parse_expression(&default_precedence_table());
        assert!(err.is_err());
        parser.advance();
        assert_eq!(Token::Char(b')'), parser.current());
    }
}
