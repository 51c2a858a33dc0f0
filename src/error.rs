//! Provides [InterpretationError], the error returned by every fallible step
//! of the pipeline: parsing, lowering, verification, and JIT execution.
use thiserror::Error;

/// Any error that can occur while parsing, lowering, or JIT-compiling a
/// top-level form.
///
/// Every variant formats as the one-line diagnostic the REPL prints to
/// stderr; none of them carry a source position, since tracking source
/// positions in diagnostics is out of scope for this language.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InterpretationError {
    /// The parser wanted one thing and saw another (a keyword, a paren, a
    /// comma, an identifier...).
    #[error("expected {expected}, found {found}")]
    ParseExpected { expected: String, found: String },

    /// A `binary` prototype declared a precedence outside `1..=100`.
    #[error("invalid precedence: must be 1..100")]
    ParseBadPrec,

    /// A `unary`/`binary` prototype had the wrong number of parameters for
    /// its arity (unary takes 1, binary takes 2).
    #[error("invalid number of operands for operator")]
    ParseArity,

    /// A variable reference with no binding in scope.
    #[error("unknown variable name: {0}")]
    UnknownName(String),

    /// A call referenced a name with no prototype in the registry and no
    /// declaration in the current module.
    #[error("unknown function referenced: {0}")]
    UnknownCallee(String),

    /// A call supplied the wrong number of arguments for the callee's
    /// prototype.
    #[error("incorrect number of arguments passed to {name}: expected {expected}, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    /// The left-hand side of `=` was not a bare variable reference.
    #[error("destination of '=' must be a variable")]
    BadAssignTarget,

    /// A unary expression used an operator with no `unary<c>` definition.
    #[error("unknown unary operator: {0}")]
    UnknownUnary(char),

    /// A binary expression used a non-builtin operator with no `binary<c>`
    /// definition.
    #[error("unknown binary operator: {0}")]
    UnknownBinary(char),

    /// A `def` tried to give a body to a prototype that already has one.
    #[error("redefinition of function {0}")]
    Redefinition(String),

    /// The IR verifier rejected a freshly emitted function.
    #[error("function verification failed: {0}")]
    Verify(String),

    /// The execution engine could not be created, or a JIT'd symbol could
    /// not be found after a module was added.
    #[error("JIT error: {0}")]
    Jit(String),
}
