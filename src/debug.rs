//! Helpers to print debug representations.

use inkwell::values::{AnyValue, FunctionValue};

/// Render a function's IR to stderr, matching the "IR printed for every
/// successfully compiled top-level form" rule in the external interfaces.
pub fn print_function(function: FunctionValue) {
    eprintln!("{}", function.print_to_string().to_string_lossy());
}
