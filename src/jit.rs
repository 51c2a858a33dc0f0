//! The `Jit` context: the one value that carries every piece of
//! process-wide compiler state, replacing the globals a C++ rendition of
//! this tutorial would reach for (current module, builder, pass manager,
//! execution engine, prototype registry, precedence table). The REPL loop
//! owns one for the life of the process and threads it through parsing and
//! lowering by `&mut` reference.

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::module::Module;
use inkwell::passes::PassManager;
use inkwell::values::FunctionValue;
use inkwell::OptimizationLevel;

use crate::ast::{Function, Prototype, ANONYMOUS_FUNCTION_NAME};
use crate::error::InterpretationError;
use crate::optimizer::build_function_pass_manager;
use crate::parser::{default_precedence_table, PrecedenceTable};
use crate::registry::PrototypeRegistry;

pub type Result<T> = std::result::Result<T, InterpretationError>;

/// Function pointer type the execution engine hands back for a freshly
/// JIT'd anonymous top-level expression.
type AnonExprFn = unsafe extern "C" fn() -> f64;

pub struct Jit<'ctx> {
    context: &'ctx Context,
    pub(crate) module: Module<'ctx>,
    pub(crate) builder: Builder<'ctx>,
    pub(crate) fpm: PassManager<FunctionValue<'ctx>>,
    execution_engine: ExecutionEngine<'ctx>,
    pub(crate) registry: PrototypeRegistry,
    pub(crate) precedence: PrecedenceTable,
    module_count: u64,
}

impl<'ctx> Jit<'ctx> {
    pub fn new(context: &'ctx Context) -> Result<Self> {
        let module = context.create_module("kaleidoscope_module_0");
        let execution_engine = module
            .create_jit_execution_engine(OptimizationLevel::None)
            .map_err(|e| InterpretationError::Jit(e.to_string()))?;
        let fpm = build_function_pass_manager(&module);

        Ok(Jit {
            context,
            module,
            builder: context.create_builder(),
            fpm,
            execution_engine,
            registry: PrototypeRegistry::new(),
            precedence: default_precedence_table(),
            module_count: 0,
        })
    }

    pub fn context(&self) -> &'ctx Context {
        self.context
    }

    /// A read-only view of the precedence table, for the REPL to pass into
    /// the parser.
    pub fn precedence_table(&self) -> &PrecedenceTable {
        &self.precedence
    }

    /// The module currently being emitted into. Used by the object-file
    /// boundary binary, which has nothing else to emit once the REPL loop
    /// it drives returns at EOF.
    pub fn current_module(&self) -> &Module<'ctx> {
        &self.module
    }

    /// Drop the current module handle and install a brand new, empty one
    /// with a matching pass manager. The old module's functions stay alive
    /// inside the execution engine if it was handed off with
    /// [ExecutionEngine::add_module] first; this just gives the compiler a
    /// fresh place to emit into.
    fn start_new_module(&mut self) {
        self.module_count += 1;
        let module = self
            .context
            .create_module(&format!("kaleidoscope_module_{}", self.module_count));
        self.fpm = build_function_pass_manager(&module);
        self.module = module;
    }

    /// `def` dispatch: lower the definition, print its IR, hand the module
    /// to the execution engine, then start a fresh module.
    pub fn handle_definition(&mut self, func: Function) {
        match crate::codegen::lower_function(self, &func) {
            Ok(function) => {
                crate::debug::print_function(function);
                if self.execution_engine.add_module(&self.module).is_err() {
                    eprintln!("Error: JIT error: module already owned by the execution engine");
                }
                self.start_new_module();
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    /// `extern` dispatch: lower just the declaration into the current
    /// module, print it, and record the prototype. No module hand-off —
    /// the declaration lives in whatever module eventually calls it.
    pub fn handle_extern(&mut self, proto: Prototype) {
        match crate::codegen::lower_prototype(self, &proto) {
            Ok(function) => {
                crate::debug::print_function(function);
                self.registry.insert(proto);
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    /// Anonymous top-level expression dispatch: lower, hand off, invoke, and
    /// remove the module again so the next anonymous expression doesn't
    /// collide with this one's `__anon_expr` symbol. Returns the computed
    /// value so callers other than the REPL (tests, in particular) can
    /// observe it without scraping stderr.
    pub fn evaluate_top_level_expr(&mut self, func: Function) -> Result<f64> {
        let function = crate::codegen::lower_function(self, &func)?;
        crate::debug::print_function(function);

        self.execution_engine
            .add_module(&self.module)
            .map_err(|_| InterpretationError::Jit("module already owned by the execution engine".to_string()))?;

        // Safety: `__anon_expr` was just lowered above as `fn() -> f64`, so
        // the signature requested here matches the symbol's actual type.
        let outcome = unsafe {
            self.execution_engine
                .get_function::<AnonExprFn>(ANONYMOUS_FUNCTION_NAME)
                .map(|f| f.call())
                .map_err(|e| InterpretationError::Jit(e.to_string()))
        };

        let _ = self.execution_engine.remove_module(&self.module);
        self.start_new_module();

        outcome
    }

    /// The REPL-facing wrapper around [Self::evaluate_top_level_expr]:
    /// prints `evaluated to %f` or the one-line error.
    pub fn handle_top_level_expr(&mut self, func: Function) {
        match self.evaluate_top_level_expr(func) {
            Ok(value) => eprintln!("evaluated to {value:.6}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}
