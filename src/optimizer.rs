//! Builds the per-module function pass pipeline.
//!
//! A fresh [PassManager] is created for each module (mirroring the module's
//! own lifetime: one REPL entry, one module, one pipeline) and run on every
//! function immediately after it verifies.

use inkwell::module::Module;
use inkwell::passes::PassManager;
use inkwell::values::FunctionValue;

/// Order matters: mem2reg must run before the rest have any SSA registers
/// worth combining/reassociating/numbering.
pub fn build_function_pass_manager<'ctx>(module: &Module<'ctx>) -> PassManager<FunctionValue<'ctx>> {
    let fpm = PassManager::create(module);
    fpm.add_promote_memory_to_register_pass();
    fpm.add_instruction_combining_pass();
    fpm.add_reassociate_pass();
    fpm.add_gvn_pass();
    fpm.add_cfg_simplification_pass();
    fpm.initialize();
    fpm
}

#[cfg(test)]
mod test {
    use super::*;
    use inkwell::context::Context;

    #[test]
    fn pass_manager_runs_without_error_on_a_trivial_function() {
        let context = Context::create();
        let module = context.create_module("test");
        let builder = context.create_builder();
        let f64_type = context.f64_type();
        let fn_type = f64_type.fn_type(&[], false);
        let function = module.add_function("const_one", fn_type, None);
        let entry = context.append_basic_block(function, "entry");
        builder.position_at_end(entry);
        builder.build_return(Some(&f64_type.const_float(1.0))).unwrap();

        let fpm = build_function_pass_manager(&module);
        // run_on returns whether anything changed; either answer is a pass,
        // the point of this test is that it doesn't panic on a well-formed
        // function.
        let _ = fpm.run_on(&function);
    }
}
