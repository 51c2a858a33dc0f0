//! The object-file-emitting variant: runs the ordinary REPL to EOF, then
//! compiles whatever module was current at that point to a native object
//! file (`output.o`).
//!
//! Grounded on the reference driver's object-emitting variant: initialize
//! every native target/asm-printer/asm-parser, resolve the default target
//! triple, build a generic target machine, set the module's data layout,
//! and emit the object file.

use inkwell::context::Context;
use inkwell::targets::{CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine};
use inkwell::OptimizationLevel;

use kaleidoscope::jit::Jit;
use kaleidoscope::repl;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    Target::initialize_all(&InitializationConfig::default());

    let context = Context::create();
    let mut jit = Jit::new(&context).map_err(|e| e.to_string())?;

    repl::run(&mut jit);

    let triple = TargetMachine::get_default_triple();
    let target = Target::from_triple(&triple).map_err(|e| e.to_string())?;

    let target_machine = target
        .create_target_machine(
            &triple,
            "generic",
            "",
            OptimizationLevel::None,
            RelocMode::Default,
            CodeModel::Default,
        )
        .ok_or_else(|| "could not create a target machine for this host".to_string())?;

    let module = jit.current_module();
    module.set_triple(&triple);
    module.set_data_layout(&target_machine.get_target_data().get_data_layout());

    let out_path = std::path::Path::new("output.o");
    target_machine
        .write_to_file(module, FileType::Object, out_path)
        .map_err(|e| e.to_string())?;

    println!("wrote {}", out_path.display());
    Ok(())
}
