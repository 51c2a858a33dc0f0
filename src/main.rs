use inkwell::context::Context;
use inkwell::targets::{InitializationConfig, Target};

use kaleidoscope::jit::Jit;
use kaleidoscope::repl;

fn main() {
    Target::initialize_native(&InitializationConfig::default())
        .expect("failed to initialize the native target for this host");

    let context = Context::create();
    let mut jit = match Jit::new(&context) {
        Ok(jit) => jit,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    repl::run(&mut jit);
}
