//! AST → IR lowering.
//!
//! Every function here takes `jit: &mut Jit<'ctx>` rather than being a
//! method on [Jit] directly — lowering is conceptually a separate concern
//! from the module/engine lifecycle [crate::jit] manages, even though it
//! mutates the same context value. The per-function local-variable scope
//! (`named_values`, name → stack slot) is threaded explicitly as a
//! parameter instead of living on `Jit`: it is reset on every function
//! entry anyway, so a fresh `HashMap` per call is simpler than clearing a
//! shared one.

use std::collections::HashMap;

use inkwell::builder::BuilderError;
use inkwell::types::BasicMetadataTypeEnum;
use inkwell::values::{BasicMetadataValueEnum, FloatValue, FunctionValue, PointerValue};
use inkwell::FloatPredicate;

use crate::ast::{Expr, Function, Prototype, ANONYMOUS_FUNCTION_NAME};
use crate::error::InterpretationError;
use crate::jit::Jit;

pub type Result<T> = std::result::Result<T, InterpretationError>;

fn jit_err(e: BuilderError) -> InterpretationError {
    InterpretationError::Jit(e.to_string())
}

type Scope<'ctx> = HashMap<String, PointerValue<'ctx>>;

/// §4.4 `getFunction`: prefer a declaration already in the current module,
/// otherwise re-materialize one from the registry, otherwise give up.
pub fn get_function<'ctx>(jit: &mut Jit<'ctx>, name: &str) -> Result<FunctionValue<'ctx>> {
    if let Some(function) = jit.module.get_function(name) {
        return Ok(function);
    }
    if let Some(proto) = jit.registry.get(name).cloned() {
        return lower_prototype(jit, &proto);
    }
    Err(InterpretationError::UnknownCallee(name.to_string()))
}

/// Declare (but do not define) a function matching `proto` in the current
/// module. Every parameter and the return type are `double`.
pub fn lower_prototype<'ctx>(jit: &mut Jit<'ctx>, proto: &Prototype) -> Result<FunctionValue<'ctx>> {
    let f64_type = jit.context().f64_type();
    let param_types: Vec<BasicMetadataTypeEnum> = vec![f64_type.into(); proto.arity()];
    let fn_type = f64_type.fn_type(&param_types, false);
    let function = jit.module.add_function(&proto.name, fn_type, None);

    for (param, name) in function.get_param_iter().zip(proto.params.iter()) {
        param.into_float_value().set_name(name);
    }

    Ok(function)
}

/// §4.3 "Function lowering", steps 1-8.
pub fn lower_function<'ctx>(jit: &mut Jit<'ctx>, func: &Function) -> Result<FunctionValue<'ctx>> {
    // Step 1: move the prototype into the registry before the body is
    // touched, so a recursive call inside the body resolves. Note this
    // overwrites any previous entry for the name even if the redefinition
    // check below rejects this definition — that's the source behavior,
    // not a bug to route around.
    jit.registry.insert(func.prototype.clone());

    // Step 2.
    let function = get_function(jit, &func.prototype.name)?;

    // Step 3. `count_basic_blocks() != 0` isn't enough on its own: every
    // `def` rotates in a fresh, empty module right after it succeeds (see
    // `Jit::start_new_module`), so by the time the *next* `def` of the same
    // name runs, `get_function` above has just re-materialized a brand new
    // 0-basic-block declaration from the registry — the old, defined
    // function lives in a module that's no longer current. The registry's
    // `defined` set tracks "has a body" independently of which module
    // currently holds the declaration. The synthetic anonymous-expression
    // wrapper is exempt: every bare top-level expression legitimately
    // redefines `__anon_expr`, that's not a user-visible redefinition.
    let is_anon = func.prototype.name == ANONYMOUS_FUNCTION_NAME;
    if !is_anon && jit.registry.is_defined(&func.prototype.name) {
        return Err(InterpretationError::Redefinition(func.prototype.name.clone()));
    }

    // Step 4.
    if func.prototype.is_operator && func.prototype.arity() == 2 {
        if let Some(op) = func.prototype.operator_char() {
            jit.precedence.insert(op, func.prototype.precedence as i32);
        }
    }

    // Steps 5-7, factored out so step 8's erase covers every failure path
    // through entry setup, parameter binding, and body lowering alike.
    match lower_function_body(jit, function, func) {
        Ok(()) => {
            if !function.verify(true) {
                unsafe {
                    function.delete();
                }
                return Err(InterpretationError::Verify(format!(
                    "invalid function: {}",
                    func.prototype.name
                )));
            }
            jit.fpm.run_on(&function);
            if !is_anon {
                jit.registry.mark_defined(&func.prototype.name);
            }
            Ok(function)
        }
        Err(e) => {
            unsafe {
                function.delete();
            }
            Err(e)
        }
    }
}

fn lower_function_body<'ctx>(jit: &mut Jit<'ctx>, function: FunctionValue<'ctx>, func: &Function) -> Result<()> {
    let entry = jit.context().append_basic_block(function, "entry");
    jit.builder.position_at_end(entry);

    let mut named_values = Scope::new();
    for (param, name) in function.get_param_iter().zip(func.prototype.params.iter()) {
        let alloca = create_entry_block_alloca(jit, function, name);
        jit.builder
            .build_store(alloca, param.into_float_value())
            .map_err(jit_err)?;
        named_values.insert(name.clone(), alloca);
    }

    let body_val = lower_expr(jit, &mut named_values, function, &func.body)?;
    jit.builder.build_return(Some(&body_val)).map_err(jit_err)?;
    Ok(())
}

/// Allocate a stack slot in `function`'s entry block, regardless of where
/// the builder is currently positioned. Required so mem2reg can promote
/// every local to an SSA register later.
fn create_entry_block_alloca<'ctx>(jit: &Jit<'ctx>, function: FunctionValue<'ctx>, name: &str) -> PointerValue<'ctx> {
    let entry_builder = jit.context().create_builder();
    let entry = function
        .get_first_basic_block()
        .expect("the entry block is created before any local variable is allocated");

    match entry.get_first_instruction() {
        Some(first_instr) => entry_builder.position_before(&first_instr),
        None => entry_builder.position_at_end(entry),
    }

    entry_builder
        .build_alloca(jit.context().f64_type(), name)
        .expect("allocating a scalar double cannot fail")
}

pub(crate) fn lower_expr<'ctx>(
    jit: &mut Jit<'ctx>,
    named_values: &mut Scope<'ctx>,
    function: FunctionValue<'ctx>,
    expr: &Expr,
) -> Result<FloatValue<'ctx>> {
    match expr {
        Expr::Number(n) => Ok(jit.context().f64_type().const_float(*n)),

        Expr::Variable(name) => {
            let ptr = named_values
                .get(name)
                .copied()
                .ok_or_else(|| InterpretationError::UnknownName(name.clone()))?;
            let loaded = jit
                .builder
                .build_load(ptr, name)
                .map_err(jit_err)?;
            Ok(loaded.into_float_value())
        }

        Expr::Unary { opcode, operand } => lower_unary(jit, named_values, function, *opcode, operand),

        Expr::Binary { opcode, lhs, rhs } if *opcode == '=' => lower_assignment(jit, named_values, function, lhs, rhs),

        Expr::Binary { opcode, lhs, rhs } => lower_binary(jit, named_values, function, *opcode, lhs, rhs),

        Expr::Call { callee, args } => lower_call(jit, named_values, function, callee, args),

        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => lower_if(jit, named_values, function, cond, then_branch, else_branch),

        Expr::For {
            var_name,
            start,
            end,
            step,
            body,
        } => lower_for(jit, named_values, function, var_name, start, end, step.as_deref(), body),

        Expr::Var { bindings, body } => lower_var(jit, named_values, function, bindings, body),
    }
}

/// `=` is special-cased *before* evaluating the left-hand side: it must be a
/// bare [Expr::Variable], never itself evaluated as an expression. The
/// right-hand side is evaluated before the left-hand name's slot is looked
/// up (see the assignment-ordering design note).
fn lower_assignment<'ctx>(
    jit: &mut Jit<'ctx>,
    named_values: &mut Scope<'ctx>,
    function: FunctionValue<'ctx>,
    lhs: &Expr,
    rhs: &Expr,
) -> Result<FloatValue<'ctx>> {
    let name = match lhs {
        Expr::Variable(name) => name,
        _ => return Err(InterpretationError::BadAssignTarget),
    };

    let rhs_val = lower_expr(jit, named_values, function, rhs)?;

    let ptr = named_values
        .get(name)
        .copied()
        .ok_or_else(|| InterpretationError::UnknownName(name.clone()))?;
    jit.builder.build_store(ptr, rhs_val).map_err(jit_err)?;
    Ok(rhs_val)
}

fn lower_binary<'ctx>(
    jit: &mut Jit<'ctx>,
    named_values: &mut Scope<'ctx>,
    function: FunctionValue<'ctx>,
    opcode: char,
    lhs: &Expr,
    rhs: &Expr,
) -> Result<FloatValue<'ctx>> {
    let lhs_val = lower_expr(jit, named_values, function, lhs)?;
    let rhs_val = lower_expr(jit, named_values, function, rhs)?;

    match opcode {
        '+' => jit.builder.build_float_add(lhs_val, rhs_val, "addtmp").map_err(jit_err),
        '-' => jit.builder.build_float_sub(lhs_val, rhs_val, "subtmp").map_err(jit_err),
        '*' => jit.builder.build_float_mul(lhs_val, rhs_val, "multmp").map_err(jit_err),
        '<' => {
            let cmp = jit
                .builder
                .build_float_compare(FloatPredicate::ULT, lhs_val, rhs_val, "cmptmp")
                .map_err(jit_err)?;
            jit.builder
                .build_unsigned_int_to_float(cmp, jit.context().f64_type(), "booltmp")
                .map_err(jit_err)
        }
        _ => {
            let name = Prototype::binary_name(opcode);
            let function_value = get_function(jit, &name).map_err(|_| InterpretationError::UnknownBinary(opcode))?;
            let call = jit
                .builder
                .build_call(function_value, &[lhs_val.into(), rhs_val.into()], "binop")
                .map_err(jit_err)?;
            Ok(call
                .try_as_basic_value()
                .left()
                .expect("a binary operator function always returns a value")
                .into_float_value())
        }
    }
}

fn lower_unary<'ctx>(
    jit: &mut Jit<'ctx>,
    named_values: &mut Scope<'ctx>,
    function: FunctionValue<'ctx>,
    opcode: char,
    operand: &Expr,
) -> Result<FloatValue<'ctx>> {
    let operand_val = lower_expr(jit, named_values, function, operand)?;
    let name = Prototype::unary_name(opcode);
    let function_value = get_function(jit, &name).map_err(|_| InterpretationError::UnknownUnary(opcode))?;
    let call = jit
        .builder
        .build_call(function_value, &[operand_val.into()], "unop")
        .map_err(jit_err)?;
    Ok(call
        .try_as_basic_value()
        .left()
        .expect("a unary operator function always returns a value")
        .into_float_value())
}

fn lower_call<'ctx>(
    jit: &mut Jit<'ctx>,
    named_values: &mut Scope<'ctx>,
    function: FunctionValue<'ctx>,
    callee: &str,
    args: &[Expr],
) -> Result<FloatValue<'ctx>> {
    let function_value = get_function(jit, callee)?;

    let expected = function_value.count_params() as usize;
    if expected != args.len() {
        return Err(InterpretationError::ArityMismatch {
            name: callee.to_string(),
            expected,
            got: args.len(),
        });
    }

    let mut arg_vals: Vec<BasicMetadataValueEnum> = Vec::with_capacity(args.len());
    for arg in args {
        arg_vals.push(lower_expr(jit, named_values, function, arg)?.into());
    }

    let call = jit
        .builder
        .build_call(function_value, &arg_vals, "calltmp")
        .map_err(jit_err)?;
    Ok(call
        .try_as_basic_value()
        .left()
        .expect("a called function always returns a value")
        .into_float_value())
}

fn lower_if<'ctx>(
    jit: &mut Jit<'ctx>,
    named_values: &mut Scope<'ctx>,
    function: FunctionValue<'ctx>,
    cond: &Expr,
    then_branch: &Expr,
    else_branch: &Expr,
) -> Result<FloatValue<'ctx>> {
    let cond_val = lower_expr(jit, named_values, function, cond)?;
    let zero = jit.context().f64_type().const_float(0.0);
    let cond_bool = jit
        .builder
        .build_float_compare(FloatPredicate::UNE, cond_val, zero, "ifcond")
        .map_err(jit_err)?;

    let then_bb = jit.context().append_basic_block(function, "then");
    let else_bb = jit.context().append_basic_block(function, "else");
    let merge_bb = jit.context().append_basic_block(function, "ifcont");

    jit.builder
        .build_conditional_branch(cond_bool, then_bb, else_bb)
        .map_err(jit_err)?;

    jit.builder.position_at_end(then_bb);
    let then_val = lower_expr(jit, named_values, function, then_branch)?;
    jit.builder.build_unconditional_branch(merge_bb).map_err(jit_err)?;
    let then_end_bb = jit
        .builder
        .get_insert_block()
        .expect("the builder is always positioned somewhere after lowering an expression");

    jit.builder.position_at_end(else_bb);
    let else_val = lower_expr(jit, named_values, function, else_branch)?;
    jit.builder.build_unconditional_branch(merge_bb).map_err(jit_err)?;
    let else_end_bb = jit
        .builder
        .get_insert_block()
        .expect("the builder is always positioned somewhere after lowering an expression");

    jit.builder.position_at_end(merge_bb);
    let phi = jit
        .builder
        .build_phi(jit.context().f64_type(), "iftmp")
        .map_err(jit_err)?;
    phi.add_incoming(&[(&then_val, then_end_bb), (&else_val, else_end_bb)]);
    Ok(phi.as_basic_value().into_float_value())
}

#[allow(clippy::too_many_arguments)]
fn lower_for<'ctx>(
    jit: &mut Jit<'ctx>,
    named_values: &mut Scope<'ctx>,
    function: FunctionValue<'ctx>,
    var_name: &str,
    start: &Expr,
    end: &Expr,
    step: Option<&Expr>,
    body: &Expr,
) -> Result<FloatValue<'ctx>> {
    let start_val = lower_expr(jit, named_values, function, start)?;
    let alloca = create_entry_block_alloca(jit, function, var_name);
    jit.builder.build_store(alloca, start_val).map_err(jit_err)?;

    let loop_bb = jit.context().append_basic_block(function, "loop");
    jit.builder.build_unconditional_branch(loop_bb).map_err(jit_err)?;
    jit.builder.position_at_end(loop_bb);

    let old_val = named_values.insert(var_name.to_string(), alloca);

    // Body, step, and end are all lowered under the induction variable's
    // shadowed binding — end is deliberately re-lowered here rather than
    // once before the loop, since the source language re-evaluates it on
    // every pass through the generated `loop` block.
    let outcome: Result<(FloatValue<'ctx>, FloatValue<'ctx>)> = (|| {
        lower_expr(jit, named_values, function, body)?;
        let step_val = match step {
            Some(step_expr) => lower_expr(jit, named_values, function, step_expr)?,
            None => jit.context().f64_type().const_float(1.0),
        };
        let end_val = lower_expr(jit, named_values, function, end)?;
        Ok((step_val, end_val))
    })();

    match old_val {
        Some(v) => {
            named_values.insert(var_name.to_string(), v);
        }
        None => {
            named_values.remove(var_name);
        }
    }

    let (step_val, end_val) = outcome?;

    let current_val = jit
        .builder
        .build_load(alloca, "curvar")
        .map_err(jit_err)?
        .into_float_value();
    let next_val = jit
        .builder
        .build_float_add(current_val, step_val, "nextvar")
        .map_err(jit_err)?;
    jit.builder.build_store(alloca, next_val).map_err(jit_err)?;

    let zero = jit.context().f64_type().const_float(0.0);
    let loop_cond = jit
        .builder
        .build_float_compare(FloatPredicate::UNE, end_val, zero, "loopcond")
        .map_err(jit_err)?;

    let after_bb = jit.context().append_basic_block(function, "afterloop");
    jit.builder
        .build_conditional_branch(loop_cond, loop_bb, after_bb)
        .map_err(jit_err)?;
    jit.builder.position_at_end(after_bb);

    Ok(jit.context().f64_type().const_float(0.0))
}

fn lower_var<'ctx>(
    jit: &mut Jit<'ctx>,
    named_values: &mut Scope<'ctx>,
    function: FunctionValue<'ctx>,
    bindings: &[(String, Option<Expr>)],
    body: &Expr,
) -> Result<FloatValue<'ctx>> {
    let mut saved = Vec::with_capacity(bindings.len());

    let setup: Result<()> = (|| {
        for (name, init) in bindings {
            let init_val = match init {
                Some(expr) => lower_expr(jit, named_values, function, expr)?,
                None => jit.context().f64_type().const_float(0.0),
            };
            let alloca = create_entry_block_alloca(jit, function, name);
            jit.builder.build_store(alloca, init_val).map_err(jit_err)?;
            saved.push((name.clone(), named_values.insert(name.clone(), alloca)));
        }
        Ok(())
    })();

    let body_result = setup.and_then(|()| lower_expr(jit, named_values, function, body));

    for (name, old_val) in saved.into_iter().rev() {
        match old_val {
            Some(v) => {
                named_values.insert(name, v);
            }
            None => {
                named_values.remove(&name);
            }
        }
    }

    body_result
}
