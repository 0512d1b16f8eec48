//! Code generation
//!
//! Lowers a type-annotated AST to a WebAssembly text module. The generator
//! trusts the checker completely: it reads annotations, never re-derives
//! types, and treats any contract violation (a field access on a primitive,
//! an operator the checker should have rejected) as an internal invariant
//! violation rather than a user-facing error.
//!
//! Memory model: one mutable i32 global per program variable, plus a hidden
//! `$heap` bump pointer starting at 4 so address 0 stays reserved as the
//! `none` sentinel. An instance occupies `4 * field_count` bytes, one slot
//! per field in declared order.

use std::collections::{HashMap, HashSet};

use crate::ast::*;

/// Error code passed to the imported panic handler when a field of `none` is
/// dereferenced. The host translates codes into runtime errors.
pub const OPERATION_ON_NONE: i32 = 0;

/// Initial heap pointer value; address 0 is the `none` sentinel.
const HEAP_BASE: i32 = 4;

/// Imported host functions: name, parameter count, whether they return i32.
const IMPORTS: &[(&str, usize, bool)] = &[
    ("print_num", 1, true),
    ("print_bool", 1, true),
    ("print_none", 1, true),
    ("abs", 1, true),
    ("min", 2, true),
    ("max", 2, true),
    ("pow", 2, true),
    ("panic", 1, false),
];

/// Compile an annotated program into a WAT module.
///
/// The exported entry function holds the top-level statement sequence and
/// returns a value only when the final statement is an expression statement
/// of non-`none` type.
pub fn compile(program: &Program<Type>) -> String {
    CodeGen::new(program).module(program)
}

/// Per-compilation generator state. Holds only the class table; two
/// compilations share nothing.
struct CodeGen<'p> {
    classes: HashMap<&'p str, &'p ClassDef<Type>>,
}

impl<'p> CodeGen<'p> {
    fn new(program: &'p Program<Type>) -> Self {
        let classes = program
            .classes
            .iter()
            .map(|c| (c.name.as_str(), c))
            .collect();
        Self { classes }
    }

    fn module(&self, program: &Program<Type>) -> String {
        let mut out = String::from("(module\n");
        out.push_str("  (import \"js\" \"mem\" (memory 10))\n");
        for (name, arity, has_result) in IMPORTS {
            let params = vec!["i32"; *arity].join(" ");
            let result = if *has_result { " (result i32)" } else { "" };
            out.push_str(&format!(
                "  (func ${name} (import \"imports\" \"{name}\") (param {params}){result})\n"
            ));
        }

        for var in &program.vars {
            out.push_str(&format!(
                "  (global ${} (mut i32) (i32.const {}))\n",
                var.var.name,
                encode_literal(&var.value)
            ));
        }
        out.push_str(&format!(
            "  (global $heap (mut i32) (i32.const {HEAP_BASE}))\n"
        ));

        for class in &program.classes {
            for method in &class.methods {
                out.push_str(&self.function(method, &mangle(&class.name, &method.name)));
            }
        }
        for func in &program.funcs {
            out.push_str(&self.function(func, &func.name));
        }

        out.push_str(&self.entry(program));
        out.push_str(")\n");
        out
    }

    /// Emit one function or method under the given (possibly mangled) name.
    fn function(&self, func: &FunDef<Type>, name: &str) -> String {
        let locals: HashSet<&str> = func
            .params
            .iter()
            .map(|p| p.name.as_str())
            .chain(func.inits.iter().map(|i| i.var.name.as_str()))
            .collect();

        let params: String = func
            .params
            .iter()
            .map(|p| format!(" (param ${} i32)", p.name))
            .collect();
        let result = if func.ret == Type::None {
            ""
        } else {
            " (result i32)"
        };

        let mut instrs = vec!["(local $$scratch i32)".to_string()];
        for init in &func.inits {
            instrs.push(format!("(local ${} i32)", init.var.name));
        }
        for init in &func.inits {
            instrs.push(format!(
                "(local.set ${} (i32.const {}))",
                init.var.name,
                encode_literal(&init.value)
            ));
        }
        instrs.extend(self.stmts(&func.body, &locals));

        // The structural validator requires a value of the result type on the
        // stack at the function's end even when the checker has proven that
        // point unreachable. The sentinel never surfaces in a checked program.
        if func.ret != Type::None {
            instrs.push("(i32.const 9999)".to_string());
        }

        render_function(&format!("${name}{params}{result}"), &instrs)
    }

    /// Emit the exported entry function wrapping the top-level body.
    fn entry(&self, program: &Program<Type>) -> String {
        let returns_value = matches!(
            program.body.last(),
            Some(Stmt { kind: StmtKind::Expr(_), ann }) if *ann != Type::None
        );
        let result = if returns_value { " (result i32)" } else { "" };

        let mut instrs = vec!["(local $$scratch i32)".to_string()];
        instrs.extend(self.stmts(&program.body, &HashSet::new()));
        if returns_value {
            // A top-level `return` exits early but must still satisfy the
            // declared result: it surfaces whatever the scratch slot holds at
            // that point, the same value the fall-through path surfaces.
            instrs = instrs
                .into_iter()
                .flat_map(|instr| {
                    if instr == "(return)" {
                        vec!["(local.get $$scratch)".to_string(), instr]
                    } else {
                        vec![instr]
                    }
                })
                .collect();
            instrs.push("(local.get $$scratch)".to_string());
        }

        render_function(&format!("(export \"exported_func\"){result}"), &instrs)
    }

    fn stmts(&self, stmts: &[Stmt<Type>], locals: &HashSet<&str>) -> Vec<String> {
        stmts.iter().flat_map(|s| self.stmt(s, locals)).collect()
    }

    fn stmt(&self, stmt: &Stmt<Type>, locals: &HashSet<&str>) -> Vec<String> {
        match &stmt.kind {
            StmtKind::Assign { target, value } => match target {
                AssignTarget::Name(name) => {
                    let mut out = self.expr(value, locals);
                    let set = if locals.contains(name.as_str()) {
                        "local.set"
                    } else {
                        "global.set"
                    };
                    out.push(format!("({set} ${name})"));
                    out
                }
                AssignTarget::Field { obj, field } => {
                    let offset = 4 * self.field_index(&obj.ann, field);
                    let mut out = self.expr(obj, locals);
                    out.extend(none_guard());
                    out.push(format!("(i32.add (i32.const {offset}))"));
                    out.extend(self.expr(value, locals));
                    out.push("(i32.store)".to_string());
                    out
                }
            },
            StmtKind::Expr(expr) => {
                let mut out = self.expr(expr, locals);
                if stmt.ann != Type::None {
                    // Retain the value so the program's final statement can
                    // surface it as the overall result.
                    out.push("(local.set $$scratch)".to_string());
                } else if pushes_value(expr) {
                    out.push("(drop)".to_string());
                }
                out
            }
            StmtKind::Return(expr) => {
                let mut out = expr
                    .as_ref()
                    .map(|e| self.expr(e, locals))
                    .unwrap_or_default();
                out.push("(return)".to_string());
                out
            }
            StmtKind::Pass => vec![],
            StmtKind::If {
                cond,
                body,
                elif,
                orelse,
            } => {
                let mut out = self.expr(cond, locals);
                out.push("(if".to_string());
                out.push("(then".to_string());
                out.extend(self.stmts(body, locals));
                out.push(")".to_string());
                if let Some(clause) = elif {
                    // elif nests as a conditional inside the else arm,
                    // threading any final else the same way.
                    out.push("(else".to_string());
                    out.extend(self.expr(&clause.cond, locals));
                    out.push("(if".to_string());
                    out.push("(then".to_string());
                    out.extend(self.stmts(&clause.body, locals));
                    out.push(")".to_string());
                    if let Some(orelse) = orelse {
                        out.push("(else".to_string());
                        out.extend(self.stmts(orelse, locals));
                        out.push(")".to_string());
                    }
                    out.push(")".to_string());
                    out.push(")".to_string());
                } else if let Some(orelse) = orelse {
                    out.push("(else".to_string());
                    out.extend(self.stmts(orelse, locals));
                    out.push(")".to_string());
                }
                out.push(")".to_string());
                out
            }
            StmtKind::While { cond, body } => {
                // br_if branches out of the loop when true, but the loop must
                // continue while the condition is true, so the condition is
                // inverted first. br 0 restarts the loop; br_if 1 escapes the
                // enclosing block.
                let mut out = vec!["(block".to_string(), "(loop".to_string()];
                out.extend(self.expr(cond, locals));
                out.push("(i32.xor (i32.const 1))".to_string());
                out.push("(br_if 1)".to_string());
                out.extend(self.stmts(body, locals));
                out.push("(br 0)".to_string());
                out.push(")".to_string());
                out.push(")".to_string());
                out
            }
        }
    }

    fn expr(&self, expr: &Expr<Type>, locals: &HashSet<&str>) -> Vec<String> {
        match &expr.kind {
            ExprKind::Literal(lit) => {
                vec![format!("(i32.const {})", encode_literal(lit))]
            }
            ExprKind::Id(name) => {
                let get = if locals.contains(name.as_str()) {
                    "local.get"
                } else {
                    "global.get"
                };
                vec![format!("({get} ${name})")]
            }
            ExprKind::Unary { op, operand } => {
                let mut out = self.expr(operand, locals);
                out.push(unop_instr(*op).to_string());
                out
            }
            ExprKind::Binary { op, left, right } => {
                let mut out = self.expr(left, locals);
                out.extend(self.expr(right, locals));
                out.push(binop_instr(*op).to_string());
                out
            }
            ExprKind::Paren(inner) => self.expr(inner, locals),
            ExprKind::Call { callee, args } => {
                if let Some(class) = self.classes.get(callee.as_str()) {
                    return self.construct(class);
                }
                // The checker already resolved `print` to its typed overload.
                let mut out: Vec<String> =
                    args.iter().flat_map(|a| self.expr(a, locals)).collect();
                out.push(format!("(call ${callee})"));
                out
            }
            ExprKind::GetField { obj, field } => {
                let offset = 4 * self.field_index(&obj.ann, field);
                let mut out = self.expr(obj, locals);
                out.extend(none_guard());
                out.push(format!("(i32.add (i32.const {offset}))"));
                out.push("(i32.load)".to_string());
                out
            }
            ExprKind::MethodCall { obj, method, args } => {
                let Type::Object(class) = &obj.ann else {
                    unreachable!("method call on `{}` survived checking", obj.ann);
                };
                let mut out = self.expr(obj, locals);
                out.extend(args.iter().flat_map(|a| self.expr(a, locals)));
                out.push(format!("(call ${})", mangle(class, method)));
                out
            }
        }
    }

    /// Bump-allocate and initialize an instance.
    ///
    /// Writes each field's default at `heap + 4 * index`, evaluates to the
    /// current heap pointer, then advances the pointer by the instance size.
    /// Nothing is ever freed or reused.
    fn construct(&self, class: &ClassDef<Type>) -> Vec<String> {
        let mut out = Vec::new();
        for (index, field) in class.fields.iter().enumerate() {
            out.push("(global.get $heap)".to_string());
            out.push(format!("(i32.add (i32.const {}))", 4 * index));
            out.push(format!("(i32.const {})", encode_literal(&field.value)));
            out.push("(i32.store)".to_string());
        }
        out.push("(global.get $heap)".to_string());
        out.push(format!(
            "(global.set $heap (i32.add (global.get $heap) (i32.const {})))",
            4 * class.fields.len()
        ));
        out
    }

    /// Field slot index, resolved from the receiver's static type.
    fn field_index(&self, receiver: &Type, field: &str) -> usize {
        let Type::Object(class_name) = receiver else {
            unreachable!("field access on `{receiver}` survived checking");
        };
        let class = self
            .classes
            .get(class_name.as_str())
            .unwrap_or_else(|| unreachable!("unknown class `{class_name}` survived checking"));
        class
            .fields
            .iter()
            .position(|f| f.var.name == field)
            .unwrap_or_else(|| {
                unreachable!("no field `{field}` on `{class_name}` survived checking")
            })
    }
}

/// Mangled name of a method implementation. Dispatch is always static, so a
/// flat `$<Class>$<method>` name replaces any vtable.
fn mangle(class: &str, method: &str) -> String {
    format!("${class}${method}")
}

/// Guard the object base address on the stack against the `none` sentinel.
/// On `none` the generated code panics with [`OPERATION_ON_NONE`] instead of
/// touching memory; otherwise the address is left back on the stack.
fn none_guard() -> Vec<String> {
    vec![
        "(local.set $$scratch)".to_string(),
        "(local.get $$scratch)".to_string(),
        "(i32.eqz)".to_string(),
        "(if".to_string(),
        "(then".to_string(),
        format!("(i32.const {OPERATION_ON_NONE})"),
        "(call $panic)".to_string(),
        "(unreachable)".to_string(),
        ")".to_string(),
        ")".to_string(),
        "(local.get $$scratch)".to_string(),
    ]
}

/// Whether an expression leaves a value on the stack. Calls to `none`
/// functions compile to calls of result-less functions and leave nothing;
/// every other expression pushes one i32.
fn pushes_value(expr: &Expr<Type>) -> bool {
    match &expr.kind {
        ExprKind::Call { .. } | ExprKind::MethodCall { .. } => expr.ann != Type::None,
        ExprKind::Paren(inner) => pushes_value(inner),
        _ => true,
    }
}

/// Memory encoding of a literal: raw value for `int`, 0/1 for `bool`, the
/// sentinel 0 for `none`.
fn encode_literal(lit: &Literal) -> i32 {
    match lit {
        Literal::Int(n) => *n,
        Literal::Bool(b) => *b as i32,
        Literal::None => 0,
    }
}

fn binop_instr(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "(i32.add)",
        BinOp::Sub => "(i32.sub)",
        BinOp::Mul => "(i32.mul)",
        BinOp::Div => "(i32.div_s)",
        BinOp::Mod => "(i32.rem_s)",
        BinOp::Eq => "(i32.eq)",
        BinOp::Ne => "(i32.ne)",
        BinOp::Lt => "(i32.lt_s)",
        BinOp::Le => "(i32.le_s)",
        BinOp::Gt => "(i32.gt_s)",
        BinOp::Ge => "(i32.ge_s)",
        // `is` is defined on (none, none) only; both operands encode as the
        // sentinel, so identity collapses to equality.
        BinOp::Is => "(i32.eq)",
    }
}

fn unop_instr(op: UnOp) -> &'static str {
    match op {
        UnOp::Not => "(i32.xor (i32.const 1))",
        UnOp::Neg => "(i32.mul (i32.const -1))",
    }
}

fn render_function(header: &str, instrs: &[String]) -> String {
    let mut out = format!("  (func {header}\n");
    for instr in instrs {
        out.push_str("    ");
        out.push_str(instr);
        out.push('\n');
    }
    out.push_str("  )\n");
    out
}
