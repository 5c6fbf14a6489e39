use tracing::{debug, trace};

use crate::{
    ast::{self, BinaryOperator, ElifClause, Expr, ExprKind, Ident, Stmt, StmtKind, UnaryOperator},
    codegen::ir::{self, Code, Instr, Op, Value},
    token::{Span, Spanned},
    type_checker::{self, Error},
    types::{Scope, Type},
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Name of the function that holds the top-level code.
const MAIN: &str = "main";

/// Lowers the program into IR, type checking it along the way.
///
/// Top-level variables and statements are lowered into an implicit `main`,
/// which comes first. If the program defines `main` itself, it must have no
/// top-level code.
pub fn generate(program: &ast::Program) -> Result<ir::Program, crate::Error> {
    let signatures = type_checker::signatures(program)?;
    let mut functions = Vec::with_capacity(program.func_defs.len() + 1);

    if program.func_defs.iter().any(|f| f.name.as_str() == MAIN) {
        let top_level = program.var_defs.first().map(|def| def.span);
        if let Some(span) = top_level.or_else(|| program.body.first().map(|stmt| stmt.span)) {
            return Err(span.wrap(Error::TopLevelCodeWithMain).into());
        }
    } else {
        let mut g = Generator::new(&signatures, None);
        for var_def in &program.var_defs {
            g.g_var_def(var_def)?;
        }
        g.g_block(&program.body)?;
        functions.push(g.finish(MAIN, Vec::new()));
    }

    for func in &program.func_defs {
        functions.push(g_function(&signatures, func)?);
    }

    debug!(functions = functions.len(), "generated program");
    Ok(ir::Program { functions })
}

/// Derives the static type of an expression under the provided scope.
///
/// The expression is lowered into a scratch function, so the typing rules
/// are applied exactly as [`generate`] applies them. Calls to functions
/// without return type derive `None`.
pub fn derive_type(expr: &Expr, scope: &Scope) -> Result<Option<Type>> {
    let mut g = Generator::with_scope(scope.clone(), None);
    Ok(g.g_expr(expr)?.map(|operand| operand.ty))
}

fn g_function(signatures: &Scope, func: &ast::FuncDef) -> Result<ir::Function> {
    let mut g = Generator::new(signatures, func.return_ty);
    let mut args = Vec::with_capacity(func.params.len());
    for param in &func.params {
        type_checker::declare(&mut g.scope, param)?;
        args.push(ir::Arg {
            name: param.name.name.clone(),
            ty: param.ty,
        });
    }
    for var_def in &func.var_defs {
        g.g_var_def(var_def)?;
    }
    g.g_block(&func.body)?;
    Ok(g.finish(func.name.as_str(), args))
}

/// Generation state of a single function. Registers and labels are never
/// reused within it.
struct Generator {
    scope: Scope,
    return_ty: Option<Type>,
    next_reg: usize,
    next_label: usize,
    instrs: Vec<Code>,
}

/// Where a lowered expression left its value.
struct Operand {
    reg: Box<str>,
    ty: Type,
}

impl Generator {
    fn new(signatures: &Scope, return_ty: Option<Type>) -> Generator {
        Generator::with_scope(signatures.for_function(), return_ty)
    }

    fn with_scope(scope: Scope, return_ty: Option<Type>) -> Generator {
        Generator {
            scope,
            return_ty,
            next_reg: 0,
            next_label: 0,
            instrs: Vec::with_capacity(64),
        }
    }

    fn finish(self, name: &str, args: Vec<ir::Arg>) -> ir::Function {
        trace!(function = name, instrs = self.instrs.len(), "lowered function");
        ir::Function {
            name: name.into(),
            instrs: self.instrs,
            args,
            ty: self.return_ty,
        }
    }

    fn g_var_def(&mut self, def: &ast::VarDef) -> Result<()> {
        type_checker::var_def(&mut self.scope, def)?;
        let value = Value::from(def.initial_value());
        self.emit(Instr::constant(def.var.name.name.clone(), def.var.ty, value));
        Ok(())
    }

    fn g_block(&mut self, block: &[Stmt]) -> Result<()> {
        for stmt in block {
            self.g_stmt(stmt)?;
        }
        Ok(())
    }

    fn g_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Pass => {}
            StmtKind::Print(expr) => {
                let operand = self.g_value(expr)?;
                self.emit(Instr::effect(Op::Print, [operand.reg]));
            }
            StmtKind::Return(expr) => {
                let operand = match expr {
                    Some(expr) => Some(self.g_value(expr)?),
                    None => None,
                };
                let actual = operand.as_ref().map(|operand| operand.ty);
                type_checker::ret(self.return_ty, actual, stmt.span)?;
                self.emit(Instr::effect(Op::Ret, operand.map(|operand| operand.reg)));
            }
            StmtKind::Assign { target, value } => {
                let operand = self.g_value(value)?;
                let declared = type_checker::variable(&self.scope, target)?;
                type_checker::expect(declared, operand.ty).map_err(|e| stmt.span.wrap(e))?;
                self.emit(Instr::value(
                    Op::Id,
                    target.name.clone(),
                    declared,
                    [operand.reg],
                ));
            }
            StmtKind::If {
                cond,
                then_block,
                elifs,
                else_block,
            } => self.g_if(cond, then_block, elifs, else_block.as_deref())?,
            StmtKind::While { cond, body } => self.g_while(cond, body)?,
            StmtKind::For {
                iter,
                start,
                end,
                body,
            } => self.g_for(iter, *start, *end, body)?,
            StmtKind::Expr(expr) => {
                self.g_expr(expr)?;
            }
        }
        Ok(())
    }

    fn g_if(
        &mut self,
        cond: &Expr,
        then_block: &[Stmt],
        elifs: &[ElifClause],
        else_block: Option<&[Stmt]>,
    ) -> Result<()> {
        let l = self.fresh_label();
        let endif = format!("endif.{l}");

        self.g_branch(cond, then_block, &format!("then.{l}"), &format!("else.{l}"), &endif)?;
        for (k, elif) in (1..).zip(elifs) {
            let then_label = format!("then.{l}.{k}");
            let else_label = format!("else.{l}.{k}");
            self.g_branch(&elif.cond, &elif.block, &then_label, &else_label, &endif)?;
        }
        // The last alternative falls through into `endif`.
        if let Some(else_block) = else_block {
            self.g_block(else_block)?;
        }
        self.label(&endif);
        Ok(())
    }

    /// Lowers one conditional clause. Code emitted after it runs when the
    /// condition is false.
    fn g_branch(
        &mut self,
        cond: &Expr,
        block: &[Stmt],
        then_label: &str,
        else_label: &str,
        endif: &str,
    ) -> Result<()> {
        let cond = self.g_condition(cond)?;
        self.emit(Instr::br(cond, then_label, else_label));
        self.label(then_label);
        self.g_block(block)?;
        self.emit(Instr::jmp(endif));
        self.label(else_label);
        Ok(())
    }

    fn g_while(&mut self, cond: &Expr, body: &[Stmt]) -> Result<()> {
        let l = self.fresh_label();
        let (entry, body_label, exit) = (
            format!("entry.{l}"),
            format!("body.{l}"),
            format!("exit.{l}"),
        );

        self.label(&entry);
        let cond = self.g_condition(cond)?;
        self.emit(Instr::br(cond, &body_label, &exit));
        self.label(&body_label);
        self.g_block(body)?;
        self.emit(Instr::jmp(&entry));
        self.label(&exit);
        Ok(())
    }

    fn g_for(&mut self, iter: &Ident, start: i64, end: i64, body: &[Stmt]) -> Result<()> {
        type_checker::iteration_var(&mut self.scope, iter)?;
        let l = self.fresh_label();
        let (entry, body_label, exit) = (
            format!("entry.{l}"),
            format!("body.{l}"),
            format!("exit.{l}"),
        );
        let var = &iter.name;

        self.emit(Instr::constant(var.clone(), Type::Int, Value::Int(start)));
        let end_reg = self.fresh_reg();
        self.emit(Instr::constant(end_reg.clone(), Type::Int, Value::Int(end)));
        let one = self.fresh_reg();
        self.emit(Instr::constant(one.clone(), Type::Int, Value::Int(1)));

        self.label(&entry);
        let cond = self.fresh_reg();
        self.emit(Instr::value(
            Op::Lt,
            cond.clone(),
            Type::Bool,
            [var.clone(), end_reg],
        ));
        self.emit(Instr::br(cond, &body_label, &exit));
        self.label(&body_label);
        self.g_block(body)?;
        self.emit(Instr::value(Op::Add, var.clone(), Type::Int, [var.clone(), one]));
        self.emit(Instr::jmp(&entry));
        self.label(&exit);
        Ok(())
    }

    fn g_condition(&mut self, cond: &Expr) -> Result<Box<str>> {
        let operand = self.g_value(cond)?;
        type_checker::expect(Type::Bool, operand.ty).map_err(|e| cond.span.wrap(e))?;
        Ok(operand.reg)
    }

    /// Lowers an expression in statement position, where calls to functions
    /// without return type are allowed.
    fn g_expr(&mut self, expr: &Expr) -> Result<Option<Operand>> {
        match &expr.kind {
            ExprKind::Call { callee, args } => self.g_call(callee, args, expr.span),
            _ => self.g_value(expr).map(Some),
        }
    }

    fn g_value(&mut self, expr: &Expr) -> Result<Operand> {
        match &expr.kind {
            ExprKind::Literal(literal) => {
                let (dest, ty) = (self.fresh_reg(), literal.ty());
                self.emit(Instr::constant(dest.clone(), ty, Value::from(*literal)));
                Ok(Operand { reg: dest, ty })
            }
            ExprKind::Variable(ident) => {
                let ty = type_checker::variable(&self.scope, ident)?;
                let dest = self.fresh_reg();
                self.emit(Instr::value(Op::Id, dest.clone(), ty, [ident.name.clone()]));
                Ok(Operand { reg: dest, ty })
            }
            ExprKind::Call { callee, args } => {
                self.g_call(callee, args, expr.span)?.ok_or_else(|| {
                    expr.span.wrap(Error::NoValue {
                        name: callee.name.clone(),
                    })
                })
            }
            ExprKind::Unary { op, expr: operand } => {
                let operand = self.g_value(operand)?;
                let ty = type_checker::unary(*op, operand.ty).map_err(|e| expr.span.wrap(e))?;
                let dest = match op {
                    UnaryOperator::Not => {
                        let dest = self.fresh_reg();
                        self.emit(Instr::value(Op::Not, dest.clone(), ty, [operand.reg]));
                        dest
                    }
                    UnaryOperator::Neg => {
                        let minus_one = self.fresh_reg();
                        self.emit(Instr::constant(minus_one.clone(), ty, Value::Int(-1)));
                        let dest = self.fresh_reg();
                        self.emit(Instr::value(
                            Op::Mul,
                            dest.clone(),
                            ty,
                            [operand.reg, minus_one],
                        ));
                        dest
                    }
                };
                Ok(Operand { reg: dest, ty })
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.g_value(lhs)?;
                let rhs = self.g_value(rhs)?;
                let ty = type_checker::binary(*op, lhs.ty, rhs.ty).map_err(|e| expr.span.wrap(e))?;
                let dest = self.fresh_reg();
                self.g_binary(*op, &dest, ty, lhs.reg, rhs.reg);
                Ok(Operand { reg: dest, ty })
            }
        }
    }

    fn g_binary(&mut self, op: BinaryOperator, dest: &str, ty: Type, lhs: Box<str>, rhs: Box<str>) {
        use BinaryOperator::*;
        let op = match op {
            Add => Op::Add,
            Sub => Op::Sub,
            Mul => Op::Mul,
            Div => Op::Div,
            Eq => Op::Eq,
            Lt => Op::Lt,
            Gt => Op::Gt,
            Le => Op::Le,
            Ge => Op::Ge,
            And => Op::And,
            Or => Op::Or,
            NotEq => {
                self.emit(Instr::value(Op::Eq, dest, ty, [lhs, rhs]));
                self.emit(Instr::value(Op::Not, dest, ty, [dest]));
                return;
            }
            Mod => {
                // a - (a / b) * b, which truncates like `div` does.
                self.emit(Instr::value(Op::Div, dest, ty, [lhs.clone(), rhs.clone()]));
                self.emit(Instr::value(Op::Mul, dest, ty, [dest.into(), rhs]));
                self.emit(Instr::value(Op::Sub, dest, ty, [lhs, dest.into()]));
                return;
            }
        };
        self.emit(Instr::value(op, dest, ty, [lhs, rhs]));
    }

    fn g_call(&mut self, callee: &Ident, args: &[Expr], span: Span) -> Result<Option<Operand>> {
        let sig = type_checker::callee(&self.scope, callee, args.len(), span)?.clone();
        let mut regs = Vec::with_capacity(args.len());
        for (arg, &param) in args.iter().zip(&sig.params) {
            let operand = self.g_value(arg)?;
            type_checker::expect(param, operand.ty).map_err(|e| arg.span.wrap(e))?;
            regs.push(operand.reg);
        }
        let dest = sig.ret.map(|ty| (self.fresh_reg(), ty));
        self.emit(Instr::call(callee.as_str(), dest.clone(), regs));
        Ok(dest.map(|(reg, ty)| Operand { reg, ty }))
    }
}

// Utility functions.
impl Generator {
    fn emit(&mut self, instr: Instr) {
        self.instrs.push(Code::Instr(instr));
    }

    fn label(&mut self, label: &str) {
        self.instrs.push(Code::Label {
            label: label.into(),
        });
    }

    /// Registers contain a `.`, which no source identifier can, so they never
    /// shadow a variable.
    fn fresh_reg(&mut self) -> Box<str> {
        let reg = format!("r.{}", self.next_reg);
        self.next_reg += 1;
        reg.into()
    }

    fn fresh_label(&mut self) -> usize {
        let label = self.next_label;
        self.next_label += 1;
        label
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use crate::{
        codegen::ir::{Code, Op},
        compile,
        util::test_utils::{execute, tree_tests},
    };

    tree_tests!(
        use codegen;

        fn test_global_variable_and_print() {
            let program = indoc! {"
                x: int = 5
                print(x)
            "};
            let ir_ok = "
                @main {
                  x: int = const 5;
                  r.0: int = id x;
                  print r.0;
                }
            ";
        }

        fn test_if_else_in_function() {
            let program = indoc! {"
                def max(a: int, b: int):
                    if a > b:
                        print(a)
                    else:
                        print(b)
            "};
            let ir_ok = "
                @main {
                }
                @max(a: int, b: int) {
                  r.0: int = id a;
                  r.1: int = id b;
                  r.2: bool = gt r.0 r.1;
                  br r.2 .then.0 .else.0;
                .then.0:
                  r.3: int = id a;
                  print r.3;
                  jmp .endif.0;
                .else.0:
                  r.4: int = id b;
                  print r.4;
                .endif.0:
                }
            ";
        }

        fn test_elif_chain() {
            let program = indoc! {"
                n: int = 2
                if n == 1:
                    print(10)
                elif n == 2:
                    print(20)
                elif n == 3:
                    pass
                else:
                    print(0)
            "};
            let ir_ok = "
                @main {
                  n: int = const 2;
                  r.0: int = id n;
                  r.1: int = const 1;
                  r.2: bool = eq r.0 r.1;
                  br r.2 .then.0 .else.0;
                .then.0:
                  r.3: int = const 10;
                  print r.3;
                  jmp .endif.0;
                .else.0:
                  r.4: int = id n;
                  r.5: int = const 2;
                  r.6: bool = eq r.4 r.5;
                  br r.6 .then.0.1 .else.0.1;
                .then.0.1:
                  r.7: int = const 20;
                  print r.7;
                  jmp .endif.0;
                .else.0.1:
                  r.8: int = id n;
                  r.9: int = const 3;
                  r.10: bool = eq r.8 r.9;
                  br r.10 .then.0.2 .else.0.2;
                .then.0.2:
                  jmp .endif.0;
                .else.0.2:
                  r.11: int = const 0;
                  print r.11;
                .endif.0:
                }
            ";
        }

        fn test_while_loop() {
            let program = indoc! {"
                i: int = 0
                while i < 3:
                    i = i + 1
            "};
            let ir_ok = "
                @main {
                  i: int = const 0;
                .entry.0:
                  r.0: int = id i;
                  r.1: int = const 3;
                  r.2: bool = lt r.0 r.1;
                  br r.2 .body.0 .exit.0;
                .body.0:
                  r.3: int = id i;
                  r.4: int = const 1;
                  r.5: int = add r.3 r.4;
                  i: int = id r.5;
                  jmp .entry.0;
                .exit.0:
                }
            ";
        }

        fn test_for_loop() {
            let program = indoc! {"
                for i in range(3):
                    print(i)
            "};
            let ir_ok = "
                @main {
                  i: int = const 0;
                  r.0: int = const 3;
                  r.1: int = const 1;
                .entry.0:
                  r.2: bool = lt i r.0;
                  br r.2 .body.0 .exit.0;
                .body.0:
                  r.3: int = id i;
                  print r.3;
                  i: int = add i r.1;
                  jmp .entry.0;
                .exit.0:
                }
            ";
        }

        fn test_labels_are_unique_per_function() {
            let program = indoc! {"
                for i in range(1, 2):
                    while False:
                        pass
            "};
            let ir_ok = "
                @main {
                  i: int = const 1;
                  r.0: int = const 2;
                  r.1: int = const 1;
                .entry.0:
                  r.2: bool = lt i r.0;
                  br r.2 .body.0 .exit.0;
                .body.0:
                .entry.1:
                  r.3: bool = const false;
                  br r.3 .body.1 .exit.1;
                .body.1:
                  jmp .entry.1;
                .exit.1:
                  i: int = add i r.1;
                  jmp .entry.0;
                .exit.0:
                }
            ";
        }

        fn test_synthesized_operators() {
            let program = indoc! {"
                a: int = 7
                print(a % 3)
                print(-a)
                print(a != 1)
            "};
            let ir_ok = "
                @main {
                  a: int = const 7;
                  r.0: int = id a;
                  r.1: int = const 3;
                  r.2: int = div r.0 r.1;
                  r.2: int = mul r.2 r.1;
                  r.2: int = sub r.0 r.2;
                  print r.2;
                  r.3: int = id a;
                  r.4: int = const -1;
                  r.5: int = mul r.3 r.4;
                  print r.5;
                  r.6: int = id a;
                  r.7: int = const 1;
                  r.8: bool = eq r.6 r.7;
                  r.8: bool = not r.8;
                  print r.8;
                }
            ";
        }

        fn test_calls_and_returns() {
            let program = indoc! {"
                def square(n: int) -> int:
                    return n * n
                def show(v: int):
                    print(v)
                    return
                show(square(4))
            "};
            let ir_ok = "
                @main {
                  r.0: int = const 4;
                  r.1: int = call @square r.0;
                  call @show r.1;
                }
                @square(n: int): int {
                  r.0: int = id n;
                  r.1: int = id n;
                  r.2: int = mul r.0 r.1;
                  ret r.2;
                }
                @show(v: int) {
                  r.0: int = id v;
                  print r.0;
                  ret;
                }
            ";
        }

        fn test_locals_and_logic() {
            let program = indoc! {"
                def f(p: bool) -> bool:
                    q: bool = None
                    q = not p and True
                    return q
            "};
            let ir_ok = "
                @main {
                }
                @f(p: bool): bool {
                  q: bool = const false;
                  r.0: bool = id p;
                  r.1: bool = not r.0;
                  r.2: bool = const true;
                  r.3: bool = and r.1 r.2;
                  q: bool = id r.3;
                  r.4: bool = id q;
                  ret r.4;
                }
            ";
        }

        fn test_explicit_main_replaces_implicit_one() {
            let program = indoc! {"
                def main():
                    print(1)
            "};
            let ir_ok = "
                @main {
                  r.0: int = const 1;
                  print r.0;
                }
            ";
        }

        fn test_explicit_main_forbids_top_level_code() {
            let program = indoc! {"
                def main():
                    pass
                print(1)
            "};
            let expected_errors = &["type error at 21..29: top-level code is not allowed when `main` is defined"];
        }

        fn test_condition_must_be_bool() {
            let program = indoc! {"
                if 1:
                    pass
            "};
            let expected_errors = &["type error at 3..4: mismatched types: expected bool, found int"];
        }

        fn test_assignment_must_match_declaration() {
            let program = indoc! {"
                x: int = 0
                x = True
            "};
            let expected_errors = &["type error at 11..19: mismatched types: expected int, found bool"];
        }

        fn test_assignment_to_undeclared_variable() {
            let program = "y = 1\n";
            let expected_errors = &["type error at 0..1: undefined variable `y`"];
        }

        fn test_return_value_from_function_without_type() {
            let program = indoc! {"
                def f():
                    return 1
            "};
            let expected_errors = &["type error at 13..21: function has no return type, so it cannot return a value"];
        }

        fn test_bare_return_from_typed_function() {
            let program = indoc! {"
                def f() -> int:
                    return
            "};
            let expected_errors = &["type error at 20..26: expected a return value of type int"];
        }

        fn test_globals_are_not_visible_in_functions() {
            let program = indoc! {"
                g: int = 1
                def f():
                    print(g)
            "};
            let expected_errors = &["type error at 30..31: undefined variable `g`"];
        }

        fn test_call_without_value_in_expression() {
            let program = indoc! {"
                def f():
                    pass
                print(f())
            "};
            let expected_errors = &["type error at 24..27: `f` does not return a value"];
        }

        fn test_iteration_variable_must_be_int() {
            let program = indoc! {"
                b: bool = True
                for b in range(2):
                    pass
            "};
            let expected_errors = &["type error at 19..20: mismatched types: expected int, found bool"];
        }

        fn test_duplicate_parameter() {
            let program = indoc! {"
                def f(a: int, a: bool):
                    pass
            "};
            let expected_errors = &["type error at 14..15: `a` is defined more than once"];
        }

        fn test_var_def_type_mismatch() {
            let program = "flag: bool = 1\n";
            let expected_errors = &["type error at 0..14: mismatched types: expected bool, found int"];
        }
    );

    #[track_caller]
    fn run(src: &str) -> Vec<String> {
        execute(&compile(src).expect("failed to compile"))
    }

    #[test]
    fn test_for_loop_prints_in_order() {
        let src = indoc! {"
            for i in range(3):
                print(i)
        "};
        assert_eq!(run(src), ["0", "1", "2"]);
    }

    #[test]
    fn test_for_loop_with_empty_range() {
        let src = indoc! {"
            for i in range(5, 5):
                print(i)
            print(i)
        "};
        assert_eq!(run(src), ["5"]);
    }

    #[test]
    fn test_variables_named_like_registers() {
        let src = indoc! {"
            r0: int = 5
            r1: bool = True
            if r1:
                print(1 + r0)
        "};
        assert_eq!(run(src), ["6"]);
    }

    #[test]
    fn test_modulo() {
        let src = indoc! {"
            def mod(a: int, b: int) -> int:
                return a % b
            print(mod(7, 3))
        "};
        assert_eq!(run(src), ["1"]);
    }

    /// Known limitation: `%` is built on truncating division, so a negative
    /// dividend yields a negative remainder (floor modulo would give `2`).
    #[test]
    fn known_limitation_modulo_of_negative_operand_truncates() {
        let src = indoc! {"
            def mod(a: int, b: int) -> int:
                return a % b
            print(mod(-7, 3))
        "};
        assert_eq!(run(src), ["-1"]);
    }

    #[test]
    fn test_literal_expressions_evaluate_like_source() {
        let src = indoc! {"
            print(2 + 3 * 4 - 10 // 3)
            print((1 + 2) * -3)
            print(17 % 5)
            print(not (1 < 2) or 3 == 3)
            print(4 >= 4 and 2 != 2)
            print(--5 - 1)
        "};
        assert_eq!(run(src), ["11", "-9", "2", "true", "false", "4"]);
    }

    #[test]
    fn test_recursion_and_elif() {
        let src = indoc! {"
            def fib(n: int) -> int:
                if n < 2:
                    return n
                return fib(n - 1) + fib(n - 2)
            def sign(n: int) -> int:
                if n < 0:
                    return -1
                elif n == 0:
                    return 0
                else:
                    return 1
            print(fib(10))
            print(sign(-4))
            print(sign(0))
            print(sign(9))
        "};
        assert_eq!(run(src), ["55", "-1", "0", "1"]);
    }

    #[test]
    fn test_while_with_locals() {
        let src = indoc! {"
            def collatz(n: int) -> int:
                steps: int = 0
                while n != 1:
                    if n % 2 == 0:
                        n = n // 2
                    else:
                        n = 3 * n + 1
                    steps = steps + 1
                return steps
            print(collatz(6))
        "};
        assert_eq!(run(src), ["8"]);
    }

    #[test]
    fn test_print_order_follows_source() {
        let src = indoc! {"
            print(1)
            if True:
                print(2)
            print(3)
        "};
        let program = compile(src).unwrap();
        let printed: Vec<_> = program.functions[0]
            .instrs
            .iter()
            .filter_map(|code| match code {
                Code::Instr(instr) if instr.op == Op::Print => Some(&*instr.args[0]),
                _ => None,
            })
            .collect();
        assert_eq!(printed, ["r.0", "r.2", "r.3"]);
        assert_eq!(execute(&program), ["1", "2", "3"]);
    }

    #[test]
    fn test_expression_registers_are_fresh() {
        // Six literals and six operators.
        let src = "print((1 + 2) * (3 - 4) < 5 and not True)\n";
        let program = compile(src).unwrap();
        let dests: Vec<_> = program.functions[0]
            .instrs
            .iter()
            .filter_map(|code| match code {
                Code::Instr(instr) => instr.dest.as_deref(),
                Code::Label { .. } => None,
            })
            .collect();
        let mut unique = dests.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(dests.len(), 12);
        assert_eq!(unique.len(), dests.len());
    }

    #[test]
    fn test_json_output() {
        let src = indoc! {"
            def inc(n: int) -> int:
                return n + 1
            print(inc(1))
        "};
        let json = serde_json::to_value(compile(src).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "functions": [
                    {
                        "name": "main",
                        "instrs": [
                            {"op": "const", "dest": "r.0", "type": "int", "value": 1},
                            {"op": "call", "dest": "r.1", "type": "int", "args": ["r.0"], "funcs": ["inc"]},
                            {"op": "print", "args": ["r.1"]},
                        ],
                    },
                    {
                        "name": "inc",
                        "instrs": [
                            {"op": "id", "dest": "r.0", "type": "int", "args": ["n"]},
                            {"op": "const", "dest": "r.1", "type": "int", "value": 1},
                            {"op": "add", "dest": "r.2", "type": "int", "args": ["r.0", "r.1"]},
                            {"op": "ret", "args": ["r.2"]},
                        ],
                        "args": [{"name": "n", "type": "int"}],
                        "type": "int",
                    },
                ],
            })
        );
    }
}
