use std::io::Write;

use crate::ast::*;

const INDENT_WIDTH: usize = 2;

pub fn print_program_string(program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, program).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_expr_string(expr: &Expr) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, 0, expr).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_program(w: &mut impl Write, program: &Program) -> std::io::Result<()> {
    for var_def in &program.var_defs {
        print_var_def(w, 0, var_def)?;
    }
    for func_def in &program.func_defs {
        print_func_def(w, 0, func_def)?;
    }
    print_block(w, 0, &program.body)
}

fn print_var_def(w: &mut impl Write, i: usize, var_def: &VarDef) -> std::io::Result<()> {
    sp(w, i)?;
    let TypedVar { name, ty } = &var_def.var;
    write!(w, "var {}: {ty} = ", name.as_str())?;
    match var_def.init {
        Some(literal) => write!(w, "{literal}")?,
        None => write!(w, "None")?,
    }
    writeln!(w, " ({})", var_def.span)
}

fn print_func_def(w: &mut impl Write, i: usize, func_def: &FuncDef) -> std::io::Result<()> {
    sp(w, i)?;
    write!(w, "def {}(", func_def.name.as_str())?;
    for (idx, param) in func_def.params.iter().enumerate() {
        if idx > 0 {
            write!(w, ", ")?;
        }
        write!(w, "{}: {}", param.name.as_str(), param.ty)?;
    }
    write!(w, ")")?;
    if let Some(return_ty) = func_def.return_ty {
        write!(w, " -> {return_ty}")?;
    }
    writeln!(w)?;
    for var_def in &func_def.var_defs {
        print_var_def(w, i + 1, var_def)?;
    }
    print_block(w, i + 1, &func_def.body)
}

fn print_block(w: &mut impl Write, i: usize, block: &[Stmt]) -> std::io::Result<()> {
    for stmt in block {
        print_stmt(w, i, stmt)?;
    }
    Ok(())
}

fn print_stmt(w: &mut impl Write, i: usize, stmt: &Stmt) -> std::io::Result<()> {
    sp(w, i)?;
    let span = stmt.span;
    match &stmt.kind {
        StmtKind::Pass => writeln!(w, "pass ({span})")?,
        StmtKind::Print(expr) => {
            writeln!(w, "print ({span})")?;
            print_expr(w, i + 1, expr)?;
        }
        StmtKind::Return(expr) => {
            writeln!(w, "return ({span})")?;
            if let Some(expr) = expr {
                print_expr(w, i + 1, expr)?;
            }
        }
        StmtKind::Assign { target, value } => {
            writeln!(w, "assign {} ({span})", target.as_str())?;
            print_expr(w, i + 1, value)?;
        }
        StmtKind::If {
            cond,
            then_block,
            elifs,
            else_block,
        } => {
            writeln!(w, "if ({span})")?;
            print_expr(w, i + 1, cond)?;
            print_labeled_block(w, i + 1, "then", then_block)?;
            for elif in elifs {
                sp(w, i + 1)?;
                writeln!(w, "elif")?;
                print_expr(w, i + 2, &elif.cond)?;
                print_labeled_block(w, i + 2, "then", &elif.block)?;
            }
            if let Some(else_block) = else_block {
                print_labeled_block(w, i + 1, "else", else_block)?;
            }
        }
        StmtKind::While { cond, body } => {
            writeln!(w, "while ({span})")?;
            print_expr(w, i + 1, cond)?;
            print_labeled_block(w, i + 1, "do", body)?;
        }
        StmtKind::For {
            iter,
            start,
            end,
            body,
        } => {
            writeln!(w, "for {} in range({start}, {end}) ({span})", iter.as_str())?;
            print_block(w, i + 1, body)?;
        }
        StmtKind::Expr(expr) => {
            writeln!(w, "expr ({span})")?;
            print_expr(w, i + 1, expr)?;
        }
    }
    Ok(())
}

fn print_labeled_block(
    w: &mut impl Write,
    i: usize,
    label: &str,
    block: &[Stmt],
) -> std::io::Result<()> {
    sp(w, i)?;
    writeln!(w, "{label}")?;
    print_block(w, i + 1, block)
}

pub fn print_expr(w: &mut impl Write, i: usize, expr: &Expr) -> std::io::Result<()> {
    sp(w, i)?;
    let span = expr.span;
    match &expr.kind {
        ExprKind::Literal(Literal::Int(val)) => {
            writeln!(w, "int {val} ({span})")?;
        }
        ExprKind::Literal(literal @ Literal::Bool(_)) => {
            writeln!(w, "bool {literal} ({span})")?;
        }
        ExprKind::Variable(ident) => {
            writeln!(w, "ident {} ({span})", ident.as_str())?;
        }
        ExprKind::Call { callee, args } => {
            writeln!(w, "call {} ({span})", callee.as_str())?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
        ExprKind::Unary {
            op,
            expr: inner_expr,
        } => {
            writeln!(w, "unary {op:?} ({span})")?;
            print_expr(w, i + 1, inner_expr)?;
        }
        ExprKind::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?} ({span})")?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)?;
        }
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
