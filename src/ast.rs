// program ::= (var_def | func_def)* stmt*
// var_def ::= ID ':' TYPE '=' literal NEWLINE
// func_def ::= def ID '(' [typed_var (',' typed_var)*] ')' ['->' TYPE] ':'
//              NEWLINE INDENT var_def* stmt+ DEDENT
// typed_var ::= ID ':' TYPE
// block ::= NEWLINE INDENT stmt+ DEDENT
// stmt ::= pass NEWLINE
//        | print '(' expr ')' NEWLINE
//        | return [expr] NEWLINE
//        | ID '=' expr NEWLINE
//        | if expr ':' block (elif expr ':' block)* [else ':' block]
//        | while expr ':' block
//        | for ID in range '(' NUM [',' NUM] ')' ':' block
//        | expr NEWLINE
// expr ::= expr binop expr
//        | not expr
//        | '-' expr
//        | ID '(' [expr (',' expr)*] ')'
//        | '(' expr ')'
//        | ID
//        | literal
// literal ::= NUM | True | False | None

// Precedence
//
// - (unary)
// * // %
// + -
// == != < <= > >=
// not
// and
// or

use std::fmt;

use crate::{token::Span, types::Type};

#[derive(Debug, PartialEq, Default)]
pub struct Program {
    pub var_defs: Vec<VarDef>,
    pub func_defs: Vec<FuncDef>,
    /// Top-level statements, which make up the implicit `main` function.
    pub body: Vec<Stmt>,
}

#[derive(Debug, PartialEq)]
pub struct VarDef {
    pub var: TypedVar,
    /// `None` means the default value of the declared type.
    pub init: Option<Literal>,
    pub span: Span,
}

impl VarDef {
    /// The value the variable starts with.
    pub fn initial_value(&self) -> Literal {
        self.init.unwrap_or_else(|| Literal::default_of(self.var.ty))
    }
}

#[derive(Debug, PartialEq)]
pub struct TypedVar {
    pub name: Ident,
    pub ty: Type,
}

#[derive(Debug, PartialEq)]
pub struct FuncDef {
    pub name: Ident,
    pub params: Vec<TypedVar>,
    pub return_ty: Option<Type>,
    pub var_defs: Vec<VarDef>,
    /// Non empty list of statements.
    pub body: Vec<Stmt>,
}

#[derive(Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum StmtKind {
    Pass,
    Print(Expr),
    Return(Option<Expr>),
    Assign {
        target: Ident,
        value: Expr,
    },
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        elifs: Vec<ElifClause>,
        else_block: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        iter: Ident,
        start: i64,
        /// Exclusive.
        end: i64,
        body: Vec<Stmt>,
    },
    Expr(Expr),
}

#[derive(Debug, PartialEq)]
pub struct ElifClause {
    pub cond: Expr,
    pub block: Vec<Stmt>,
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Variable(Ident),
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Int(i64),
    Bool(bool),
}

impl Literal {
    pub fn ty(self) -> Type {
        match self {
            Literal::Int(_) => Type::Int,
            Literal::Bool(_) => Type::Bool,
        }
    }

    pub fn default_of(ty: Type) -> Literal {
        match ty {
            Type::Int => Literal::Int(0),
            Type::Bool => Literal::Bool(false),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(int) => write!(f, "{int}"),
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Neg,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOperator::Not => "not",
            UnaryOperator::Neg => "-",
        })
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinaryOperator::*;
        f.write_str(match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "//",
            Mod => "%",
            Eq => "==",
            NotEq => "!=",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            And => "and",
            Or => "or",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ident {
    pub name: Box<str>,
    pub span: Span,
}

impl Ident {
    pub fn as_str(&self) -> &str {
        &self.name
    }
}
