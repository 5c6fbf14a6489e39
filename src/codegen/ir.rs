//! The three-address IR emitted by the code generator.
//!
//! The serialized form is a JSON document shaped as
//! `{"functions": [{"name", "instrs", "args"?, "type"?}]}`, where each entry
//! of `instrs` is either an instruction or a `{"label": name}` marker.

use std::fmt;

use serde::Serialize;

use crate::{ast::Literal, types::Type};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Program {
    pub functions: Vec<Function>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Function {
    pub name: Box<str>,
    pub instrs: Vec<Code>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Arg>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Arg {
    pub name: Box<str>,
    #[serde(rename = "type")]
    pub ty: Type,
}

/// An entry of a function's instruction list.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Code {
    Label { label: Box<str> },
    Instr(Instr),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Instr {
    pub op: Op,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<Box<str>>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Box<str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub funcs: Vec<Box<str>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Box<str>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Const,
    Id,
    Add,
    Sub,
    Mul,
    Div,
    Not,
    And,
    Or,
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Print,
    Ret,
    Call,
    Br,
    Jmp,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Int(int) => Value::Int(int),
            Literal::Bool(bool) => Value::Bool(bool),
        }
    }
}

impl Instr {
    fn new(op: Op) -> Instr {
        Instr {
            op,
            dest: None,
            ty: None,
            args: Vec::new(),
            value: None,
            funcs: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn constant(dest: impl Into<Box<str>>, ty: Type, value: Value) -> Instr {
        Instr {
            dest: Some(dest.into()),
            ty: Some(ty),
            value: Some(value),
            ..Instr::new(Op::Const)
        }
    }

    /// An instruction which writes its result into `dest`.
    pub fn value<A>(op: Op, dest: impl Into<Box<str>>, ty: Type, args: A) -> Instr
    where
        A: IntoIterator,
        A::Item: Into<Box<str>>,
    {
        Instr {
            dest: Some(dest.into()),
            ty: Some(ty),
            args: args.into_iter().map(Into::into).collect(),
            ..Instr::new(op)
        }
    }

    /// An instruction which produces no result.
    pub fn effect<A>(op: Op, args: A) -> Instr
    where
        A: IntoIterator,
        A::Item: Into<Box<str>>,
    {
        Instr {
            args: args.into_iter().map(Into::into).collect(),
            ..Instr::new(op)
        }
    }

    /// A call, with a destination only when the callee returns a value.
    pub fn call(func: &str, dest: Option<(Box<str>, Type)>, args: Vec<Box<str>>) -> Instr {
        let (dest, ty) = dest.unzip();
        Instr {
            dest,
            ty,
            args,
            funcs: vec![func.into()],
            ..Instr::new(Op::Call)
        }
    }

    pub fn br(cond: impl Into<Box<str>>, then_label: &str, else_label: &str) -> Instr {
        Instr {
            args: vec![cond.into()],
            labels: vec![then_label.into(), else_label.into()],
            ..Instr::new(Op::Br)
        }
    }

    pub fn jmp(target: &str) -> Instr {
        Instr {
            labels: vec![target.into()],
            ..Instr::new(Op::Jmp)
        }
    }
}

impl Op {
    pub fn name(self) -> &'static str {
        use Op::*;
        match self {
            Const => "const",
            Id => "id",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Not => "not",
            And => "and",
            Or => "or",
            Eq => "eq",
            Lt => "lt",
            Gt => "gt",
            Le => "le",
            Ge => "ge",
            Print => "print",
            Ret => "ret",
            Call => "call",
            Br => "br",
            Jmp => "jmp",
        }
    }
}

// The textual form below follows the usual Bril text syntax. It is what the
// driver prints with `--text`.

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for function in &self.functions {
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if !self.args.is_empty() {
            f.write_str("(")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}: {}", arg.name, arg.ty)?;
            }
            f.write_str(")")?;
        }
        if let Some(ty) = self.ty {
            write!(f, ": {ty}")?;
        }
        writeln!(f, " {{")?;
        for code in &self.instrs {
            match code {
                Code::Label { label } => writeln!(f, ".{label}:")?,
                Code::Instr(instr) => writeln!(f, "  {instr};")?,
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(dest), Some(ty)) = (&self.dest, self.ty) {
            write!(f, "{dest}: {ty} = ")?;
        }
        f.write_str(self.op.name())?;
        if let Some(value) = self.value {
            match value {
                Value::Int(int) => write!(f, " {int}")?,
                Value::Bool(bool) => write!(f, " {bool}")?,
            }
        }
        for func in &self.funcs {
            write!(f, " @{func}")?;
        }
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        for label in &self.labels {
            write!(f, " .{label}")?;
        }
        Ok(())
    }
}
