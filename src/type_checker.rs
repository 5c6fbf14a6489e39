use tracing::debug;

use crate::{
    ast::{BinaryOperator, Ident, Program, TypedVar, UnaryOperator, VarDef},
    token::{Span, Spanned},
    types::{FuncSig, Scope, Type},
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

pub fn binary(op: BinaryOperator, lhs: Type, rhs: Type) -> Result<Type, Error> {
    use BinaryOperator::*;
    let ty = match (op, lhs, rhs) {
        (Add | Sub | Mul | Div | Mod, Type::Int, Type::Int) => Type::Int,
        (Lt | Gt | Le | Ge, Type::Int, Type::Int) => Type::Bool,
        (Eq | NotEq, l, r) if l == r => Type::Bool,
        (And | Or, Type::Bool, Type::Bool) => Type::Bool,
        _ => return Err(Error::InvalidOperands { op, lhs, rhs }),
    };
    Ok(ty)
}

pub fn unary(op: UnaryOperator, ty: Type) -> Result<Type, Error> {
    match (op, ty) {
        (UnaryOperator::Not, Type::Bool) => Ok(Type::Bool),
        (UnaryOperator::Neg, Type::Int) => Ok(Type::Int),
        _ => Err(Error::InvalidOperand { op, ty }),
    }
}

/// Used for assignments, arguments and conditions, which all require an exact
/// type.
pub fn expect(expected: Type, actual: Type) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::Mismatch { expected, actual })
    }
}

pub fn variable(scope: &Scope, ident: &Ident) -> Result<Type> {
    scope.var(ident.as_str()).ok_or_else(|| {
        ident.span.wrap(Error::UndefinedName {
            name: ident.name.clone(),
        })
    })
}

/// Looks up the called function and checks the number of arguments. The
/// arguments' types are checked by the caller.
pub fn callee<'s>(scope: &'s Scope, name: &Ident, args: usize, span: Span) -> Result<&'s FuncSig> {
    let Some(sig) = scope.func(name.as_str()) else {
        return Err(name.span.wrap(Error::UndefinedFunction {
            name: name.name.clone(),
        }));
    };
    if sig.params.len() != args {
        return Err(span.wrap(Error::IncorrectNumberOfArguments {
            name: name.name.clone(),
            expected: sig.params.len(),
            actual: args,
        }));
    }
    Ok(sig)
}

/// Ensures a call used as a value actually produces one.
pub fn value_of(callee: &Ident, ret: Option<Type>, span: Span) -> Result<Type> {
    ret.ok_or_else(|| {
        span.wrap(Error::NoValue {
            name: callee.name.clone(),
        })
    })
}

/// Checks a `return` against the enclosing function's return type.
pub fn ret(return_ty: Option<Type>, actual: Option<Type>, span: Span) -> Result<()> {
    match (return_ty, actual) {
        (Some(expected), Some(actual)) => expect(expected, actual).map_err(|e| span.wrap(e)),
        (None, None) => Ok(()),
        (Some(expected), None) => Err(span.wrap(Error::MissingReturnValue { expected })),
        (None, Some(_)) => Err(span.wrap(Error::UnexpectedReturnValue)),
    }
}

/// Declares a parameter or a variable definition in the function's scope.
pub fn declare(scope: &mut Scope, var: &TypedVar) -> Result<()> {
    scope.declare_var(var.name.as_str(), var.ty).map_err(|()| {
        var.name.span.wrap(Error::DuplicateDefinition {
            name: var.name.name.clone(),
        })
    })
}

/// Checks the initializer of a variable definition and declares it.
pub fn var_def(scope: &mut Scope, def: &VarDef) -> Result<()> {
    if let Some(init) = def.init {
        expect(def.var.ty, init.ty()).map_err(|e| def.span.wrap(e))?;
    }
    declare(scope, &def.var)
}

/// A `for` iteration variable is implicitly an `int`. It may have been
/// declared before, but only as an `int`.
pub fn iteration_var(scope: &mut Scope, iter: &Ident) -> Result<()> {
    match scope.var(iter.as_str()) {
        Some(ty) => expect(Type::Int, ty).map_err(|e| iter.span.wrap(e)),
        None => {
            // Can't fail, the name is known to be free.
            _ = scope.declare_var(iter.as_str(), Type::Int);
            Ok(())
        }
    }
}

/// Builds the scope of function signatures shared by every function of the
/// program.
pub fn signatures(program: &Program) -> Result<Scope> {
    let mut scope = Scope::default();
    for func in &program.func_defs {
        let sig = FuncSig {
            params: func.params.iter().map(|param| param.ty).collect(),
            ret: func.return_ty,
        };
        scope
            .declare_func(func.name.as_str(), sig)
            .map_err(|()| {
                func.name.span.wrap(Error::DuplicateDefinition {
                    name: func.name.name.clone(),
                })
            })?;
    }
    debug!(functions = program.func_defs.len(), "declared signatures");
    Ok(scope)
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("undefined variable `{name}`")]
    UndefinedName { name: Box<str> },
    #[error("undefined function `{name}`")]
    UndefinedFunction { name: Box<str> },
    #[error("mismatched types: expected {expected}, found {actual}")]
    Mismatch { expected: Type, actual: Type },
    #[error("operator `{op}` cannot be applied to {lhs} and {rhs}")]
    InvalidOperands {
        op: BinaryOperator,
        lhs: Type,
        rhs: Type,
    },
    #[error("operator `{op}` cannot be applied to {ty}")]
    InvalidOperand { op: UnaryOperator, ty: Type },
    #[error("`{name}` does not return a value")]
    NoValue { name: Box<str> },
    #[error("expected {expected} argument(s) to `{name}`, found {actual}")]
    IncorrectNumberOfArguments {
        name: Box<str>,
        expected: usize,
        actual: usize,
    },
    #[error("`{name}` is defined more than once")]
    DuplicateDefinition { name: Box<str> },
    #[error("expected a return value of type {expected}")]
    MissingReturnValue { expected: Type },
    #[error("function has no return type, so it cannot return a value")]
    UnexpectedReturnValue,
    #[error("top-level code is not allowed when `main` is defined")]
    TopLevelCodeWithMain,
}
