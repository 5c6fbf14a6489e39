use std::{collections::HashMap, fmt};

use serde::Serialize;

/// The primitive types of the language.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Int,
    Bool,
}

impl Type {
    pub fn name(self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Bool => "bool",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The signature of a declared function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FuncSig {
    pub params: Vec<Type>,
    /// `None` for functions that produce no value.
    pub ret: Option<Type>,
}

/// Maps the names visible from within a single function to their types.
///
/// Variables and functions live in separate namespaces.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    vars: HashMap<Box<str>, Type>,
    funcs: HashMap<Box<str>, FuncSig>,
}

impl Scope {
    /// Returns a new scope which shares the function signatures of this one,
    /// but has no variables.
    pub fn for_function(&self) -> Scope {
        Scope {
            vars: HashMap::new(),
            funcs: self.funcs.clone(),
        }
    }

    pub fn var(&self, name: &str) -> Option<Type> {
        self.vars.get(name).copied()
    }

    pub fn func(&self, name: &str) -> Option<&FuncSig> {
        self.funcs.get(name)
    }

    /// Attempts to declare the provided variable.
    ///
    /// Fails if a variable with the same name is already declared.
    pub fn declare_var(&mut self, name: &str, ty: Type) -> Result<(), ()> {
        if self.vars.contains_key(name) {
            return Err(());
        }
        self.vars.insert(name.into(), ty);
        Ok(())
    }

    /// Attempts to declare the provided function.
    ///
    /// Fails if a function with the same name is already declared.
    pub fn declare_func(&mut self, name: &str, sig: FuncSig) -> Result<(), ()> {
        if self.funcs.contains_key(name) {
            return Err(());
        }
        self.funcs.insert(name.into(), sig);
        Ok(())
    }
}
