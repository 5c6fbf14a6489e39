use std::collections::HashMap;

use crate::{
    codegen::{
        self,
        ir::{self, Code, Op},
    },
    parser,
    types::{FuncSig, Scope, Type},
    util::fmt::tree,
};

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    ParserExpr(&'static str),
    CheckerExpr(&'static str),
    Codegen(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

/// The scope expressions are checked against: `a` and `b` are ints, `p` and
/// `q` are bools, `inc(int) -> int`, `both(int, bool) -> bool` and
/// `log(int)`, which returns nothing.
pub fn checker_scope() -> Scope {
    let mut scope = Scope::default();
    for (name, ty) in [
        ("a", Type::Int),
        ("b", Type::Int),
        ("p", Type::Bool),
        ("q", Type::Bool),
    ] {
        scope.declare_var(name, ty).unwrap();
    }
    let funcs = [
        ("inc", vec![Type::Int], Some(Type::Int)),
        ("both", vec![Type::Int, Type::Bool], Some(Type::Bool)),
        ("log", vec![Type::Int], None),
    ];
    for (name, params, ret) in funcs {
        scope.declare_func(name, FuncSig { params, ret }).unwrap();
    }
    scope
}

/// Runs the stage under test, returning its formatted output (empty on
/// failure) and the formatted errors.
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let tokens_buf = &mut Vec::with_capacity(1024);

    let result = match test {
        Test::ParserProgram(input) => {
            parser::parse_program(input, tokens_buf).map(|prog| tree::print_program_string(&prog))
        }
        Test::ParserExpr(input) => {
            parser::parse_expr(input, tokens_buf).map(|expr| tree::print_expr_string(&expr))
        }
        Test::CheckerExpr(input) => parser::parse_expr(input, tokens_buf).and_then(|expr| {
            let ty = codegen::derive_type(&expr, &checker_scope())?;
            Ok(ty.map_or("none", Type::name).to_owned())
        }),
        Test::Codegen(input) => parser::parse_program(input, tokens_buf)
            .and_then(|prog| codegen::generate(&prog))
            .map(|ir| ir.to_string()),
    };

    match result {
        Ok(formatted) => (formatted, vec![]),
        Err(error) => (String::new(), vec![error.to_string()]),
    }
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors)
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, ty_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk($expected)
    };
    (@@assertion, ir_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
    (@@get_test(checker, expr), $source:expr) => {
        crate::util::test_utils::Test::CheckerExpr($source)
    };
    (@@get_test(codegen, program), $source:expr) => {
        crate::util::test_utils::Test::Codegen($source)
    };
}
pub(crate) use tree_tests;

/// A runtime value of the IR.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Val {
    Int(i64),
    Bool(bool),
}

impl Val {
    fn int(self) -> i64 {
        match self {
            Val::Int(int) => int,
            Val::Bool(_) => panic!("expected int, got {self:?}"),
        }
    }

    fn bool(self) -> bool {
        match self {
            Val::Bool(bool) => bool,
            Val::Int(_) => panic!("expected bool, got {self:?}"),
        }
    }
}

impl std::fmt::Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Val::Int(int) => write!(f, "{int}"),
            Val::Bool(bool) => write!(f, "{bool}"),
        }
    }
}

const FUEL: usize = 1_000_000;

/// Runs `main` under the reference semantics of the IR and returns the
/// printed lines.
pub fn execute(program: &ir::Program) -> Vec<String> {
    let mut out = Vec::new();
    let mut fuel = FUEL;
    call(program, "main", Vec::new(), &mut out, &mut fuel);
    out
}

fn call(
    program: &ir::Program,
    name: &str,
    args: Vec<Val>,
    out: &mut Vec<String>,
    fuel: &mut usize,
) -> Option<Val> {
    let func = program
        .functions
        .iter()
        .find(|f| &*f.name == name)
        .unwrap_or_else(|| panic!("no function named {name}"));
    assert_eq!(func.args.len(), args.len(), "bad call to {name}");

    let labels: HashMap<&str, usize> = func
        .instrs
        .iter()
        .enumerate()
        .filter_map(|(i, code)| match code {
            Code::Label { label } => Some((&**label, i)),
            Code::Instr(_) => None,
        })
        .collect();
    let mut env: HashMap<&str, Val> = func.args.iter().map(|a| &*a.name).zip(args).collect();

    let mut pc = 0;
    while let Some(code) = func.instrs.get(pc) {
        pc += 1;
        *fuel = fuel.checked_sub(1).expect("program ran out of fuel");
        let Code::Instr(instr) = code else {
            continue;
        };
        let arg = |i: usize| env[&*instr.args[i]];

        let result = match instr.op {
            Op::Const => Some(match instr.value.expect("const without value") {
                ir::Value::Int(int) => Val::Int(int),
                ir::Value::Bool(bool) => Val::Bool(bool),
            }),
            Op::Id => Some(arg(0)),
            Op::Add => Some(Val::Int(arg(0).int() + arg(1).int())),
            Op::Sub => Some(Val::Int(arg(0).int() - arg(1).int())),
            Op::Mul => Some(Val::Int(arg(0).int() * arg(1).int())),
            Op::Div => Some(Val::Int(arg(0).int() / arg(1).int())),
            Op::Not => Some(Val::Bool(!arg(0).bool())),
            Op::And => Some(Val::Bool(arg(0).bool() && arg(1).bool())),
            Op::Or => Some(Val::Bool(arg(0).bool() || arg(1).bool())),
            Op::Eq => Some(Val::Bool(arg(0) == arg(1))),
            Op::Lt => Some(Val::Bool(arg(0).int() < arg(1).int())),
            Op::Gt => Some(Val::Bool(arg(0).int() > arg(1).int())),
            Op::Le => Some(Val::Bool(arg(0).int() <= arg(1).int())),
            Op::Ge => Some(Val::Bool(arg(0).int() >= arg(1).int())),
            Op::Print => {
                let line: Vec<_> = (0..instr.args.len()).map(|i| arg(i).to_string()).collect();
                out.push(line.join(" "));
                None
            }
            Op::Ret => return instr.args.first().map(|reg| env[&**reg]),
            Op::Call => {
                let vals = (0..instr.args.len()).map(arg).collect();
                call(program, &instr.funcs[0], vals, out, fuel)
            }
            Op::Br => {
                let target = if arg(0).bool() { 0 } else { 1 };
                pc = labels[&*instr.labels[target]];
                None
            }
            Op::Jmp => {
                pc = labels[&*instr.labels[0]];
                None
            }
        };

        if let Some(dest) = &instr.dest {
            let value = result.unwrap_or_else(|| panic!("{:?} produced no value", instr.op));
            env.insert(&**dest, value);
        }
    }
    None
}
