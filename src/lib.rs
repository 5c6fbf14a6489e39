use tracing::debug;

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The type checker holds the typing rules, which the code generator applies
/// while lowering.
pub mod type_checker;

/// The code generator lowers a checked AST into the three-address IR.
pub mod codegen {
    mod generator;
    pub mod ir;

    pub use generator::{derive_type, generate};
}

pub mod ast;
pub mod error;
pub mod token;
pub mod types;

pub use error::Error;


/// Compiles the provided source into IR.
pub fn compile(src: &str) -> Result<codegen::ir::Program, Error> {
    let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY);
    compile_with(src, &mut tokens)
}

/// Like [`compile`], but reuses the provided tokens buffer.
pub fn compile_with(
    src: &str,
    tokens: &mut Vec<token::Token>,
) -> Result<codegen::ir::Program, Error> {
    let program = parser::parse_program(src, tokens)?;
    let ir = codegen::generate(&program)?;
    debug!(
        tokens = tokens.len(),
        functions = ir.functions.len(),
        "compiled source"
    );
    Ok(ir)
}
