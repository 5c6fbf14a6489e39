use tracing::debug;

use crate::{
    ast::{
        BinaryOperator, ElifClause, Expr, ExprKind, FuncDef, Ident, Literal, Program, Stmt,
        StmtKind, TypedVar, UnaryOperator, VarDef,
    },
    lexer::{self, extract},
    token::{Span, Spanned, Token, TokenKind},
    types::Type,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Lexes and parses a whole program.
///
/// The tokens buffer is cleared before use, so it may be reused between
/// calls.
pub fn parse_program(src: &str, tokens: &mut Vec<Token>) -> Result<Program, crate::Error> {
    let program = parse(src, tokens, Parser::parse_program)?;
    debug!(
        var_defs = program.var_defs.len(),
        func_defs = program.func_defs.len(),
        stmts = program.body.len(),
        "parsed program"
    );
    Ok(program)
}

/// Lexes and parses a source which holds a single expression.
pub fn parse_expr(src: &str, tokens: &mut Vec<Token>) -> Result<Expr, crate::Error> {
    parse(src, tokens, |p| {
        let expr = p.parse_expr()?;
        p.take(TokenKind::Newline);
        p.consume(TokenKind::Eof)?;
        Ok(expr)
    })
}

fn parse<'src, 'tok, T>(
    src: &'src str,
    tokens: &'tok mut Vec<Token>,
    f: impl FnOnce(&mut Parser<'src, 'tok>) -> Result<T>,
) -> Result<T, crate::Error> {
    tokens.clear();
    lexer::lex(src, tokens)?;
    let mut p = Parser::new(src, tokens);
    Ok(f(&mut p)?)
}

struct Parser<'src, 'tok> {
    src: &'src str,
    tokens: &'tok [Token],
    cursor: usize,
}

impl Parser<'_, '_> {
    fn parse_program(&mut self) -> Result<Program> {
        let mut program = Program::default();
        loop {
            match (self.peek().kind, self.peek_nth(1).kind) {
                (TokenKind::Identifier, TokenKind::Colon) => {
                    program.var_defs.push(self.parse_var_def()?);
                }
                (TokenKind::Def, _) => {
                    program.func_defs.push(self.parse_func_def()?);
                }
                _ => break,
            }
        }
        while !self.is(TokenKind::Eof) {
            program.body.push(self.parse_stmt()?);
        }
        self.consume(TokenKind::Eof)?;
        Ok(program)
    }

    fn parse_var_def(&mut self) -> Result<VarDef> {
        let var = self.parse_typed_var()?;
        self.consume(TokenKind::Assign)?;
        let token = self.advance();
        let init = match token.kind {
            TokenKind::Number => Some(Literal::Int(self.parse_int(token)?)),
            TokenKind::True => Some(Literal::Bool(true)),
            TokenKind::False => Some(Literal::Bool(false)),
            TokenKind::None => None,
            actual => return Err(token.span().wrap(Error::ExpectedLiteral { actual })),
        };
        self.consume(TokenKind::Newline)?;
        Ok(VarDef {
            span: var.name.span.to(token.span()),
            var,
            init,
        })
    }

    fn parse_func_def(&mut self) -> Result<FuncDef> {
        self.consume(TokenKind::Def)?;
        let name = self.parse_ident()?;

        self.consume(TokenKind::LParen)?;
        let params = self.parse_list(TokenKind::RParen, TokenKind::Comma, |p| {
            p.parse_typed_var()
        })?;
        self.consume(TokenKind::RParen)?;

        let return_ty = if self.take(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.consume(TokenKind::Colon)?;
        self.consume(TokenKind::Newline)?;
        self.consume(TokenKind::Indent)?;

        let mut var_defs = Vec::new();
        while self.is(TokenKind::Identifier) && self.peek_nth(1).kind == TokenKind::Colon {
            var_defs.push(self.parse_var_def()?);
        }
        let body = self.parse_block_rest()?;

        Ok(FuncDef {
            name,
            params,
            return_ty,
            var_defs,
            body,
        })
    }

    fn parse_typed_var(&mut self) -> Result<TypedVar> {
        let name = self.parse_ident()?;
        self.consume(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Ok(TypedVar { name, ty })
    }

    fn parse_type(&mut self) -> Result<Type> {
        let token = self.consume_any(&[TokenKind::Int, TokenKind::Bool])?;
        Ok(match token.kind {
            TokenKind::Bool => Type::Bool,
            _ => Type::Int,
        })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(Ident {
            name: extract::ident(token, self.src),
            span: token.span(),
        })
    }

    fn parse_int(&self, token: Token) -> Result<i64> {
        extract::int(token, self.src).map_err(|e| token.span().wrap(e.into()))
    }

    /// Parses `NEWLINE INDENT stmt+ DEDENT`.
    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.consume(TokenKind::Newline)?;
        self.consume(TokenKind::Indent)?;
        self.parse_block_rest()
    }

    /// Parses the `stmt+ DEDENT` part of a block, whose indent has already
    /// been consumed.
    fn parse_block_rest(&mut self) -> Result<Vec<Stmt>> {
        if self.is(TokenKind::Dedent) {
            return Err(self.peek().span().wrap(Error::EmptyBlock));
        }
        let mut stmts = Vec::with_capacity(4);
        while !self.take(TokenKind::Dedent) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let token = self.peek();
        let (kind, span) = match token.kind {
            TokenKind::Pass => {
                self.advance();
                (StmtKind::Pass, token.span())
            }
            TokenKind::Print => {
                self.advance();
                self.consume(TokenKind::LParen)?;
                let expr = self.parse_expr()?;
                let rparen = self.consume(TokenKind::RParen)?;
                (StmtKind::Print(expr), token.span().to(rparen.span()))
            }
            TokenKind::Return => {
                self.advance();
                if self.is(TokenKind::Newline) {
                    (StmtKind::Return(None), token.span())
                } else {
                    let expr = self.parse_expr()?;
                    let span = token.span().to(expr.span);
                    (StmtKind::Return(Some(expr)), span)
                }
            }
            TokenKind::Identifier if self.peek_nth(1).kind == TokenKind::Assign => {
                let target = self.parse_ident()?;
                self.advance(); // =
                let value = self.parse_expr()?;
                let span = target.span.to(value.span);
                (StmtKind::Assign { target, value }, span)
            }
            TokenKind::If => return self.parse_if(),
            TokenKind::While => return self.parse_while(),
            TokenKind::For => return self.parse_for(),
            _ => {
                let expr = self.parse_expr()?;
                let span = expr.span;
                (StmtKind::Expr(expr), span)
            }
        };
        self.consume(TokenKind::Newline)?;
        Ok(Stmt { kind, span })
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let start = self.consume(TokenKind::If)?.span();
        let cond = self.parse_expr()?;
        self.consume(TokenKind::Colon)?;
        let then_block = self.parse_block()?;

        let mut elifs = Vec::new();
        while self.take(TokenKind::Elif) {
            let cond = self.parse_expr()?;
            self.consume(TokenKind::Colon)?;
            let block = self.parse_block()?;
            elifs.push(ElifClause { cond, block });
        }

        let else_block = if self.take(TokenKind::Else) {
            self.consume(TokenKind::Colon)?;
            Some(self.parse_block()?)
        } else {
            None
        };

        let last_block = else_block
            .as_deref()
            .or_else(|| elifs.last().map(|elif| elif.block.as_slice()))
            .unwrap_or(&then_block);
        let span = block_span(start, last_block);
        let kind = StmtKind::If {
            cond,
            then_block,
            elifs,
            else_block,
        };
        Ok(Stmt { kind, span })
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        let start = self.consume(TokenKind::While)?.span();
        let cond = self.parse_expr()?;
        self.consume(TokenKind::Colon)?;
        let body = self.parse_block()?;
        Ok(Stmt {
            span: block_span(start, &body),
            kind: StmtKind::While { cond, body },
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let start = self.consume(TokenKind::For)?.span();
        let iter = self.parse_ident()?;
        self.consume(TokenKind::In)?;
        self.consume(TokenKind::Range)?;
        self.consume(TokenKind::LParen)?;
        let first = self.parse_bound()?;
        let (lo, hi) = if self.take(TokenKind::Comma) {
            (first, self.parse_bound()?)
        } else {
            (0, first)
        };
        self.consume(TokenKind::RParen)?;
        self.consume(TokenKind::Colon)?;
        let body = self.parse_block()?;
        Ok(Stmt {
            span: block_span(start, &body),
            kind: StmtKind::For {
                iter,
                start: lo,
                end: hi,
                body,
            },
        })
    }

    fn parse_bound(&mut self) -> Result<i64> {
        let token = self.consume(TokenKind::Number)?;
        self.parse_int(token)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let lhs_token = self.advance();
        let mut lhs = self.parse_nud(lhs_token)?;

        loop {
            let op_token = self.peek();

            if let Some((lbp, rbp)) = Self::infix_binding_power(op_token.kind) {
                if lbp < min_bp {
                    // Operator binds less tightly than the minimum required
                    break;
                }

                self.advance(); // Operator
                lhs = self.parse_led(op_token, lhs, rbp)?;
            } else {
                break;
            }
        }

        Ok(lhs)
    }

    /// nud: Parses tokens that start an expression
    /// (prefix operators, literals, calls, grouping)
    fn parse_nud(&mut self, token: Token) -> Result<Expr> {
        let (kind, span) = match token.kind {
            TokenKind::Identifier if self.is(TokenKind::LParen) => {
                let callee = Ident {
                    name: extract::ident(token, self.src),
                    span: token.span(),
                };
                self.advance(); // (
                let args = self.parse_list(TokenKind::RParen, TokenKind::Comma, |p| {
                    p.parse_expr()
                })?;
                let rparen = self.consume(TokenKind::RParen)?;
                (
                    ExprKind::Call { callee, args },
                    token.span().to(rparen.span()),
                )
            }
            TokenKind::Identifier => {
                let ident = Ident {
                    name: extract::ident(token, self.src),
                    span: token.span(),
                };
                (ExprKind::Variable(ident), token.span())
            }
            TokenKind::Number => {
                let int = self.parse_int(token)?;
                (ExprKind::Literal(Literal::Int(int)), token.span())
            }
            TokenKind::True => (ExprKind::Literal(Literal::Bool(true)), token.span()),
            TokenKind::False => (ExprKind::Literal(Literal::Bool(false)), token.span()),
            TokenKind::LParen => {
                // Grouping leaves no node of its own; only the span widens.
                let inner = self.parse_expr()?;
                let rparen = self.consume(TokenKind::RParen)?;
                (inner.kind, token.span().to(rparen.span()))
            }
            kind @ (TokenKind::Not | TokenKind::Minus) => {
                let ((), rbp) = Self::prefix_binding_power(kind);
                let op = match kind {
                    TokenKind::Not => UnaryOperator::Not,
                    _ => UnaryOperator::Neg,
                };
                let expr = self.parse_expr_bp(rbp)?;
                let span = token.span().to(expr.span);
                (
                    ExprKind::Unary {
                        op,
                        expr: Box::new(expr),
                    },
                    span,
                )
            }
            _ => {
                return Err(token
                    .span()
                    .wrap(Error::UnexpectedTokenInExpr { token: token.kind }));
            }
        };
        Ok(Expr { kind, span })
    }

    /// led: Parses the right-hand side of a binary operator, whose token has
    /// already been consumed.
    fn parse_led(&mut self, op_token: Token, lhs: Expr, rbp: u8) -> Result<Expr> {
        use BinaryOperator::*;
        let op = match op_token.kind {
            TokenKind::Plus => Add,
            TokenKind::Minus => Sub,
            TokenKind::Star => Mul,
            TokenKind::SlashSlash => Div,
            TokenKind::Percent => Mod,
            TokenKind::EqEq => Eq,
            TokenKind::NotEq => NotEq,
            TokenKind::Less => Lt,
            TokenKind::Greater => Gt,
            TokenKind::LessEq => Le,
            TokenKind::GreaterEq => Ge,
            TokenKind::And => And,
            TokenKind::Or => Or,
            actual => {
                return Err(op_token
                    .span()
                    .wrap(Error::UnexpectedOperator { actual }));
            }
        };
        let rhs = self.parse_expr_bp(rbp)?;
        Ok(Expr {
            span: lhs.span.to(rhs.span),
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        })
    }

    /// Parses `item (delim item)*` until `end_delim` is found. Does **NOT**
    /// consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        separator: TokenKind,
        parse_item: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        debug_assert_ne!(end_delim, separator);

        let mut items = Vec::new();
        while !self.is(end_delim) {
            items.push(parse_item(self)?);

            // After consuming an item, we must consume the separator, unless
            // the list ends right there.
            if !self.take(separator) {
                if self.is(end_delim) {
                    break;
                }
                let c = self.peek();
                return Err(c.span().wrap(Error::UnexpectedAny {
                    actual: c.kind,
                    expected: Box::from([separator, end_delim]),
                }));
            }
        }
        Ok(items)
    }

    /// Left-associative levels use `(prec, prec + 1)`.
    fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8)> {
        let bp = match kind {
            TokenKind::Or => (2, 3),
            TokenKind::And => (3, 4),

            // `not` (level 4) is prefix only.
            TokenKind::EqEq
            | TokenKind::NotEq
            | TokenKind::Less
            | TokenKind::LessEq
            | TokenKind::Greater
            | TokenKind::GreaterEq => (5, 6),

            TokenKind::Plus | TokenKind::Minus => (6, 7),

            TokenKind::Star | TokenKind::SlashSlash | TokenKind::Percent => (7, 8),

            _ => return None,
        };
        Some(bp)
    }

    // Prefix operators. The operand is parsed with the operator's own level
    // as the minimum.
    fn prefix_binding_power(kind: TokenKind) -> ((), u8) {
        match kind {
            TokenKind::Not => ((), 4),
            // Unary minus
            _ => ((), 8),
        }
    }
}

/// Returns the span from `start` up to the end of the block's last statement.
fn block_span(start: Span, block: &[Stmt]) -> Span {
    block.last().map_or(start, |last| start.to(last.span))
}

impl Parser<'_, '_> {
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok [Token]) -> Parser<'src, 'tok> {
        Parser {
            src,
            tokens,
            cursor: 0,
        }
    }

    /// Returns the current token.
    #[inline]
    fn peek(&self) -> Token {
        self.peek_nth(0)
    }

    /// Returns the token `n` positions past the current one.
    fn peek_nth(&self, n: usize) -> Token {
        match self.tokens.get(self.cursor + n) {
            Some(token) => *token,
            None => Token::eof_for(self.src),
        }
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        if !c.is_eof() {
            self.cursor += 1;
        }
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, fails.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if self.is(expect) {
            self.advance();
            Ok(c)
        } else {
            Err(c.span().wrap(Error::Unexpected {
                actual: c.kind,
                expected: expect,
            }))
        }
    }

    /// Advances if the current token matches any of the provided tokens,
    /// returning it. If not, fails.
    fn consume_any(&mut self, expect: &'static [TokenKind]) -> Result<Token> {
        for t in expect {
            if self.is(*t) {
                return Ok(self.advance());
            }
        }
        let c = self.peek();
        Err(c.span().wrap(Error::UnexpectedAny {
            actual: c.kind,
            expected: Box::from(expect),
        }))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unexpected token {token:?} in expression")]
    UnexpectedTokenInExpr { token: TokenKind },
    #[error("expected token {expected:?}, but got {actual:?}")]
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    #[error("expected one of {expected:?}, but got {actual:?}")]
    UnexpectedAny {
        actual: TokenKind,
        expected: Box<[TokenKind]>,
    },
    #[error("unexpected operator {actual:?}")]
    UnexpectedOperator { actual: TokenKind },
    #[error("expected a literal, but got {actual:?}")]
    ExpectedLiteral { actual: TokenKind },
    #[error("expected at least one statement in block")]
    EmptyBlock,
    #[error("integer literal out of range")]
    IntOutOfRange,
}

impl From<std::num::ParseIntError> for Error {
    fn from(_: std::num::ParseIntError) -> Self {
        Error::IntOutOfRange
    }
}
