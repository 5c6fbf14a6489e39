use std::{iter::Peekable, num::ParseIntError, str::Chars};

use tracing::debug;

use crate::token::{Span, Spanned, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// A line starting with this marker ends the program. Everything from it on
/// is ignored.
pub const END_MARKER: &str = "#!#";

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Lexes the provided string, producing the tokens into the provided buffer.
///
/// The produced sequence always ends with the implicit dedents of any still
/// open block, followed by [`TokenKind::Eof`].
pub fn lex(src: &str, tokens: &mut Vec<Token>) -> Result<()> {
    Lexer::new(src, tokens).lex()
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens)?;
    Ok(tokens)
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("unindent does not match any outer indentation level")]
    InconsistentDedent,
}

/// The lexer. Source is processed one logical line at a time; within a line,
/// characters are scanned with a single character of lookahead.
struct Lexer<'src, 'tok> {
    src: &'src str,
    iter: Peekable<Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    /// Indentation stack. Never empty: the bottom level is always zero.
    indents: Vec<usize>,
    tokens: &'tok mut Vec<Token>,
}

impl<'src> Lexer<'src, '_> {
    /// Scans the source string until the input is exhausted.
    ///
    /// Tokens are written into the provided tokens buffer.
    fn lex(mut self) -> Result<()> {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");

        let src = self.src;
        let mut end = src.len();
        let mut line_lo = 0;
        for raw in src.split_inclusive('\n') {
            let lo = line_lo;
            line_lo += raw.len();

            if raw.starts_with(END_MARKER) {
                end = lo;
                break;
            }
            let line = logical_line(raw);
            if line.is_empty() {
                continue;
            }

            let level = line.bytes().take_while(|b| *b == b' ').count();
            self.indentation(lo, level)?;
            self.scan_line(lo + level, &line[level..])?;
            self.produce_spanned(TokenKind::Newline, Span::new_of_length(lo + line.len(), 0));
        }

        while self.indents.len() > 1 {
            self.indents.pop();
            self.produce_spanned(TokenKind::Dedent, Span::new_of_length(end, 0));
        }
        self.produce_spanned(TokenKind::Eof, Span::new_of_length(end, 0));

        debug!(tokens = self.tokens.len(), "lexed source");
        Ok(())
    }

    /// Compares the indentation level of the line starting at `lo` against
    /// the indentation stack, emitting the corresponding indent or dedents.
    fn indentation(&mut self, lo: usize, level: usize) -> Result<()> {
        let at = Span::new_of_length(lo + level, 0);
        let mut top = self.top();
        if level > top {
            self.indents.push(level);
            self.produce_spanned(TokenKind::Indent, at);
            return Ok(());
        }
        while level < top {
            self.indents.pop();
            self.produce_spanned(TokenKind::Dedent, at);
            top = self.top();
        }
        if level != top {
            let span = Span::new_of_bounds(lo..lo + level);
            return Err(span.wrap(Error::InconsistentDedent));
        }
        Ok(())
    }

    /// Scans the tokens of a single line, which starts at the absolute offset
    /// `lo` and has already been stripped of indentation and comments.
    fn scan_line(&mut self, lo: usize, text: &'src str) -> Result<()> {
        self.iter = text.chars().peekable();
        self.cursor = lo;
        self.current_lo = lo;
        loop {
            while matches!(self.iter.peek(), Some(' ' | '\t')) {
                self.advance();
            }
            if self.iter.peek().is_none() {
                return Ok(());
            }
            let kind = self.scan_token_kind()?;
            self.produce(kind);
        }
    }

    /// Tries to scan the current character.
    fn scan_token_kind(&mut self) -> Result<TokenKind> {
        use TokenKind::*;
        let kind = match self.mark_advance() {
            '+' => Plus,
            '-' => match self.peek() {
                '>' => self.advance_with(Arrow),
                _ => Minus,
            },
            '*' => Star,
            '/' => match self.peek() {
                '/' => self.advance_with(SlashSlash),
                _ => return Err(self.unexpected('/')),
            },
            '%' => Percent,
            '=' => match self.peek() {
                '=' => self.advance_with(EqEq),
                _ => Assign,
            },
            '!' => match self.peek() {
                '=' => self.advance_with(NotEq),
                _ => return Err(self.unexpected('!')),
            },
            '<' => match self.peek() {
                '=' => self.advance_with(LessEq),
                _ => Less,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GreaterEq),
                _ => Greater,
            },
            '(' => LParen,
            ')' => RParen,
            ':' => Colon,
            ',' => Comma,
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            c => return Err(self.unexpected(c)),
        };
        Ok(kind)
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        let valid_identifier_suffix = |c: char| c.is_ascii_alphanumeric() || c == '_';
        while valid_identifier_suffix(self.peek()) {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        TokenKind::Number
    }

    fn unexpected(&self, c: char) -> Spanned<Error> {
        self.span().wrap(Error::UnexpectedChar(c))
    }
}

/// Strips the line terminator, any trailing comment and trailing blanks.
fn logical_line(raw: &str) -> &str {
    let line = raw.strip_suffix('\n').unwrap_or(raw);
    let line = line.strip_suffix('\r').unwrap_or(line);
    let line = match line.find('#') {
        Some(comment) => &line[..comment],
        None => line,
    };
    line.trim_end_matches([' ', '\t'])
}

impl Lexer<'_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            iter: "".chars().peekable(),
            cursor: 0,
            current_lo: 0,
            indents: vec![0],
            tokens,
        }
    }

    fn top(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.advance()
    }

    /// Returns the next character and advances the iterator.
    fn advance(&mut self) -> char {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
            .unwrap_or('\0')
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }

    /// Produces a token using the marked bounds.
    fn produce(&mut self, kind: TokenKind) {
        self.produce_spanned(kind, self.span());
    }

    /// Produces a token with the provided span.
    fn produce_spanned(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token::new(kind, span));
    }
}

pub mod extract {
    use super::*;

    pub fn int(token: Token, src: &str) -> Result<i64, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Number);
        token.span().substr(src).parse()
    }

    pub fn ident(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.span().substr(src).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex_in_new(src)
            .expect("failed to lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lex_error(src: &str) -> String {
        lex_in_new(src).expect_err("lexing should fail").to_string()
    }

    #[test]
    fn tests_with_span() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "+-*//%" => [
                (Plus, 0..1),
                (Minus, 1..2),
                (Star, 2..3),
                (SlashSlash, 3..5),
                (Percent, 5..6),
                (Newline, 6..6),
                (Eof, 6..6),
            ],
            "==!=<=>=->=<>" => [
                (EqEq, 0..2),
                (NotEq, 2..4),
                (LessEq, 4..6),
                (GreaterEq, 6..8),
                (Arrow, 8..10),
                (Assign, 10..11),
                (Less, 11..12),
                (Greater, 12..13),
                (Newline, 13..13),
                (Eof, 13..13),
            ],
            "print printer int bool True False None x_1 _y" => [
                (Print, 0..5),
                (Identifier, 6..13),
                (Int, 14..17),
                (Bool, 18..22),
                (True, 23..27),
                (False, 28..33),
                (None, 34..38),
                (Identifier, 39..42),
                (Identifier, 43..45),
                (Newline, 45..45),
                (Eof, 45..45),
            ],
            "12 007 3x" => [
                (Number, 0..2),
                (Number, 3..6),
                (Number, 7..8),
                (Identifier, 8..9),
                (Newline, 9..9),
                (Eof, 9..9),
            ],
            "f(a,\tb):  # trailing\r\n" => [
                (Identifier, 0..1),
                (LParen, 1..2),
                (Identifier, 2..3),
                (Comma, 3..4),
                (Identifier, 5..6),
                (RParen, 6..7),
                (Colon, 7..8),
                (Newline, 8..8),
                (Eof, 22..22),
            ],
            "if x:\n  pass\n" => [
                (If, 0..2),
                (Identifier, 3..4),
                (Colon, 4..5),
                (Newline, 5..5),
                (Indent, 8..8),
                (Pass, 8..12),
                (Newline, 12..12),
                (Dedent, 13..13),
                (Eof, 13..13),
            ],
        });

        for (input, tokens) in cases {
            let lexed = lex_in_new(input).expect("failed to lex");
            assert_eq!(lexed, tokens.as_slice());
        }
    }

    #[test]
    fn test_indent_and_dedent() {
        use TokenKind::*;
        let src = indoc! {"
            if x:
                pass
            print(x)
        "};
        assert_eq!(
            kinds(src),
            [
                If, Identifier, Colon, Newline, Indent, Pass, Newline, Dedent, Print, LParen,
                Identifier, RParen, Newline, Eof,
            ]
        );
    }

    #[test]
    fn test_trailing_dedents_are_implicit() {
        use TokenKind::*;
        let src = indoc! {"
            def f():
              if x:
                pass
        "};
        assert_eq!(
            kinds(src),
            [
                Def, Identifier, LParen, RParen, Colon, Newline, Indent, If, Identifier, Colon,
                Newline, Indent, Pass, Newline, Dedent, Dedent, Eof,
            ]
        );
    }

    #[test]
    fn test_multiple_dedents_on_one_line() {
        use TokenKind::*;
        let src = indoc! {"
            while a:
                while b:
                    pass
            pass
        "};
        assert_eq!(
            kinds(src),
            [
                While, Identifier, Colon, Newline, Indent, While, Identifier, Colon, Newline,
                Indent, Pass, Newline, Dedent, Dedent, Pass, Newline, Eof,
            ]
        );
    }

    #[test]
    fn test_blank_and_comment_lines_are_skipped() {
        use TokenKind::*;
        let src = "x = 1  # set\n\n      # indented comment\n\t\ny = 2";
        assert_eq!(
            kinds(src),
            [Identifier, Assign, Number, Newline, Identifier, Assign, Number, Newline, Eof]
        );
    }

    #[test]
    fn test_end_marker_stops_lexing() {
        use TokenKind::*;
        let src = indoc! {"
            def f():
                print(1)
            #!#
            import sys
            main(int(sys.argv[1]))
        "};
        assert_eq!(
            kinds(src),
            [
                Def, Identifier, LParen, RParen, Colon, Newline, Indent, Print, LParen, Number,
                RParen, Newline, Dedent, Eof,
            ]
        );
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), [TokenKind::Eof]);
        assert_eq!(kinds("\n\n# nothing\n"), [TokenKind::Eof]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(lex_error("x = $"), "4..5: unexpected character '$'");
        assert_eq!(lex_error("x / y"), "2..3: unexpected character '/'");
        assert_eq!(lex_error("x = !y"), "4..5: unexpected character '!'");
        assert_eq!(
            lex_error("if x:\n    pass\n  pass\n"),
            "15..17: unindent does not match any outer indentation level"
        );
    }

    #[test]
    fn test_extract() {
        let src = "answer = 42";
        let tokens = lex_in_new(src).unwrap();
        assert_eq!(&*extract::ident(tokens[0], src), "answer");
        assert_eq!(extract::int(tokens[2], src), Ok(42));
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $range:expr)),* $(,)?]),* $(,)?
        }) => {{
            &[$((
                $str,
                vec![
                    $(Token::new($kind, Span::new_of_bounds($range.start..$range.end))),*
                ],
            )),*]
        }};
    }
    use cases;
}
