//! Lexer and recursive-descent parser for the build DSL.
//!
//! The language is line-oriented: newlines terminate statements except
//! inside `()`, `[]`, or `{}` grouping, where they are insignificant. Every
//! AST node records the file, line, and column of its first token so the
//! evaluator can point diagnostics at the exact source position.
//!
//! A parse error aborts immediately; a failed parse yields no AST.

use std::fmt;

use crate::diag::{Diagnostic, EvalResult, Span};

/// One lexical token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Ident(String),
    Int(i64),
    Str(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Assign,
    PlusAssign,

    EqEq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,

    And,
    Or,
    Not,
    In,

    Colon,
    Comma,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    If,
    Elif,
    Else,
    Endif,
    Foreach,
    Endforeach,
    Continue,
    Break,
    True,
    False,

    Newline,
    Eof,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ident(name) => return write!(f, "identifier '{name}'"),
            Self::Int(n) => return write!(f, "integer {n}"),
            Self::Str(_) => "string",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Slash => "'/'",
            Self::Percent => "'%'",
            Self::Assign => "'='",
            Self::PlusAssign => "'+='",
            Self::EqEq => "'=='",
            Self::Neq => "'!='",
            Self::Lt => "'<'",
            Self::Le => "'<='",
            Self::Gt => "'>'",
            Self::Ge => "'>='",
            Self::And => "'and'",
            Self::Or => "'or'",
            Self::Not => "'not'",
            Self::In => "'in'",
            Self::Colon => "':'",
            Self::Comma => "','",
            Self::Dot => "'.'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::If => "'if'",
            Self::Elif => "'elif'",
            Self::Else => "'else'",
            Self::Endif => "'endif'",
            Self::Foreach => "'foreach'",
            Self::Endforeach => "'endforeach'",
            Self::Continue => "'continue'",
            Self::Break => "'break'",
            Self::True => "'true'",
            Self::False => "'false'",
            Self::Newline => "end of line",
            Self::Eof => "end of file",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
struct TokLoc {
    tok: Tok,
    span: Span,
}

// ----- lexer -----

struct Lexer<'src> {
    src: &'src [u8],
    pos: usize,
    line: u32,
    col: u32,
    file: u32,
    bracket_depth: u32,
    out: Vec<TokLoc>,
}

/// Tokenizes `src`. `file` is the workspace source-table index recorded in
/// every span.
fn lex(src: &str, file: u32) -> EvalResult<Vec<TokLoc>> {
    let mut lx = Lexer {
        src: src.as_bytes(),
        pos: 0,
        line: 1,
        col: 1,
        file,
        bracket_depth: 0,
        out: Vec::new(),
    };
    lx.run()?;
    Ok(lx.out)
}

impl Lexer<'_> {
    fn span(&self) -> Span {
        Span::new(self.file, self.line, self.col)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn emit(&mut self, tok: Tok, span: Span) {
        self.out.push(TokLoc { tok, span });
    }

    fn run(&mut self) -> EvalResult<()> {
        while let Some(b) = self.peek() {
            let span = self.span();
            match b {
                b' ' | b'\t' | b'\r' => {
                    self.bump();
                }
                b'\\' if self.peek2() == Some(b'\n') => {
                    // Line continuation.
                    self.bump();
                    self.bump();
                }
                b'#' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                b'\n' => {
                    self.bump();
                    if self.bracket_depth == 0 && !matches!(self.out.last().map(|t| &t.tok), Some(Tok::Newline) | None)
                    {
                        self.emit(Tok::Newline, span);
                    }
                }
                b'\'' => self.string(span)?,
                b'0'..=b'9' => self.number(span)?,
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.ident(span),
                _ => self.operator(span)?,
            }
        }
        let span = self.span();
        if !matches!(self.out.last().map(|t| &t.tok), Some(Tok::Newline) | None) {
            self.emit(Tok::Newline, span);
        }
        self.emit(Tok::Eof, span);
        Ok(())
    }

    fn number(&mut self, span: Span) -> EvalResult<()> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).expect("digits are ASCII");
        let n: i64 = text
            .parse()
            .map_err(|_| Diagnostic::lex(format!("integer literal '{text}' out of range"), span))?;
        self.emit(Tok::Int(n), span);
        Ok(())
    }

    fn ident(&mut self, span: Span) {
        let start = self.pos;
        while matches!(self.peek(), Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_')) {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).expect("identifier bytes are ASCII");
        let tok = match text {
            "if" => Tok::If,
            "elif" => Tok::Elif,
            "else" => Tok::Else,
            "endif" => Tok::Endif,
            "foreach" => Tok::Foreach,
            "endforeach" => Tok::Endforeach,
            "continue" => Tok::Continue,
            "break" => Tok::Break,
            "true" => Tok::True,
            "false" => Tok::False,
            "and" => Tok::And,
            "or" => Tok::Or,
            "not" => Tok::Not,
            "in" => Tok::In,
            _ => Tok::Ident(text.to_owned()),
        };
        self.emit(tok, span);
    }

    fn string(&mut self, span: Span) -> EvalResult<()> {
        self.bump(); // opening quote
        if self.peek() == Some(b'\'') && self.peek2() == Some(b'\'') {
            self.bump();
            self.bump();
            return self.triple_string(span);
        }

        let mut bytes = Vec::new();
        loop {
            match self.bump() {
                None | Some(b'\n') => {
                    return Err(Diagnostic::lex("unterminated string", span));
                }
                Some(b'\'') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => bytes.push(b'\n'),
                    Some(b't') => bytes.push(b'\t'),
                    Some(b'\'') => bytes.push(b'\''),
                    Some(b'\\') => bytes.push(b'\\'),
                    Some(other) => {
                        // Unknown escapes pass through verbatim.
                        bytes.push(b'\\');
                        bytes.push(other);
                    }
                    None => return Err(Diagnostic::lex("unterminated string", span)),
                },
                Some(b) => bytes.push(b),
            }
        }
        let text = String::from_utf8(bytes).map_err(|_| Diagnostic::lex("invalid UTF-8 in string", span))?;
        self.emit(Tok::Str(text), span);
        Ok(())
    }

    /// Triple-quoted strings are raw: no escapes, newlines allowed.
    fn triple_string(&mut self, span: Span) -> EvalResult<()> {
        let mut bytes = Vec::new();
        loop {
            if self.pos + 2 < self.src.len()
                && self.src[self.pos] == b'\''
                && self.src[self.pos + 1] == b'\''
                && self.src[self.pos + 2] == b'\''
            {
                self.bump();
                self.bump();
                self.bump();
                break;
            }
            match self.bump() {
                Some(b) => bytes.push(b),
                None => return Err(Diagnostic::lex("unterminated string", span)),
            }
        }
        let text = String::from_utf8(bytes).map_err(|_| Diagnostic::lex("invalid UTF-8 in string", span))?;
        self.emit(Tok::Str(text), span);
        Ok(())
    }

    fn operator(&mut self, span: Span) -> EvalResult<()> {
        let b = self.bump().expect("caller checked peek");
        let two = |lx: &mut Self, tok: Tok| {
            lx.bump();
            tok
        };
        let tok = match b {
            b'+' if self.peek() == Some(b'=') => two(self, Tok::PlusAssign),
            b'+' => Tok::Plus,
            b'-' => Tok::Minus,
            b'*' => Tok::Star,
            b'/' => Tok::Slash,
            b'%' => Tok::Percent,
            b'=' if self.peek() == Some(b'=') => two(self, Tok::EqEq),
            b'=' => Tok::Assign,
            b'!' if self.peek() == Some(b'=') => two(self, Tok::Neq),
            b'<' if self.peek() == Some(b'=') => two(self, Tok::Le),
            b'<' => Tok::Lt,
            b'>' if self.peek() == Some(b'=') => two(self, Tok::Ge),
            b'>' => Tok::Gt,
            b':' => Tok::Colon,
            b',' => Tok::Comma,
            b'.' => Tok::Dot,
            b'(' => {
                self.bracket_depth += 1;
                Tok::LParen
            }
            b')' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                Tok::RParen
            }
            b'[' => {
                self.bracket_depth += 1;
                Tok::LBracket
            }
            b']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                Tok::RBracket
            }
            b'{' => {
                self.bracket_depth += 1;
                Tok::LBrace
            }
            b'}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                Tok::RBrace
            }
            other => {
                return Err(Diagnostic::lex(
                    format!("unexpected character '{}'", other as char),
                    span,
                ));
            }
        };
        self.emit(tok, span);
        Ok(())
    }
}

// ----- AST -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    In,
    NotIn,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
            Self::In => "in",
            Self::NotIn => "not in",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnOp {
    Not,
    Neg,
}

/// An expression with its source position.
#[derive(Debug, Clone)]
pub(crate) struct ExprLoc {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Bool(bool),
    Int(i64),
    Str(String),
    Ident(String),
    Array(Vec<ExprLoc>),
    Dict(Vec<(ExprLoc, ExprLoc)>),
    Unary {
        op: UnOp,
        operand: Box<ExprLoc>,
    },
    Binary {
        op: BinOp,
        lhs: Box<ExprLoc>,
        rhs: Box<ExprLoc>,
    },
    Call {
        name: String,
        args: ArgList,
    },
    Method {
        receiver: Box<ExprLoc>,
        name: String,
        name_span: Span,
        args: ArgList,
    },
}

/// Call arguments as written: positionals in order plus keyword pairs.
#[derive(Debug, Clone, Default)]
pub(crate) struct ArgList {
    pub positional: Vec<ExprLoc>,
    pub keywords: Vec<(String, Span, ExprLoc)>,
}

#[derive(Debug, Clone)]
pub(crate) enum AssignOp {
    Assign,
    PlusAssign,
}

#[derive(Debug, Clone)]
pub(crate) struct IfBranch {
    /// None for the `else` branch.
    pub cond: Option<ExprLoc>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub(crate) enum Stmt {
    Expr(ExprLoc),
    Assign {
        name: String,
        span: Span,
        op: AssignOp,
        value: ExprLoc,
    },
    If {
        branches: Vec<IfBranch>,
    },
    Foreach {
        /// Loop variables: element, or key/value for dicts.
        vars: (String, Option<String>),
        span: Span,
        iterable: ExprLoc,
        body: Vec<Stmt>,
    },
    Continue(Span),
    Break(Span),
}

// ----- parser -----

/// Parses a whole source file into a statement list.
pub(crate) fn parse(src: &str, file: u32) -> EvalResult<Vec<Stmt>> {
    let toks = lex(src, file)?;
    let mut parser = Parser { toks, pos: 0 };
    let stmts = parser.block(&[])?;
    parser.expect_tok(&Tok::Eof)?;
    Ok(stmts)
}

struct Parser {
    toks: Vec<TokLoc>,
    pos: usize,
}

impl Parser {
    fn cur(&self) -> &TokLoc {
        &self.toks[self.pos.min(self.toks.len() - 1)]
    }

    fn peek_tok(&self) -> &Tok {
        &self.cur().tok
    }

    fn peek2_tok(&self) -> &Tok {
        &self.toks[(self.pos + 1).min(self.toks.len() - 1)].tok
    }

    fn span(&self) -> Span {
        self.cur().span
    }

    fn bump(&mut self) -> TokLoc {
        let t = self.cur().clone();
        if self.pos < self.toks.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek_tok() == tok {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_tok(&mut self, tok: &Tok) -> EvalResult<Span> {
        if self.peek_tok() == tok {
            Ok(self.bump().span)
        } else {
            Err(Diagnostic::parse(
                format!("expected {tok}, got {}", self.peek_tok()),
                self.span(),
            ))
        }
    }

    fn expect_ident(&mut self) -> EvalResult<(String, Span)> {
        match self.peek_tok() {
            Tok::Ident(_) => {
                let t = self.bump();
                let Tok::Ident(name) = t.tok else { unreachable!() };
                Ok((name, t.span))
            }
            other => Err(Diagnostic::parse(format!("expected identifier, got {other}"), self.span())),
        }
    }

    /// Skips blank lines between statements.
    fn skip_newlines(&mut self) {
        while self.eat(&Tok::Newline) {}
    }

    /// Parses statements until one of `terminators` (left unconsumed) or EOF.
    fn block(&mut self, terminators: &[Tok]) -> EvalResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            let tok = self.peek_tok();
            if *tok == Tok::Eof || terminators.contains(tok) {
                return Ok(stmts);
            }
            stmts.push(self.statement()?);
        }
    }

    fn statement(&mut self) -> EvalResult<Stmt> {
        match self.peek_tok() {
            Tok::If => self.if_statement(),
            Tok::Foreach => self.foreach_statement(),
            Tok::Continue => {
                let span = self.bump().span;
                self.end_of_statement()?;
                Ok(Stmt::Continue(span))
            }
            Tok::Break => {
                let span = self.bump().span;
                self.end_of_statement()?;
                Ok(Stmt::Break(span))
            }
            Tok::Ident(_) if matches!(self.peek2_tok(), Tok::Assign | Tok::PlusAssign) => {
                let (name, span) = self.expect_ident()?;
                let op = match self.bump().tok {
                    Tok::Assign => AssignOp::Assign,
                    Tok::PlusAssign => AssignOp::PlusAssign,
                    _ => unreachable!(),
                };
                let value = self.expression()?;
                self.end_of_statement()?;
                Ok(Stmt::Assign { name, span, op, value })
            }
            _ => {
                let expr = self.expression()?;
                self.end_of_statement()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn end_of_statement(&mut self) -> EvalResult<()> {
        match self.peek_tok() {
            Tok::Newline => {
                self.bump();
                Ok(())
            }
            Tok::Eof => Ok(()),
            other => Err(Diagnostic::parse(
                format!("expected end of line, got {other}"),
                self.span(),
            )),
        }
    }

    fn if_statement(&mut self) -> EvalResult<Stmt> {
        self.expect_tok(&Tok::If)?;
        let mut branches = Vec::new();

        let cond = self.expression()?;
        self.end_of_statement()?;
        let body = self.block(&[Tok::Elif, Tok::Else, Tok::Endif])?;
        branches.push(IfBranch { cond: Some(cond), body });

        loop {
            match self.peek_tok() {
                Tok::Elif => {
                    self.bump();
                    let cond = self.expression()?;
                    self.end_of_statement()?;
                    let body = self.block(&[Tok::Elif, Tok::Else, Tok::Endif])?;
                    branches.push(IfBranch { cond: Some(cond), body });
                }
                Tok::Else => {
                    self.bump();
                    self.end_of_statement()?;
                    let body = self.block(&[Tok::Endif])?;
                    branches.push(IfBranch { cond: None, body });
                    break;
                }
                _ => break,
            }
        }

        self.expect_tok(&Tok::Endif)?;
        self.end_of_statement()?;
        Ok(Stmt::If { branches })
    }

    fn foreach_statement(&mut self) -> EvalResult<Stmt> {
        let span = self.expect_tok(&Tok::Foreach)?;
        let (first, _) = self.expect_ident()?;
        let second = if self.eat(&Tok::Comma) {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        self.expect_tok(&Tok::Colon)?;
        let iterable = self.expression()?;
        self.end_of_statement()?;
        let body = self.block(&[Tok::Endforeach])?;
        self.expect_tok(&Tok::Endforeach)?;
        self.end_of_statement()?;
        Ok(Stmt::Foreach {
            vars: (first, second),
            span,
            iterable,
            body,
        })
    }

    // Precedence, loosest first: or, and, not, comparison, additive,
    // multiplicative, unary minus, postfix.
    fn expression(&mut self) -> EvalResult<ExprLoc> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> EvalResult<ExprLoc> {
        let mut lhs = self.and_expr()?;
        while self.peek_tok() == &Tok::Or {
            let span = self.bump().span;
            let rhs = self.and_expr()?;
            lhs = binary(BinOp::Or, lhs, rhs, span);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> EvalResult<ExprLoc> {
        let mut lhs = self.not_expr()?;
        while self.peek_tok() == &Tok::And {
            let span = self.bump().span;
            let rhs = self.not_expr()?;
            lhs = binary(BinOp::And, lhs, rhs, span);
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> EvalResult<ExprLoc> {
        if self.peek_tok() == &Tok::Not && self.peek2_tok() != &Tok::In {
            let span = self.bump().span;
            let operand = self.not_expr()?;
            return Ok(ExprLoc {
                expr: Expr::Unary {
                    op: UnOp::Not,
                    operand: Box::new(operand),
                },
                span,
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> EvalResult<ExprLoc> {
        let lhs = self.additive()?;
        let op = match self.peek_tok() {
            Tok::EqEq => BinOp::Eq,
            Tok::Neq => BinOp::Neq,
            Tok::Lt => BinOp::Lt,
            Tok::Le => BinOp::Le,
            Tok::Gt => BinOp::Gt,
            Tok::Ge => BinOp::Ge,
            Tok::In => BinOp::In,
            Tok::Not if self.peek2_tok() == &Tok::In => BinOp::NotIn,
            _ => return Ok(lhs),
        };
        let span = self.bump().span;
        if op == BinOp::NotIn {
            self.bump(); // the 'in'
        }
        let rhs = self.additive()?;
        Ok(binary(op, lhs, rhs, span))
    }

    fn additive(&mut self) -> EvalResult<ExprLoc> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek_tok() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            let span = self.bump().span;
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs, span);
        }
    }

    fn multiplicative(&mut self) -> EvalResult<ExprLoc> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek_tok() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::Percent => BinOp::Mod,
                _ => return Ok(lhs),
            };
            let span = self.bump().span;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs, span);
        }
    }

    fn unary(&mut self) -> EvalResult<ExprLoc> {
        if self.peek_tok() == &Tok::Minus {
            let span = self.bump().span;
            let operand = self.unary()?;
            return Ok(ExprLoc {
                expr: Expr::Unary {
                    op: UnOp::Neg,
                    operand: Box::new(operand),
                },
                span,
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> EvalResult<ExprLoc> {
        let mut expr = self.primary()?;
        while self.eat(&Tok::Dot) {
            let (name, name_span) = self.expect_ident()?;
            self.expect_tok(&Tok::LParen)?;
            let args = self.arg_list()?;
            expr = ExprLoc {
                span: expr.span,
                expr: Expr::Method {
                    receiver: Box::new(expr),
                    name,
                    name_span,
                    args,
                },
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> EvalResult<ExprLoc> {
        let span = self.span();
        match self.peek_tok() {
            Tok::True => {
                self.bump();
                Ok(ExprLoc {
                    expr: Expr::Bool(true),
                    span,
                })
            }
            Tok::False => {
                self.bump();
                Ok(ExprLoc {
                    expr: Expr::Bool(false),
                    span,
                })
            }
            Tok::Int(_) => {
                let Tok::Int(n) = self.bump().tok else { unreachable!() };
                Ok(ExprLoc { expr: Expr::Int(n), span })
            }
            Tok::Str(_) => {
                let Tok::Str(s) = self.bump().tok else { unreachable!() };
                Ok(ExprLoc { expr: Expr::Str(s), span })
            }
            Tok::Ident(_) => {
                let (name, _) = self.expect_ident()?;
                if self.eat(&Tok::LParen) {
                    let args = self.arg_list()?;
                    Ok(ExprLoc {
                        expr: Expr::Call { name, args },
                        span,
                    })
                } else {
                    Ok(ExprLoc {
                        expr: Expr::Ident(name),
                        span,
                    })
                }
            }
            Tok::LParen => {
                self.bump();
                let inner = self.expression()?;
                self.expect_tok(&Tok::RParen)?;
                Ok(inner)
            }
            Tok::LBracket => {
                self.bump();
                let mut items = Vec::new();
                while self.peek_tok() != &Tok::RBracket {
                    items.push(self.expression()?);
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                self.expect_tok(&Tok::RBracket)?;
                Ok(ExprLoc {
                    expr: Expr::Array(items),
                    span,
                })
            }
            Tok::LBrace => {
                self.bump();
                let mut pairs = Vec::new();
                while self.peek_tok() != &Tok::RBrace {
                    let key = self.expression()?;
                    self.expect_tok(&Tok::Colon)?;
                    let value = self.expression()?;
                    pairs.push((key, value));
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                self.expect_tok(&Tok::RBrace)?;
                Ok(ExprLoc {
                    expr: Expr::Dict(pairs),
                    span,
                })
            }
            other => Err(Diagnostic::parse(format!("unexpected {other}"), span)),
        }
    }

    /// Parses `positional…, kw: val, …` up to the closing paren.
    fn arg_list(&mut self) -> EvalResult<ArgList> {
        let mut args = ArgList::default();
        while self.peek_tok() != &Tok::RParen {
            // A keyword argument is `ident :` — anything else is positional.
            if let Tok::Ident(_) = self.peek_tok()
                && self.peek2_tok() == &Tok::Colon
            {
                let (name, name_span) = self.expect_ident()?;
                self.expect_tok(&Tok::Colon)?;
                let value = self.expression()?;
                args.keywords.push((name, name_span, value));
            } else {
                let value = self.expression()?;
                if !args.keywords.is_empty() {
                    return Err(Diagnostic::parse(
                        "positional argument after keyword argument",
                        value.span,
                    ));
                }
                args.positional.push(value);
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect_tok(&Tok::RParen)?;
        Ok(args)
    }
}

fn binary(op: BinOp, lhs: ExprLoc, rhs: ExprLoc, span: Span) -> ExprLoc {
    ExprLoc {
        expr: Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Vec<Stmt> {
        parse(src, 0).expect("parse failed")
    }

    #[test]
    fn parses_assignment_and_call() {
        let stmts = parse_ok("x = files('a.c', 'b.c')\n");
        assert_eq!(stmts.len(), 1);
        let Stmt::Assign { name, value, .. } = &stmts[0] else {
            panic!("expected assignment");
        };
        assert_eq!(name, "x");
        let Expr::Call { name, args } = &value.expr else {
            panic!("expected call");
        };
        assert_eq!(name, "files");
        assert_eq!(args.positional.len(), 2);
    }

    #[test]
    fn newlines_inside_parens_are_insignificant() {
        let stmts = parse_ok("executable(\n  'e',\n  'main.c',\n)\n");
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn keyword_arguments_parse() {
        let stmts = parse_ok("test('t', exe, should_fail: true)\n");
        let Stmt::Expr(expr) = &stmts[0] else { panic!() };
        let Expr::Call { args, .. } = &expr.expr else { panic!() };
        assert_eq!(args.positional.len(), 2);
        assert_eq!(args.keywords.len(), 1);
        assert_eq!(args.keywords[0].0, "should_fail");
    }

    #[test]
    fn method_chain_parses() {
        let stmts = parse_ok("x = 'a b'.split().length()\n");
        let Stmt::Assign { value, .. } = &stmts[0] else { panic!() };
        let Expr::Method { name, receiver, .. } = &value.expr else {
            panic!()
        };
        assert_eq!(name, "length");
        assert!(matches!(receiver.expr, Expr::Method { .. }));
    }

    #[test]
    fn if_elif_else_parses() {
        let stmts = parse_ok("if a\n x = 1\nelif b\n x = 2\nelse\n x = 3\nendif\n");
        let Stmt::If { branches } = &stmts[0] else { panic!() };
        assert_eq!(branches.len(), 3);
        assert!(branches[0].cond.is_some());
        assert!(branches[2].cond.is_none());
    }

    #[test]
    fn foreach_with_two_vars_parses() {
        let stmts = parse_ok("foreach k, v : d\n message(k)\nendforeach\n");
        let Stmt::Foreach { vars, .. } = &stmts[0] else { panic!() };
        assert_eq!(vars.0, "k");
        assert_eq!(vars.1.as_deref(), Some("v"));
    }

    #[test]
    fn not_in_parses_as_one_operator() {
        let stmts = parse_ok("x = 'a' not in ['b']\n");
        let Stmt::Assign { value, .. } = &stmts[0] else { panic!() };
        let Expr::Binary { op, .. } = &value.expr else { panic!() };
        assert_eq!(*op, BinOp::NotIn);
    }

    #[test]
    fn spans_are_one_based() {
        let stmts = parse_ok("x = 1\n");
        let Stmt::Assign { span, .. } = &stmts[0] else { panic!() };
        assert_eq!((span.line, span.col), (1, 1));
    }

    #[test]
    fn string_escapes_decode() {
        let stmts = parse_ok("x = 'a\\nb\\'c'\n");
        let Stmt::Assign { value, .. } = &stmts[0] else { panic!() };
        let Expr::Str(s) = &value.expr else { panic!() };
        assert_eq!(s, "a\nb'c");
    }

    #[test]
    fn triple_quoted_strings_are_raw() {
        let stmts = parse_ok("x = '''line\\n'''\n");
        let Stmt::Assign { value, .. } = &stmts[0] else { panic!() };
        let Expr::Str(s) = &value.expr else { panic!() };
        assert_eq!(s, "line\\n");
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let err = parse("x = 'oops\n", 0).unwrap_err();
        assert_eq!(err.kind, crate::diag::DiagKind::Lex);
    }

    #[test]
    fn unexpected_token_is_a_parse_error() {
        let err = parse("x = = 1\n", 0).unwrap_err();
        assert_eq!(err.kind, crate::diag::DiagKind::Parse);
        assert_eq!(err.span.unwrap().col, 5);
    }

    #[test]
    fn comments_are_skipped() {
        let stmts = parse_ok("# leading\nx = 1 # trailing\n");
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn precedence_binds_multiplication_tighter() {
        let stmts = parse_ok("x = 1 + 2 * 3\n");
        let Stmt::Assign { value, .. } = &stmts[0] else { panic!() };
        let Expr::Binary { op, rhs, .. } = &value.expr else { panic!() };
        assert_eq!(*op, BinOp::Add);
        let Expr::Binary { op, .. } = &rhs.expr else { panic!() };
        assert_eq!(*op, BinOp::Mul);
    }
}
