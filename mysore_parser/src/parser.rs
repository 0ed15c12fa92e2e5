//! Recursive-descent parser for MysoreScript.
//!
//! The grammar is small enough for straight recursive descent with a
//! two-token window; precedence is handled by one function per level
//! (comparison, additive, multiplicative, postfix, primary).

use crate::ast::{BinOpKind, ClassDecl, ClosureDecl, Expr, ExprKind, Statements, Stmt, StmtKind};
use crate::error::SyntaxError;
use crate::lexer::Lexer;
use crate::token::{Keyword, Token, TokenKind};
use mysore_core::Span;
use std::rc::Rc;

/// Parse a complete statement block (a program or a REPL line).
pub fn parse(source: &str) -> Result<Statements, SyntaxError> {
    Parser::new(source)?.parse_program()
}

/// MysoreScript parser.
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    /// Current token.
    current: Token,
    /// One token of lookahead, for the assignment/expression split.
    next: Token,
}

impl<'src> Parser<'src> {
    /// Create a parser over the given source.
    pub fn new(source: &'src str) -> Result<Self, SyntaxError> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token()?;
        let next = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            next,
        })
    }

    /// Parse statements until end of input.
    pub fn parse_program(&mut self) -> Result<Statements, SyntaxError> {
        let mut statements = Vec::new();
        while !self.current.is_eof() {
            statements.push(self.parse_statement()?);
        }
        Ok(Statements::new(statements))
    }

    // =========================================================================
    // Token plumbing
    // =========================================================================

    fn advance(&mut self) -> Result<Token, SyntaxError> {
        let lexed = self.lexer.next_token()?;
        let consumed = std::mem::replace(&mut self.current, std::mem::replace(&mut self.next, lexed));
        Ok(consumed)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current.kind == *kind
    }

    fn eat(&mut self, kind: &TokenKind) -> Result<bool, SyntaxError> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, SyntaxError> {
        if self.check(&kind) {
            self.advance()
        } else {
            Err(self.unexpected(&format!("expected {}", kind)))
        }
    }

    fn expect_ident(&mut self) -> Result<String, SyntaxError> {
        match &self.current.kind {
            TokenKind::Ident(_) => {
                let token = self.advance()?;
                match token.kind {
                    TokenKind::Ident(name) => Ok(name),
                    _ => unreachable!(),
                }
            }
            _ => Err(self.unexpected("expected an identifier")),
        }
    }

    fn keyword(&self) -> Option<Keyword> {
        match self.current.kind {
            TokenKind::Keyword(kw) => Some(kw),
            _ => None,
        }
    }

    fn unexpected(&self, message: &str) -> SyntaxError {
        SyntaxError::new(
            format!("{}, found {}", message, self.current.kind),
            self.current.span,
        )
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.current.span;
        match self.keyword() {
            Some(Keyword::Var) => self.parse_decl(),
            Some(Keyword::Return) => {
                self.advance()?;
                let expr = self.parse_expr()?;
                let end = self.expect(TokenKind::Semicolon)?.span;
                Ok(Stmt::new(StmtKind::Return(expr), start.to(end)))
            }
            Some(Keyword::If) => {
                self.advance()?;
                let (condition, body, span) = self.parse_condition_and_block(start)?;
                Ok(Stmt::new(StmtKind::If { condition, body }, span))
            }
            Some(Keyword::While) => {
                self.advance()?;
                let (condition, body, span) = self.parse_condition_and_block(start)?;
                Ok(Stmt::new(StmtKind::While { condition, body }, span))
            }
            Some(Keyword::Class) => self.parse_class(),
            Some(Keyword::Fun) => {
                // A closure declaration used as a statement; the closing
                // brace terminates it, though a stray semicolon is fine.
                let expr = self.parse_closure_expr()?;
                let span = expr.span;
                self.eat(&TokenKind::Semicolon)?;
                Ok(Stmt::new(StmtKind::Expr(expr), span))
            }
            _ => {
                if matches!(self.current.kind, TokenKind::Ident(_))
                    && self.next.kind == TokenKind::Equal
                {
                    let target = self.expect_ident()?;
                    self.expect(TokenKind::Equal)?;
                    let value = self.parse_expr()?;
                    let end = self.expect(TokenKind::Semicolon)?.span;
                    Ok(Stmt::new(StmtKind::Assign { target, value }, start.to(end)))
                } else {
                    let expr = self.parse_expr()?;
                    let end = self.expect(TokenKind::Semicolon)?.span;
                    Ok(Stmt::new(StmtKind::Expr(expr), start.to(end)))
                }
            }
        }
    }

    fn parse_decl(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.current.span;
        self.expect(TokenKind::Keyword(Keyword::Var))?;
        let name = self.expect_ident()?;
        let init = if self.eat(&TokenKind::Equal)? {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = self.expect(TokenKind::Semicolon)?.span;
        Ok(Stmt::new(StmtKind::Decl { name, init }, start.to(end)))
    }

    fn parse_condition_and_block(
        &mut self,
        start: Span,
    ) -> Result<(Rc<Expr>, Statements, Span), SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let (body, end) = self.parse_block()?;
        Ok((condition, body, start.to(end)))
    }

    fn parse_block(&mut self) -> Result<(Statements, Span), SyntaxError> {
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.current.is_eof() {
                return Err(self.unexpected("expected '}'"));
            }
            statements.push(self.parse_statement()?);
        }
        let end = self.expect(TokenKind::RBrace)?.span;
        Ok((Statements::new(statements), end))
    }

    fn parse_class(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.current.span;
        self.expect(TokenKind::Keyword(Keyword::Class))?;
        let name = self.expect_ident()?;
        // A second identifier names the superclass; a lone identifier is
        // just the class name.
        let superclass = if matches!(self.current.kind, TokenKind::Ident(_)) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(TokenKind::LBrace)?;

        let mut ivars = Vec::new();
        let mut methods = Vec::new();
        loop {
            match self.keyword() {
                Some(Keyword::Var) => {
                    self.advance()?;
                    ivars.push(self.expect_ident()?);
                    self.expect(TokenKind::Semicolon)?;
                }
                Some(Keyword::Fun) => {
                    methods.push(self.parse_closure_decl()?);
                }
                _ => break,
            }
        }
        let end = self.expect(TokenKind::RBrace)?.span;
        Ok(Stmt::new(
            StmtKind::Class(ClassDecl {
                name,
                superclass,
                ivars,
                methods,
            }),
            start.to(end),
        ))
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn parse_expr(&mut self) -> Result<Rc<Expr>, SyntaxError> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Rc<Expr>, SyntaxError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.current.kind {
                TokenKind::EqualEqual => BinOpKind::Eq,
                TokenKind::NotEqual => BinOpKind::Ne,
                TokenKind::Less => BinOpKind::Lt,
                TokenKind::Greater => BinOpKind::Gt,
                TokenKind::LessEqual => BinOpKind::Le,
                TokenKind::GreaterEqual => BinOpKind::Ge,
                _ => return Ok(lhs),
            };
            self.advance()?;
            let rhs = self.parse_additive()?;
            lhs = self.binop(op, lhs, rhs);
        }
    }

    fn parse_additive(&mut self) -> Result<Rc<Expr>, SyntaxError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinOpKind::Add,
                TokenKind::Minus => BinOpKind::Sub,
                _ => return Ok(lhs),
            };
            self.advance()?;
            let rhs = self.parse_multiplicative()?;
            lhs = self.binop(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Rc<Expr>, SyntaxError> {
        let mut lhs = self.parse_postfix()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinOpKind::Mul,
                TokenKind::Slash => BinOpKind::Div,
                _ => return Ok(lhs),
            };
            self.advance()?;
            let rhs = self.parse_postfix()?;
            lhs = self.binop(op, lhs, rhs);
        }
    }

    fn binop(&self, op: BinOpKind, lhs: Rc<Expr>, rhs: Rc<Expr>) -> Rc<Expr> {
        let span = lhs.span.to(rhs.span);
        Rc::new(Expr::new(ExprKind::BinOp { op, lhs, rhs }, span))
    }

    fn parse_postfix(&mut self) -> Result<Rc<Expr>, SyntaxError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current.kind {
                TokenKind::LParen => {
                    let (arguments, end) = self.parse_arguments()?;
                    let span = expr.span.to(end);
                    expr = Rc::new(Expr::new(
                        ExprKind::Call {
                            callee: expr,
                            method: None,
                            arguments,
                        },
                        span,
                    ));
                }
                TokenKind::Dot => {
                    self.advance()?;
                    let method = self.expect_ident()?;
                    let (arguments, end) = self.parse_arguments()?;
                    let span = expr.span.to(end);
                    expr = Rc::new(Expr::new(
                        ExprKind::Call {
                            callee: expr,
                            method: Some(method),
                            arguments,
                        },
                        span,
                    ));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<(Vec<Rc<Expr>>, Span), SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let mut arguments = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                arguments.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        let end = self.expect(TokenKind::RParen)?.span;
        Ok((arguments, end))
    }

    fn parse_primary(&mut self) -> Result<Rc<Expr>, SyntaxError> {
        let span = self.current.span;
        match &self.current.kind {
            TokenKind::Int(_) => {
                let token = self.advance()?;
                let TokenKind::Int(value) = token.kind else {
                    unreachable!()
                };
                Ok(Rc::new(Expr::new(ExprKind::Number(value), span)))
            }
            TokenKind::Str(_) => {
                let token = self.advance()?;
                let TokenKind::Str(value) = token.kind else {
                    unreachable!()
                };
                Ok(Rc::new(Expr::new(ExprKind::StringLit(value), span)))
            }
            TokenKind::Ident(_) => {
                let name = self.expect_ident()?;
                Ok(Rc::new(Expr::new(ExprKind::Var(name), span)))
            }
            TokenKind::Keyword(Keyword::New) => {
                self.advance()?;
                let class = self.expect_ident()?;
                Ok(Rc::new(Expr::new(ExprKind::New(class), span)))
            }
            TokenKind::Keyword(Keyword::Fun) => self.parse_closure_expr(),
            TokenKind::LParen => {
                self.advance()?;
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected("expected an expression")),
        }
    }

    fn parse_closure_expr(&mut self) -> Result<Rc<Expr>, SyntaxError> {
        let decl = self.parse_closure_decl()?;
        let span = decl.span;
        Ok(Rc::new(Expr::new(ExprKind::Closure(decl), span)))
    }

    fn parse_closure_decl(&mut self) -> Result<Rc<ClosureDecl>, SyntaxError> {
        let start = self.current.span;
        self.expect(TokenKind::Keyword(Keyword::Fun))?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let mut parameters = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                parameters.push(self.expect_ident()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        let (body, end) = self.parse_block()?;
        Ok(Rc::new(ClosureDecl::new(
            name,
            parameters,
            body,
            start.to(end),
        )))
    }
}
