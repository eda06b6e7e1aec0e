//! Recursive-descent parser over the token stream (spec §6).
//!
//! Precedence, tightest to loosest: application (juxtaposition) > `* div
//! mod` > `+ -` > `=` > `if`/`fun`/`let`. Infix operators desugar directly
//! into `Call(Ident(op), TupleLit([lhs, rhs]))`, matching how the type
//! checker's prelude types them.

use crate::ast::{Expr, ExprKind, Literal};
use crate::error::{ParseError, Result};
use crate::lexer::{tokenize, Spanned, Token};
use crate::symbol::intern;

pub fn parse(src: &str) -> Result<Expr> {
  let tokens = tokenize(src)?;
  let mut parser = Parser { tokens, pos: 0 };
  let expr = parser.parse_top_level()?;
  parser.expect_eof()?;
  Ok(expr)
}

struct Parser<'src> {
  tokens: Vec<Spanned<'src>>,
  pos: usize,
}

impl<'src> Parser<'src> {
  fn peek(&self) -> Option<&Token<'src>> { self.tokens.get(self.pos).map(|s| &s.token) }

  fn pos_at(&self, idx: usize) -> usize {
    self.tokens.get(idx).map_or_else(|| self.tokens.last().map_or(0, |s| s.pos), |s| s.pos)
  }

  fn cur_pos(&self) -> usize { self.pos_at(self.pos) }

  fn bump(&mut self) -> Option<Token<'src>> {
    let t = self.tokens.get(self.pos).map(|s| s.token.clone());
    if t.is_some() { self.pos += 1; }
    t
  }

  fn expect(&mut self, expected: &Token<'src>, what: &str) -> Result<()> {
    match self.bump() {
      Some(ref t) if t == expected => Ok(()),
      other => Err(ParseError {
        pos: self.pos_at(self.pos.saturating_sub(1)),
        message: format!("expected {what}, found {other:?}"),
      }.into()),
    }
  }

  fn expect_eof(&self) -> Result<()> {
    if self.pos < self.tokens.len() {
      return Err(ParseError { pos: self.cur_pos(), message: "trailing input after program".into() }.into());
    }
    Ok(())
  }

  /// `TopLevelStmts`: a sequence of `;;`-terminated statements.
  fn parse_top_level(&mut self) -> Result<Expr> {
    let mut stmts = Vec::new();
    while self.peek().is_some() {
      stmts.push(self.parse_stmt()?);
      self.expect(&Token::SemiSemi, "`;;`")?;
    }
    Ok(Expr::new(ExprKind::TopLevelStmts(stmts)))
  }

  /// A top-level statement: a `let`/`let rec` binding (with no body, so the
  /// binding extends to the rest of the program) or a bare expression.
  fn parse_stmt(&mut self) -> Result<Expr> {
    if matches!(self.peek(), Some(Token::Let)) {
      let save = self.pos;
      self.bump();
      let recursive = matches!(self.peek(), Some(Token::Rec));
      if recursive { self.bump(); }
      let (name, rhs) = self.parse_let_binding(recursive)?;
      if matches!(self.peek(), Some(Token::In)) {
        // `let ... = ... in ...` as a full expression statement.
        self.pos = save;
        return self.parse_expr();
      }
      return Ok(Expr::new(ExprKind::LetStmt { name, rhs: Box::new(rhs), recursive }));
    }
    self.parse_expr()
  }

  /// Parses `name param* = rhs`, desugaring curried parameters into nested
  /// `Lambda`s, for use after `let`/`let rec` has already been consumed.
  fn parse_let_binding(&mut self, _recursive: bool) -> Result<(crate::symbol::Symbol, Expr)> {
    let name = self.parse_ident()?;
    let mut params = Vec::new();
    while let Some(Token::Ident(_)) = self.peek() {
      params.push(self.parse_ident()?);
    }
    self.expect(&Token::Eq, "`=`")?;
    let mut body = self.parse_expr()?;
    for p in params.into_iter().rev() {
      body = Expr::new(ExprKind::Lambda(p, Box::new(body)));
    }
    Ok((name, body))
  }

  fn parse_ident(&mut self) -> Result<crate::symbol::Symbol> {
    match self.bump() {
      Some(Token::Ident(s)) => Ok(intern(s)),
      other => Err(ParseError {
        pos: self.pos_at(self.pos.saturating_sub(1)),
        message: format!("expected identifier, found {other:?}"),
      }.into()),
    }
  }

  fn parse_expr(&mut self) -> Result<Expr> {
    match self.peek() {
      Some(Token::Let) => self.parse_let_expr(),
      Some(Token::Fun) => self.parse_fun_expr(),
      Some(Token::If) => self.parse_if_expr(),
      _ => self.parse_eq(),
    }
  }

  fn parse_let_expr(&mut self) -> Result<Expr> {
    self.bump(); // `let`
    let recursive = matches!(self.peek(), Some(Token::Rec));
    if recursive { self.bump(); }
    let (name, rhs) = self.parse_let_binding(recursive)?;
    self.expect(&Token::In, "`in`")?;
    let body = self.parse_expr()?;
    Ok(Expr::new(ExprKind::Let { name, rhs: Box::new(rhs), body: Box::new(body), recursive }))
  }

  fn parse_fun_expr(&mut self) -> Result<Expr> {
    self.bump(); // `fun`
    let mut params = vec![self.parse_ident()?];
    while let Some(Token::Ident(_)) = self.peek() {
      params.push(self.parse_ident()?);
    }
    self.expect(&Token::Arrow, "`->`")?;
    let mut body = self.parse_expr()?;
    for p in params.into_iter().rev() {
      body = Expr::new(ExprKind::Lambda(p, Box::new(body)));
    }
    Ok(body)
  }

  fn parse_if_expr(&mut self) -> Result<Expr> {
    self.bump(); // `if`
    let cond = self.parse_expr()?;
    self.expect(&Token::Then, "`then`")?;
    let yes = self.parse_expr()?;
    self.expect(&Token::Else, "`else`")?;
    let no = self.parse_expr()?;
    Ok(Expr::new(ExprKind::If(Box::new(cond), Box::new(yes), Box::new(no))))
  }

  fn parse_eq(&mut self) -> Result<Expr> {
    let lhs = self.parse_additive()?;
    if matches!(self.peek(), Some(Token::Eq)) {
      self.bump();
      let rhs = self.parse_additive()?;
      return Ok(binop("=", lhs, rhs));
    }
    Ok(lhs)
  }

  fn parse_additive(&mut self) -> Result<Expr> {
    let mut lhs = self.parse_multiplicative()?;
    loop {
      let op = match self.peek() {
        Some(Token::Plus) => "+",
        Some(Token::Minus) => "-",
        _ => break,
      };
      self.bump();
      let rhs = self.parse_multiplicative()?;
      lhs = binop(op, lhs, rhs);
    }
    Ok(lhs)
  }

  fn parse_multiplicative(&mut self) -> Result<Expr> {
    let mut lhs = self.parse_application()?;
    loop {
      let op = match self.peek() {
        Some(Token::Star) => "*",
        Some(Token::Div) => "div",
        Some(Token::Mod) => "mod",
        _ => break,
      };
      self.bump();
      let rhs = self.parse_application()?;
      lhs = binop(op, lhs, rhs);
    }
    Ok(lhs)
  }

  /// Left-associative juxtaposition: `f a b` parses as `(f a) b`.
  fn parse_application(&mut self) -> Result<Expr> {
    let mut expr = self.parse_atom()?;
    while self.starts_atom() {
      let arg = self.parse_atom()?;
      expr = Expr::new(ExprKind::Call(Box::new(expr), Box::new(arg)));
    }
    Ok(expr)
  }

  fn starts_atom(&self) -> bool {
    matches!(self.peek(), Some(Token::Ident(_) | Token::Int(_) | Token::True | Token::False | Token::LParen))
  }

  fn parse_atom(&mut self) -> Result<Expr> {
    match self.peek() {
      Some(Token::Int(v)) => { let v = *v; self.bump(); Ok(Expr::new(ExprKind::Const(Literal::Int(v), crate::types::Type::Int))) }
      Some(Token::True) => { self.bump(); Ok(Expr::new(ExprKind::Const(Literal::Bool(true), crate::types::Type::Bool))) }
      Some(Token::False) => { self.bump(); Ok(Expr::new(ExprKind::Const(Literal::Bool(false), crate::types::Type::Bool))) }
      Some(Token::Ident(_)) => Ok(Expr::new(ExprKind::Ident(self.parse_ident()?))),
      Some(Token::LParen) => self.parse_paren(),
      other => Err(ParseError { pos: self.cur_pos(), message: format!("expected an expression, found {other:?}") }.into()),
    }
  }

  /// `(e)`, or a tuple literal `(e1, e2, ..., en)` with `n >= 2`.
  fn parse_paren(&mut self) -> Result<Expr> {
    self.bump(); // `(`
    let mut elems = vec![self.parse_expr()?];
    while matches!(self.peek(), Some(Token::Comma)) {
      self.bump();
      elems.push(self.parse_expr()?);
    }
    self.expect(&Token::RParen, "`)`")?;
    if elems.len() == 1 {
      Ok(elems.into_iter().next().unwrap())
    } else {
      Ok(Expr::new(ExprKind::TupleLit(elems)))
    }
  }
}

fn binop(op: &str, lhs: Expr, rhs: Expr) -> Expr {
  Expr::new(ExprKind::Call(
    Box::new(Expr::new(ExprKind::Ident(intern(op)))),
    Box::new(Expr::new(ExprKind::TupleLit(vec![lhs, rhs]))),
  ))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_arithmetic_with_standard_precedence() {
    let expr = parse("exit (2 * (9 div 2 - 7 mod 3));;").unwrap();
    // Just confirm it parses to a single top-level statement without error;
    // precedence correctness is exercised end-to-end in the integration tests.
    match expr.kind {
      ExprKind::TopLevelStmts(stmts) => assert_eq!(stmts.len(), 1),
      _ => panic!("expected TopLevelStmts"),
    }
  }

  #[test]
  fn parses_curried_let_binding_as_nested_lambdas() {
    let expr = parse("let add x y = x + y;;").unwrap();
    let ExprKind::TopLevelStmts(stmts) = expr.kind else { panic!() };
    let ExprKind::LetStmt { rhs, .. } = &stmts[0].kind else { panic!() };
    assert!(matches!(rhs.kind, ExprKind::Lambda(..)));
    let ExprKind::Lambda(_, inner) = &rhs.kind else { unreachable!() };
    assert!(matches!(inner.kind, ExprKind::Lambda(..)));
  }

  #[test]
  fn let_rec_marks_the_binding_recursive() {
    let expr = parse("let rec fact n = n;;").unwrap();
    let ExprKind::TopLevelStmts(stmts) = expr.kind else { panic!() };
    let ExprKind::LetStmt { recursive, .. } = &stmts[0].kind else { panic!() };
    assert!(*recursive);
  }

  #[test]
  fn tuple_literal_requires_at_least_two_elements() {
    let expr = parse("(1, 2, 3);;").unwrap();
    let ExprKind::TopLevelStmts(stmts) = expr.kind else { panic!() };
    assert!(matches!(stmts[0].kind, ExprKind::TupleLit(ref v) if v.len() == 3));
  }

  #[test]
  fn unexpected_token_is_a_parse_error() {
    assert!(parse("let = 5;;").is_err());
  }
}
