//! Tokenizer (spec §6's source grammar summary), built on `logos`.

use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token<'src> {
  #[token("(*", skip_nested_comment)]
  CommentMarker,

  #[token("let")] Let,
  #[token("rec")] Rec,
  #[token("in")] In,
  #[token("fun")] Fun,
  #[token("if")] If,
  #[token("then")] Then,
  #[token("else")] Else,
  #[token("true")] True,
  #[token("false")] False,

  #[token(";;")] SemiSemi,
  #[token("->")] Arrow,
  #[token("=")] Eq,
  #[token("+")] Plus,
  #[token("-")] Minus,
  #[token("*")] Star,
  #[token("div")] Div,
  #[token("mod")] Mod,
  #[token(",")] Comma,
  #[token("(")] LParen,
  #[token(")")] RParen,

  #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
  Int(i64),

  #[regex(r"[A-Za-z_][A-Za-z0-9_']*", |lex| lex.slice())]
  Ident(&'src str),
}

/// `(*` has just been consumed; scans forward tracking nesting depth so
/// `(* (* *) *)` closes only at its outer `*)`, then skips the whole span.
fn skip_nested_comment<'src>(lex: &mut logos::Lexer<'src, Token<'src>>) -> Result<logos::Skip, ()> {
  let rest = lex.remainder();
  let mut depth = 1u32;
  let mut chars = rest.char_indices().peekable();
  while let Some((i, c)) = chars.next() {
    if c == '(' && chars.peek().is_some_and(|&(_, c2)| c2 == '*') {
      chars.next();
      depth += 1;
    } else if c == '*' && chars.peek().is_some_and(|&(_, c2)| c2 == ')') {
      chars.next();
      depth -= 1;
      if depth == 0 {
        lex.bump(i + 2);
        return Ok(logos::Skip);
      }
    }
  }
  Err(())
}

#[derive(Debug, Clone)]
pub struct Spanned<'src> {
  pub token: Token<'src>,
  pub pos: usize,
}

/// Tokenizes `src` fully, eagerly, so parse errors can report a byte
/// position without re-running the lexer.
pub fn tokenize(src: &str) -> crate::error::Result<Vec<Spanned<'_>>> {
  let mut lexer = Token::lexer(src);
  let mut out = Vec::new();
  while let Some(result) = lexer.next() {
    let pos = lexer.span().start;
    match result {
      Ok(token) => out.push(Spanned { token, pos }),
      Err(()) => {
        return Err(crate::error::LexError { pos, snippet: lexer.slice().to_string() }.into());
      }
    }
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokenizes_a_let_binding() {
    let toks = tokenize("let x = 7;;").unwrap();
    let kinds: Vec<_> = toks.iter().map(|s| s.token.clone()).collect();
    assert_eq!(kinds, vec![
      Token::Let, Token::Ident("x"), Token::Eq, Token::Int(7), Token::SemiSemi,
    ]);
  }

  #[test]
  fn unexpected_character_is_a_lex_error() {
    assert!(tokenize("let x = 7 @ 2;;").is_err());
  }

  #[test]
  fn comments_are_skipped_including_nested_ones() {
    let toks = tokenize("let (* a comment *) x (* (* nested *) still a comment *) = 7;;").unwrap();
    let kinds: Vec<_> = toks.iter().map(|s| s.token.clone()).collect();
    assert_eq!(kinds, vec![Token::Let, Token::Ident("x"), Token::Eq, Token::Int(7), Token::SemiSemi]);
  }

  #[test]
  fn unterminated_comment_is_a_lex_error() {
    assert!(tokenize("let x = 7;; (* never closed").is_err());
  }

  #[test]
  fn rec_and_arrow_and_keywords_tokenize_distinctly() {
    let toks = tokenize("let rec f = fun n -> if n then true else false").unwrap();
    let kinds: Vec<_> = toks.iter().map(|s| s.token.clone()).collect();
    assert_eq!(kinds, vec![
      Token::Let, Token::Rec, Token::Ident("f"), Token::Eq, Token::Fun, Token::Ident("n"),
      Token::Arrow, Token::If, Token::Ident("n"), Token::Then, Token::True, Token::Else, Token::False,
    ]);
  }
}
