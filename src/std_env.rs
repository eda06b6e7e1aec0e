//! Seeds the typing environment with the prelude's signatures (spec §4.3).
//!
//! Binary operators are typed as functions over a tuple argument, matching
//! the desugaring of `a (+) b` into `(+)(a, b)`.

use crate::check::Checker;
use crate::symbol::intern;
use crate::types::Type;

fn int_binop() -> Type { Type::fn_of(Type::Tuple(vec![Type::Int, Type::Int]), Type::Int) }
fn int_relop() -> Type { Type::fn_of(Type::Tuple(vec![Type::Int, Type::Int]), Type::Bool) }

pub fn install(checker: &mut Checker) {
  let t = checker.unifier.fresh_var(false);
  let null_ty = Type::fn_of(Type::List(Box::new(t.clone())), Type::Bool);
  checker.bind_prelude(intern("null"), null_ty);

  let t = checker.unifier.fresh_var(false);
  let tail_ty = Type::fn_of(Type::List(Box::new(t.clone())), Type::List(Box::new(t)));
  checker.bind_prelude(intern("tail"), tail_ty);

  checker.bind_prelude(intern("zero"), Type::fn_of(Type::Int, Type::Bool));
  checker.bind_prelude(intern("succ"), Type::fn_of(Type::Int, Type::Int));
  checker.bind_prelude(intern("pred"), Type::fn_of(Type::Int, Type::Int));
  checker.bind_prelude(intern("times"), Type::fn_of(Type::Int, Type::fn_of(Type::Int, Type::Int)));

  let u = checker.unifier.fresh_var(false);
  let v = checker.unifier.fresh_var(false);
  let pair_ty = Type::fn_of(u.clone(), Type::fn_of(v.clone(), Type::Tuple(vec![u, v])));
  checker.bind_prelude(intern("pair"), pair_ty);

  checker.bind_prelude(intern("+"), int_binop());
  checker.bind_prelude(intern("-"), int_binop());
  checker.bind_prelude(intern("*"), int_binop());
  checker.bind_prelude(intern("div"), int_binop());
  checker.bind_prelude(intern("mod"), int_binop());
  checker.bind_prelude(intern("="), int_relop());

  checker.bind_prelude(intern("exit"), Type::fn_of(Type::Int, Type::Unit));
  checker.bind_prelude(intern("print_int"), Type::fn_of(Type::Int, Type::Unit));
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::{Expr, ExprKind, Literal};

  #[test]
  fn pair_is_generalized_per_use() {
    let mut checker = Checker::new();
    let pair = |a: Expr, b: Expr| {
      Expr::new(ExprKind::Call(
        Box::new(Expr::new(ExprKind::Call(
          Box::new(Expr::new(ExprKind::Ident(intern("pair")))),
          Box::new(a),
        ))),
        Box::new(b),
      ))
    };
    let int_pair = pair(
      Expr::new(ExprKind::Const(Literal::Int(1), Type::Int)),
      Expr::new(ExprKind::Const(Literal::Int(2), Type::Int)),
    );
    let bool_pair = pair(
      Expr::new(ExprKind::Const(Literal::Bool(true), Type::Bool)),
      Expr::new(ExprKind::Const(Literal::Bool(false), Type::Bool)),
    );
    assert_eq!(checker.infer_type(&int_pair).unwrap(), Type::Tuple(vec![Type::Int, Type::Int]));
    assert_eq!(checker.infer_type(&bool_pair).unwrap(), Type::Tuple(vec![Type::Bool, Type::Bool]));
  }
}
