//! Per-function builder context for AST→LIR lowering (spec §4.5, §5).
//!
//! Function definitions are mutated in place by index rather than by
//! reference, since the builder needs to hold a *stack* of "which function
//! am I currently emitting into" while still being able to append to any
//! enclosing function's locals map.

use hashbrown::HashMap;
use crate::symbol::{intern, Symbol};
use super::{FnDef, Instr, Label, StaticByteArray, Temp64, Value};

struct Frame {
  fn_index: usize,
  local_names: HashMap<Symbol, Value>,
  captured_names: HashMap<Symbol, u32>,
  next_local: u32,
}

pub struct LirBuilder {
  fns: Vec<FnDef>,
  statics: Vec<StaticByteArray>,
  next_label: u32,
  frames: Vec<Frame>,
  print_int_fmt: Label,
}

impl LirBuilder {
  #[must_use] pub fn new() -> Self {
    let mut builder = Self {
      fns: Vec::new(),
      statics: Vec::new(),
      next_label: 0,
      frames: Vec::new(),
      print_int_fmt: Label(0),
    };
    let main_label = builder.fresh_label();
    let mut main_fn = FnDef::new(main_label, None);
    main_fn.is_entry = true;
    builder.fns.push(main_fn);
    builder.frames.push(Frame {
      fn_index: 0,
      local_names: HashMap::new(),
      captured_names: HashMap::new(),
      next_local: 0,
    });
    builder.print_int_fmt =
      builder.add_static(Some(intern("print_int_fmt")), "\"%d\", 0x0A, 0x0".to_string());
    builder
  }

  #[must_use] pub fn main_label(&self) -> Label { self.fns[0].label }

  /// The `printf` format-string static every `print_int` call references
  /// (spec §4.6/§4.7's labeled data-literal entity).
  #[must_use] pub fn print_int_fmt_label(&self) -> Label { self.print_int_fmt }

  pub fn fresh_label(&mut self) -> Label {
    let l = Label(self.next_label);
    self.next_label += 1;
    l
  }

  pub fn add_static(&mut self, name: Option<Symbol>, text: String) -> Label {
    let label = self.fresh_label();
    self.statics.push(StaticByteArray { label, name, text });
    label
  }

  fn frame(&self) -> &Frame { self.frames.last().expect("no active function frame") }
  fn frame_mut(&mut self) -> &mut Frame { self.frames.last_mut().expect("no active function frame") }

  pub fn current_fn_mut(&mut self) -> &mut FnDef {
    let idx = self.frame().fn_index;
    &mut self.fns[idx]
  }

  /// Allocates a new stack slot in the current function and returns it as a
  /// `Value`.
  pub fn fresh_temp(&mut self) -> Temp64 {
    let id = self.frame().next_local;
    self.frame_mut().next_local += 1;
    let temp = Temp64::Local(id);
    let offset = -8 * (i32::try_from(id).expect("absurd number of locals") + 1);
    self.current_fn_mut().locals.insert(temp, offset);
    temp
  }

  pub fn emit(&mut self, instr: Instr) {
    self.current_fn_mut().body.push(instr);
  }

  pub fn bind_local(&mut self, name: Symbol, value: Value) {
    self.frame_mut().local_names.insert(name, value);
  }

  #[must_use] pub fn lookup_local(&self, name: Symbol) -> Option<Value> {
    self.frame().local_names.get(&name).cloned()
  }

  #[must_use] pub fn capture_index(&self, name: Symbol) -> Option<u32> {
    self.frame().captured_names.get(&name).copied()
  }

  /// Opens a new function definition, runs `f` with it as the current frame,
  /// and unconditionally restores the enclosing frame afterward — even if
  /// `f` returns `Err` (spec §5's scoped-acquisition-with-guaranteed-restore
  /// contract).
  pub fn with_new_fn<T>(
    &mut self,
    name: Option<Symbol>,
    captured_names: HashMap<Symbol, u32>,
    f: impl FnOnce(&mut Self) -> crate::error::Result<T>,
  ) -> crate::error::Result<(T, Label)> {
    let label = self.fresh_label();
    let fn_index = self.fns.len();
    self.fns.push(FnDef::new(label, name));
    self.frames.push(Frame { fn_index, local_names: HashMap::new(), captured_names, next_local: 0 });

    let result = f(self);

    self.frames.pop();
    result.map(|v| (v, label))
  }

  pub fn finish(self) -> super::Program {
    super::Program { fns: self.fns, statics: self.statics }
  }
}

impl Default for LirBuilder {
  fn default() -> Self { Self::new() }
}
