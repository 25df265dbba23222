//! Call dispatch: functions, bound methods, classes and fused invokes.

use crate::error::RuntimeError;
use crate::runtime::heap::GcRef;
use crate::runtime::object::ObjKind;
use crate::runtime::value::Value;
use crate::vm::vm::{CallFrame, Vm};

impl Vm {
    /// Dispatch a call polymorphically over the callee value.
    pub(super) fn call_value(
        &mut self,
        dest: u8,
        callee: Value,
        args: &[u8],
    ) -> Result<(), RuntimeError> {
        let Some(callee_ref) = callee.as_obj() else {
            return Err(self.runtime_error("Attempted to call a non-function value."));
        };
        match &self.heap.get(callee_ref).kind {
            ObjKind::Function(_) => self.call_function(callee_ref, dest, args),

            ObjKind::BoundMethod(bound) => {
                let receiver = bound.receiver;
                let method = bound.method;
                let arity = self.heap.function(method).arity;
                if args.len() != arity.saturating_sub(1) as usize {
                    return Err(self.runtime_error("Incorrect number of arguments."));
                }
                // The receiver takes the destination register, which doubles
                // as the callee's register 0.
                self.set_reg(dest, receiver);
                let mut extended = Vec::with_capacity(args.len() + 1);
                extended.push(dest);
                extended.extend_from_slice(args);
                self.call_function(method, dest, &extended)
            }

            ObjKind::Class(_) => {
                let instance = self.alloc_instance(callee_ref);
                self.set_reg(dest, Value::Obj(instance));

                // The receiver is already rooted through the destination
                // register when this interning can trigger a collection.
                let ctor_name = self.intern_string("constructor");
                let ObjKind::Class(class) = &self.heap.get(callee_ref).kind else {
                    unreachable!();
                };
                match class.find_method(ctor_name) {
                    Some(method) => {
                        let Some(method_ref) = method.as_obj().filter(|&r| {
                            matches!(self.heap.get(r).kind, ObjKind::Function(_))
                        }) else {
                            return Err(self.runtime_error("Constructor is not callable."));
                        };
                        if args.len() + 1 != self.heap.function(method_ref).arity as usize {
                            return Err(self.runtime_error("Incorrect number of arguments."));
                        }
                        let mut extended = Vec::with_capacity(args.len() + 1);
                        extended.push(dest);
                        extended.extend_from_slice(args);
                        self.call_function(method_ref, dest, &extended)
                    }
                    None if args.is_empty() => {
                        // No constructor: the fresh instance is the result.
                        Ok(())
                    }
                    None => Err(self.runtime_error("Constructor not defined.")),
                }
            }

            _ => Err(self.runtime_error("Attempted to call a non-function value.")),
        }
    }

    /// Push a frame for `function`, copying argument values from the
    /// caller's named registers into the new window's first registers and
    /// null-filling the rest.
    pub(super) fn call_function(
        &mut self,
        function: GcRef,
        dest: u8,
        args: &[u8],
    ) -> Result<(), RuntimeError> {
        let (arity, register_count) = {
            let f = self.heap.function(function);
            (f.arity, f.register_count)
        };
        if args.len() != arity as usize {
            return Err(self.runtime_error("Incorrect number of arguments."));
        }

        let caller_base = self.frames.last().map(|f| f.base).unwrap_or(0);
        let base = self.stack.len();
        self.stack.resize(base + register_count, Value::Null);
        for (i, &src) in args.iter().enumerate() {
            self.stack[base + i] = self.stack[caller_base + src as usize];
        }

        self.frames.push(CallFrame {
            function,
            ip: 0,
            base,
            return_reg: dest,
        });
        Ok(())
    }

    /// Fused property lookup and call: fields are looked up first, then
    /// class methods (binding the receiver into the destination register).
    pub(super) fn invoke(
        &mut self,
        dest: u8,
        receiver: Value,
        name: GcRef,
        args: &[u8],
    ) -> Result<(), RuntimeError> {
        let Some(receiver_ref) = receiver.as_obj() else {
            return Err(self.runtime_error("Only instances and classes have methods."));
        };
        let callee = match &self.heap.get(receiver_ref).kind {
            ObjKind::Instance(instance) => {
                if let Some(&field) = instance.fields.get(&name) {
                    field
                } else {
                    let class_ref = instance.class;
                    let ObjKind::Class(class) = &self.heap.get(class_ref).kind else {
                        unreachable!();
                    };
                    let Some(method) = class.find_method(name) else {
                        return Err(self.runtime_error("Undefined method on instance."));
                    };
                    let Some(method_ref) = method.as_obj().filter(|&r| {
                        matches!(self.heap.get(r).kind, ObjKind::Function(_))
                    }) else {
                        return Err(self.runtime_error("Method value is not callable."));
                    };
                    let bound = self.alloc_bound_method(receiver, method_ref);
                    self.set_reg(dest, Value::Obj(bound));
                    Value::Obj(bound)
                }
            }
            ObjKind::Class(class) => match class.find_method(name) {
                Some(method) => method,
                None => return Err(self.runtime_error("Undefined method on class.")),
            },
            _ => return Err(self.runtime_error("Only instances and classes have methods.")),
        };
        self.call_value(dest, callee, args)
    }
}
