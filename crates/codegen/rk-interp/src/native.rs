//! Prelude functions implemented by the evaluator
//!
//! The prelude declares these functions without bodies; calls to them land
//! here by name.

use crate::{
    EvalError, Value,
    interpreter::{Argument, Flow, Interpreter, mismatch},
};
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

pub(crate) fn invoke<'p>(
    interp: &mut Interpreter<'p>,
    name: &str,
    this: Option<Value<'p>>,
    args: Vec<Argument<'p>>,
) -> Flow<'p> {
    let mut args: Vec<Value<'p>> = args.into_iter().map(|arg| arg.value).collect();
    match this {
        None => free(interp, name, args),
        Some(this) => {
            if let Some(result) = scope_function(interp, name, &this, &mut args) {
                return result;
            }
            match &this {
                Value::List(_) => collection(interp, name, &this, args),
                Value::Object(object) if object.class.name == interp.known().int_range => {
                    collection(interp, name, &this, args)
                }
                _ => any(interp, name, &this, &args),
            }
        }
    }
}

fn arg<'a, 'p>(name: &str, args: &'a [Value<'p>], index: usize) -> Result<&'a Value<'p>, EvalError> {
    args.get(index).ok_or_else(|| EvalError::ArgumentMismatch {
        function: name.to_string(),
        reason: format!("missing argument {}", index + 1),
    })
}

fn unresolved(name: &str) -> EvalError {
    EvalError::UnresolvedCall {
        name: name.to_string(),
    }
}

/// Functions without a receiver
fn free<'p>(interp: &mut Interpreter<'p>, name: &str, args: Vec<Value<'p>>) -> Flow<'p> {
    match name {
        "listOf" | "mutableListOf" => Ok(Value::list(args)),
        "emptyList" => Ok(Value::list(Vec::new())),
        "println" | "print" => {
            let mut text = args
                .first()
                .map_or_else(String::new, |value| interp.render(value));
            if name == "println" {
                text.push('\n');
            }
            interp.print(&text);
            Ok(Value::Unit)
        }
        "error" => {
            let message = interp.render(arg(name, &args, 0)?);
            interp.throw("IllegalStateException", &message)
        }
        "check" | "require" => {
            let value = arg(name, &args, 0)?;
            match value.as_bool() {
                Some(true) => Ok(Value::Unit),
                Some(false) if name == "check" => interp.throw("IllegalStateException", "Check failed."),
                Some(false) => interp.throw("IllegalArgumentException", "Failed requirement."),
                None => Err(mismatch("Boolean", value, interp.interner()).into()),
            }
        }
        "run" => {
            let block = arg(name, &args, 0)?.clone();
            interp.call_value(&block, None, Vec::new())
        }
        "with" => {
            let receiver = arg(name, &args, 0)?.clone();
            let block = arg(name, &args, 1)?.clone();
            interp.call_value(&block, Some(receiver), Vec::new())
        }
        "repeat" => {
            let times = arg(name, &args, 0)?;
            let times = times
                .as_int()
                .ok_or_else(|| mismatch("Int", times, interp.interner()))?;
            let action = arg(name, &args, 1)?.clone();
            for index in 0..times {
                interp.call_value(&action, None, vec![Value::Int(index)])?;
            }
            Ok(Value::Unit)
        }
        _ => Err(unresolved(name).into()),
    }
}

/// `let`, `also`, `apply`, `run`, `takeIf` and `to`, which apply to any
/// receiver
fn scope_function<'p>(
    interp: &mut Interpreter<'p>,
    name: &str,
    this: &Value<'p>,
    args: &mut Vec<Value<'p>>,
) -> Option<Flow<'p>> {
    let block = args.first().cloned();
    let result = match (name, block) {
        ("let", Some(block)) => interp.call_value(&block, None, vec![this.clone()]),
        ("also", Some(block)) => interp
            .call_value(&block, None, vec![this.clone()])
            .map(|_| this.clone()),
        ("apply", Some(block)) => interp
            .call_value(&block, Some(this.clone()), Vec::new())
            .map(|_| this.clone()),
        ("run", Some(block)) => interp.call_value(&block, Some(this.clone()), Vec::new()),
        ("takeIf", Some(block)) => interp
            .call_value(&block, None, vec![this.clone()])
            .map(|keep| {
                if keep.as_bool() == Some(true) {
                    this.clone()
                } else {
                    Value::Null
                }
            }),
        ("to", Some(_)) => {
            let second = args.remove(0);
            interp.construct("Pair", vec![this.clone(), second])
        }
        _ => return None,
    };
    Some(result)
}

/// Members and extensions of `Iterable`, `Collection` and `List`
fn collection<'p>(interp: &mut Interpreter<'p>, name: &str, this: &Value<'p>, args: Vec<Value<'p>>) -> Flow<'p> {
    let items = interp.iterate(this)?;
    match name {
        "map" => {
            let transform = arg(name, &args, 0)?.clone();
            let mut mapped = Vec::with_capacity(items.len());
            for item in items {
                mapped.push(interp.call_value(&transform, None, vec![item])?);
            }
            Ok(Value::list(mapped))
        }
        "flatMap" => {
            let transform = arg(name, &args, 0)?.clone();
            let mut flattened = Vec::new();
            for item in items {
                let inner = interp.call_value(&transform, None, vec![item])?;
                flattened.extend(interp.iterate(&inner)?);
            }
            Ok(Value::list(flattened))
        }
        "forEach" => {
            let action = arg(name, &args, 0)?.clone();
            for item in items {
                interp.call_value(&action, None, vec![item])?;
            }
            Ok(Value::Unit)
        }
        "filter" | "count" | "any" | "all" => {
            let predicate = arg(name, &args, 0)?.clone();
            let mut kept = Vec::new();
            for item in items {
                let verdict = interp.call_value(&predicate, None, vec![item.clone()])?;
                let verdict = verdict
                    .as_bool()
                    .ok_or_else(|| mismatch("Boolean", &verdict, interp.interner()))?;
                match (name, verdict) {
                    ("any", true) => return Ok(Value::Bool(true)),
                    ("all", false) => return Ok(Value::Bool(false)),
                    (_, true) => kept.push(item),
                    (_, false) => {}
                }
            }
            Ok(match name {
                "any" => Value::Bool(false),
                "all" => Value::Bool(true),
                "count" => Value::Int(kept.len() as i64),
                _ => Value::list(kept),
            })
        }
        "fold" => {
            let mut accumulator = arg(name, &args, 0)?.clone();
            let operation = arg(name, &args, 1)?.clone();
            for item in items {
                accumulator = interp.call_value(&operation, None, vec![accumulator, item])?;
            }
            Ok(accumulator)
        }
        "first" => match items.into_iter().next() {
            Some(first) => Ok(first),
            None => interp.throw("IllegalStateException", "List is empty."),
        },
        "toList" => Ok(Value::list(items)),
        "sum" => {
            let mut total = 0i64;
            for item in &items {
                total = total.wrapping_add(
                    item.as_int()
                        .ok_or_else(|| mismatch("Int", item, interp.interner()))?,
                );
            }
            Ok(Value::Int(total))
        }
        "joinToString" => {
            let separator = match args.first() {
                Some(separator) => separator
                    .as_str()
                    .ok_or_else(|| mismatch("String", separator, interp.interner()))?
                    .to_string(),
                None => ", ".to_string(),
            };
            let parts: Vec<_> = items.iter().map(|item| interp.render(item)).collect();
            Ok(Value::string(parts.join(&separator)))
        }
        "isEmpty" => Ok(Value::Bool(items.is_empty())),
        "contains" => {
            let needle = arg(name, &args, 0)?;
            Ok(Value::Bool(items.contains(needle)))
        }
        "indexOf" => {
            let needle = arg(name, &args, 0)?;
            let index = items.iter().position(|item| item == needle);
            Ok(Value::Int(index.map_or(-1, |index| index as i64)))
        }
        "get" => {
            let index = arg(name, &args, 0)?;
            let index = index
                .as_int()
                .ok_or_else(|| mismatch("Int", index, interp.interner()))?;
            usize::try_from(index)
                .ok()
                .and_then(|slot| items.get(slot).cloned())
                .ok_or_else(|| {
                    EvalError::IndexOutOfBounds {
                        index,
                        len: items.len(),
                    }
                    .into()
                })
        }
        "add" => {
            let Value::List(storage) = this else {
                return Err(mismatch("MutableList", this, interp.interner()).into());
            };
            let element = arg(name, &args, 0)?.clone();
            storage.borrow_mut().push(element);
            Ok(Value::Bool(true))
        }
        _ => any(interp, name, this, &args),
    }
}

/// Extensions on `Any?`
fn any<'p>(interp: &mut Interpreter<'p>, name: &str, this: &Value<'p>, args: &[Value<'p>]) -> Flow<'p> {
    match name {
        "toString" => Ok(Value::string(interp.render(this))),
        "equals" => Ok(Value::Bool(this == arg(name, args, 0)?)),
        "hashCode" => {
            let mut hasher = FxHasher::default();
            interp.render(this).hash(&mut hasher);
            Ok(Value::Int(i64::from(hasher.finish() as i32)))
        }
        _ => Err(unresolved(name).into()),
    }
}
