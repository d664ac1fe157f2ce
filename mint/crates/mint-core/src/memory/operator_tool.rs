//! Operator tooling: built-in operator semantics and the call machinery.
//!
//! Every operator opcode follows one contract: when the left operand has a
//! built-in representation the internal handler runs; otherwise the operand
//! class's operator table is consulted and the overload dispatched as a
//! member call; with neither, NO_SUCH_OPERATOR is raised.

use crate::ast::cursor::{Call, Cursor};
use crate::ast::runtime::Runtime;
use crate::error::{MintError, MintResult};
use crate::memory::builtin::array::create_array;
use crate::memory::builtin::hash;
use crate::memory::builtin::iterator::{
    create_iterator, payload_of as iterator_payload, IteratorPayload,
};
use crate::memory::builtin::regex::payload_of as regex_payload;
use crate::memory::builtin::string::{
    code_point_at, code_point_count, create_string, resolve_index, text_of,
};
use crate::memory::cast_tool::{to_boolean, to_integer, to_number, type_name};
use crate::memory::class::Operator;
use crate::memory::data::{Data, Object, Payload};
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::reference::{ReferenceFlags, WeakReference};
use std::collections::VecDeque;

// ----------------------------------------------------------------------
// Call machinery

/// `CALL n`: pop the waiting call and enter the resolved frame.
pub fn call_operator(runtime: &mut Runtime, cursor: &mut Cursor, signature: i32) -> MintResult<()> {
    let call = cursor
        .pop_waiting_call()
        .ok_or_else(|| MintError::Internal("CALL without a waiting call".to_string()))?;
    finish_call(runtime, cursor, call, signature)
}

/// `CALL_MEMBER n`: like `CALL`, counting the receiver into the signature.
pub fn call_member_operator(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    signature: i32,
) -> MintResult<()> {
    let call = cursor
        .pop_waiting_call()
        .ok_or_else(|| MintError::Internal("CALL_MEMBER without a waiting call".to_string()))?;
    finish_call(runtime, cursor, call, signature)
}

fn finish_call(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    call: Call,
    signature: i32,
) -> MintResult<()> {
    let total = signature + i32::from(call.member) + call.extra_args as i32;

    enum Resolved {
        Enter {
            key: i32,
            handle: crate::ast::module::HandleId,
            capture: Option<Vec<(mint_util::Symbol, crate::memory::reference::InfoId)>>,
        },
        Instance,
        NotCallable(&'static str),
        NoMatch(String),
    }

    let resolved = match runtime.gc.data_of(&call.function) {
        Data::Function(function) => match function.resolve(total) {
            Some((key, entry)) => Resolved::Enter {
                key,
                handle: entry.handle,
                capture: entry.capture.as_ref().map(|capture| {
                    capture
                        .iter()
                        .map(|(symbol, reference)| (*symbol, reference.info()))
                        .collect()
                }),
            },
            None => Resolved::NoMatch("function".to_string()),
        },
        Data::Object(object) if !object.is_class() && call.metadata.is_some() => {
            // Constructor of a class with no `new` operator: the prepared
            // instance is the call's result.
            if total == 0 {
                Resolved::Instance
            } else {
                Resolved::NoMatch(type_name(&runtime.gc, &runtime.global, &call.function))
            }
        }
        other => Resolved::NotCallable(other.format().name()),
    };

    match resolved {
        Resolved::Enter {
            key,
            handle,
            capture,
        } => {
            let fixed = if key < 0 { !key } else { key };
            let extra = (total - fixed).max(0) as usize;

            let capture = capture.map(|pairs| {
                pairs
                    .into_iter()
                    .map(|(symbol, info)| (symbol, runtime.gc.share_raw(info)))
                    .collect::<Vec<_>>()
            });
            let handle = *runtime.modules.handle(handle);
            let builtin = handle.module == runtime.builtin_module();
            cursor.begin_call(
                &mut runtime.gc,
                &handle,
                call.metadata,
                capture,
                total as usize,
                extra,
                builtin,
            );
            runtime.gc.discard(call.function);

            // Calling a generator does not run the body: the fresh frame
            // (arguments included) freezes into a saved state owned by the
            // returned iterator, and resumes on `next`.
            if handle.generator {
                let state = cursor.interrupt();
                let iterator = create_iterator(
                    &runtime.global,
                    &mut runtime.gc,
                    IteratorPayload::generator(state),
                );
                cursor.push(iterator);
            }
            Ok(())
        }
        Resolved::Instance => {
            cursor.push(call.function);
            Ok(())
        }
        Resolved::NotCallable(type_name) => {
            runtime.gc.discard(call.function);
            Err(MintError::NoSuchOperator {
                type_name: type_name.to_string(),
                operator: "()",
            })
        }
        Resolved::NoMatch(type_name) => {
            runtime.gc.discard(call.function);
            Err(MintError::ArityMismatch {
                type_name,
                signature: total,
            })
        }
    }
}

/// Dispatch an operator overload on the operand `signature` slots below the
/// top of stack. Returns whether a handler was found and entered.
pub fn call_overload(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    op: Operator,
    signature: i32,
) -> MintResult<bool> {
    let operand = cursor
        .peek(signature as usize)
        .ok_or_else(|| MintError::Internal("operand missing for overload".to_string()))?
        .raw_alias();

    let found = match runtime.gc.data_of(&operand) {
        Data::Object(object) => runtime
            .global
            .class(object.class)
            .find_operator(op)
            .map(|member| (member.value.raw_alias(), member.owner)),
        _ => None,
    };
    let Some((handler, owner)) = found else {
        return Ok(false);
    };

    let handler = runtime.gc.share(&handler);
    let mut call = Call::new(handler);
    call.metadata = Some(owner);
    call.member = true;
    cursor.push_waiting_call(call);
    call_member_operator(runtime, cursor, signature)?;
    Ok(true)
}

// ----------------------------------------------------------------------
// Equality

/// Non-dispatching `==` over built-in representations.
///
/// Booleans promote against numbers; strings and arrays compare by content;
/// reference kinds without content equality compare by identity.
pub fn eq_values(gc: &GarbageCollector, lhs: &WeakReference, rhs: &WeakReference) -> bool {
    eq_data(gc, lhs, rhs)
}

fn eq_data(gc: &GarbageCollector, lhs: &WeakReference, rhs: &WeakReference) -> bool {
    match (gc.data_of(lhs), gc.data_of(rhs)) {
        (Data::None, Data::None) => true,
        (Data::Null, Data::Null) => true,
        (Data::Number(a), Data::Number(b)) => a == b,
        (Data::Boolean(a), Data::Boolean(b)) => a == b,
        (Data::Number(a), Data::Boolean(b)) => *a == f64::from(*b),
        (Data::Boolean(a), Data::Number(b)) => f64::from(*a) == *b,
        (Data::Object(a), Data::Object(b)) => match (&a.payload, &b.payload) {
            (Payload::Str(x), Payload::Str(y)) => x == y,
            (Payload::Regex(x), Payload::Regex(y)) => x.source() == y.source(),
            (Payload::Array(x), Payload::Array(y)) => {
                x.len() == y.len()
                    && x.iter().zip(y.iter()).all(|(ex, ey)| eq_data(gc, ex, ey))
            }
            _ => gc.data_id(lhs) == gc.data_id(rhs),
        },
        (Data::Package(a), Data::Package(b)) => a == b,
        (Data::Function(_), Data::Function(_)) => gc.data_id(lhs) == gc.data_id(rhs),
        _ => false,
    }
}

// ----------------------------------------------------------------------
// Assignment

/// `MOVE_OP`: rebind the target's datum to the value's datum.
///
/// The target stays on the stack as the expression result.
pub fn move_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let value = pop_operand(cursor)?;
    let target = top_operand(cursor)?;

    if runtime.gc.flags(&target).contains(ReferenceFlags::CONST_VALUE) {
        runtime.gc.discard(value);
        return Err(MintError::InvalidModification);
    }
    let datum = runtime.gc.data_id(&value);
    runtime.gc.move_data(&target, datum);
    runtime.gc.discard(value);
    Ok(())
}

/// `COPY_OP`: replace the target's datum with a deep copy of the value's.
pub fn copy_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let value = pop_operand(cursor)?;
    let target = top_operand(cursor)?;

    // Non-copyable classes refuse duplication.
    if let Data::Object(object) = runtime.gc.data_of(&value) {
        if !object.is_class() && !runtime.global.class(object.class).is_copyable() {
            runtime.gc.discard(value);
            return Err(MintError::InvalidModification);
        }
    }
    let datum = runtime.gc.data_id(&value);
    let result = runtime.gc.copy_data(&target, datum);
    runtime.gc.discard(value);
    result
}

// ----------------------------------------------------------------------
// Arithmetic

pub fn add_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let rhs = pop_operand(cursor)?;
    let lhs = pop_operand(cursor)?;

    if let Some((a, b)) = numeric_pair(&runtime.gc, &lhs, &rhs) {
        return push_number(runtime, cursor, lhs, rhs, a + b);
    }
    if let (Some(a), Some(b)) = (text_of(&runtime.gc, &lhs), text_of(&runtime.gc, &rhs)) {
        let joined = format!("{a}{b}");
        discard_pair(runtime, lhs, rhs);
        let result = create_string(&runtime.global, &mut runtime.gc, &joined);
        cursor.push(result);
        return Ok(());
    }
    let concatenation: Option<Vec<crate::memory::reference::InfoId>> =
        match (runtime.gc.data_of(&lhs), runtime.gc.data_of(&rhs)) {
            (Data::Object(a), Data::Object(b)) => match (&a.payload, &b.payload) {
                (Payload::Array(x), Payload::Array(y)) => {
                    Some(x.iter().chain(y.iter()).map(|e| e.info()).collect())
                }
                _ => None,
            },
            _ => None,
        };
    if let Some(infos) = concatenation {
        let mut elements = Vec::with_capacity(infos.len());
        for info in infos {
            let share = runtime.gc.share_raw(info);
            elements.push(share);
        }
        discard_pair(runtime, lhs, rhs);
        let result = create_array(&runtime.global, &mut runtime.gc, elements);
        cursor.push(result);
        return Ok(());
    }
    binary_overload(runtime, cursor, Operator::Add, lhs, rhs)
}

pub fn sub_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    numeric_binary(runtime, cursor, Operator::Sub, |a, b| Ok(a - b))
}

pub fn mul_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    numeric_binary(runtime, cursor, Operator::Mul, |a, b| Ok(a * b))
}

/// Float division follows IEEE; only the modulo form raises on zero.
pub fn div_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    numeric_binary(runtime, cursor, Operator::Div, |a, b| Ok(a / b))
}

pub fn mod_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    numeric_binary(runtime, cursor, Operator::Mod, |a, b| {
        if b == 0.0 {
            Err(MintError::DivisionByZero)
        } else {
            Ok(a - b * (a / b).trunc())
        }
    })
}

pub fn pow_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    numeric_binary(runtime, cursor, Operator::Pow, |a, b| Ok(a.powf(b)))
}

pub fn neg_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    numeric_unary(runtime, cursor, Operator::Sub, |a| -a)
}

pub fn pos_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    numeric_unary(runtime, cursor, Operator::Add, |a| a)
}

/// `INC_OP`: in-place increment; the reference stays on the stack.
pub fn inc_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    step_operator(runtime, cursor, 1.0)
}

pub fn dec_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    step_operator(runtime, cursor, -1.0)
}

fn step_operator(runtime: &mut Runtime, cursor: &mut Cursor, step: f64) -> MintResult<()> {
    let target = top_operand(cursor)?;
    if runtime.gc.flags(&target).contains(ReferenceFlags::CONST_VALUE) {
        return Err(MintError::InvalidModification);
    }
    let value = to_number(&runtime.gc, &target)?;
    let datum = runtime.gc.alloc(Data::Number(value + step));
    runtime.gc.move_data(&target, datum);
    Ok(())
}

// ----------------------------------------------------------------------
// Comparison

pub fn eq_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    equality_operator(runtime, cursor, Operator::Eq, false)
}

pub fn ne_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    equality_operator(runtime, cursor, Operator::Ne, true)
}

fn equality_operator(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    op: Operator,
    negated: bool,
) -> MintResult<()> {
    let rhs = pop_operand(cursor)?;
    let lhs = pop_operand(cursor)?;

    if is_plain_object(&runtime.gc, &lhs) && has_overload(runtime, &lhs, op) {
        return binary_overload(runtime, cursor, op, lhs, rhs);
    }
    let equal = eq_values(&runtime.gc, &lhs, &rhs);
    discard_pair(runtime, lhs, rhs);
    let result = runtime.gc.create(Data::Boolean(equal != negated));
    cursor.push(result);
    Ok(())
}

/// Strict equality: same format, same content, no promotion, no overload.
pub fn strict_eq_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    strict_equality(runtime, cursor, false)
}

pub fn strict_ne_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    strict_equality(runtime, cursor, true)
}

fn strict_equality(runtime: &mut Runtime, cursor: &mut Cursor, negated: bool) -> MintResult<()> {
    let rhs = pop_operand(cursor)?;
    let lhs = pop_operand(cursor)?;
    let equal = runtime.gc.format_of(&lhs) == runtime.gc.format_of(&rhs)
        && eq_values(&runtime.gc, &lhs, &rhs);
    discard_pair(runtime, lhs, rhs);
    let result = runtime.gc.create(Data::Boolean(equal != negated));
    cursor.push(result);
    Ok(())
}

pub fn lt_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    ordering_operator(runtime, cursor, Operator::Lt, |ordering| {
        ordering == std::cmp::Ordering::Less
    })
}

pub fn gt_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    ordering_operator(runtime, cursor, Operator::Gt, |ordering| {
        ordering == std::cmp::Ordering::Greater
    })
}

pub fn le_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    ordering_operator(runtime, cursor, Operator::Le, |ordering| {
        ordering != std::cmp::Ordering::Greater
    })
}

pub fn ge_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    ordering_operator(runtime, cursor, Operator::Ge, |ordering| {
        ordering != std::cmp::Ordering::Less
    })
}

fn ordering_operator(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    op: Operator,
    accept: impl FnOnce(std::cmp::Ordering) -> bool,
) -> MintResult<()> {
    let rhs = pop_operand(cursor)?;
    let lhs = pop_operand(cursor)?;

    // IEEE ordering: any NaN operand fails every ordered predicate.
    if let Some((a, b)) = numeric_pair(&runtime.gc, &lhs, &rhs) {
        let outcome = a.partial_cmp(&b).map(accept).unwrap_or(false);
        discard_pair(runtime, lhs, rhs);
        let result = runtime.gc.create(Data::Boolean(outcome));
        cursor.push(result);
        return Ok(());
    }
    if let (Some(a), Some(b)) = (text_of(&runtime.gc, &lhs), text_of(&runtime.gc, &rhs)) {
        let outcome = accept(a.cmp(b));
        discard_pair(runtime, lhs, rhs);
        let result = runtime.gc.create(Data::Boolean(outcome));
        cursor.push(result);
        return Ok(());
    }
    binary_overload(runtime, cursor, op, lhs, rhs)
}

// ----------------------------------------------------------------------
// Logic

pub fn not_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let operand = pop_operand(cursor)?;
    let value = to_boolean(&runtime.gc, &operand);
    runtime.gc.discard(operand);
    let result = runtime.gc.create(Data::Boolean(!value));
    cursor.push(result);
    Ok(())
}

pub fn and_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    boolean_binary(runtime, cursor, |a, b| a && b)
}

pub fn or_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    boolean_binary(runtime, cursor, |a, b| a || b)
}

fn boolean_binary(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    combine: impl FnOnce(bool, bool) -> bool,
) -> MintResult<()> {
    let rhs = pop_operand(cursor)?;
    let lhs = pop_operand(cursor)?;
    let outcome = combine(
        to_boolean(&runtime.gc, &lhs),
        to_boolean(&runtime.gc, &rhs),
    );
    discard_pair(runtime, lhs, rhs);
    let result = runtime.gc.create(Data::Boolean(outcome));
    cursor.push(result);
    Ok(())
}

// ----------------------------------------------------------------------
// Bitwise

pub fn band_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    integer_binary(runtime, cursor, Operator::BAnd, |a, b| Ok(a & b))
}

pub fn bor_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    integer_binary(runtime, cursor, Operator::BOr, |a, b| Ok(a | b))
}

pub fn xor_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    integer_binary(runtime, cursor, Operator::XOr, |a, b| Ok(a ^ b))
}

pub fn compl_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let operand = pop_operand(cursor)?;
    if is_plain_object(&runtime.gc, &operand) {
        cursor.push(operand);
        if call_overload(runtime, cursor, Operator::Compl, 0)? {
            return Ok(());
        }
        let operand = cursor.pop().expect("operand was just pushed");
        let name = type_name(&runtime.gc, &runtime.global, &operand);
        runtime.gc.discard(operand);
        return Err(MintError::NoSuchOperator {
            type_name: name,
            operator: Operator::Compl.name(),
        });
    }
    let value = to_integer(&runtime.gc, &operand)?;
    runtime.gc.discard(operand);
    let result = runtime.gc.create(Data::Number(!value as f64));
    cursor.push(result);
    Ok(())
}

pub fn shift_left_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    integer_binary(runtime, cursor, Operator::ShiftLeft, |a, b| {
        shift_count(b).map(|count| a << count)
    })
}

pub fn shift_right_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    integer_binary(runtime, cursor, Operator::ShiftRight, |a, b| {
        shift_count(b).map(|count| a >> count)
    })
}

fn shift_count(count: i64) -> MintResult<u32> {
    if count < 0 {
        return Err(MintError::InvalidCast {
            type_name: "number".to_string(),
            target: "shift count",
        });
    }
    Ok((count as u64).min(63) as u32)
}

// ----------------------------------------------------------------------
// Ranges and iteration

pub fn inclusive_range_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    range_operator(runtime, cursor, Operator::InclusiveRange, true)
}

pub fn exclusive_range_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    range_operator(runtime, cursor, Operator::ExclusiveRange, false)
}

fn range_operator(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    op: Operator,
    inclusive: bool,
) -> MintResult<()> {
    let rhs = pop_operand(cursor)?;
    let lhs = pop_operand(cursor)?;

    if let Some((a, b)) = numeric_pair(&runtime.gc, &lhs, &rhs) {
        discard_pair(runtime, lhs, rhs);
        let result = create_iterator(
            &runtime.global,
            &mut runtime.gc,
            IteratorPayload::range(a, b, inclusive),
        );
        cursor.push(result);
        return Ok(());
    }
    binary_overload(runtime, cursor, op, lhs, rhs)
}

/// Build the iterator a `for` loop walks, per the operand's type.
pub fn iterator_init_value(
    runtime: &mut Runtime,
    reference: WeakReference,
) -> MintResult<WeakReference> {
    enum Backing {
        AsIs,
        CodePoints(Vec<String>),
        Elements(Vec<crate::memory::reference::InfoId>),
        Pairs(Vec<(crate::memory::reference::InfoId, crate::memory::reference::InfoId)>),
        Single,
    }

    let backing = match runtime.gc.data_of(&reference) {
        Data::Object(object) => match &object.payload {
            Payload::Iterator(_) => Backing::AsIs,
            Payload::Str(text) => {
                Backing::CodePoints(text.chars().map(|c| c.to_string()).collect())
            }
            Payload::Array(elements) => {
                Backing::Elements(elements.iter().map(|element| element.info()).collect())
            }
            Payload::Hash(hash) => Backing::Pairs(
                hash.entries()
                    .map(|(key, value)| (key.info(), value.info()))
                    .collect(),
            ),
            _ => Backing::Single,
        },
        _ => Backing::Single,
    };

    match backing {
        Backing::AsIs => Ok(reference),
        Backing::CodePoints(points) => {
            let mut items = VecDeque::with_capacity(points.len());
            for point in points {
                items.push_back(create_string(&runtime.global, &mut runtime.gc, &point));
            }
            runtime.gc.discard(reference);
            Ok(create_iterator(
                &runtime.global,
                &mut runtime.gc,
                IteratorPayload::items(items),
            ))
        }
        Backing::Elements(infos) => {
            let mut items = VecDeque::with_capacity(infos.len());
            for info in infos {
                let share = runtime.gc.share_raw(info);
                items.push_back(share);
            }
            runtime.gc.discard(reference);
            Ok(create_iterator(
                &runtime.global,
                &mut runtime.gc,
                IteratorPayload::items(items),
            ))
        }
        Backing::Pairs(pairs) => {
            let mut items = VecDeque::with_capacity(pairs.len());
            for (key, value) in pairs {
                let mut pair = VecDeque::with_capacity(2);
                let key = runtime.gc.share_raw(key);
                let value = runtime.gc.share_raw(value);
                pair.push_back(key);
                pair.push_back(value);
                items.push_back(create_iterator(
                    &runtime.global,
                    &mut runtime.gc,
                    IteratorPayload::items(pair),
                ));
            }
            runtime.gc.discard(reference);
            Ok(create_iterator(
                &runtime.global,
                &mut runtime.gc,
                IteratorPayload::items(items),
            ))
        }
        Backing::Single => {
            let mut items = VecDeque::with_capacity(1);
            items.push_back(reference);
            Ok(create_iterator(
                &runtime.global,
                &mut runtime.gc,
                IteratorPayload::items(items),
            ))
        }
    }
}

// ----------------------------------------------------------------------
// Membership

/// `IN_OP`: `needle in container`.
pub fn in_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let container = pop_operand(cursor)?;
    let needle = pop_operand(cursor)?;

    enum Containment {
        Found(bool),
        Overload,
    }

    let outcome = match runtime.gc.data_of(&container) {
        Data::Object(object) => match &object.payload {
            Payload::Hash(payload) => {
                let repr = hash::HashPayload::key_repr(&runtime.gc, &needle);
                Containment::Found(payload.contains_raw(&repr))
            }
            Payload::Array(elements) => Containment::Found(
                elements
                    .iter()
                    .any(|element| eq_values(&runtime.gc, element, &needle)),
            ),
            Payload::Str(text) => {
                let needle_text = text_of(&runtime.gc, &needle).unwrap_or_default();
                Containment::Found(text.contains(needle_text))
            }
            Payload::Iterator(IteratorPayload::Items(items)) => Containment::Found(
                items
                    .iter()
                    .any(|item| eq_values(&runtime.gc, item, &needle)),
            ),
            Payload::Plain => Containment::Overload,
            _ => Containment::Found(false),
        },
        _ => Containment::Found(false),
    };

    match outcome {
        Containment::Found(found) => {
            runtime.gc.discard(container);
            runtime.gc.discard(needle);
            let result = runtime.gc.create(Data::Boolean(found));
            cursor.push(result);
            Ok(())
        }
        Containment::Overload => {
            // The container is the receiver of the `in` overload.
            cursor.push(container);
            cursor.push(needle);
            if call_overload(runtime, cursor, Operator::In, 1)? {
                return Ok(());
            }
            let needle = cursor.pop().expect("needle was just pushed");
            let container = cursor.pop().expect("container was just pushed");
            let name = type_name(&runtime.gc, &runtime.global, &container);
            runtime.gc.discard(container);
            runtime.gc.discard(needle);
            Err(MintError::NoSuchOperator {
                type_name: name,
                operator: Operator::In.name(),
            })
        }
    }
}

// ----------------------------------------------------------------------
// Subscripts

/// `SUBSCRIPT_OP`: `container[index]`.
pub fn subscript_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let index = pop_operand(cursor)?;
    let container = pop_operand(cursor)?;

    enum Access {
        StringPoint(String),
        StringSlice(String),
        Element(crate::memory::reference::InfoId),
        HashHit(crate::memory::reference::InfoId),
        HashMiss,
        ArraySlice(Vec<crate::memory::reference::InfoId>),
        Overload,
        BadIndex(MintError),
    }

    let access = match runtime.gc.data_of(&container) {
        Data::Object(object) => match &object.payload {
            Payload::Str(text) => match runtime.gc.data_of(&index) {
                Data::Number(position) => {
                    match resolve_index(*position, code_point_count(text)) {
                        Ok(resolved) => Access::StringPoint(
                            code_point_at(text, resolved).unwrap_or_default().to_string(),
                        ),
                        Err(error) => Access::BadIndex(error),
                    }
                }
                Data::Object(Object {
                    payload: Payload::Iterator(_),
                    ..
                }) => match collect_string_slice(&runtime.gc, text, &index) {
                    Ok(slice) => Access::StringSlice(slice),
                    Err(error) => Access::BadIndex(error),
                },
                _ => Access::BadIndex(MintError::InvalidCast {
                    type_name: runtime.gc.format_of(&index).name().to_string(),
                    target: "string index",
                }),
            },
            Payload::Array(elements) => match runtime.gc.data_of(&index) {
                Data::Number(position) => match resolve_index(*position, elements.len()) {
                    Ok(resolved) => Access::Element(elements[resolved].info()),
                    Err(error) => Access::BadIndex(error),
                },
                Data::Object(Object {
                    payload: Payload::Iterator(_),
                    ..
                }) => match collect_array_slice(&runtime.gc, elements, &index) {
                    Ok(slice) => Access::ArraySlice(slice),
                    Err(error) => Access::BadIndex(error),
                },
                _ => Access::BadIndex(MintError::InvalidCast {
                    type_name: runtime.gc.format_of(&index).name().to_string(),
                    target: "array index",
                }),
            },
            Payload::Hash(payload) => {
                let repr = hash::HashPayload::key_repr(&runtime.gc, &index);
                match payload.get_raw(&repr) {
                    Some(value) => Access::HashHit(value.info()),
                    None => Access::HashMiss,
                }
            }
            Payload::Plain => Access::Overload,
            _ => Access::Overload,
        },
        _ => Access::Overload,
    };

    match access {
        Access::StringPoint(point) => {
            discard_pair(runtime, container, index);
            let result = create_string(&runtime.global, &mut runtime.gc, &point);
            cursor.push(result);
            Ok(())
        }
        Access::StringSlice(slice) => {
            discard_pair(runtime, container, index);
            let result = create_string(&runtime.global, &mut runtime.gc, &slice);
            cursor.push(result);
            Ok(())
        }
        Access::Element(info) => {
            let result = runtime.gc.share_raw(info);
            discard_pair(runtime, container, index);
            cursor.push(result);
            Ok(())
        }
        Access::ArraySlice(infos) => {
            let mut elements = Vec::with_capacity(infos.len());
            for info in infos {
                let share = runtime.gc.share_raw(info);
                elements.push(share);
            }
            discard_pair(runtime, container, index);
            let result = create_array(&runtime.global, &mut runtime.gc, elements);
            cursor.push(result);
            Ok(())
        }
        Access::HashHit(info) => {
            let result = runtime.gc.share_raw(info);
            discard_pair(runtime, container, index);
            cursor.push(result);
            Ok(())
        }
        Access::HashMiss => {
            // Reading a missing key creates the entry, mirroring symbol
            // tables; the caller may be about to assign through it.
            let key = runtime.gc.copy(&index);
            let value = runtime.gc.none_reference();
            let value_share = runtime.gc.share(&value);
            hash::hash_insert(&mut runtime.gc, &container, key, value)?;
            discard_pair(runtime, container, index);
            cursor.push(value_share);
            Ok(())
        }
        Access::Overload => {
            cursor.push(container);
            cursor.push(index);
            if call_overload(runtime, cursor, Operator::Subscript, 1)? {
                return Ok(());
            }
            let index = cursor.pop().expect("index was just pushed");
            let container = cursor.pop().expect("container was just pushed");
            let name = type_name(&runtime.gc, &runtime.global, &container);
            discard_pair(runtime, container, index);
            Err(MintError::NoSuchOperator {
                type_name: name,
                operator: Operator::Subscript.name(),
            })
        }
        Access::BadIndex(error) => {
            discard_pair(runtime, container, index);
            Err(error)
        }
    }
}

/// `SUBSCRIPT_MOVE_OP`: `container[index] = value`; the value stays on the
/// stack as the expression result.
pub fn subscript_move_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let value = pop_operand(cursor)?;
    let index = pop_operand(cursor)?;
    let container = pop_operand(cursor)?;

    enum Store {
        Element(crate::memory::reference::InfoId),
        Hash,
        Overload,
        BadIndex(MintError),
    }

    let store = match runtime.gc.data_of(&container) {
        Data::Object(object) => match &object.payload {
            Payload::Array(elements) => match runtime.gc.data_of(&index) {
                Data::Number(position) => match resolve_index(*position, elements.len()) {
                    Ok(resolved) => Store::Element(elements[resolved].info()),
                    Err(error) => Store::BadIndex(error),
                },
                _ => Store::BadIndex(MintError::InvalidCast {
                    type_name: runtime.gc.format_of(&index).name().to_string(),
                    target: "array index",
                }),
            },
            Payload::Hash(_) => Store::Hash,
            _ => Store::Overload,
        },
        _ => Store::Overload,
    };

    match store {
        Store::Element(info) => {
            let element = runtime.gc.share_raw(info);
            let datum = runtime.gc.data_id(&value);
            runtime.gc.move_data(&element, datum);
            runtime.gc.discard(element);
            discard_pair(runtime, container, index);
            cursor.push(value);
            Ok(())
        }
        Store::Hash => {
            let key = runtime.gc.copy(&index);
            let stored = runtime.gc.copy(&value);
            hash::hash_insert(&mut runtime.gc, &container, key, stored)?;
            discard_pair(runtime, container, index);
            cursor.push(value);
            Ok(())
        }
        Store::Overload => {
            cursor.push(container);
            cursor.push(index);
            cursor.push(value);
            if call_overload(runtime, cursor, Operator::SubscriptMove, 2)? {
                return Ok(());
            }
            let value = cursor.pop().expect("value was just pushed");
            let index = cursor.pop().expect("index was just pushed");
            let container = cursor.pop().expect("container was just pushed");
            let name = type_name(&runtime.gc, &runtime.global, &container);
            discard_pair(runtime, container, index);
            runtime.gc.discard(value);
            Err(MintError::NoSuchOperator {
                type_name: name,
                operator: Operator::SubscriptMove.name(),
            })
        }
        Store::BadIndex(error) => {
            discard_pair(runtime, container, index);
            runtime.gc.discard(value);
            Err(error)
        }
    }
}

fn collect_string_slice(
    gc: &GarbageCollector,
    text: &str,
    index: &WeakReference,
) -> MintResult<String> {
    let count = code_point_count(text);
    let mut slice = String::new();
    for position in iterate_numeric(gc, index)? {
        let resolved = resolve_index(position, count)?;
        slice.push_str(code_point_at(text, resolved).unwrap_or_default());
    }
    Ok(slice)
}

fn collect_array_slice(
    gc: &GarbageCollector,
    elements: &[WeakReference],
    index: &WeakReference,
) -> MintResult<Vec<crate::memory::reference::InfoId>> {
    let mut slice = Vec::new();
    for position in iterate_numeric(gc, index)? {
        let resolved = resolve_index(position, elements.len())?;
        slice.push(elements[resolved].info());
    }
    Ok(slice)
}

/// Walk a materialized or range iterator as a number sequence without
/// mutating it.
fn iterate_numeric(gc: &GarbageCollector, index: &WeakReference) -> MintResult<Vec<f64>> {
    let payload = iterator_payload(gc, index)
        .ok_or_else(|| MintError::Internal("numeric iteration over non-iterator".to_string()))?;
    match payload {
        IteratorPayload::Items(items) => items
            .iter()
            .map(|item| to_number(gc, item))
            .collect(),
        IteratorPayload::Range(range) => {
            let mut values = Vec::new();
            let mut current = range.begin;
            if range.ascending {
                while (current as i64) < (range.end as i64) {
                    values.push(current);
                    current += 1.0;
                }
            } else {
                while (current as i64) > (range.end as i64) {
                    values.push(current);
                    current -= 1.0;
                }
            }
            Ok(values)
        }
        IteratorPayload::Generator(generator) => generator
            .items
            .iter()
            .map(|item| to_number(gc, item))
            .collect(),
    }
}

// ----------------------------------------------------------------------
// Reflection

pub fn typeof_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let operand = pop_operand(cursor)?;
    let name = type_name(&runtime.gc, &runtime.global, &operand);
    runtime.gc.discard(operand);
    let result = create_string(&runtime.global, &mut runtime.gc, &name);
    cursor.push(result);
    Ok(())
}

pub fn membersof_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let operand = pop_operand(cursor)?;
    let names: Vec<String> = match runtime.gc.data_of(&operand) {
        Data::Object(object) => runtime
            .global
            .class(object.class)
            .members()
            .map(|(symbol, _)| symbol.as_str().to_string())
            .collect(),
        _ => Vec::new(),
    };
    runtime.gc.discard(operand);

    let mut elements = Vec::with_capacity(names.len());
    for name in names {
        elements.push(create_string(&runtime.global, &mut runtime.gc, &name));
    }
    let result = create_array(&runtime.global, &mut runtime.gc, elements);
    cursor.push(result);
    Ok(())
}

// ----------------------------------------------------------------------
// Regex operators

pub fn regex_match_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    regex_operator(runtime, cursor, Operator::RegexMatch, false)
}

pub fn regex_unmatch_operator(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    regex_operator(runtime, cursor, Operator::RegexUnmatch, true)
}

fn regex_operator(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    op: Operator,
    negated: bool,
) -> MintResult<()> {
    let rhs = pop_operand(cursor)?;
    let lhs = pop_operand(cursor)?;

    let outcome = match (
        text_of(&runtime.gc, &lhs),
        regex_payload(&runtime.gc, &rhs),
    ) {
        (Some(text), Some(pattern)) => Some(pattern.is_match(text)),
        _ => None,
    };
    match outcome {
        Some(matched) => {
            discard_pair(runtime, lhs, rhs);
            let result = runtime.gc.create(Data::Boolean(matched != negated));
            cursor.push(result);
            Ok(())
        }
        None => binary_overload(runtime, cursor, op, lhs, rhs),
    }
}

// ----------------------------------------------------------------------
// Shared helpers

fn pop_operand(cursor: &mut Cursor) -> MintResult<WeakReference> {
    cursor
        .pop()
        .ok_or_else(|| MintError::Internal("operand stack underflow".to_string()))
}

fn top_operand(cursor: &Cursor) -> MintResult<WeakReference> {
    Ok(cursor
        .top()
        .ok_or_else(|| MintError::Internal("operand stack underflow".to_string()))?
        .raw_alias())
}

fn discard_pair(runtime: &mut Runtime, first: WeakReference, second: WeakReference) {
    runtime.gc.discard(first);
    runtime.gc.discard(second);
}

/// Number/boolean promotion for arithmetic and ordering.
fn numeric_pair(gc: &GarbageCollector, lhs: &WeakReference, rhs: &WeakReference) -> Option<(f64, f64)> {
    let promote = |reference: &WeakReference| match gc.data_of(reference) {
        Data::Number(value) => Some(*value),
        Data::Boolean(value) => Some(f64::from(*value)),
        _ => None,
    };
    Some((promote(lhs)?, promote(rhs)?))
}

fn is_plain_object(gc: &GarbageCollector, reference: &WeakReference) -> bool {
    matches!(
        gc.data_of(reference),
        Data::Object(Object {
            payload: Payload::Plain,
            ..
        })
    )
}

fn has_overload(runtime: &Runtime, reference: &WeakReference, op: Operator) -> bool {
    match runtime.gc.data_of(reference) {
        Data::Object(object) => runtime
            .global
            .class(object.class)
            .find_operator(op)
            .is_some(),
        _ => false,
    }
}

fn numeric_binary(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    op: Operator,
    compute: impl FnOnce(f64, f64) -> MintResult<f64>,
) -> MintResult<()> {
    let rhs = pop_operand(cursor)?;
    let lhs = pop_operand(cursor)?;
    if let Some((a, b)) = numeric_pair(&runtime.gc, &lhs, &rhs) {
        let value = match compute(a, b) {
            Ok(value) => value,
            Err(error) => {
                discard_pair(runtime, lhs, rhs);
                return Err(error);
            }
        };
        return push_number(runtime, cursor, lhs, rhs, value);
    }
    binary_overload(runtime, cursor, op, lhs, rhs)
}

fn integer_binary(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    op: Operator,
    compute: impl FnOnce(i64, i64) -> MintResult<i64>,
) -> MintResult<()> {
    let rhs = pop_operand(cursor)?;
    let lhs = pop_operand(cursor)?;
    if let Some((a, b)) = numeric_pair(&runtime.gc, &lhs, &rhs) {
        // Integer-like operators convert by truncation.
        let value = match compute(a.trunc() as i64, b.trunc() as i64) {
            Ok(value) => value,
            Err(error) => {
                discard_pair(runtime, lhs, rhs);
                return Err(error);
            }
        };
        return push_number(runtime, cursor, lhs, rhs, value as f64);
    }
    binary_overload(runtime, cursor, op, lhs, rhs)
}

fn numeric_unary(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    op: Operator,
    compute: impl FnOnce(f64) -> f64,
) -> MintResult<()> {
    let operand = pop_operand(cursor)?;
    match numeric_pair(&runtime.gc, &operand, &operand) {
        Some((value, _)) => {
            runtime.gc.discard(operand);
            let result = runtime.gc.create(Data::Number(compute(value)));
            cursor.push(result);
            Ok(())
        }
        None => {
            if is_plain_object(&runtime.gc, &operand) {
                cursor.push(operand);
                if call_overload(runtime, cursor, op, 0)? {
                    return Ok(());
                }
                let operand = cursor.pop().expect("operand was just pushed");
                let name = type_name(&runtime.gc, &runtime.global, &operand);
                runtime.gc.discard(operand);
                return Err(MintError::NoSuchOperator {
                    type_name: name,
                    operator: op.name(),
                });
            }
            let name = type_name(&runtime.gc, &runtime.global, &operand);
            runtime.gc.discard(operand);
            Err(MintError::NoSuchOperator {
                type_name: name,
                operator: op.name(),
            })
        }
    }
}

fn push_number(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    lhs: WeakReference,
    rhs: WeakReference,
    value: f64,
) -> MintResult<()> {
    discard_pair(runtime, lhs, rhs);
    let result = runtime.gc.create(Data::Number(value));
    cursor.push(result);
    Ok(())
}

/// Fall back to the left operand's overload, or raise NO_SUCH_OPERATOR.
fn binary_overload(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    op: Operator,
    lhs: WeakReference,
    rhs: WeakReference,
) -> MintResult<()> {
    cursor.push(lhs);
    cursor.push(rhs);
    if call_overload(runtime, cursor, op, 1)? {
        return Ok(());
    }
    let rhs = cursor.pop().expect("rhs was just pushed");
    let lhs = cursor.pop().expect("lhs was just pushed");
    let name = type_name(&runtime.gc, &runtime.global, &lhs);
    discard_pair(runtime, lhs, rhs);
    Err(MintError::NoSuchOperator {
        type_name: name,
        operator: op.name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::module::MAIN_ID;
    use crate::config::RuntimeConfig;

    fn push_numbers(runtime: &mut Runtime, cursor: &mut Cursor, values: &[f64]) {
        for value in values {
            let reference = runtime.gc.create(Data::Number(*value));
            cursor.push(reference);
        }
    }

    fn pop_number(runtime: &mut Runtime, cursor: &mut Cursor) -> f64 {
        let reference = cursor.pop().unwrap();
        let value = match runtime.gc.data_of(&reference) {
            Data::Number(value) => *value,
            other => panic!("expected number, found {}", other.format().name()),
        };
        runtime.gc.discard(reference);
        value
    }

    fn pop_boolean(runtime: &mut Runtime, cursor: &mut Cursor) -> bool {
        let reference = cursor.pop().unwrap();
        let value = match runtime.gc.data_of(&reference) {
            Data::Boolean(value) => *value,
            other => panic!("expected boolean, found {}", other.format().name()),
        };
        runtime.gc.discard(reference);
        value
    }

    #[test]
    fn arithmetic_on_numbers() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        push_numbers(&mut runtime, &mut cursor, &[3.0, 4.0]);
        add_operator(&mut runtime, &mut cursor).unwrap();
        assert_eq!(pop_number(&mut runtime, &mut cursor), 7.0);

        push_numbers(&mut runtime, &mut cursor, &[3.0, 4.0]);
        mul_operator(&mut runtime, &mut cursor).unwrap();
        assert_eq!(pop_number(&mut runtime, &mut cursor), 12.0);
    }

    #[test]
    fn boolean_promotes_to_number() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        let truth = runtime.gc.create(Data::Boolean(true));
        cursor.push(truth);
        let one = runtime.gc.create(Data::Number(1.0));
        cursor.push(one);
        eq_operator(&mut runtime, &mut cursor).unwrap();
        assert!(pop_boolean(&mut runtime, &mut cursor));
    }

    #[test]
    fn strict_equality_refuses_promotion() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        let truth = runtime.gc.create(Data::Boolean(true));
        cursor.push(truth);
        let one = runtime.gc.create(Data::Number(1.0));
        cursor.push(one);
        strict_eq_operator(&mut runtime, &mut cursor).unwrap();
        assert!(!pop_boolean(&mut runtime, &mut cursor));
    }

    #[test]
    fn nan_fails_ordered_predicates() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        push_numbers(&mut runtime, &mut cursor, &[f64::NAN, 1.0]);
        lt_operator(&mut runtime, &mut cursor).unwrap();
        assert!(!pop_boolean(&mut runtime, &mut cursor));

        push_numbers(&mut runtime, &mut cursor, &[f64::NAN, 1.0]);
        ge_operator(&mut runtime, &mut cursor).unwrap();
        assert!(!pop_boolean(&mut runtime, &mut cursor));
    }

    #[test]
    fn modulo_by_zero_raises() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        push_numbers(&mut runtime, &mut cursor, &[5.0, 0.0]);
        assert!(matches!(
            mod_operator(&mut runtime, &mut cursor),
            Err(MintError::DivisionByZero)
        ));
        // Float division follows IEEE.
        push_numbers(&mut runtime, &mut cursor, &[5.0, 0.0]);
        div_operator(&mut runtime, &mut cursor).unwrap();
        assert!(pop_number(&mut runtime, &mut cursor).is_infinite());
    }

    #[test]
    fn negative_shift_count_raises() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        push_numbers(&mut runtime, &mut cursor, &[1.0, -2.0]);
        assert!(shift_left_operator(&mut runtime, &mut cursor).is_err());
    }

    #[test]
    fn string_concatenation() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        let lhs = create_string(&runtime.global, &mut runtime.gc, "ab");
        cursor.push(lhs);
        let rhs = create_string(&runtime.global, &mut runtime.gc, "cd");
        cursor.push(rhs);
        add_operator(&mut runtime, &mut cursor).unwrap();

        let result = cursor.pop().unwrap();
        assert_eq!(text_of(&runtime.gc, &result), Some("abcd"));
        runtime.gc.discard(result);
    }

    #[test]
    fn number_without_overload_raises_no_such_operator() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        let lhs = runtime.gc.create(Data::Number(1.0));
        cursor.push(lhs);
        let rhs = create_string(&runtime.global, &mut runtime.gc, "x");
        cursor.push(rhs);
        assert!(matches!(
            add_operator(&mut runtime, &mut cursor),
            Err(MintError::NoSuchOperator { .. })
        ));
    }

    #[test]
    fn move_into_const_value_raises() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        let constant = runtime.gc.create(Data::Number(1.0));
        cursor.push(constant);
        let value = runtime.gc.create(Data::Number(2.0));
        cursor.push(value);
        assert!(matches!(
            move_operator(&mut runtime, &mut cursor),
            Err(MintError::InvalidModification)
        ));
        cursor.cleanup(&mut runtime.gc);
    }

    #[test]
    fn subscript_string_by_code_point() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        let text = create_string(&runtime.global, &mut runtime.gc, "tëst");
        cursor.push(text);
        let index = runtime.gc.create(Data::Number(1.0));
        cursor.push(index);
        subscript_operator(&mut runtime, &mut cursor).unwrap();

        let result = cursor.pop().unwrap();
        assert_eq!(text_of(&runtime.gc, &result), Some("ë"));
        runtime.gc.discard(result);
    }

    #[test]
    fn subscript_string_by_inclusive_range() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        let text = create_string(&runtime.global, &mut runtime.gc, "tëst");
        cursor.push(text);
        push_numbers(&mut runtime, &mut cursor, &[1.0, 2.0]);
        inclusive_range_operator(&mut runtime, &mut cursor).unwrap();
        subscript_operator(&mut runtime, &mut cursor).unwrap();

        let result = cursor.pop().unwrap();
        assert_eq!(text_of(&runtime.gc, &result), Some("ës"));
        runtime.gc.discard(result);
    }

    #[test]
    fn subscript_array_with_negative_index() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut cursor = Cursor::new(MAIN_ID, 0);

        let elements = vec![
            runtime.gc.create(Data::Number(10.0)),
            runtime.gc.create(Data::Number(20.0)),
        ];
        let array = create_array(&runtime.global, &mut runtime.gc, elements);
        cursor.push(array);
        let index = runtime.gc.create(Data::Number(-1.0));
        cursor.push(index);
        subscript_operator(&mut runtime, &mut cursor).unwrap();
        assert_eq!(pop_number(&mut runtime, &mut cursor), 20.0);
    }
}
