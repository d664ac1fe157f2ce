//! The iterator builtin.
//!
//! Three backends share one payload type:
//!
//! - *Items*: a materialized deque of references.
//! - *Range*: a numeric half-open range walked by unit steps in either
//!   direction.
//! - *Generator*: a deque of already-yielded values plus the saved state of
//!   the suspended generator frame. `next` drives the frame until it yields
//!   again.

use crate::ast::cursor::{Cursor, ExecutionMode};
use crate::ast::runtime::Runtime;
use crate::ast::saved_state::SavedState;
use crate::error::{MintError, MintResult};
use crate::memory::class::Metatype;
use crate::memory::data::{Data, Object, Payload};
use crate::memory::function_tool::create_builtin_member;
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::global_data::GlobalData;
use crate::memory::reference::{InfoId, ReferenceFlags, WeakReference};
use std::collections::VecDeque;

/// Numeric range backend: yields `begin`, stepping toward `end` (exclusive).
pub struct RangeIter {
    pub begin: f64,
    pub end: f64,
    pub ascending: bool,
}

impl RangeIter {
    fn exhausted(&self) -> bool {
        if self.ascending {
            self.begin as i64 >= self.end as i64
        } else {
            self.begin as i64 <= self.end as i64
        }
    }

    fn advance(&mut self) {
        if self.ascending {
            self.begin += 1.0;
        } else {
            self.begin -= 1.0;
        }
    }

    fn size(&self) -> usize {
        if self.ascending {
            (self.end - self.begin).max(0.0) as usize
        } else {
            (self.begin - self.end).max(0.0) as usize
        }
    }
}

/// Generator backend: materialized values plus the frozen frame.
pub struct GeneratorCtx {
    pub items: VecDeque<WeakReference>,
    pub state: Option<SavedState>,
    pub exhausted: bool,
}

/// The iterator payload.
pub enum IteratorPayload {
    Items(VecDeque<WeakReference>),
    Range(RangeIter),
    Generator(Box<GeneratorCtx>),
}

impl IteratorPayload {
    pub fn items(items: VecDeque<WeakReference>) -> Self {
        IteratorPayload::Items(items)
    }

    /// Range covering `[begin, end]` when inclusive, `[begin, end)`
    /// otherwise, in either direction.
    pub fn range(begin: f64, end: f64, inclusive: bool) -> Self {
        let ascending = begin <= end;
        let bound = match (inclusive, ascending) {
            (true, true) => end + 1.0,
            (true, false) => end - 1.0,
            (false, _) => end,
        };
        IteratorPayload::Range(RangeIter {
            begin,
            end: bound,
            ascending,
        })
    }

    /// Raw range constructor, for copies.
    pub fn range_raw(begin: f64, end: f64, ascending: bool) -> Self {
        IteratorPayload::Range(RangeIter {
            begin,
            end,
            ascending,
        })
    }

    pub fn generator(state: SavedState) -> Self {
        IteratorPayload::Generator(Box::new(GeneratorCtx {
            items: VecDeque::new(),
            state: Some(state),
            exhausted: false,
        }))
    }

    pub fn size(&self) -> usize {
        match self {
            IteratorPayload::Items(items) => items.len(),
            IteratorPayload::Range(range) => range.size(),
            IteratorPayload::Generator(generator) => generator.items.len(),
        }
    }

    /// Whether iteration has nothing more to produce.
    ///
    /// A generator with a live saved state is not exhausted even with an
    /// empty deque; it needs a drive first.
    pub fn exhausted(&self) -> bool {
        match self {
            IteratorPayload::Items(items) => items.is_empty(),
            IteratorPayload::Range(range) => range.exhausted(),
            IteratorPayload::Generator(generator) => {
                generator.items.is_empty() && generator.state.is_none()
            }
        }
    }

    /// Whether producing the next value requires resuming the generator.
    pub fn needs_drive(&self) -> bool {
        match self {
            IteratorPayload::Generator(generator) => {
                generator.items.is_empty() && generator.state.is_some()
            }
            _ => false,
        }
    }

    /// Append a value. Ranges reject emplacement.
    pub fn emplace(&mut self, value: WeakReference) -> MintResult<()> {
        match self {
            IteratorPayload::Items(items) => {
                items.push_back(value);
                Ok(())
            }
            IteratorPayload::Generator(generator) => {
                generator.items.push_back(value);
                Ok(())
            }
            IteratorPayload::Range(_) => Err(MintError::Internal(
                "emplace into a range iterator".to_string(),
            )),
        }
    }

    pub fn visit_children(&self, visit: &mut dyn FnMut(InfoId)) {
        match self {
            IteratorPayload::Items(items) => {
                for item in items {
                    visit(item.info());
                }
            }
            IteratorPayload::Range(_) => {}
            IteratorPayload::Generator(generator) => {
                for item in &generator.items {
                    visit(item.info());
                }
                if let Some(state) = &generator.state {
                    state.visit_children(visit);
                }
            }
        }
    }
}

/// Allocate an iterator object around a payload.
pub fn create_iterator(
    global: &GlobalData,
    gc: &mut GarbageCollector,
    payload: IteratorPayload,
) -> WeakReference {
    let class = global.builtin_class(Metatype::Iterator);
    let data = gc.alloc(Data::Object(Object {
        class,
        slots: Some(Box::new([])),
        payload: Payload::Iterator(payload),
        finalize: false,
    }));
    gc.new_reference(ReferenceFlags::CONST_TEMPORARY, data)
}

/// Payload view of an iterator reference.
pub fn payload_of<'a>(
    gc: &'a GarbageCollector,
    reference: &WeakReference,
) -> Option<&'a IteratorPayload> {
    match gc.data_of(reference) {
        Data::Object(Object {
            payload: Payload::Iterator(payload),
            ..
        }) => Some(payload),
        _ => None,
    }
}

fn with_payload_mut<R>(
    gc: &mut GarbageCollector,
    reference: &WeakReference,
    action: impl FnOnce(&mut IteratorPayload) -> R,
) -> MintResult<R> {
    match gc.data_of_mut(reference) {
        Data::Object(Object {
            payload: Payload::Iterator(payload),
            ..
        }) => Ok(action(payload)),
        other => Err(MintError::Internal(format!(
            "expected iterator, found {}",
            other.format().name()
        ))),
    }
}

/// Current front value without advancing, or `None` when exhausted.
///
/// For ranges the value is materialized on each call; for generators a
/// `None` here with [`IteratorPayload::needs_drive`] true means the caller
/// must resume the frame first.
pub fn iterator_front(
    gc: &mut GarbageCollector,
    reference: &WeakReference,
) -> MintResult<Option<WeakReference>> {
    enum Front {
        Value(InfoId),
        Range(f64),
        End,
    }
    let front = with_payload_mut(gc, reference, |payload| match payload {
        IteratorPayload::Items(items) => match items.front() {
            Some(item) => Front::Value(item.info()),
            None => Front::End,
        },
        IteratorPayload::Range(range) => {
            if range.exhausted() {
                Front::End
            } else {
                Front::Range(range.begin)
            }
        }
        IteratorPayload::Generator(generator) => match generator.items.front() {
            Some(item) => Front::Value(item.info()),
            None => Front::End,
        },
    })?;

    Ok(match front {
        Front::Value(info) => Some(gc.share_raw(info)),
        Front::Range(value) => Some(gc.create(Data::Number(value))),
        Front::End => None,
    })
}

/// Step past the current front value.
pub fn iterator_advance(
    gc: &mut GarbageCollector,
    reference: &WeakReference,
) -> MintResult<()> {
    let discarded = with_payload_mut(gc, reference, |payload| match payload {
        IteratorPayload::Items(items) => items.pop_front(),
        IteratorPayload::Range(range) => {
            range.advance();
            None
        }
        IteratorPayload::Generator(generator) => generator.items.pop_front(),
    })?;
    if let Some(reference) = discarded {
        gc.discard(reference);
    }
    Ok(())
}

/// Take the saved state out of a generator iterator for resumption.
pub fn take_generator_state(
    gc: &mut GarbageCollector,
    reference: &WeakReference,
) -> MintResult<Option<SavedState>> {
    with_payload_mut(gc, reference, |payload| match payload {
        IteratorPayload::Generator(generator) => generator.state.take(),
        _ => None,
    })
}

/// Park a saved state back into its generator iterator.
pub fn store_generator_state(
    gc: &mut GarbageCollector,
    reference: &WeakReference,
    state: SavedState,
) -> MintResult<()> {
    with_payload_mut(gc, reference, |payload| {
        if let IteratorPayload::Generator(generator) = payload {
            generator.state = Some(state);
        }
    })
}

/// Mark a generator iterator as run to completion.
pub fn close_generator(gc: &mut GarbageCollector, reference: &WeakReference) -> MintResult<()> {
    with_payload_mut(gc, reference, |payload| {
        if let IteratorPayload::Generator(generator) = payload {
            generator.exhausted = true;
        }
    })
}

/// Detach a generator's saved state for finalization, flipping it to
/// single-pass mode.
pub fn take_state_for_finalize(
    gc: &mut GarbageCollector,
    reference: &WeakReference,
) -> MintResult<Option<SavedState>> {
    with_payload_mut(gc, reference, |payload| match payload {
        IteratorPayload::Generator(generator) => generator.state.take().map(|mut state| {
            state.mode = ExecutionMode::SinglePass;
            generator.exhausted = true;
            state
        }),
        _ => None,
    })
}

// ----------------------------------------------------------------------
// Builtin methods

pub(crate) fn register(runtime: &mut Runtime) {
    let class = runtime.global.builtin_class(Metatype::Iterator);
    create_builtin_member(runtime, class, "next", 1, iterator_next_method);
    create_builtin_member(runtime, class, "value", 1, iterator_value_method);
    create_builtin_member(runtime, class, "isEmpty", 1, iterator_is_empty_method);
    create_builtin_member(runtime, class, "size", 1, iterator_size_method);
}

/// `it.next()`: produce the front value and advance past it.
///
/// A generator with no materialized value restores its saved frame and
/// replays the trampoline: the frame runs until `YIELD` materializes the
/// value, control falls back here, and the replay pops it.
fn iterator_next_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("next() without receiver");

    if payload_of(&runtime.gc, &self_ref)
        .map(|payload| payload.needs_drive())
        .unwrap_or(false)
    {
        return drive_generator(runtime, cursor, self_ref);
    }

    match iterator_front(&mut runtime.gc, &self_ref)? {
        Some(value) => {
            iterator_advance(&mut runtime.gc, &self_ref)?;
            cursor.push(value);
        }
        None => {
            let none = runtime.gc.none_reference();
            cursor.push(none);
        }
    }
    runtime.gc.discard(self_ref);
    Ok(())
}

/// `it.value()`: front value without advancing.
fn iterator_value_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("value() without receiver");

    if payload_of(&runtime.gc, &self_ref)
        .map(|payload| payload.needs_drive())
        .unwrap_or(false)
    {
        return drive_generator(runtime, cursor, self_ref);
    }

    match iterator_front(&mut runtime.gc, &self_ref)? {
        Some(value) => cursor.push(value),
        None => {
            let none = runtime.gc.none_reference();
            cursor.push(none);
        }
    }
    runtime.gc.discard(self_ref);
    Ok(())
}

fn iterator_is_empty_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("isEmpty() without receiver");

    if payload_of(&runtime.gc, &self_ref)
        .map(|payload| payload.needs_drive())
        .unwrap_or(false)
    {
        return drive_generator_for_check(runtime, cursor, self_ref);
    }

    let empty = payload_of(&runtime.gc, &self_ref)
        .map(|payload| payload.exhausted())
        .unwrap_or(true);
    let result = runtime.gc.create(Data::Boolean(empty));
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn iterator_size_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("size() without receiver");
    let size = payload_of(&runtime.gc, &self_ref)
        .map(|payload| payload.size())
        .unwrap_or(0);
    let result = runtime.gc.create(Data::Number(size as f64));
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

/// Resume a generator frame and replay the current builtin call once the
/// frame yields back.
///
/// The receiver goes back on the stack and the trampoline's instruction
/// pointer rewinds to the `CALL_BUILTIN` node, so after the generator's next
/// `YIELD` (or generator exit) re-enters this builtin, the materialized
/// value is there to pop.
fn drive_generator(runtime: &mut Runtime, cursor: &mut Cursor, self_ref: WeakReference) -> MintResult<()> {
    let state = take_generator_state(&mut runtime.gc, &self_ref)?
        .ok_or(MintError::GeneratorClosed)?;

    // Rewind over CALL_BUILTIN + parameter.
    let replay_offset = cursor.offset() - 2;
    let target = runtime.gc.share(&self_ref);
    cursor.push(self_ref);
    cursor.jmp(replay_offset);

    cursor.restore(state);
    cursor.current_mut().generator = Some(target);
    Ok(())
}

fn drive_generator_for_check(
    runtime: &mut Runtime,
    cursor: &mut Cursor,
    self_ref: WeakReference,
) -> MintResult<()> {
    drive_generator(runtime, cursor, self_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_inclusive_ascending() {
        let payload = IteratorPayload::range(1.0, 3.0, true);
        match &payload {
            IteratorPayload::Range(range) => {
                assert!(range.ascending);
                assert_eq!(range.size(), 3);
            }
            _ => panic!("expected range"),
        }
    }

    #[test]
    fn range_exclusive_descending() {
        let payload = IteratorPayload::range(3.0, 1.0, false);
        match &payload {
            IteratorPayload::Range(range) => {
                assert!(!range.ascending);
                assert_eq!(range.size(), 2);
            }
            _ => panic!("expected range"),
        }
    }

    #[test]
    fn range_walks_and_exhausts() {
        let mut gc = GarbageCollector::new();
        let global = GlobalData::new();
        let it = create_iterator(&global, &mut gc, IteratorPayload::range(0.0, 2.0, false));

        let mut seen = Vec::new();
        while let Some(value) = iterator_front(&mut gc, &it).unwrap() {
            match gc.data_of(&value) {
                Data::Number(n) => seen.push(*n),
                _ => panic!("range yields numbers"),
            }
            gc.discard(value);
            iterator_advance(&mut gc, &it).unwrap();
        }
        assert_eq!(seen, vec![0.0, 1.0]);
        assert!(payload_of(&gc, &it).unwrap().exhausted());

        gc.discard(it);
    }

    #[test]
    fn items_front_shares_the_element() {
        let mut gc = GarbageCollector::new();
        let global = GlobalData::new();
        let element = gc.create(Data::Number(9.0));
        let element_data = gc.data_id(&element);

        let mut items = VecDeque::new();
        items.push_back(element);
        let it = create_iterator(&global, &mut gc, IteratorPayload::items(items));

        let front = iterator_front(&mut gc, &it).unwrap().unwrap();
        assert_eq!(gc.data_id(&front), element_data);
        gc.discard(front);

        iterator_advance(&mut gc, &it).unwrap();
        assert!(iterator_front(&mut gc, &it).unwrap().is_none());
        gc.discard(it);
    }
}
