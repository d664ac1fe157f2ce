//! Destructor processes.
//!
//! When an object of a user class declaring a `delete` operator dies, the
//! collector parks it on the destructor queue; the scheduler turns each
//! entry into a process that invokes the operator, then releases the
//! backing memory through [`crate::memory::GarbageCollector::destroy`].

use crate::ast::cursor::{Call, Cursor};
use crate::ast::runtime::Runtime;
use crate::error::MintResult;
use crate::memory::class::Operator;
use crate::memory::data::{Data, DataId};
use crate::memory::operator_tool::call_member_operator;
use crate::memory::reference::ReferenceFlags;
use crate::scheduler::process::{Process, ProcessRole};

/// Build the process running `object`'s delete operator.
///
/// Returns `None` when the object's class has no destructor after all (the
/// caller should release the object directly).
pub fn make_destructor_process(runtime: &mut Runtime, object: DataId) -> MintResult<Option<Process>> {
    let class_id = match runtime.gc.data(object) {
        Data::Object(data) => data.class,
        _ => return Ok(None),
    };
    let found = runtime
        .global
        .class(class_id)
        .find_operator(Operator::Delete)
        .map(|member| member.value.raw_alias());
    let Some(member) = found else {
        return Ok(None);
    };

    let mut cursor = Cursor::new(runtime.exec_module(), 0);
    let self_ref = runtime.gc.new_reference(ReferenceFlags::DEFAULT, object);
    cursor.push(self_ref);

    let function = runtime.gc.share(&member);
    let mut call = Call::new(function);
    call.metadata = Some(class_id);
    call.member = true;
    cursor.push_waiting_call(call);
    call_member_operator(runtime, &mut cursor, 0)?;

    Ok(Some(Process::from_cursor(
        cursor,
        ProcessRole::Destructor { object },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::memory::data::Object;
    use crate::memory::data::Payload;

    #[test]
    fn objects_without_delete_yield_no_process() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let class = runtime
            .global
            .builtin_class(crate::memory::class::Metatype::Object);
        let object = runtime.gc.alloc(Data::Object(Object {
            class,
            slots: Some(Box::new([])),
            payload: Payload::Plain,
            finalize: false,
        }));
        runtime.gc.use_data(object);

        assert!(make_destructor_process(&mut runtime, object)
            .unwrap()
            .is_none());
        runtime.gc.release_data(object);
    }
}
