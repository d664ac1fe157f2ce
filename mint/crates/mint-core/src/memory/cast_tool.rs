//! Cast tooling: value coercions.
//!
//! Strict conversions raise INVALID_CAST; truthiness and printing never
//! fail.

use crate::error::{MintError, MintResult};
use crate::memory::data::{Data, Object, Payload};
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::global_data::GlobalData;
use crate::memory::reference::WeakReference;

/// Strict numeric conversion.
///
/// Booleans promote (`true == 1`); strings parse; None and Null refuse.
pub fn to_number(gc: &GarbageCollector, reference: &WeakReference) -> MintResult<f64> {
    match gc.data_of(reference) {
        Data::Number(value) => Ok(*value),
        Data::Boolean(value) => Ok(if *value { 1.0 } else { 0.0 }),
        Data::Object(Object {
            payload: Payload::Str(text),
            ..
        }) => text.trim().parse::<f64>().map_err(|_| MintError::InvalidCast {
            type_name: "string".to_string(),
            target: "number",
        }),
        other => Err(MintError::InvalidCast {
            type_name: other.format().name().to_string(),
            target: "number",
        }),
    }
}

/// Truncating integer conversion.
pub fn to_integer(gc: &GarbageCollector, reference: &WeakReference) -> MintResult<i64> {
    Ok(to_number(gc, reference)?.trunc() as i64)
}

/// Truthiness. Never fails.
///
/// None, Null, `false`, and zero are false; everything else is true.
pub fn to_boolean(gc: &GarbageCollector, reference: &WeakReference) -> bool {
    match gc.data_of(reference) {
        Data::None | Data::Null => false,
        Data::Boolean(value) => *value,
        Data::Number(value) => *value != 0.0,
        _ => true,
    }
}

/// Printable rendition of a value.
pub fn to_string(
    gc: &GarbageCollector,
    global: &GlobalData,
    reference: &WeakReference,
) -> String {
    data_to_string(gc, global, gc.data_id(reference))
}

fn data_to_string(
    gc: &GarbageCollector,
    global: &GlobalData,
    id: crate::memory::data::DataId,
) -> String {
    match gc.data(id) {
        Data::None => "none".to_string(),
        Data::Null => "null".to_string(),
        Data::Number(value) => number_to_string(*value),
        Data::Boolean(value) => value.to_string(),
        Data::Package(package) => format!("(package {})", global.package(*package).full_name()),
        Data::Function(_) => "(function)".to_string(),
        Data::Object(object) => match &object.payload {
            Payload::Str(text) => text.clone(),
            Payload::Regex(regex) => regex.source().to_string(),
            Payload::Array(elements) => {
                let pieces: Vec<String> = elements
                    .iter()
                    .map(|element| data_to_string(gc, global, gc.data_id(element)))
                    .collect();
                format!("[{}]", pieces.join(", "))
            }
            Payload::Hash(hash) => {
                let pieces: Vec<String> = hash
                    .entries()
                    .map(|(key, value)| {
                        format!(
                            "{} : {}",
                            data_to_string(gc, global, gc.data_id(key)),
                            data_to_string(gc, global, gc.data_id(value))
                        )
                    })
                    .collect();
                format!("{{{}}}", pieces.join(", "))
            }
            Payload::Iterator(_) => "(iterator)".to_string(),
            Payload::Library(_) => "(library)".to_string(),
            Payload::LibObject(_) => "(libobject)".to_string(),
            Payload::Plain => {
                let class = global.class(object.class);
                if object.is_class() {
                    format!("(class {})", class.full_name())
                } else {
                    format!("({})", class.full_name())
                }
            }
        },
    }
}

/// Number formatting: integral values print without a fractional part.
pub fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Type name used by `typeof` and diagnostics.
pub fn type_name(gc: &GarbageCollector, global: &GlobalData, reference: &WeakReference) -> String {
    match gc.data_of(reference) {
        Data::Object(object) => global.class(object.class).full_name().to_string(),
        other => other.format().name().to_string(),
    }
}
