use crate::codec;
use crate::context::BridgeContext;
use crate::reflect::{FieldFlags, MemberDescriptor, ObjectInstance, TypeHandle};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// Reads every visible field of `target` into a JSON document. Walks the
/// type chain most-derived first, so a shadowing field wins over its base
/// declaration; a field that fails to encode is recorded as null and
/// logged instead of aborting the rest of the snapshot.
pub fn snapshot(target: &ObjectInstance, ctx: &BridgeContext) -> Map<String, serde_json::Value> {
    let mut document = Map::new();
    for handle in ctx.registry.serialization_chain(target.ty()) {
        for member in &ctx.registry.descriptor(handle).members {
            if !member.snapshot_visible() || document.contains_key(&member.name) {
                continue;
            }
            let value = target.get(&member.name).cloned().unwrap_or(Value::Null);
            match codec::encode(&value, member.ty, ctx) {
                Ok(encoded) => {
                    document.insert(member.name.clone(), encoded);
                }
                Err(err) => {
                    eprintln!("[snapshot] field '{}': {err}", member.name);
                    document.insert(member.name.clone(), serde_json::Value::Null);
                }
            }
        }
    }
    document
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Result of one `apply` call. `message` summarizes the first failure for
/// humans; `errors` carries the full per-field list for callers that need
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl ApplyReport {
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self { success: false, message, errors: Vec::new() }
    }
}

/// Pre-images of the fields an `apply` call touched. Reverting is an
/// ordinary inverse apply, independent of any host undo machinery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checkpoint {
    entries: Vec<(String, Option<Value>)>,
}

impl Checkpoint {
    fn record(&mut self, name: &str, value: Option<Value>) {
        if self.entries.iter().any(|(existing, _)| existing == name) {
            return;
        }
        self.entries.push((name.to_string(), value));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn revert(&self, target: &mut ObjectInstance) {
        for (name, value) in &self.entries {
            match value {
                Some(value) => target.set(name.clone(), value.clone()),
                None => {
                    target.remove(name);
                }
            }
        }
    }
}

enum Pending<'doc> {
    Write { key: &'doc str, json: &'doc serde_json::Value, member: MemberDescriptor },
    Reject { key: &'doc str, message: String },
}

/// Applies a partial JSON document onto `target`. Keys are processed in
/// the document's insertion order; a bad key never stops the rest of the
/// batch. The returned checkpoint holds the pre-images of every matched
/// key, captured before the first mutation.
pub fn apply(
    target: &mut ObjectInstance,
    document: &Map<String, serde_json::Value>,
    ctx: &BridgeContext,
) -> (ApplyReport, Checkpoint) {
    let mut pending = Vec::with_capacity(document.len());
    let mut checkpoint = Checkpoint::default();
    for (key, json) in document {
        match find_member(target.ty(), key, ctx) {
            Ok(member) => {
                checkpoint.record(key, target.get(key).cloned());
                pending.push(Pending::Write { key: key.as_str(), json, member });
            }
            Err(message) => pending.push(Pending::Reject { key: key.as_str(), message }),
        }
    }

    let mut errors = Vec::new();
    let mut updated = 0usize;
    for entry in pending {
        match entry {
            Pending::Reject { key, message } => {
                errors.push(FieldError { field: key.to_string(), message })
            }
            Pending::Write { key, json, member } => match codec::decode(json, member.ty, ctx) {
                Ok(Some(value)) => {
                    target.set(key.to_string(), value);
                    updated += 1;
                }
                // Null into a non-nullable value type leaves the field as
                // it was.
                Ok(None) => {}
                Err(err) => {
                    errors.push(FieldError { field: key.to_string(), message: err.to_string() })
                }
            },
        }
    }

    let message = match errors.first() {
        Some(first) => format!("field '{}': {}", first.field, first.message),
        None => format!("updated {updated} field(s)"),
    };
    let report = ApplyReport { success: errors.is_empty(), message, errors };
    (report, checkpoint)
}

/// Member lookup for a document key: a matching field anywhere in the
/// chain wins, then a matching writable property. A read-only property or
/// an unknown name is a per-key failure.
fn find_member(
    ty: TypeHandle,
    key: &str,
    ctx: &BridgeContext,
) -> Result<MemberDescriptor, String> {
    let chain = ctx.registry.serialization_chain(ty);
    for handle in &chain {
        for member in &ctx.registry.descriptor(*handle).members {
            if member.is_field() && !member.flags.contains(FieldFlags::SYNTHESIZED) && member.name == key
            {
                return Ok(member.clone());
            }
        }
    }
    for handle in &chain {
        for member in &ctx.registry.descriptor(*handle).members {
            if member.flags.contains(FieldFlags::PROPERTY) && member.name == key {
                if member.flags.contains(FieldFlags::READ_ONLY) {
                    return Err(format!("property '{key}' is read-only"));
                }
                return Ok(member.clone());
            }
        }
    }
    Err(format!("no field or property named '{key}'"))
}
