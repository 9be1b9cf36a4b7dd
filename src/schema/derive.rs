use tracing::trace;

use crate::table::{ColumnKind, Value};

/// For a column's cells:
///  - Ignore empty cells
///  - On the first non-empty cell, remember its kind
///  - On a later cell of a different kind, stop and mark the column `Raw`
///  - If no non-empty cell exists, default to `Text`
pub fn infer_kind(values: &[Value]) -> ColumnKind {
    let mut first: Option<ColumnKind> = None;

    for v in values {
        let kind = match v {
            Value::Empty => continue,
            Value::Number(_) => ColumnKind::Number,
            Value::DateTime(_) => ColumnKind::DateTime,
            Value::Text(_) | Value::Bool(_) => ColumnKind::Text,
        };
        match first {
            None => first = Some(kind),
            Some(prev) if prev != kind => {
                trace!("infer_kind: conflict {:?} vs {:?}", prev, kind);
                return ColumnKind::Raw;
            }
            _ => {}
        }
    }

    first.unwrap_or(ColumnKind::Text)
}
