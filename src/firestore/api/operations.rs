use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::{FieldPath, IntoFieldPath};
use crate::firestore::value::{FieldValue, FirestoreValue, MapValue, ValueKind};

/// Options that configure the behaviour of `set` writes.
#[derive(Clone, Debug, Default)]
pub struct SetOptions {
    /// When `true`, the data is merged into the existing document instead of
    /// replacing it.
    pub merge: bool,
    /// Explicit field mask that should be merged. When set, this takes
    /// precedence over the `merge` flag.
    pub merge_fields: Option<Vec<FieldPath>>,
}

impl SetOptions {
    /// Builds set options that merge every field present in the provided data.
    pub fn merge_all() -> Self {
        Self {
            merge: true,
            merge_fields: None,
        }
    }

    /// Builds set options that merge only the specified field paths.
    pub fn merge_fields<I, F>(fields: I) -> FirestoreResult<Self>
    where
        I: IntoIterator<Item = F>,
        F: IntoFieldPath,
    {
        let mut unique = Vec::new();
        let mut seen = HashSet::new();
        for field in fields {
            let field = field.into_field_path()?;
            if seen.insert(field.canonical_string()) {
                unique.push(field);
            }
        }
        if unique.is_empty() {
            return Err(invalid_argument(
                "merge_fields requires at least one field path",
            ));
        }
        Ok(Self {
            merge: false,
            merge_fields: Some(unique),
        })
    }

    /// Indicates whether the write should behave like a merge.
    pub fn is_merge(&self) -> bool {
        self.merge || self.merge_fields.is_some()
    }

    /// Returns the explicit field mask, if any.
    pub fn field_mask(&self) -> Option<&[FieldPath]> {
        self.merge_fields.as_deref()
    }
}

/// Pre-encoded data for `set` style writes.
#[derive(Clone, Debug)]
pub struct EncodedSetData {
    pub map: MapValue,
    /// `None` replaces the whole document.
    pub mask: Option<Vec<FieldPath>>,
    pub transforms: Vec<FieldTransform>,
}

/// Pre-encoded data for `update` style writes.
#[derive(Clone, Debug)]
pub struct EncodedUpdateData {
    pub map: MapValue,
    pub field_paths: Vec<FieldPath>,
    pub transforms: Vec<FieldTransform>,
}

/// Describes a single field transform applied during a write.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldTransform {
    field_path: FieldPath,
    operation: TransformOperation,
}

impl FieldTransform {
    pub fn new(field_path: FieldPath, operation: TransformOperation) -> Self {
        Self {
            field_path,
            operation,
        }
    }

    pub fn field_path(&self) -> &FieldPath {
        &self.field_path
    }

    pub fn operation(&self) -> &TransformOperation {
        &self.operation
    }
}

/// Write-time sentinel operations supported by Firestore.
#[derive(Clone, Debug, PartialEq)]
pub enum TransformOperation {
    /// Only ever contributes to the update mask; never sent as a transform.
    Delete,
    ServerTimestamp,
    NumericIncrement(FirestoreValue),
    ArrayUnion(Vec<FirestoreValue>),
    ArrayRemove(Vec<FirestoreValue>),
}

/// Splits a record into its plain projection and the field transforms
/// embedded in it.
///
/// Every sentinel is removed from the returned map and reported with its
/// dotted path. A nested map that only held sentinels disappears from the
/// projection; a map that was empty to begin with is kept.
pub fn extract_transforms(map: &MapValue) -> FirestoreResult<(MapValue, Vec<FieldTransform>)> {
    let mut transforms = Vec::new();
    let plain = extract_from_map(map, &[], &mut transforms)?;
    ensure_unique_paths(&transforms)?;
    if !transforms.is_empty() {
        debug!("Extracted {} field transform(s)", transforms.len());
    }
    Ok((plain, transforms))
}

/// Encodes data for a `set` write.
///
/// Without merge options the document is replaced and `FieldValue::Delete`
/// is rejected. With `merge` the mask covers every written leaf plus deleted
/// fields; with `merge_fields` only the listed fields (and transforms beneath
/// them) are kept.
pub fn encode_set_data(data: &MapValue, options: &SetOptions) -> FirestoreResult<EncodedSetData> {
    let (plain, extracted) = extract_transforms(data)?;
    let (deletes, transforms) = split_deletes(extracted);

    if !options.is_merge() {
        if let Some(path) = deletes.first() {
            return Err(invalid_argument(format!(
                "FieldValue::Delete cannot be used with a non-merge set (field '{path}')"
            )));
        }
        return Ok(EncodedSetData {
            map: plain,
            mask: None,
            transforms,
        });
    }

    if let Some(fields) = options.field_mask() {
        return encode_merge_fields(plain, deletes, transforms, fields);
    }

    let mut mask = collect_leaf_paths(&plain)?;
    mask.extend(deletes);
    if mask.is_empty() && transforms.is_empty() {
        return Err(invalid_argument(
            "merge set requires the data to contain at least one field",
        ));
    }
    Ok(EncodedSetData {
        map: plain,
        mask: Some(mask),
        transforms,
    })
}

fn encode_merge_fields(
    plain: MapValue,
    deletes: Vec<FieldPath>,
    transforms: Vec<FieldTransform>,
    fields: &[FieldPath],
) -> FirestoreResult<EncodedSetData> {
    let covered = |path: &FieldPath| fields.iter().any(|field| field.is_prefix_of(path));

    let mut map = MapValue::default();
    let mut mask = Vec::new();
    for field in fields {
        if let Some(value) = plain.get_path(field) {
            set_value_at_field_path(&mut map, field, value.clone());
            mask.push(field.clone());
            continue;
        }
        let transformed = transforms
            .iter()
            .map(FieldTransform::field_path)
            .any(|path| field.is_prefix_of(path));
        let deleted = deletes.iter().any(|path| field.is_prefix_of(path));
        if !transformed && !deleted {
            return Err(invalid_argument(format!(
                "Field '{field}' is specified in merge_fields but missing from the provided data"
            )));
        }
    }

    // Deletes only take effect through the mask.
    let covered_deletes: Vec<FieldPath> = deletes
        .into_iter()
        .filter(|path| covered(path) && !mask.contains(path))
        .collect();
    mask.extend(covered_deletes);

    Ok(EncodedSetData {
        map,
        mask: Some(mask),
        transforms: transforms
            .into_iter()
            .filter(|transform| covered(transform.field_path()))
            .collect(),
    })
}

/// Encodes data for an `update` write.
///
/// Top-level keys are dotted field paths (`"address.city"`); each one
/// replaces the value at that path and lands in the update mask.
/// `FieldValue::Delete` is only accepted as a top-level value.
pub fn encode_update_data(data: &MapValue) -> FirestoreResult<EncodedUpdateData> {
    let mut map = MapValue::default();
    let mut field_paths: Vec<FieldPath> = Vec::new();
    let mut transforms = Vec::new();

    for (key, value) in data.fields() {
        let path = FieldPath::from_dot_separated(key)?;
        if let Some(existing) = field_paths
            .iter()
            .find(|other| other.is_prefix_of(&path) || path.is_prefix_of(other))
        {
            return Err(invalid_argument(format!(
                "Update fields '{existing}' and '{path}' overlap"
            )));
        }

        match value.kind() {
            ValueKind::Sentinel(FieldValue::Delete) => field_paths.push(path),
            ValueKind::Sentinel(sentinel) => {
                transforms.push(transform_from_sentinel(path, sentinel)?);
            }
            ValueKind::Map(nested) if !nested.is_empty() => {
                let plain = extract_from_map(nested, path.segments(), &mut transforms)?;
                if !plain.is_empty() {
                    set_value_at_field_path(&mut map, &path, plain.into());
                    field_paths.push(path);
                }
            }
            _ => {
                assert_no_sentinel_in_value(value, &path)?;
                set_value_at_field_path(&mut map, &path, value.clone());
                field_paths.push(path);
            }
        }
    }

    if let Some(nested_delete) = transforms
        .iter()
        .find(|t| matches!(t.operation(), TransformOperation::Delete))
    {
        return Err(invalid_argument(format!(
            "FieldValue::Delete can only appear at the top level of update data (field '{}')",
            nested_delete.field_path()
        )));
    }
    ensure_unique_paths(&transforms)?;
    if field_paths.is_empty() && transforms.is_empty() {
        return Err(invalid_argument(
            "update requires at least one field/value pair",
        ));
    }
    Ok(EncodedUpdateData {
        map,
        field_paths,
        transforms,
    })
}

fn extract_from_map(
    data: &MapValue,
    parent_segments: &[String],
    transforms: &mut Vec<FieldTransform>,
) -> FirestoreResult<MapValue> {
    let mut cleaned = BTreeMap::new();
    for (key, value) in data.fields() {
        let mut segments = parent_segments.to_vec();
        segments.push(key.clone());
        match value.kind() {
            ValueKind::Sentinel(sentinel) => {
                let field_path = FieldPath::new(segments)?;
                transforms.push(transform_from_sentinel(field_path, sentinel)?);
            }
            ValueKind::Map(map) if !map.is_empty() => {
                let nested = extract_from_map(map, &segments, transforms)?;
                if !nested.is_empty() {
                    cleaned.insert(key.clone(), nested.into());
                }
            }
            ValueKind::Array(_) => {
                assert_no_sentinel_in_value(value, &FieldPath::new(segments)?)?;
                cleaned.insert(key.clone(), value.clone());
            }
            _ => {
                cleaned.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(MapValue::new(cleaned))
}

fn transform_from_sentinel(
    field_path: FieldPath,
    sentinel: &FieldValue,
) -> FirestoreResult<FieldTransform> {
    let operation = match sentinel {
        FieldValue::Delete => TransformOperation::Delete,
        FieldValue::ServerTimestamp => TransformOperation::ServerTimestamp,
        FieldValue::Increment(operand) => match operand.kind() {
            ValueKind::Integer(_) | ValueKind::Double(_) => {
                TransformOperation::NumericIncrement(operand.as_ref().clone())
            }
            other => {
                return Err(invalid_argument(format!(
                    "FieldValue::increment requires a numeric operand, got {} (field '{field_path}')",
                    other.type_name()
                )))
            }
        },
        FieldValue::ArrayUnion(elements) => {
            for element in elements {
                assert_no_sentinel_in_value(element, &field_path)?;
            }
            TransformOperation::ArrayUnion(elements.clone())
        }
        FieldValue::ArrayRemove(elements) => {
            for element in elements {
                assert_no_sentinel_in_value(element, &field_path)?;
            }
            TransformOperation::ArrayRemove(elements.clone())
        }
    };
    Ok(FieldTransform::new(field_path, operation))
}

fn assert_no_sentinel_in_value(value: &FirestoreValue, context: &FieldPath) -> FirestoreResult<()> {
    if value.contains_sentinel() {
        return Err(invalid_argument(format!(
            "Invalid data. Field transforms cannot be used inside arrays (field '{context}')"
        )));
    }
    Ok(())
}

fn ensure_unique_paths(transforms: &[FieldTransform]) -> FirestoreResult<()> {
    let mut seen = HashSet::new();
    for transform in transforms {
        let path = transform.field_path().canonical_string();
        if !seen.insert(path.clone()) {
            return Err(invalid_argument(format!(
                "Field '{path}' has more than one transform"
            )));
        }
    }
    Ok(())
}

fn split_deletes(transforms: Vec<FieldTransform>) -> (Vec<FieldPath>, Vec<FieldTransform>) {
    let (deletes, rest): (Vec<_>, Vec<_>) = transforms
        .into_iter()
        .partition(|t| matches!(t.operation(), TransformOperation::Delete));
    (deletes.into_iter().map(|t| t.field_path).collect(), rest)
}

/// Paths of every leaf in `data`; empty maps count as leaves.
fn collect_leaf_paths(data: &MapValue) -> FirestoreResult<Vec<FieldPath>> {
    let mut paths = Vec::new();
    for (key, value) in data.fields() {
        collect_paths_from_value(&mut paths, vec![key.clone()], value)?;
    }
    Ok(paths)
}

fn collect_paths_from_value(
    acc: &mut Vec<FieldPath>,
    segments: Vec<String>,
    value: &FirestoreValue,
) -> FirestoreResult<()> {
    match value.kind() {
        ValueKind::Map(map) if !map.is_empty() => {
            for (child_key, child_value) in map.fields() {
                let mut child_segments = segments.clone();
                child_segments.push(child_key.clone());
                collect_paths_from_value(acc, child_segments, child_value)?;
            }
            Ok(())
        }
        _ => {
            acc.push(FieldPath::new(segments)?);
            Ok(())
        }
    }
}

pub(crate) fn set_value_at_field_path(map: &mut MapValue, path: &FieldPath, value: FirestoreValue) {
    let mut fields = std::mem::take(map).into_fields();
    set_value_at_segments(&mut fields, path.segments(), value);
    *map = MapValue::new(fields);
}

fn set_value_at_segments(
    fields: &mut BTreeMap<String, FirestoreValue>,
    segments: &[String],
    value: FirestoreValue,
) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        fields.insert(first.clone(), value);
        return;
    }

    let entry = fields
        .entry(first.clone())
        .or_insert_with(|| FirestoreValue::from_map(BTreeMap::new()));

    let mut child_fields = match entry.kind() {
        ValueKind::Map(map) => map.fields().clone(),
        _ => BTreeMap::new(),
    };

    set_value_at_segments(&mut child_fields, rest, value);
    *entry = FirestoreValue::from_map(child_fields);
}
