//! Coercion of raw client values into typed argument values.

use std::sync::Arc;

use serde_json_bytes::Value;

use crate::context::Context;
use crate::execution::lazy::Lazy;
use crate::execution::lazy::LazyError;
use crate::execution::lazy::MaybeLazy;
use crate::execution::lazy::after_lazy;
use crate::input::ArgumentMap;
use crate::input::ArgumentValue;
use crate::input::CoercionError;
use crate::input::InputContainer;
use crate::schema::FieldType;
use crate::schema::InputObject;
use crate::schema::Schema;
use crate::schema::authorization::Prepare;

/// Coerce one raw value against a field type.
///
/// Scalars, enums, and custom scalars pass through uninterpreted. Named
/// input object types build containers. Lists coerce element-wise and wrap a
/// bare value as a single-element list. Null stays null at every level; the
/// validation pass is what rejects nulls in non-null positions.
pub(crate) fn coerce_value(
    ty: &FieldType,
    value: Value,
    context: &Context,
    schema: &Arc<Schema>,
) -> Result<MaybeLazy<ArgumentValue>, CoercionError> {
    match ty {
        FieldType::NonNull(inner) => coerce_value(inner, value, context, schema),
        FieldType::List(inner) => match value {
            Value::Null => Ok(MaybeLazy::Ready(ArgumentValue::Value(Value::Null))),
            Value::Array(entries) => {
                let mut coerced = Vec::with_capacity(entries.len());
                for entry in entries {
                    coerced.push(coerce_value(inner, entry, context, schema)?);
                }
                join_list(coerced)
            }
            // For coercion from single value to list
            other => join_list(vec![coerce_value(inner, other, context, schema)?]),
        },
        FieldType::Named(name) => match schema.input_object(name) {
            Some(input_object) => {
                let coerced = input_object.coerce_input(MaybeLazy::Ready(value), context, schema)?;
                Ok(container_value(coerced))
            }
            None => Ok(MaybeLazy::Ready(ArgumentValue::Value(value))),
        },
        _ => Ok(MaybeLazy::Ready(ArgumentValue::Value(value))),
    }
}

/// Collapse coerced elements into one list value. The list defers as a whole
/// when any element is deferred.
fn join_list(
    entries: Vec<MaybeLazy<ArgumentValue>>,
) -> Result<MaybeLazy<ArgumentValue>, CoercionError> {
    if entries.iter().any(|entry| !entry.is_ready()) {
        return Ok(MaybeLazy::Deferred(Lazy::new(move || {
            let mut values = Vec::with_capacity(entries.len());
            for entry in entries {
                values.push(entry.resolve()?);
            }
            Ok(ArgumentValue::List(values))
        })));
    }
    let mut values = Vec::with_capacity(entries.len());
    for entry in entries {
        values.push(entry.resolve()?);
    }
    Ok(MaybeLazy::Ready(ArgumentValue::List(values)))
}

fn container_value(coerced: MaybeLazy<Option<InputContainer>>) -> MaybeLazy<ArgumentValue> {
    match coerced {
        MaybeLazy::Ready(container) => MaybeLazy::Ready(wrap_container(container)),
        MaybeLazy::Deferred(lazy) => {
            MaybeLazy::Deferred(Lazy::new(move || Ok(wrap_container(lazy.get()?))))
        }
    }
}

fn wrap_container(container: Option<InputContainer>) -> ArgumentValue {
    match container {
        Some(container) => ArgumentValue::Object(container),
        None => ArgumentValue::Value(Value::Null),
    }
}

impl InputObject {
    /// Build a container from a raw inbound value.
    ///
    /// A null input never builds a container and never runs argument
    /// preparation or the type's validators. A deferred input defers the
    /// whole coercion until first resolution; failures inside the deferred
    /// chain surface as [`LazyError`]s at that point.
    pub fn coerce_input(
        self: &Arc<Self>,
        value: MaybeLazy<Value>,
        context: &Context,
        schema: &Arc<Schema>,
    ) -> Result<MaybeLazy<Option<InputContainer>>, CoercionError> {
        match value {
            MaybeLazy::Ready(Value::Null) => Ok(MaybeLazy::Ready(None)),
            MaybeLazy::Ready(raw) => self.coerce_present(raw, context, schema),
            MaybeLazy::Deferred(_) => {
                let input_object = Arc::clone(self);
                let deferred_context = context.clone();
                let deferred_schema = Arc::clone(schema);
                after_lazy(value, move |raw: Value| {
                    if raw.is_null() {
                        return Ok(MaybeLazy::Ready(None));
                    }
                    input_object
                        .coerce_present(raw, &deferred_context, &deferred_schema)
                        .map_err(LazyError::from)
                })
                .map_err(CoercionError::from)
            }
        }
    }

    /// Coerce a non-null raw value, argument by argument.
    ///
    /// Visible declared arguments take their value from the raw mapping, by
    /// declared name or keyword, falling back to the declared default.
    /// Arguments with no value and no default are left out entirely.
    fn coerce_present(
        self: &Arc<Self>,
        raw: Value,
        context: &Context,
        schema: &Arc<Schema>,
    ) -> Result<MaybeLazy<Option<InputContainer>>, CoercionError> {
        let Value::Object(raw_map) = raw else {
            return Err(CoercionError::NotAnObject(self.name().to_string()));
        };
        let mut coerced: Vec<(String, MaybeLazy<ArgumentValue>)> = Vec::new();
        for argument in self.visible_arguments(context) {
            let provided = raw_map
                .get(argument.name())
                .or_else(|| raw_map.get(argument.keyword()));
            let value = match provided.or(argument.default_value()) {
                Some(value) => value.clone(),
                None => continue,
            };
            let mut entry = coerce_value(argument.ty(), value, context, schema)?;
            if let Some(Prepare::Function(prepare)) = argument.prepare() {
                let prepare = Arc::clone(prepare);
                let prepare_context = context.clone();
                entry = after_lazy(entry, move |value| prepare(value, &prepare_context))?;
            }
            coerced.push((argument.keyword().to_owned(), entry));
        }
        if coerced.iter().any(|(_, entry)| !entry.is_ready()) {
            let input_object = Arc::clone(self);
            let deferred_context = context.clone();
            return Ok(MaybeLazy::Deferred(Lazy::new(move || {
                let mut arguments = ArgumentMap::with_capacity(coerced.len());
                for (keyword, entry) in coerced {
                    arguments.insert(keyword, entry.resolve()?);
                }
                let container =
                    InputContainer::new(input_object, arguments, raw_map, Some(deferred_context))
                        .prepare()
                        .map_err(LazyError::from)?;
                Ok(Some(container))
            })));
        }
        let mut arguments = ArgumentMap::with_capacity(coerced.len());
        for (keyword, entry) in coerced {
            arguments.insert(keyword, entry.resolve()?);
        }
        let container =
            InputContainer::new(Arc::clone(self), arguments, raw_map, Some(context.clone()))
                .prepare()?;
        Ok(MaybeLazy::Ready(Some(container)))
    }
}
