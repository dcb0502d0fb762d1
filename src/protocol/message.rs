//! Request and response field sets

use crate::ndr::WireValue;

use super::catalog::RETURN_FIELD;
use super::Operation;

/// Ordered request field values supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    fields: Vec<(String, WireValue)>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field; order must follow the operation's request shape
    pub fn field(mut self, name: impl Into<String>, value: impl Into<WireValue>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn fields(&self) -> &[(String, WireValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&WireValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

/// Decoded response fields, in declared order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseValues {
    operation: Operation,
    fields: Vec<(&'static str, WireValue)>,
}

impl ResponseValues {
    pub(crate) fn new(operation: Operation, fields: Vec<(&'static str, WireValue)>) -> Self {
        Self { operation, fields }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&WireValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// Remove a field's value, leaving the rest in place
    pub fn take(&mut self, name: &str) -> Option<WireValue> {
        let index = self.fields.iter().position(|(field, _)| *field == name)?;
        Some(self.fields.remove(index).1)
    }

    /// The remote status code; `None` for operations without one
    pub fn return_code(&self) -> Option<u32> {
        self.get(RETURN_FIELD).and_then(WireValue::as_u32)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &WireValue)> {
        self.fields.iter().map(|(name, value)| (*name, value))
    }

    pub fn into_values(self) -> Vec<WireValue> {
        self.fields.into_iter().map(|(_, value)| value).collect()
    }
}
