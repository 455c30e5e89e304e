//! Named, argument-carrying record callbacks shared by batch inserts and recordsets.

use std::fmt;

use crate::database::{record::Record, value::Value};

type ValidatorFn = dyn Fn(&Record, &[Value]) -> bool;
type TransformerFn = dyn Fn(Record, &[Value]) -> Record;

/// Predicate deciding whether a record is accepted.
///
/// The name identifies the validator in error messages.
pub struct Validator {
    name: String,
    func: Box<ValidatorFn>,
    args: Vec<Value>,
}

impl Validator {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Record) -> bool + 'static,
    {
        Self::with_args(name, move |record, _| func(record), Vec::new())
    }

    /// A validator receiving `args` as bound arguments on every call.
    pub fn with_args<F>(name: impl Into<String>, func: F, args: Vec<Value>) -> Self
    where
        F: Fn(&Record, &[Value]) -> bool + 'static,
    {
        Validator { name: name.into(), func: Box::new(func), args }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accepts(&self, record: &Record) -> bool {
        (self.func)(record, &self.args)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").field("name", &self.name).field("args", &self.args).finish()
    }
}

/// Maps a record to a new record.
pub struct Transformer {
    name: String,
    func: Box<TransformerFn>,
    args: Vec<Value>,
}

impl Transformer {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Record) -> Record + 'static,
    {
        Self::with_args(name, move |record, _| func(record), Vec::new())
    }

    pub fn with_args<F>(name: impl Into<String>, func: F, args: Vec<Value>) -> Self
    where
        F: Fn(Record, &[Value]) -> Record + 'static,
    {
        Transformer { name: name.into(), func: Box::new(func), args }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, record: Record) -> Record {
        (self.func)(record, &self.args)
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer").field("name", &self.name).field("args", &self.args).finish()
    }
}
