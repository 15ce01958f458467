//! Unslicers for the wrapped scalar opentypes: `none`, `boolean`,
//! `unicode`, `decimal`.

use crate::error::{StepResult, Violation};
use crate::value::{BananaDecimal, Value};

use super::Unslicer;

/// Expects zero children and produces `Value::None` on close.
#[derive(Debug)]
pub struct NoneUnslicer {
    path: String,
}

impl NoneUnslicer {
    /// Build a slicer for a `none` frame at `path`.
    #[must_use]
    pub fn new(path: String) -> Self {
        Self { path }
    }
}

impl Unslicer for NoneUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, _child: Value) -> StepResult<()> {
        Err(Violation::SchemaMismatch { path: self.path.clone(), reason: "none takes no body".to_string() }.into())
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        Ok(Value::None)
    }
}

/// Expects exactly one integer child (0 or 1) and produces
/// `Value::Bool` on close.
#[derive(Debug)]
pub struct BoolUnslicer {
    path: String,
    value: Option<bool>,
}

impl BoolUnslicer {
    /// Build a slicer for a `boolean` frame at `path`.
    #[must_use]
    pub fn new(path: String) -> Self {
        Self { path, value: None }
    }
}

impl Unslicer for BoolUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, child: Value) -> StepResult<()> {
        match child {
            Value::Int(0) => {
                self.value = Some(false);
                Ok(())
            },
            Value::Int(_) => {
                self.value = Some(true);
                Ok(())
            },
            _ => Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "boolean body must be an int".to_string(),
            }
            .into()),
        }
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        Ok(Value::Bool(self.value.unwrap_or(false)))
    }
}

/// Expects exactly one string child and produces `Value::Str` on
/// close.
#[derive(Debug)]
pub struct UnicodeUnslicer {
    path: String,
    value: Option<String>,
}

impl UnicodeUnslicer {
    /// Build a slicer for a `unicode` frame at `path`.
    #[must_use]
    pub fn new(path: String) -> Self {
        Self { path, value: None }
    }
}

impl Unslicer for UnicodeUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, child: Value) -> StepResult<()> {
        match child {
            Value::Str(s) => {
                self.value = Some(s);
                Ok(())
            },
            _ => Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "unicode body must be a string".to_string(),
            }
            .into()),
        }
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        Ok(Value::Str(self.value.clone().unwrap_or_default()))
    }
}

/// Expects exactly one string child (the decimal's canonical text) and
/// produces `Value::Decimal` on close.
#[derive(Debug)]
pub struct DecimalUnslicer {
    path: String,
    text: Option<String>,
}

impl DecimalUnslicer {
    /// Build a slicer for a `decimal` frame at `path`.
    #[must_use]
    pub fn new(path: String) -> Self {
        Self { path, text: None }
    }
}

impl Unslicer for DecimalUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, child: Value) -> StepResult<()> {
        match child {
            Value::Str(s) => {
                self.text = Some(s);
                Ok(())
            },
            _ => Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "decimal body must be a string".to_string(),
            }
            .into()),
        }
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        let text = self.text.clone().unwrap_or_default();
        BananaDecimal::parse(&text)
            .map(Value::Decimal)
            .map_err(|_| Violation::SchemaMismatch { path: self.path.clone(), reason: "invalid decimal literal".to_string() }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_unslicer_reads_zero_and_nonzero() {
        let mut u = BoolUnslicer::new("root".into());
        u.receive_child(Value::Int(0)).unwrap();
        assert_eq!(u.receive_close().unwrap(), Value::Bool(false));

        let mut u = BoolUnslicer::new("root".into());
        u.receive_child(Value::Int(1)).unwrap();
        assert_eq!(u.receive_close().unwrap(), Value::Bool(true));
    }

    #[test]
    fn decimal_unslicer_validates_on_close() {
        let mut u = DecimalUnslicer::new("root".into());
        u.receive_child(Value::Str("not-a-number".into())).unwrap();
        assert!(u.receive_close().is_err());
    }
}
