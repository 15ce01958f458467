//! Unslicers for the two in-band vocabulary-negotiation frames.

use crate::error::{BananaError, StepResult, Violation};
use crate::value::Value;

use super::Unslicer;

/// Unslicer for an incoming `set-vocab` frame: collects the full
/// replacement table, applying it only at `receive_close` so the frame
/// body itself is still decoded against the table it's replacing.
#[derive(Debug)]
pub struct ReplaceVocabUnslicer {
    path: String,
    entries: std::collections::HashMap<u64, Vec<u8>>,
    pending_index: Option<u64>,
}

impl ReplaceVocabUnslicer {
    /// Build an unslicer for a `set-vocab` frame at `path`.
    #[must_use]
    pub fn new(path: String) -> Self {
        Self { path, entries: std::collections::HashMap::new(), pending_index: None }
    }

    /// The replacement table once the frame has closed. Call only
    /// after `receive_close` returned successfully.
    #[must_use]
    pub fn into_table(self) -> std::collections::HashMap<u64, Vec<u8>> {
        self.entries
    }
}

impl Unslicer for ReplaceVocabUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, child: Value) -> StepResult<()> {
        match self.pending_index.take() {
            None => match child {
                Value::Int(n) if n >= 0 => {
                    self.pending_index = Some(n as u64);
                    Ok(())
                },
                _ => Err(Violation::SchemaMismatch {
                    path: self.path.clone(),
                    reason: "set-vocab index must be a non-negative int".to_string(),
                }
                .into()),
            },
            Some(index) => match child {
                Value::Bytes(word) => {
                    if self.entries.insert(index, word).is_some() {
                        return Err(BananaError::DuplicateDictKey { path: self.path.clone() }.into());
                    }
                    Ok(())
                },
                _ => Err(Violation::SchemaMismatch {
                    path: self.path.clone(),
                    reason: "set-vocab word must be a byte string".to_string(),
                }
                .into()),
            },
        }
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        if self.pending_index.is_some() {
            return Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "set-vocab closed with a dangling index".to_string(),
            }
            .into());
        }
        Ok(Value::None)
    }
}

/// Unslicer for an incoming `add-vocab` frame: a single index/word
/// pair appended to the current table.
#[derive(Debug)]
pub struct AddVocabUnslicer {
    path: String,
    index: Option<u64>,
    word: Option<Vec<u8>>,
}

impl AddVocabUnslicer {
    /// Build an unslicer for an `add-vocab` frame at `path`.
    #[must_use]
    pub fn new(path: String) -> Self {
        Self { path, index: None, word: None }
    }

    /// The decoded `(index, word)` pair once the frame has closed.
    #[must_use]
    pub fn into_entry(self) -> Option<(u64, Vec<u8>)> {
        Some((self.index?, self.word?))
    }
}

impl Unslicer for AddVocabUnslicer {
    fn path(&self) -> &str {
        &self.path
    }

    fn receive_child(&mut self, child: Value) -> StepResult<()> {
        match (self.index, &self.word) {
            (None, _) => match child {
                Value::Int(n) if n >= 0 => {
                    self.index = Some(n as u64);
                    Ok(())
                },
                _ => Err(Violation::SchemaMismatch {
                    path: self.path.clone(),
                    reason: "add-vocab index must be a non-negative int".to_string(),
                }
                .into()),
            },
            (Some(_), None) => match child {
                Value::Bytes(word) => {
                    self.word = Some(word);
                    Ok(())
                },
                _ => Err(Violation::SchemaMismatch {
                    path: self.path.clone(),
                    reason: "add-vocab word must be a byte string".to_string(),
                }
                .into()),
            },
            (Some(_), Some(_)) => Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "add-vocab takes exactly one index and one word".to_string(),
            }
            .into()),
        }
    }

    fn receive_close(&mut self) -> StepResult<Value> {
        if self.index.is_none() || self.word.is_none() {
            return Err(Violation::SchemaMismatch {
                path: self.path.clone(),
                reason: "add-vocab closed before both index and word arrived".to_string(),
            }
            .into());
        }
        Ok(Value::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_vocab_collects_index_and_word() {
        let mut u = AddVocabUnslicer::new("root".into());
        u.receive_child(Value::Int(27)).unwrap();
        u.receive_child(Value::Bytes(b"widget".to_vec())).unwrap();
        u.receive_close().unwrap();
        assert_eq!(u.into_entry(), Some((27, b"widget".to_vec())));
    }

    #[test]
    fn replace_vocab_rejects_duplicate_index() {
        let mut u = ReplaceVocabUnslicer::new("root".into());
        u.receive_child(Value::Int(0)).unwrap();
        u.receive_child(Value::Bytes(b"list".to_vec())).unwrap();
        u.receive_child(Value::Int(0)).unwrap();
        assert!(u.receive_child(Value::Bytes(b"tuple".to_vec())).is_err());
    }
}
