//! Deep merge of configuration trees

use std::ops::Add;

use tracing::{debug, instrument};

use crate::domain::arena::NodeId;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::tree::Configuration;
use crate::domain::value::{Mapping, Value};

impl Configuration {
    /// Merge `other` over `self` into a new tree.
    ///
    /// Mappings merge key by key; any other incoming value replaces what was
    /// there. A mapping arriving on top of a non-mapping is a conflict. The
    /// result takes root pwd and context from `self`.
    #[instrument(level = "debug", skip_all)]
    pub fn merge(&self, other: &Configuration) -> DomainResult<Configuration> {
        let base = self.to_mapping(self.root())?;
        let overrides = other.to_mapping(other.root())?;

        let root = self.root();
        let mut merged = Configuration::new(
            Mapping::new(),
            (*self.context(root)?).clone(),
            self.pwd(root)?.to_path_buf(),
        );
        let target = merged.root();
        merged.merge_mapping(target, base)?;
        merged.merge_mapping(target, overrides)?;
        debug!(keys = merged.len(target)?, "merged configuration");
        Ok(merged)
    }

    fn merge_mapping(&mut self, target: NodeId, incoming: Mapping) -> DomainResult<()> {
        for (key, value) in incoming {
            match value {
                Value::Map(nested) if self.contains(target, &key)? => {
                    let existing = match self.raw(target, &key)? {
                        Value::Node(existing) => *existing,
                        _ => return Err(DomainError::MergeConflict { key }),
                    };
                    self.merge_mapping(existing, nested)?;
                }
                other => self.set(target, &key, other)?,
            }
        }
        Ok(())
    }
}

impl Add for &Configuration {
    type Output = DomainResult<Configuration>;

    fn add(self, other: &Configuration) -> Self::Output {
        self.merge(other)
    }
}
