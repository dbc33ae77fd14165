//! Binding host entities to the script extension attached to them.

use serde::{Deserialize, Serialize};

use crate::evaluator::{EvaluatorError, Value};
use crate::solution::Solution;

/// The script attached to a host entity: a package path plus the extension
/// identifier inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptRef {
    pub package: String,
    pub ident: String,
}

impl ScriptRef {
    pub fn new(package: impl Into<String>, ident: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ident: ident.into(),
        }
    }

    /// The script override of `method` for `this`, if any.
    pub fn bind(&self, solution: &Solution, this: &Value, method: &str) -> Option<Value> {
        solution.bind_method(this, &self.package, &self.ident, method)
    }

    /// Call the override of `method`. `None` means the host runs its own
    /// behaviour.
    pub fn invoke(
        &self,
        solution: &Solution,
        this: &Value,
        method: &str,
        args: &[Value],
    ) -> Option<Result<Value, EvaluatorError>> {
        let bound = self.bind(solution, this, method)?;
        Some(bound.call(args))
    }
}
