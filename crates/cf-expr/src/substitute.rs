//! Structural substitution.

use std::collections::HashMap;

use cf_core::ExprId;

use crate::arena::ExprArena;
use crate::error::{ExprError, ExprResult};
use crate::node::{ExprKind, SubstitutionRule};

impl ExprArena {
    /// Rebuild `root` with every occurrence of a key of `map` replaced by its
    /// value.
    ///
    /// Untouched subtrees keep their ids. Rebuilt nodes go through the normal
    /// factory path, so scope checks and folding apply to the result.
    pub fn substitute(&mut self, root: ExprId, map: &HashMap<ExprId, ExprId>) -> ExprResult<ExprId> {
        let mut memo = HashMap::new();
        self.substitute_inner(root, map, &mut memo)
    }

    fn substitute_inner(
        &mut self,
        id: ExprId,
        map: &HashMap<ExprId, ExprId>,
        memo: &mut HashMap<ExprId, ExprId>,
    ) -> ExprResult<ExprId> {
        if let Some(&to) = map.get(&id) {
            return Ok(to);
        }
        if let Some(&done) = memo.get(&id) {
            return Ok(done);
        }
        let kind = self.node(id)?.kind.clone();
        if kind.is_leaf() {
            return Ok(id);
        }
        if let ExprKind::Custom(c) = &kind {
            if c.substitution == SubstitutionRule::Unsupported {
                return Err(ExprError::UnsupportedSubstitution {
                    kind: c.type_name.clone(),
                });
            }
        }

        let deps = kind.dependencies();
        let mut new_deps = Vec::with_capacity(deps.len());
        for dep in &deps {
            new_deps.push(self.substitute_inner(*dep, map, memo)?);
        }

        let result = if new_deps == deps {
            id
        } else {
            let rebuilt = kind
                .with_dependencies(&new_deps)
                .ok_or_else(|| ExprError::UnsupportedSubstitution {
                    kind: kind.type_name().to_string(),
                })?;
            self.build(rebuilt)?
        };
        memo.insert(id, result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use cf_core::{DataKind, Value};

    use super::*;
    use crate::node::CustomNode;
    use crate::scope::{ContextId, Scope};

    #[test]
    fn replaces_shared_subtree_once() {
        let mut arena = ExprArena::default();
        let x = arena.sensor("x", DataKind::Double).unwrap();
        let y = arena.sensor("y", DataKind::Double).unwrap();
        let sq = arena.multiply(x, x).unwrap();
        let root = arena.add(sq, x).unwrap();
        let out = arena.substitute(root, &HashMap::from([(x, y)])).unwrap();
        let y2 = arena.multiply(y, y).unwrap();
        assert_eq!(out, arena.add(y2, y).unwrap());
    }

    #[test]
    fn empty_map_is_identity() {
        let mut arena = ExprArena::default();
        let x = arena.sensor("x", DataKind::Double).unwrap();
        let s = arena.sin(x).unwrap();
        assert_eq!(arena.substitute(s, &HashMap::new()).unwrap(), s);
    }

    #[test]
    fn substitution_folds_constants() {
        let mut arena = ExprArena::default();
        let x = arena.sensor("x", DataKind::Double).unwrap();
        let one = arena.double(1.0).unwrap();
        let root = arena.add(x, one).unwrap();
        let three = arena.double(3.0).unwrap();
        let out = arena.substitute(root, &HashMap::from([(x, three)])).unwrap();
        assert_eq!(arena.literal(out), Some(&Value::Double(4.0)));
    }

    #[test]
    fn scope_conflicts_surface() {
        let mut arena = ExprArena::default();
        let a = arena.input("a", DataKind::Double, Scope::Context(ContextId(1))).unwrap();
        let b = arena.input("b", DataKind::Double, Scope::Context(ContextId(2))).unwrap();
        let x = arena.sensor("x", DataKind::Double).unwrap();
        let root = arena.add(a, x).unwrap();
        let err = arena.substitute(root, &HashMap::from([(x, b)])).unwrap_err();
        assert!(matches!(err, ExprError::ScopeMismatch { .. }));
    }

    #[test]
    fn opaque_custom_node_rejects_substitution() {
        let mut arena = ExprArena::default();
        let x = arena.sensor("x", DataKind::Double).unwrap();
        let opaque = arena
            .custom(
                CustomNode::new("opaque", DataKind::Double)
                    .with_dependency(x)
                    .with_substitution(SubstitutionRule::Unsupported),
            )
            .unwrap();
        let y = arena.sensor("y", DataKind::Double).unwrap();
        let err = arena.substitute(opaque, &HashMap::from([(x, y)])).unwrap_err();
        assert_eq!(
            err,
            ExprError::UnsupportedSubstitution {
                kind: "opaque".into()
            }
        );
    }
}
