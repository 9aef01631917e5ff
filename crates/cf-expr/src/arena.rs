//! Hash-consed expression storage.

use std::collections::HashMap;

use cf_core::{ClockSignal, DataKind, ExprId, Value};
use tracing::trace;

use crate::config::ExprConfig;
use crate::error::{ExprError, ExprResult};
use crate::fold::{self, Folded};
use crate::host::{DeviceId, DeviceService};
use crate::node::{CustomNode, ExprKind, ExprNode, PlaceholderId};
use crate::persist::PersistEntry;
use crate::scope::Scope;
use crate::typing;

/// Arena of immutable, structurally interned expression nodes.
///
/// Building requires `&mut self`; every query takes `&self`, so any number of
/// compile sessions may read one arena at the same time.
#[derive(Debug, Clone, Default)]
pub struct ExprArena {
    config: ExprConfig,
    nodes: Vec<ExprNode>,
    index: HashMap<ExprNode, ExprId>,
    next_placeholder: u32,
    pub(crate) persisted: Vec<PersistEntry>,
}

impl ExprArena {
    pub fn new(config: ExprConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> ExprConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: ExprId) -> Option<&ExprNode> {
        self.nodes.get(id.slot())
    }

    pub fn node(&self, id: ExprId) -> ExprResult<&ExprNode> {
        self.get(id).ok_or(ExprError::UnknownExpr { id })
    }

    pub fn data_kind(&self, id: ExprId) -> ExprResult<DataKind> {
        Ok(self.node(id)?.data)
    }

    pub fn scope(&self, id: ExprId) -> ExprResult<Scope> {
        Ok(self.node(id)?.scope)
    }

    /// True iff the node's value never changes once computed.
    pub fn is_constant(&self, id: ExprId) -> bool {
        self.get(id).is_some_and(|n| n.constant)
    }

    /// Literal value of a constant node.
    pub fn literal(&self, id: ExprId) -> Option<&Value> {
        self.get(id).and_then(ExprNode::literal)
    }

    /// Ordered dependencies of a node (empty for leaves and unknown ids).
    pub fn dependencies(&self, id: ExprId) -> Vec<ExprId> {
        self.get(id).map(ExprNode::dependencies).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExprId, &ExprNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (ExprId::from_index(i as u32), n))
    }

    /// Placeholder identity of a placeholder node.
    pub fn placeholder_id(&self, id: ExprId) -> Option<PlaceholderId> {
        match self.get(id).map(|n| &n.kind) {
            Some(ExprKind::Placeholder { id, .. }) => Some(*id),
            _ => None,
        }
    }

    pub(crate) fn intern(&mut self, node: ExprNode) -> ExprResult<ExprId> {
        if let Some(&id) = self.index.get(&node) {
            return Ok(id);
        }
        let id = ExprId::next_for("expression", self.nodes.len())?;
        trace!(%id, kind = node.kind.type_name(), data = %node.data, "interned expression");
        self.index.insert(node.clone(), id);
        self.nodes.push(node);
        Ok(id)
    }

    /// Build a composite node: scope check, type check, folding, interning.
    pub(crate) fn build(&mut self, kind: ExprKind) -> ExprResult<ExprId> {
        let deps = kind.dependencies();
        let mut scope = Scope::Global;
        for dep in &deps {
            let dep_scope = self.node(*dep)?.scope;
            scope = scope.join(dep_scope).ok_or(ExprError::ScopeMismatch {
                left: scope,
                right: dep_scope,
            })?;
        }

        let data = typing::infer(self, &kind)?;

        if self.config.constant_folding {
            match fold::fold(self, &kind, data)? {
                Folded::Keep => {}
                Folded::Existing(id) => return Ok(id),
                Folded::Value(value) => return self.constant(value),
                Folded::Rewrite(kind) => return self.build(kind),
            }
        }

        let constant = match kind {
            ExprKind::Pre { .. } | ExprKind::Edge { .. } => false,
            _ => !deps.is_empty() && deps.iter().all(|d| self.is_constant(*d)),
        };
        self.intern(ExprNode {
            kind,
            data,
            scope,
            constant,
        })
    }

    fn leaf(
        &mut self,
        kind: ExprKind,
        data: DataKind,
        scope: Scope,
        constant: bool,
    ) -> ExprResult<ExprId> {
        self.intern(ExprNode {
            kind,
            data,
            scope,
            constant,
        })
    }

    /// Constant node (`fromConstant`).
    pub fn constant(&mut self, value: Value) -> ExprResult<ExprId> {
        let data = value.kind();
        self.leaf(ExprKind::Constant(value), data, Scope::Global, true)
    }

    pub fn double(&mut self, value: f64) -> ExprResult<ExprId> {
        self.constant(Value::Double(value))
    }

    pub fn boolean(&mut self, value: bool) -> ExprResult<ExprId> {
        self.constant(Value::Boolean(value))
    }

    pub fn integer(&mut self, value: i64) -> ExprResult<ExprId> {
        self.constant(Value::Integer(value))
    }

    /// Sensor not tied to a specific device.
    pub fn sensor(&mut self, name: impl Into<String>, data: DataKind) -> ExprResult<ExprId> {
        let kind = ExprKind::Sensor {
            name: name.into(),
            device: None,
        };
        self.leaf(kind, data, Scope::Global, false)
    }

    /// Sensor provided by `device`; bound to the context that owns the device.
    pub fn device_sensor(
        &mut self,
        devices: &dyn DeviceService,
        device: DeviceId,
        name: impl Into<String>,
        data: DataKind,
    ) -> ExprResult<ExprId> {
        let scope = devices
            .context_of(&device)
            .map(Scope::Context)
            .unwrap_or_default();
        let kind = ExprKind::Sensor {
            name: name.into(),
            device: Some(device),
        };
        self.leaf(kind, data, scope, false)
    }

    /// Network input set while the compiled network runs.
    pub fn input(
        &mut self,
        name: impl Into<String>,
        data: DataKind,
        scope: Scope,
    ) -> ExprResult<ExprId> {
        self.leaf(ExprKind::Input { name: name.into() }, data, scope, false)
    }

    /// Value supplied with the compile request.
    pub fn parameter(&mut self, name: impl Into<String>, data: DataKind) -> ExprResult<ExprId> {
        self.leaf(
            ExprKind::Parameter { name: name.into() },
            data,
            Scope::Global,
            true,
        )
    }

    /// Seconds since the network started.
    pub fn time(&mut self) -> ExprResult<ExprId> {
        self.leaf(
            ExprKind::Clock(ClockSignal::Time),
            DataKind::Double,
            Scope::Global,
            false,
        )
    }

    /// Length of the current cycle in seconds.
    pub fn period(&mut self) -> ExprResult<ExprId> {
        self.leaf(
            ExprKind::Clock(ClockSignal::Period),
            DataKind::Double,
            Scope::Global,
            false,
        )
    }

    /// Transformation from frame `from` to frame `to`.
    pub fn relation(&mut self, from: impl Into<String>, to: impl Into<String>) -> ExprResult<ExprId> {
        let kind = ExprKind::Relation {
            from: from.into(),
            to: to.into(),
        };
        self.leaf(kind, DataKind::TRANSFORM, Scope::Global, false)
    }

    /// Fresh forward-reference placeholder. Never equal to another placeholder.
    pub fn placeholder(
        &mut self,
        label: impl Into<String>,
        data: DataKind,
        scope: Scope,
    ) -> ExprResult<ExprId> {
        let id = PlaceholderId(self.next_placeholder);
        self.next_placeholder += 1;
        let kind = ExprKind::Placeholder {
            id,
            label: label.into(),
        };
        self.leaf(kind, data, scope, false)
    }

    /// Node of a user-defined kind.
    pub fn custom(&mut self, node: CustomNode) -> ExprResult<ExprId> {
        for p in &node.params {
            cf_core::ensure_finite(p.get(), "custom node parameter")?;
        }
        if node.dependencies.is_empty() {
            let data = node.data;
            return self.leaf(ExprKind::Custom(node), data, Scope::Global, false);
        }
        self.build(ExprKind::Custom(node))
    }
}
