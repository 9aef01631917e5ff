//! Mapper registry.
//!
//! A mapper lowers one expression node into network blocks. Mappers are looked
//! up by the node's mapper keys, most specific first, so a registration for
//! `"binary.add"` overrides the generic `"binary"` lowering for additions only.

use std::collections::HashMap;
use std::sync::Arc;

use cf_core::{DataKind, ExprId, PortId, Value};
use cf_expr::{ExprKind, ExprNode, RelationStep};
use cf_net::Primitive;
use nalgebra::Isometry3;

use crate::error::{CompileResult, MappingError};
use crate::session::Session;

/// Lowers nodes of one kind.
///
/// `inputs` holds the output ports of the node's dependencies, already lowered,
/// in dependency order. The returned port must carry the node's data kind.
pub trait NodeMapper: Send + Sync {
    fn lower(
        &self,
        session: &mut Session<'_>,
        id: ExprId,
        node: &ExprNode,
        inputs: &[PortId],
    ) -> CompileResult<PortId>;
}

struct FnMapper<F>(F);

impl<F> NodeMapper for FnMapper<F>
where
    F: Fn(&mut Session<'_>, ExprId, &ExprNode, &[PortId]) -> CompileResult<PortId> + Send + Sync,
{
    fn lower(
        &self,
        session: &mut Session<'_>,
        id: ExprId,
        node: &ExprNode,
        inputs: &[PortId],
    ) -> CompileResult<PortId> {
        (self.0)(session, id, node, inputs)
    }
}

/// Mappers by key. Shared read-only by every compile session.
#[derive(Clone, Default)]
pub struct MapperRegistry {
    mappers: HashMap<String, Arc<dyn NodeMapper>>,
}

impl MapperRegistry {
    /// Registry without any mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with lowerings for every built-in node kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for key in [
            "constant",
            "sensor",
            "input",
            "parameter",
            "clock",
            "relation",
            "placeholder",
            "persisted",
            "unary",
            "binary",
            "compare",
            "select",
            "limit",
            "filter",
            "delay",
            "edge",
            "pack",
            "index",
            "compose",
        ] {
            registry.register(key, Builtin);
        }
        registry
    }

    /// Register `mapper` under `key`, replacing any earlier registration.
    pub fn register(&mut self, key: impl Into<String>, mapper: impl NodeMapper + 'static) {
        self.mappers.insert(key.into(), Arc::new(mapper));
    }

    /// Register a closure as mapper.
    pub fn register_fn<F>(&mut self, key: impl Into<String>, f: F)
    where
        F: Fn(&mut Session<'_>, ExprId, &ExprNode, &[PortId]) -> CompileResult<PortId>
            + Send
            + Sync
            + 'static,
    {
        self.register(key, FnMapper(f));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.mappers.contains_key(key)
    }

    /// First mapper registered under one of `keys`, with the key that matched.
    pub fn lookup<'r>(&'r self, keys: &'r [String]) -> Option<(&'r str, &'r Arc<dyn NodeMapper>)> {
        keys.iter()
            .find_map(|k| self.mappers.get(k).map(|m| (k.as_str(), m)))
    }
}

impl core::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut keys: Vec<_> = self.mappers.keys().collect();
        keys.sort();
        f.debug_struct("MapperRegistry").field("keys", &keys).finish()
    }
}

/// Lowering of the built-in node kinds.
struct Builtin;

impl NodeMapper for Builtin {
    fn lower(
        &self,
        session: &mut Session<'_>,
        id: ExprId,
        node: &ExprNode,
        inputs: &[PortId],
    ) -> CompileResult<PortId> {
        let data = node.data;
        let primitive = match &node.kind {
            ExprKind::Constant(value) => return session.const_port(value.clone()),
            ExprKind::Parameter { name } => {
                let value = session
                    .params()
                    .get(name)
                    .cloned()
                    .ok_or_else(|| MappingError::MissingParameter { name: name.clone() })?;
                if value.kind() != data {
                    return Err(MappingError::constraint(format!(
                        "parameter '{name}' is {}, expected {data}",
                        value.kind()
                    )));
                }
                return session.const_port(value);
            }
            ExprKind::Sensor { name, device } => {
                let device = match device {
                    Some(d) => {
                        if !session.host().devices.is_present(d) {
                            return Err(MappingError::DeviceUnavailable {
                                device: d.as_str().to_string(),
                            });
                        }
                        Some(d.as_str().to_string())
                    }
                    None => None,
                };
                Primitive::Sensor {
                    name: name.clone(),
                    device,
                }
            }
            ExprKind::Input { name } => Primitive::Input { name: name.clone() },
            ExprKind::Clock(signal) => Primitive::Clock { signal: *signal },
            ExprKind::Relation { from, to } => return lower_relation(session, from, to),
            ExprKind::Placeholder { .. } => return session.open_placeholder(id),
            ExprKind::Persisted { handle } => {
                let slot = session
                    .params()
                    .slot(*handle)
                    .ok_or(MappingError::UnboundPersisted { handle: *handle })?;
                Primitive::PersistLoad { slot }
            }
            ExprKind::Unary { op, .. } => Primitive::Unary { op: *op },
            ExprKind::Binary { op, .. } => Primitive::Binary { op: *op },
            ExprKind::Compare { op, .. } => Primitive::Compare { op: *op },
            ExprKind::Select { .. } => Primitive::Select,
            ExprKind::Limit { .. } => Primitive::Limit,
            ExprKind::Smooth { time_constant, .. } => Primitive::Smooth {
                time_constant: time_constant.get(),
            },
            ExprKind::RateLimit { max_rate, .. } => Primitive::RateLimit {
                max_rate: max_rate.get(),
            },
            ExprKind::Pre { initial, .. } => Primitive::Pre {
                initial: initial.clone(),
            },
            ExprKind::Edge { rising, .. } => Primitive::Edge { rising: *rising },
            ExprKind::Pack { .. } => Primitive::Pack,
            ExprKind::Index { index, .. } => Primitive::Index { index: *index },
            ExprKind::Compose { kind, .. } => Primitive::Compose { kind: *kind },
            ExprKind::Custom(c) => {
                return Err(MappingError::Unmappable {
                    kind: c.type_name.clone(),
                    keys: node.kind.mapper_keys().join(", "),
                });
            }
        };
        session.add(primitive, inputs, data)
    }
}

/// Chain of constant and measured transformations between two frames.
fn lower_relation(session: &mut Session<'_>, from: &str, to: &str) -> CompileResult<PortId> {
    let path = session
        .host()
        .topology
        .path(from, to)
        .ok_or_else(|| MappingError::NoRelation {
            from: from.to_string(),
            to: to.to_string(),
        })?;

    let mut acc: Option<PortId> = None;
    for step in path {
        let port = match step {
            RelationStep::Fixed(t) => session.const_port(Value::Transform(t))?,
            RelationStep::Measured {
                sensor,
                device,
                inverted,
            } => {
                if let Some(d) = &device {
                    if !session.host().devices.is_present(d) {
                        return Err(MappingError::DeviceUnavailable {
                            device: d.as_str().to_string(),
                        });
                    }
                }
                let measured = session.add(
                    Primitive::Sensor {
                        name: sensor,
                        device: device.map(|d| d.0),
                    },
                    &[],
                    DataKind::TRANSFORM,
                )?;
                if inverted {
                    session.add(
                        Primitive::Unary {
                            op: cf_core::UnaryOp::Invert,
                        },
                        &[measured],
                        DataKind::TRANSFORM,
                    )?
                } else {
                    measured
                }
            }
        };
        acc = Some(match acc {
            None => port,
            Some(prev) => session.add(
                Primitive::Binary {
                    op: cf_core::BinaryOp::Mul,
                },
                &[prev, port],
                DataKind::TRANSFORM,
            )?,
        });
    }
    match acc {
        Some(port) => Ok(port),
        None => session.const_port(Value::Transform(Isometry3::identity())),
    }
}
