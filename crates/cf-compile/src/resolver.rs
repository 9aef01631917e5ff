//! Forward-reference resolution.
//!
//! Placeholders let an expression refer to a value that is only built later,
//! e.g. a ramp whose next position depends on its previous one, or an override
//! scale driven by the enclosing command. At the end of a session every open
//! placeholder is offered to the registered factories in registration order;
//! the first one that answers [`Resolution::Resolved`] wins.

use cf_core::{DataKind, ExprId, PortId};
use cf_expr::PlaceholderId;

use crate::error::CompileResult;
use crate::session::Session;

/// Placeholder waiting for a producer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderRef {
    /// Placeholder node.
    pub expr: ExprId,
    pub id: PlaceholderId,
    pub label: String,
    pub data: DataKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(PortId),
    /// Not this factory's placeholder.
    NotApplicable,
}

pub trait PlaceholderFactory {
    fn resolve(
        &self,
        placeholder: &PlaceholderRef,
        session: &mut Session<'_>,
    ) -> CompileResult<Resolution>;
}

/// Resolves placeholders by lowering a producer expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprFactory {
    targets: Vec<ExprId>,
    producer: ExprId,
}

impl ExprFactory {
    pub fn new(placeholder: ExprId, producer: ExprId) -> Self {
        Self {
            targets: vec![placeholder],
            producer,
        }
    }

    /// One producer for several placeholders.
    pub fn for_all(placeholders: impl IntoIterator<Item = ExprId>, producer: ExprId) -> Self {
        Self {
            targets: placeholders.into_iter().collect(),
            producer,
        }
    }
}

impl PlaceholderFactory for ExprFactory {
    fn resolve(
        &self,
        placeholder: &PlaceholderRef,
        session: &mut Session<'_>,
    ) -> CompileResult<Resolution> {
        if !self.targets.contains(&placeholder.expr) {
            return Ok(Resolution::NotApplicable);
        }
        Ok(Resolution::Resolved(session.lower(self.producer)?))
    }
}

/// Resolves placeholders with a port built by a closure.
pub struct PortFactory<F> {
    targets: Vec<ExprId>,
    build: F,
}

impl<F> PortFactory<F>
where
    F: Fn(&mut Session<'_>) -> CompileResult<PortId>,
{
    pub fn new(placeholder: ExprId, build: F) -> Self {
        Self {
            targets: vec![placeholder],
            build,
        }
    }

    pub fn for_all(placeholders: impl IntoIterator<Item = ExprId>, build: F) -> Self {
        Self {
            targets: placeholders.into_iter().collect(),
            build,
        }
    }
}

impl<F> PlaceholderFactory for PortFactory<F>
where
    F: Fn(&mut Session<'_>) -> CompileResult<PortId>,
{
    fn resolve(
        &self,
        placeholder: &PlaceholderRef,
        session: &mut Session<'_>,
    ) -> CompileResult<Resolution> {
        if !self.targets.contains(&placeholder.expr) {
            return Ok(Resolution::NotApplicable);
        }
        Ok(Resolution::Resolved((self.build)(session)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileConfig;
    use crate::mapper::MapperRegistry;
    use crate::params::Parameters;
    use cf_core::Value;
    use cf_expr::{ExprArena, Host, Scope};

    #[test]
    fn foreign_placeholder_is_not_applicable() {
        let mut arena = ExprArena::default();
        let mine = arena.placeholder("mine", DataKind::Double, Scope::Global).unwrap();
        let other = arena.placeholder("other", DataKind::Double, Scope::Global).unwrap();
        let one = arena.double(1.0).unwrap();
        let (registry, params, config) = (
            MapperRegistry::with_defaults(),
            Parameters::new(),
            CompileConfig::default(),
        );
        let mut session = Session::new(&arena, &registry, &params, &config, Host::offline());
        let factory = ExprFactory::new(mine, one);
        let foreign = PlaceholderRef {
            expr: other,
            id: arena.placeholder_id(other).unwrap(),
            label: "other".into(),
            data: DataKind::Double,
        };
        assert_eq!(
            factory.resolve(&foreign, &mut session).unwrap(),
            Resolution::NotApplicable
        );
    }

    #[test]
    fn self_reference_through_pre_resolves() {
        // counter = pre(counter, 0) + 1
        let mut arena = ExprArena::default();
        let ph = arena.placeholder("counter", DataKind::Double, Scope::Global).unwrap();
        let prev = arena.pre(ph, Value::Double(0.0)).unwrap();
        let one = arena.double(1.0).unwrap();
        let next = arena.add(prev, one).unwrap();

        let (registry, params, config) = (
            MapperRegistry::with_defaults(),
            Parameters::new(),
            CompileConfig::default(),
        );
        let mut session = Session::new(&arena, &registry, &params, &config, Host::offline());
        let out = session.lower(next).unwrap();
        session.add_factory(ExprFactory::new(ph, next));
        let frag = session.finish().unwrap();

        let mut sim = cf_net::NetSimulator::new(&frag, 0.01).unwrap();
        sim.run(3).unwrap();
        assert_eq!(sim.double(out), Some(3.0));
    }

    #[test]
    fn port_factory_builds_on_demand() {
        let mut arena = ExprArena::default();
        let ph = arena.placeholder("flag", DataKind::Boolean, Scope::Global).unwrap();
        let (registry, params, config) = (
            MapperRegistry::with_defaults(),
            Parameters::new(),
            CompileConfig::default(),
        );
        let mut session = Session::new(&arena, &registry, &params, &config, Host::offline());
        session.lower(ph).unwrap();
        session.add_factory(PortFactory::new(ph, |s: &mut Session<'_>| s.constant_bool(true)));
        let frag = session.finish().unwrap();
        assert!(frag.validate().is_ok());
    }
}
