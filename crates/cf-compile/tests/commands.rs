//! Integration tests for actions, commands and state propagation.

use cf_compile::{
    lower_state, Action, CommandSpec, CompileConfig, CompileRequest, Compiler, Handler,
    MapperRegistry, MappingError, Parameters, Session, StateExpr,
};
use cf_core::{s, DataKind, Value};
use cf_expr::{CommandId, ContextId, ExprArena, Host, Scope};
use cf_net::{ExceptionClass, NetSimulator, StateKind};

const PERIOD: f64 = 0.125;

fn command_scope() -> Scope {
    Scope::command(ContextId(1), CommandId(7))
}

fn compiler() -> Compiler {
    Compiler::new(CompileConfig {
        cycle_period_s: PERIOD,
        ..CompileConfig::default()
    })
}

fn double(sim: &NetSimulator<'_>, name: &str) -> f64 {
    sim.output(name).and_then(Value::as_double).unwrap()
}

#[test]
fn ramp_converges_and_completes() {
    let mut arena = ExprArena::default();
    let start = arena.sensor("axis.pos", DataKind::Double).unwrap();
    let target = arena.double(1.0).unwrap();
    let ramp = Action::ramp(&mut arena, "move", "axis", start, target, 2.0).unwrap();

    let net = compiler()
        .lower(&arena, Host::offline(), &CompileRequest::action(ramp))
        .unwrap();
    let completed = net.state_port(&StateKind::Completed).unwrap();
    let active = net.state_port(&StateKind::Active).unwrap();

    let mut sim = net.simulator(PERIOD).unwrap();
    sim.run(2).unwrap();
    assert!((double(&sim, "axis") - 0.5).abs() < 1e-12);
    assert_eq!(sim.boolean(completed), Some(false));
    assert_eq!(sim.boolean(active), Some(true));

    sim.run(4).unwrap();
    assert!((double(&sim, "axis") - 1.0).abs() < 1e-9);
    assert_eq!(sim.boolean(completed), Some(true));
    assert_eq!(sim.boolean(active), Some(false));
}

#[test]
fn ramp_starts_from_measured_position() {
    let mut arena = ExprArena::default();
    let start = arena.sensor("axis.pos", DataKind::Double).unwrap();
    let target = arena.double(0.0).unwrap();
    let ramp = Action::ramp(&mut arena, "home", "axis", start, target, 1.0).unwrap();
    let net = compiler()
        .lower(&arena, Host::offline(), &CompileRequest::action(ramp))
        .unwrap();
    let mut sim = net.simulator(PERIOD).unwrap();
    sim.set_sensor("axis.pos", 1.0);
    sim.step().unwrap();
    assert_eq!(double(&sim, "axis"), 0.875);
    // Later cycles follow the ramp's own position, not the sensor.
    sim.set_sensor("axis.pos", 5.0);
    sim.step().unwrap();
    assert_eq!(double(&sim, "axis"), 0.75);
}

#[test]
fn cancellation_decays_override_within_deceleration_time() {
    let mut arena = ExprArena::default();
    let start = arena.double(0.0).unwrap();
    let target = arena.double(10.0).unwrap();
    let ramp = Action::ramp(&mut arena, "slide", "axis", start, target, 1.0).unwrap();
    let command = CommandSpec::new(&mut arena, "move", command_scope(), ramp, Some(s(0.5))).unwrap();
    let cancel_input = command.cancel_input_name();
    let override_out = command.override_output_name();

    let net = compiler()
        .lower(&arena, Host::offline(), &CompileRequest::command(command))
        .unwrap();
    let cancelled = net.state_port(&StateKind::Cancelled).unwrap();
    let mut sim = net.simulator(PERIOD).unwrap();

    sim.run(2).unwrap();
    assert_eq!(double(&sim, &override_out), 1.0);
    assert_eq!(double(&sim, "axis"), 0.25);

    sim.set_input(cancel_input, true);
    // The request reaches the scale one cycle later.
    sim.step().unwrap();
    assert_eq!(double(&sim, &override_out), 1.0);
    sim.run(2).unwrap();
    assert_eq!(double(&sim, &override_out), 0.5);
    assert_eq!(sim.boolean(cancelled), Some(false));

    // 0.5 s at 0.125 s per cycle: zero after four decaying cycles.
    sim.run(2).unwrap();
    assert_eq!(double(&sim, &override_out), 0.0);
    assert_eq!(sim.boolean(cancelled), Some(true));
    let stopped_at = double(&sim, "axis");
    assert_eq!(stopped_at, 0.25 + 0.125 * (1.0 + 0.75 + 0.5 + 0.25));

    sim.run(3).unwrap();
    assert_eq!(double(&sim, "axis"), stopped_at);
}

#[test]
fn user_override_scales_ramp_speed() {
    let mut arena = ExprArena::default();
    let start = arena.double(0.0).unwrap();
    let target = arena.double(10.0).unwrap();
    let ramp = Action::ramp(&mut arena, "slide", "axis", start, target, 1.0).unwrap();
    let speed = arena.input("speed", DataKind::Double, command_scope()).unwrap();
    let command = CommandSpec::new(&mut arena, "move", command_scope(), ramp, Some(s(1.0)))
        .unwrap()
        .with_override(&mut arena, speed)
        .unwrap();
    let net = compiler()
        .lower(&arena, Host::offline(), &CompileRequest::command(command))
        .unwrap();
    let mut sim = net.simulator(PERIOD).unwrap();
    sim.set_input("speed", 0.5);
    sim.run(4).unwrap();
    assert_eq!(double(&sim, "axis"), 0.25);
}

#[test]
fn command_without_deceleration_is_rejected() {
    let mut arena = ExprArena::default();
    let result = CommandSpec::new(&mut arena, "idle", command_scope(), Action::wait("w", s(1.0)), None);
    assert!(matches!(result, Err(cf_expr::ExprError::InvalidArg { .. })));
}

#[test]
fn throw_handler_raises_after_stall() {
    let mut arena = ExprArena::default();
    let stall = arena.input("stall", DataKind::Boolean, Scope::Global).unwrap();
    let timeout = ExceptionClass::root("Timeout");
    let command = CommandSpec::new(&mut arena, "wait", command_scope(), Action::wait("w", s(10.0)), Some(s(0.5)))
        .unwrap()
        .on(
            StateExpr::long(StateExpr::condition(stall), s(0.25)),
            Handler::Throw(timeout.clone()),
        );
    let net = compiler()
        .lower(&arena, Host::offline(), &CompileRequest::command(command))
        .unwrap();
    let raised = net.exception_port(&timeout).unwrap();
    assert!(net.exception_port(&ExceptionClass::root("Other")).is_none());

    let mut sim = net.simulator(PERIOD).unwrap();
    sim.set_input("stall", true);
    sim.run(2).unwrap();
    assert_eq!(sim.boolean(raised), Some(false));
    sim.step().unwrap();
    assert_eq!(sim.boolean(raised), Some(true));
}

#[test]
fn cancel_handler_feeds_cancellation() {
    let mut arena = ExprArena::default();
    let abort = arena.input("abort", DataKind::Boolean, Scope::Global).unwrap();
    let command = CommandSpec::new(&mut arena, "hold", command_scope(), Action::wait("w", s(10.0)), Some(s(0.25)))
        .unwrap()
        .on(StateExpr::condition(abort), Handler::Cancel);
    let net = compiler()
        .lower(&arena, Host::offline(), &CompileRequest::command(command))
        .unwrap();
    let cancelled = net.state_port(&StateKind::Cancelled).unwrap();
    let mut sim = net.simulator(PERIOD).unwrap();
    sim.set_input("abort", true);
    sim.run(2).unwrap();
    assert_eq!(sim.boolean(cancelled), Some(false));
    assert_eq!(double(&sim, "hold.override"), 0.5);
    sim.step().unwrap();
    assert_eq!(sim.boolean(cancelled), Some(true));
    assert_eq!(double(&sim, "hold.override"), 0.0);
}

#[test]
fn ramp_cancelled_by_its_own_state_decelerates() {
    let mut arena = ExprArena::default();
    let start = arena.double(0.0).unwrap();
    let target = arena.double(10.0).unwrap();
    let ramp = Action::ramp(&mut arena, "slide", "axis", start, target, 1.0).unwrap();
    let command = CommandSpec::new(&mut arena, "move", command_scope(), ramp, Some(s(0.5)))
        .unwrap()
        .on(StateExpr::long(StateExpr::active(), s(0.25)), Handler::Cancel);
    let override_out = command.override_output_name();

    let net = compiler()
        .lower(&arena, Host::offline(), &CompileRequest::command(command))
        .unwrap();
    let cancelled = net.state_port(&StateKind::Cancelled).unwrap();
    let mut sim = net.simulator(PERIOD).unwrap();

    // Active for 0.25 s on cycle 3; the scale starts decaying on cycle 4.
    sim.run(3).unwrap();
    assert_eq!(double(&sim, &override_out), 1.0);
    assert_eq!(double(&sim, "axis"), 0.375);

    sim.run(3).unwrap();
    assert_eq!(double(&sim, &override_out), 0.25);
    assert_eq!(sim.boolean(cancelled), Some(false));

    sim.step().unwrap();
    assert_eq!(double(&sim, &override_out), 0.0);
    assert_eq!(sim.boolean(cancelled), Some(true));
    let stopped_at = double(&sim, "axis");
    assert_eq!(stopped_at, 0.375 + 0.125 * (0.75 + 0.5 + 0.25));

    sim.run(2).unwrap();
    assert_eq!(double(&sim, "axis"), stopped_at);
}

#[test]
fn wrapped_action_reexports_unhandled_exceptions() {
    let fault = ExceptionClass::root("Fault");
    let overload = fault.child("Overload");

    let build = |handled: Option<ExceptionClass>| {
        let mut arena = ExprArena::default();
        let over = arena.input("over", DataKind::Boolean, Scope::Global).unwrap();
        let inner = Action::wait("inner", s(1.0)).raising(overload.clone(), over);
        let mut wrapper = Action::wrap("outer", inner);
        if let Some(class) = handled {
            wrapper = wrapper.handling(class);
        }
        compiler()
            .lower(&arena, Host::offline(), &CompileRequest::action(wrapper))
            .unwrap()
    };

    let open = build(None);
    assert!(open.exception_port(&overload).is_some());
    assert_eq!(open.exception_port(&fault), open.exception_port(&overload));

    let handled = build(Some(fault.clone()));
    assert!(handled.exception_port(&overload).is_none());
    assert!(handled.exception_port(&fault).is_none());
    assert!(handled.state_port(&StateKind::Completed).is_some());
}

#[test]
fn persisted_value_is_stored_by_command() {
    let mut arena = ExprArena::default();
    let scope = command_scope();
    let reading = arena.input("reading", DataKind::Double, scope).unwrap();
    let handle = arena.persist(reading, Scope::Context(ContextId(1))).unwrap();
    let command = CommandSpec::new(&mut arena, "probe", scope, Action::wait("w", s(1.0)), Some(s(0.5)))
        .unwrap()
        .persisting(handle);

    let request = CompileRequest::command(command);
    assert_eq!(
        compiler()
            .lower(&arena, Host::offline(), &request)
            .unwrap_err(),
        MappingError::UnboundPersisted { handle }
    );

    let mut params = Parameters::new();
    params.bind_persisted(handle, 5);
    let net = compiler()
        .lower(&arena, Host::offline(), &request.with_params(params))
        .unwrap();
    let mut sim = net.simulator(PERIOD).unwrap();
    sim.set_input("reading", 3.5);
    sim.step().unwrap();
    assert_eq!(sim.slot(5), Some(&Value::Double(3.5)));
}

#[test]
fn disjunction_skips_member_that_never_occurs() {
    let mut arena = ExprArena::default();
    let a = arena.input("a", DataKind::Boolean, Scope::Global).unwrap();
    let b = arena.input("b", DataKind::Boolean, Scope::Global).unwrap();
    let registry = MapperRegistry::with_defaults();
    let params = Parameters::new();
    let config = CompileConfig::default();
    let mut session = Session::new(&arena, &registry, &params, &config, Host::offline());
    let ports = cf_compile::ActionPorts {
        name: "a".into(),
        outputs: Default::default(),
        states: Default::default(),
        inner: Vec::new(),
    };

    let expr = StateExpr::or([
        StateExpr::condition(a),
        StateExpr::Of(StateKind::Cancelled),
        StateExpr::condition(b),
    ]);
    let port = lower_state(&mut session, &expr, &ports).unwrap().unwrap();
    session.fragment_mut().expose("any", port).unwrap();
    let fragment = session.finish().unwrap();

    let mut sim = NetSimulator::new(&fragment, PERIOD).unwrap();
    sim.step().unwrap();
    assert_eq!(sim.boolean(port), Some(false));
    sim.set_input("b", true);
    sim.step().unwrap();
    assert_eq!(sim.boolean(port), Some(true));
}

#[test]
fn explicit_state_latches_until_reset() {
    let mut arena = ExprArena::default();
    let set = arena.input("set", DataKind::Boolean, Scope::Global).unwrap();
    let reset = arena.input("reset", DataKind::Boolean, Scope::Global).unwrap();
    let registry = MapperRegistry::with_defaults();
    let params = Parameters::new();
    let config = CompileConfig::default();
    let mut session = Session::new(&arena, &registry, &params, &config, Host::offline());
    let ports = cf_compile::ActionPorts {
        name: "a".into(),
        outputs: Default::default(),
        states: Default::default(),
        inner: Vec::new(),
    };
    let expr = StateExpr::explicit(StateExpr::condition(set), Some(StateExpr::condition(reset)));
    let port = lower_state(&mut session, &expr, &ports).unwrap().unwrap();
    let fragment = session.finish().unwrap();

    let mut sim = NetSimulator::new(&fragment, PERIOD).unwrap();
    sim.set_input("set", true);
    sim.step().unwrap();
    sim.set_input("set", false);
    sim.step().unwrap();
    assert_eq!(sim.boolean(port), Some(true));
    sim.set_input("reset", true);
    sim.step().unwrap();
    assert_eq!(sim.boolean(port), Some(false));
}

#[test]
fn milestone_alias_is_reported() {
    let mut arena = ExprArena::default();
    let near = arena.input("near", DataKind::Boolean, Scope::Global).unwrap();
    let command = CommandSpec::new(&mut arena, "approach", command_scope(), Action::wait("w", s(1.0)), Some(s(0.5)))
        .unwrap()
        .on(
            StateExpr::alias("near_target", StateExpr::condition(near)),
            Handler::Throw(ExceptionClass::root("Arrived")),
        );
    let net = compiler()
        .lower(&arena, Host::offline(), &CompileRequest::command(command))
        .unwrap();
    assert!(net
        .state_port(&StateKind::Milestone("near_target".into()))
        .is_some());
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn ramp_moves_at_most_one_step_per_cycle(
            from in -10.0_f64..10.0,
            to in -10.0_f64..10.0,
            rate in 0.5_f64..5.0,
        ) {
            let mut arena = ExprArena::default();
            let start = arena.double(from).unwrap();
            let target = arena.double(to).unwrap();
            let ramp = Action::ramp(&mut arena, "move", "axis", start, target, rate).unwrap();
            let net = compiler()
                .lower(&arena, Host::offline(), &CompileRequest::action(ramp))
                .unwrap();
            let completed = net.state_port(&StateKind::Completed).unwrap();
            let mut sim = net.simulator(PERIOD).unwrap();

            let step = rate * PERIOD;
            let cycles = ((to - from).abs() / step).ceil() as usize + 1;
            let mut previous = from;
            for _ in 0..cycles {
                sim.step().unwrap();
                let position = double(&sim, "axis");
                prop_assert!((position - previous).abs() <= step + 1e-9);
                prop_assert!((position - to).abs() <= (previous - to).abs() + 1e-9);
                previous = position;
            }
            prop_assert!((previous - to).abs() < 1e-9);
            prop_assert_eq!(sim.boolean(completed), Some(true));
        }
    }
}
