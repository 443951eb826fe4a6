mod common;

use common::{Counter, Wm};
use mpxwm::{
    context::{MasterId, MonitorId, WindowId, WorkspaceId},
    rules::{
        apply_batch_event_rules, apply_event_rules, run_idle_cycle, AddFlag, AddResult, Context,
        ContinuationPolicy, EventKind, Handler,
    },
};

#[test]
fn mark_and_count_on_window_move() {
    let mut wm = Wm::new();
    let counter = Counter::default();
    let count = counter.clone();
    wm.registry.add(
        EventKind::WindowMove,
        Handler::niladic("mark", |_: &mut Wm| true).with_policy(ContinuationPolicy::ContinueIfTrue),
        AddFlag::Append,
    );
    wm.registry.add(
        EventKind::WindowMove,
        Handler::niladic("count", move |_: &mut Wm| count.bump()),
        AddFlag::Append,
    );

    for _ in 0..3 {
        assert!(apply_event_rules(&mut wm, EventKind::WindowMove, Context::none()));
    }
    assert_eq!(counter.get(), 3);
    assert_eq!(wm.registry.trigger_count(EventKind::WindowMove), 3);

    apply_batch_event_rules(&mut wm);
    assert_eq!(counter.get(), 3);
    assert_eq!(wm.registry.trigger_count(EventKind::WindowMove), 0);
}

#[test]
fn drag_flood_relayouts_once_per_idle_cycle() {
    let mut wm = Wm::new();
    let geometry_updates = Counter::default();
    let relayouts = Counter::default();
    let g = geometry_updates.clone();
    let r = relayouts.clone();
    wm.registry.add(
        EventKind::WindowMove,
        Handler::on_window("cache_geometry", move |_: &mut Wm, _: WindowId| g.bump()),
        AddFlag::Append,
    );
    wm.registry.add_batch(
        EventKind::WindowMove,
        Handler::on_workspace("retile", move |_: &mut Wm, _: WorkspaceId| r.bump()),
        AddFlag::Append,
    );
    wm.workspaces.insert(MasterId(2), WorkspaceId(1));

    for _ in 0..100 {
        apply_event_rules(&mut wm, EventKind::WindowMove, Context::window(WindowId(5)));
    }
    run_idle_cycle(&mut wm);
    run_idle_cycle(&mut wm);
    assert_eq!(geometry_updates.get(), 100);
    assert_eq!(relayouts.get(), 1);
}

#[test]
fn extension_toggle_is_idempotent() {
    let mut wm = Wm::new();
    let hits = Counter::default();
    let h = hits.clone();
    let extension = Handler::niladic("auto_focus", move |_: &mut Wm| h.bump());

    assert_eq!(
        wm.registry.add(EventKind::PostRegisterWindow, extension.clone(), AddFlag::Toggle),
        AddResult::Inserted
    );
    apply_event_rules(&mut wm, EventKind::PostRegisterWindow, Context::window(WindowId(1)));
    assert_eq!(
        wm.registry.add(EventKind::PostRegisterWindow, extension, AddFlag::Toggle),
        AddResult::Removed
    );
    apply_event_rules(&mut wm, EventKind::PostRegisterWindow, Context::window(WindowId(1)));
    assert_eq!(hits.get(), 1);
    assert!(wm.registry.rules(EventKind::PostRegisterWindow).is_empty());
}

#[test]
fn monitor_rules_follow_the_supplied_master() {
    let mut wm = Wm::new();
    let seen = Counter::default();
    let s = seen.clone();
    wm.registry.add(
        EventKind::MonitorWorkspaceChange,
        Handler::on_monitor("redraw_bar", move |_: &mut Wm, monitor: MonitorId| {
            assert_eq!(monitor, MonitorId(107));
            s.bump();
        }),
        AddFlag::Append,
    );
    // the active master has no workspace: skipped
    assert!(apply_event_rules(&mut wm, EventKind::MonitorWorkspaceChange, Context::none()));
    wm.workspaces.insert(MasterId(3), WorkspaceId(7));
    apply_event_rules(
        &mut wm,
        EventKind::MonitorWorkspaceChange,
        Context::none().with_master(MasterId(3)),
    );
    assert_eq!(seen.get(), 1);
}
