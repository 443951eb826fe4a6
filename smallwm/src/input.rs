use mpxwm::{
    context::{MasterId, Mode, WindowId},
    input::{Binding, BindingFlags, Chain, ChainFlags, DeviceClass, Modifiers, UserEvent},
    rules::{ContinuationPolicy, Handler},
};
use tracing::info;

use crate::Smallwm;

const KEY_ESCAPE: u32 = 9;
const KEY_TAB: u32 = 23;
const KEY_Q: u32 = 24;
const KEY_E: u32 = 26;
const KEY_R: u32 = 27;
const KEY_RETURN: u32 = 36;
const KEY_H: u32 = 43;
const KEY_L: u32 = 46;
const BUTTON_LEFT: u32 = 1;

const RESIZE_MODE: Mode = Mode(1);

fn resize_chain() -> Chain<Smallwm> {
    let resize = |name: &'static str, detail: u32| {
        Binding::new(
            Modifiers::empty(),
            detail,
            Handler::on_window(name, move |_: &mut Smallwm, window: WindowId| {
                info!(window = %window, "{}", name);
            }),
        )
        .with_mode(RESIZE_MODE)
    };
    Chain::new(
        "resize_mode",
        vec![
            resize("shrink", KEY_H),
            resize("grow", KEY_L),
            Binding::new(Modifiers::empty(), KEY_ESCAPE, Handler::named("escape"))
                .with_mode(RESIZE_MODE)
                .with_flags(BindingFlags::TERMINATOR),
        ],
    )
    .with_grab_mask(DeviceClass::KEYBOARD)
    .with_flags(ChainFlags::ABORT_ON_IDLE)
    .on_start(Handler::on_master("enter_resize_mode", |state: &mut Smallwm, master: MasterId| {
        state.set_mode(master, RESIZE_MODE)
    }))
    .on_end(Handler::on_master("leave_resize_mode", |state: &mut Smallwm, master: MasterId| {
        state.set_mode(master, Mode::DEFAULT)
    }))
}

/// The binding table of smallwm
pub fn bindings() -> Vec<Binding<Smallwm>> {
    vec![
        Binding::new(
            Modifiers::MOD4,
            KEY_RETURN,
            Handler::niladic("spawn_terminal", |_: &mut Smallwm| {
                std::process::Command::new("xterm").spawn().is_ok()
            }),
        ),
        Binding::new(
            Modifiers::MOD4,
            KEY_TAB,
            Handler::on_master("focus_next", |state: &mut Smallwm, master| state.focus_next(master)),
        ),
        Binding::new(
            Modifiers::MOD4,
            KEY_Q,
            Handler::on_window("close", |state: &mut Smallwm, window| state.close(window)),
        ),
        Binding::new(
            Modifiers::MOD4 | Modifiers::SHIFT,
            KEY_E,
            Handler::niladic("quit", |state: &mut Smallwm| state.loop_signal.stop())
                .with_policy(ContinuationPolicy::NeverContinue),
        ),
        Binding::new(
            Modifiers::ANY,
            BUTTON_LEFT,
            Handler::on_window("click_to_focus", |state: &mut Smallwm, window| {
                let master = state.active_master_id();
                state.focus.insert(master, window);
            }),
        )
        .with_mask(DeviceClass::BUTTON_PRESS)
        .with_mode(Mode::ANY)
        .with_flags(BindingFlags::NO_GRAB),
        Binding::opening(Modifiers::MOD4, KEY_R, resize_chain()),
    ]
}

/// Input replayed by `--demo`
pub fn demo_script(master: MasterId) -> Vec<UserEvent> {
    let key = |mods: Modifiers, detail: u32| UserEvent::new(mods, detail, DeviceClass::KEY_PRESS).with_master(master);
    vec![
        key(Modifiers::MOD4, KEY_TAB),
        key(Modifiers::MOD4, KEY_TAB),
        key(Modifiers::MOD4, KEY_R),
        key(Modifiers::empty(), KEY_H),
        key(Modifiers::empty(), KEY_L).repeated(),
        key(Modifiers::empty(), KEY_ESCAPE),
        UserEvent::new(Modifiers::empty(), BUTTON_LEFT, DeviceClass::BUTTON_PRESS)
            .with_master(master)
            .with_window(WindowId(0x40_0003)),
        key(Modifiers::MOD4, KEY_Q),
        key(Modifiers::MOD4 | Modifiers::SHIFT, KEY_E),
    ]
}
