//! Instrumented fake device adapters for the integration tests.
//!
//! A [`Recorder`] is shared by every fake device of a test. Each handler invocation and each SYSREF
//! pulse is appended to it, so tests can assert on the exact order the orchestrator produced.
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use jesd204_fsm::{HandlerTable, Reason, State};
use jesd204_link::Link;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    Handler {
        state: State,
        reason: Reason,
        device: String,
        link_id: Option<u32>,
    },
    Sysref {
        device: String,
        /// The state of the last handler invocation before the pulse.
        after: Option<State>,
    },
}

#[derive(Debug, Default)]
struct Inner {
    events: RefCell<Vec<Event>>,
    last_state: Cell<Option<State>>,
}

/// Shared event log.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    inner: Rc<Inner>,
}

impl Recorder {
    pub fn new() -> Recorder {
        Recorder::default()
    }

    /// Starts describing a fake device that reports to this recorder.
    pub fn device(&self, name: &str) -> FakeDevice {
        FakeDevice {
            recorder: self.clone(),
            name: name.to_string(),
            per_device: Vec::new(),
            per_link: Vec::new(),
            failures: Vec::new(),
            sysref: None,
            link_params: None,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.events.borrow().clone()
    }

    /// Handler invocations as `(state, device, link)`, in call order.
    pub fn calls(&self) -> Vec<(State, String, Option<u32>)> {
        self.inner
            .events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Handler {
                    state,
                    device,
                    link_id,
                    ..
                } => Some((*state, device.clone(), *link_id)),
                Event::Sysref { .. } => None,
            })
            .collect()
    }

    /// The states after which a SYSREF pulse was emitted, in order.
    pub fn pulses(&self) -> Vec<Option<State>> {
        self.inner
            .events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Sysref { after, .. } => Some(*after),
                Event::Handler { .. } => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.inner.events.borrow_mut().clear();
        self.inner.last_state.set(None);
    }

    fn handler(&self, state: State, reason: Reason, device: &str, link_id: Option<u32>) {
        self.inner.last_state.set(Some(state));
        self.inner.events.borrow_mut().push(Event::Handler {
            state,
            reason,
            device: device.to_string(),
            link_id,
        });
    }

    fn sysref(&self, device: &str) {
        self.inner.events.borrow_mut().push(Event::Sysref {
            device: device.to_string(),
            after: self.inner.last_state.get(),
        });
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SysrefBehaviour {
    Succeed,
    Fail,
}

/// Describes which states a fake device handles and where it fails.
pub struct FakeDevice {
    recorder: Recorder,
    name: String,
    per_device: Vec<State>,
    per_link: Vec<State>,
    failures: Vec<(State, Option<u32>)>,
    sysref: Option<SysrefBehaviour>,
    link_params: Option<Rc<dyn Fn(&mut Link)>>,
}

impl FakeDevice {
    /// Handle `states` once per device.
    pub fn per_device(mut self, states: impl IntoIterator<Item = State>) -> Self {
        self.per_device.extend(states);
        self
    }

    /// Handle `states` once per link.
    pub fn per_link(mut self, states: impl IntoIterator<Item = State>) -> Self {
        self.per_link.extend(states);
        self
    }

    /// Handle every state once per link.
    pub fn all_states_per_link(self) -> Self {
        self.per_link(State::ALL)
    }

    /// Fail in `state`, for `link_id` only if given.
    pub fn fail_at(mut self, state: State, link_id: Option<u32>) -> Self {
        self.failures.push((state, link_id));
        self
    }

    pub fn sysref_provider(mut self) -> Self {
        self.sysref = Some(SysrefBehaviour::Succeed);
        self
    }

    pub fn failing_sysref_provider(mut self) -> Self {
        self.sysref = Some(SysrefBehaviour::Fail);
        self
    }

    /// Applied to every link in the LINK_INIT state, after the handler was recorded.
    pub fn link_params(mut self, configure: impl Fn(&mut Link) + 'static) -> Self {
        self.link_params = Some(Rc::new(configure));
        self
    }

    pub fn build(self) -> HandlerTable {
        let FakeDevice {
            recorder,
            name,
            per_device,
            per_link,
            failures,
            sysref,
            link_params,
        } = self;
        let failures = Rc::new(failures);
        let mut builder = HandlerTable::builder();

        for state in per_device {
            let (recorder, name, failures) =
                (recorder.clone(), name.clone(), Rc::clone(&failures));
            builder = builder.per_device(state, move |_, reason| {
                recorder.handler(state, reason, &name, None);
                if failures.contains(&(state, None)) {
                    return Err(format!("{} injected failure", name).into());
                }
                Ok(())
            });
        }
        for state in per_link {
            let (recorder, name, failures) =
                (recorder.clone(), name.clone(), Rc::clone(&failures));
            let link_params = link_params.clone();
            builder = builder.per_link(state, move |_, reason, link| {
                recorder.handler(state, reason, &name, Some(link.link_id));
                let fails = failures
                    .iter()
                    .any(|&(s, id)| s == state && id.is_none_or(|id| id == link.link_id));
                if fails {
                    return Err(format!("{} injected failure", name).into());
                }
                if let (State::LinkInit, Reason::Init, Some(configure)) =
                    (state, reason, &link_params)
                {
                    configure(link);
                }
                Ok(())
            });
        }
        match sysref {
            Some(SysrefBehaviour::Succeed) => {
                builder = builder.sysref(move || {
                    recorder.sysref(&name);
                    Ok(())
                });
            }
            Some(SysrefBehaviour::Fail) => {
                builder = builder.sysref(move || {
                    recorder.sysref(&name);
                    Err("SYSREF generator fault".into())
                });
            }
            None => {}
        }
        builder.build()
    }
}
