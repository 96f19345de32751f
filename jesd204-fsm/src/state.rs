use std::fmt::Display;

/// The phases every topology walks through, in order.
///
/// The order is fixed by the protocol: links must be described before clocks are requested,
/// multichip synchronization must happen before the links are set up, and so on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum State {
    /// Adapters describe their links (lane count, rates, framing).
    LinkInit,
    /// Device clocks are requested from the clock collaborators.
    LinkPreSetup,
    /// First optional setup stage, typically multichip synchronization.
    OptSetupStage1,
    /// Second optional setup stage, typically post-MCS initialization.
    OptSetupStage2,
    /// Link clocks are enabled on both ends.
    ClocksEnable,
    /// Framers and deframers are configured.
    LinkSetup,
    /// Links are enabled and start code group synchronization.
    LinkEnable,
    /// Link status is checked; data is flowing.
    LinkRunning,
    /// Optional work once every link is running.
    OptPostRunningStage,
}

impl State {
    pub const COUNT: usize = 9;

    /// Every state in execution order.
    pub const ALL: [State; State::COUNT] = [
        State::LinkInit,
        State::LinkPreSetup,
        State::OptSetupStage1,
        State::OptSetupStage2,
        State::ClocksEnable,
        State::LinkSetup,
        State::LinkEnable,
        State::LinkRunning,
        State::OptPostRunningStage,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The state following this one, if any.
    pub fn next(self) -> Option<State> {
        State::ALL.get(self.index() + 1).copied()
    }

    /// Whether a SYSREF pulse is issued once every handler of this state succeeded.
    pub fn post_state_sysref(self) -> bool {
        matches!(
            self,
            State::OptSetupStage1 | State::OptSetupStage2 | State::LinkSetup | State::LinkEnable
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            State::LinkInit => "link_init",
            State::LinkPreSetup => "link_pre_setup",
            State::OptSetupStage1 => "opt_setup_stage1",
            State::OptSetupStage2 => "opt_setup_stage2",
            State::ClocksEnable => "clocks_enable",
            State::LinkSetup => "link_setup",
            State::LinkEnable => "link_enable",
            State::LinkRunning => "link_running",
            State::OptPostRunningStage => "opt_post_running_stage",
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Why the state machine is being walked.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Reason {
    /// Bring the links up.
    Init,
    /// Release whatever the adapters acquired. Handlers must not program new state.
    Uninit,
}

impl Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::Init => write!(f, "init"),
            Reason::Uninit => write!(f, "uninit"),
        }
    }
}

#[test]
fn states_are_ordered() {
    for (i, state) in State::ALL.iter().enumerate() {
        assert_eq!(state.index(), i);
    }
    assert!(State::ALL.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(State::LinkInit.next(), Some(State::LinkPreSetup));
    assert_eq!(State::OptPostRunningStage.next(), None);
}

#[test]
fn sysref_states() {
    let flagged: Vec<State> = State::ALL
        .into_iter()
        .filter(|s| s.post_state_sysref())
        .collect();
    assert_eq!(
        flagged,
        vec![
            State::OptSetupStage1,
            State::OptSetupStage2,
            State::LinkSetup,
            State::LinkEnable
        ]
    );
}
