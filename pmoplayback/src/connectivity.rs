use std::time::Instant;

/// Anything able to tell whether the network is reachable.
pub trait Connectivity {
    fn is_online(&self) -> bool;
}

/// Mirror of the platform connectivity signal.
#[derive(Clone, Debug)]
pub struct ConnectivityState {
    online: bool,
    last_change: Option<Instant>,
}

impl ConnectivityState {
    pub fn new(online: bool) -> Self {
        Self {
            online,
            last_change: None,
        }
    }

    pub fn last_change(&self) -> Option<Instant> {
        self.last_change
    }

    /// Records the signal; returns true if it was a transition.
    pub fn set_online(&mut self, online: bool, now: Instant) -> bool {
        if self.online == online {
            return false;
        }
        self.online = online;
        self.last_change = Some(now);
        true
    }
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityState {
    fn is_online(&self) -> bool {
        self.online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_reported_once() {
        let now = Instant::now();
        let mut state = ConnectivityState::default();
        assert!(state.is_online());
        assert_eq!(state.last_change(), None);

        assert!(!state.set_online(true, now));
        assert!(state.set_online(false, now));
        assert!(!state.is_online());
        assert_eq!(state.last_change(), Some(now));
        assert!(!state.set_online(false, now));
        assert!(state.set_online(true, now));
    }
}
