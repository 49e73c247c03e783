use crate::state::RunPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Startup probes finished: page count and the page the session shows.
    PagesDetected {
        total: u32,
        current: u32,
        policy: RunPolicy,
    },
    /// The list on `page` was located.
    ListFetched { page: u32, items: usize },
    /// The list on `page` could not be located.
    ListFailed { page: u32 },
    /// Every item on `page` was visited; `unresolved` of `items` failed.
    PageProcessed {
        page: u32,
        items: usize,
        unresolved: usize,
    },
    /// A requested backoff delay has run out.
    BackoffElapsed,
    /// The session now shows `page`.
    NavigationSucceeded { page: u32 },
    /// Driving the session to `page` failed.
    NavigationFailed { page: u32 },
    /// Cooperative stop was observed.
    StopRequested,
}
