use crate::resolve::backoff_seconds;
use crate::{Effect, HarvestState, Msg, NavReason, Pass, Phase};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages that arrive after the run reached a terminal phase are ignored.
pub fn update(mut state: HarvestState, msg: Msg) -> (HarvestState, Vec<Effect>) {
    if state.phase.is_terminal() {
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::PagesDetected {
            total,
            current,
            policy,
        } => {
            state.policy = policy;
            state.total_pages = if total == 0 {
                policy.default_max_pages
            } else {
                total
            };
            state.current_page = current.min(state.total_pages.saturating_add(1));
            state.finished = false;
            state.pass = Pass::Main;
            state.session_recoveries = 0;

            let resume = state.last_run_page;
            if resume > state.current_page && resume <= state.total_pages {
                state.phase = Phase::Navigating;
                vec![Effect::NavigateTo {
                    page: resume,
                    reason: NavReason::Resume,
                }]
            } else if state.current_page > state.total_pages {
                finish(&mut state)
            } else {
                state.phase = Phase::Extracting;
                vec![Effect::ProcessPage {
                    page: state.current_page,
                }]
            }
        }
        Msg::ListFetched { .. } => {
            state.phase = Phase::ProcessingItems;
            Vec::new()
        }
        Msg::ListFailed { page } => {
            state.record_rework(page);
            next_page(&mut state)
        }
        Msg::PageProcessed {
            page,
            items,
            unresolved,
        } => {
            if unresolved > 0 {
                state.record_rework(page);
            }
            match state.pass {
                Pass::Rework => next_page(&mut state),
                // An empty list counts as all-failed.
                Pass::Main if unresolved >= items => {
                    state.consecutive_all_fail_pages =
                        state.consecutive_all_fail_pages.saturating_add(1);
                    state.phase = Phase::Backoff;
                    vec![
                        Effect::SaveProgress,
                        Effect::Backoff {
                            seconds: backoff_seconds(state.consecutive_all_fail_pages),
                        },
                    ]
                }
                Pass::Main => {
                    state.consecutive_all_fail_pages = 0;
                    next_page(&mut state)
                }
            }
        }
        Msg::BackoffElapsed => {
            if state.phase == Phase::Backoff {
                next_page(&mut state)
            } else {
                Vec::new()
            }
        }
        Msg::NavigationSucceeded { page } => {
            state.phase = Phase::Extracting;
            match state.pass {
                Pass::Main => {
                    // Returning to the same page after a recovery is not progress.
                    if page != state.current_page {
                        state.session_recoveries = 0;
                    }
                    state.current_page = page;
                    vec![Effect::SaveProgress, Effect::ProcessPage { page }]
                }
                Pass::Rework => {
                    state.session_recoveries = 0;
                    vec![Effect::ProcessPage { page }]
                }
            }
        }
        Msg::NavigationFailed { page } => {
            state.session_recoveries = state.session_recoveries.saturating_add(1);
            if state.session_recoveries > state.policy.max_session_recoveries {
                state.phase = Phase::Stopped;
                vec![
                    Effect::SaveProgress,
                    Effect::GiveUp {
                        recoveries: state.session_recoveries,
                    },
                ]
            } else {
                state.phase = Phase::Navigating;
                // The main pass retries the page it was on, not the one it
                // was heading to.
                let target = match state.pass {
                    Pass::Main => state.current_page,
                    Pass::Rework => page,
                };
                vec![
                    Effect::ReopenSession,
                    Effect::NavigateTo {
                        page: target,
                        reason: NavReason::Retry,
                    },
                ]
            }
        }
        Msg::StopRequested => {
            state.phase = Phase::Stopped;
            vec![Effect::SaveProgress]
        }
    };

    (state, effects)
}

fn next_page(state: &mut HarvestState) -> Vec<Effect> {
    match state.pass {
        Pass::Main => {
            let next = state.current_page.saturating_add(1);
            if next > state.total_pages {
                state.current_page = next;
                end_main_pass(state)
            } else {
                state.phase = Phase::Navigating;
                vec![
                    Effect::SaveProgress,
                    Effect::NavigateTo {
                        page: next,
                        reason: NavReason::Advance,
                    },
                ]
            }
        }
        Pass::Rework => {
            if !state.rework_queue.is_empty() {
                state.rework_queue.remove(0);
            }
            match state.rework_queue.first().copied() {
                Some(page) => {
                    state.phase = Phase::Navigating;
                    vec![
                        Effect::SaveProgress,
                        Effect::NavigateTo {
                            page,
                            reason: NavReason::Rework,
                        },
                    ]
                }
                None => finish(state),
            }
        }
    }
}

fn end_main_pass(state: &mut HarvestState) -> Vec<Effect> {
    if !state.policy.rework_pass || state.rework_pages.is_empty() {
        return finish(state);
    }
    state.rework_queue = state.drain_rework_pages();
    state.pass = Pass::Rework;
    state.phase = Phase::Navigating;
    let page = state.rework_queue[0];
    vec![
        Effect::SaveProgress,
        Effect::NavigateTo {
            page,
            reason: NavReason::Rework,
        },
    ]
}

fn finish(state: &mut HarvestState) -> Vec<Effect> {
    state.finished = true;
    state.phase = Phase::Completed;
    vec![Effect::SaveProgress, Effect::Finish]
}
