#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Drive the session to `page`.
    NavigateTo { page: u32, reason: NavReason },
    /// Extract the list on `page` and process its items.
    ProcessPage { page: u32 },
    /// Sleep, then report `Msg::BackoffElapsed`.
    Backoff { seconds: u64 },
    /// Tear the driver session down and start a fresh one.
    ReopenSession,
    /// Write progress to the job directory.
    SaveProgress,
    /// All pages are done.
    Finish,
    /// Too many consecutive session recoveries.
    GiveUp { recoveries: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavReason {
    /// Jump to where the previous run stopped.
    Resume,
    /// Move on to the next page.
    Advance,
    /// Return to the same page after a session recovery.
    Retry,
    /// Revisit a page recorded for rework.
    Rework,
}
