//! Application close codes for interactive sessions.


/// Close codes sent when the server ends a `/connect` session.
///
/// The numeric values are part of the public contract; clients branch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// A second `init` arrived after the job was resolved.
    AlreadyInitialized,
    /// No `init` arrived inside the initialization window.
    InitializationTimeout,
    /// An `error` message was sent immediately before closing.
    NotifiedError,
    /// `data` or `signal` arrived before `init`.
    NotInitialized,
    /// A `data` message targeted a stream other than stdin.
    StdinOnly,
    /// A `signal` message named a signal outside the supported set.
    InvalidSignal,
    /// The job ran to completion.
    JobCompleted,
}

impl CloseCode {
    /// All close codes, in numeric order.
    pub const ALL: [CloseCode; 7] = [
        CloseCode::AlreadyInitialized,
        CloseCode::InitializationTimeout,
        CloseCode::NotifiedError,
        CloseCode::NotInitialized,
        CloseCode::StdinOnly,
        CloseCode::InvalidSignal,
        CloseCode::JobCompleted,
    ];

    /// The numeric WebSocket close code.
    pub fn code(self) -> u16 {
        match self {
            CloseCode::AlreadyInitialized => 4000,
            CloseCode::InitializationTimeout => 4001,
            CloseCode::NotifiedError => 4002,
            CloseCode::NotInitialized => 4003,
            CloseCode::StdinOnly => 4004,
            CloseCode::InvalidSignal => 4005,
            CloseCode::JobCompleted => 4999,
        }
    }

    /// The close reason text sent alongside the code.
    pub fn reason(self) -> &'static str {
        match self {
            CloseCode::AlreadyInitialized => "Already Initialized",
            CloseCode::InitializationTimeout => "Initialization Timeout",
            CloseCode::NotifiedError => "Notified Error",
            CloseCode::NotInitialized => "Not yet initialized",
            CloseCode::StdinOnly => "Can only write to stdin",
            CloseCode::InvalidSignal => "Invalid signal",
            CloseCode::JobCompleted => "Job Completed",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let codes: Vec<u16> = CloseCode::ALL.iter().map(|c| c.code()).collect();
        assert_eq!(codes, vec![4000, 4001, 4002, 4003, 4004, 4005, 4999]);
    }
}
