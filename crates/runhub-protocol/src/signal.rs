//! The fixed set of signal names a client may deliver to a running job.
//!
//! Names follow signal(7). Some entries only exist on a subset of platforms;
//! they are still accepted on the wire and delivery is best-effort.

use std::str::FromStr;

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Abrt,
    Alrm,
    Bus,
    Chld,
    Cld,
    Cont,
    Emt,
    Fpe,
    Hup,
    Ill,
    Info,
    Int,
    Io,
    Iot,
    Kill,
    Lost,
    Pipe,
    Poll,
    Prof,
    Pwr,
    Quit,
    Segv,
    Stkflt,
    Stop,
    Tstp,
    Sys,
    Term,
    Trap,
    Ttin,
    Ttou,
    Unused,
    Urg,
    Usr1,
    Usr2,
    Vtalrm,
    Xcpu,
    Xfsz,
    Winch,
}

impl Signal {
    /// Every accepted signal, in the order clients see them documented.
    pub const ALL: [Signal; 38] = [
        Signal::Abrt,
        Signal::Alrm,
        Signal::Bus,
        Signal::Chld,
        Signal::Cld,
        Signal::Cont,
        Signal::Emt,
        Signal::Fpe,
        Signal::Hup,
        Signal::Ill,
        Signal::Info,
        Signal::Int,
        Signal::Io,
        Signal::Iot,
        Signal::Kill,
        Signal::Lost,
        Signal::Pipe,
        Signal::Poll,
        Signal::Prof,
        Signal::Pwr,
        Signal::Quit,
        Signal::Segv,
        Signal::Stkflt,
        Signal::Stop,
        Signal::Tstp,
        Signal::Sys,
        Signal::Term,
        Signal::Trap,
        Signal::Ttin,
        Signal::Ttou,
        Signal::Unused,
        Signal::Urg,
        Signal::Usr1,
        Signal::Usr2,
        Signal::Vtalrm,
        Signal::Xcpu,
        Signal::Xfsz,
        Signal::Winch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Abrt => "SIGABRT",
            Signal::Alrm => "SIGALRM",
            Signal::Bus => "SIGBUS",
            Signal::Chld => "SIGCHLD",
            Signal::Cld => "SIGCLD",
            Signal::Cont => "SIGCONT",
            Signal::Emt => "SIGEMT",
            Signal::Fpe => "SIGFPE",
            Signal::Hup => "SIGHUP",
            Signal::Ill => "SIGILL",
            Signal::Info => "SIGINFO",
            Signal::Int => "SIGINT",
            Signal::Io => "SIGIO",
            Signal::Iot => "SIGIOT",
            Signal::Kill => "SIGKILL",
            Signal::Lost => "SIGLOST",
            Signal::Pipe => "SIGPIPE",
            Signal::Poll => "SIGPOLL",
            Signal::Prof => "SIGPROF",
            Signal::Pwr => "SIGPWR",
            Signal::Quit => "SIGQUIT",
            Signal::Segv => "SIGSEGV",
            Signal::Stkflt => "SIGSTKFLT",
            Signal::Stop => "SIGSTOP",
            Signal::Tstp => "SIGTSTP",
            Signal::Sys => "SIGSYS",
            Signal::Term => "SIGTERM",
            Signal::Trap => "SIGTRAP",
            Signal::Ttin => "SIGTTIN",
            Signal::Ttou => "SIGTTOU",
            Signal::Unused => "SIGUNUSED",
            Signal::Urg => "SIGURG",
            Signal::Usr1 => "SIGUSR1",
            Signal::Usr2 => "SIGUSR2",
            Signal::Vtalrm => "SIGVTALRM",
            Signal::Xcpu => "SIGXCPU",
            Signal::Xfsz => "SIGXFSZ",
            Signal::Winch => "SIGWINCH",
        }
    }
}

impl FromStr for Signal {
    type Err = ProtocolError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == name)
            .ok_or_else(|| ProtocolError::UnknownSignal {
                name: name.to_string(),
            })
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_parses_back() {
        for signal in Signal::ALL {
            assert_eq!(signal.as_str().parse::<Signal>().unwrap(), signal);
        }
    }

    #[test]
    fn test_rejects_unknown_and_lowercase_names() {
        assert!("SIGFOO".parse::<Signal>().is_err());
        assert!("sigterm".parse::<Signal>().is_err());
        assert!("TERM".parse::<Signal>().is_err());
    }
}
