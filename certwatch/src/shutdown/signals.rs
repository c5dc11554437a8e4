#[cfg(unix)]
pub(super) use self::unix::Signals;

#[cfg(windows)]
pub(super) use self::windows::Signals;

#[cfg(unix)]
mod unix {
    use crate::shutdown::RegisterError;
    use tokio::signal::unix::{signal, Signal, SignalKind};

    #[derive(Debug)]
    pub(in crate::shutdown) struct Signals {
        interrupt: Signal,
        terminate: Signal,
    }

    impl Signals {
        pub(in crate::shutdown) fn new() -> Result<Self, RegisterError> {
            let interrupt = signal(SignalKind::interrupt())?;
            let terminate = signal(SignalKind::terminate())?;
            Ok(Self {
                interrupt,
                terminate,
            })
        }

        pub(in crate::shutdown) async fn recv(&mut self) {
            tokio::select! {
                _ = self.interrupt.recv() => {
                    tracing::debug!("Received SIGINT");
                },
                _ = self.terminate.recv() => {
                    tracing::debug!("Received SIGTERM");
                }
            }
        }
    }
}

#[cfg(windows)]
mod windows {
    use crate::shutdown::RegisterError;
    use tokio::signal::windows::{ctrl_break, ctrl_c, CtrlBreak, CtrlC};

    #[derive(Debug)]
    pub(in crate::shutdown) struct Signals {
        ctrl_break: CtrlBreak,
        ctrl_c: CtrlC,
    }

    impl Signals {
        pub(in crate::shutdown) fn new() -> Result<Self, RegisterError> {
            let ctrl_break = ctrl_break()?;
            let ctrl_c = ctrl_c()?;
            Ok(Self { ctrl_break, ctrl_c })
        }

        pub(in crate::shutdown) async fn recv(&mut self) {
            tokio::select! {
                _ = self.ctrl_break.recv() => {
                    tracing::debug!("Received Ctrl-Break");
                },
                _ = self.ctrl_c.recv() => {
                    tracing::debug!("Received Ctrl-C");
                }
            }
        }
    }
}
