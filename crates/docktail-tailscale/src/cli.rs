// ── Tailscale CLI adapter ──
//
// Single-writer wrapper around the `tailscale` binary. Every mutation of
// local serve/funnel state goes through here; status reads are lenient
// because an empty or unparseable status means "nothing configured", not
// "cycle failure". Invocations are cancellation-aware: dropping the child
// on cancel kills the subprocess.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Error;
use crate::status::{FunnelStatus, ServeStatus};

/// Listener protocol flag accepted by `tailscale serve`.
///
/// TLS-terminated TCP shares `--tcp` here; the distinction only exists on
/// the funnel surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeFlag {
    Http,
    Https,
    Tcp,
}

impl ServeFlag {
    fn as_flag(self) -> &'static str {
        match self {
            Self::Http => "--http",
            Self::Https => "--https",
            Self::Tcp => "--tcp",
        }
    }
}

/// Protocol flag accepted by `tailscale funnel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunnelFlag {
    Https,
    Tcp,
    TlsTerminatedTcp,
}

impl FunnelFlag {
    fn as_flag(self) -> &'static str {
        match self {
            Self::Https => "--https",
            Self::Tcp => "--tcp",
            Self::TlsTerminatedTcp => "--tls-terminated-tcp",
        }
    }
}

/// Handle for invoking the `tailscale` CLI.
#[derive(Clone)]
pub struct ServeCli {
    program: PathBuf,
    socket: Option<PathBuf>,
    cancel: CancellationToken,
}

impl ServeCli {
    /// Create a handle. `socket` is passed as `--socket` when set; `cancel`
    /// aborts in-flight invocations.
    pub fn new(socket: Option<PathBuf>, cancel: CancellationToken) -> Self {
        Self {
            program: PathBuf::from("tailscale"),
            socket,
            cancel,
        }
    }

    /// Same daemon, different cancellation scope.
    ///
    /// Shutdown cleanup runs under a fresh token so drain-and-clear can
    /// finish after the root token has already been cancelled.
    pub fn with_cancel(&self, cancel: CancellationToken) -> Self {
        Self {
            program: self.program.clone(),
            socket: self.socket.clone(),
            cancel,
        }
    }

    // ── Serve ────────────────────────────────────────────────────────

    /// Read the current serve configuration.
    ///
    /// "Nothing configured" and unparseable output both collapse to an empty
    /// status: the reconciler then applies the full desired set, which is
    /// safe because every command is idempotent.
    pub async fn serve_status(&self) -> Result<ServeStatus, Error> {
        let output = match self.run(&["serve", "status", "--json"]).await {
            Ok(output) => output,
            Err(e) if e.is_not_found() => return Ok(ServeStatus::default()),
            Err(e) => return Err(e),
        };

        match ServeStatus::parse(&output) {
            Ok(status) => Ok(status),
            Err(e) => {
                warn!(error = %e, "could not parse serve status, assuming no services");
                Ok(ServeStatus::default())
            }
        }
    }

    /// Configure a listener: `serve --service=<id> --<proto>=<port> <dest>`.
    pub async fn serve(
        &self,
        service_id: &str,
        flag: ServeFlag,
        listen_port: u16,
        destination: &str,
    ) -> Result<(), Error> {
        let service_arg = format!("--service={service_id}");
        let port_arg = format!("{}={listen_port}", flag.as_flag());
        self.run(&["serve", &service_arg, &port_arg, destination])
            .await?;
        Ok(())
    }

    /// Remove a service's configuration without draining.
    ///
    /// Clearing a service that does not exist is success.
    pub async fn serve_clear(&self, service_id: &str) -> Result<(), Error> {
        match self.run(&["serve", "clear", service_id]).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(service = %service_id, "nothing to clear");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Stop accepting new connections for a service while letting in-flight
    /// ones finish. Draining a nonexistent service is expected and ignored.
    pub async fn serve_drain(&self, service_id: &str) -> Result<(), Error> {
        match self.run(&["serve", "drain", service_id]).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(service = %service_id, "nothing to drain");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // ── Funnel ───────────────────────────────────────────────────────

    /// Read the current funnel configuration.
    ///
    /// A failing invocation is normal when funnel has never been enabled on
    /// this node, so every failure mode collapses to "no funnels".
    pub async fn funnel_status(&self) -> Result<FunnelStatus, Error> {
        let output = match self.run(&["funnel", "status", "--json"]).await {
            Ok(output) => output,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                debug!(error = %e, "funnel status unavailable, assuming no funnels");
                return Ok(FunnelStatus::default());
            }
        };

        match FunnelStatus::parse(&output) {
            Ok(status) => Ok(status),
            Err(e) => {
                warn!(error = %e, "could not parse funnel status, assuming no funnels");
                Ok(FunnelStatus::default())
            }
        }
    }

    /// Expose a listener publicly: `funnel --bg --<proto>=<port> <dest>`.
    pub async fn funnel_enable(
        &self,
        flag: FunnelFlag,
        public_port: u16,
        destination: &str,
    ) -> Result<(), Error> {
        let port_arg = format!("{}={public_port}", flag.as_flag());
        self.run(&["funnel", "--bg", &port_arg, destination]).await?;
        Ok(())
    }

    /// Wipe all funnel configuration. The daemon has no per-port removal;
    /// callers re-add survivors in the same cycle.
    pub async fn funnel_reset(&self) -> Result<(), Error> {
        match self.run(&["funnel", "reset"]).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    // ── Invocation ───────────────────────────────────────────────────

    /// Run the CLI with the given arguments, returning combined output.
    ///
    /// Non-zero exit becomes [`Error::Command`] carrying the combined
    /// stdout + stderr for substring classification.
    async fn run(&self, args: &[&str]) -> Result<String, Error> {
        let mut cmd = Command::new(&self.program);
        if let Some(socket) = &self.socket {
            cmd.arg(format!("--socket={}", socket.display()));
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let rendered = format!("tailscale {}", args.join(" "));
        debug!(command = %rendered, "invoking tailscale CLI");

        let child = cmd.spawn()?;

        let output = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            result = child.wait_with_output() => result?,
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            Err(Error::Command {
                command: args.join(" "),
                output: combined,
            })
        }
    }
}
