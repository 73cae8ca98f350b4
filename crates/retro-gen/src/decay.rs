//! Tau decays through an external engine.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use retro_core::constants::{is_invisible, tau_momentum, TAU_PID};
use retro_core::vector::norm;
use retro_core::{ErrorInfo, RetroError, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Decay product: PDG identifier and momentum (GeV/c) in the local frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayProduct {
    /// PDG particle identifier.
    pub pid: i32,
    /// Momentum, in GeV/c.
    pub momentum: Vec3,
}

impl From<(i32, Vec3)> for DecayProduct {
    fn from((pid, momentum): (i32, Vec3)) -> Self {
        Self { pid, momentum }
    }
}

/// Result of one decay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayOutcome {
    /// Decay products.
    pub products: Vec<DecayProduct>,
    /// Opaque marker of the engine random state before the decay.
    pub state: u64,
}

/// Tau decay engine. Implementations hold a long lived context, created once
/// per run, and release it in [`shutdown`](DecayEngine::shutdown).
pub trait DecayEngine {
    /// Decays a particle with the given momentum (GeV/c) and polarisation.
    fn decay(
        &mut self,
        pid: i32,
        momentum: &Vec3,
        polarisation: &Vec3,
    ) -> Result<DecayOutcome, RetroError>;

    /// Releases the engine.
    fn shutdown(&mut self) -> Result<(), RetroError> {
        Ok(())
    }
}

/// Tau decay retained for an event.
#[derive(Debug, Clone, PartialEq)]
pub struct TauDecay {
    /// Decay products.
    pub products: Vec<DecayProduct>,
    /// Engine random state marker.
    pub state: u64,
    /// Energy available to the shower, in GeV.
    pub shower_energy: f64,
    /// Number of decays drawn.
    pub attempts: u32,
}

/// Energy carried by the shower forming products, in GeV.
pub fn shower_energy(products: &[DecayProduct]) -> f64 {
    products
        .iter()
        .filter(|product| !is_invisible(product.pid))
        .map(|product| norm(&product.momentum))
        .sum()
}

/// Decays a tau of the given energy (GeV) moving along the unit vector
/// `direction`, polarised along it, until some energy goes to the shower.
pub fn decay_tau(
    engine: &mut dyn DecayEngine,
    energy: f64,
    direction: &Vec3,
    max_attempts: u32,
) -> Result<TauDecay, RetroError> {
    let p = tau_momentum(energy);
    let momentum = [p * direction[0], p * direction[1], p * direction[2]];
    for attempt in 1..=max_attempts {
        let outcome = engine.decay(TAU_PID, &momentum, direction)?;
        let shower = shower_energy(&outcome.products);
        if shower > 0.0 {
            return Ok(TauDecay {
                products: outcome.products,
                state: outcome.state,
                shower_energy: shower,
                attempts: attempt,
            });
        }
    }
    Err(RetroError::Decay(
        ErrorInfo::new("no-visible-decay", "the tau never decayed to a visible shower")
            .with_context("attempts", max_attempts.to_string())
            .with_context("energy", energy.to_string()),
    ))
}

#[derive(Serialize)]
struct DecayRequest<'a> {
    pid: i32,
    momentum: &'a Vec3,
    polarisation: &'a Vec3,
}

#[derive(Deserialize)]
struct DecayResponse {
    code: i32,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    products: Vec<(i32, Vec3)>,
    #[serde(default)]
    state: u64,
}

/// Decay engine running as a child process.
///
/// The process is started as `command args... --seed S` and answers one
/// JSON line per request on its standard output. Requests are
/// `{"pid", "momentum", "polarisation"}`. Responses are
/// `{"code", "message", "products": [[pid, [px, py, pz]], ...], "state"}`
/// and a non zero code aborts the run.
#[derive(Debug)]
pub struct ProcessDecayEngine {
    command: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl ProcessDecayEngine {
    /// Spawns the engine process.
    pub fn initialise(command: &str, args: &[String], seed: u64) -> Result<Self, RetroError> {
        let mut child = Command::new(command)
            .args(args)
            .arg("--seed")
            .arg(seed.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| engine_error("engine-spawn", err.to_string(), command))?;
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| engine_error("engine-spawn", "no stdout pipe", command))?;
        debug!(command, seed, "started decay engine");
        Ok(Self {
            command: command.to_string(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
            line: String::new(),
        })
    }
}

impl DecayEngine for ProcessDecayEngine {
    fn decay(
        &mut self,
        pid: i32,
        momentum: &Vec3,
        polarisation: &Vec3,
    ) -> Result<DecayOutcome, RetroError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| engine_error("engine-closed", "engine was shut down", &self.command))?;
        let mut request = serde_json::to_string(&DecayRequest {
            pid,
            momentum,
            polarisation,
        })
        .map_err(|err| RetroError::Serde(ErrorInfo::new("decay-request", err.to_string())))?;
        request.push('\n');
        stdin
            .write_all(request.as_bytes())
            .and_then(|_| stdin.flush())
            .map_err(|err| engine_error("engine-write", err.to_string(), &self.command))?;

        self.line.clear();
        let read = self
            .stdout
            .read_line(&mut self.line)
            .map_err(|err| engine_error("engine-read", err.to_string(), &self.command))?;
        if read == 0 {
            return Err(engine_error(
                "engine-closed",
                "engine closed its output",
                &self.command,
            ));
        }
        let response: DecayResponse = serde_json::from_str(self.line.trim_end()).map_err(|err| {
            RetroError::Decay(
                ErrorInfo::new("engine-response", err.to_string())
                    .with_context("command", self.command.clone())
                    .with_context("line", self.line.trim_end().to_string()),
            )
        })?;
        if response.code != 0 {
            let message = response
                .message
                .unwrap_or_else(|| "decay engine failure".to_string());
            return Err(RetroError::Decay(
                ErrorInfo::new("engine-failure", message)
                    .with_context("command", self.command.clone())
                    .with_context("engine_code", response.code.to_string()),
            ));
        }
        Ok(DecayOutcome {
            products: response.products.into_iter().map(Into::into).collect(),
            state: response.state,
        })
    }

    fn shutdown(&mut self) -> Result<(), RetroError> {
        // Closing stdin asks the engine to exit.
        if self.stdin.take().is_none() {
            return Ok(());
        }
        let status = self
            .child
            .wait()
            .map_err(|err| engine_error("engine-wait", err.to_string(), &self.command))?;
        debug!(command = %self.command, %status, "decay engine exited");
        if !status.success() {
            return Err(RetroError::Decay(
                ErrorInfo::new("engine-exit", format!("decay engine exited with {status}"))
                    .with_context("command", self.command.clone()),
            ));
        }
        Ok(())
    }
}

impl Drop for ProcessDecayEngine {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn engine_error(code: &str, message: impl Into<String>, command: &str) -> RetroError {
    RetroError::Decay(ErrorInfo::new(code, message).with_context("command", command))
}
