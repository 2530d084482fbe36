//! Command channel (§3, §5): single-producer, single-consumer.
//!
//! The loop drains this channel non-blockingly at the top of every cycle.
//! `SetAxis`/`SetVelocity` issued before `start()` are buffered by the
//! caller and re-applied across init retries (§3) — that replay is the
//! API collaborator's job; this module only defines the wire format.

use crate::units::AxisKind;

/// One command submitted by the user-facing API collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Select which physical axis geometry a slave uses.
    SetAxis { axis: usize, kind: AxisKind },
    /// Set the profile velocity used for subsequent move duration
    /// calculations, in RPM.
    SetVelocity { axis: usize, rpm: f64 },
    /// Set the profile acceleration, in RPM/s (diagnostic/SDO use only;
    /// the CSP loop itself moves on a time profile, not a ramp limiter).
    SetAccel { axis: usize, rpm_per_s: f64 },
    /// Set the cross-coupling correction gain (§9.5), clamped to `[0, 1]`
    /// by the caller's validation, warned above `0.5`.
    SetCouplingGain { gain: f64 },
    /// Latch the axis's current actual position as mm-zero.
    SetOrigin { axis: usize },
    /// Command an absolute move, in mm, relative to the axis's origin.
    MoveToMm { axis: usize, target_mm: f64 },
    /// Stop all axes and run the shutdown sequence; the loop exits after.
    StopAll,
}

/// Thin wrapper around `std::sync::mpsc` giving the command channel a
/// named, typed surface (§5: SPSC, FIFO within and across cycles).
pub struct CommandSender(std::sync::mpsc::Sender<Command>);

/// Receive side, owned exclusively by the Control Loop.
pub struct CommandReceiver(std::sync::mpsc::Receiver<Command>);

/// Create a new command channel.
pub fn channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = std::sync::mpsc::channel();
    (CommandSender(tx), CommandReceiver(rx))
}

impl CommandSender {
    /// Enqueue a command. Fails only if the loop has exited.
    pub fn enqueue(&self, cmd: Command) -> Result<(), Command> {
        self.0.send(cmd).map_err(|e| e.0)
    }
}

impl Clone for CommandSender {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl CommandReceiver {
    /// Non-blocking drain of every command currently queued (§5: reads
    /// are non-blocking drains, never suspend the loop).
    pub fn drain(&self) -> Vec<Command> {
        let mut out = Vec::new();
        while let Ok(cmd) = self.0.try_recv() {
            out.push(cmd);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_commands_in_fifo_order() {
        let (tx, rx) = channel();
        tx.enqueue(Command::SetOrigin { axis: 0 }).unwrap();
        tx.enqueue(Command::MoveToMm {
            axis: 0,
            target_mm: -50.0,
        })
        .unwrap();
        tx.enqueue(Command::StopAll).unwrap();

        let drained = rx.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0], Command::SetOrigin { axis: 0 });
        assert!(matches!(drained[2], Command::StopAll));
    }

    #[test]
    fn drain_on_empty_channel_is_empty() {
        let (_tx, rx) = channel();
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn enqueue_after_receiver_dropped_fails_cleanly() {
        let (tx, rx) = channel();
        drop(rx);
        assert!(tx.enqueue(Command::StopAll).is_err());
    }
}
