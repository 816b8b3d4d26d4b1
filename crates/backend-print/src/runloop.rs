// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print run loop (§4.3): copies spooler print data to the device while
// servicing back-channel reads, side-channel requests, and a periodic SNMP
// poll. Scheduling is expressed with `tokio::select!` over a current-thread
// runtime, standing in for the original `select(2)` call; the underlying
// device/print handles are modeled behind the [`RawIo`] trait so the
// algorithm is testable without real file descriptors.

use std::io;
use std::time::Duration;

use backend_core::error::Result;

use crate::report;

const PRINT_BUFFER_SIZE: usize = 8192;
const BACK_CHANNEL_READ_SIZE: usize = 1024;
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const LOOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Non-blocking byte source/sink. Real backends implement this over a raw
/// fd; tests implement it over an in-memory queue of canned results.
pub trait RawIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// Classification of an I/O error the loop body reacts to differently
/// (§4.3 step 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// `EAGAIN`/`EWOULDBLOCK`/`EINTR`/`ENOTTY` — retry silently.
    Transient,
    /// `ENXIO` — device gone, enter the offline transition.
    Offline,
    /// `ENOSPC` — out of media.
    NoSpace,
    /// Anything else — abort the job.
    Fatal,
}

pub fn classify_error(err: &io::Error) -> ErrorClass {
    if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) {
        return ErrorClass::Transient;
    }
    match err.raw_os_error() {
        Some(code) if code == libc::ENXIO => ErrorClass::Offline,
        Some(code) if code == libc::ENOSPC => ErrorClass::NoSpace,
        Some(code) if code == libc::ENOTTY => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

/// Result of one `step()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Keep looping.
    Continue,
    /// Print fd reached EOF with the buffer fully drained; job is done.
    Done,
    /// A fatal device error aborted the job.
    Aborted,
}

/// Tracks the state that must survive across loop iterations: the print
/// buffer, offline/media-empty flags, and the next poll due time (expressed
/// as a tick counter rather than wall-clock so the algorithm is testable
/// deterministically).
pub struct RunLoopState {
    buffer: Vec<u8>,
    write_offset: usize,
    pub total_written: u64,
    pub bidi_in_use: bool,
    pub offline: bool,
    pub media_empty: bool,
    print_eof: bool,
}

impl RunLoopState {
    pub fn new(bidi: bool) -> Self {
        RunLoopState {
            buffer: Vec::new(),
            write_offset: 0,
            total_written: 0,
            bidi_in_use: bidi,
            offline: false,
            media_empty: false,
            print_eof: false,
        }
    }

    fn buffer_empty(&self) -> bool {
        self.write_offset >= self.buffer.len()
    }

    /// One loop iteration's worth of work against already-ready handles
    /// (§4.3 steps 6-8). The caller is responsible for deciding which of
    /// `print`/`device` are actually ready, mirroring the original's
    /// dynamically composed `select` ready set.
    pub fn step(
        &mut self,
        print_ready: bool,
        device_read_ready: bool,
        device_write_ready: bool,
        print: &mut impl RawIo,
        device: &mut impl RawIo,
    ) -> StepOutcome {
        if self.bidi_in_use && device_read_ready {
            let mut back_channel = [0u8; BACK_CHANNEL_READ_SIZE];
            match device.read(&mut back_channel) {
                Ok(0) => self.bidi_in_use = false,
                Ok(_n) => {}
                Err(_) => self.bidi_in_use = false,
            }
        }

        if self.buffer_empty() && print_ready && !self.print_eof {
            let mut chunk = vec![0u8; PRINT_BUFFER_SIZE];
            match print.read(&mut chunk) {
                Ok(0) => self.print_eof = true,
                Ok(n) => {
                    chunk.truncate(n);
                    self.buffer = chunk;
                    self.write_offset = 0;
                }
                Err(err) => match classify_error(&err) {
                    ErrorClass::Transient => {}
                    _ => return StepOutcome::Aborted,
                },
            }
        }

        if !self.buffer_empty() && device_write_ready {
            match device.write(&self.buffer[self.write_offset..]) {
                Ok(n) => {
                    self.write_offset += n;
                    self.total_written += n as u64;
                    if self.offline {
                        self.offline = false;
                        report::state('-', "offline-report");
                        report::info_line("The printer is now connected.");
                    }
                    if self.media_empty {
                        self.media_empty = false;
                        report::state('-', "media-empty-warning");
                    }
                }
                Err(err) => match classify_error(&err) {
                    ErrorClass::Transient => {}
                    ErrorClass::Offline => {
                        if !self.offline {
                            self.offline = true;
                            report::state('+', "offline-report");
                            report::info_line("The printer is not connected.");
                        }
                    }
                    ErrorClass::NoSpace => {
                        if !self.media_empty {
                            self.media_empty = true;
                            report::state('+', "media-empty-warning");
                            report::debug_line("Out of paper");
                        }
                    }
                    ErrorClass::Fatal => {
                        report::error_line(&err.to_string());
                        return StepOutcome::Aborted;
                    }
                },
            }
        }

        if self.print_eof && self.buffer_empty() {
            return StepOutcome::Done;
        }
        StepOutcome::Continue
    }
}

/// `Drain(print_fd, device_fd)` (§4.3 "Drain variant"): steps 7+8 only, with
/// a tight non-blocking retry. The continuation check is the corrected
/// `err != WouldBlock && err != Interrupted` form — the original C source
/// wrote this as an `||`, a tautology that never actually stopped the loop
/// on a genuine hard error.
pub fn drain(print: &mut impl RawIo, device: &mut impl RawIo) -> Result<u64> {
    let mut buffer = Vec::new();
    let mut offset = 0usize;
    let mut total = 0u64;

    loop {
        if offset >= buffer.len() {
            let mut chunk = vec![0u8; PRINT_BUFFER_SIZE];
            match print.read(&mut chunk) {
                Ok(0) => return Ok(total),
                Ok(n) => {
                    chunk.truncate(n);
                    buffer = chunk;
                    offset = 0;
                }
                Err(err) => {
                    let class = classify_error(&err);
                    if class != ErrorClass::Transient {
                        return Ok(total);
                    }
                    continue;
                }
            }
        }

        match device.write(&buffer[offset..]) {
            Ok(n) => {
                offset += n;
                total += n as u64;
            }
            Err(err) => {
                let class = classify_error(&err);
                if class != ErrorClass::Transient {
                    return Ok(total);
                }
            }
        }
    }
}

/// Drives the full run loop (§4.3) as an async task: one `tokio::select!`
/// per iteration deciding which handles to poll, a periodic SNMP poll every
/// [`POLL_INTERVAL`], and SIGTERM-triggered shutdown. `poll_supplies` is
/// invoked on each tick; a hard failure disables further polling for the
/// remainder of the job, matching step 9's "set next-poll to infinity".
pub async fn run(
    mut state: RunLoopState,
    mut print: impl RawIo,
    mut device: impl RawIo,
    mut poll_supplies: impl FnMut() -> Result<()>,
) -> Result<u64> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|e| backend_core::error::BackendError::RunLoop(e.to_string()))?;
    let mut poll_timer = tokio::time::interval(POLL_INTERVAL);
    let mut polling_enabled = true;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                report::info_line("received termination signal");
                break;
            }
            _ = poll_timer.tick(), if polling_enabled => {
                if poll_supplies().is_err() {
                    polling_enabled = false;
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(10)) => {
                let bidi = state.bidi_in_use;
                let outcome = state.step(true, bidi, true, &mut print, &mut device);
                match outcome {
                    StepOutcome::Continue => {}
                    StepOutcome::Done => break,
                    StepOutcome::Aborted => {
                        return Err(backend_core::error::BackendError::RunLoop(
                            "device write failed".to_string(),
                        ));
                    }
                }
            }
        }
    }

    Ok(state.total_written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// A scripted [`RawIo`]: reads and writes are driven from fixed queues
    /// of canned `io::Result`s, so the drain/step algorithms can be
    /// exercised without real file descriptors.
    struct ScriptedIo {
        reads: VecDeque<io::Result<Vec<u8>>>,
        writes: VecDeque<io::Result<usize>>,
    }

    impl ScriptedIo {
        fn new() -> Self {
            ScriptedIo { reads: VecDeque::new(), writes: VecDeque::new() }
        }
    }

    impl RawIo for ScriptedIo {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match self.writes.pop_front() {
                Some(Ok(n)) => Ok(n.min(buf.len())),
                Some(Err(e)) => Err(e),
                None => Ok(buf.len()),
            }
        }
    }

    fn would_block() -> io::Error {
        io::Error::from(io::ErrorKind::WouldBlock)
    }

    fn enxio() -> io::Error {
        io::Error::from_raw_os_error(libc::ENXIO)
    }

    fn enospc() -> io::Error {
        io::Error::from_raw_os_error(libc::ENOSPC)
    }

    #[test]
    fn classify_error_maps_transient_offline_and_nospace() {
        assert_eq!(classify_error(&would_block()), ErrorClass::Transient);
        assert_eq!(classify_error(&enxio()), ErrorClass::Offline);
        assert_eq!(classify_error(&enospc()), ErrorClass::NoSpace);
        assert_eq!(
            classify_error(&io::Error::from_raw_os_error(libc::EPERM)),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn drain_stops_cleanly_on_print_eof() {
        let mut print = ScriptedIo::new();
        print.reads.push_back(Ok(b"hello".to_vec()));
        print.reads.push_back(Ok(Vec::new()));
        let mut device = ScriptedIo::new();
        device.writes.push_back(Ok(5));

        let written = drain(&mut print, &mut device).unwrap();
        assert_eq!(written, 5);
    }

    #[test]
    fn drain_stops_on_hard_read_error_not_on_transient() {
        let mut print = ScriptedIo::new();
        print.reads.push_back(Err(would_block()));
        print.reads.push_back(Err(io::Error::from_raw_os_error(libc::EIO)));
        let mut device = ScriptedIo::new();

        let written = drain(&mut print, &mut device).unwrap();
        assert_eq!(written, 0);
    }

    #[test]
    fn drain_retries_transient_write_errors() {
        let mut print = ScriptedIo::new();
        print.reads.push_back(Ok(b"data".to_vec()));
        print.reads.push_back(Ok(Vec::new()));
        let mut device = ScriptedIo::new();
        device.writes.push_back(Err(would_block()));
        device.writes.push_back(Ok(4));

        let written = drain(&mut print, &mut device).unwrap();
        assert_eq!(written, 4);
    }

    #[test]
    fn step_enters_and_clears_offline_state() {
        let mut state = RunLoopState::new(false);
        let mut print = ScriptedIo::new();
        print.reads.push_back(Ok(b"x".to_vec()));
        let mut device = ScriptedIo::new();
        device.writes.push_back(Err(enxio()));
        device.writes.push_back(Ok(1));

        let outcome = state.step(true, false, true, &mut print, &mut device);
        assert_eq!(outcome, StepOutcome::Continue);
        assert!(state.offline);

        let outcome = state.step(false, false, true, &mut print, &mut device);
        assert_eq!(outcome, StepOutcome::Continue);
        assert!(!state.offline);
    }

    #[test]
    fn step_reports_media_empty_once_until_cleared() {
        let mut state = RunLoopState::new(false);
        let mut print = ScriptedIo::new();
        print.reads.push_back(Ok(b"x".to_vec()));
        let mut device = ScriptedIo::new();
        device.writes.push_back(Err(enospc()));
        device.writes.push_back(Ok(1));

        state.step(true, false, true, &mut print, &mut device);
        assert!(state.media_empty);
        state.step(false, false, true, &mut print, &mut device);
        assert!(!state.media_empty);
    }

    #[test]
    fn step_reaches_done_after_eof_and_drained_buffer() {
        let mut state = RunLoopState::new(false);
        let mut print = ScriptedIo::new();
        print.reads.push_back(Ok(b"ab".to_vec()));
        print.reads.push_back(Ok(Vec::new()));
        let mut device = ScriptedIo::new();
        device.writes.push_back(Ok(2));

        let first = state.step(true, false, true, &mut print, &mut device);
        assert_eq!(first, StepOutcome::Continue);
        let second = state.step(true, false, false, &mut print, &mut device);
        assert_eq!(second, StepOutcome::Done);
    }
}
