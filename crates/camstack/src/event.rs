// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Readiness notifiers and a `poll(2)` based dispatcher.
//!
//! Video devices own an [`EventNotifier`] on their descriptor and enable it
//! only while buffers are in flight. The application loop collects the
//! notifiers, waits on them with [`EventDispatcher::wait`] and hands each
//! ready descriptor back to its owner. No thread is spawned here.

use crate::Error;
use log::{debug, warn};
use std::{io, os::fd::RawFd, time::Duration};

/// The readiness condition a notifier waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// POLLIN, used by capture devices
    Read,
    /// POLLOUT, used by output devices
    Write,
}

impl EventKind {
    fn poll_events(self) -> libc::c_short {
        match self {
            EventKind::Read => libc::POLLIN,
            EventKind::Write => libc::POLLOUT,
        }
    }
}

/// Readiness registration for one descriptor. Starts disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventNotifier {
    fd: RawFd,
    kind: EventKind,
    enabled: bool,
}

impl EventNotifier {
    pub fn new(fd: RawFd, kind: EventKind) -> Self {
        Self {
            fd,
            kind,
            enabled: false,
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

pub struct EventDispatcher;

impl EventDispatcher {
    /// Wait until at least one enabled notifier is ready or `timeout` expires.
    ///
    /// Returns the ready descriptors in the order the notifiers were given.
    /// A `None` timeout waits indefinitely, unless no notifier is enabled in
    /// which case it returns immediately. An interrupted wait returns an
    /// empty set.
    pub fn wait(notifiers: &[EventNotifier], timeout: Option<Duration>) -> Result<Vec<RawFd>, Error> {
        let mut pollfds: Vec<libc::pollfd> = notifiers
            .iter()
            .filter(|n| n.enabled)
            .map(|n| libc::pollfd {
                fd: n.fd,
                events: n.kind.poll_events(),
                revents: 0,
            })
            .collect();

        if pollfds.is_empty() && timeout.is_none() {
            return Ok(Vec::new());
        }

        let timeout_ms: libc::c_int = match timeout {
            Some(t) => libc::c_int::try_from(t.as_millis()).unwrap_or(libc::c_int::MAX),
            None => -1,
        };

        // SAFETY: pollfds is a valid, exclusively borrowed array of
        // pollfds.len() entries for the duration of the call.
        let ret = unsafe {
            libc::poll(
                pollfds.as_mut_ptr(),
                pollfds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                debug!("poll interrupted");
                return Ok(Vec::new());
            }
            return Err(err.into());
        }

        let mut ready = Vec::new();
        for pfd in &pollfds {
            if pfd.revents & libc::POLLNVAL != 0 {
                warn!("Notifier for fd {} is not valid", pfd.fd);
                continue;
            }
            if pfd.revents & (pfd.events | libc::POLLERR) != 0 {
                ready.push(pfd.fd);
            }
        }
        Ok(ready)
    }
}
