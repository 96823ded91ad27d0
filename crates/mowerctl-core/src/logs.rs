use crate::CoreError;
use mowerctl_runtime::ContainerRuntime;
use std::process::Child;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lines of history each follower starts with.
pub const DEFAULT_TAIL: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowReport {
    pub followed: usize,
    pub cancelled: bool,
}

/// Fans in the output of every running managed instance.
///
/// One follower process per instance; all of them are cancelled together.
pub struct LogAggregator<'a> {
    runtime: &'a dyn ContainerRuntime,
    family: String,
    tail: usize,
    poll: Duration,
}

impl<'a> LogAggregator<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, family: &str) -> Self {
        Self {
            runtime,
            family: family.to_owned(),
            tail: DEFAULT_TAIL,
            poll: Duration::from_millis(100),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Follow every running instance until all followers end or `cancelled`
    /// returns true, in which case every follower is killed.
    pub fn follow_all(&self, cancelled: &dyn Fn() -> bool) -> Result<FollowReport, CoreError> {
        let instances = self.runtime.list(&self.family, false)?;
        if instances.is_empty() {
            info!("no running {} instances", self.family);
            return Ok(FollowReport {
                followed: 0,
                cancelled: false,
            });
        }

        let mut children: Vec<Child> = Vec::with_capacity(instances.len());
        for inst in &instances {
            match self.runtime.follow_logs(&inst.id, self.tail) {
                Ok(child) => {
                    debug!("following {}", inst.short_id());
                    children.push(child);
                }
                Err(e) => {
                    kill_all(&mut children);
                    return Err(e.into());
                }
            }
        }

        let followed = children.len();
        let mut finished = vec![false; followed];
        loop {
            if cancelled() {
                kill_all(&mut children);
                return Ok(FollowReport {
                    followed,
                    cancelled: true,
                });
            }

            for (child, done) in children.iter_mut().zip(finished.iter_mut()) {
                if !*done && child.try_wait()?.is_some() {
                    *done = true;
                }
            }
            if finished.iter().all(|d| *d) {
                return Ok(FollowReport {
                    followed,
                    cancelled: false,
                });
            }
            std::thread::sleep(self.poll);
        }
    }
}

fn kill_all(children: &mut [Child]) {
    for child in children.iter_mut() {
        if let Err(e) = child.kill() {
            // Already exited.
            debug!("kill follower {}: {e}", child.id());
        }
    }
    for child in children.iter_mut() {
        if let Err(e) = child.wait() {
            warn!("reaping follower {}: {e}", child.id());
        }
    }
}
