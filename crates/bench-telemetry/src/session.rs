//! Device session: pairs probe initialization with exactly one shutdown

use crate::probe::DeviceProbe;
use crate::Result;
use bench_core::ResourceSnapshot;

use tracing::{error, info};

/// An initialized probe whose device handles are released exactly once.
///
/// `finalize` releases the handles explicitly; dropping the session releases
/// them on every other exit path (task cancellation, panic unwinding, runtime
/// teardown). Once finalized, further calls are no-ops.
pub struct DeviceSession {
    probe: Option<Box<dyn DeviceProbe>>,
    backend: &'static str,
}

impl DeviceSession {
    /// Run the probe's one-time initialization and take ownership of it
    pub async fn open(mut probe: Box<dyn DeviceProbe>) -> Result<Self> {
        let backend = probe.name();
        info!("Opening {} device session", backend);
        probe.initialize().await?;

        Ok(Self {
            probe: Some(probe),
            backend,
        })
    }

    /// Take one sample; a finalized session reports every metric unavailable
    pub fn sample(&mut self) -> ResourceSnapshot {
        match self.probe.as_mut() {
            Some(probe) => probe.sample(),
            None => ResourceSnapshot::unavailable(),
        }
    }

    /// Release device handles. Returns `true` only on the call that released them.
    pub fn finalize(&mut self) -> bool {
        let Some(mut probe) = self.probe.take() else {
            return false;
        };

        info!("Finalizing {} device session", self.backend);
        if let Err(e) = probe.shutdown() {
            error!("Failed to release {} device handles: {}", self.backend, e);
        }
        true
    }

    pub fn is_finalized(&self) -> bool {
        self.probe.is_none()
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProbe;

    #[tokio::test]
    async fn test_finalize_runs_once() {
        let probe = MockProbe::new();
        let counters = probe.counters();

        let mut session = DeviceSession::open(Box::new(probe)).await.unwrap();
        assert_eq!(counters.initialized(), 1);

        assert!(session.finalize());
        assert!(!session.finalize());
        assert!(session.is_finalized());
        drop(session);

        assert_eq!(counters.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_drop_finalizes() {
        let probe = MockProbe::new();
        let counters = probe.counters();

        let session = DeviceSession::open(Box::new(probe)).await.unwrap();
        drop(session);

        assert_eq!(counters.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_panic_unwind_finalizes() {
        let probe = MockProbe::new();
        let counters = probe.counters();
        let session = DeviceSession::open(Box::new(probe)).await.unwrap();

        let task = tokio::spawn(async move {
            let _session = session;
            panic!("fault while holding the device session");
        });
        assert!(task.await.unwrap_err().is_panic());

        assert_eq!(counters.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_sample_after_finalize_is_unavailable() {
        let mut session = DeviceSession::open(Box::new(MockProbe::new())).await.unwrap();
        assert!(session.sample().gpu_free_memory.is_some());

        session.finalize();
        assert!(session.sample().gpu_unavailable());
    }
}
