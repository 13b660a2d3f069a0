#[cfg(feature = "cli")]
use std::sync::Mutex;
use std::time::Duration;
#[cfg(feature = "cli")]
use std::time::Instant;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

/// One reading taken at the end of a pipeline phase.
#[derive(Debug, Clone)]
pub struct PhaseSample {
    pub phase: String,
    /// Time spent since the previous sample.
    pub duration: Duration,
    pub cpu_usage: f32,
    pub memory_mb: u64,
    /// Memory left for the Poppler and Tesseract child processes.
    pub available_mb: u64,
}

/// The phase that took longest, if any were sampled.
pub fn slowest_phase(samples: &[PhaseSample]) -> Option<&PhaseSample> {
    samples.iter().max_by_key(|s| s.duration)
}

/// Samples our own process between pipeline phases and keeps the readings for a final report.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    start_time: Instant,
    last_mark: Mutex<Instant>,
    samples: Mutex<Vec<PhaseSample>>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let mut system = System::new();
        let pid = sysinfo::get_current_pid().ok();
        if enabled {
            // CPU usage is a delta, so take a baseline now.
            system.refresh_memory();
            if let Some(pid) = pid {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            }
        }

        let now = Instant::now();
        Self {
            system: Mutex::new(system),
            pid,
            start_time: now,
            last_mark: Mutex::new(now),
            samples: Mutex::new(Vec::new()),
            enabled,
        }
    }

    fn sample(&self, phase: &str) -> Option<PhaseSample> {
        if !self.enabled {
            return None;
        }
        let pid = self.pid?;

        let mut system = self.system.lock().ok()?;
        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process = system.process(pid)?;

        let mut last_mark = self.last_mark.lock().ok()?;
        let duration = last_mark.elapsed();
        *last_mark = Instant::now();

        Some(PhaseSample {
            phase: phase.to_string(),
            duration,
            cpu_usage: process.cpu_usage(),
            memory_mb: process.memory() / 1024 / 1024,
            available_mb: system.available_memory() / 1024 / 1024,
        })
    }

    pub fn log_stats(&self, phase: &str) {
        let Some(sample) = self.sample(phase) else {
            return;
        };
        tracing::info!(
            "📊 {} - {:?}, CPU: {:.1}%, Memory: {}MB, Free: {}MB",
            sample.phase,
            sample.duration,
            sample.cpu_usage,
            sample.memory_mb,
            sample.available_mb
        );
        if let Ok(mut samples) = self.samples.lock() {
            samples.push(sample);
        }
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        let Ok(samples) = self.samples.lock() else {
            return;
        };
        let peak = samples.iter().map(|s| s.memory_mb).max().unwrap_or(0);
        tracing::info!(
            "📊 Total: {:?}, Peak Memory: {}MB",
            self.start_time.elapsed(),
            peak
        );
        if let Some(slowest) = slowest_phase(&samples) {
            tracing::info!("📊 Slowest phase: {} ({:?})", slowest.phase, slowest.duration);
        }
    }

    pub fn samples(&self) -> Vec<PhaseSample> {
        self.samples.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// Library builds without the cli feature get a no-op monitor.
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&self, _phase: &str) {}

    pub fn log_final_stats(&self) {}

    pub fn samples(&self) -> Vec<PhaseSample> {
        Vec::new()
    }

    pub fn is_enabled(&self) -> bool {
        false
    }
}
