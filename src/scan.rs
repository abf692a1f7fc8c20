//! Ranging sensor sweep reduction
//!
//! Each sweep is reduced to one number: the distance to the nearest return.
//! Sweeps are never combined; every call replaces the previous estimate.

/// One ranging sample as delivered by the sensor driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSample {
    /// Distance to the return
    pub distance: f32,
    /// Signal intensity
    pub intensity: f32,
    /// Beam angle
    pub angle: f32,
}

impl ScanSample {
    pub fn new(distance: f32, intensity: f32, angle: f32) -> Self {
        Self {
            distance,
            intensity,
            angle,
        }
    }
}

impl From<(f32, f32, f32)> for ScanSample {
    fn from((distance, intensity, angle): (f32, f32, f32)) -> Self {
        Self::new(distance, intensity, angle)
    }
}

/// Nearest-obstacle fold over one sweep
#[derive(Debug, Clone, Copy)]
pub struct ScanReducer {
    nearest: f32,
}

impl ScanReducer {
    pub fn new() -> Self {
        Self {
            nearest: f32::INFINITY,
        }
    }

    /// Minimum distance of the sweep, `f32::INFINITY` when it is empty
    pub fn reduce<I>(&mut self, samples: I) -> f32
    where
        I: IntoIterator,
        I::Item: Into<ScanSample>,
    {
        self.nearest = samples
            .into_iter()
            .map(|s| s.into().distance)
            .fold(f32::INFINITY, f32::min);
        self.nearest
    }

    /// Result of the most recent sweep
    pub fn nearest(&self) -> f32 {
        self.nearest
    }
}

impl Default for ScanReducer {
    fn default() -> Self {
        Self::new()
    }
}

type ScanCallback = Box<dyn FnMut(&[ScanSample], f32) + Send>;

/// Reducer plus an optional per-sweep observer
///
/// The callback receives the raw sweep and its nearest distance after the
/// reducer has been updated.
#[derive(Default)]
pub struct ObstacleMonitor {
    reducer: ScanReducer,
    on_scan: Option<ScanCallback>,
    sweeps: u64,
}

impl ObstacleMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the sweep observer, replacing any previous one
    pub fn on_scan<F>(&mut self, callback: F)
    where
        F: FnMut(&[ScanSample], f32) + Send + 'static,
    {
        self.on_scan = Some(Box::new(callback));
    }

    /// Process one full sweep
    pub fn ingest(&mut self, sweep: &[ScanSample]) -> f32 {
        let nearest = self.reducer.reduce(sweep.iter().copied());
        self.sweeps += 1;
        log::trace!("Sweep {}: {} samples, nearest {:.3}", self.sweeps, sweep.len(), nearest);

        if let Some(callback) = self.on_scan.as_mut() {
            callback(sweep, nearest);
        }
        nearest
    }

    pub fn nearest(&self) -> f32 {
        self.reducer.nearest()
    }

    /// Number of sweeps processed
    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_reduce_picks_minimum() {
        let mut reducer = ScanReducer::new();
        let sweep = [(5.0f32, 1.0f32, 0.0f32), (2.0, 1.0, 10.0), (9.0, 1.0, 20.0)];
        let nearest = reducer.reduce(sweep);
        assert_eq!(nearest, 2.0);
        assert_eq!(reducer.nearest(), 2.0);
    }

    #[test]
    fn test_empty_sweep_is_infinite() {
        let mut reducer = ScanReducer::new();
        assert_eq!(reducer.reduce(Vec::<ScanSample>::new()), f32::INFINITY);
    }

    #[test]
    fn test_each_sweep_replaces_previous() {
        let mut reducer = ScanReducer::new();
        reducer.reduce([ScanSample::new(0.5, 1.0, 0.0)]);
        let sweep = [ScanSample::new(3.0, 1.0, 0.0), ScanSample::new(4.0, 1.0, 1.0)];
        assert_eq!(reducer.reduce(sweep), 3.0);
        assert_eq!(reducer.reduce(Vec::<ScanSample>::new()), f32::INFINITY);
        assert_eq!(reducer.nearest(), f32::INFINITY);
    }

    #[test]
    fn test_monitor_invokes_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut monitor = ObstacleMonitor::new();
        let s = Arc::clone(&seen);
        monitor.on_scan(move |sweep, nearest| s.lock().push((sweep.len(), nearest)));

        let sweep: Vec<ScanSample> = vec![(1.5f32, 0.9f32, 0.0f32).into(), ScanSample::new(0.75, 0.2, 1.0)];
        assert_eq!(monitor.ingest(&sweep), 0.75);
        assert_eq!(monitor.ingest(&[]), f32::INFINITY);

        assert_eq!(*seen.lock(), vec![(2, 0.75), (0, f32::INFINITY)]);
        assert_eq!(monitor.sweeps(), 2);
        assert_eq!(monitor.nearest(), f32::INFINITY);
    }
}
