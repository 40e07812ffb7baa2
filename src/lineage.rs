//! Recover the parent scan of a fragmentation scan when a format does not
//! record it directly.
use std::collections::HashMap;

use log::trace;

/// The per-scan facts the resolver needs from an acquisition.
///
/// Scans are addressed by their 1-based scan number. Every method may answer
/// `None` when the acquisition does not record that value.
pub trait ScanAttributes {
    /// The first and last scan numbers, inclusive
    fn scan_range(&self) -> (u32, u32);

    fn ms_level(&self, scan: u32) -> Option<u8>;

    /// The parent scan number recorded by the instrument, if any. Values
    /// of zero or below count as not recorded.
    fn trailer_master_scan(&self, scan: u32) -> Option<u32>;

    /// The position of this scan within its acquisition cycle's event list
    fn event_index(&self, scan: u32) -> Option<u32>;

    /// The event index of the scan this scan's precursor was selected from
    fn master_event_index(&self, scan: u32) -> Option<u32>;

    /// An identifier shared by every scan in the same acquisition cycle
    fn cycle(&self, scan: u32) -> Option<u32>;

    /// The scanned `(low, high)` m/z range
    fn mass_range(&self, scan: u32) -> Option<(f64, f64)>;

    /// Whether the acquisition isolated fixed wide windows rather than
    /// specific precursors
    fn is_data_independent(&self) -> bool {
        false
    }
}

/// Switches controlling how trusting the resolver is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Require a recorded master scan to sit exactly one MS level below
    pub validate_ms_level: bool,
    /// When a recorded master scan is at the wrong level, follow its own
    /// recorded master until the level matches
    pub follow_precursor: bool,
    /// Treat the acquisition as data-independent even if the source does not
    /// say so
    pub data_independent: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            validate_ms_level: true,
            follow_precursor: true,
            data_independent: false,
        }
    }
}

/// Resolves and remembers parent scan numbers for one open acquisition.
///
/// The cache belongs to a single reader instance; call [`LineageResolver::reset`]
/// whenever the underlying source is reopened.
#[derive(Debug, Default, Clone)]
pub struct LineageResolver {
    pub config: ResolverConfig,
    cache: HashMap<u32, Option<u32>>,
}

fn contains_mz(range: Option<(f64, f64)>, precursor_mz: Option<f64>) -> bool {
    match (precursor_mz, range) {
        (None, _) => true,
        (Some(mz), Some((low, high))) => low <= mz && mz <= high,
        (Some(_), None) => false,
    }
}

impl LineageResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            cache: HashMap::new(),
        }
    }

    pub fn reset(&mut self) {
        self.cache.clear();
    }

    pub fn cached(&self, scan: u32) -> Option<Option<u32>> {
        self.cache.get(&scan).copied()
    }

    /// Find the parent of `scan`, whose precursor was `precursor_mz` if known.
    ///
    /// Scans below MS level 2 have no parent. The answer, found or not, is
    /// cached for the lifetime of this resolver.
    pub fn parent_of<S: ScanAttributes + ?Sized>(
        &mut self,
        source: &S,
        scan: u32,
        precursor_mz: Option<f64>,
    ) -> Option<u32> {
        if let Some(hit) = self.cache.get(&scan) {
            return *hit;
        }
        let parent = match source.ms_level(scan) {
            Some(level) if level >= 2 => {
                let target = level - 1;
                self.by_trailer(source, scan, target)
                    .or_else(|| self.by_event_index(source, scan, precursor_mz))
                    .or_else(|| self.by_ms_level(source, scan, target, precursor_mz))
            }
            _ => None,
        };
        trace!("Resolved parent of scan {scan} to {parent:?}");
        self.cache.insert(scan, parent);
        parent
    }

    fn by_trailer<S: ScanAttributes + ?Sized>(
        &self,
        source: &S,
        scan: u32,
        target_level: u8,
    ) -> Option<u32> {
        let (first, last) = source.scan_range();
        let max_steps = last.saturating_sub(first) as usize + 1;
        let mut current = scan;
        for _ in 0..max_steps {
            let master = source.trailer_master_scan(current)?;
            if master == 0 {
                return None;
            }
            if source.ms_level(master) == Some(target_level) {
                return Some(master);
            }
            if !self.config.validate_ms_level {
                return Some(master);
            }
            if !self.config.follow_precursor || master == current {
                return None;
            }
            current = master;
        }
        None
    }

    fn by_event_index<S: ScanAttributes + ?Sized>(
        &self,
        source: &S,
        scan: u32,
        precursor_mz: Option<f64>,
    ) -> Option<u32> {
        let (first, _) = source.scan_range();
        let master_event = match (source.event_index(scan), source.master_event_index(scan)) {
            (Some(event), Some(master)) if event > 0 && master > 0 => master,
            _ => return None,
        };

        let mut lowest_reached = false;
        let mut current = scan.checked_sub(1)?;
        while current >= first && current > 0 {
            let event = source.event_index(current).unwrap_or(0);
            // Crossed the start of the previous cycle
            if lowest_reached && event > 1 {
                return None;
            }
            if event == master_event && contains_mz(source.mass_range(current), precursor_mz) {
                return Some(current);
            }
            lowest_reached = event <= 1;
            current -= 1;
        }
        None
    }

    fn by_ms_level<S: ScanAttributes + ?Sized>(
        &self,
        source: &S,
        scan: u32,
        target_level: u8,
        precursor_mz: Option<f64>,
    ) -> Option<u32> {
        let (first, last) = source.scan_range();
        let cycle = source.cycle(scan);
        let unconditional =
            precursor_mz.is_none() || self.config.data_independent || source.is_data_independent();

        let accept = |candidate: u32| {
            source.ms_level(candidate) == Some(target_level)
                && (unconditional || contains_mz(source.mass_range(candidate), precursor_mz))
        };

        let backward = (first..scan).rev();
        let forward = scan.saturating_add(1)..=last;
        for candidate in backward
            .take_while(|s| source.cycle(*s) == cycle)
            .chain(forward.take_while(|s| source.cycle(*s) == cycle))
        {
            if accept(candidate) {
                return Some(candidate);
            }
        }
        None
    }
}
