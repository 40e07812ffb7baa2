use std::io;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset};
use lazy_static::lazy_static;
use log::{debug, trace};
use regex::Regex;

use crate::io::traits::{ScanAccessError, ScanFilter, ScanSource};
use crate::lineage::{LineageResolver, ResolverConfig, ScanAttributes};
use crate::meta::{DissociationMethod, IonizationSource, MassAnalyzer};
use crate::spectrum::{
    Centroid, Masslist, ProfilePoint, Scan, ScanHeader, ScanPolarity, SpectrumKind,
};

lazy_static! {
    static ref FILTER_PREFIX: Regex = Regex::new(
        r"^(?P<analyzer>\w+ )?((?P<polarity>\+|\-) )(?P<profile>\w )?(?P<source>\w+ )(?P<dda>\w )?"
    )
    .unwrap();
    static ref FILTER_ACTIVATION: Regex =
        Regex::new(r"(([0-9.]+)@([a-z]+)([0-9.]+))").unwrap();
    static ref STEPPED_ENERGIES: Regex =
        Regex::new(r"(?P<activation>\w+) Collision Energies \(%\) = (?P<values>[\d,]+)").unwrap();
}

/// The analyzer labels a scan filter may open with
const ANALYZERS: [&str; 6] = ["ITMS", "TQMS", "SQMS", "TOFMS", "FTMS", "Sector"];

/// Charge states at or above this are placeholders for "not determined"
const MAX_CHARGE_STATE: i32 = 255;

/// Precursor selection details for the last MSn stage of a scan
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PrecursorInfo {
    pub mz: Option<f64>,
    pub isolation_width: Option<f64>,
    pub activation_energy: Option<f64>,
    /// The vendor activation flag, see [`DissociationMethod::from_vendor_index`]
    pub dissociation_method: Option<usize>,
    /// The isolated `(low, high)` m/z range, when the instrument records one
    pub isolation_range: Option<(f64, f64)>,
}

/// One entry of a scan's label data, as the instrument's centroider reports it
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LabelPeak {
    pub mz: f64,
    /// Intensity above the baseline
    pub intensity: f64,
    pub resolution: f64,
    pub baseline: f64,
    pub noise: f64,
    /// Unsigned charge, 0 when undetermined
    pub charge: i32,
}

impl LabelPeak {
    fn into_centroid(self, polarity: ScanPolarity) -> Centroid {
        let mut peak = Centroid::with_baseline(
            self.mz,
            self.intensity + self.baseline,
            self.baseline,
            Some(self.noise),
        );
        if self.resolution != 0.0 {
            peak.fwhm = Some(self.mz / self.resolution);
        }
        if self.charge != 0 {
            peak.charge = Some(self.charge * polarity.sign());
        }
        peak
    }
}

/**
Access to an open Thermo RAW file through the vendor's library.

Scans are addressed by their 1-based scan number. Metadata lookups answer
`None` when the file does not record the value; peak data lookups may also
fail outright when the library reports an error.
*/
pub trait RawFileAccess {
    /// The first and last scan numbers, inclusive
    fn scan_range(&self) -> (u32, u32);

    fn ms_level(&self, scan: u32) -> Option<u8>;

    /// Look up one trailer extra value by its label, e.g. `Charge State:`
    fn trailer_value(&self, scan: u32, label: &str) -> Option<String>;

    /// Every trailer extra `(label, value)` pair of a scan
    fn trailer_extra(&self, scan: u32) -> Vec<(String, String)>;

    /// Every instrument status log `(label, value)` pair recorded nearest to
    /// a scan
    fn status_log(&self, scan: u32) -> Vec<(String, String)>;

    fn scan_filter(&self, scan: u32) -> Option<String>;

    /// The scan start time in minutes
    fn retention_time(&self, scan: u32) -> Option<f64>;

    fn mass_range(&self, scan: u32) -> Option<(f64, f64)>;

    fn total_ion_current(&self, scan: u32) -> Option<f64>;

    /// The base peak as `(mz, intensity)`
    fn base_peak(&self, scan: u32) -> Option<(f64, f64)>;

    fn precursor_info(&self, scan: u32) -> Option<PrecursorInfo>;

    fn is_profile(&self, scan: u32) -> Option<bool>;

    fn label_data(&self, scan: u32) -> io::Result<Option<Vec<LabelPeak>>>;

    /// The plain centroided `(mz, intensity)` list
    fn mass_list(&self, scan: u32) -> io::Result<Option<Vec<(f64, f64)>>>;

    /// The continuous `(mz, intensity)` signal of a profile scan
    fn profile(&self, scan: u32) -> io::Result<Option<Vec<(f64, f64)>>>;

    fn instrument_name(&self) -> Option<String>;

    fn instrument_model(&self) -> Option<String>;

    /// The text of every instrument method stored in the file
    fn instrument_methods(&self) -> Vec<String>;

    fn creation_date(&self) -> Option<DateTime<FixedOffset>>;
}

/// Render status log entries one `label: value` pair per line
fn format_status_log(entries: Vec<(String, String)>) -> String {
    entries
        .iter()
        .map(|(label, value)| format!("{}: {}", label.trim_end_matches(':').trim(), value.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn trailer_number<A: RawFileAccess + ?Sized, T: FromStr>(
    access: &A,
    scan: u32,
    label: &str,
) -> Option<T> {
    access
        .trailer_value(scan, label)
        .and_then(|value| value.trim().parse().ok())
}

impl<A: RawFileAccess + ?Sized> ScanAttributes for A {
    fn scan_range(&self) -> (u32, u32) {
        RawFileAccess::scan_range(self)
    }

    fn ms_level(&self, scan: u32) -> Option<u8> {
        RawFileAccess::ms_level(self, scan)
    }

    fn trailer_master_scan(&self, scan: u32) -> Option<u32> {
        trailer_number::<_, i64>(self, scan, "Master Scan Number:")
            .filter(|master| *master > 0)
            .and_then(|master| u32::try_from(master).ok())
    }

    fn event_index(&self, scan: u32) -> Option<u32> {
        trailer_number(self, scan, "Scan Event:")
    }

    fn master_event_index(&self, scan: u32) -> Option<u32> {
        trailer_number(self, scan, "Master Index:")
    }

    fn cycle(&self, scan: u32) -> Option<u32> {
        let (first, _) = RawFileAccess::scan_range(self);
        (first..=scan)
            .rev()
            .find(|s| RawFileAccess::ms_level(self, *s) == Some(1))
    }

    fn mass_range(&self, scan: u32) -> Option<(f64, f64)> {
        RawFileAccess::mass_range(self, scan)
    }
}

/// What a scan filter line such as `FTMS + p NSI d Full ms2 445.12@hcd30.00 [110.00-900.00]`
/// says about its scan
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FilterHints {
    pub polarity: ScanPolarity,
    pub analyzer: Option<MassAnalyzer>,
    pub source: Option<IonizationSource>,
    pub profile: Option<bool>,
    /// The precursor m/z of the last `mz@method energy` group
    pub precursor_mz: Option<f64>,
    pub dissociation_method: Option<DissociationMethod>,
    pub activation_energy: Option<f64>,
}

impl FilterHints {
    pub fn parse(filter: &str) -> Self {
        let mut hints = Self::default();
        if let Some(caps) = FILTER_PREFIX.captures(filter) {
            if let Some(polarity) = caps.name("polarity") {
                hints.polarity = polarity.as_str().parse().unwrap_or_default();
            }
            hints.analyzer = caps
                .name("analyzer")
                .map(|m| m.as_str().trim())
                .filter(|label| ANALYZERS.contains(label))
                .map(analyzer_from_label);
            hints.profile = caps.name("profile").and_then(|m| match m.as_str().trim() {
                "p" => Some(true),
                "c" => Some(false),
                _ => None,
            });
            hints.source = caps
                .name("source")
                .and_then(|m| source_from_label(m.as_str().trim()));
        }
        if let Some(caps) = FILTER_ACTIVATION.captures_iter(filter).last() {
            hints.precursor_mz = caps[2].parse().ok();
            hints.dissociation_method = caps[3].parse().ok();
            hints.activation_energy = caps[4].parse().ok();
        }
        hints
    }
}

fn analyzer_from_label(label: &str) -> MassAnalyzer {
    match label {
        "ITMS" => MassAnalyzer::IonTrap,
        "TQMS" | "SQMS" => MassAnalyzer::Quadrupole,
        "TOFMS" => MassAnalyzer::TOF,
        "Sector" => MassAnalyzer::Sector,
        other => MassAnalyzer::Other(other.to_string()),
    }
}

fn source_from_label(label: &str) -> Option<IonizationSource> {
    let source = match label {
        "ESI" | "NSI" => IonizationSource::ESI,
        "APCI" | "CI" => IonizationSource::CI,
        "APPI" => IonizationSource::PI,
        "FAB" => IonizationSource::FAB,
        "FI" => IonizationSource::FI,
        _ => return None,
    };
    Some(source)
}

/// Expand a stepped energy list, pulling abbreviated values (`25,...`) from
/// the first instrument method
fn stepped_energies(
    raw_value: &str,
    method: &DissociationMethod,
    instrument_methods: &[String],
) -> Option<Vec<f64>> {
    let mut values = raw_value.trim();
    if values.is_empty() {
        return None;
    }
    if values.contains("...") {
        if let Some(text) = instrument_methods.first() {
            if let Some(caps) = STEPPED_ENERGIES
                .captures_iter(text)
                .find(|caps| &caps["activation"] == method.as_str())
            {
                values = caps.name("values").map(|m| m.as_str()).unwrap_or(values);
            }
        }
    }
    values
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .ok()
}

/**
A Thermo RAW reader over any [`RawFileAccess`] binding.

Parent scans are recovered with a [`LineageResolver`] whose cache lives as long
as the reader. Profile scans carry both their continuous signal and the
instrument's own centroids.
*/
#[derive(Debug)]
pub struct ThermoReader<A: RawFileAccess> {
    access: A,
    resolver: LineageResolver,
    instrument_methods: Option<Vec<String>>,
}

impl<A: RawFileAccess> ThermoReader<A> {
    pub fn new(access: A) -> Self {
        Self::with_config(access, ResolverConfig::default())
    }

    pub fn with_config(access: A, config: ResolverConfig) -> Self {
        Self {
            access,
            resolver: LineageResolver::new(config),
            instrument_methods: None,
        }
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    pub fn into_inner(self) -> A {
        self.access
    }

    /// Forget every resolved parent and the cached instrument methods
    pub fn reset(&mut self) {
        self.resolver.reset();
        self.instrument_methods = None;
    }

    pub fn len(&self) -> usize {
        let (first, last) = RawFileAccess::scan_range(&self.access);
        if last < first {
            0
        } else {
            (last - first) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn scan_numbers(&self) -> RangeInclusive<u32> {
        let (first, last) = RawFileAccess::scan_range(&self.access);
        first..=last
    }

    fn instrument_methods(&mut self) -> &[String] {
        if self.instrument_methods.is_none() {
            let methods = self.access.instrument_methods();
            debug!("Loaded {} instrument methods", methods.len());
            self.instrument_methods = Some(methods);
        }
        self.instrument_methods.as_deref().unwrap_or_default()
    }

    /// Build the header of one scan without touching its peak data
    pub fn read_header(&mut self, scan: u32) -> Result<ScanHeader, ScanAccessError> {
        if !self.scan_numbers().contains(&scan) {
            return Err(ScanAccessError::ScanNotFound(Some(scan)));
        }
        let methods = self.instrument_methods().to_vec();
        let access = &self.access;
        let filter_line = access.scan_filter(scan);
        let hints = filter_line
            .as_deref()
            .map(FilterHints::parse)
            .unwrap_or_default();

        let mut header = ScanHeader {
            scan_number: Some(scan),
            instrument_name: access.instrument_name(),
            instrument_model: access.instrument_model(),
            ms_level: RawFileAccess::ms_level(access, scan),
            polarity: hints.polarity,
            mass_analyzer: hints.analyzer.clone(),
            ionization_source: Some(hints.source.unwrap_or(IonizationSource::ESI)),
            ..Default::default()
        };
        header.spectrum_kind = match access.is_profile(scan).or(hints.profile) {
            Some(true) => SpectrumKind::Profile,
            Some(false) => SpectrumKind::Centroid,
            None => SpectrumKind::Unknown,
        };
        header.resolution = ["FT Resolution:", "Orbitrap Resolution:"]
            .iter()
            .find_map(|label| trailer_number::<_, f64>(access, scan, label))
            .filter(|res| *res > 0.0)
            .map(|res| res as u32);

        if let Some(minutes) = access.retention_time(scan) {
            let seconds = minutes * 60.0;
            header.retention_time = Some(seconds);
            header.acquisition_timestamp = access.creation_date().and_then(|start| {
                Duration::try_milliseconds((seconds * 1000.0).round() as i64)
                    .and_then(|offset| start.checked_add_signed(offset))
            });
        }
        if let Some((low, high)) = RawFileAccess::mass_range(access, scan) {
            header.low_mz = Some(low);
            header.high_mz = Some(high);
        }
        header.tic = access.total_ion_current(scan);
        if let Some((mz, intensity)) = access.base_peak(scan) {
            header.basepeak_mz = Some(mz);
            header.basepeak_intensity = Some(intensity);
        }

        if let Some(level) = header.ms_level.filter(|level| *level >= 2) {
            fill_precursor(access, scan, level, &hints, &methods, &mut header);
        }
        header.parent_scan_number = self
            .resolver
            .parent_of(&self.access, scan, header.precursor_mz);

        if let Some(filter_line) = filter_line {
            header.insert_custom("scan_filter", filter_line);
        }
        for (label, value) in self.access.trailer_extra(scan) {
            header.insert_custom(label.trim_end_matches(':').trim(), value.trim());
        }
        let status_log = format_status_log(self.access.status_log(scan));
        if !status_log.is_empty() {
            header.insert_custom("status_log", status_log);
        }
        for (i, text) in methods.into_iter().enumerate() {
            header.insert_custom(format!("instrument_method_{}", i + 1), text);
        }
        trace!("Built header for scan {scan}");
        Ok(header)
    }

    fn read_peaks(
        &self,
        mut header: ScanHeader,
        default_kind: SpectrumKind,
    ) -> Result<Scan, ScanAccessError> {
        let scan = header.scan_number.unwrap_or_default();
        let invalid = |e: io::Error| ScanAccessError::InvalidScan {
            scan: Some(scan),
            source: Box::new(e),
        };
        let kind = header.spectrum_kind.or_fallback(default_kind);

        let profile: Vec<ProfilePoint> = if kind == SpectrumKind::Profile {
            self.access
                .profile(scan)
                .map_err(invalid)?
                .unwrap_or_default()
                .into_iter()
                .map(ProfilePoint::from)
                .collect()
        } else {
            Vec::new()
        };

        let mut centroids: Vec<Centroid> = self
            .access
            .label_data(scan)
            .map_err(invalid)?
            .unwrap_or_default()
            .into_iter()
            .map(|label| label.into_centroid(header.polarity))
            .filter(|peak| peak.intensity() > 0.0)
            .collect();
        if centroids.is_empty() {
            centroids = self
                .access
                .mass_list(scan)
                .map_err(invalid)?
                .unwrap_or_default()
                .into_iter()
                .filter(|(_, ai)| *ai > 0.0)
                .map(|(mz, ai)| Centroid::new(mz, ai))
                .collect();
        }

        header.spectrum_kind = kind;
        header.points_count = Some(if profile.is_empty() {
            centroids.len()
        } else {
            profile.len()
        });
        Ok(Scan::new(header, profile, Masslist::new(centroids)))
    }

    /// Read one scan with its peak data
    pub fn read_scan(
        &mut self,
        scan: u32,
        default_kind: SpectrumKind,
    ) -> Result<Scan, ScanAccessError> {
        let header = self.read_header(scan)?;
        self.read_peaks(header, default_kind)
    }
}

fn fill_precursor<A: RawFileAccess + ?Sized>(
    access: &A,
    scan: u32,
    level: u8,
    hints: &FilterHints,
    instrument_methods: &[String],
    header: &mut ScanHeader,
) {
    let info = access.precursor_info(scan).unwrap_or_default();

    header.precursor_mz = info
        .mz
        .filter(|mz| *mz > 0.0)
        .or_else(|| trailer_number::<_, f64>(access, scan, "Monoisotopic M/Z:").filter(|mz| *mz > 0.0))
        .or(hints.precursor_mz);

    header.precursor_charge = trailer_number::<_, i32>(access, scan, "Charge State:")
        .filter(|z| *z != 0 && *z < MAX_CHARGE_STATE)
        .map(|z| match header.polarity {
            ScanPolarity::Unknown => z,
            polarity => z.abs() * polarity.sign(),
        });

    if let Some((low, high)) = info.isolation_range {
        header.precursor_low_mz = Some(low);
        header.precursor_high_mz = Some(high);
    } else {
        let width = info
            .isolation_width
            .filter(|w| *w != 1.0)
            .or_else(|| trailer_number::<_, f64>(access, scan, &format!("MS{level} Isolation Width:")))
            .filter(|w| *w > 0.0);
        if let (Some(mz), Some(width)) = (header.precursor_mz, width) {
            header.precursor_low_mz = Some(mz - width / 2.0);
            header.precursor_high_mz = Some(mz + width / 2.0);
        }
    }

    let method = info
        .dissociation_method
        .map(DissociationMethod::from_vendor_index)
        .or_else(|| hints.dissociation_method.clone());

    header.activation_energy = info.activation_energy.filter(|e| *e > 0.0).or_else(|| {
        method
            .as_ref()
            .and_then(|m| trailer_number::<_, f64>(access, scan, &format!("{m} Energy eV:")))
            .filter(|e| *e > 0.0)
            .or(hints.activation_energy)
    });

    if let Some(m) = method.as_ref() {
        header.activation_energies = access
            .trailer_value(scan, &format!("{m} Energy:"))
            .and_then(|raw| stepped_energies(&raw, m, instrument_methods));
    }
    header.dissociation_method = method;
}

/// A pass over the headers of a [`ThermoReader`]
pub struct ThermoHeaders<'a, A: RawFileAccess> {
    reader: &'a mut ThermoReader<A>,
    scans: RangeInclusive<u32>,
    filter: ScanFilter,
}

impl<A: RawFileAccess> Iterator for ThermoHeaders<'_, A> {
    type Item = Result<ScanHeader, ScanAccessError>;

    fn next(&mut self) -> Option<Self::Item> {
        for scan in self.scans.by_ref() {
            match self.reader.read_header(scan) {
                Ok(header) if self.filter.matches(&header) => return Some(Ok(header)),
                Ok(_) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// A pass over the scans of a [`ThermoReader`]
pub struct ThermoScans<'a, A: RawFileAccess> {
    reader: &'a mut ThermoReader<A>,
    scans: RangeInclusive<u32>,
    filter: ScanFilter,
    default_kind: SpectrumKind,
}

impl<A: RawFileAccess> Iterator for ThermoScans<'_, A> {
    type Item = Result<Scan, ScanAccessError>;

    fn next(&mut self) -> Option<Self::Item> {
        for scan in self.scans.by_ref() {
            let header = match self.reader.read_header(scan) {
                Ok(header) => header,
                Err(e) => return Some(Err(e)),
            };
            if self.filter.matches(&header) {
                return Some(self.reader.read_peaks(header, self.default_kind));
            }
        }
        None
    }
}

impl<A: RawFileAccess> ScanSource for ThermoReader<A> {
    type HeaderIter<'a> = ThermoHeaders<'a, A> where Self: 'a;
    type ScanIter<'a> = ThermoScans<'a, A> where Self: 'a;

    fn headers(&mut self, filter: ScanFilter) -> Result<Self::HeaderIter<'_>, ScanAccessError> {
        let scans = self.scan_numbers();
        Ok(ThermoHeaders {
            reader: self,
            scans,
            filter,
        })
    }

    fn scans(
        &mut self,
        filter: ScanFilter,
        default_kind: SpectrumKind,
    ) -> Result<Self::ScanIter<'_>, ScanAccessError> {
        let scans = self.scan_numbers();
        Ok(ThermoScans {
            reader: self,
            scans,
            filter,
            default_kind,
        })
    }

    fn scan(
        &mut self,
        scan_number: Option<u32>,
        default_kind: SpectrumKind,
    ) -> Result<Scan, ScanAccessError> {
        let scan = match scan_number {
            Some(scan) => scan,
            None if self.is_empty() => return Err(ScanAccessError::ScanNotFound(None)),
            None => *self.scan_numbers().start(),
        };
        self.read_scan(scan, default_kind)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Default, Clone)]
    struct MockScan {
        level: u8,
        filter: String,
        trailer: Vec<(String, String)>,
        status: Vec<(String, String)>,
        rt: f64,
        range: (f64, f64),
        precursor: Option<PrecursorInfo>,
        profile: bool,
        labels: Option<Vec<LabelPeak>>,
        masses: Vec<(f64, f64)>,
    }

    #[derive(Debug, Default)]
    struct MockRaw {
        scans: Vec<MockScan>,
        methods: Vec<String>,
        broken: HashMap<u32, String>,
    }

    impl MockRaw {
        fn get(&self, scan: u32) -> Option<&MockScan> {
            scan.checked_sub(1).and_then(|i| self.scans.get(i as usize))
        }

        fn levels(levels: &[u8]) -> Self {
            let scans = levels
                .iter()
                .enumerate()
                .map(|(i, level)| MockScan {
                    level: *level,
                    filter: if *level == 1 {
                        "FTMS + p ESI Full ms [400.00-1200.00]".to_string()
                    } else {
                        "ITMS + c ESI d Full ms2 500.00@cid35.00 [135.00-1000.00]".to_string()
                    },
                    rt: i as f64 * 0.5,
                    range: (400.0, 1200.0),
                    profile: *level == 1,
                    masses: vec![(150.0, 10.0), (250.0, 0.0), (350.0, 30.0)],
                    ..Default::default()
                })
                .collect();
            Self {
                scans,
                ..Default::default()
            }
        }
    }

    impl RawFileAccess for MockRaw {
        fn scan_range(&self) -> (u32, u32) {
            (1, self.scans.len() as u32)
        }

        fn ms_level(&self, scan: u32) -> Option<u8> {
            self.get(scan).map(|s| s.level)
        }

        fn trailer_value(&self, scan: u32, label: &str) -> Option<String> {
            self.get(scan)?
                .trailer
                .iter()
                .find(|(k, _)| k == label)
                .map(|(_, v)| v.clone())
        }

        fn trailer_extra(&self, scan: u32) -> Vec<(String, String)> {
            self.get(scan).map(|s| s.trailer.clone()).unwrap_or_default()
        }

        fn status_log(&self, scan: u32) -> Vec<(String, String)> {
            self.get(scan).map(|s| s.status.clone()).unwrap_or_default()
        }

        fn scan_filter(&self, scan: u32) -> Option<String> {
            self.get(scan).map(|s| s.filter.clone())
        }

        fn retention_time(&self, scan: u32) -> Option<f64> {
            self.get(scan).map(|s| s.rt)
        }

        fn mass_range(&self, scan: u32) -> Option<(f64, f64)> {
            self.get(scan).map(|s| s.range)
        }

        fn total_ion_current(&self, scan: u32) -> Option<f64> {
            self.get(scan).map(|s| s.masses.iter().map(|(_, i)| i).sum())
        }

        fn base_peak(&self, scan: u32) -> Option<(f64, f64)> {
            self.get(scan)?
                .masses
                .iter()
                .copied()
                .max_by(|a, b| a.1.total_cmp(&b.1))
        }

        fn precursor_info(&self, scan: u32) -> Option<PrecursorInfo> {
            self.get(scan).and_then(|s| s.precursor.clone())
        }

        fn is_profile(&self, scan: u32) -> Option<bool> {
            self.get(scan).map(|s| s.profile)
        }

        fn label_data(&self, scan: u32) -> io::Result<Option<Vec<LabelPeak>>> {
            if let Some(message) = self.broken.get(&scan) {
                return Err(io::Error::new(io::ErrorKind::Other, message.clone()));
            }
            Ok(self.get(scan).and_then(|s| s.labels.clone()))
        }

        fn mass_list(&self, scan: u32) -> io::Result<Option<Vec<(f64, f64)>>> {
            Ok(self.get(scan).map(|s| s.masses.clone()))
        }

        fn profile(&self, scan: u32) -> io::Result<Option<Vec<(f64, f64)>>> {
            Ok(self.get(scan).map(|s| {
                s.masses
                    .iter()
                    .flat_map(|(mz, i)| [(mz - 0.01, 0.0), (*mz, *i), (mz + 0.01, 0.0)])
                    .collect()
            }))
        }

        fn instrument_name(&self) -> Option<String> {
            Some("Orbitrap Fusion".to_string())
        }

        fn instrument_model(&self) -> Option<String> {
            Some("Orbitrap Fusion Lumos".to_string())
        }

        fn instrument_methods(&self) -> Vec<String> {
            self.methods.clone()
        }

        fn creation_date(&self) -> Option<DateTime<FixedOffset>> {
            DateTime::parse_from_rfc3339("2024-03-01T10:00:00+01:00").ok()
        }
    }

    fn trailer(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_filter_hints() {
        let hints = FilterHints::parse("FTMS + p NSI d Full ms2 445.12@hcd30.00 [110.00-900.00]");
        assert_eq!(hints.polarity, ScanPolarity::Positive);
        assert_eq!(hints.analyzer, Some(MassAnalyzer::Other("FTMS".to_string())));
        assert_eq!(hints.source, Some(IonizationSource::ESI));
        assert_eq!(hints.profile, Some(true));
        assert_eq!(hints.precursor_mz, Some(445.12));
        assert_eq!(hints.dissociation_method, Some(DissociationMethod::HCD));
        assert_eq!(hints.activation_energy, Some(30.0));

        let hints =
            FilterHints::parse("ITMS - c ESI d Full ms3 600.00@cid35.00 400.00@cid35.00 [100.00-500.00]");
        assert_eq!(hints.polarity, ScanPolarity::Negative);
        assert_eq!(hints.analyzer, Some(MassAnalyzer::IonTrap));
        assert_eq!(hints.profile, Some(false));
        assert_eq!(hints.precursor_mz, Some(400.0));

        let hints = FilterHints::parse("garbage");
        assert_eq!(hints, FilterHints::default());
    }

    #[test]
    fn test_stepped_energies() {
        let methods = vec!["HCD Collision Energies (%) = 25,30,35\nCID Collision Energies (%) = 20".to_string()];
        assert_eq!(
            stepped_energies("25,30,35", &DissociationMethod::HCD, &[]),
            Some(vec![25.0, 30.0, 35.0])
        );
        assert_eq!(
            stepped_energies("25,...", &DissociationMethod::HCD, &methods),
            Some(vec![25.0, 30.0, 35.0])
        );
        assert_eq!(stepped_energies("25,...", &DissociationMethod::HCD, &[]), None);
        assert_eq!(stepped_energies("", &DissociationMethod::HCD, &methods), None);
    }

    #[test_log::test]
    fn test_lineage_by_ms_level() -> Result<(), ScanAccessError> {
        let raw = MockRaw::levels(&[1, 2, 2, 2, 1, 2, 2, 2, 1, 2]);
        let mut reader = ThermoReader::new(raw);
        let header = reader.read_header(10)?;
        assert_eq!(header.ms_level, Some(2));
        assert_eq!(header.precursor_mz, Some(500.0));
        assert_eq!(header.parent_scan_number, Some(9));
        assert_eq!(reader.read_header(7)?.parent_scan_number, Some(5));
        assert_eq!(reader.read_header(9)?.parent_scan_number, None);
        Ok(())
    }

    #[test_log::test]
    fn test_lineage_by_trailer() -> Result<(), ScanAccessError> {
        let mut raw = MockRaw::levels(&[1, 1, 2, 2]);
        raw.scans[3].trailer = trailer(&[("Master Scan Number:", "1")]);
        let mut reader = ThermoReader::new(raw);
        assert_eq!(reader.read_header(4)?.parent_scan_number, Some(1));
        assert_eq!(reader.read_header(3)?.parent_scan_number, Some(2));
        Ok(())
    }

    #[test_log::test]
    fn test_precursor_details() -> Result<(), ScanAccessError> {
        let mut raw = MockRaw::levels(&[1, 2]);
        raw.methods = vec!["HCD Collision Energies (%) = 25,30,35".to_string()];
        raw.scans[1].filter = "FTMS - p NSI d Full ms2 445.12@hcd30.00 [110.00-900.00]".to_string();
        raw.scans[1].trailer = trailer(&[
            ("Charge State:", "3"),
            ("Monoisotopic M/Z:", "445.1201"),
            ("MS2 Isolation Width:", "2.0"),
            ("HCD Energy:", "25,..."),
            ("FT Resolution:", "30000"),
        ]);
        let mut reader = ThermoReader::new(raw);
        let header = reader.read_header(2)?;
        assert_eq!(header.polarity, ScanPolarity::Negative);
        assert_eq!(header.precursor_mz, Some(445.1201));
        assert_eq!(header.precursor_charge, Some(-3));
        assert_eq!(header.precursor_low_mz, Some(444.1201));
        assert_eq!(header.precursor_high_mz, Some(446.1201));
        assert_eq!(header.dissociation_method, Some(DissociationMethod::HCD));
        assert_eq!(header.activation_energy, Some(30.0));
        assert_eq!(header.activation_energies, Some(vec![25.0, 30.0, 35.0]));
        assert_eq!(header.resolution, Some(30000));
        assert_eq!(header.retention_time, Some(30.0));
        assert_eq!(header.custom("Charge State"), Some("3"));
        assert_eq!(
            header.custom("scan_filter"),
            Some("FTMS - p NSI d Full ms2 445.12@hcd30.00 [110.00-900.00]")
        );
        assert_eq!(
            header.custom("instrument_method_1"),
            Some("HCD Collision Energies (%) = 25,30,35")
        );
        assert!(header.acquisition_timestamp.is_some());
        Ok(())
    }

    #[test_log::test]
    fn test_status_log() -> Result<(), ScanAccessError> {
        let mut raw = MockRaw::levels(&[1, 2]);
        raw.scans[0].status = trailer(&[
            ("Ion Gauge (E-5 Torr):", " 2.31"),
            ("Source Temperature (C):", "275"),
        ]);
        let mut reader = ThermoReader::new(raw);
        let header = reader.read_header(1)?;
        assert_eq!(
            header.custom("status_log"),
            Some("Ion Gauge (E-5 Torr): 2.31\nSource Temperature (C): 275")
        );
        assert_eq!(header.custom("Ion Gauge (E-5 Torr)"), None);

        let header = reader.read_header(2)?;
        assert_eq!(header.custom("status_log"), None);
        Ok(())
    }

    #[test_log::test]
    fn test_precursor_info_takes_precedence() -> Result<(), ScanAccessError> {
        let mut raw = MockRaw::levels(&[1, 2]);
        raw.scans[1].precursor = Some(PrecursorInfo {
            mz: Some(520.0),
            isolation_width: Some(1.0),
            activation_energy: Some(27.0),
            dissociation_method: Some(4),
            isolation_range: None,
        });
        raw.scans[1].trailer = trailer(&[("Charge State:", "255"), ("MS2 Isolation Width:", "4")]);
        let mut reader = ThermoReader::new(raw);
        let header = reader.read_header(2)?;
        assert_eq!(header.precursor_mz, Some(520.0));
        assert_eq!(header.precursor_charge, None);
        assert_eq!(header.precursor_low_mz, Some(518.0));
        assert_eq!(header.dissociation_method, Some(DissociationMethod::ETD));
        assert_eq!(header.activation_energy, Some(27.0));
        Ok(())
    }

    #[test_log::test]
    fn test_label_centroids() -> Result<(), ScanAccessError> {
        let mut raw = MockRaw::levels(&[1]);
        raw.scans[0].filter = "FTMS - p ESI Full ms [400.00-1200.00]".to_string();
        raw.scans[0].labels = Some(vec![
            LabelPeak {
                mz: 500.0,
                intensity: 50.0,
                resolution: 50000.0,
                baseline: 10.0,
                noise: 2.0,
                charge: 2,
            },
            LabelPeak {
                mz: 600.0,
                intensity: 5.0,
                baseline: 5.0,
                noise: 1.0,
                ..Default::default()
            },
            LabelPeak {
                mz: 700.0,
                baseline: 3.0,
                ..Default::default()
            },
        ]);
        let mut reader = ThermoReader::new(raw);
        let scan = reader.scan(None, SpectrumKind::Centroid)?;
        assert_eq!(scan.header.spectrum_kind, SpectrumKind::Profile);
        assert_eq!(scan.profile.len(), 9);
        assert_eq!(scan.centroids.len(), 2);
        let peak = &scan.centroids[0];
        assert_eq!(peak.ai, 60.0);
        assert_eq!(peak.intensity(), 50.0);
        assert_eq!(peak.fwhm, Some(0.01));
        assert_eq!(peak.charge, Some(-2));
        assert_eq!(peak.sn(), Some(25.0));
        let peak = &scan.centroids[1];
        assert_eq!(peak.fwhm, None);
        assert_eq!(peak.charge, None);
        Ok(())
    }

    #[test_log::test]
    fn test_mass_list_fallback() -> Result<(), ScanAccessError> {
        let raw = MockRaw::levels(&[1, 2]);
        let mut reader = ThermoReader::new(raw);
        let scan = reader.scan(Some(2), SpectrumKind::Profile)?;
        assert_eq!(scan.header.spectrum_kind, SpectrumKind::Centroid);
        assert!(!scan.has_profile());
        assert_eq!(scan.centroids.len(), 2);
        assert_eq!(scan.header.points_count, Some(2));
        assert!(matches!(
            reader.scan(Some(3), SpectrumKind::Centroid),
            Err(ScanAccessError::ScanNotFound(Some(3)))
        ));
        Ok(())
    }

    #[test_log::test]
    fn test_iteration_and_filters() -> Result<(), ScanAccessError> {
        let mut raw = MockRaw::levels(&[1, 2, 2, 1, 2]);
        raw.broken.insert(3, "label data unavailable".to_string());
        let mut reader = ThermoReader::new(raw);
        assert_eq!(reader.len(), 5);
        let levels: Vec<_> = reader
            .headers(ScanFilter::new().with_ms_level(2))?
            .map(|h| h.map(|h| h.scan_number))
            .collect::<Result<_, _>>()?;
        assert_eq!(levels, vec![Some(2), Some(3), Some(5)]);

        let results: Vec<_> = reader
            .scans(ScanFilter::default(), SpectrumKind::Centroid)?
            .collect();
        assert_eq!(results.len(), 5);
        assert!(matches!(
            &results[2],
            Err(e) if e.is_recoverable() && e.scan_number() == Some(3)
        ));
        assert!(results[3].is_ok());

        let summary = reader.summary()?;
        assert_eq!(summary.scan_number_range, Some((1, 5)));
        assert_eq!(summary.scan_count(), 5);
        Ok(())
    }
}
