use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use indexmap::IndexSet;

use crate::meta::{DissociationMethod, MassAnalyzer};
use crate::spectrum::{ScanHeader, ScanPolarity};

/// What was seen across every scan of one MS level
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LevelSummary {
    pub scan_count: usize,
    pub mass_analyzers: IndexSet<Option<MassAnalyzer>>,
    pub mass_ranges: Vec<(Option<f64>, Option<f64>)>,
    pub polarities: IndexSet<ScanPolarity>,
    pub resolutions: IndexSet<Option<u32>>,
    pub dissociation_methods: IndexSet<Option<DissociationMethod>>,
    /// Non-zero activation energies, rounded to whole numbers
    pub activation_energies: IndexSet<i64>,
}

impl LevelSummary {
    fn add(&mut self, header: &ScanHeader) {
        self.scan_count += 1;
        self.mass_analyzers.insert(header.mass_analyzer.clone());
        let range = (header.low_mz, header.high_mz);
        if !self.mass_ranges.contains(&range) {
            self.mass_ranges.push(range);
        }
        self.polarities.insert(header.polarity);
        self.resolutions.insert(header.resolution);
        self.dissociation_methods
            .insert(header.dissociation_method.clone());
        if let Some(energy) = header.activation_energy.filter(|e| *e != 0.0) {
            self.activation_energies.insert(energy.round() as i64);
        }
    }
}

/// An overview of a whole run, gathered in one pass over its headers
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub instrument_names: IndexSet<String>,
    pub instrument_models: IndexSet<String>,
    pub scan_number_range: Option<(u32, u32)>,
    /// In seconds
    pub retention_time_range: Option<(f64, f64)>,
    pub levels: BTreeMap<Option<u8>, LevelSummary>,
}

fn widen<T: PartialOrd + Copy>(range: &mut Option<(T, T)>, value: Option<T>) {
    let Some(value) = value else { return };
    *range = match *range {
        None => Some((value, value)),
        Some((lo, hi)) => Some((
            if value < lo { value } else { lo },
            if value > hi { value } else { hi },
        )),
    };
}

impl RunSummary {
    pub fn add(&mut self, header: &ScanHeader) {
        if let Some(name) = &header.instrument_name {
            self.instrument_names.insert(name.clone());
        }
        if let Some(model) = &header.instrument_model {
            self.instrument_models.insert(model.clone());
        }
        widen(&mut self.scan_number_range, header.scan_number);
        widen(&mut self.retention_time_range, header.retention_time);
        self.levels.entry(header.ms_level).or_default().add(header);
    }

    pub fn scan_count(&self) -> usize {
        self.levels.values().map(|l| l.scan_count).sum()
    }

    pub fn instrument_name(&self) -> Option<String> {
        join_set(&self.instrument_names)
    }

    pub fn instrument_model(&self) -> Option<String> {
        join_set(&self.instrument_models)
    }
}

impl<'a> Extend<&'a ScanHeader> for RunSummary {
    fn extend<I: IntoIterator<Item = &'a ScanHeader>>(&mut self, iter: I) {
        for header in iter {
            self.add(header);
        }
    }
}

fn join_set(values: &IndexSet<String>) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().map(String::as_str).collect::<Vec<_>>().join("; "))
    }
}

fn opt<T: Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "None".to_string(),
    }
}

fn list<T, I: IntoIterator<Item = T>, F: Fn(T) -> String>(values: I, f: F) -> String {
    let parts: Vec<String> = values.into_iter().map(f).collect();
    format!("({})", parts.join(", "))
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Instrument: {} | {}",
            opt(&self.instrument_name()),
            opt(&self.instrument_model())
        )?;
        match self.retention_time_range {
            Some((lo, hi)) => writeln!(f, "RT Range: {:.2} - {:.2} [min]", lo / 60.0, hi / 60.0)?,
            None => writeln!(f, "RT Range: None")?,
        }
        match self.scan_number_range {
            Some((lo, hi)) => writeln!(f, "Scan Range: {lo} - {hi}")?,
            None => writeln!(f, "Scan Range: None")?,
        }
        for (level, info) in self.levels.iter() {
            writeln!(f, "\nMS{} Info:", opt(level))?;
            writeln!(f, "\tScan Counts: {}", info.scan_count)?;
            writeln!(f, "\tPolarities: {}", list(&info.polarities, |p| p.to_string()))?;
            writeln!(f, "\tMass Analyzers: {}", list(&info.mass_analyzers, opt))?;
            if info.mass_ranges.len() > 2 {
                writeln!(f, "\tMass Ranges: {}", info.mass_ranges.len())?;
            } else {
                writeln!(
                    f,
                    "\tMass Ranges: {}",
                    list(&info.mass_ranges, |(lo, hi)| format!("{}-{}", opt(lo), opt(hi)))
                )?;
            }
            writeln!(f, "\tResolutions: {}", list(&info.resolutions, opt))?;
            writeln!(
                f,
                "\tDissociation Methods: {}",
                list(&info.dissociation_methods, opt)
            )?;
            writeln!(
                f,
                "\tActivation Energies: {}",
                list(&info.activation_energies, |e| e.to_string())
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn header(scan: u32, level: u8, rt: f64, energy: Option<f64>) -> ScanHeader {
        ScanHeader {
            scan_number: Some(scan),
            ms_level: Some(level),
            retention_time: Some(rt),
            polarity: ScanPolarity::Positive,
            activation_energy: energy,
            low_mz: Some(100.0),
            high_mz: Some(2000.0),
            instrument_model: Some("LTQ Orbitrap".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_summary() {
        let headers = vec![
            header(3, 1, 60.0, None),
            header(4, 2, 61.0, Some(35.2)),
            header(5, 2, 62.0, Some(0.0)),
            header(6, 2, 63.0, Some(34.8)),
        ];
        let mut summary = RunSummary::default();
        summary.extend(&headers);

        assert_eq!(summary.scan_count(), 4);
        assert_eq!(summary.scan_number_range, Some((3, 6)));
        assert_eq!(summary.retention_time_range, Some((60.0, 63.0)));
        assert_eq!(summary.instrument_model().as_deref(), Some("LTQ Orbitrap"));
        assert_eq!(summary.instrument_name(), None);

        let ms2 = &summary.levels[&Some(2)];
        assert_eq!(ms2.scan_count, 3);
        assert_eq!(ms2.activation_energies.len(), 1);
        assert!(ms2.activation_energies.contains(&35));
        assert_eq!(ms2.mass_ranges, vec![(Some(100.0), Some(2000.0))]);

        let text = summary.to_string();
        assert!(text.contains("RT Range: 1.00 - 1.05 [min]"));
        assert!(text.contains("Scan Range: 3 - 6"));
        assert!(text.contains("MS2 Info:"));
    }
}
