use std::collections::HashSet;

/// Distinct station seen in one file, extracted from sampling-point
/// identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationRecord {
    pub station_code: String,
    pub country_code: String,
}

/// Distinct (sampling point, pollutant) pair seen in one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplingPointRecord {
    pub sampling_point_id: String,
    pub station_code: Option<String>,
    pub country_code: Option<String>,
    pub pollutant_code: i32,
}

/// Accumulates the best-effort station / sampling-point byproducts of a
/// parse, for bootstrapping the reference tables from the files
/// themselves. Malformed identifiers only omit the projection entry;
/// they never drop a measurement.
#[derive(Debug, Default)]
pub struct ReferenceProjection {
    stations: HashSet<StationRecord>,
    sampling_points: HashSet<SamplingPointRecord>,
}

impl ReferenceProjection {
    pub fn observe(&mut self, sampling_point_id: &str, pollutant_code: i32) {
        let decomposed = decompose(sampling_point_id);
        let (country_code, station_code) = match &decomposed {
            Some((country, station)) => (Some(country.clone()), station.clone()),
            None => (None, None),
        };

        if let (Some(country), Some(station)) = (&country_code, &station_code) {
            self.stations.insert(StationRecord {
                station_code: station.clone(),
                country_code: country.clone(),
            });
        }

        self.sampling_points.insert(SamplingPointRecord {
            sampling_point_id: sampling_point_id.to_string(),
            station_code,
            country_code,
            pollutant_code,
        });
    }

    pub fn stations(&self) -> Vec<StationRecord> {
        let mut out: Vec<_> = self.stations.iter().cloned().collect();
        out.sort();
        out
    }

    pub fn sampling_points(&self) -> Vec<SamplingPointRecord> {
        let mut out: Vec<_> = self.sampling_points.iter().cloned().collect();
        out.sort();
        out
    }

    pub fn is_empty(&self) -> bool {
        self.sampling_points.is_empty()
    }
}

/// Decompose a `CC/SPO-SSSSSS_XXXXX_YYY` sampling-point identifier into
/// (country_code, station_code). The station code carries the country
/// prefix, e.g. `PT/SPO-PT02022_00008_100` -> (`PT`, `PT/PT02022`).
pub(crate) fn decompose(id: &str) -> Option<(String, Option<String>)> {
    let (country, rest) = id.split_once('/')?;
    if country.is_empty() {
        return None;
    }

    let station_part = rest
        .strip_prefix("SPO-")
        .or_else(|| rest.strip_prefix("SPO."))
        .map(|tail| tail.split('_').next().unwrap_or(tail));

    let station_code = match station_part {
        Some(part) if !part.is_empty() => Some(format!("{country}/{part}")),
        _ => None,
    };

    Some((country.to_string(), station_code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decomposes_the_documented_format() {
        assert_eq!(
            decompose("PT/SPO-PT02022_00008_100"),
            Some(("PT".to_string(), Some("PT/PT02022".to_string())))
        );
    }

    #[test]
    fn accepts_the_dotted_spo_prefix() {
        assert_eq!(
            decompose("IT/SPO.IT1234A_7_8"),
            Some(("IT".to_string(), Some("IT/IT1234A".to_string())))
        );
    }

    #[test]
    fn missing_spo_prefix_keeps_the_country_only() {
        assert_eq!(
            decompose("DE/DEBB021_10_100"),
            Some(("DE".to_string(), None))
        );
    }

    #[test]
    fn identifiers_without_a_slash_are_opaque() {
        assert_eq!(decompose("STA-ES1438A"), None);
        assert_eq!(decompose(""), None);
    }

    #[test]
    fn projection_deduplicates_across_rows() {
        let mut projection = ReferenceProjection::default();
        projection.observe("PT/SPO-PT02022_00008_100", 8);
        projection.observe("PT/SPO-PT02022_00008_100", 8);
        projection.observe("PT/SPO-PT02022_00009_100", 7);

        assert_eq!(projection.stations().len(), 1);
        assert_eq!(projection.sampling_points().len(), 2);
    }

    #[test]
    fn malformed_identifiers_still_project_the_sampling_point() {
        let mut projection = ReferenceProjection::default();
        projection.observe("opaque-id", 5);

        assert!(projection.stations().is_empty());
        let points = projection.sampling_points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].sampling_point_id, "opaque-id");
        assert_eq!(points[0].station_code, None);
    }
}
