//! Approximate country centroids for snapshots that only carry country codes

/// ISO 3166-1 alpha-2 code, display name, latitude, longitude
pub const COUNTRY_CENTROIDS: &[(&str, &str, f64, f64)] = &[
    ("AE", "United Arab Emirates", 23.4241, 53.8478),
    ("AR", "Argentina", -38.4161, -63.6167),
    ("AU", "Australia", -25.2744, 133.7751),
    ("BR", "Brazil", -14.2350, -51.9253),
    ("CA", "Canada", 56.1304, -106.3468),
    ("CH", "Switzerland", 46.8182, 8.2275),
    ("CN", "China", 35.8617, 104.1954),
    ("DE", "Germany", 51.1657, 10.4515),
    ("EG", "Egypt", 26.8206, 30.8025),
    ("ES", "Spain", 40.4637, -3.7492),
    ("FI", "Finland", 61.9241, 25.7482),
    ("FR", "France", 46.2276, 2.2137),
    ("GB", "United Kingdom", 55.3781, -3.4360),
    ("ID", "Indonesia", -0.7893, 113.9213),
    ("IN", "India", 20.5937, 78.9629),
    ("IT", "Italy", 41.8719, 12.5674),
    ("JP", "Japan", 36.2048, 138.2529),
    ("KR", "South Korea", 35.9078, 127.7669),
    ("KZ", "Kazakhstan", 48.0196, 66.9237),
    ("MX", "Mexico", 23.6345, -102.5528),
    ("NL", "Netherlands", 52.1326, 5.2913),
    ("NO", "Norway", 60.4720, 8.4689),
    ("PL", "Poland", 51.9194, 19.1451),
    ("RU", "Russia", 61.5240, 105.3188),
    ("SE", "Sweden", 60.1282, 18.6435),
    ("SG", "Singapore", 1.3521, 103.8198),
    ("TR", "Turkey", 38.9637, 35.2433),
    ("UA", "Ukraine", 48.3794, 31.1656),
    ("US", "United States", 37.0902, -95.7129),
    ("ZA", "South Africa", -30.5595, 22.9375),
];

/// Look up a centroid by ISO code, case-insensitively
pub fn country_centroid(code: &str) -> Option<(&'static str, f64, f64)> {
    COUNTRY_CENTROIDS
        .iter()
        .find(|(iso, ..)| iso.eq_ignore_ascii_case(code))
        .map(|&(_, name, lat, lon)| (name, lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_codes() {
        let (name, lat, _) = country_centroid("us").unwrap();
        assert_eq!(name, "United States");
        assert!(lat > 0.0);
        assert!(country_centroid("XX").is_none());
    }

    #[test]
    fn table_is_sorted_and_in_range() {
        for pair in COUNTRY_CENTROIDS.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
        for &(_, _, lat, lon) in COUNTRY_CENTROIDS {
            assert!((-90.0..=90.0).contains(&lat));
            assert!((-180.0..=180.0).contains(&lon));
        }
    }
}
