//! API endpoint URL builders

/// Build observation details URL
pub fn observation_url(base_url: &str, observation_id: &str) -> String {
    format!("{}/v1/observations/{}", base_url, observation_id)
}

/// Build taxon details URL
pub fn taxon_url(base_url: &str, taxon_id: &str) -> String {
    format!("{}/v1/taxa/{}", base_url, taxon_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_url() {
        assert_eq!(
            observation_url("https://api.inaturalist.org", "123"),
            "https://api.inaturalist.org/v1/observations/123"
        );
    }

    #[test]
    fn test_taxon_url() {
        assert_eq!(
            taxon_url("http://localhost:9000", "47170"),
            "http://localhost:9000/v1/taxa/47170"
        );
    }
}
