use chrono::{DateTime, Utc};

/// One fetched weather reading for a city. Produced by a provider, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub location_name: String,
    pub region: String,
    pub country: String,
    pub temperature_c: f64,
    pub condition_text: String,
    /// Protocol-relative icon reference as returned by the API, e.g. `//cdn.weatherapi.com/...`.
    pub condition_icon: String,
    pub humidity_pct: u8,
    pub uv_index: f64,
    pub feels_like_c: f64,
    pub observed_at: Option<DateTime<Utc>>,
}

impl WeatherSnapshot {
    /// Absolute URL of the condition icon.
    pub fn icon_url(&self) -> String {
        let icon = self.condition_icon.as_str();
        if icon.starts_with("//") {
            format!("https:{icon}")
        } else {
            icon.to_string()
        }
    }

    /// "Name, Region, Country" with empty parts left out.
    pub fn display_location(&self) -> String {
        [&self.location_name, &self.region, &self.country]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(icon: &str, region: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            location_name: "London".into(),
            region: region.into(),
            country: "United Kingdom".into(),
            temperature_c: 15.0,
            condition_text: "Partly cloudy".into(),
            condition_icon: icon.into(),
            humidity_pct: 72,
            uv_index: 3.0,
            feels_like_c: 14.2,
            observed_at: None,
        }
    }

    #[test]
    fn icon_url_adds_scheme_to_protocol_relative_refs() {
        let s = snapshot("//cdn.weatherapi.com/weather/64x64/day/116.png", "");
        assert_eq!(s.icon_url(), "https://cdn.weatherapi.com/weather/64x64/day/116.png");

        let s = snapshot("https://example.com/icon.png", "");
        assert_eq!(s.icon_url(), "https://example.com/icon.png");
    }

    #[test]
    fn display_location_skips_empty_region() {
        assert_eq!(snapshot("", "").display_location(), "London, United Kingdom");
        assert_eq!(
            snapshot("", "City of London, Greater London").display_location(),
            "London, City of London, Greater London, United Kingdom"
        );
    }
}
