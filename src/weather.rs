//! Ambient data source: the current weather as a ready-to-display image.
//!
//! `OpenWeatherSource` asks the OpenWeatherMap current-weather endpoint for
//! the configured location, maps the returned condition code to one of the
//! bundled icons, and picks the night variant when the returned icon code
//! ends in `n`.

use crate::assets::WeatherIcons;
use crate::{Error, Result};
use async_trait::async_trait;
use image::RgbImage;
use serde::Deserialize;
use std::time::Duration;

const CURRENT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Something that can produce the current ambient image.
#[async_trait]
pub trait AmbientSource: Send + Sync {
    async fn fetch(&self) -> Result<RgbImage>;
}

/// The bundled weather icons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WeatherIcon {
    ClearDay,
    ClearNight,
    FewCloudsDay,
    FewCloudsNight,
    Clouds,
    Drizzle,
    Rain,
    Snow,
    Thunderstorm,
    Mist,
}

impl WeatherIcon {
    pub const ALL: [WeatherIcon; 10] = [
        WeatherIcon::ClearDay,
        WeatherIcon::ClearNight,
        WeatherIcon::FewCloudsDay,
        WeatherIcon::FewCloudsNight,
        WeatherIcon::Clouds,
        WeatherIcon::Drizzle,
        WeatherIcon::Rain,
        WeatherIcon::Snow,
        WeatherIcon::Thunderstorm,
        WeatherIcon::Mist,
    ];

    /// Image file name (without `.png`) under `images/weather/`.
    pub fn file_stem(self) -> &'static str {
        match self {
            WeatherIcon::ClearDay => "clear_day",
            WeatherIcon::ClearNight => "clear_night",
            WeatherIcon::FewCloudsDay => "few_clouds_day",
            WeatherIcon::FewCloudsNight => "few_clouds_night",
            WeatherIcon::Clouds => "clouds",
            WeatherIcon::Drizzle => "drizzle",
            WeatherIcon::Rain => "rain",
            WeatherIcon::Snow => "snow",
            WeatherIcon::Thunderstorm => "thunderstorm",
            WeatherIcon::Mist => "mist",
        }
    }

    /// Map an OpenWeatherMap condition code to an icon.
    pub fn for_condition(code: u32, night: bool) -> Option<Self> {
        let icon = match code {
            200..=299 => WeatherIcon::Thunderstorm,
            300..=399 => WeatherIcon::Drizzle,
            500..=599 => WeatherIcon::Rain,
            600..=699 => WeatherIcon::Snow,
            700..=799 => WeatherIcon::Mist,
            800 if night => WeatherIcon::ClearNight,
            800 => WeatherIcon::ClearDay,
            801 | 802 if night => WeatherIcon::FewCloudsNight,
            801 | 802 => WeatherIcon::FewCloudsDay,
            803 | 804 => WeatherIcon::Clouds,
            _ => return None,
        };
        Some(icon)
    }
}

/// The parts of the current-weather response we use.
#[derive(Debug, Deserialize)]
pub struct CurrentWeather {
    pub weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
pub struct Condition {
    pub id: u32,
    /// Icon code such as `"01d"`; a trailing `n` marks night.
    pub icon: String,
}

impl CurrentWeather {
    /// Pick the icon for the primary condition.
    pub fn icon(&self) -> Result<WeatherIcon> {
        let primary = self.weather.first().ok_or(Error::EmptyWeather)?;
        let night = primary.icon.ends_with('n');
        WeatherIcon::for_condition(primary.id, night).ok_or(Error::UnknownCondition(primary.id))
    }
}

pub struct OpenWeatherSource {
    http: reqwest::Client,
    api_key: String,
    location: String,
    icons: WeatherIcons,
}

impl OpenWeatherSource {
    pub fn new(api_key: String, location: String, icons: WeatherIcons) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key,
            location,
            icons,
        })
    }
}

#[async_trait]
impl AmbientSource for OpenWeatherSource {
    async fn fetch(&self) -> Result<RgbImage> {
        let current: CurrentWeather = self
            .http
            .get(CURRENT_WEATHER_URL)
            .query(&[("q", self.location.as_str()), ("appid", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let icon = current.icon()?;
        tracing::debug!("Weather for {}: {:?}", self.location, icon);

        self.icons.get(icon).cloned().ok_or_else(|| {
            let id = current.weather.first().map_or(0, |c| c.id);
            Error::UnknownCondition(id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(211, false, Some(WeatherIcon::Thunderstorm))]
    #[case(301, true, Some(WeatherIcon::Drizzle))]
    #[case(502, false, Some(WeatherIcon::Rain))]
    #[case(601, false, Some(WeatherIcon::Snow))]
    #[case(741, false, Some(WeatherIcon::Mist))]
    #[case(800, false, Some(WeatherIcon::ClearDay))]
    #[case(800, true, Some(WeatherIcon::ClearNight))]
    #[case(801, false, Some(WeatherIcon::FewCloudsDay))]
    #[case(802, true, Some(WeatherIcon::FewCloudsNight))]
    #[case(804, true, Some(WeatherIcon::Clouds))]
    #[case(100, false, None)]
    #[case(900, false, None)]
    fn condition_code_mapping(
        #[case] code: u32,
        #[case] night: bool,
        #[case] expected: Option<WeatherIcon>,
    ) {
        assert_eq!(WeatherIcon::for_condition(code, night), expected);
    }

    #[test]
    fn night_variant_from_icon_suffix() {
        let body = r#"{
            "coord": {"lon": -0.13, "lat": 51.51},
            "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01n"}],
            "name": "London"
        }"#;
        let current: CurrentWeather = serde_json::from_str(body).unwrap();
        assert_eq!(current.icon().unwrap(), WeatherIcon::ClearNight);
    }

    #[test]
    fn day_variant_by_default() {
        let body = r#"{"weather": [{"id": 801, "icon": "02d"}]}"#;
        let current: CurrentWeather = serde_json::from_str(body).unwrap();
        assert_eq!(current.icon().unwrap(), WeatherIcon::FewCloudsDay);
    }

    #[test]
    fn empty_conditions_are_an_error() {
        let current: CurrentWeather = serde_json::from_str(r#"{"weather": []}"#).unwrap();
        assert!(matches!(current.icon(), Err(Error::EmptyWeather)));
    }

    #[test]
    fn unknown_condition_is_an_error() {
        let current: CurrentWeather =
            serde_json::from_str(r#"{"weather": [{"id": 999, "icon": "50d"}]}"#).unwrap();
        assert!(matches!(current.icon(), Err(Error::UnknownCondition(999))));
    }

    #[test]
    fn every_icon_has_a_distinct_file() {
        let mut stems: Vec<&str> = WeatherIcon::ALL.iter().map(|i| i.file_stem()).collect();
        stems.sort();
        stems.dedup();
        assert_eq!(stems.len(), WeatherIcon::ALL.len());
    }
}
