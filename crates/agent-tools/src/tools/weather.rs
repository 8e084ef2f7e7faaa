//! Weather tool using the Open-Meteo APIs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::tool::{Tool, ToolArgs, ToolOutput};

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m,wind_direction_10m";

/// Weather tool backed by Open-Meteo (free, no API key).
///
/// # Parameters
///
/// - `location` (required): City name or `"lat,lon"` coordinates.
///
/// The result is the Open-Meteo forecast document (current conditions,
/// hourly temperature, daily sunrise/sunset) plus a `location` object with
/// the resolved name and coordinates.
pub struct Weather {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

#[derive(Debug, Clone, PartialEq)]
struct ResolvedLocation {
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country: Option<String>,
}

impl Weather {
    /// Create a new weather tool.
    pub fn new() -> Self {
        Self::with_base_urls(GEOCODING_URL, FORECAST_URL)
    }

    /// Point the tool at different geocoding / forecast endpoints.
    pub fn with_base_urls(geocoding_url: impl Into<String>, forecast_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            geocoding_url: geocoding_url.into(),
            forecast_url: forecast_url.into(),
        }
    }

    async fn resolve(&self, location: &str) -> Result<ResolvedLocation, ToolError> {
        if let Some((latitude, longitude)) = parse_coordinates(location) {
            return Ok(ResolvedLocation {
                name: location.to_string(),
                latitude,
                longitude,
            });
        }

        debug!(location, "Geocoding location");
        let response = self
            .client
            .get(&self.geocoding_url)
            .query(&[("name", location), ("count", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "Geocoding failed with status {}",
                response.status()
            )));
        }

        let body: GeocodingResponse = response.json().await?;
        let result = body.results.into_iter().next().ok_or_else(|| {
            ToolError::ExecutionFailed(format!("Location \"{}\" not found", location))
        })?;

        let name = match result.country {
            Some(country) if !country.is_empty() => format!("{}, {}", result.name, country),
            _ => result.name,
        };

        Ok(ResolvedLocation {
            name,
            latitude: result.latitude,
            longitude: result.longitude,
        })
    }

    async fn forecast(&self, location: &ResolvedLocation) -> Result<Value, ToolError> {
        let response = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("hourly", "temperature_2m".to_string()),
                ("daily", "sunrise,sunset,weather_code".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "Weather API returned status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

impl Default for Weather {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `"lat,lon"` (optional whitespace after the comma).
fn parse_coordinates(input: &str) -> Option<(f64, f64)> {
    let (lat, lon) = input.trim().split_once(',')?;
    let latitude: f64 = lat.trim().parse().ok()?;
    let longitude: f64 = lon.trim().parse().ok()?;
    if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
        Some((latitude, longitude))
    } else {
        None
    }
}

#[async_trait]
impl Tool for Weather {
    fn name(&self) -> &str {
        "getWeather"
    }

    fn description(&self) -> &str {
        "Get the current weather at a location. Provide a city name (e.g. \"London\") \
         or coordinates (e.g. \"51.5074,-0.1278\")."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City name or latitude,longitude coordinates"
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let location = args.get_string("location")?;

        let resolved = self.resolve(&location).await.inspect_err(|e| {
            warn!(location = %location, error = %e, "Weather location lookup failed");
        })?;
        let mut forecast = self.forecast(&resolved).await.inspect_err(|e| {
            warn!(location = %resolved.name, error = %e, "Weather fetch failed");
        })?;

        if let Value::Object(map) = &mut forecast {
            map.insert(
                "location".to_string(),
                json!({
                    "name": resolved.name,
                    "latitude": resolved.latitude,
                    "longitude": resolved.longitude,
                }),
            );
        }

        Ok(ToolOutput::success(forecast))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolContext;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_args(location: &str) -> ToolArgs {
        let mut params = serde_json::Map::new();
        params.insert("location".to_string(), Value::String(location.to_string()));
        ToolArgs::new(params, ToolContext::anonymous("user-1"))
    }

    fn tool_for(server: &MockServer) -> Weather {
        Weather::with_base_urls(
            format!("{}/v1/search", server.uri()),
            format!("{}/v1/forecast", server.uri()),
        )
    }

    #[test]
    fn test_parse_coordinates() {
        assert_eq!(parse_coordinates("48.85,2.35"), Some((48.85, 2.35)));
        assert_eq!(parse_coordinates("-33.9, 151.2"), Some((-33.9, 151.2)));
        assert_eq!(parse_coordinates("Paris"), None);
        assert_eq!(parse_coordinates("Paris, France"), None);
        assert_eq!(parse_coordinates("95,10"), None);
    }

    #[tokio::test]
    async fn test_missing_location() {
        let weather = Weather::new();
        let args = ToolArgs::new(serde_json::Map::new(), ToolContext::anonymous("user-1"));
        let result = weather.execute(args).await;
        assert!(matches!(result, Err(ToolError::MissingParameter(_))));
    }

    #[tokio::test]
    async fn test_city_is_geocoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"name": "Paris", "latitude": 48.85, "longitude": 2.35, "country": "France"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "48.85"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current": {"temperature_2m": 18.2, "weather_code": 1}
            })))
            .mount(&server)
            .await;

        let output = tool_for(&server).execute(make_args("Paris")).await.unwrap();
        assert_eq!(output.content["location"]["name"], "Paris, France");
        assert_eq!(output.content["current"]["temperature_2m"], 18.2);
    }

    #[tokio::test]
    async fn test_coordinates_skip_geocoding() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/search"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"current": {}})))
            .mount(&server)
            .await;

        let output = tool_for(&server)
            .execute(make_args("51.5074,-0.1278"))
            .await
            .unwrap();
        assert_eq!(output.content["location"]["latitude"], 51.5074);
    }

    #[tokio::test]
    async fn test_unknown_location() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let result = tool_for(&server).execute(make_args("Atlantis")).await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed(msg)) if msg.contains("Atlantis")));
    }
}
