//! Integration tests for request routing and the JSON envelopes

mod common;

use serde_json::Value;
use tempfile::TempDir;

use common::{Canned, Reply};
use just_weather::routes::{self, ApiRequest, ApiResponse};

fn get(services: &routes::Services, path: &str, query: Option<&str>) -> ApiResponse {
    routes::handle(
        services,
        &ApiRequest {
            method: "GET",
            path,
            query,
            body: b"",
        },
    )
}

fn json(response: &ApiResponse) -> Value {
    serde_json::from_slice(&response.body).expect("JSON body")
}

fn setup() -> (TempDir, std::sync::Arc<Canned>, routes::Services) {
    let dir = TempDir::new().unwrap();
    let canned = Canned::new();
    let services = common::services(&canned, &dir);
    (dir, canned, services)
}

#[test]
fn test_current_weather_by_coordinates() {
    let (_dir, canned, services) = setup();
    canned.route("weather.test", Reply::Body(common::weather_body(17.5)));

    let response = get(&services, "/v1/current", Some("lat=59.3293&lon=18.0686"));

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "application/json");
    let body = json(&response);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["current_weather"]["temperature"], 17.5);
    assert_eq!(body["data"]["current_weather"]["weather_description"], "Overcast");
    assert_eq!(body["data"]["current_weather"]["wind_direction_name"], "South-Southwest");
    assert_eq!(body["data"]["location"]["latitude"], 59.3293);
}

#[test]
fn test_current_weather_accepts_long_alias() {
    let (_dir, canned, services) = setup();
    canned.route("weather.test", Reply::Body(common::weather_body(3.0)));

    let response = get(&services, "/v1/current", Some("lat=10&long=20"));

    assert_eq!(response.status, 200);
    assert_eq!(json(&response)["data"]["location"]["longitude"], 20.0);
}

#[test]
fn test_current_weather_missing_parameter() {
    let (_dir, canned, services) = setup();

    let response = get(&services, "/v1/current", Some("lat=10"));

    assert_eq!(response.status, 400);
    let body = json(&response);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["type"], "Bad Request");
    assert!(body["error"]["message"].as_str().unwrap().contains("lon"));
    assert_eq!(canned.call_count(), 0);
}

#[test]
fn test_current_weather_out_of_range() {
    let (_dir, canned, services) = setup();

    let response = get(&services, "/v1/current", Some("lat=91&lon=0"));

    assert_eq!(response.status, 400);
    assert_eq!(canned.call_count(), 0);
}

#[test]
fn test_current_weather_upstream_failures() {
    let (_dir, canned, services) = setup();
    canned.route("weather.test", Reply::Error("connection refused".to_string()));
    let response = get(&services, "/v1/current", Some("lat=1&lon=1"));
    assert_eq!(response.status, 502);
    assert_eq!(json(&response)["error"]["type"], "Bad Gateway");

    canned.route("weather.test", Reply::Timeout);
    let response = get(&services, "/v1/current", Some("lat=2&lon=2"));
    assert_eq!(response.status, 504);
    assert_eq!(json(&response)["error"]["type"], "Gateway Timeout");
}

#[test]
fn test_weather_by_city_picks_country_match() {
    let (_dir, canned, services) = setup();
    canned.route("geo.test", Reply::Body(common::SPRINGFIELD_BODY.to_string()));
    canned.route("weather.test", Reply::Body(common::weather_body(25.0)));

    let response = get(&services, "/v1/weather", Some("city=Springfield&country=AU"));

    assert_eq!(response.status, 200);
    let body = json(&response);
    assert_eq!(body["data"]["location"]["country_code"], "AU");
    assert_eq!(body["data"]["location"]["region"], "Queensland");
    assert_eq!(body["data"]["current_weather"]["temperature"], 25.0);

    let weather_call = canned
        .calls()
        .into_iter()
        .find(|url| url.contains("weather.test"))
        .expect("weather fetched");
    assert!(weather_call.contains("latitude=-27.660000"));
}

#[test]
fn test_weather_by_city_region_filter() {
    let (_dir, canned, services) = setup();
    canned.route("geo.test", Reply::Body(common::SPRINGFIELD_BODY.to_string()));
    canned.route("weather.test", Reply::Body(common::weather_body(25.0)));

    let response = get(&services, "/v1/weather", Some("city=Springfield&region=Illinois"));

    assert_eq!(response.status, 200);
    assert_eq!(json(&response)["data"]["location"]["region"], "Illinois");
}

#[test]
fn test_weather_by_unknown_city_is_not_found() {
    let (_dir, canned, services) = setup();
    canned.route("geo.test", Reply::Body(r#"{"results": []}"#.to_string()));

    let response = get(&services, "/v1/weather", Some("city=Atlantis"));

    assert_eq!(response.status, 404);
    assert_eq!(json(&response)["error"]["type"], "Not Found");
}

#[test]
fn test_weather_by_city_requires_city() {
    let (_dir, _canned, services) = setup();
    assert_eq!(get(&services, "/v1/weather", None).status, 400);
    assert_eq!(get(&services, "/v1/weather", Some("city=")).status, 400);
}

#[test]
fn test_city_search_from_popular_table() {
    let (_dir, canned, services) = setup();

    let response = get(&services, "/v1/cities", Some("query=Kyi"));

    assert_eq!(response.status, 200);
    let body = json(&response);
    assert_eq!(body["data"]["query"], "Kyi");
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["source"], "popular");
    assert_eq!(body["data"]["cities"][0]["name"], "Kyiv");
    assert_eq!(body["data"]["cities"][0]["country_code"], "UA");
    assert_eq!(canned.call_count(), 0);
}

#[test]
fn test_city_search_too_short() {
    let (_dir, _canned, services) = setup();
    let response = get(&services, "/v1/cities", Some("query=K"));
    assert_eq!(response.status, 400);
}

#[test]
fn test_prices_for_a_day() {
    let (_dir, canned, services) = setup();
    canned.route("prices.test", Reply::Body(common::PRICES_BODY.to_string()));

    let response = get(&services, "/v1/prices", Some("date=2024-01-25&price=se4"));

    assert_eq!(response.status, 200);
    let body = json(&response);
    assert_eq!(body["data"]["area"], "SE4");
    assert_eq!(body["data"]["avg_sek_per_kwh"], 1.0);
    assert_eq!(body["data"]["points"].as_array().map(Vec::len), Some(2));
    assert_eq!(
        canned.calls(),
        vec![format!("{}/2024/01-25_SE4.json", common::PRICES_BASE)]
    );
}

#[test]
fn test_prices_default_to_se3() {
    let (_dir, canned, services) = setup();
    canned.route("prices.test", Reply::Body("[]".to_string()));

    let response = get(&services, "/v1/prices", Some("date=2024-01-25"));

    assert_eq!(response.status, 200);
    assert!(canned.calls()[0].ends_with("_SE3.json"));
}

#[test]
fn test_prices_reject_bad_input() {
    let (_dir, canned, services) = setup();
    assert_eq!(
        get(&services, "/v1/prices", Some("date=2024-01-25&price=NO1")).status,
        400
    );
    assert_eq!(
        get(&services, "/v1/prices", Some("date=yesterday")).status,
        400
    );
    assert_eq!(canned.call_count(), 0);
}

#[test]
fn test_index_page() {
    let (_dir, _canned, services) = setup();
    let response = get(&services, "/", None);
    assert_eq!(response.status, 200);
    assert!(response.content_type.starts_with("text/html"));
    assert!(String::from_utf8_lossy(&response.body).contains("Just Weather API"));
}

#[test]
fn test_echo() {
    let (_dir, _canned, services) = setup();

    let response = routes::handle(
        &services,
        &ApiRequest {
            method: "POST",
            path: "/echo",
            query: None,
            body: b"hello there",
        },
    );
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "text/plain");
    assert_eq!(response.body, b"hello there");

    let response = get(&services, "/echo", Some("a=1"));
    assert_eq!(response.body, b"GET /echo?a=1");
}

#[test]
fn test_unknown_path_is_not_found() {
    let (_dir, _canned, services) = setup();
    let response = get(&services, "/v2/forecast", None);
    assert_eq!(response.status, 404);
    let message = json(&response)["error"]["message"].as_str().unwrap().to_string();
    assert!(message.contains("/v2/forecast"));
    assert!(message.contains("GET /v1/current"));
}

#[test]
fn test_wrong_method_on_known_path() {
    let (_dir, _canned, services) = setup();
    let response = routes::handle(
        &services,
        &ApiRequest {
            method: "DELETE",
            path: "/v1/current",
            query: None,
            body: b"",
        },
    );
    assert_eq!(response.status, 405);
}

#[test]
fn test_malformed_query_string() {
    let (_dir, _canned, services) = setup();
    let response = get(&services, "/v1/cities", Some("query=%FF"));
    assert_eq!(response.status, 400);
}
