//! Text views for each screen state.

use chrono::Local;
use weather_core::{ViewState, WeatherSnapshot};

pub fn view(state: &ViewState) -> String {
    match state {
        ViewState::Default => default_view(),
        ViewState::Loading => "Loading...".to_string(),
        ViewState::Success { snapshot, showing_details: false } => summary_card(snapshot),
        ViewState::Success { snapshot, showing_details: true } => details(snapshot),
        ViewState::Error(err) => format!("Error: {err}"),
    }
}

fn default_view() -> String {
    "No City Selected\nPlease Search For A City".to_string()
}

fn summary_card(s: &WeatherSnapshot) -> String {
    format!(
        "+ {}\n| {:.1}°  {}\n+ {}",
        s.location_name,
        s.temperature_c,
        s.condition_text,
        s.icon_url(),
    )
}

fn details(s: &WeatherSnapshot) -> String {
    let mut lines = vec![
        s.display_location(),
        format!("{:.1}°  {}", s.temperature_c, s.condition_text),
        String::new(),
        format!("{:<11}{}%", "Humidity", s.humidity_pct),
        format!("{:<11}{:.1}", "UV Index", s.uv_index),
        format!("{:<11}{:.1}°", "Feels Like", s.feels_like_c),
    ];

    if let Some(at) = s.observed_at {
        let local = at.with_timezone(&Local);
        lines.push(format!("{:<11}{}", "Updated", local.format("%Y-%m-%d %H:%M")));
    }
    lines.push(format!("{:<11}{}", "Icon", s.icon_url()));

    lines.join("\n")
}
