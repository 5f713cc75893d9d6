//! HTML rendering for the calculator form
//!
//! Plain string templates. The agent answers in HTML already, so its text
//! is embedded as-is after whitespace collapse; everything the user typed
//! is escaped.

use regex::Regex;
use std::sync::OnceLock;
use wattwise_common::{Appliance, City, DurationUnit};

const ENERGY_TIPS: [&str; 5] = [
    "Turn off appliances when not in use",
    "Use energy-efficient appliances",
    "Set thermostats to optimal temperatures",
    "Use power strips to easily turn off multiple devices",
    "Regularly maintain your appliances",
];

const STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto;color:#1a202c}\
form{display:grid;gap:.75rem}\
label{font-weight:600}\
.result-card{margin-top:1.5rem;padding:1.5rem;border-radius:.5rem;background:#f0f4f8}\
.result-content{font-family:monospace}\
.error-card{margin-top:1.5rem;padding:1rem;border-radius:.5rem;background:#fde8e8;color:#9b1c1c}\
.footer{margin-top:2rem;padding:1rem;background:#f8f9fa;border-radius:.5rem}";

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Flatten an answer to one line: every whitespace run becomes one space
pub fn collapse_whitespace(text: &str) -> String {
    whitespace().replace_all(text.trim(), " ").into_owned()
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn options<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values
        .into_iter()
        .map(|v| format!("<option value=\"{0}\">{0}</option>", escape_html(v)))
        .collect()
}

fn form() -> String {
    let cities = options(City::ALL.iter().map(|c| c.display_name()));
    let appliances = options(Appliance::ALL.iter().map(|a| a.display_name()));
    let units = options(
        [DurationUnit::HoursPerDay, DurationUnit::MinutesPerDay]
            .iter()
            .map(|u| u.as_str()),
    );

    format!(
        "<form method=\"post\" action=\"/calculate\">\
         <label for=\"city\">Select Your City</label>\
         <select id=\"city\" name=\"city\"><option value=\"\">Select a City</option>{cities}</select>\
         <label for=\"rate\">Custom Rate ($/kWh) (optional)</label>\
         <input id=\"rate\" name=\"rate\" type=\"number\" min=\"0\" step=\"0.01\" value=\"0\">\
         <label for=\"appliance\">Select an Appliance</label>\
         <select id=\"appliance\" name=\"appliance\">{appliances}</select>\
         <label for=\"duration\">Daily Usage Time</label>\
         <input id=\"duration\" name=\"duration\" type=\"number\" min=\"0\" step=\"any\" value=\"3\">\
         <label for=\"unit\">Time Unit</label>\
         <select id=\"unit\" name=\"unit\">{units}</select>\
         <button type=\"submit\">Calculate</button>\
         </form>"
    )
}

fn footer() -> String {
    let tips: String = ENERGY_TIPS.iter().map(|t| format!("<li>{}</li>", t)).collect();
    format!("<div class=\"footer\"><h4>Energy Saving Tips</h4><ul>{}</ul></div>", tips)
}

fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>Energy Cost Calculator</title><style>{}</style></head>\
         <body><h1>⚡ Energy Cost Calculator</h1>{}{}{}</body></html>",
        STYLE,
        form(),
        body,
        footer()
    )
}

/// Empty form
pub fn form_page() -> String {
    page("")
}

/// Form followed by the agent's answer
pub fn result_page(answer_html: &str) -> String {
    page(&format!(
        "<div class=\"result-card\"><h3>Results</h3><div class=\"result-content\">{}</div></div>",
        collapse_whitespace(answer_html)
    ))
}

/// Form followed by an error card
pub fn error_page(message: &str) -> String {
    page(&format!(
        "<div class=\"error-card\"><strong>Error:</strong> {}</div>",
        escape_html(message)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(
            collapse_whitespace("<p>Fridge\n\n uses\t<strong>150 W</strong></p>\n"),
            "<p>Fridge uses <strong>150 W</strong></p>"
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>\"x\" & 'y'</script>"),
            "&lt;script&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_form_lists_every_choice() {
        let html = form_page();
        for city in City::ALL {
            assert!(html.contains(city.display_name()));
        }
        for appliance in Appliance::ALL {
            assert!(html.contains(appliance.display_name()));
        }
        assert!(html.contains("minutes/day"));
        assert!(html.contains("Energy Saving Tips"));
    }

    #[test]
    fn test_error_page_escapes_message() {
        let html = error_page("unknown appliance: <toaster>");
        assert!(html.contains("unknown appliance: &lt;toaster&gt;"));
        assert!(!html.contains("<toaster>"));
    }
}
