use serde_json::Value;
use std::time::Duration;

const STORE_API: &str = "https://store.steampowered.com/api/appdetails";
const USER_AGENT: &str = "PrefixHQ";

/// Fallback display name when nothing else resolves an appid. Placeholder
/// names are deliberately never cached so a later scan retries the lookup.
pub fn placeholder_name(appid: &str) -> String {
    format!("(AppID {appid})")
}

/// Ask the Steam store API for an appid's name. One attempt, short timeouts;
/// any transport error, bad status, or unexpected body shape is a `None`.
pub fn fetch_app_name(appid: &str) -> Option<String> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(2))
        .timeout_read(Duration::from_secs(3))
        .build();
    let response = agent
        .get(STORE_API)
        .query("appids", appid)
        .set("User-Agent", USER_AGENT)
        .call()
        .ok()?;
    let body: Value = response.into_json().ok()?;
    parse_app_name(&body, appid)
}

/// The API body is keyed by the queried appid:
/// `{"620": {"success": true, "data": {"name": "Portal 2"}}}`.
pub fn parse_app_name(body: &Value, appid: &str) -> Option<String> {
    let info = body.get(appid)?;
    if !info.get("success")?.as_bool()? {
        return None;
    }
    let name = info.get("data")?.get("name")?.as_str()?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}
